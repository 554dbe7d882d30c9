/// In-memory [`Store`]
///
/// Backs the integration tests and local demos. It mirrors the Postgres
/// schema's guarantees that the API relies on:
///
/// - case-insensitive unique emails and `(tenant_id, name)` departments
/// - foreign keys to tenants and departments
/// - the same [`Scope`] predicates on every event read and write
///
/// [`MemoryStore::set_audit_failure`] simulates an audit store outage.
///
/// # Example
///
/// ```
/// use triage_shared::store::{MemoryStore, Store};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new();
/// let tenant = store.create_tenant("Acme").await?;
/// let billing = store.create_department(tenant.id, "Billing").await?;
/// assert_eq!(store.list_departments(tenant.id).await?.len(), 1);
/// # let _ = billing;
/// # Ok(())
/// # }
/// ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::auth::scope::Scope;
use crate::models::audit_log::{AuditFilter, AuditLog, NewAuditLog, MAX_AUDIT_LIMIT};
use crate::models::auth_token::{AuthToken, AuthTokenKind, NewAuthToken};
use crate::models::department::Department;
use crate::models::email_event::{
    EmailEvent, EscalationRow, EventCounts, EventFilter, EventPatch, EventState, HandledBy,
    NewEmailEvent, MAX_LIST_LIMIT,
};
use crate::models::tenant::Tenant;
use crate::models::user::{CreateUser, UpdateProfile, User, UserStatus};

#[derive(Debug, Default)]
struct Tables {
    tenants: Vec<Tenant>,
    departments: Vec<Department>,
    users: Vec<User>,
    events: Vec<EmailEvent>,
    audit_logs: Vec<AuditLog>,
    auth_tokens: Vec<AuthToken>,
}

impl Tables {
    fn tenant_exists(&self, id: Uuid) -> bool {
        self.tenants.iter().any(|t| t.id == id)
    }

    fn department_in_tenant(&self, tenant_id: Uuid, id: Uuid) -> bool {
        self.departments
            .iter()
            .any(|d| d.id == id && d.tenant_id == tenant_id)
    }

    fn user_mut(&mut self, id: Uuid) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == id)
    }
}

/// Store that keeps everything in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_audit_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent audit write fail with `Unavailable`
    pub fn set_audit_failure(&self, fail: bool) {
        self.fail_audit_writes.store(fail, Ordering::SeqCst);
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn newest_first<T>(rows: &mut [T], created_at: impl Fn(&T) -> DateTime<Utc>) {
    rows.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn create_tenant(&self, name: &str) -> StoreResult<Tenant> {
        let tenant = Tenant {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        self.write().tenants.push(tenant.clone());
        Ok(tenant)
    }

    async fn find_tenant(&self, id: Uuid) -> StoreResult<Option<Tenant>> {
        Ok(self.read().tenants.iter().find(|t| t.id == id).cloned())
    }

    async fn create_department(&self, tenant_id: Uuid, name: &str) -> StoreResult<Department> {
        let mut tables = self.write();

        if !tables.tenant_exists(tenant_id) {
            return Err(StoreError::InvalidReference(format!("tenant {}", tenant_id)));
        }
        if tables
            .departments
            .iter()
            .any(|d| d.tenant_id == tenant_id && d.name == name)
        {
            return Err(StoreError::Conflict(format!("department '{}'", name)));
        }

        let department = Department {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.to_string(),
            created_at: Utc::now(),
        };
        tables.departments.push(department.clone());
        Ok(department)
    }

    async fn find_department(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<Option<Department>> {
        Ok(self
            .read()
            .departments
            .iter()
            .find(|d| d.id == id && d.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_departments(&self, tenant_id: Uuid) -> StoreResult<Vec<Department>> {
        let mut departments: Vec<Department> = self
            .read()
            .departments
            .iter()
            .filter(|d| d.tenant_id == tenant_id)
            .cloned()
            .collect();
        departments.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(departments)
    }

    async fn create_user(&self, data: CreateUser) -> StoreResult<User> {
        let mut tables = self.write();

        if !tables.tenant_exists(data.tenant_id) {
            return Err(StoreError::InvalidReference(format!("tenant {}", data.tenant_id)));
        }
        if let Some(department_id) = data.department_id {
            if !tables.department_in_tenant(data.tenant_id, department_id) {
                return Err(StoreError::InvalidReference(format!(
                    "department {}",
                    department_id
                )));
            }
        }
        if tables
            .users
            .iter()
            .any(|u| u.email.eq_ignore_ascii_case(&data.email))
        {
            return Err(StoreError::Conflict(format!("user '{}'", data.email)));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            tenant_id: data.tenant_id,
            department_id: data.department_id,
            email: data.email,
            name: data.name,
            role: data.role,
            status: data.status,
            password_hash: data.password_hash,
            session_version: 0,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.read().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_in_tenant(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self
            .read()
            .users
            .iter()
            .find(|u| u.id == id && u.tenant_id == tenant_id)
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .read()
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list_users(&self, scope: &Scope) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self
            .read()
            .users
            .iter()
            .filter(|u| scope.matches_user(u))
            .cloned()
            .collect();

        users.sort_by(|a, b| match (&a.name, &b.name) {
            (Some(x), Some(y)) => x.cmp(y).then_with(|| a.email.cmp(&b.email)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.email.cmp(&b.email),
        });
        Ok(users)
    }

    async fn update_user_profile(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        update: &UpdateProfile,
    ) -> StoreResult<Option<User>> {
        let mut tables = self.write();

        if let Some(Some(department_id)) = update.department_id {
            if !tables.department_in_tenant(tenant_id, department_id) {
                return Err(StoreError::InvalidReference(format!(
                    "department {}",
                    department_id
                )));
            }
        }

        let Some(user) = tables
            .users
            .iter_mut()
            .find(|u| u.id == id && u.tenant_id == tenant_id)
        else {
            return Ok(None);
        };

        if let Some(role) = update.role {
            user.role = role.as_str().to_string();
        }
        if let Some(department_id) = update.department_id {
            user.department_id = department_id;
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn activate_user(
        &self,
        id: Uuid,
        password_hash: &str,
        name: Option<&str>,
    ) -> StoreResult<Option<User>> {
        let mut tables = self.write();

        let Some(user) = tables.user_mut(id) else {
            return Ok(None);
        };
        if user.status != UserStatus::Invited {
            return Ok(None);
        }

        user.status = UserStatus::Active;
        user.password_hash = Some(password_hash.to_string());
        if let Some(name) = name {
            user.name = Some(name.to_string());
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> StoreResult<bool> {
        let mut tables = self.write();

        Ok(match tables.user_mut(id) {
            Some(user) => {
                user.password_hash = Some(password_hash.to_string());
                user.session_version += 1;
                user.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn bump_session_version(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.write();

        Ok(match tables.user_mut(id) {
            Some(user) => {
                user.session_version += 1;
                user.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn record_login(&self, id: Uuid) -> StoreResult<()> {
        if let Some(user) = self.write().user_mut(id) {
            user.last_login_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn insert_event(&self, data: NewEmailEvent) -> StoreResult<EmailEvent> {
        let mut tables = self.write();

        if !tables.tenant_exists(data.tenant_id) {
            return Err(StoreError::InvalidReference(format!("tenant {}", data.tenant_id)));
        }

        let now = Utc::now();
        let event = EmailEvent {
            id: Uuid::new_v4(),
            tenant_id: data.tenant_id,
            subject: data.subject,
            content: data.content,
            source: data.source,
            external_message_id: data.external_message_id,
            thread_id: data.thread_id,
            handled_by: HandledBy::Ai,
            current_state: data.current_state,
            priority: data.priority,
            confidence_score: data.confidence_score,
            escalation_reason: data.escalation_reason,
            assigned_user_id: data.assigned_user_id,
            department_id: data.department_id,
            sla_deadline: data.sla_deadline,
            snooze_count: 0,
            pending_resolution: false,
            resolution_expected: None,
            pending_since: None,
            evidence_message_id: None,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.events.push(event.clone());
        Ok(event)
    }

    async fn find_event(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<Option<EmailEvent>> {
        Ok(self
            .read()
            .events
            .iter()
            .find(|e| e.id == id && e.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_events(&self, scope: &Scope, filter: &EventFilter) -> StoreResult<Vec<EmailEvent>> {
        let mut events: Vec<EmailEvent> = self
            .read()
            .events
            .iter()
            .rev()
            .filter(|e| scope.matches_event(e))
            .filter(|e| filter.state.map_or(true, |s| e.current_state == s))
            .cloned()
            .collect();

        newest_first(&mut events, |e| e.created_at);
        events.truncate(filter.limit.clamp(1, MAX_LIST_LIMIT) as usize);
        Ok(events)
    }

    async fn list_escalations(&self, scope: &Scope) -> StoreResult<Vec<EscalationRow>> {
        let tables = self.read();

        let mut rows: Vec<EscalationRow> = tables
            .events
            .iter()
            .rev()
            .filter(|e| scope.matches_event(e) && e.current_state.is_escalation())
            .map(|e| EscalationRow {
                assignee_name: e.assigned_user_id.and_then(|id| {
                    tables
                        .users
                        .iter()
                        .find(|u| u.id == id && u.tenant_id == e.tenant_id)
                        .map(|u| u.display_name().to_string())
                }),
                department_name: e.department_id.and_then(|id| {
                    tables
                        .departments
                        .iter()
                        .find(|d| d.id == id && d.tenant_id == e.tenant_id)
                        .map(|d| d.name.clone())
                }),
                event: e.clone(),
            })
            .collect();

        newest_first(&mut rows, |r| r.event.created_at);
        Ok(rows)
    }

    async fn update_event(
        &self,
        scope: &Scope,
        id: Uuid,
        patch: &EventPatch,
    ) -> StoreResult<Option<EmailEvent>> {
        let mut tables = self.write();

        let Some(event) = tables
            .events
            .iter_mut()
            .find(|e| e.id == id && scope.matches_event(e) && patch.admits(e))
        else {
            return Ok(None);
        };

        patch.apply(event, Utc::now());
        Ok(Some(event.clone()))
    }

    async fn count_events(
        &self,
        scope: &Scope,
        now: DateTime<Utc>,
        risk_window: Duration,
    ) -> StoreResult<EventCounts> {
        let tables = self.read();
        let mut counts = EventCounts::default();

        for event in tables.events.iter().filter(|e| scope.matches_event(e)) {
            counts.total += 1;

            if event.current_state == EventState::Handled {
                counts.handled += 1;
            } else if event.pending_resolution {
                counts.pending_resolution += 1;
            }

            if event.current_state.is_escalation() {
                counts.escalations += 1;

                match event.sla_deadline {
                    Some(deadline) if deadline < now => counts.breached += 1,
                    Some(deadline) if deadline <= now + risk_window => counts.breach_risk += 1,
                    _ => {}
                }
            }
        }

        Ok(counts)
    }

    async fn append_audit_log(&self, entry: NewAuditLog) -> StoreResult<AuditLog> {
        if self.fail_audit_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("audit store offline".to_string()));
        }

        let log = AuditLog {
            id: Uuid::new_v4(),
            tenant_id: entry.tenant_id,
            user_id: entry.user_id,
            user_role: entry.user_role,
            action: entry.action,
            resource_type: entry.resource_type,
            resource_id: entry.resource_id,
            endpoint: entry.endpoint,
            ip: entry.ip,
            user_agent: entry.user_agent,
            metadata: entry.metadata,
            created_at: Utc::now(),
        };
        self.write().audit_logs.push(log.clone());
        Ok(log)
    }

    async fn list_audit_logs(&self, tenant_id: Uuid, filter: &AuditFilter) -> StoreResult<Vec<AuditLog>> {
        let mut logs: Vec<AuditLog> = self
            .read()
            .audit_logs
            .iter()
            .rev()
            .filter(|l| l.tenant_id == tenant_id)
            .filter(|l| {
                filter
                    .resource_type
                    .as_deref()
                    .map_or(true, |rt| l.resource_type == rt)
            })
            .cloned()
            .collect();

        newest_first(&mut logs, |l| l.created_at);
        logs.truncate(filter.limit.clamp(1, MAX_AUDIT_LIMIT) as usize);
        Ok(logs)
    }

    async fn create_auth_token(&self, data: NewAuthToken) -> StoreResult<AuthToken> {
        let mut tables = self.write();

        if tables.auth_tokens.iter().any(|t| t.token_hash == data.token_hash) {
            return Err(StoreError::Conflict("token hash".to_string()));
        }
        if !tables.users.iter().any(|u| u.id == data.user_id) {
            return Err(StoreError::InvalidReference(format!("user {}", data.user_id)));
        }

        let token = AuthToken {
            id: Uuid::new_v4(),
            user_id: data.user_id,
            tenant_id: data.tenant_id,
            kind: data.kind,
            token_hash: data.token_hash,
            expires_at: data.expires_at,
            consumed_at: None,
            created_at: Utc::now(),
        };
        tables.auth_tokens.push(token.clone());
        Ok(token)
    }

    async fn consume_auth_token(
        &self,
        token_hash: &str,
        kind: AuthTokenKind,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<AuthToken>> {
        let mut tables = self.write();

        let Some(token) = tables
            .auth_tokens
            .iter_mut()
            .find(|t| t.token_hash == token_hash && t.kind == kind && t.is_redeemable(now))
        else {
            return Ok(None);
        };

        token.consumed_at = Some(now);
        Ok(Some(token.clone()))
    }
}

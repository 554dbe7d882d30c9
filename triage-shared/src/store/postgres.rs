/// Postgres-backed [`Store`].

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{Store, StoreResult};
use crate::auth::scope::Scope;
use crate::models::audit_log::{AuditFilter, AuditLog, NewAuditLog};
use crate::models::auth_token::{AuthToken, AuthTokenKind, NewAuthToken};
use crate::models::department::Department;
use crate::models::email_event::{
    EmailEvent, EscalationRow, EventCounts, EventFilter, EventPatch, NewEmailEvent,
};
use crate::models::tenant::Tenant;
use crate::models::user::{CreateUser, UpdateProfile, User};

/// Store over a shared connection pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_tenant(&self, name: &str) -> StoreResult<Tenant> {
        Ok(Tenant::create(&self.pool, name).await?)
    }

    async fn find_tenant(&self, id: Uuid) -> StoreResult<Option<Tenant>> {
        Ok(Tenant::find_by_id(&self.pool, id).await?)
    }

    async fn create_department(&self, tenant_id: Uuid, name: &str) -> StoreResult<Department> {
        Ok(Department::create(&self.pool, tenant_id, name).await?)
    }

    async fn find_department(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<Option<Department>> {
        Ok(Department::find_in_tenant(&self.pool, tenant_id, id).await?)
    }

    async fn list_departments(&self, tenant_id: Uuid) -> StoreResult<Vec<Department>> {
        Ok(Department::list_by_tenant(&self.pool, tenant_id).await?)
    }

    async fn create_user(&self, data: CreateUser) -> StoreResult<User> {
        Ok(User::create(&self.pool, data).await?)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_in_tenant(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<Option<User>> {
        Ok(User::find_in_tenant(&self.pool, tenant_id, id).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(User::find_by_email(&self.pool, email).await?)
    }

    async fn list_users(&self, scope: &Scope) -> StoreResult<Vec<User>> {
        Ok(User::list_in_scope(&self.pool, scope).await?)
    }

    async fn update_user_profile(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        update: &UpdateProfile,
    ) -> StoreResult<Option<User>> {
        Ok(User::update_profile(&self.pool, tenant_id, id, update).await?)
    }

    async fn activate_user(
        &self,
        id: Uuid,
        password_hash: &str,
        name: Option<&str>,
    ) -> StoreResult<Option<User>> {
        Ok(User::activate(&self.pool, id, password_hash, name).await?)
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> StoreResult<bool> {
        Ok(User::set_password(&self.pool, id, password_hash).await?)
    }

    async fn bump_session_version(&self, id: Uuid) -> StoreResult<bool> {
        Ok(User::bump_session_version(&self.pool, id).await?)
    }

    async fn record_login(&self, id: Uuid) -> StoreResult<()> {
        Ok(User::record_login(&self.pool, id).await?)
    }

    async fn insert_event(&self, data: NewEmailEvent) -> StoreResult<EmailEvent> {
        Ok(EmailEvent::create(&self.pool, data).await?)
    }

    async fn find_event(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<Option<EmailEvent>> {
        Ok(EmailEvent::find_in_tenant(&self.pool, tenant_id, id).await?)
    }

    async fn list_events(&self, scope: &Scope, filter: &EventFilter) -> StoreResult<Vec<EmailEvent>> {
        Ok(EmailEvent::list_in_scope(&self.pool, scope, filter).await?)
    }

    async fn list_escalations(&self, scope: &Scope) -> StoreResult<Vec<EscalationRow>> {
        Ok(EmailEvent::list_escalations(&self.pool, scope).await?)
    }

    async fn update_event(
        &self,
        scope: &Scope,
        id: Uuid,
        patch: &EventPatch,
    ) -> StoreResult<Option<EmailEvent>> {
        Ok(EmailEvent::apply_patch(&self.pool, scope, id, patch).await?)
    }

    async fn count_events(
        &self,
        scope: &Scope,
        now: DateTime<Utc>,
        risk_window: Duration,
    ) -> StoreResult<EventCounts> {
        Ok(EmailEvent::count_in_scope(&self.pool, scope, now, risk_window).await?)
    }

    async fn append_audit_log(&self, entry: NewAuditLog) -> StoreResult<AuditLog> {
        Ok(AuditLog::create(&self.pool, entry).await?)
    }

    async fn list_audit_logs(&self, tenant_id: Uuid, filter: &AuditFilter) -> StoreResult<Vec<AuditLog>> {
        Ok(AuditLog::list_by_tenant(&self.pool, tenant_id, filter).await?)
    }

    async fn create_auth_token(&self, data: NewAuthToken) -> StoreResult<AuthToken> {
        Ok(AuthToken::create(&self.pool, data).await?)
    }

    async fn consume_auth_token(
        &self,
        token_hash: &str,
        kind: AuthTokenKind,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<AuthToken>> {
        Ok(AuthToken::consume(&self.pool, token_hash, kind, now).await?)
    }
}

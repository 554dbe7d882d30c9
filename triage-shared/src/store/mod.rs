/// Data access behind a trait
///
/// Handlers receive an `Arc<dyn Store>` and never talk to Postgres directly.
/// Two implementations ship:
///
/// - [`PgStore`]: production store over a shared `sqlx::PgPool`; delegates
///   to the SQL on each model
/// - [`MemoryStore`]: in-process store for tests and local demos, enforcing
///   the same scope rules and uniqueness constraints
///
/// Every event read or write takes a [`Scope`], so the role predicate is
/// applied by the store itself and not left to the caller.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::auth::scope::Scope;
use crate::models::audit_log::{AuditFilter, AuditLog, NewAuditLog};
use crate::models::auth_token::{AuthToken, AuthTokenKind, NewAuthToken};
use crate::models::department::Department;
use crate::models::email_event::{
    EmailEvent, EscalationRow, EventCounts, EventFilter, EventPatch, NewEmailEvent,
};
use crate::models::tenant::Tenant;
use crate::models::user::{CreateUser, UpdateProfile, User};

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated
    #[error("Record already exists: {0}")]
    Conflict(String),

    /// A referenced row (tenant, department, user) doesn't exist
    #[error("Referenced record not found: {0}")]
    InvalidReference(String),

    /// The store couldn't be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Any other database failure
    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(db_err.message().to_string()),
                Some("23503") => StoreError::InvalidReference(db_err.message().to_string()),
                _ => StoreError::Database(err.to_string()),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Database(err.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence operations used by the API
#[async_trait]
pub trait Store: Send + Sync {
    /// Checks connectivity
    async fn ping(&self) -> StoreResult<()>;

    async fn create_tenant(&self, name: &str) -> StoreResult<Tenant>;
    async fn find_tenant(&self, id: Uuid) -> StoreResult<Option<Tenant>>;

    async fn create_department(&self, tenant_id: Uuid, name: &str) -> StoreResult<Department>;
    async fn find_department(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<Option<Department>>;
    async fn list_departments(&self, tenant_id: Uuid) -> StoreResult<Vec<Department>>;

    async fn create_user(&self, data: CreateUser) -> StoreResult<User>;

    /// Loads a user by ID regardless of tenant; used to reload sessions
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_in_tenant(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn list_users(&self, scope: &Scope) -> StoreResult<Vec<User>>;
    async fn update_user_profile(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        update: &UpdateProfile,
    ) -> StoreResult<Option<User>>;

    /// Sets the first password on an invited user and marks it active
    async fn activate_user(
        &self,
        id: Uuid,
        password_hash: &str,
        name: Option<&str>,
    ) -> StoreResult<Option<User>>;

    /// Replaces the password hash and bumps the session version
    async fn set_password(&self, id: Uuid, password_hash: &str) -> StoreResult<bool>;
    async fn bump_session_version(&self, id: Uuid) -> StoreResult<bool>;
    async fn record_login(&self, id: Uuid) -> StoreResult<()>;

    async fn insert_event(&self, data: NewEmailEvent) -> StoreResult<EmailEvent>;

    /// Finds an event in a tenant without narrowing to a role scope
    async fn find_event(&self, tenant_id: Uuid, id: Uuid) -> StoreResult<Option<EmailEvent>>;
    async fn list_events(&self, scope: &Scope, filter: &EventFilter) -> StoreResult<Vec<EmailEvent>>;
    async fn list_escalations(&self, scope: &Scope) -> StoreResult<Vec<EscalationRow>>;

    /// Applies a patch to one event inside `scope`; `None` if nothing matched
    async fn update_event(
        &self,
        scope: &Scope,
        id: Uuid,
        patch: &EventPatch,
    ) -> StoreResult<Option<EmailEvent>>;
    async fn count_events(
        &self,
        scope: &Scope,
        now: DateTime<Utc>,
        risk_window: Duration,
    ) -> StoreResult<EventCounts>;

    async fn append_audit_log(&self, entry: NewAuditLog) -> StoreResult<AuditLog>;
    async fn list_audit_logs(&self, tenant_id: Uuid, filter: &AuditFilter) -> StoreResult<Vec<AuditLog>>;

    async fn create_auth_token(&self, data: NewAuthToken) -> StoreResult<AuthToken>;

    /// Marks a token consumed; `None` if unknown, expired or already used
    async fn consume_auth_token(
        &self,
        token_hash: &str,
        kind: AuthTokenKind,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<AuthToken>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_unavailable() {
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolTimedOut),
            StoreError::Unavailable(_)
        ));
    }

    #[test]
    fn test_row_not_found_is_database_error() {
        assert!(matches!(
            StoreError::from(sqlx::Error::RowNotFound),
            StoreError::Database(_)
        ));
    }
}

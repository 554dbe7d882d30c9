/// User model and database operations
///
/// Users belong to exactly one tenant and at most one department. The `role`
/// column is free text: a row holding a value outside admin/manager/agent is
/// preserved as-is but [`User::role`] yields `None`, and the access policy
/// grants such a user nothing beyond its own profile.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
///     department_id UUID REFERENCES departments(id) ON DELETE SET NULL,
///     email CITEXT NOT NULL UNIQUE,
///     name VARCHAR(255),
///     role TEXT NOT NULL DEFAULT 'agent',
///     status TEXT NOT NULL DEFAULT 'invited',
///     password_hash VARCHAR(255),
///     session_version INTEGER NOT NULL DEFAULT 0,
///     last_login_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use triage_shared::models::user::{CreateUser, Role, User, UserStatus};
/// use triage_shared::db::pool::{create_pool, DatabaseConfig};
/// use uuid::Uuid;
///
/// # async fn example(tenant_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     tenant_id,
///     department_id: None,
///     email: "agent@example.com".to_string(),
///     name: Some("Sam Agent".to_string()),
///     role: Role::Agent.as_str().to_string(),
///     status: UserStatus::Invited,
///     password_hash: None,
/// }).await?;
///
/// assert_eq!(user.role(), Some(Role::Agent));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::auth::scope::Scope;
use crate::models::text_enum;

/// Role granted to a user inside its tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access within the tenant
    Admin,

    /// Access bounded by the manager's department
    Manager,

    /// Access bounded to the agent's own assignments
    Agent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Agent => "agent",
        }
    }

    /// Parses a stored role; unknown values yield `None`
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "manager" => Some(Role::Manager),
            "agent" => Some(Role::Agent),
            _ => None,
        }
    }
}

text_enum!(Role, "role");

/// Account lifecycle status
///
/// Users are never hard-deleted; offboarding sets `Deactivated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    /// Invited but has not accepted yet
    Invited,

    /// Can sign in
    Active,

    /// Signed out everywhere and cannot sign in
    Deactivated,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Invited => "invited",
            UserStatus::Active => "active",
            UserStatus::Deactivated => "deactivated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "invited" => Some(UserStatus::Invited),
            "active" => Some(UserStatus::Active),
            "deactivated" => Some(UserStatus::Deactivated),
            _ => None,
        }
    }
}

text_enum!(UserStatus, "user status");

/// User profile
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID
    pub id: Uuid,

    /// Owning tenant
    pub tenant_id: Uuid,

    /// Department, if any
    pub department_id: Option<Uuid>,

    /// Email address (case-insensitive via CITEXT)
    pub email: String,

    /// Optional display name
    pub name: Option<String>,

    /// Stored role text
    ///
    /// Kept as a string so unrecognized values survive a round trip; use
    /// [`User::role`] to interpret it.
    pub role: String,

    /// Account status
    #[sqlx(try_from = "String")]
    pub status: UserStatus,

    /// Argon2id password hash; `None` until an invite is accepted
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,

    /// Bumped on sign-out and password change to revoke issued tokens
    pub session_version: i32,

    /// When the user last signed in
    pub last_login_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub tenant_id: Uuid,
    pub department_id: Option<Uuid>,
    pub email: String,
    pub name: Option<String>,
    pub role: String,
    pub status: UserStatus,
    pub password_hash: Option<String>,
}

/// Admin-initiated profile change
///
/// `department_id: Some(None)` clears the department.
#[derive(Debug, Clone, Default)]
pub struct UpdateProfile {
    pub role: Option<Role>,
    pub department_id: Option<Option<Uuid>>,
}

impl UpdateProfile {
    pub fn is_empty(&self) -> bool {
        self.role.is_none() && self.department_id.is_none()
    }
}

const USER_COLUMNS: &str = "id, tenant_id, department_id, email, name, role, status, \
     password_hash, session_version, last_login_at, created_at, updated_at";

impl User {
    /// Interprets the stored role
    ///
    /// Returns `None` for values outside admin/manager/agent.
    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }

    /// Whether the user may sign in
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Name for display, falling back to the email address
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }

    /// Creates a user
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The email already exists (unique constraint violation)
    /// - The tenant or department doesn't exist (foreign key violation)
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO users (tenant_id, department_id, email, name, role, status, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(data.tenant_id)
            .bind(data.department_id)
            .bind(data.email)
            .bind(data.name)
            .bind(data.role)
            .bind(data.status.as_str())
            .bind(data.password_hash)
            .fetch_one(pool)
            .await
    }

    /// Finds a user by ID across tenants
    ///
    /// Only the auth layer uses this, to reload the profile named by a
    /// token's `sub` claim; it then checks the tenant itself.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by ID within a tenant
    pub async fn find_in_tenant(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND tenant_id = $2");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by email (case-insensitive)
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Lists the users visible under a scope, ordered by name then email
    pub async fn list_in_scope(pool: &PgPool, scope: &Scope) -> Result<Vec<Self>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users WHERE "));
        scope.push_user_predicate(&mut qb, "users");
        qb.push(" ORDER BY name ASC NULLS LAST, email ASC");

        qb.build_query_as::<User>().fetch_all(pool).await
    }

    /// Applies an admin profile change
    ///
    /// Returns `None` if the user doesn't exist in the tenant.
    pub async fn update_profile(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
        update: &UpdateProfile,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET updated_at = NOW()");

        if let Some(role) = update.role {
            qb.push(", role = ").push_bind(role.as_str());
        }
        if let Some(department_id) = update.department_id {
            qb.push(", department_id = ").push_bind(department_id);
        }

        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" AND tenant_id = ").push_bind(tenant_id);
        qb.push(format!(" RETURNING {USER_COLUMNS}"));

        qb.build_query_as::<User>().fetch_optional(pool).await
    }

    /// Activates an invited user with its first password
    pub async fn activate(
        pool: &PgPool,
        id: Uuid,
        password_hash: &str,
        name: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE users
            SET status = 'active',
                password_hash = $2,
                name = COALESCE($3, name),
                updated_at = NOW()
            WHERE id = $1 AND status = 'invited'
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(password_hash)
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    /// Replaces the password hash and revokes outstanding sessions
    pub async fn set_password(
        pool: &PgPool,
        id: Uuid,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2,
                session_version = session_version + 1,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Bumps the session version, invalidating every token issued so far
    pub async fn bump_session_version(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET session_version = session_version + 1, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Records a successful sign-in
    pub async fn record_login(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("manager"), Some(Role::Manager));
        assert_eq!(Role::parse("agent"), Some(Role::Agent));
        assert_eq!(Role::parse("Admin"), None);
        assert_eq!(Role::parse("superuser"), None);
    }

    #[test]
    fn test_role_from_str_error() {
        let err = "owner".parse::<Role>().unwrap_err();
        assert_eq!(err.kind, "role");
        assert_eq!(err.value, "owner");
    }

    #[test]
    fn test_user_status_round_trip() {
        for status in [UserStatus::Invited, UserStatus::Active, UserStatus::Deactivated] {
            assert_eq!(UserStatus::try_from(status.to_string()).unwrap(), status);
        }
    }

    #[test]
    fn test_unknown_role_is_preserved() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            department_id: None,
            email: "x@example.com".to_string(),
            name: None,
            role: "auditor".to_string(),
            status: UserStatus::Active,
            password_hash: None,
            session_version: 0,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };

        assert_eq!(user.role, "auditor");
        assert_eq!(user.role(), None);
        assert_eq!(user.display_name(), "x@example.com");
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            department_id: None,
            email: "x@example.com".to_string(),
            name: Some("X".to_string()),
            role: "agent".to_string(),
            status: UserStatus::Active,
            password_hash: Some("$argon2id$secret".to_string()),
            session_version: 0,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["status"], "active");
    }
}

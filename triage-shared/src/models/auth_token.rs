/// Single-use invite and password-reset tokens
///
/// Tokens are random strings handed to the user once; only their SHA-256 hash
/// is stored (see [`crate::auth::token`]). Consuming a token is a single
/// conditional `UPDATE`, so a token can never be redeemed twice.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE temp_auth_users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
///     kind TEXT NOT NULL CHECK (kind IN ('invite', 'password_reset')),
///     token_hash TEXT NOT NULL UNIQUE,
///     expires_at TIMESTAMPTZ NOT NULL,
///     consumed_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::text_enum;

/// What a token may be redeemed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthTokenKind {
    Invite,
    PasswordReset,
}

impl AuthTokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthTokenKind::Invite => "invite",
            AuthTokenKind::PasswordReset => "password_reset",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "invite" => Some(AuthTokenKind::Invite),
            "password_reset" => Some(AuthTokenKind::PasswordReset),
            _ => None,
        }
    }

    /// How long a freshly issued token stays redeemable
    pub fn ttl(&self) -> Duration {
        match self {
            AuthTokenKind::Invite => Duration::days(7),
            AuthTokenKind::PasswordReset => Duration::hours(1),
        }
    }
}

text_enum!(AuthTokenKind, "token kind");

/// Stored token record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuthToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tenant_id: Uuid,

    #[sqlx(try_from = "String")]
    pub kind: AuthTokenKind,

    /// SHA-256 hex digest of the token
    #[serde(skip_serializing)]
    pub token_hash: String,

    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Input for issuing a token
#[derive(Debug, Clone)]
pub struct NewAuthToken {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub kind: AuthTokenKind,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthToken {
    /// Whether the token can still be redeemed at `now`
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        self.consumed_at.is_none() && self.expires_at > now
    }

    /// Stores a token hash
    pub async fn create(pool: &PgPool, data: NewAuthToken) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, AuthToken>(
            r#"
            INSERT INTO temp_auth_users (user_id, tenant_id, kind, token_hash, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, tenant_id, kind, token_hash, expires_at, consumed_at, created_at
            "#,
        )
        .bind(data.user_id)
        .bind(data.tenant_id)
        .bind(data.kind.as_str())
        .bind(data.token_hash)
        .bind(data.expires_at)
        .fetch_one(pool)
        .await
    }

    /// Marks a token consumed if it is unexpired and unused
    ///
    /// Returns `None` when the hash is unknown, of another kind, expired or
    /// already consumed.
    pub async fn consume(
        pool: &PgPool,
        token_hash: &str,
        kind: AuthTokenKind,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, AuthToken>(
            r#"
            UPDATE temp_auth_users
            SET consumed_at = $3
            WHERE token_hash = $1
              AND kind = $2
              AND consumed_at IS NULL
              AND expires_at > $3
            RETURNING id, user_id, tenant_id, kind, token_hash, expires_at, consumed_at, created_at
            "#,
        )
        .bind(token_hash)
        .bind(kind.as_str())
        .bind(now)
        .fetch_optional(pool)
        .await
    }
}

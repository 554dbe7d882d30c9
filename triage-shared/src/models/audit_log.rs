/// Audit log model and database operations
///
/// Audit records are append-only: this module exposes insert and list, and
/// the schema rejects `UPDATE` with a trigger.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE audit_logs (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
///     user_id UUID,
///     user_role TEXT NOT NULL,
///     action TEXT NOT NULL CHECK (action IN ('read', 'write', 'delete')),
///     resource_type TEXT NOT NULL,
///     resource_id TEXT,
///     endpoint TEXT NOT NULL,
///     ip TEXT NOT NULL DEFAULT 'unknown',
///     user_agent TEXT NOT NULL DEFAULT 'unknown',
///     metadata JSONB NOT NULL DEFAULT '{}',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::text_enum;

/// Default page size for audit listings
pub const DEFAULT_AUDIT_LIMIT: i64 = 100;

/// Largest audit page a caller may request
pub const MAX_AUDIT_LIMIT: i64 = 500;

/// Kind of access being recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Read,
    Write,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Read => "read",
            AuditAction::Write => "write",
            AuditAction::Delete => "delete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "read" => Some(AuditAction::Read),
            "write" => Some(AuditAction::Write),
            "delete" => Some(AuditAction::Delete),
            _ => None,
        }
    }
}

text_enum!(AuditAction, "audit action");

/// Stored audit record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditLog {
    pub id: Uuid,
    pub tenant_id: Uuid,

    /// Acting user; `None` for unauthenticated flows
    pub user_id: Option<Uuid>,

    /// Role text as stored on the user at the time of access
    pub user_role: String,

    #[sqlx(try_from = "String")]
    pub action: AuditAction,

    pub resource_type: String,
    pub resource_id: Option<String>,
    pub endpoint: String,
    pub ip: String,
    pub user_agent: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Input for appending an audit record
#[derive(Debug, Clone)]
pub struct NewAuditLog {
    pub tenant_id: Uuid,
    pub user_id: Option<Uuid>,
    pub user_role: String,
    pub action: AuditAction,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub endpoint: String,
    pub ip: String,
    pub user_agent: String,
    pub metadata: serde_json::Value,
}

/// Filters for audit listings
#[derive(Debug, Clone)]
pub struct AuditFilter {
    pub resource_type: Option<String>,
    pub limit: i64,
}

impl Default for AuditFilter {
    fn default() -> Self {
        Self {
            resource_type: None,
            limit: DEFAULT_AUDIT_LIMIT,
        }
    }
}

impl AuditLog {
    /// Appends a record
    pub async fn create(pool: &PgPool, data: NewAuditLog) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, AuditLog>(
            r#"
            INSERT INTO audit_logs (
                tenant_id, user_id, user_role, action, resource_type,
                resource_id, endpoint, ip, user_agent, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, tenant_id, user_id, user_role, action, resource_type,
                      resource_id, endpoint, ip, user_agent, metadata, created_at
            "#,
        )
        .bind(data.tenant_id)
        .bind(data.user_id)
        .bind(data.user_role)
        .bind(data.action.as_str())
        .bind(data.resource_type)
        .bind(data.resource_id)
        .bind(data.endpoint)
        .bind(data.ip)
        .bind(data.user_agent)
        .bind(data.metadata)
        .fetch_one(pool)
        .await
    }

    /// Lists a tenant's audit records, newest first
    pub async fn list_by_tenant(
        pool: &PgPool,
        tenant_id: Uuid,
        filter: &AuditFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT id, tenant_id, user_id, user_role, action, resource_type,
                   resource_id, endpoint, ip, user_agent, metadata, created_at
            FROM audit_logs
            WHERE tenant_id = "#,
        );
        qb.push_bind(tenant_id);

        if let Some(resource_type) = &filter.resource_type {
            qb.push(" AND resource_type = ").push_bind(resource_type.clone());
        }

        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.limit.clamp(1, MAX_AUDIT_LIMIT));

        qb.build_query_as::<AuditLog>().fetch_all(pool).await
    }
}

/// Department model and database operations
///
/// Departments belong to a tenant, group users, and route escalations. A
/// manager's visibility is bounded by their department.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE departments (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
///     name VARCHAR(255) NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (tenant_id, name)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Display value used when an event or user has no department
pub const NO_DEPARTMENT: &str = "No Department";

/// Department model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Department {
    /// Unique department ID
    pub id: Uuid,

    /// Owning tenant
    pub tenant_id: Uuid,

    /// Department name, unique within the tenant
    pub name: String,

    /// When the department was created
    pub created_at: DateTime<Utc>,
}

impl Department {
    /// Creates a department inside a tenant
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A department with the same name exists in the tenant
    /// - The tenant doesn't exist (foreign key violation)
    pub async fn create(pool: &PgPool, tenant_id: Uuid, name: &str) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Department>(
            r#"
            INSERT INTO departments (tenant_id, name)
            VALUES ($1, $2)
            RETURNING id, tenant_id, name, created_at
            "#,
        )
        .bind(tenant_id)
        .bind(name)
        .fetch_one(pool)
        .await
    }

    /// Finds a department by ID, restricted to a tenant
    pub async fn find_in_tenant(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Department>(
            r#"
            SELECT id, tenant_id, name, created_at
            FROM departments
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    /// Lists a tenant's departments alphabetically
    pub async fn list_by_tenant(pool: &PgPool, tenant_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Department>(
            r#"
            SELECT id, tenant_id, name, created_at
            FROM departments
            WHERE tenant_id = $1
            ORDER BY name ASC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(pool)
        .await
    }
}

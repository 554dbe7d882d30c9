#![allow(dead_code)]

/// Common test utilities for integration tests
///
/// Builds the full router over a [`MemoryStore`] and an in-memory change
/// feed, seeded with one tenant:
///
/// - departments Billing and Sales
/// - an admin (no department), a manager in each department, and an agent
///   in Billing
/// - a second tenant with its own admin, for isolation checks
///
/// Requests go through `tower::ServiceExt::oneshot`, so no server or
/// database is needed.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tower::ServiceExt;
use triage_api::app::{build_router, AppState};
use triage_api::config::Config;
use triage_shared::auth::jwt::{create_token, Claims};
use triage_shared::auth::password::hash_password;
use triage_shared::models::audit_log::{AuditFilter, AuditLog};
use triage_shared::models::department::Department;
use triage_shared::models::email_event::{EmailEvent, EventState, NewEmailEvent};
use triage_shared::models::tenant::Tenant;
use triage_shared::models::user::{CreateUser, User, UserStatus};
use triage_shared::realtime::ChangeFeed;
use triage_shared::store::{MemoryStore, Store};
use uuid::Uuid;

pub const JWT_SECRET: &str = "integration-test-secret-at-least-32-bytes";
pub const PASSWORD: &str = "triage-pass-123";

/// Test context containing all necessary resources
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub changes: ChangeFeed,
    pub app: Router,
    pub config: Config,
    pub tenant: Tenant,
    pub billing: Department,
    pub sales: Department,
    pub admin: User,
    pub billing_manager: User,
    pub sales_manager: User,
    pub agent: User,
    pub other_tenant: Tenant,
    pub other_admin: User,
}

/// Response status, headers and parsed JSON body
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_env(&[]).await
    }

    /// Context with extra configuration variables
    pub async fn with_env(extra: &[(&str, &str)]) -> Self {
        let mut vars: HashMap<String, String> = HashMap::new();
        vars.insert("DATABASE_URL".into(), "postgres://unused/triage".into());
        vars.insert("JWT_SECRET".into(), JWT_SECRET.into());
        for (k, v) in extra {
            vars.insert(k.to_string(), v.to_string());
        }
        let config = Config::from_map(&vars).unwrap();

        let store = Arc::new(MemoryStore::new());
        let changes = ChangeFeed::in_memory();

        let tenant = store.create_tenant("Acme Support").await.unwrap();
        let billing = store.create_department(tenant.id, "Billing").await.unwrap();
        let sales = store.create_department(tenant.id, "Sales").await.unwrap();

        let admin = create_user(&store, tenant.id, None, "admin@acme.test", "admin").await;
        let billing_manager = create_user(
            &store,
            tenant.id,
            Some(billing.id),
            "billing.lead@acme.test",
            "manager",
        )
        .await;
        let sales_manager = create_user(
            &store,
            tenant.id,
            Some(sales.id),
            "sales.lead@acme.test",
            "manager",
        )
        .await;
        let agent = create_user(&store, tenant.id, Some(billing.id), "agent@acme.test", "agent").await;

        let other_tenant = store.create_tenant("Globex").await.unwrap();
        let other_admin =
            create_user(&store, other_tenant.id, None, "admin@globex.test", "admin").await;

        let state = AppState::new(store.clone() as Arc<dyn Store>, changes.clone(), config.clone());
        let app = build_router(state);

        TestContext {
            store,
            changes,
            app,
            config,
            tenant,
            billing,
            sales,
            admin,
            billing_manager,
            sales_manager,
            agent,
            other_tenant,
            other_admin,
        }
    }

    /// Session token for a user as currently stored
    pub fn token_for(&self, user: &User) -> String {
        let claims = Claims::new(user.id, user.tenant_id, &user.role, user.session_version);
        create_token(&claims, JWT_SECRET).unwrap()
    }

    /// Inserts an event into the seeded tenant
    pub async fn event(
        &self,
        subject: &str,
        state: EventState,
        department_id: Option<Uuid>,
        assigned_user_id: Option<Uuid>,
        sla_deadline: Option<DateTime<Utc>>,
    ) -> EmailEvent {
        let mut data = NewEmailEvent::new(self.tenant.id, subject);
        data.current_state = state;
        data.department_id = department_id;
        data.assigned_user_id = assigned_user_id;
        data.sla_deadline = sla_deadline;
        data.external_message_id = Some(format!("<{}@mail.test>", Uuid::new_v4()));
        self.store.insert_event(data).await.unwrap()
    }

    /// An escalated event in Billing
    pub async fn billing_escalation(&self) -> EmailEvent {
        self.event(
            "Charged twice",
            EventState::NeedsAttention,
            Some(self.billing.id),
            None,
            None,
        )
        .await
    }

    pub async fn audit_logs(&self) -> Vec<AuditLog> {
        self.store
            .list_audit_logs(self.tenant.id, &AuditFilter::default())
            .await
            .unwrap()
    }

    pub async fn stored_event(&self, id: Uuid) -> EmailEvent {
        self.store
            .find_event(self.tenant.id, id)
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send("GET", uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send("POST", uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send("PATCH", uri, token, Some(body)).await
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("user-agent", "triage-tests/1.0")
            .header("x-forwarded-for", "203.0.113.10, 10.0.0.1");

        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }

        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

/// Creates an active user with [`PASSWORD`]
pub async fn create_user(
    store: &MemoryStore,
    tenant_id: Uuid,
    department_id: Option<Uuid>,
    email: &str,
    role: &str,
) -> User {
    store
        .create_user(CreateUser {
            tenant_id,
            department_id,
            email: email.to_string(),
            name: Some(email.split('@').next().unwrap_or(email).to_string()),
            role: role.to_string(),
            status: UserStatus::Active,
            password_hash: Some(hash_password(PASSWORD).unwrap()),
        })
        .await
        .unwrap()
}

/// IDs of the events in a `{data: [...]}` body
pub fn ids(body: &Value) -> Vec<String> {
    body["data"]
        .as_array()
        .map(|rows| {
            rows.iter()
                .filter_map(|r| r["id"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// Access audit logging
///
/// Every read and write served on a user's behalf records one audit row.
/// [`AuditLogger::log_access`] is awaited before the response goes out but
/// returns `()`: a failed write is logged with `tracing::error!` and
/// dropped, so an audit outage never fails the parent operation. There is
/// no retry queue.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use triage_shared::audit::{AccessRecord, AuditLogger, RequestMeta};
/// use triage_shared::models::audit_log::AuditAction;
/// use triage_shared::store::MemoryStore;
/// use uuid::Uuid;
///
/// # async fn example() {
/// let logger = AuditLogger::new(Arc::new(MemoryStore::new()));
/// let request = RequestMeta::from_headers(Some("203.0.113.7, 10.0.0.1"), None, Some("curl/8"));
///
/// logger
///     .log_access(
///         AccessRecord::new(Uuid::new_v4(), Some(Uuid::new_v4()), "admin", AuditAction::Read)
///             .resource("email_events", None)
///             .endpoint("/api/emails")
///             .request(request),
///     )
///     .await;
/// # }
/// ```

use std::sync::Arc;

use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::context::AuthContext;
use crate::models::audit_log::{AuditAction, NewAuditLog};
use crate::store::Store;

/// Placeholder for request metadata that wasn't supplied
pub const UNKNOWN: &str = "unknown";

/// Caller network metadata captured with each audit row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMeta {
    pub ip: String,
    pub user_agent: String,
}

impl Default for RequestMeta {
    fn default() -> Self {
        Self {
            ip: UNKNOWN.to_string(),
            user_agent: UNKNOWN.to_string(),
        }
    }
}

impl RequestMeta {
    /// Builds metadata from raw header values
    ///
    /// The IP is the first hop of `X-Forwarded-For`, then `X-Real-IP`, then
    /// `"unknown"`. Blank values count as absent.
    pub fn from_headers(
        forwarded_for: Option<&str>,
        real_ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> Self {
        let first_hop = forwarded_for
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        let ip = first_hop
            .or_else(|| real_ip.map(str::trim).filter(|v| !v.is_empty()))
            .unwrap_or(UNKNOWN);

        let user_agent = user_agent
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(UNKNOWN);

        Self {
            ip: ip.to_string(),
            user_agent: user_agent.to_string(),
        }
    }
}

/// One access to record
#[derive(Debug, Clone)]
pub struct AccessRecord {
    pub tenant_id: Uuid,
    pub user_id: Option<Uuid>,
    pub user_role: String,
    pub action: AuditAction,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub endpoint: String,
    pub metadata: Value,
    pub request: RequestMeta,
}

impl AccessRecord {
    pub fn new(
        tenant_id: Uuid,
        user_id: Option<Uuid>,
        user_role: impl Into<String>,
        action: AuditAction,
    ) -> Self {
        Self {
            tenant_id,
            user_id,
            user_role: user_role.into(),
            action,
            resource_type: String::new(),
            resource_id: None,
            endpoint: String::new(),
            metadata: json!({}),
            request: RequestMeta::default(),
        }
    }

    /// Record for an authenticated caller
    pub fn for_caller(auth: &AuthContext, action: AuditAction) -> Self {
        Self::new(auth.tenant_id, Some(auth.user_id), auth.role_text.clone(), action)
    }

    pub fn resource(mut self, resource_type: impl Into<String>, resource_id: Option<String>) -> Self {
        self.resource_type = resource_type.into();
        self.resource_id = resource_id;
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn request(mut self, request: RequestMeta) -> Self {
        self.request = request;
        self
    }
}

/// Records accesses through the store; never fails
#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn Store>,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Writes one audit row, swallowing any failure
    pub async fn log_access(&self, record: AccessRecord) {
        let entry = NewAuditLog {
            tenant_id: record.tenant_id,
            user_id: record.user_id,
            user_role: record.user_role,
            action: record.action,
            resource_type: record.resource_type,
            resource_id: record.resource_id,
            endpoint: record.endpoint,
            ip: record.request.ip,
            user_agent: record.request.user_agent,
            metadata: record.metadata,
        };

        let (tenant_id, endpoint) = (entry.tenant_id, entry.endpoint.clone());

        if let Err(e) = self.store.append_audit_log(entry).await {
            tracing::error!(
                tenant_id = %tenant_id,
                endpoint = %endpoint,
                error = %e,
                "Failed to write audit log"
            );
        }
    }
}

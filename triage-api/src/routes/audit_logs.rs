/// Audit trail
///
/// `GET /api/audit-logs?resource_type=email_events&limit=50` lists the
/// tenant's audit records, newest first. Admins only. The read is itself
/// audited, after the listing is taken.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{Caller, RequestInfo},
    routes::{access, data, DataResponse},
};
use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use triage_shared::{
    auth::authorization::{require_action, Action},
    models::audit_log::{AuditAction, AuditFilter, AuditLog, DEFAULT_AUDIT_LIMIT, MAX_AUDIT_LIMIT},
};

#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    pub resource_type: Option<String>,
    pub limit: Option<String>,
}

impl AuditQuery {
    pub fn to_filter(&self) -> ApiResult<AuditFilter> {
        let limit = match self.limit.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|l| *l > 0)
                .ok_or_else(|| {
                    ApiError::BadRequest("limit must be a positive integer".to_string())
                })?
                .min(MAX_AUDIT_LIMIT),
            None => DEFAULT_AUDIT_LIMIT,
        };

        Ok(AuditFilter {
            resource_type: self
                .resource_type
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
            limit,
        })
    }
}

pub async fn list_audit_logs(
    State(state): State<AppState>,
    Caller(auth): Caller,
    info: RequestInfo,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<DataResponse<Vec<AuditLog>>>> {
    require_action(&auth, Action::ReadAuditLogs)?;
    let filter = query.to_filter()?;

    let logs = state.store.list_audit_logs(auth.tenant_id, &filter).await?;

    state
        .audit
        .log_access(
            access(&auth, AuditAction::Read, &info)
                .resource("audit_logs", None)
                .metadata(json!({
                    "resource_type": filter.resource_type,
                    "count": logs.len(),
                })),
        )
        .await;

    Ok(data(logs))
}

/// Dashboard counters
///
/// `GET /api/dashboard` answers every role with counts over the rows it
/// can see. Breach counters only consider open escalations.
///
/// ```json
/// {
///   "data": {
///     "role": "manager",
///     "scope": { "kind": "department", "tenant_id": "uuid", "department_id": "uuid" },
///     "counts": { "total": 42, "escalations": 5, "pending_resolution": 1,
///                 "handled": 30, "breached": 1, "breach_risk": 2 }
///   }
/// }
/// ```

use crate::{
    app::AppState,
    error::ApiResult,
    extract::{Caller, RequestInfo},
    routes::{access, data, DataResponse},
};
use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;
use triage_shared::{
    auth::{
        authorization::{require_action, require_scope, Action},
        scope::Scope,
    },
    models::{audit_log::AuditAction, email_event::EventCounts},
};

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub role: String,
    pub scope: Scope,
    pub counts: EventCounts,
}

pub async fn dashboard(
    State(state): State<AppState>,
    Caller(auth): Caller,
    info: RequestInfo,
) -> ApiResult<Json<DataResponse<DashboardResponse>>> {
    require_action(&auth, Action::ViewDashboard)?;
    let scope = require_scope(&auth)?;

    let counts = state
        .store
        .count_events(&scope, Utc::now(), state.lifecycle().breach_risk_window)
        .await?;

    state
        .audit
        .log_access(access(&auth, AuditAction::Read, &info).resource("dashboard", None))
        .await;

    Ok(data(DashboardResponse {
        role: auth.role_text,
        scope,
        counts,
    }))
}

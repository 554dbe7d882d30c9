/// API route handlers
///
/// Organized by resource:
///
/// - `health`: Health check
/// - `auth`: Sign-in, sign-out, password and invite flows
/// - `escalations`: Escalation queue and lifecycle actions
/// - `emails`: Scoped event listing and human resolve
/// - `team`: Users in the caller's scope
/// - `users`: Profile changes and invitations
/// - `departments`: Department listing and creation
/// - `dashboard`: Role-scoped counters
/// - `audit_logs`: Audit trail for admins
///
/// Successful responses wrap their payload as `{"data": ...}`.

pub mod audit_logs;
pub mod auth;
pub mod dashboard;
pub mod departments;
pub mod emails;
pub mod escalations;
pub mod health;
pub mod team;
pub mod users;

use axum::Json;
use serde::Serialize;
use triage_shared::audit::AccessRecord;
use triage_shared::auth::context::AuthContext;
use triage_shared::models::audit_log::AuditAction;

use crate::error::ApiError;
use crate::extract::RequestInfo;

/// Success envelope
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

pub fn data<T: Serialize>(data: T) -> Json<DataResponse<T>> {
    Json(DataResponse { data })
}

/// Audit record for the caller, stamped with endpoint and request metadata
pub(crate) fn access(auth: &AuthContext, action: AuditAction, info: &RequestInfo) -> AccessRecord {
    AccessRecord::for_caller(auth, action)
        .endpoint(info.endpoint.clone())
        .request(info.meta.clone())
}

/// Runs `validator` rules on a request body
pub(crate) fn validate<T: validator::Validate>(req: &T) -> Result<(), ApiError> {
    req.validate().map_err(ApiError::from)
}

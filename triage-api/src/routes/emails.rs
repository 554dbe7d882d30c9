/// Email event endpoints
///
/// # Endpoints
///
/// - `GET  /api/emails` - Events in the caller's scope
/// - `POST /api/emails/events/:id/resolve` - Resolve an event as handled by a human
///
/// Every role may use both, within its scope: admins see the tenant,
/// managers their department, agents only what is assigned to them.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{Caller, RequestInfo},
    routes::{access, data, escalations::commit, DataResponse},
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use triage_shared::{
    auth::authorization::{require_action, require_scope, Action, AuthzError},
    escalation::{EscalationAction, Transition},
    models::{
        audit_log::AuditAction,
        email_event::{EmailEvent, EventFilter, EventState, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT},
    },
    realtime::{Change, ChangeOp},
};
use uuid::Uuid;

/// Query string for `GET /api/emails`
///
/// Kept as text so malformed values produce the API's own 400 body.
#[derive(Debug, Default, Deserialize)]
pub struct EmailQuery {
    pub state: Option<String>,
    pub limit: Option<String>,
}

impl EmailQuery {
    pub fn to_filter(&self) -> ApiResult<EventFilter> {
        let state = match self.state.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(
                EventState::parse(raw)
                    .ok_or_else(|| ApiError::BadRequest(format!("Unknown state '{}'", raw)))?,
            ),
            None => None,
        };

        let limit = match self.limit.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|l| *l > 0)
                .ok_or_else(|| {
                    ApiError::BadRequest("limit must be a positive integer".to_string())
                })?
                .min(MAX_LIST_LIMIT),
            None => DEFAULT_LIST_LIMIT,
        };

        Ok(EventFilter { state, limit })
    }
}

/// List email events
///
/// # Endpoint
///
/// ```text
/// GET /api/emails?state=needs_attention&limit=50
/// Authorization: Bearer <token>
/// ```
///
/// `limit` defaults to 100 and is capped at 500. Events come back newest
/// first.
///
/// # Errors
///
/// - `400 Bad Request`: Unknown state or bad limit
/// - `403 Forbidden`: Unknown role, or a manager without a department
pub async fn list_emails(
    State(state): State<AppState>,
    Caller(auth): Caller,
    info: RequestInfo,
    Query(query): Query<EmailQuery>,
) -> ApiResult<Json<DataResponse<Vec<EmailEvent>>>> {
    require_action(&auth, Action::ReadEmails)?;
    let scope = require_scope(&auth)?;
    let filter = query.to_filter()?;

    let events = state.store.list_events(&scope, &filter).await?;

    state
        .audit
        .log_access(
            access(&auth, AuditAction::Read, &info)
                .resource("email_events", None)
                .metadata(json!({
                    "state": filter.state,
                    "limit": filter.limit,
                    "count": events.len(),
                })),
        )
        .await;

    Ok(data(events))
}

/// Resolve an event
///
/// Marks the event handled by a human and clears the pending-resolution
/// flag. Resolving an already handled event succeeds without changes.
///
/// # Errors
///
/// - `400 Bad Request`: Malformed event ID
/// - `403 Forbidden`: Event outside the caller's scope
/// - `404 Not Found`: No such event in the tenant
/// - `409 Conflict`: The event changed and can no longer be resolved
pub async fn resolve_event(
    State(state): State<AppState>,
    Caller(auth): Caller,
    info: RequestInfo,
    Path(id): Path<String>,
) -> ApiResult<Json<DataResponse<EmailEvent>>> {
    require_action(&auth, Action::Resolve)?;
    let scope = require_scope(&auth)?;

    let event_id = Uuid::parse_str(id.trim())
        .map_err(|_| ApiError::BadRequest("Event ID must be a UUID".to_string()))?;

    let event = state
        .store
        .find_event(auth.tenant_id, event_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Event not found".to_string()))?;

    if !scope.matches_event(&event) {
        return Err(AuthzError::OutOfScope.into());
    }

    let action = EscalationAction::Resolve { note: None };
    let (transition, resolved) = commit(&state, &scope, &action, event, Utc::now()).await?;

    state
        .audit
        .log_access(
            access(&auth, AuditAction::Write, &info)
                .resource("email_events", Some(resolved.id.to_string()))
                .metadata(action.audit_metadata(&transition)),
        )
        .await;

    if let Transition::Apply(_) = transition {
        state
            .changes
            .publish(Change::email_event(resolved.tenant_id, resolved.id, ChangeOp::Update))
            .await;
    }

    Ok(data(resolved))
}

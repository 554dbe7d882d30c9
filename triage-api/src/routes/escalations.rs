/// Escalation endpoints
///
/// # Endpoints
///
/// - `GET  /api/escalations` - Escalation queue in the caller's scope
/// - `POST /api/escalations/actions` - Apply a lifecycle action to one event
///
/// Both require the admin or manager role. Managers are confined to their
/// department: they only see its events and can only act on them.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, Caller, RequestInfo},
    routes::{access, data, DataResponse},
};
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use triage_shared::{
    auth::{
        authorization::{require_action, require_scope, Action, AuthzError},
        context::AuthContext,
        scope::Scope,
    },
    escalation::{view::EscalationView, EscalationAction, EscalationError, Transition},
    models::{audit_log::AuditAction, email_event::EmailEvent},
    realtime::{Change, ChangeOp},
};
use uuid::Uuid;

/// Lifecycle action request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub action: String,

    pub event_id: String,

    /// Action-specific fields; may be omitted for actions without any
    #[serde(default)]
    pub payload: Value,
}

/// List escalations
///
/// # Endpoint
///
/// ```text
/// GET /api/escalations
/// Authorization: Bearer <token>
/// ```
///
/// # Response
///
/// Events in `needs_attention` or `escalated`, newest first, each with
/// `assignee_name`, `department_name` and `sla_status`:
///
/// ```json
/// {
///   "data": [
///     {
///       "id": "uuid",
///       "subject": "Refund not received",
///       "current_state": "needs_attention",
///       "sla_deadline": "2025-01-01T10:00:00Z",
///       "assignee_name": "Unassigned",
///       "department_name": "Billing",
///       "sla_status": "Breach Risk"
///     }
///   ]
/// }
/// ```
///
/// # Errors
///
/// - `403 Forbidden`: Agents, unknown roles, managers without a department
pub async fn list_escalations(
    State(state): State<AppState>,
    Caller(auth): Caller,
    info: RequestInfo,
) -> ApiResult<Json<DataResponse<Vec<EscalationView>>>> {
    require_action(&auth, Action::ViewEscalations)?;
    let scope = require_scope(&auth)?;

    let rows = state.store.list_escalations(&scope).await?;

    let now = Utc::now();
    let window = state.lifecycle().breach_risk_window;
    let views: Vec<EscalationView> = rows
        .into_iter()
        .map(|row| EscalationView::from_row(row, now, window))
        .collect();

    state
        .audit
        .log_access(
            access(&auth, AuditAction::Read, &info)
                .resource("email_events", None)
                .metadata(json!({ "view": "escalations", "count": views.len() })),
        )
        .await;

    Ok(data(views))
}

/// Apply a lifecycle action
///
/// # Endpoint
///
/// ```text
/// POST /api/escalations/actions
/// Authorization: Bearer <token>
///
/// { "action": "snooze", "eventId": "uuid", "payload": { "minutes": 30 } }
/// ```
///
/// Actions and payloads:
///
/// | action                | payload                                  |
/// |-----------------------|------------------------------------------|
/// | `assign`              | `assigneeId`                             |
/// | `escalate_department` | `departmentId`                           |
/// | `ai_override`         | `escalationReason` and/or `priority`     |
/// | `snooze`              | `minutes` or `until` (RFC 3339)          |
/// | `false_escalation`    | optional `note`                          |
/// | `resolve`             | optional `note`                          |
/// | `pending_resolution`  | none                                     |
///
/// # Response
///
/// ```json
/// { "data": [ { "id": "uuid", "assigned_user_id": "uuid", ... } ] }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Unknown action, missing or malformed payload field,
///   assignee or department that doesn't exist in the tenant
/// - `403 Forbidden`: Role may not perform the action, or the event is
///   outside the caller's department
/// - `404 Not Found`: No such event in the tenant
/// - `409 Conflict`: Routing a handled event, or snooze limit reached,
///   including when either happens between the read and the write
pub async fn apply_action(
    State(state): State<AppState>,
    Caller(auth): Caller,
    info: RequestInfo,
    ApiJson(req): ApiJson<ActionRequest>,
) -> ApiResult<Json<DataResponse<Vec<EmailEvent>>>> {
    require_action(&auth, Action::ViewEscalations)?;

    let event_id = Uuid::parse_str(req.event_id.trim()).map_err(|_| {
        ApiError::from(EscalationError::InvalidField {
            field: "eventId",
            reason: "must be a UUID".to_string(),
        })
    })?;

    let action = EscalationAction::parse(req.action.trim(), &req.payload)?;

    require_action(&auth, action.required_action())?;
    let scope = require_scope(&auth)?;

    let event = state
        .store
        .find_event(auth.tenant_id, event_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Event not found".to_string()))?;

    if !scope.matches_event(&event) {
        tracing::warn!(
            user_id = %auth.user_id,
            event_id = %event.id,
            "Escalation action outside caller scope"
        );
        return Err(AuthzError::OutOfScope.into());
    }

    check_references(&state, &auth, &scope, &action).await?;

    let (transition, updated) = commit(&state, &scope, &action, event, Utc::now()).await?;

    state
        .audit
        .log_access(
            access(&auth, AuditAction::Write, &info)
                .resource("email_events", Some(updated.id.to_string()))
                .metadata(action.audit_metadata(&transition)),
        )
        .await;

    if let Transition::Apply(_) = transition {
        state
            .changes
            .publish(Change::email_event(updated.tenant_id, updated.id, ChangeOp::Update))
            .await;
    }

    tracing::info!(
        user_id = %auth.user_id,
        event_id = %updated.id,
        action = action.name(),
        state = %updated.current_state,
        "Escalation action applied"
    );

    Ok(data(vec![updated]))
}

/// Plans `action` against `event` and writes the result
///
/// The store refuses a patch whose preconditions no longer hold on the row.
/// In that case the fresh row is planned once more: a terminal action on a
/// row handled in the meantime becomes a no-op, anything else is a 409.
pub(crate) async fn commit(
    state: &AppState,
    scope: &Scope,
    action: &EscalationAction,
    event: EmailEvent,
    now: DateTime<Utc>,
) -> ApiResult<(Transition, EmailEvent)> {
    let policy = state.lifecycle();
    let patch = match action.plan(&event, now, &policy)? {
        Transition::Apply(patch) => patch,
        Transition::NoOp => return Ok((Transition::NoOp, event)),
    };

    if let Some(updated) = state.store.update_event(scope, event.id, &patch).await? {
        return Ok((Transition::Apply(patch), updated));
    }

    let current = state
        .store
        .find_event(event.tenant_id, event.id)
        .await?
        .filter(|e| scope.matches_event(e))
        .ok_or_else(|| ApiError::NotFound("Event not found".to_string()))?;

    tracing::info!(
        event_id = %current.id,
        action = action.name(),
        state = %current.current_state,
        "Event changed before the action was written"
    );

    match action.plan(&current, now, &policy)? {
        Transition::NoOp => Ok((Transition::NoOp, current)),
        Transition::Apply(_) => Err(ApiError::Conflict(
            "Event changed while the action was applied".to_string(),
        )),
    }
}

/// Checks that an action's referenced assignee or department is usable
async fn check_references(
    state: &AppState,
    auth: &AuthContext,
    scope: &Scope,
    action: &EscalationAction,
) -> ApiResult<()> {
    match action {
        EscalationAction::Assign { assignee_id } => {
            let assignee = state
                .store
                .find_user_in_tenant(auth.tenant_id, *assignee_id)
                .await?
                .filter(|u| u.is_active())
                .ok_or_else(|| {
                    ApiError::from(EscalationError::InvalidField {
                        field: "assigneeId",
                        reason: "no active user with this ID".to_string(),
                    })
                })?;

            if let Scope::Department { department_id, .. } = scope {
                if assignee.department_id != Some(*department_id) {
                    return Err(AuthzError::OutOfScope.into());
                }
            }
        }
        EscalationAction::EscalateDepartment { department_id } => {
            state
                .store
                .find_department(auth.tenant_id, *department_id)
                .await?
                .ok_or_else(|| {
                    ApiError::from(EscalationError::InvalidField {
                        field: "departmentId",
                        reason: "no department with this ID".to_string(),
                    })
                })?;
        }
        _ => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::collections::HashMap;
    use std::sync::Arc;
    use triage_shared::escalation::SnoozeTarget;
    use triage_shared::models::email_event::{EventState, NewEmailEvent};
    use triage_shared::realtime::ChangeFeed;
    use triage_shared::store::{MemoryStore, Store};

    async fn state_with(max_snoozes: &str) -> (AppState, Scope, EmailEvent) {
        let vars: HashMap<String, String> = [
            ("DATABASE_URL", "postgres://unused/triage"),
            ("JWT_SECRET", "unit-test-secret-at-least-32-bytes-long"),
            ("MAX_SNOOZES", max_snoozes),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let store = Arc::new(MemoryStore::new());
        let tenant = store.create_tenant("Acme").await.unwrap();
        let mut new = NewEmailEvent::new(tenant.id, "Refund");
        new.current_state = EventState::NeedsAttention;
        let event = store.insert_event(new).await.unwrap();

        let state = AppState::new(
            store as Arc<dyn Store>,
            ChangeFeed::Disabled,
            Config::from_map(&vars).unwrap(),
        );
        (state, Scope::Tenant { tenant_id: tenant.id }, event)
    }

    #[tokio::test]
    async fn test_commit_replans_after_concurrent_resolve() {
        let (state, scope, stale) = state_with("5").await;
        let now = Utc::now();

        let resolve = EscalationAction::Resolve { note: None };

        let (first, resolved) = commit(&state, &scope, &resolve, stale.clone(), now)
            .await
            .unwrap();
        assert!(matches!(first, Transition::Apply(_)));
        assert_eq!(resolved.current_state, EventState::Handled);

        let assign = EscalationAction::Assign {
            assignee_id: Uuid::new_v4(),
        };
        let err = commit(&state, &scope, &assign, stale.clone(), now).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        // A second resolve from the same stale read settles as a no-op
        let (second, current) = commit(&state, &scope, &resolve, stale, now).await.unwrap();
        assert_eq!(second, Transition::NoOp);
        assert_eq!(current.resolved_at, resolved.resolved_at);
        assert_eq!(current.assigned_user_id, None);
    }

    #[tokio::test]
    async fn test_commit_enforces_snooze_cap_on_stale_read() {
        let (state, scope, stale) = state_with("1").await;
        let snooze = EscalationAction::Snooze {
            target: SnoozeTarget::Minutes(15),
        };

        commit(&state, &scope, &snooze, stale.clone(), Utc::now()).await.unwrap();
        let err = commit(&state, &scope, &snooze, stale.clone(), Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);

        let stored = state
            .store
            .find_event(stale.tenant_id, stale.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.snooze_count, 1);
    }

    #[test]
    fn test_action_request_payload_defaults_to_null() {
        let req: ActionRequest =
            serde_json::from_value(json!({ "action": "resolve", "eventId": "x" })).unwrap();
        assert_eq!(req.payload, Value::Null);
        assert_eq!(req.event_id, "x");
    }

    #[test]
    fn test_action_request_requires_action() {
        assert!(serde_json::from_value::<ActionRequest>(json!({ "eventId": "x" })).is_err());
    }
}

/// Team listing
///
/// `GET /api/team` returns the users in the caller's scope: the whole
/// tenant for admins, the department for managers. Agents are refused.

use crate::{
    app::AppState,
    error::ApiResult,
    extract::{Caller, RequestInfo},
    routes::{access, data, DataResponse},
};
use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use triage_shared::{
    auth::authorization::{require_action, require_scope, Action},
    models::{audit_log::AuditAction, department::NO_DEPARTMENT, user::User},
};
use uuid::Uuid;

/// User with its department name resolved
#[derive(Debug, Serialize)]
pub struct TeamMember {
    #[serde(flatten)]
    pub user: User,
    pub department_name: String,
}

pub async fn list_team(
    State(state): State<AppState>,
    Caller(auth): Caller,
    info: RequestInfo,
) -> ApiResult<Json<DataResponse<Vec<TeamMember>>>> {
    require_action(&auth, Action::ViewTeam)?;
    let scope = require_scope(&auth)?;

    let users = state.store.list_users(&scope).await?;
    let names: HashMap<Uuid, String> = state
        .store
        .list_departments(auth.tenant_id)
        .await?
        .into_iter()
        .map(|d| (d.id, d.name))
        .collect();

    let members: Vec<TeamMember> = users
        .into_iter()
        .map(|user| TeamMember {
            department_name: user
                .department_id
                .and_then(|id| names.get(&id).cloned())
                .unwrap_or_else(|| NO_DEPARTMENT.to_string()),
            user,
        })
        .collect();

    state
        .audit
        .log_access(
            access(&auth, AuditAction::Read, &info)
                .resource("users", None)
                .metadata(json!({ "count": members.len() })),
        )
        .await;

    Ok(data(members))
}

/// User management endpoints
///
/// # Endpoints
///
/// - `PATCH /api/users/:id` - Change a user's role or department (admins)
/// - `POST  /api/users/invite` - Invite a user into the tenant
///
/// A role change takes effect immediately: the user's existing sessions
/// are answered with `401 role_changed` until they sign in again.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, Caller, RequestInfo},
    routes::{access, data, validate, DataResponse},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use triage_shared::{
    auth::{
        authorization::{require_action, require_invite, Action, AuthzError},
        token::generate_token,
    },
    models::{
        audit_log::AuditAction,
        auth_token::{AuthTokenKind, NewAuthToken},
        user::{CreateUser, Role, UpdateProfile, User, UserStatus},
    },
    realtime::{Change, ChangeOp},
};
use uuid::Uuid;
use validator::Validate;

/// Profile change request
///
/// `departmentId: null` clears the department; omitting it leaves the
/// department unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub role: Option<String>,

    #[serde(default, deserialize_with = "present")]
    pub department_id: Option<Option<Uuid>>,
}

/// Distinguishes an explicit `null` from an absent field
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Invitation request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InviteRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub role: String,

    pub department_id: Option<Uuid>,

    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
}

/// Created invitation
///
/// The token is shown once; only its hash is stored.
#[derive(Debug, Serialize)]
pub struct InviteResponse {
    pub user: User,
    pub invite_token: String,
    pub invite_expires_at: DateTime<Utc>,
}

/// Change a user's role or department
///
/// # Endpoint
///
/// ```text
/// PATCH /api/users/:id
/// Authorization: Bearer <token>
///
/// { "role": "manager", "departmentId": "uuid" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Empty update, unknown role, unknown department
/// - `403 Forbidden`: Caller isn't an admin, or an admin changing its own role
/// - `404 Not Found`: No such user in the tenant
pub async fn update_user(
    State(state): State<AppState>,
    Caller(auth): Caller,
    info: RequestInfo,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> ApiResult<Json<DataResponse<User>>> {
    let user_id = Uuid::parse_str(id.trim())
        .map_err(|_| ApiError::BadRequest("User ID must be a UUID".to_string()))?;

    let update = UpdateProfile {
        role: req
            .role
            .as_deref()
            .map(|raw| {
                Role::parse(raw.trim())
                    .ok_or_else(|| ApiError::BadRequest(format!("Unknown role '{}'", raw)))
            })
            .transpose()?,
        department_id: req.department_id,
    };

    if update.is_empty() {
        return Err(ApiError::BadRequest(
            "Provide role or departmentId to update".to_string(),
        ));
    }

    if update.role.is_some() {
        require_action(&auth, Action::ChangeRole)?;
        if user_id == auth.user_id {
            return Err(ApiError::Forbidden(
                "Admins cannot change their own role".to_string(),
            ));
        }
    }
    if update.department_id.is_some() {
        require_action(&auth, Action::ChangeDepartment)?;
    }

    if let Some(Some(department_id)) = update.department_id {
        state
            .store
            .find_department(auth.tenant_id, department_id)
            .await?
            .ok_or_else(|| ApiError::BadRequest("Department not found".to_string()))?;
    }

    let user = state
        .store
        .update_user_profile(auth.tenant_id, user_id, &update)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    state
        .audit
        .log_access(
            access(&auth, AuditAction::Write, &info)
                .resource("users", Some(user.id.to_string()))
                .metadata(json!({
                    "role": update.role,
                    "departmentId": update.department_id,
                })),
        )
        .await;

    state
        .changes
        .publish(Change::user(user.tenant_id, user.id, ChangeOp::Update))
        .await;

    tracing::info!(
        actor = %auth.user_id,
        user_id = %user.id,
        role = %user.role,
        "User profile updated"
    );

    Ok(data(user))
}

/// Invite a user
///
/// # Endpoint
///
/// ```text
/// POST /api/users/invite
/// Authorization: Bearer <token>
///
/// { "email": "new.agent@acme.test", "role": "agent", "departmentId": "uuid" }
/// ```
///
/// Creates the user in `invited` status and returns a one-time invite
/// token, valid for seven days, to redeem at `/api/auth/accept-invite`.
///
/// # Errors
///
/// - `400 Bad Request`: Unknown role or department, manager without department
/// - `403 Forbidden`: Agents; managers inviting admins or outside their department
/// - `409 Conflict`: Email already registered
pub async fn invite_user(
    State(state): State<AppState>,
    Caller(auth): Caller,
    info: RequestInfo,
    ApiJson(req): ApiJson<InviteRequest>,
) -> ApiResult<(StatusCode, Json<DataResponse<InviteResponse>>)> {
    require_action(&auth, Action::InviteUser)?;
    validate(&req)?;

    let role = Role::parse(req.role.trim())
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown role '{}'", req.role)))?;

    require_invite(&auth, role, req.department_id).map_err(|e| match e {
        AuthzError::OutOfScope => {
            ApiError::Forbidden("Managers can only invite into their own department".to_string())
        }
        other => other.into(),
    })?;

    if role == Role::Manager && req.department_id.is_none() {
        return Err(ApiError::BadRequest("Managers need a department".to_string()));
    }

    if let Some(department_id) = req.department_id {
        state
            .store
            .find_department(auth.tenant_id, department_id)
            .await?
            .ok_or_else(|| ApiError::BadRequest("Department not found".to_string()))?;
    }

    let user = state
        .store
        .create_user(CreateUser {
            tenant_id: auth.tenant_id,
            department_id: req.department_id,
            email: req.email.trim().to_string(),
            name: req.name.clone(),
            role: role.as_str().to_string(),
            status: UserStatus::Invited,
            password_hash: None,
        })
        .await?;

    let (invite_token, token_hash) = generate_token(AuthTokenKind::Invite);
    let token = state
        .store
        .create_auth_token(NewAuthToken {
            user_id: user.id,
            tenant_id: user.tenant_id,
            kind: AuthTokenKind::Invite,
            token_hash,
            expires_at: Utc::now() + AuthTokenKind::Invite.ttl(),
        })
        .await?;

    state
        .audit
        .log_access(
            access(&auth, AuditAction::Write, &info)
                .resource("users", Some(user.id.to_string()))
                .metadata(json!({
                    "event": "invite",
                    "role": role,
                    "departmentId": user.department_id,
                })),
        )
        .await;

    state
        .changes
        .publish(Change::user(user.tenant_id, user.id, ChangeOp::Insert))
        .await;

    tracing::info!(actor = %auth.user_id, user_id = %user.id, role = %role, "User invited");

    Ok((
        StatusCode::CREATED,
        data(InviteResponse {
            user,
            invite_token,
            invite_expires_at: token.expires_at,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_distinguishes_null_from_absent() {
        let absent: UpdateUserRequest = serde_json::from_value(json!({ "role": "agent" })).unwrap();
        assert_eq!(absent.department_id, None);

        let cleared: UpdateUserRequest =
            serde_json::from_value(json!({ "departmentId": null })).unwrap();
        assert_eq!(cleared.department_id, Some(None));

        let id = Uuid::new_v4();
        let set: UpdateUserRequest =
            serde_json::from_value(json!({ "departmentId": id.to_string() })).unwrap();
        assert_eq!(set.department_id, Some(Some(id)));
    }

    #[test]
    fn test_invite_request_camel_case() {
        let id = Uuid::new_v4();
        let req: InviteRequest = serde_json::from_value(json!({
            "email": "new@acme.test",
            "role": "agent",
            "departmentId": id,
        }))
        .unwrap();

        assert_eq!(req.department_id, Some(id));
        assert!(req.validate().is_ok());
    }
}

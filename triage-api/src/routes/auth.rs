/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /api/auth/login` - Sign in with email and password
/// - `POST /api/auth/logout` - Revoke every outstanding session token
/// - `POST /api/auth/forgot-password` - Issue a password reset token
/// - `POST /api/auth/reset-password` - Redeem a reset token
/// - `POST /api/auth/accept-invite` - Redeem an invite token and activate
/// - `POST /api/auth/update-password` - Change password while signed in
/// - `GET  /api/auth/post-login` - Profile and landing page for the UI
///
/// Sessions are HS256 tokens carrying the user's role and session version.
/// Signing out or changing the password bumps the version, which the auth
/// layer checks on every request.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
    extract::{ApiJson, Caller, RequestInfo},
    routes::{access, data, validate, DataResponse},
};
use axum::{extract::State, Json};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use triage_shared::{
    audit::AccessRecord,
    auth::{
        jwt::{self, Claims},
        password,
        token::{generate_token, hash_token},
    },
    models::{
        audit_log::AuditAction,
        auth_token::{AuthTokenKind, NewAuthToken},
        user::{Role, User},
    },
    realtime::{Change, ChangeOp},
};
use validator::Validate;

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Issued session
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct ForgotPasswordResponse {
    pub message: &'static str,

    /// Returned outside production so the token can be delivered by hand
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,

    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AcceptInviteRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,

    pub password: String,

    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    pub new_password: String,
}

/// Where the UI should send a freshly signed-in user
#[derive(Debug, Serialize)]
pub struct PostLoginResponse {
    pub user: User,
    pub redirect_to: &'static str,
}

/// Sign in
///
/// # Endpoint
///
/// ```text
/// POST /api/auth/login
///
/// { "email": "admin@acme.test", "password": "..." }
/// ```
///
/// # Response
///
/// ```json
/// { "data": { "access_token": "eyJ...", "token_type": "Bearer", "expires_at": "...", "user": { ... } } }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Unknown email, wrong password or inactive account
/// - `422 Unprocessable Entity`: Validation failed
pub async fn login(
    State(state): State<AppState>,
    info: RequestInfo,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<DataResponse<SessionResponse>>> {
    validate(&req)?;

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = state
        .store
        .find_user_by_email(&req.email)
        .await?
        .ok_or_else(invalid)?;

    let hash = user.password_hash.as_deref().ok_or_else(invalid)?;
    if !password::verify_password(&req.password, hash)? {
        tracing::info!(user_id = %user.id, "Failed sign-in attempt");
        return Err(invalid());
    }

    if !user.is_active() {
        return Err(ApiError::Unauthorized("Account is not active".to_string()));
    }

    state.store.record_login(user.id).await?;

    state
        .audit
        .log_access(
            AccessRecord::new(user.tenant_id, Some(user.id), user.role.clone(), AuditAction::Write)
                .resource("auth_sessions", Some(user.id.to_string()))
                .endpoint(info.endpoint)
                .metadata(json!({ "event": "login" }))
                .request(info.meta),
        )
        .await;

    tracing::info!(user_id = %user.id, tenant_id = %user.tenant_id, "User signed in");

    Ok(data(issue_session(&state, user)?))
}

/// Sign out everywhere
///
/// Bumps the session version so every token issued so far is rejected.
pub async fn logout(
    State(state): State<AppState>,
    Caller(auth): Caller,
    info: RequestInfo,
) -> ApiResult<Json<DataResponse<serde_json::Value>>> {
    state.store.bump_session_version(auth.user_id).await?;

    state
        .audit
        .log_access(
            access(&auth, AuditAction::Write, &info)
                .resource("auth_sessions", Some(auth.user_id.to_string()))
                .metadata(json!({ "event": "logout" })),
        )
        .await;

    Ok(data(json!({ "signed_out": true })))
}

/// Request a password reset
///
/// Always answers 200 so the endpoint can't be used to discover which accounts exist.
pub async fn forgot_password(
    State(state): State<AppState>,
    info: RequestInfo,
    ApiJson(req): ApiJson<ForgotPasswordRequest>,
) -> ApiResult<Json<DataResponse<ForgotPasswordResponse>>> {
    validate(&req)?;

    let mut reset_token = None;

    if let Some(user) = state
        .store
        .find_user_by_email(&req.email)
        .await?
        .filter(User::is_active)
    {
        let (token, token_hash) = generate_token(AuthTokenKind::PasswordReset);

        let record = state
            .store
            .create_auth_token(NewAuthToken {
                user_id: user.id,
                tenant_id: user.tenant_id,
                kind: AuthTokenKind::PasswordReset,
                token_hash,
                expires_at: Utc::now() + AuthTokenKind::PasswordReset.ttl(),
            })
            .await?;

        state
            .audit
            .log_access(
                AccessRecord::new(user.tenant_id, Some(user.id), user.role.clone(), AuditAction::Write)
                    .resource("temp_auth_users", Some(record.id.to_string()))
                    .endpoint(info.endpoint)
                    .metadata(json!({ "kind": AuthTokenKind::PasswordReset.as_str() }))
                    .request(info.meta),
            )
            .await;

        tracing::info!(user_id = %user.id, expires_at = %record.expires_at, "Password reset token issued");

        if !state.config.api.is_production() {
            reset_token = Some(token);
        }
    }

    Ok(data(ForgotPasswordResponse {
        message: "If the account exists, a reset link has been sent",
        reset_token,
    }))
}

/// Redeem a password reset token
///
/// # Errors
///
/// - `400 Bad Request`: Unknown, expired or already used token
/// - `422 Unprocessable Entity`: Weak password
pub async fn reset_password(
    State(state): State<AppState>,
    info: RequestInfo,
    ApiJson(req): ApiJson<ResetPasswordRequest>,
) -> ApiResult<Json<DataResponse<serde_json::Value>>> {
    validate(&req)?;
    check_strength("password", &req.password)?;

    let token = state
        .store
        .consume_auth_token(&hash_token(&req.token), AuthTokenKind::PasswordReset, Utc::now())
        .await?
        .ok_or_else(|| ApiError::BadRequest("Invalid or expired token".to_string()))?;

    let password_hash = password::hash_password(&req.password)?;
    if !state.store.set_password(token.user_id, &password_hash).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    let role = state
        .store
        .find_user(token.user_id)
        .await?
        .map(|u| u.role)
        .unwrap_or_default();

    state
        .audit
        .log_access(
            AccessRecord::new(token.tenant_id, Some(token.user_id), role, AuditAction::Write)
                .resource("users", Some(token.user_id.to_string()))
                .endpoint(info.endpoint)
                .metadata(json!({ "event": "password_reset" }))
                .request(info.meta),
        )
        .await;

    state
        .changes
        .publish(Change::user(token.tenant_id, token.user_id, ChangeOp::Update))
        .await;

    Ok(data(json!({ "password_reset": true })))
}

/// Accept an invitation
///
/// Sets the first password, marks the account active and signs the user in.
///
/// # Errors
///
/// - `400 Bad Request`: Unknown, expired or already used token
/// - `409 Conflict`: The account is no longer awaiting activation
pub async fn accept_invite(
    State(state): State<AppState>,
    info: RequestInfo,
    ApiJson(req): ApiJson<AcceptInviteRequest>,
) -> ApiResult<Json<DataResponse<SessionResponse>>> {
    validate(&req)?;
    check_strength("password", &req.password)?;

    let token = state
        .store
        .consume_auth_token(&hash_token(&req.token), AuthTokenKind::Invite, Utc::now())
        .await?
        .ok_or_else(|| ApiError::BadRequest("Invalid or expired invitation".to_string()))?;

    let password_hash = password::hash_password(&req.password)?;

    let user = state
        .store
        .activate_user(token.user_id, &password_hash, req.name.as_deref())
        .await?
        .ok_or_else(|| ApiError::Conflict("Invitation has already been accepted".to_string()))?;

    state.store.record_login(user.id).await?;

    state
        .audit
        .log_access(
            AccessRecord::new(user.tenant_id, Some(user.id), user.role.clone(), AuditAction::Write)
                .resource("users", Some(user.id.to_string()))
                .endpoint(info.endpoint)
                .metadata(json!({ "event": "invite_accepted" }))
                .request(info.meta),
        )
        .await;

    state
        .changes
        .publish(Change::user(user.tenant_id, user.id, ChangeOp::Update))
        .await;

    tracing::info!(user_id = %user.id, tenant_id = %user.tenant_id, "Invitation accepted");

    Ok(data(issue_session(&state, user)?))
}

/// Change password while signed in
///
/// Revokes every other session; the response carries a fresh token.
pub async fn update_password(
    State(state): State<AppState>,
    Caller(auth): Caller,
    info: RequestInfo,
    ApiJson(req): ApiJson<UpdatePasswordRequest>,
) -> ApiResult<Json<DataResponse<SessionResponse>>> {
    validate(&req)?;
    check_strength("new_password", &req.new_password)?;

    let user = state
        .store
        .find_user(auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account not found".to_string()))?;

    let current_ok = match user.password_hash.as_deref() {
        Some(hash) => password::verify_password(&req.current_password, hash)?,
        None => false,
    };
    if !current_ok {
        return Err(ApiError::BadRequest("Current password is incorrect".to_string()));
    }

    let password_hash = password::hash_password(&req.new_password)?;
    state.store.set_password(user.id, &password_hash).await?;

    let user = state
        .store
        .find_user(user.id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account not found".to_string()))?;

    state
        .audit
        .log_access(
            access(&auth, AuditAction::Write, &info)
                .resource("users", Some(user.id.to_string()))
                .metadata(json!({ "event": "password_changed" })),
        )
        .await;

    Ok(data(issue_session(&state, user)?))
}

/// Profile and landing path after sign-in
pub async fn post_login(
    State(state): State<AppState>,
    Caller(auth): Caller,
    info: RequestInfo,
) -> ApiResult<Json<DataResponse<PostLoginResponse>>> {
    let user = state
        .store
        .find_user(auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account not found".to_string()))?;

    state
        .audit
        .log_access(
            access(&auth, AuditAction::Read, &info)
                .resource("users", Some(user.id.to_string())),
        )
        .await;

    Ok(data(PostLoginResponse {
        redirect_to: landing_path(user.role()),
        user,
    }))
}

/// First page for a role
pub fn landing_path(role: Option<Role>) -> &'static str {
    match role {
        Some(Role::Admin) => "/dashboard",
        Some(Role::Manager) => "/escalations",
        Some(Role::Agent) => "/emails",
        None => "/unauthorized",
    }
}

fn issue_session(state: &AppState, user: User) -> ApiResult<SessionResponse> {
    let claims = Claims::new(user.id, user.tenant_id, &user.role, user.session_version);
    let access_token = jwt::create_token(&claims, state.jwt_secret())?;

    let expires_at = Utc
        .timestamp_opt(claims.exp, 0)
        .single()
        .unwrap_or_else(Utc::now);

    Ok(SessionResponse {
        access_token,
        token_type: "Bearer",
        expires_at,
        user,
    })
}

fn check_strength(field: &str, candidate: &str) -> ApiResult<()> {
    password::validate_password_strength(candidate).map_err(|message| {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: field.to_string(),
            message,
        }])
    })
}

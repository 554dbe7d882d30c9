/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use triage_api::{app::{build_router, AppState}, config::Config};
/// use triage_shared::{
///     db::pool::{create_pool, DatabaseConfig},
///     realtime::ChangeFeed,
///     store::PgStore,
/// };
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(DatabaseConfig {
///     url: config.database.url.clone(),
///     ..Default::default()
/// })
/// .await?;
/// let state = AppState::new(Arc::new(PgStore::new(pool)), ChangeFeed::Disabled, config);
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, build_router(state)).await?;
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use triage_shared::audit::AuditLogger;
use triage_shared::auth::{context::AuthContext, jwt};
use triage_shared::escalation::LifecyclePolicy;
use triage_shared::models::user::User;
use triage_shared::realtime::ChangeFeed;
use triage_shared::store::Store;
use uuid::Uuid;

/// Shared application state
///
/// Cloned into every handler through `State`; everything inside is
/// reference-counted.
#[derive(Clone)]
pub struct AppState {
    /// Persistence
    pub store: Arc<dyn Store>,

    /// Access audit recorder over the same store
    pub audit: AuditLogger,

    /// Row change notifications
    pub changes: ChangeFeed,

    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, changes: ChangeFeed, config: Config) -> Self {
        Self {
            audit: AuditLogger::new(store.clone()),
            store,
            changes,
            config: Arc::new(config),
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }

    pub fn lifecycle(&self) -> LifecyclePolicy {
        self.config.lifecycle.policy()
    }
}

/// Builds the complete router with all routes and middleware
///
/// ```text
/// /
/// ├── GET  /health
/// └── /api/
///     ├── /auth/
///     │   ├── POST /login, /forgot-password, /reset-password, /accept-invite
///     │   └── POST /logout, /update-password, GET /post-login   (authenticated)
///     ├── GET  /escalations, POST /escalations/actions
///     ├── GET  /emails, POST /emails/events/:id/resolve
///     ├── GET  /team
///     ├── PATCH /users/:id, POST /users/invite
///     ├── GET|POST /departments
///     ├── GET  /dashboard
///     └── GET  /audit-logs
/// ```
///
/// Everything under `/api` except the public auth routes runs behind
/// [`auth_layer`].
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let public_auth_routes = Router::new()
        .route("/login", post(routes::auth::login))
        .route("/forgot-password", post(routes::auth::forgot_password))
        .route("/reset-password", post(routes::auth::reset_password))
        .route("/accept-invite", post(routes::auth::accept_invite));

    let session_routes = Router::new()
        .route("/logout", post(routes::auth::logout))
        .route("/update-password", post(routes::auth::update_password))
        .route("/post-login", get(routes::auth::post_login))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_layer,
        ));

    let protected_routes = Router::new()
        .route("/escalations", get(routes::escalations::list_escalations))
        .route("/escalations/actions", post(routes::escalations::apply_action))
        .route("/emails", get(routes::emails::list_emails))
        .route(
            "/emails/events/:id/resolve",
            post(routes::emails::resolve_event),
        )
        .route("/team", get(routes::team::list_team))
        .route("/users/invite", post(routes::users::invite_user))
        .route("/users/:id", patch(routes::users::update_user))
        .route(
            "/departments",
            get(routes::departments::list_departments).post(routes::departments::create_department),
        )
        .route("/dashboard", get(routes::dashboard::dashboard))
        .route("/audit-logs", get(routes::audit_logs::list_audit_logs))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_layer,
        ));

    let api_routes = Router::new()
        .nest("/auth", public_auth_routes.merge(session_routes))
        .merge(protected_routes);

    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/api", api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.is_production()))
        .with_state(state)
}

/// Session authentication middleware
///
/// Validates the bearer token, reloads the user's profile and inserts an
/// [`AuthContext`] built from the fresh row into request extensions. The
/// session is rejected with 401 when the user is gone or deactivated, has
/// signed out since the token was issued, or has moved tenants. A stored
/// role different from the token's role yields `role_changed`.
pub async fn auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let user = match auth_header {
        Some(value) => {
            let token = value
                .strip_prefix("Bearer ")
                .ok_or_else(|| ApiError::Unauthorized("Expected Bearer token".to_string()))?;

            session_user(&state, token).await?
        }
        None => match state.config.dev_bypass_user() {
            Some(user_id) => dev_user(&state, user_id).await?,
            None => {
                return Err(ApiError::Unauthorized(
                    "Missing authorization header".to_string(),
                ))
            }
        },
    };

    req.extensions_mut().insert(AuthContext::from_user(&user));

    Ok(next.run(req).await)
}

async fn session_user(state: &AppState, token: &str) -> Result<User, ApiError> {
    let claims = jwt::validate_token(token, state.jwt_secret())?;

    let user = state
        .store
        .find_user(claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account not found".to_string()))?;

    if !user.is_active() {
        tracing::warn!(user_id = %user.id, status = %user.status, "Rejected session for inactive user");
        return Err(ApiError::Unauthorized("Account is not active".to_string()));
    }

    if user.tenant_id != claims.tenant_id {
        tracing::warn!(user_id = %user.id, "Session tenant does not match profile");
        return Err(ApiError::Unauthorized("Invalid session".to_string()));
    }

    if user.session_version != claims.session_version {
        return Err(ApiError::Unauthorized("Session has been signed out".to_string()));
    }

    if user.role != claims.role {
        tracing::info!(
            user_id = %user.id,
            token_role = %claims.role,
            stored_role = %user.role,
            "Role changed since sign-in"
        );
        return Err(ApiError::RoleChanged);
    }

    Ok(user)
}

async fn dev_user(state: &AppState, user_id: Uuid) -> Result<User, ApiError> {
    tracing::warn!(user_id = %user_id, "Serving request through the development auth bypass");

    state
        .store
        .find_user(user_id)
        .await?
        .filter(User::is_active)
        .ok_or_else(|| ApiError::Unauthorized("Development user not found".to_string()))
}

/// Request extractors
///
/// - [`Caller`]: the [`AuthContext`] the auth layer attached to the request
/// - [`RequestInfo`]: endpoint path plus the network metadata recorded in
///   audit rows
/// - [`ApiJson`]: `axum::Json` whose rejections use the API error format

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, OriginalUri, Request},
    http::{header, request::Parts, HeaderMap},
    Json,
};
use serde::de::DeserializeOwned;
use triage_shared::audit::RequestMeta;
use triage_shared::auth::context::AuthContext;

use crate::error::ApiError;

/// Authenticated caller
#[derive(Debug, Clone)]
pub struct Caller(pub AuthContext);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(Caller)
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))
    }
}

/// Where a request came from and which endpoint it hit
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// Full request path, before any router nesting strips a prefix
    pub endpoint: String,
    pub meta: RequestMeta,
}

impl RequestInfo {
    pub fn from_parts(parts: &Parts) -> Self {
        let endpoint = parts
            .extensions
            .get::<OriginalUri>()
            .map(|uri| uri.0.path().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());

        Self {
            endpoint,
            meta: request_meta(&parts.headers),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestInfo
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestInfo::from_parts(parts))
    }
}

/// Reads client IP and user agent from headers
pub fn request_meta(headers: &HeaderMap) -> RequestMeta {
    let value = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    RequestMeta::from_headers(
        value("x-forwarded-for"),
        value("x-real-ip"),
        headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok()),
    )
}

/// JSON body extractor
///
/// Malformed or incomplete bodies become a 400 with the parser's message.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

        Ok(ApiJson(value))
    }
}

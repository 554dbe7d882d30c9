/// Session tokens (HS256 JWT)
///
/// A session token names the user, its tenant, the role it held when the
/// token was issued, and the user's `session_version` at that time. The auth
/// layer reloads the profile on every request and rejects the token when
/// either the role or the session version no longer matches.
///
/// # Claims
///
/// ```json
/// {
///   "sub": "user-uuid",
///   "iss": "triage",
///   "iat": 1700000000,
///   "nbf": 1700000000,
///   "exp": 1700086400,
///   "tenant_id": "tenant-uuid",
///   "role": "manager",
///   "session_version": 3
/// }
/// ```
///
/// # Example
///
/// ```
/// use triage_shared::auth::jwt::{create_token, validate_token, Claims};
/// use uuid::Uuid;
///
/// let secret = "a-secret-that-is-at-least-32-bytes-long";
/// let claims = Claims::new(Uuid::new_v4(), Uuid::new_v4(), "agent", 0);
/// let token = create_token(&claims, secret).unwrap();
///
/// let decoded = validate_token(&token, secret).unwrap();
/// assert_eq!(decoded.role, "agent");
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Issuer written to and required on every token
pub const ISSUER: &str = "triage";

/// Lifetime of a session token
pub fn session_lifetime() -> Duration {
    Duration::hours(24)
}

/// JWT errors
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to create token: {0}")]
    CreateError(String),

    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    #[error("Token has expired")]
    Expired,

    #[error("Invalid issuer")]
    InvalidIssuer,
}

/// Session token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,

    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,

    /// Tenant the session belongs to
    pub tenant_id: Uuid,

    /// Role text the user held when the token was issued
    pub role: String,

    /// User's session version when the token was issued
    pub session_version: i32,
}

impl Claims {
    /// Claims for a fresh session with the default lifetime
    pub fn new(user_id: Uuid, tenant_id: Uuid, role: &str, session_version: i32) -> Self {
        Self::with_expiration(user_id, tenant_id, role, session_version, session_lifetime())
    }

    /// Claims with a custom lifetime
    pub fn with_expiration(
        user_id: Uuid,
        tenant_id: Uuid,
        role: &str,
        session_version: i32,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
            tenant_id,
            role: role.to_string(),
            session_version,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Signs claims with HS256
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&Header::new(Algorithm::HS256), claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Verifies signature, issuer, `exp` and `nbf`, and returns the claims
///
/// # Errors
///
/// - `JwtError::Expired` if the token is past `exp`
/// - `JwtError::InvalidIssuer` if `iss` isn't [`ISSUER`]
/// - `JwtError::ValidationError` for everything else (bad signature,
///   malformed token, missing claims)
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;

    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
            jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
            _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
        })
}

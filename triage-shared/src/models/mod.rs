/// Database models for the triage service
///
/// Each model owns its SQL: the `impl` blocks take a `&PgPool` and are what
/// [`crate::store::PgStore`] delegates to. The in-memory store works on the
/// same structs so both back ends agree on shape.
///
/// # Models
///
/// - `tenant`: Isolation boundary; every other row carries a `tenant_id`
/// - `department`: Groups users and routes escalations
/// - `user`: Profiles with role, department and session version
/// - `email_event`: The unit of triage work
/// - `audit_log`: Append-only access records
/// - `auth_token`: Single-use invite and password-reset tokens
///
/// # Example
///
/// ```no_run
/// use triage_shared::models::tenant::Tenant;
/// use triage_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
/// let tenant = Tenant::create(&pool, "Acme Support").await?;
/// println!("Provisioned tenant {}", tenant.id);
/// # Ok(())
/// # }
/// ```

pub mod audit_log;
pub mod auth_token;
pub mod department;
pub mod email_event;
pub mod tenant;
pub mod user;

/// Error returned when a text column holds a value outside its enum
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {kind} value: {value}")]
pub struct ParseEnumError {
    /// Name of the enum being parsed
    pub kind: &'static str,

    /// The offending value
    pub value: String,
}

/// Implements `FromStr`, `TryFrom<String>` and `Display` for a text-backed enum
///
/// The enum must provide `as_str(&self) -> &'static str` and
/// `parse(&str) -> Option<Self>`. `TryFrom<String>` is what
/// `#[sqlx(try_from = "String")]` uses when decoding rows.
macro_rules! text_enum {
    ($ty:ty, $kind:literal) => {
        impl std::str::FromStr for $ty {
            type Err = $crate::models::ParseEnumError;

            fn from_str(s: &str) -> Result<Self, $crate::models::ParseEnumError> {
                <$ty>::parse(s).ok_or_else(|| $crate::models::ParseEnumError {
                    kind: $kind,
                    value: s.to_string(),
                })
            }
        }

        impl TryFrom<String> for $ty {
            type Error = $crate::models::ParseEnumError;

            fn try_from(value: String) -> Result<Self, $crate::models::ParseEnumError> {
                value.parse()
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use text_enum;

/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and strength rules
/// - [`jwt`]: HS256 session tokens
/// - [`token`]: One-time invite and password-reset tokens
/// - [`context`]: The authenticated caller
/// - [`scope`]: Row predicates per role
/// - [`authorization`]: The role/action permission matrix
///
/// # Example
///
/// ```
/// use triage_shared::auth::authorization::scope_for;
/// use triage_shared::auth::scope::Scope;
/// use triage_shared::models::user::Role;
/// use uuid::Uuid;
///
/// let (user, dept, tenant) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
/// let scope = scope_for(Some(Role::Manager), user, Some(dept), tenant).unwrap();
/// assert_eq!(scope, Scope::Department { tenant_id: tenant, department_id: dept });
/// ```

pub mod authorization;
pub mod context;
pub mod jwt;
pub mod password;
pub mod scope;
pub mod token;

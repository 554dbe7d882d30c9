/// Authenticated caller
///
/// The API's auth layer builds an [`AuthContext`] from a freshly reloaded
/// profile row and inserts it into request extensions. Every store call made
/// on the caller's behalf is scoped by it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::{Role, User};

/// Per-request caller identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub department_id: Option<Uuid>,

    /// Stored role text, recorded verbatim in audit logs
    pub role_text: String,

    /// Interpreted role; `None` for unrecognized values
    pub role: Option<Role>,

    pub email: String,
    pub name: Option<String>,
}

impl AuthContext {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            tenant_id: user.tenant_id,
            department_id: user.department_id,
            role_text: user.role.clone(),
            role: user.role(),
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }
}

/// Role-based access policy
///
/// Two pure functions decide everything:
///
/// - [`can_perform`] maps `(role, action)` to allow/deny
/// - [`scope_for`] maps a caller to the [`Scope`] of rows it may touch
///
/// Unrecognized roles fail closed: they may read their own profile and
/// nothing else.
///
/// # Permission Matrix
///
/// | action                    | admin | manager | agent |
/// |---------------------------|:-----:|:-------:|:-----:|
/// | read emails (scoped)      |   ✓   |    ✓    |   ✓   |
/// | resolve (scoped)          |   ✓   |    ✓    |   ✓   |
/// | view escalations          |   ✓   |    ✓    |       |
/// | assign                    |   ✓   |    ✓    |       |
/// | escalate department       |   ✓   |    ✓    |       |
/// | snooze                    |   ✓   |    ✓    |       |
/// | false escalation          |   ✓   |    ✓    |       |
/// | mark pending resolution   |   ✓   |    ✓    |       |
/// | view team                 |   ✓   |    ✓    |       |
/// | invite user               |   ✓   |    ✓¹   |       |
/// | view departments          |   ✓   |    ✓    |       |
/// | AI override               |   ✓   |         |       |
/// | change role / department  |   ✓   |         |       |
/// | create department         |   ✓   |         |       |
/// | read audit logs           |   ✓   |         |       |
///
/// ¹ non-admin invitees into the manager's own department only
///
/// # Example
///
/// ```
/// use triage_shared::auth::authorization::{can_perform, Action};
/// use triage_shared::models::user::Role;
///
/// assert!(can_perform(Some(Role::Manager), Action::Snooze));
/// assert!(!can_perform(Some(Role::Manager), Action::AiOverride));
/// assert!(!can_perform(None, Action::ReadEmails));
/// ```

use uuid::Uuid;

use super::context::AuthContext;
use super::scope::Scope;
use crate::models::user::Role;

/// Authorization failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// The caller's role may not perform the action
    #[error("Role '{role}' is not permitted to {action}")]
    ActionDenied { role: String, action: &'static str },

    /// The caller's role has no row scope (unknown role, or a manager
    /// without a department)
    #[error("No access scope for this account")]
    NoScope,

    /// The resource exists but lies outside the caller's scope
    #[error("Resource is outside your access scope")]
    OutOfScope,
}

/// Operation subject to the access policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ViewOwnProfile,
    ReadEmails,
    Resolve,
    ViewEscalations,
    Assign,
    EscalateDepartment,
    AiOverride,
    Snooze,
    FalseEscalation,
    MarkPendingResolution,
    ViewTeam,
    InviteUser,
    InviteAdmin,
    ChangeRole,
    ChangeDepartment,
    ViewDepartments,
    CreateDepartment,
    ReadAuditLogs,
    ViewDashboard,
}

impl Action {
    /// Human-readable description used in error messages
    pub fn describe(&self) -> &'static str {
        match self {
            Action::ViewOwnProfile => "view own profile",
            Action::ReadEmails => "read emails",
            Action::Resolve => "resolve events",
            Action::ViewEscalations => "view escalations",
            Action::Assign => "assign events",
            Action::EscalateDepartment => "escalate to a department",
            Action::AiOverride => "override AI classification",
            Action::Snooze => "snooze events",
            Action::FalseEscalation => "mark false escalations",
            Action::MarkPendingResolution => "mark events pending resolution",
            Action::ViewTeam => "view the team",
            Action::InviteUser => "invite users",
            Action::InviteAdmin => "invite admins",
            Action::ChangeRole => "change roles",
            Action::ChangeDepartment => "change departments",
            Action::ViewDepartments => "view departments",
            Action::CreateDepartment => "create departments",
            Action::ReadAuditLogs => "read audit logs",
            Action::ViewDashboard => "view the dashboard",
        }
    }
}

/// Whether a role may perform an action
///
/// `None` is an unrecognized role.
pub fn can_perform(role: Option<Role>, action: Action) -> bool {
    match role {
        Some(Role::Admin) => true,
        Some(Role::Manager) => matches!(
            action,
            Action::ViewOwnProfile
                | Action::ReadEmails
                | Action::Resolve
                | Action::ViewEscalations
                | Action::Assign
                | Action::EscalateDepartment
                | Action::Snooze
                | Action::FalseEscalation
                | Action::MarkPendingResolution
                | Action::ViewTeam
                | Action::InviteUser
                | Action::ViewDepartments
                | Action::ViewDashboard
        ),
        Some(Role::Agent) => matches!(
            action,
            Action::ViewOwnProfile | Action::ReadEmails | Action::Resolve | Action::ViewDashboard
        ),
        None => matches!(action, Action::ViewOwnProfile),
    }
}

/// Row scope for a role
///
/// Returns `None` for unrecognized roles and for managers without a
/// department.
pub fn scope_for(
    role: Option<Role>,
    user_id: Uuid,
    department_id: Option<Uuid>,
    tenant_id: Uuid,
) -> Option<Scope> {
    match role? {
        Role::Admin => Some(Scope::Tenant { tenant_id }),
        Role::Manager => department_id.map(|department_id| Scope::Department {
            tenant_id,
            department_id,
        }),
        Role::Agent => Some(Scope::Assignee { tenant_id, user_id }),
    }
}

/// Fails with `ActionDenied` unless the caller may perform `action`
pub fn require_action(auth: &AuthContext, action: Action) -> Result<(), AuthzError> {
    if can_perform(auth.role, action) {
        Ok(())
    } else {
        Err(AuthzError::ActionDenied {
            role: auth.role_text.clone(),
            action: action.describe(),
        })
    }
}

/// The caller's row scope, or `NoScope`
pub fn require_scope(auth: &AuthContext) -> Result<Scope, AuthzError> {
    scope_for(auth.role, auth.user_id, auth.department_id, auth.tenant_id)
        .ok_or(AuthzError::NoScope)
}

/// Checks that an invite may be issued for `role` into `department_id`
///
/// Managers may only invite non-admins into their own department.
pub fn require_invite(
    auth: &AuthContext,
    role: Role,
    department_id: Option<Uuid>,
) -> Result<(), AuthzError> {
    require_action(auth, Action::InviteUser)?;

    if role == Role::Admin {
        require_action(auth, Action::InviteAdmin)?;
    }

    if auth.role == Some(Role::Manager) {
        let own = auth.department_id.ok_or(AuthzError::NoScope)?;
        if department_id != Some(own) {
            return Err(AuthzError::OutOfScope);
        }
    }

    Ok(())
}

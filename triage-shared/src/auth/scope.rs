/// Role-scoped row predicates
///
/// A [`Scope`] is the set of rows a caller may see or change. It renders
/// both as a SQL predicate for the Postgres store and as an in-memory check
/// for the memory store, so both back ends enforce the same rule:
///
/// | scope        | email_events predicate                         |
/// |--------------|------------------------------------------------|
/// | `Tenant`     | `tenant_id = T`                                |
/// | `Department` | `tenant_id = T AND department_id = D`          |
/// | `Assignee`   | `tenant_id = T AND assigned_user_id = U`       |

use serde::Serialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::email_event::EmailEvent;
use crate::models::user::User;

/// Rows visible to a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scope {
    /// Every row in the tenant (admins)
    Tenant { tenant_id: Uuid },

    /// Rows routed to one department (managers)
    Department { tenant_id: Uuid, department_id: Uuid },

    /// Rows assigned to one user (agents)
    Assignee { tenant_id: Uuid, user_id: Uuid },
}

impl Scope {
    pub fn tenant_id(&self) -> Uuid {
        match *self {
            Scope::Tenant { tenant_id }
            | Scope::Department { tenant_id, .. }
            | Scope::Assignee { tenant_id, .. } => tenant_id,
        }
    }

    /// Department the scope is bounded to, if any
    pub fn department_id(&self) -> Option<Uuid> {
        match *self {
            Scope::Department { department_id, .. } => Some(department_id),
            _ => None,
        }
    }

    /// Pushes the `email_events` predicate for `table` (a table name or alias)
    ///
    /// Pushes no leading `WHERE`/`AND`.
    pub fn push_event_predicate(&self, qb: &mut QueryBuilder<'_, Postgres>, table: &str) {
        qb.push(format!("{table}.tenant_id = ")).push_bind(self.tenant_id());

        match *self {
            Scope::Tenant { .. } => {}
            Scope::Department { department_id, .. } => {
                qb.push(format!(" AND {table}.department_id = "))
                    .push_bind(department_id);
            }
            Scope::Assignee { user_id, .. } => {
                qb.push(format!(" AND {table}.assigned_user_id = "))
                    .push_bind(user_id);
            }
        }
    }

    /// Pushes the `users` predicate for `table`
    ///
    /// Agents only see themselves.
    pub fn push_user_predicate(&self, qb: &mut QueryBuilder<'_, Postgres>, table: &str) {
        qb.push(format!("{table}.tenant_id = ")).push_bind(self.tenant_id());

        match *self {
            Scope::Tenant { .. } => {}
            Scope::Department { department_id, .. } => {
                qb.push(format!(" AND {table}.department_id = "))
                    .push_bind(department_id);
            }
            Scope::Assignee { user_id, .. } => {
                qb.push(format!(" AND {table}.id = ")).push_bind(user_id);
            }
        }
    }

    /// Whether an event is inside the scope
    pub fn matches_event(&self, event: &EmailEvent) -> bool {
        if event.tenant_id != self.tenant_id() {
            return false;
        }

        match *self {
            Scope::Tenant { .. } => true,
            Scope::Department { department_id, .. } => event.department_id == Some(department_id),
            Scope::Assignee { user_id, .. } => event.assigned_user_id == Some(user_id),
        }
    }

    /// Whether a user is inside the scope
    pub fn matches_user(&self, user: &User) -> bool {
        if user.tenant_id != self.tenant_id() {
            return false;
        }

        match *self {
            Scope::Tenant { .. } => true,
            Scope::Department { department_id, .. } => user.department_id == Some(department_id),
            Scope::Assignee { user_id, .. } => user.id == user_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::email_event::{EmailSource, EventState, HandledBy, Priority};
    use chrono::Utc;

    fn event(tenant_id: Uuid, department_id: Option<Uuid>, assignee: Option<Uuid>) -> EmailEvent {
        let now = Utc::now();
        EmailEvent {
            id: Uuid::new_v4(),
            tenant_id,
            subject: String::new(),
            content: String::new(),
            source: EmailSource::Email,
            external_message_id: None,
            thread_id: None,
            handled_by: HandledBy::Ai,
            current_state: EventState::NeedsAttention,
            priority: Priority::Medium,
            confidence_score: None,
            escalation_reason: None,
            assigned_user_id: assignee,
            department_id,
            sla_deadline: None,
            snooze_count: 0,
            pending_resolution: false,
            resolution_expected: None,
            pending_since: None,
            evidence_message_id: None,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_tenant_scope_matches_whole_tenant() {
        let tenant = Uuid::new_v4();
        let scope = Scope::Tenant { tenant_id: tenant };

        assert!(scope.matches_event(&event(tenant, None, None)));
        assert!(scope.matches_event(&event(tenant, Some(Uuid::new_v4()), None)));
        assert!(!scope.matches_event(&event(Uuid::new_v4(), None, None)));
    }

    #[test]
    fn test_department_scope() {
        let tenant = Uuid::new_v4();
        let billing = Uuid::new_v4();
        let sales = Uuid::new_v4();
        let scope = Scope::Department {
            tenant_id: tenant,
            department_id: billing,
        };

        assert!(scope.matches_event(&event(tenant, Some(billing), None)));
        assert!(!scope.matches_event(&event(tenant, Some(sales), None)));
        assert!(!scope.matches_event(&event(tenant, None, None)));
        assert!(!scope.matches_event(&event(Uuid::new_v4(), Some(billing), None)));
        assert_eq!(scope.department_id(), Some(billing));
    }

    #[test]
    fn test_assignee_scope() {
        let tenant = Uuid::new_v4();
        let me = Uuid::new_v4();
        let scope = Scope::Assignee {
            tenant_id: tenant,
            user_id: me,
        };

        assert!(scope.matches_event(&event(tenant, None, Some(me))));
        assert!(!scope.matches_event(&event(tenant, None, Some(Uuid::new_v4()))));
        assert!(!scope.matches_event(&event(tenant, None, None)));
    }

    #[test]
    fn test_department_predicate_sql() {
        let scope = Scope::Department {
            tenant_id: Uuid::new_v4(),
            department_id: Uuid::new_v4(),
        };
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT 1 FROM email_events e WHERE ");
        scope.push_event_predicate(&mut qb, "e");

        assert_eq!(
            qb.sql(),
            "SELECT 1 FROM email_events e WHERE e.tenant_id = $1 AND e.department_id = $2"
        );
    }

    #[test]
    fn test_assignee_user_predicate_sql() {
        let scope = Scope::Assignee {
            tenant_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
        };
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("");
        scope.push_user_predicate(&mut qb, "users");

        assert_eq!(qb.sql(), "users.tenant_id = $1 AND users.id = $2");
    }
}

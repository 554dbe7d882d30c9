/// Escalation lifecycle
///
/// Turns an action request (`{action, eventId, payload}`) into a single-row
/// patch against an email event. Parsing and planning are pure: the caller
/// fetches the event, asks [`EscalationAction::plan`] what to change, and
/// hands the resulting [`EventPatch`] to the store, which re-applies the
/// caller's scope predicate on write.
///
/// # States
///
/// ```text
/// queued ─▶ processing ─▶ handled                 (automated)
/// queued/processing ─▶ needs_attention            (upstream classifier)
/// needs_attention ─▶ needs_attention              (assign, escalate_department,
///                                                  ai_override, snooze)
/// needs_attention ─▶ [pending_resolution flag] ─▶ handled   (resolve)
/// needs_attention ─▶ handled                      (false_escalation)
/// ```
///
/// Routing actions on a handled event are conflicts. `resolve` and
/// `false_escalation` on a handled event are accepted and change nothing.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use triage_shared::escalation::{EscalationAction, EscalationError};
///
/// let action = EscalationAction::parse("snooze", &json!({"minutes": 15})).unwrap();
/// assert_eq!(action.name(), "snooze");
///
/// let err = EscalationAction::parse("escalate_department", &json!({})).unwrap_err();
/// assert_eq!(err, EscalationError::MissingField("departmentId"));
/// ```

pub mod sla;
pub mod view;

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::auth::authorization::Action;
use crate::models::email_event::{
    EmailEvent, EventPatch, EventState, HandledBy, Priority, RESOLUTION_REPLY_SENT,
};

/// Default cap on snoozes per event
pub const DEFAULT_MAX_SNOOZES: i32 = 5;

/// Default breach-risk window, in minutes
pub const DEFAULT_BREACH_RISK_MINUTES: i64 = 20;

/// Longest single snooze, in minutes (30 days)
pub const MAX_SNOOZE_MINUTES: i64 = 60 * 24 * 30;

/// Resolution recorded in audit metadata for false escalations
pub const FALSE_ESCALATION_RESOLUTION: &str = "false escalation";

/// Tunables for the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePolicy {
    /// Snoozes allowed per event before further snoozes are rejected
    pub max_snoozes: i32,

    /// Deadlines closer than this are reported as at risk
    pub breach_risk_window: Duration,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            max_snoozes: DEFAULT_MAX_SNOOZES,
            breach_risk_window: Duration::minutes(DEFAULT_BREACH_RISK_MINUTES),
        }
    }
}

/// Lifecycle errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EscalationError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Event is already handled")]
    AlreadyHandled,

    #[error("Event has been snoozed the maximum of {max} times")]
    SnoozeLimit { max: i32 },
}

/// How a snooze moves the deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnoozeTarget {
    /// `now + minutes`
    Minutes(i64),

    /// Exactly this instant, even if it is in the past
    Until(DateTime<Utc>),
}

/// A parsed escalation action
#[derive(Debug, Clone, PartialEq)]
pub enum EscalationAction {
    Assign {
        assignee_id: Uuid,
    },
    EscalateDepartment {
        department_id: Uuid,
    },
    AiOverride {
        escalation_reason: Option<String>,
        priority: Option<Priority>,
    },
    Snooze {
        target: SnoozeTarget,
    },
    FalseEscalation {
        note: Option<String>,
    },
    Resolve {
        note: Option<String>,
    },
    PendingResolution,
}

/// Outcome of planning an action against an event
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Write this patch
    Apply(EventPatch),

    /// Nothing to change; return the event as-is
    NoOp,
}

impl EscalationAction {
    /// Parses an action name and its payload
    ///
    /// `payload` may be `null` for actions without required fields.
    ///
    /// # Errors
    ///
    /// - `UnknownAction` for an unrecognized name
    /// - `MissingField` naming the first absent required field
    /// - `InvalidField` for a present but malformed field
    pub fn parse(action: &str, payload: &Value) -> Result<Self, EscalationError> {
        let empty = Map::new();
        let fields = match payload {
            Value::Null => &empty,
            Value::Object(map) => map,
            _ => {
                return Err(EscalationError::InvalidField {
                    field: "payload",
                    reason: "must be an object".to_string(),
                })
            }
        };

        match action {
            "assign" => Ok(EscalationAction::Assign {
                assignee_id: required_uuid(fields, "assigneeId")?,
            }),
            "escalate_department" => Ok(EscalationAction::EscalateDepartment {
                department_id: required_uuid(fields, "departmentId")?,
            }),
            "ai_override" => {
                let escalation_reason = optional_string(fields, "escalationReason")?;
                let priority = optional_string(fields, "priority")?
                    .map(|p| {
                        Priority::parse(&p).ok_or_else(|| EscalationError::InvalidField {
                            field: "priority",
                            reason: format!("unknown priority '{}'", p),
                        })
                    })
                    .transpose()?;

                if escalation_reason.is_none() && priority.is_none() {
                    return Err(EscalationError::MissingField("escalationReason or priority"));
                }

                Ok(EscalationAction::AiOverride {
                    escalation_reason,
                    priority,
                })
            }
            "snooze" => Ok(EscalationAction::Snooze {
                target: snooze_target(fields)?,
            }),
            "false_escalation" => Ok(EscalationAction::FalseEscalation {
                note: optional_string(fields, "note")?,
            }),
            "resolve" => Ok(EscalationAction::Resolve {
                note: optional_string(fields, "note")?,
            }),
            "pending_resolution" => Ok(EscalationAction::PendingResolution),
            other => Err(EscalationError::UnknownAction(other.to_string())),
        }
    }

    /// Wire name of the action
    pub fn name(&self) -> &'static str {
        match self {
            EscalationAction::Assign { .. } => "assign",
            EscalationAction::EscalateDepartment { .. } => "escalate_department",
            EscalationAction::AiOverride { .. } => "ai_override",
            EscalationAction::Snooze { .. } => "snooze",
            EscalationAction::FalseEscalation { .. } => "false_escalation",
            EscalationAction::Resolve { .. } => "resolve",
            EscalationAction::PendingResolution => "pending_resolution",
        }
    }

    /// Permission the caller needs
    pub fn required_action(&self) -> Action {
        match self {
            EscalationAction::Assign { .. } => Action::Assign,
            EscalationAction::EscalateDepartment { .. } => Action::EscalateDepartment,
            EscalationAction::AiOverride { .. } => Action::AiOverride,
            EscalationAction::Snooze { .. } => Action::Snooze,
            EscalationAction::FalseEscalation { .. } => Action::FalseEscalation,
            EscalationAction::Resolve { .. } => Action::Resolve,
            EscalationAction::PendingResolution => Action::MarkPendingResolution,
        }
    }

    /// Whether the action closes the event
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EscalationAction::FalseEscalation { .. } | EscalationAction::Resolve { .. }
        )
    }

    /// Decides what to write for `event`
    ///
    /// # Errors
    ///
    /// - `AlreadyHandled` for a non-terminal action on a handled event
    /// - `SnoozeLimit` once the event has been snoozed `max_snoozes` times
    ///
    /// Both checks are repeated by the store when the returned patch is
    /// written, so a patch planned from a stale read may match no row.
    pub fn plan(
        &self,
        event: &EmailEvent,
        now: DateTime<Utc>,
        policy: &LifecyclePolicy,
    ) -> Result<Transition, EscalationError> {
        if event.current_state == EventState::Handled {
            return if self.is_terminal() {
                Ok(Transition::NoOp)
            } else {
                Err(EscalationError::AlreadyHandled)
            };
        }

        let patch = match self {
            EscalationAction::Assign { assignee_id } => EventPatch {
                assigned_user_id: Some(*assignee_id),
                ..Default::default()
            },
            EscalationAction::EscalateDepartment { department_id } => EventPatch {
                department_id: Some(*department_id),
                ..Default::default()
            },
            EscalationAction::AiOverride {
                escalation_reason,
                priority,
            } => EventPatch {
                escalation_reason: escalation_reason.clone(),
                priority: *priority,
                ..Default::default()
            },
            EscalationAction::Snooze { target } => {
                if event.snooze_count >= policy.max_snoozes {
                    return Err(EscalationError::SnoozeLimit {
                        max: policy.max_snoozes,
                    });
                }

                let deadline = match *target {
                    SnoozeTarget::Minutes(minutes) => now + Duration::minutes(minutes),
                    SnoozeTarget::Until(until) => until,
                };

                EventPatch {
                    sla_deadline: Some(deadline),
                    increment_snooze: true,
                    snooze_below: Some(policy.max_snoozes),
                    ..Default::default()
                }
            }
            EscalationAction::FalseEscalation { .. } => EventPatch {
                current_state: Some(EventState::Handled),
                resolved_at: Some(now),
                ..Default::default()
            },
            EscalationAction::Resolve { .. } => EventPatch {
                current_state: Some(EventState::Handled),
                handled_by: Some(HandledBy::Human),
                resolved_at: Some(now),
                pending_resolution: Some(false),
                ..Default::default()
            },
            EscalationAction::PendingResolution => EventPatch {
                pending_resolution: Some(true),
                resolution_expected: Some(RESOLUTION_REPLY_SENT.to_string()),
                pending_since: Some(now),
                capture_evidence: true,
                ..Default::default()
            },
        };

        // The write re-checks that the row is still open
        Ok(Transition::Apply(EventPatch {
            require_open: true,
            ..patch
        }))
    }

    /// Metadata recorded with the audit write
    pub fn audit_metadata(&self, transition: &Transition) -> Value {
        let mut meta = json!({
            "action": self.name(),
            "noop": matches!(transition, Transition::NoOp),
        });

        match self {
            EscalationAction::Assign { assignee_id } => {
                meta["assigneeId"] = json!(assignee_id);
            }
            EscalationAction::EscalateDepartment { department_id } => {
                meta["departmentId"] = json!(department_id);
            }
            EscalationAction::AiOverride {
                escalation_reason,
                priority,
            } => {
                meta["escalationReason"] = json!(escalation_reason);
                meta["priority"] = json!(priority);
            }
            EscalationAction::Snooze { target } => match target {
                SnoozeTarget::Minutes(minutes) => meta["minutes"] = json!(minutes),
                SnoozeTarget::Until(until) => meta["until"] = json!(until),
            },
            EscalationAction::FalseEscalation { note } => {
                meta["resolution"] = json!(FALSE_ESCALATION_RESOLUTION);
                meta["note"] = json!(note);
            }
            EscalationAction::Resolve { note } => {
                meta["note"] = json!(note);
            }
            EscalationAction::PendingResolution => {}
        }

        meta
    }
}

fn required_uuid(fields: &Map<String, Value>, field: &'static str) -> Result<Uuid, EscalationError> {
    let raw = optional_string(fields, field)?.ok_or(EscalationError::MissingField(field))?;

    Uuid::parse_str(&raw).map_err(|_| EscalationError::InvalidField {
        field,
        reason: "must be a UUID".to_string(),
    })
}

/// A trimmed, non-empty string field; `null`, absent and blank all yield `None`
fn optional_string(
    fields: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, EscalationError> {
    match fields.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        Some(_) => Err(EscalationError::InvalidField {
            field,
            reason: "must be a string".to_string(),
        }),
    }
}

fn snooze_target(fields: &Map<String, Value>) -> Result<SnoozeTarget, EscalationError> {
    let minutes = fields.get("minutes").filter(|v| !v.is_null());
    let until = optional_string(fields, "until")?;

    match (minutes, until) {
        (Some(_), Some(_)) => Err(EscalationError::InvalidField {
            field: "minutes",
            reason: "provide either minutes or until, not both".to_string(),
        }),
        (Some(value), None) => {
            let minutes = match value {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            }
            .filter(|m| *m > 0)
            .ok_or_else(|| EscalationError::InvalidField {
                field: "minutes",
                reason: "must be a positive integer".to_string(),
            })?;

            if minutes > MAX_SNOOZE_MINUTES {
                return Err(EscalationError::InvalidField {
                    field: "minutes",
                    reason: format!("must be at most {}", MAX_SNOOZE_MINUTES),
                });
            }

            Ok(SnoozeTarget::Minutes(minutes))
        }
        (None, Some(until)) => DateTime::parse_from_rfc3339(&until)
            .map(|t| SnoozeTarget::Until(t.with_timezone(&Utc)))
            .map_err(|_| EscalationError::InvalidField {
                field: "until",
                reason: "must be an RFC 3339 timestamp".to_string(),
            }),
        (None, None) => Err(EscalationError::MissingField("minutes")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::email_event::EmailSource;

    fn event(state: EventState) -> EmailEvent {
        let now = Utc::now();
        EmailEvent {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            subject: "Where is my order?".to_string(),
            content: String::new(),
            source: EmailSource::Outlook,
            external_message_id: Some("<abc@mail>".to_string()),
            thread_id: None,
            handled_by: HandledBy::Ai,
            current_state: state,
            priority: Priority::High,
            confidence_score: Some(0.3),
            escalation_reason: Some("low confidence".to_string()),
            assigned_user_id: None,
            department_id: None,
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

    fn apply(action: &EscalationAction, e: &EmailEvent, now: DateTime<Utc>) -> EventPatch {
        match action.plan(e, now, &LifecyclePolicy::default()).unwrap() {
            Transition::Apply(patch) => patch,
            Transition::NoOp => panic!("expected a patch"),
        }
    }

    #[test]
    fn test_parse_unknown_action() {
        assert_eq!(
            EscalationAction::parse("delete", &Value::Null),
            Err(EscalationError::UnknownAction("delete".to_string()))
        );
    }

    #[test]
    fn test_parse_assign() {
        let id = Uuid::new_v4();
        assert_eq!(
            EscalationAction::parse("assign", &json!({"assigneeId": id.to_string()})),
            Ok(EscalationAction::Assign { assignee_id: id })
        );
        assert_eq!(
            EscalationAction::parse("assign", &json!({})),
            Err(EscalationError::MissingField("assigneeId"))
        );
        assert!(matches!(
            EscalationAction::parse("assign", &json!({"assigneeId": "U9"})),
            Err(EscalationError::InvalidField { field: "assigneeId", .. })
        ));
    }

    #[test]
    fn test_parse_escalate_department_requires_non_empty() {
        for payload in [json!({}), json!({"departmentId": ""}), json!({"departmentId": "  "}), Value::Null] {
            assert_eq!(
                EscalationAction::parse("escalate_department", &payload),
                Err(EscalationError::MissingField("departmentId"))
            );
        }
    }

    #[test]
    fn test_parse_ai_override() {
        assert_eq!(
            EscalationAction::parse("ai_override", &json!({"priority": "urgent"})),
            Ok(EscalationAction::AiOverride {
                escalation_reason: None,
                priority: Some(Priority::Urgent)
            })
        );
        assert!(matches!(
            EscalationAction::parse("ai_override", &json!({"priority": "p0"})),
            Err(EscalationError::InvalidField { field: "priority", .. })
        ));
        assert!(matches!(
            EscalationAction::parse("ai_override", &json!({})),
            Err(EscalationError::MissingField(_))
        ));
    }

    #[test]
    fn test_parse_snooze() {
        assert_eq!(
            EscalationAction::parse("snooze", &json!({"minutes": 30})),
            Ok(EscalationAction::Snooze {
                target: SnoozeTarget::Minutes(30)
            })
        );
        assert_eq!(
            EscalationAction::parse("snooze", &json!({"minutes": "45"})),
            Ok(EscalationAction::Snooze {
                target: SnoozeTarget::Minutes(45)
            })
        );

        for bad in [json!({"minutes": 0}), json!({"minutes": -5}), json!({"minutes": 1.5}), json!({"minutes": "soon"})] {
            assert!(matches!(
                EscalationAction::parse("snooze", &bad),
                Err(EscalationError::InvalidField { field: "minutes", .. })
            ));
        }

        assert!(matches!(
            EscalationAction::parse("snooze", &json!({"minutes": MAX_SNOOZE_MINUTES + 1})),
            Err(EscalationError::InvalidField { field: "minutes", .. })
        ));
        assert_eq!(
            EscalationAction::parse("snooze", &json!({})),
            Err(EscalationError::MissingField("minutes"))
        );
    }

    #[test]
    fn test_parse_snooze_until() {
        let parsed = EscalationAction::parse("snooze", &json!({"until": "2025-01-01T00:00:00Z"})).unwrap();
        let expected = DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        assert_eq!(
            parsed,
            EscalationAction::Snooze {
                target: SnoozeTarget::Until(expected)
            }
        );
        assert!(matches!(
            EscalationAction::parse("snooze", &json!({"until": "tomorrow"})),
            Err(EscalationError::InvalidField { field: "until", .. })
        ));
    }

    #[test]
    fn test_parse_rejects_non_object_payload() {
        assert!(matches!(
            EscalationAction::parse("resolve", &json!([1, 2])),
            Err(EscalationError::InvalidField { field: "payload", .. })
        ));
    }

    #[test]
    fn test_assign_keeps_state() {
        let e = event(EventState::NeedsAttention);
        let assignee = Uuid::new_v4();
        let patch = apply(&EscalationAction::Assign { assignee_id: assignee }, &e, Utc::now());

        assert_eq!(patch.assigned_user_id, Some(assignee));
        assert_eq!(patch.current_state, None);
    }

    #[test]
    fn test_snooze_minutes_sets_deadline() {
        let e = event(EventState::NeedsAttention);
        let now = Utc::now();
        let patch = apply(
            &EscalationAction::Snooze {
                target: SnoozeTarget::Minutes(15),
            },
            &e,
            now,
        );

        assert_eq!(patch.sla_deadline, Some(now + Duration::minutes(15)));
        assert!(patch.increment_snooze);
        assert_eq!(patch.current_state, None);
    }

    #[test]
    fn test_snooze_limit() {
        let mut e = event(EventState::NeedsAttention);
        e.snooze_count = DEFAULT_MAX_SNOOZES;

        let result = EscalationAction::Snooze {
            target: SnoozeTarget::Minutes(5),
        }
        .plan(&e, Utc::now(), &LifecyclePolicy::default());

        assert_eq!(result, Err(EscalationError::SnoozeLimit { max: DEFAULT_MAX_SNOOZES }));
    }

    #[test]
    fn test_false_escalation_keeps_handled_by() {
        let e = event(EventState::NeedsAttention);
        let now = Utc::now();
        let patch = apply(&EscalationAction::FalseEscalation { note: None }, &e, now);

        assert_eq!(patch.current_state, Some(EventState::Handled));
        assert_eq!(patch.resolved_at, Some(now));
        assert_eq!(patch.handled_by, None);
    }

    #[test]
    fn test_resolve_marks_human() {
        let e = event(EventState::NeedsAttention);
        let patch = apply(&EscalationAction::Resolve { note: None }, &e, Utc::now());

        assert_eq!(patch.current_state, Some(EventState::Handled));
        assert_eq!(patch.handled_by, Some(HandledBy::Human));
        assert_eq!(patch.pending_resolution, Some(false));
    }

    #[test]
    fn test_pending_resolution_captures_evidence() {
        let e = event(EventState::NeedsAttention);
        let now = Utc::now();
        let patch = apply(&EscalationAction::PendingResolution, &e, now);

        assert_eq!(patch.pending_resolution, Some(true));
        assert_eq!(patch.resolution_expected.as_deref(), Some(RESOLUTION_REPLY_SENT));
        assert_eq!(patch.pending_since, Some(now));
        assert!(patch.capture_evidence);
        assert_eq!(patch.current_state, None);
    }

    #[test]
    fn test_terminal_actions_on_handled_are_noops() {
        let e = event(EventState::Handled);
        let policy = LifecyclePolicy::default();

        assert_eq!(
            EscalationAction::FalseEscalation { note: None }.plan(&e, Utc::now(), &policy),
            Ok(Transition::NoOp)
        );
        assert_eq!(
            EscalationAction::Resolve { note: None }.plan(&e, Utc::now(), &policy),
            Ok(Transition::NoOp)
        );
    }

    #[test]
    fn test_routing_actions_on_handled_conflict() {
        let e = event(EventState::Handled);
        let policy = LifecyclePolicy::default();

        let routing = [
            EscalationAction::Assign {
                assignee_id: Uuid::new_v4(),
            },
            EscalationAction::EscalateDepartment {
                department_id: Uuid::new_v4(),
            },
            EscalationAction::AiOverride {
                escalation_reason: Some("x".to_string()),
                priority: None,
            },
            EscalationAction::Snooze {
                target: SnoozeTarget::Minutes(10),
            },
            EscalationAction::PendingResolution,
        ];

        for action in routing {
            assert_eq!(
                action.plan(&e, Utc::now(), &policy),
                Err(EscalationError::AlreadyHandled),
                "{}",
                action.name()
            );
        }
    }

    #[test]
    fn test_patches_carry_write_guards() {
        let e = event(EventState::NeedsAttention);
        let now = Utc::now();
        let policy = LifecyclePolicy {
            max_snoozes: 2,
            ..Default::default()
        };

        let snooze = match (EscalationAction::Snooze {
            target: SnoozeTarget::Minutes(10),
        })
        .plan(&e, now, &policy)
        .unwrap()
        {
            Transition::Apply(patch) => patch,
            Transition::NoOp => panic!("expected a patch"),
        };
        assert!(snooze.require_open);
        assert_eq!(snooze.snooze_below, Some(2));

        let assign = apply(
            &EscalationAction::Assign {
                assignee_id: Uuid::new_v4(),
            },
            &e,
            now,
        );
        assert!(assign.require_open);
        assert_eq!(assign.snooze_below, None);

        let resolve = apply(&EscalationAction::Resolve { note: None }, &e, now);
        assert!(resolve.require_open);
    }

    #[test]
    fn test_stale_plans_are_refused_on_write() {
        let mut e = event(EventState::NeedsAttention);
        let now = Utc::now();
        let policy = LifecyclePolicy {
            max_snoozes: 1,
            ..Default::default()
        };
        let snooze = EscalationAction::Snooze {
            target: SnoozeTarget::Minutes(5),
        };

        // Two requests plan from the same read
        let first = match snooze.plan(&e, now, &policy).unwrap() {
            Transition::Apply(patch) => patch,
            Transition::NoOp => panic!("expected a patch"),
        };
        let second = match snooze.plan(&e, now, &policy).unwrap() {
            Transition::Apply(patch) => patch,
            Transition::NoOp => panic!("expected a patch"),
        };

        assert!(first.admits(&e));
        first.apply(&mut e, now);
        assert!(!second.admits(&e));
        assert_eq!(e.snooze_count, 1);

        let mut open = event(EventState::NeedsAttention);
        let assign = apply(
            &EscalationAction::Assign {
                assignee_id: Uuid::new_v4(),
            },
            &open,
            now,
        );
        apply(&EscalationAction::Resolve { note: None }, &open, now).apply(&mut open, now);
        assert!(!assign.admits(&open));
    }

    #[test]
    fn test_false_escalation_audit_metadata() {
        let action = EscalationAction::FalseEscalation {
            note: Some("spam".to_string()),
        };
        let meta = action.audit_metadata(&Transition::NoOp);

        assert_eq!(meta["action"], "false_escalation");
        assert_eq!(meta["resolution"], FALSE_ESCALATION_RESOLUTION);
        assert_eq!(meta["note"], "spam");
        assert_eq!(meta["noop"], true);
    }

    #[test]
    fn test_required_actions() {
        assert_eq!(
            EscalationAction::AiOverride {
                escalation_reason: None,
                priority: Some(Priority::Low)
            }
            .required_action(),
            Action::AiOverride
        );
        assert_eq!(
            EscalationAction::PendingResolution.required_action(),
            Action::MarkPendingResolution
        );
    }
}

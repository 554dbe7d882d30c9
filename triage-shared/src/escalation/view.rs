/// Read model for the escalation queue.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::sla::SlaStatus;
use crate::models::department::NO_DEPARTMENT;
use crate::models::email_event::{EmailEvent, EscalationRow};

/// Display value used when an event has no assignee
pub const UNASSIGNED: &str = "Unassigned";

/// Escalation as returned by `GET /api/escalations`
///
/// Absent relations degrade to display sentinels instead of `null`.
#[derive(Debug, Clone, Serialize)]
pub struct EscalationView {
    #[serde(flatten)]
    pub event: EmailEvent,
    pub assignee_name: String,
    pub department_name: String,
    pub sla_status: SlaStatus,
}

impl EscalationView {
    pub fn from_row(row: EscalationRow, now: DateTime<Utc>, risk_window: Duration) -> Self {
        let sla_status = SlaStatus::at(row.event.sla_deadline, now, risk_window);

        Self {
            assignee_name: row.assignee_name.unwrap_or_else(|| UNASSIGNED.to_string()),
            department_name: row
                .department_name
                .unwrap_or_else(|| NO_DEPARTMENT.to_string()),
            sla_status,
            event: row.event,
        }
    }
}

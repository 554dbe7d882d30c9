/// SLA status, derived at read time and never stored.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Where an event stands against its SLA deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlaStatus {
    #[serde(rename = "On Track")]
    OnTrack,

    #[serde(rename = "Breach Risk")]
    BreachRisk,

    #[serde(rename = "Breached")]
    Breached,
}

impl SlaStatus {
    /// Status of `deadline` at `now`
    ///
    /// Breached once `now` is past the deadline; at risk when the deadline
    /// falls within `risk_window`; on track otherwise, including when there
    /// is no deadline at all.
    pub fn at(deadline: Option<DateTime<Utc>>, now: DateTime<Utc>, risk_window: Duration) -> Self {
        match deadline {
            None => SlaStatus::OnTrack,
            Some(deadline) if now > deadline => SlaStatus::Breached,
            Some(deadline) if deadline - now <= risk_window => SlaStatus::BreachRisk,
            Some(_) => SlaStatus::OnTrack,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SlaStatus::OnTrack => "On Track",
            SlaStatus::BreachRisk => "Breach Risk",
            SlaStatus::Breached => "Breached",
        }
    }
}

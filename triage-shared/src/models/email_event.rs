/// Email event model and database operations
///
/// An email event is the unit of triage work. Rows are created by the
/// ingestion pipeline and afterwards only state-transitioned: they are never
/// deleted and their `tenant_id` never changes (a trigger enforces the
/// latter).
///
/// Every read and write here takes a [`Scope`] and pushes its predicate into
/// the `WHERE` clause, so a caller can never touch a row outside its tenant,
/// department or assignments.
///
/// # Example
///
/// ```no_run
/// use triage_shared::auth::scope::Scope;
/// use triage_shared::models::email_event::{EmailEvent, EventFilter};
/// use triage_shared::db::pool::{create_pool, DatabaseConfig};
/// use uuid::Uuid;
///
/// # async fn example(tenant_id: Uuid, department_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
/// let scope = Scope::Department { tenant_id, department_id };
///
/// let events = EmailEvent::list_in_scope(&pool, &scope, &EventFilter::default()).await?;
/// println!("{} events visible", events.len());
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::auth::scope::Scope;
use crate::models::text_enum;

/// Value written to `resolution_expected` when a human starts replying
pub const RESOLUTION_REPLY_SENT: &str = "reply_sent";

/// Default page size for event listings
pub const DEFAULT_LIST_LIMIT: i64 = 100;

/// Largest page size a caller may request
pub const MAX_LIST_LIMIT: i64 = 500;

/// Lifecycle state of an email event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventState {
    Queued,
    Processing,
    Handled,
    NeedsAttention,
    Escalated,
    Error,
}

impl EventState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventState::Queued => "queued",
            EventState::Processing => "processing",
            EventState::Handled => "handled",
            EventState::NeedsAttention => "needs_attention",
            EventState::Escalated => "escalated",
            EventState::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(EventState::Queued),
            "processing" => Some(EventState::Processing),
            "handled" => Some(EventState::Handled),
            "needs_attention" => Some(EventState::NeedsAttention),
            "escalated" => Some(EventState::Escalated),
            "error" => Some(EventState::Error),
            _ => None,
        }
    }

    /// Whether the event sits in the escalation queue
    pub fn is_escalation(&self) -> bool {
        matches!(self, EventState::NeedsAttention | EventState::Escalated)
    }
}

text_enum!(EventState, "event state");

/// Event priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            "urgent" => Some(Priority::Urgent),
            _ => None,
        }
    }
}

text_enum!(Priority, "priority");

/// Mailbox provider the event was ingested from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailSource {
    Gmail,
    Outlook,
    Email,
}

impl EmailSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailSource::Gmail => "gmail",
            EmailSource::Outlook => "outlook",
            EmailSource::Email => "email",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "gmail" => Some(EmailSource::Gmail),
            "outlook" => Some(EmailSource::Outlook),
            "email" => Some(EmailSource::Email),
            _ => None,
        }
    }
}

text_enum!(EmailSource, "email source");

/// Who handled (or is handling) the event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandledBy {
    Ai,
    Human,
}

impl HandledBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandledBy::Ai => "ai",
            HandledBy::Human => "human",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ai" => Some(HandledBy::Ai),
            "human" => Some(HandledBy::Human),
            _ => None,
        }
    }
}

text_enum!(HandledBy, "handled_by");

/// Email event row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EmailEvent {
    pub id: Uuid,

    /// Owning tenant; immutable
    pub tenant_id: Uuid,

    pub subject: String,
    pub content: String,

    #[sqlx(try_from = "String")]
    pub source: EmailSource,

    /// Provider message ID of the inbound email
    pub external_message_id: Option<String>,
    pub thread_id: Option<String>,

    #[sqlx(try_from = "String")]
    pub handled_by: HandledBy,

    #[sqlx(try_from = "String")]
    pub current_state: EventState,

    #[sqlx(try_from = "String")]
    pub priority: Priority,

    /// Classifier confidence in `[0, 1]`
    pub confidence_score: Option<f64>,
    pub escalation_reason: Option<String>,
    pub assigned_user_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub sla_deadline: Option<DateTime<Utc>>,

    /// Number of times the SLA deadline was pushed back
    pub snooze_count: i32,

    /// A human is replying outside the system, pending confirmation
    pub pending_resolution: bool,
    pub resolution_expected: Option<String>,
    pub pending_since: Option<DateTime<Utc>>,

    /// Message ID captured when the event entered pending resolution
    ///
    /// Captured once; later transitions never re-derive it.
    pub evidence_message_id: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for inserting an event
///
/// Normally written by the ingestion pipeline; exposed here for seeding and
/// tests.
#[derive(Debug, Clone)]
pub struct NewEmailEvent {
    pub tenant_id: Uuid,
    pub subject: String,
    pub content: String,
    pub source: EmailSource,
    pub external_message_id: Option<String>,
    pub thread_id: Option<String>,
    pub current_state: EventState,
    pub priority: Priority,
    pub confidence_score: Option<f64>,
    pub escalation_reason: Option<String>,
    pub assigned_user_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub sla_deadline: Option<DateTime<Utc>>,
}

impl NewEmailEvent {
    /// A queued, AI-handled event with medium priority
    pub fn new(tenant_id: Uuid, subject: impl Into<String>) -> Self {
        Self {
            tenant_id,
            subject: subject.into(),
            content: String::new(),
            source: EmailSource::Email,
            external_message_id: None,
            thread_id: None,
            current_state: EventState::Queued,
            priority: Priority::Medium,
            confidence_score: None,
            escalation_reason: None,
            assigned_user_id: None,
            department_id: None,
            sla_deadline: None,
        }
    }
}

/// Filters for event listings
#[derive(Debug, Clone)]
pub struct EventFilter {
    pub state: Option<EventState>,
    pub limit: i64,
}

impl Default for EventFilter {
    fn default() -> Self {
        Self {
            state: None,
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

/// Escalation row joined with assignee and department names
///
/// The names are `None` when the relation is absent; the view layer turns
/// them into display sentinels.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EscalationRow {
    #[sqlx(flatten)]
    pub event: EmailEvent,
    pub assignee_name: Option<String>,
    pub department_name: Option<String>,
}

/// Role-scoped counters for the dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EventCounts {
    pub total: i64,
    pub escalations: i64,
    pub pending_resolution: i64,
    pub handled: i64,
    pub breached: i64,
    pub breach_risk: i64,
}

/// Column changes produced by an escalation action
///
/// `None` leaves a column untouched. The patch is applied as one
/// conditional `UPDATE` keyed by id, tenant and the caller's scope, plus the
/// preconditions in `require_open` and `snooze_below`. A row that fails any
/// of them is left alone and the write reports no match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPatch {
    pub assigned_user_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub escalation_reason: Option<String>,
    pub priority: Option<Priority>,
    pub sla_deadline: Option<DateTime<Utc>>,
    pub increment_snooze: bool,
    pub current_state: Option<EventState>,
    pub handled_by: Option<HandledBy>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub pending_resolution: Option<bool>,
    pub resolution_expected: Option<String>,

    /// Start of the pending clock; kept as is while the row is already pending
    pub pending_since: Option<DateTime<Utc>>,

    /// Sets `evidence_message_id` to `external_message_id` if not yet captured
    pub capture_evidence: bool,

    /// Only write while the row is not `handled`
    pub require_open: bool,

    /// Only write while `snooze_count` is below this value
    pub snooze_below: Option<i32>,
}

impl EventPatch {
    /// Whether the row still satisfies the patch's write preconditions
    pub fn admits(&self, event: &EmailEvent) -> bool {
        if self.require_open && event.current_state == EventState::Handled {
            return false;
        }
        match self.snooze_below {
            Some(limit) => event.snooze_count < limit,
            None => true,
        }
    }

    /// Applies the patch to an in-memory row
    ///
    /// Preconditions are not checked here; see [`EventPatch::admits`].
    pub fn apply(&self, event: &mut EmailEvent, now: DateTime<Utc>) {
        if let Some(id) = self.assigned_user_id {
            event.assigned_user_id = Some(id);
        }
        if let Some(id) = self.department_id {
            event.department_id = Some(id);
        }
        if let Some(reason) = &self.escalation_reason {
            event.escalation_reason = Some(reason.clone());
        }
        if let Some(priority) = self.priority {
            event.priority = priority;
        }
        if let Some(deadline) = self.sla_deadline {
            event.sla_deadline = Some(deadline);
        }
        if self.increment_snooze {
            event.snooze_count += 1;
        }
        if let Some(state) = self.current_state {
            event.current_state = state;
        }
        if let Some(handled_by) = self.handled_by {
            event.handled_by = handled_by;
        }
        if let Some(at) = self.resolved_at {
            event.resolved_at = Some(at);
        }
        if let Some(since) = self.pending_since {
            if !event.pending_resolution || event.pending_since.is_none() {
                event.pending_since = Some(since);
            }
        }
        if let Some(pending) = self.pending_resolution {
            event.pending_resolution = pending;
        }
        if let Some(expected) = &self.resolution_expected {
            event.resolution_expected = Some(expected.clone());
        }
        if self.capture_evidence && event.evidence_message_id.is_none() {
            event.evidence_message_id = event.external_message_id.clone();
        }
        event.updated_at = now;
    }

    fn push_assignments(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        if let Some(id) = self.assigned_user_id {
            qb.push(", assigned_user_id = ").push_bind(id);
        }
        if let Some(id) = self.department_id {
            qb.push(", department_id = ").push_bind(id);
        }
        if let Some(reason) = &self.escalation_reason {
            qb.push(", escalation_reason = ").push_bind(reason.clone());
        }
        if let Some(priority) = self.priority {
            qb.push(", priority = ").push_bind(priority.as_str());
        }
        if let Some(deadline) = self.sla_deadline {
            qb.push(", sla_deadline = ").push_bind(deadline);
        }
        if self.increment_snooze {
            qb.push(", snooze_count = snooze_count + 1");
        }
        if let Some(state) = self.current_state {
            qb.push(", current_state = ").push_bind(state.as_str());
        }
        if let Some(handled_by) = self.handled_by {
            qb.push(", handled_by = ").push_bind(handled_by.as_str());
        }
        if let Some(at) = self.resolved_at {
            qb.push(", resolved_at = ").push_bind(at);
        }
        if let Some(pending) = self.pending_resolution {
            qb.push(", pending_resolution = ").push_bind(pending);
        }
        if let Some(expected) = &self.resolution_expected {
            qb.push(", resolution_expected = ").push_bind(expected.clone());
        }
        if let Some(since) = self.pending_since {
            // Right-hand side sees the row before this update
            qb.push(", pending_since = CASE WHEN pending_resolution AND pending_since IS NOT NULL")
                .push(" THEN pending_since ELSE ")
                .push_bind(since)
                .push(" END");
        }
        if self.capture_evidence {
            qb.push(", evidence_message_id = COALESCE(evidence_message_id, external_message_id)");
        }
    }

    fn push_guards(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        if self.require_open {
            qb.push(" AND current_state <> 'handled'");
        }
        if let Some(limit) = self.snooze_below {
            qb.push(" AND snooze_count < ").push_bind(limit);
        }
    }
}

const EVENT_COLUMNS: &[&str] = &[
    "id",
    "tenant_id",
    "subject",
    "content",
    "source",
    "external_message_id",
    "thread_id",
    "handled_by",
    "current_state",
    "priority",
    "confidence_score",
    "escalation_reason",
    "assigned_user_id",
    "department_id",
    "sla_deadline",
    "snooze_count",
    "pending_resolution",
    "resolution_expected",
    "pending_since",
    "evidence_message_id",
    "resolved_at",
    "created_at",
    "updated_at",
];

/// Comma-separated event columns, optionally qualified with a table alias
fn columns(alias: Option<&str>) -> String {
    match alias {
        Some(alias) => EVENT_COLUMNS
            .iter()
            .map(|c| format!("{alias}.{c}"))
            .collect::<Vec<_>>()
            .join(", "),
        None => EVENT_COLUMNS.join(", "),
    }
}

impl EmailEvent {
    /// Inserts an event
    ///
    /// # Errors
    ///
    /// Returns an error if the tenant, assignee or department doesn't exist
    pub async fn create(pool: &PgPool, data: NewEmailEvent) -> Result<Self, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO email_events (
                tenant_id, subject, content, source, external_message_id, thread_id,
                current_state, priority, confidence_score, escalation_reason,
                assigned_user_id, department_id, sla_deadline
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {}
            "#,
            columns(None)
        );

        sqlx::query_as::<_, EmailEvent>(&sql)
            .bind(data.tenant_id)
            .bind(data.subject)
            .bind(data.content)
            .bind(data.source.as_str())
            .bind(data.external_message_id)
            .bind(data.thread_id)
            .bind(data.current_state.as_str())
            .bind(data.priority.as_str())
            .bind(data.confidence_score)
            .bind(data.escalation_reason)
            .bind(data.assigned_user_id)
            .bind(data.department_id)
            .bind(data.sla_deadline)
            .fetch_one(pool)
            .await
    }

    /// Finds an event by ID within a tenant, ignoring narrower scopes
    ///
    /// Callers use this to tell "does not exist" (404) apart from "exists
    /// but outside your scope" (403).
    pub async fn find_in_tenant(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM email_events WHERE id = $1 AND tenant_id = $2",
            columns(None)
        );

        sqlx::query_as::<_, EmailEvent>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    /// Lists events visible under a scope, newest first
    pub async fn list_in_scope(
        pool: &PgPool,
        scope: &Scope,
        filter: &EventFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM email_events WHERE ",
            columns(None)
        ));
        scope.push_event_predicate(&mut qb, "email_events");

        if let Some(state) = filter.state {
            qb.push(" AND current_state = ").push_bind(state.as_str());
        }

        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.limit.clamp(1, MAX_LIST_LIMIT));

        qb.build_query_as::<EmailEvent>().fetch_all(pool).await
    }

    /// Lists the escalation queue visible under a scope, newest first
    ///
    /// Joins the assignee and department names. The joins are constrained to
    /// the event's tenant so a stale foreign key can never surface another
    /// tenant's names.
    pub async fn list_escalations(
        pool: &PgPool,
        scope: &Scope,
    ) -> Result<Vec<EscalationRow>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            r#"
            SELECT {},
                   COALESCE(u.name, u.email::TEXT) AS assignee_name,
                   d.name AS department_name
            FROM email_events e
            LEFT JOIN users u ON u.id = e.assigned_user_id AND u.tenant_id = e.tenant_id
            LEFT JOIN departments d ON d.id = e.department_id AND d.tenant_id = e.tenant_id
            WHERE "#,
            columns(Some("e"))
        ));
        scope.push_event_predicate(&mut qb, "e");
        qb.push(" AND e.current_state IN ('needs_attention', 'escalated')");
        qb.push(" ORDER BY e.created_at DESC");

        qb.build_query_as::<EscalationRow>().fetch_all(pool).await
    }

    /// Applies a patch to one event, re-checking the caller's scope
    ///
    /// Returns `None` if no row matched `(id, tenant)` plus the scope
    /// predicate and the patch's preconditions.
    pub async fn apply_patch(
        pool: &PgPool,
        scope: &Scope,
        id: Uuid,
        patch: &EventPatch,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE email_events SET updated_at = NOW()");
        patch.push_assignments(&mut qb);

        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" AND ");
        scope.push_event_predicate(&mut qb, "email_events");
        patch.push_guards(&mut qb);
        qb.push(format!(" RETURNING {}", columns(None)));

        qb.build_query_as::<EmailEvent>().fetch_optional(pool).await
    }

    /// Counts events under a scope for the dashboard
    ///
    /// SLA counters only consider open escalations.
    pub async fn count_in_scope(
        pool: &PgPool,
        scope: &Scope,
        now: DateTime<Utc>,
        risk_window: Duration,
    ) -> Result<EventCounts, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE current_state IN ('needs_attention', 'escalated')) AS escalations,
                COUNT(*) FILTER (WHERE pending_resolution AND current_state <> 'handled') AS pending_resolution,
                COUNT(*) FILTER (WHERE current_state = 'handled') AS handled,
                COUNT(*) FILTER (WHERE current_state IN ('needs_attention', 'escalated') AND sla_deadline < "#,
        );
        qb.push_bind(now);
        qb.push(
            r#") AS breached,
                COUNT(*) FILTER (WHERE current_state IN ('needs_attention', 'escalated') AND sla_deadline >= "#,
        );
        qb.push_bind(now);
        qb.push(" AND sla_deadline <= ");
        qb.push_bind(now + risk_window);
        qb.push(") AS breach_risk FROM email_events WHERE ");
        scope.push_event_predicate(&mut qb, "email_events");

        qb.build_query_as::<EventCounts>().fetch_one(pool).await
    }
}

use chrono::{DateTime, Utc};
use ensemble_core::AgentType;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a handoff.
///
/// Legal transitions: `pending → in_progress` via accept,
/// `in_progress → completed | failed`, `pending → rejected`, and any
/// non-terminal state `→ cancelled` or `→ failed` on timeout. Terminal
/// states never transition again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffStatus {
    /// Created, waiting for the target to accept.
    Pending,
    /// The target is working on it.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully, including by timeout.
    Failed,
    /// Declined by the target before starting.
    Rejected,
    /// Withdrawn before reaching another terminal state.
    Cancelled,
}

impl HandoffStatus {
    /// Whether this state admits no further transitions.
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            HandoffStatus::Completed
                | HandoffStatus::Failed
                | HandoffStatus::Rejected
                | HandoffStatus::Cancelled
        )
    }

    /// The snake_case wire name of this status.
    pub const fn as_str(&self) -> &'static str {
        match self {
            HandoffStatus::Pending => "pending",
            HandoffStatus::InProgress => "in_progress",
            HandoffStatus::Completed => "completed",
            HandoffStatus::Failed => "failed",
            HandoffStatus::Rejected => "rejected",
            HandoffStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for HandoffStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Scheduling priority of a handoff, used to order pending queues.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum HandoffPriority {
    /// Can wait.
    Low,
    /// Normal delegation.
    #[default]
    Medium,
    /// Blocks other work.
    High,
}

impl std::fmt::Display for HandoffPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandoffPriority::Low => write!(f, "low"),
            HandoffPriority::Medium => write!(f, "medium"),
            HandoffPriority::High => write!(f, "high"),
        }
    }
}

/// Immutable record of a delegation request.
///
/// Snapshots the timeout that applied when the request was made, so later
/// policy changes never affect handoffs already in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffRequest {
    /// Unique handoff identifier.
    pub id: Uuid,
    /// The worker type delegating the work.
    pub source: AgentType,
    /// The worker type asked to take it.
    pub target: AgentType,
    /// What the target is asked to do.
    pub task: String,
    /// Context the source passes along.
    pub context: serde_json::Value,
    /// What the source expects back.
    #[serde(default)]
    pub expectations: Vec<String>,
    /// Scheduling priority.
    pub priority: HandoffPriority,
    /// Deadline for reaching a terminal state, in milliseconds.
    pub timeout_ms: u64,
    /// Opaque data echoed back to the source on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<serde_json::Value>,
    /// UTC timestamp of when the handoff was requested.
    pub created_at: DateTime<Utc>,
}

/// Optional fields of a handoff request.
#[derive(Debug, Clone, Default)]
pub struct HandoffOptions {
    /// Context the source passes along. Defaults to `Null`.
    pub context: serde_json::Value,
    /// What the source expects back.
    pub expectations: Vec<String>,
    /// Scheduling priority. Defaults to medium.
    pub priority: HandoffPriority,
    /// Per-handoff timeout override. Defaults to the policy timeout.
    pub timeout_ms: Option<u64>,
    /// Opaque data echoed back to the source on completion.
    pub callback_data: Option<serde_json::Value>,
}

impl HandoffOptions {
    /// Sets the delegation context.
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    /// Sets the expectations list.
    pub fn with_expectations(mut self, expectations: Vec<String>) -> Self {
        self.expectations = expectations;
        self
    }

    /// Sets the scheduling priority.
    pub fn with_priority(mut self, priority: HandoffPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Overrides the policy timeout for this handoff.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Attaches callback data.
    pub fn with_callback_data(mut self, callback_data: serde_json::Value) -> Self {
        self.callback_data = Some(callback_data);
        self
    }
}

/// Terminal outcome of a handoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffResult {
    /// The handoff this result belongs to.
    pub handoff_id: Uuid,
    /// The terminal status reached.
    pub status: HandoffStatus,
    /// Whether the handoff completed successfully.
    pub success: bool,
    /// Artifacts the target produced.
    pub artifacts: serde_json::Value,
    /// Notes the target attached.
    #[serde(default)]
    pub notes: Vec<String>,
    /// Time from start (or creation, if never started) to the terminal
    /// transition, in milliseconds.
    pub duration_ms: u64,
    /// Why the handoff ended, for unsuccessful outcomes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// UTC timestamp of the terminal transition.
    pub completed_at: DateTime<Utc>,
}

/// A tracked handoff together with its current lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveHandoff {
    /// The request that created it.
    pub request: HandoffRequest,
    /// Current lifecycle state.
    pub status: HandoffStatus,
    /// When work actually started, once accepted or auto-started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// The terminal outcome, once one is reached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<HandoffResult>,
}

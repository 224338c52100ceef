use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::task::AgentType;

/// Default broadcast capacity for a freshly created [`EventBus`].
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Phase of an orchestration run, as reported in progress updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressPhase {
    /// Analyzing the task and building the plan.
    Planning,
    /// Dispatching plan steps to workers.
    Executing,
    /// Synthesizing results and scoring the run.
    Reviewing,
    /// The run finished.
    Complete,
    /// The run could not produce a plan.
    Failed,
}

impl std::fmt::Display for ProgressPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgressPhase::Planning => write!(f, "planning"),
            ProgressPhase::Executing => write!(f, "executing"),
            ProgressPhase::Reviewing => write!(f, "reviewing"),
            ProgressPhase::Complete => write!(f, "complete"),
            ProgressPhase::Failed => write!(f, "failed"),
        }
    }
}

/// Coarse progress of one orchestration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// The task being orchestrated.
    pub task_id: String,
    /// Current phase.
    pub phase: ProgressPhase,
    /// Completion estimate in percent, monotone within a run.
    pub percent: u8,
    /// Human-readable status line.
    pub message: String,
    /// The worker type currently executing, during the executing phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_worker: Option<AgentType>,
}

/// Lifecycle events of individual plan steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepEvent {
    /// A step was dispatched to a worker.
    Started {
        /// The task being orchestrated.
        task_id: String,
        /// The dispatched step.
        step_id: String,
        /// The worker type it was dispatched to.
        agent_type: AgentType,
    },
    /// A step completed successfully.
    Completed {
        /// The task being orchestrated.
        task_id: String,
        /// The completed step.
        step_id: String,
        /// The worker type that completed it.
        agent_type: AgentType,
    },
    /// A step failed, either reported by the worker or via a dispatch fault.
    Failed {
        /// The task being orchestrated.
        task_id: String,
        /// The failed step.
        step_id: String,
        /// The worker type the step was addressed to.
        agent_type: AgentType,
        /// What went wrong.
        error: String,
    },
    /// A worker asked for the remaining plan to be reconsidered.
    ReplanningRequested {
        /// The task being orchestrated.
        task_id: String,
        /// The step whose result requested replanning.
        step_id: String,
        /// The worker type that requested it.
        agent_type: AgentType,
    },
}

/// Lifecycle events of delegated handoffs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffEvent {
    /// A handoff was created.
    Requested {
        /// The new handoff.
        id: Uuid,
        /// The delegating worker type.
        source: AgentType,
        /// The worker type asked to take the work.
        target: AgentType,
    },
    /// A pending handoff was accepted by its target.
    Accepted {
        /// The accepted handoff.
        id: Uuid,
    },
    /// A pending handoff was declined by its target.
    Rejected {
        /// The rejected handoff.
        id: Uuid,
        /// Why it was declined.
        reason: String,
    },
    /// A handoff finished successfully.
    Completed {
        /// The completed handoff.
        id: Uuid,
    },
    /// A handoff failed, including by timeout.
    Failed {
        /// The failed handoff.
        id: Uuid,
        /// Why it failed.
        reason: String,
    },
    /// A handoff was withdrawn before reaching a terminal state.
    Cancelled {
        /// The cancelled handoff.
        id: Uuid,
        /// Why it was withdrawn.
        reason: String,
    },
    /// The routing policy was replaced.
    PolicyUpdated,
}

/// Anything observers of the coordination core can be notified about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Notification {
    /// Coarse run progress.
    Progress(ProgressUpdate),
    /// A step lifecycle event.
    Step(StepEvent),
    /// A handoff lifecycle event.
    Handoff(HandoffEvent),
}

/// Fan-out notification channel shared by the orchestrator and the
/// handoff manager.
///
/// Publishing never blocks and never fails: with no subscribers the
/// notification is dropped, and a subscriber that falls more than the
/// channel capacity behind loses the oldest notifications first.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Notification>,
}

impl EventBus {
    /// Creates a bus that buffers up to `capacity` notifications per
    /// subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Registers a new subscriber. Only notifications published after this
    /// call are observed.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    /// Publishes a notification to all current subscribers.
    pub fn publish(&self, notification: Notification) {
        // Err means no live subscribers, which is fine.
        let _ = self.tx.send(notification);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

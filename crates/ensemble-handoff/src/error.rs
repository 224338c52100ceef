use ensemble_core::AgentType;
use uuid::Uuid;

use crate::types::HandoffStatus;

/// Errors raised by handoff operations.
///
/// Every variant is a caller-visible refusal: the manager's internal state
/// is unchanged whenever one is returned.
#[derive(Debug, thiserror::Error)]
pub enum HandoffError {
    /// The policy does not permit this source/target pair.
    #[error("Policy does not allow handoffs from {source_agent} to {target}")]
    RouteDenied {
        /// The delegating worker type.
        source_agent: AgentType,
        /// The worker type it tried to delegate to.
        target: AgentType,
    },

    /// The target type is already at its concurrency limit.
    #[error("Target {target} already has {active} active handoffs (limit {limit})")]
    CapacityExceeded {
        /// The saturated worker type.
        target: AgentType,
        /// Non-terminal handoffs it currently holds.
        active: usize,
        /// The policy limit that was hit.
        limit: usize,
    },

    /// No handoff with this ID exists.
    #[error("Handoff {0} not found")]
    NotFound(Uuid),

    /// The handoff exists but its state does not permit the operation.
    #[error("Handoff {id} is {status}, cannot {operation}")]
    InvalidState {
        /// The handoff the operation addressed.
        id: Uuid,
        /// Its state at the time of the call.
        status: HandoffStatus,
        /// The operation that was refused.
        operation: &'static str,
    },
}

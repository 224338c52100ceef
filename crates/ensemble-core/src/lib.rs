//! Shared types and contracts for the Ensemble coordination core.
//!
//! This crate provides the data model exchanged between the orchestrator
//! and the handoff manager, the traits external collaborators implement,
//! and the notification bus both subsystems publish to.
//!
//! # Main types
//!
//! - [`EnsembleError`] — Unified error enum for all Ensemble subsystems.
//! - [`EnsembleResult`] — Convenience alias for `Result<T, EnsembleError>`.
//! - [`ComplexTask`] — A unit of work submitted for orchestration.
//! - [`TaskAnalysis`] — Validated classification of a task.
//! - [`ExecutionPlan`] — Dependency-ordered steps for one task.
//! - [`AgentResult`] — What one worker reported for one step.
//! - [`OrchestrationResult`] — The terminal outcome of a run.
//! - [`Worker`] — The contract specialized agents implement.
//! - [`EventBus`] — Fan-out channel for progress, step, and handoff events.

/// Notification bus and event payloads.
pub mod events;
/// Per-step and per-run outcome types.
pub mod outcome;
/// Execution plans and their steps.
pub mod plan;
/// Tasks and their analyzed classification.
pub mod task;
/// Contracts for workers, completion backends, and contextual memory.
pub mod worker;

pub use events::{
    EventBus, HandoffEvent, Notification, ProgressPhase, ProgressUpdate, StepEvent,
    DEFAULT_EVENT_CAPACITY,
};
pub use outcome::{AgentResult, FinalOutput, OrchestrationResult};
pub use plan::{ExecutionPlan, ExecutionStep, RiskLevel};
pub use task::{AgentType, ComplexTask, TaskAnalysis, TaskComplexity, TaskType};
pub use worker::{
    AgentContext, ChatMessage, ChatRole, CompletionClient, ContextMemory, NullMemory, Worker,
    WorkerInfo,
};

/// Top-level error type for the Ensemble coordination core.
///
/// Each variant corresponds to a subsystem or collaborator that can
/// produce errors.
#[derive(Debug, thiserror::Error)]
pub enum EnsembleError {
    /// An error raised while classifying a task.
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// An error raised while building or validating an execution plan.
    #[error("Planning error: {0}")]
    Planning(String),

    /// A fault raised by a worker during step execution.
    #[error("Worker error: {0}")]
    Worker(String),

    /// An error from the chat-completion backend.
    #[error("Completion error: {0}")]
    Completion(String),

    /// An error from the contextual memory backend.
    #[error("Memory error: {0}")]
    Memory(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A convenience `Result` alias using [`EnsembleError`].
pub type EnsembleResult<T> = Result<T, EnsembleError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EnsembleError::Worker("tester crashed".to_string());
        assert_eq!(err.to_string(), "Worker error: tester crashed");
    }

    #[test]
    fn test_json_error_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: EnsembleError = parse_err.into();
        assert!(matches!(err, EnsembleError::Json(_)));
    }
}

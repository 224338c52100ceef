use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::task::AgentType;

/// What one worker reported (or was recorded as) for one step.
///
/// Workers return these from [`Worker::execute`](crate::worker::Worker::execute).
/// The orchestrator also records one per faulted dispatch, so a run's result
/// list covers every step that was attempted, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    /// The step this result belongs to.
    pub step_id: String,
    /// The worker type that produced it.
    pub agent_type: AgentType,
    /// Whether the worker considers the step done.
    pub success: bool,
    /// Worker-specific output. Reviewers report `{"score": ..}`, debuggers
    /// `{"coverage": ..}`; other shapes are passed through untouched.
    pub output: serde_json::Value,
    /// Wall-clock time the step took, in milliseconds.
    pub duration_ms: u64,
    /// Self-reported confidence in `[0, 1]`, if the worker reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Problems encountered while executing the step.
    #[serde(default)]
    pub issues: Vec<String>,
    /// Set when the worker believes the remaining plan is no longer viable.
    #[serde(default)]
    pub requires_replanning: bool,
}

impl AgentResult {
    /// Creates a successful result with the given output.
    pub fn success(
        step_id: impl Into<String>,
        agent_type: AgentType,
        output: serde_json::Value,
    ) -> Self {
        Self {
            step_id: step_id.into(),
            agent_type,
            success: true,
            output,
            duration_ms: 0,
            confidence: None,
            issues: Vec::new(),
            requires_replanning: false,
        }
    }

    /// Creates a failed result carrying the given issues.
    pub fn failure(step_id: impl Into<String>, agent_type: AgentType, issues: Vec<String>) -> Self {
        Self {
            step_id: step_id.into(),
            agent_type,
            success: false,
            output: serde_json::Value::Null,
            duration_ms: 0,
            confidence: None,
            issues,
            requires_replanning: false,
        }
    }

    /// Sets the self-reported confidence.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Sets the measured duration.
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Sets the issue list.
    pub fn with_issues(mut self, issues: Vec<String>) -> Self {
        self.issues = issues;
        self
    }

    /// Marks the result as requesting a replan of the remaining steps.
    pub fn with_replanning(mut self) -> Self {
        self.requires_replanning = true;
        self
    }
}

/// Synthesis of a run's per-step results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalOutput {
    /// Most recent successful output per worker type.
    pub outputs: HashMap<AgentType, serde_json::Value>,
    /// How many attempted steps succeeded.
    pub successful_steps: usize,
    /// Mean of the reported confidences, when any were reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_confidence: Option<f64>,
    /// Total issues across all results.
    pub total_issues: usize,
}

/// The terminal outcome of one orchestration run.
///
/// `success` reflects whether the run itself completed (analysis and
/// planning succeeded and the step loop ran to the end), not whether every
/// step did: partial failures still yield `success == true` with the
/// failures visible in `results` and in `overall_score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationResult {
    /// The task this run executed.
    pub task_id: String,
    /// Whether the run completed.
    pub success: bool,
    /// One entry per attempted step, in dispatch order. Skipped steps do
    /// not appear.
    pub results: Vec<AgentResult>,
    /// Synthesis of `results`.
    pub final_output: FinalOutput,
    /// Wall-clock time for the whole run, in milliseconds.
    pub total_duration_ms: u64,
    /// Steps that completed successfully.
    pub steps_completed: usize,
    /// Steps the plan contained.
    pub steps_total: usize,
    /// Weighted quality blend in `[0, 1]`.
    pub overall_score: f64,
}

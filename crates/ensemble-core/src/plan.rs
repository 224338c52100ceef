use serde::{Deserialize, Serialize};

use crate::task::{AgentType, TaskComplexity};

/// Aggregate risk of executing a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Routine work, low blast radius.
    Low,
    /// Needs attention but not unusual.
    Medium,
    /// Complex or risk-heavy work.
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

/// A single step within an [`ExecutionPlan`], addressed to one worker type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    /// Plan-unique step identifier.
    pub id: String,
    /// The worker type this step is addressed to.
    pub agent_type: AgentType,
    /// What the worker is asked to do.
    pub description: String,
    /// IDs of steps that must complete successfully before this one runs.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Requirements the worker must honor for this step.
    #[serde(default)]
    pub requirements: Vec<String>,
}

impl ExecutionStep {
    /// Creates a step with no dependencies or requirements.
    pub fn new(
        id: impl Into<String>,
        agent_type: AgentType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            agent_type,
            description: description.into(),
            dependencies: Vec::new(),
            requirements: Vec::new(),
        }
    }

    /// Sets the step dependencies.
    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Sets the step requirements.
    pub fn with_requirements(mut self, requirements: Vec<String>) -> Self {
        self.requirements = requirements;
        self
    }

    /// Whether every dependency of this step appears in `completed_ids`.
    pub fn is_ready(&self, completed_ids: &std::collections::HashSet<String>) -> bool {
        self.dependencies.iter().all(|dep| completed_ids.contains(dep))
    }
}

/// An ordered set of steps produced by the planner for one task.
///
/// Dependencies only ever point at earlier steps, so walking `steps` in
/// order never encounters a forward reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// The task this plan was built for.
    pub task_id: String,
    /// Steps in execution order.
    pub steps: Vec<ExecutionStep>,
    /// Rough wall-clock estimate for the whole plan, in minutes.
    pub estimated_duration_mins: u32,
    /// Aggregate risk of the plan.
    pub risk_level: RiskLevel,
    /// Complexity carried over from the analysis that produced this plan.
    pub complexity: TaskComplexity,
}

impl ExecutionPlan {
    /// Looks up a step by ID.
    pub fn step(&self, id: &str) -> Option<&ExecutionStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Number of steps in the plan.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the plan has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

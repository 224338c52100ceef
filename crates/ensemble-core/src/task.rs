use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Specialization of a worker in the multi-agent system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    /// Designs structure and interfaces before any code is written.
    Architect,
    /// Implements the task.
    Coder,
    /// Writes and runs tests against the implementation.
    Tester,
    /// Reviews finished work and scores its quality.
    Reviewer,
    /// Diagnoses defects and reports coverage.
    Debugger,
    /// Profiles and tunes the result.
    Optimizer,
}

impl AgentType {
    /// Every known agent type, in foundational precedence order.
    pub const ALL: [AgentType; 6] = [
        AgentType::Architect,
        AgentType::Coder,
        AgentType::Debugger,
        AgentType::Optimizer,
        AgentType::Tester,
        AgentType::Reviewer,
    ];

    /// The lowercase wire name of this agent type.
    pub const fn as_str(&self) -> &'static str {
        match self {
            AgentType::Architect => "architect",
            AgentType::Coder => "coder",
            AgentType::Tester => "tester",
            AgentType::Reviewer => "reviewer",
            AgentType::Debugger => "debugger",
            AgentType::Optimizer => "optimizer",
        }
    }

    /// Parses a lowercase agent type name. Returns `None` for unknown names.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "architect" => Some(AgentType::Architect),
            "coder" => Some(AgentType::Coder),
            "tester" => Some(AgentType::Tester),
            "reviewer" => Some(AgentType::Reviewer),
            "debugger" => Some(AgentType::Debugger),
            "optimizer" => Some(AgentType::Optimizer),
            _ => None,
        }
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Category of work a task represents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// New functionality. The default when classification is inconclusive.
    #[default]
    Feature,
    /// Something is broken and needs fixing.
    Bug,
    /// Restructuring without behavior change.
    Refactor,
    /// Architecture or interface design work.
    Design,
    /// Shipping or rollout work.
    Deployment,
    /// Performance or resource tuning.
    Optimization,
}

impl TaskType {
    /// Parses a lowercase task type name. Returns `None` for unknown names.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "feature" => Some(TaskType::Feature),
            "bug" => Some(TaskType::Bug),
            "refactor" => Some(TaskType::Refactor),
            "design" => Some(TaskType::Design),
            "deployment" => Some(TaskType::Deployment),
            "optimization" => Some(TaskType::Optimization),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskType::Feature => write!(f, "feature"),
            TaskType::Bug => write!(f, "bug"),
            TaskType::Refactor => write!(f, "refactor"),
            TaskType::Design => write!(f, "design"),
            TaskType::Deployment => write!(f, "deployment"),
            TaskType::Optimization => write!(f, "optimization"),
        }
    }
}

/// Estimated size of a task, used to scale plans and duration estimates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskComplexity {
    /// Small, self-contained change.
    Simple,
    /// Typical multi-step change. The default when classification is inconclusive.
    #[default]
    Medium,
    /// Large or system-wide change.
    Complex,
}

impl TaskComplexity {
    /// Parses a lowercase complexity name. Returns `None` for unknown names.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "simple" => Some(TaskComplexity::Simple),
            "medium" => Some(TaskComplexity::Medium),
            "complex" => Some(TaskComplexity::Complex),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskComplexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskComplexity::Simple => write!(f, "simple"),
            TaskComplexity::Medium => write!(f, "medium"),
            TaskComplexity::Complex => write!(f, "complex"),
        }
    }
}

/// A unit of work submitted to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexTask {
    /// Caller-assigned identifier, echoed back in results and events.
    pub id: String,
    /// Free-text description of what needs to be done.
    pub description: String,
    /// Functional requirements the result must satisfy.
    #[serde(default)]
    pub requirements: Vec<String>,
    /// Constraints the work must respect (deadlines, budgets, style rules).
    #[serde(default)]
    pub constraints: Vec<String>,
    /// Arbitrary caller-supplied metadata, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// UTC timestamp of when the task was created.
    pub created_at: DateTime<Utc>,
}

impl ComplexTask {
    /// Creates a new task with the given ID and description.
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            requirements: Vec::new(),
            constraints: Vec::new(),
            metadata: None,
            created_at: Utc::now(),
        }
    }

    /// Sets the functional requirements.
    pub fn with_requirements(mut self, requirements: Vec<String>) -> Self {
        self.requirements = requirements;
        self
    }

    /// Sets the constraints.
    pub fn with_constraints(mut self, constraints: Vec<String>) -> Self {
        self.constraints = constraints;
        self
    }

    /// Attaches caller metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Classification of a task produced by the analyzer.
///
/// Always well-formed: every field is validated or defaulted at
/// construction, so downstream components never re-check it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAnalysis {
    /// Category of work.
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// Estimated size.
    pub complexity: TaskComplexity,
    /// Deduplicated, never empty. Order is preserved from the source.
    pub required_agents: Vec<AgentType>,
    /// Rough step count estimate. Informational only.
    pub estimated_steps: u32,
    /// Risks called out during analysis.
    #[serde(default)]
    pub risks: Vec<String>,
    /// Opportunities called out during analysis.
    #[serde(default)]
    pub opportunities: Vec<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_type_parse_roundtrip() {
        for agent in AgentType::ALL {
            assert_eq!(AgentType::parse(agent.as_str()), Some(agent));
        }
        assert_eq!(AgentType::parse("wizard"), None);
        assert_eq!(AgentType::parse("Coder"), None);
    }

    #[test]
    fn test_agent_type_display() {
        assert_eq!(AgentType::Architect.to_string(), "architect");
        assert_eq!(AgentType::Debugger.to_string(), "debugger");
    }

    #[test]
    fn test_task_type_defaults_to_feature() {
        assert_eq!(TaskType::default(), TaskType::Feature);
        assert_eq!(TaskComplexity::default(), TaskComplexity::Medium);
    }

    #[test]
    fn test_task_type_serialization() {
        let json = serde_json::to_string(&TaskType::Deployment).unwrap();
        assert_eq!(json, "\"deployment\"");
        let parsed: TaskType = serde_json::from_str("\"bug\"").unwrap();
        assert_eq!(parsed, TaskType::Bug);
    }

    #[test]
    fn test_complex_task_builders() {
        let task = ComplexTask::new("task-1", "Add rate limiting to the API")
            .with_requirements(vec!["per-client limits".to_string()])
            .with_constraints(vec!["no new dependencies".to_string()]);
        assert_eq!(task.id, "task-1");
        assert_eq!(task.requirements.len(), 1);
        assert_eq!(task.constraints.len(), 1);
        assert!(task.metadata.is_none());
    }

    #[test]
    fn test_task_analysis_serde_field_names() {
        let analysis = TaskAnalysis {
            task_type: TaskType::Bug,
            complexity: TaskComplexity::Simple,
            required_agents: vec![AgentType::Coder],
            estimated_steps: 2,
            risks: vec![],
            opportunities: vec![],
        };
        let json = serde_json::to_value(&analysis).unwrap();
        assert_eq!(json["type"], "bug");
        assert_eq!(json["required_agents"][0], "coder");
    }
}

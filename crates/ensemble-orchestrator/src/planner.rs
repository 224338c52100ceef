use std::collections::HashSet;

use ensemble_core::{
    AgentType, ComplexTask, EnsembleError, EnsembleResult, ExecutionPlan, ExecutionStep, RiskLevel,
    TaskAnalysis, TaskComplexity,
};
use tracing::debug;

/// Foundational precedence, layer by layer: design before implementation,
/// implementation before verification, review last. Steps within the
/// verification layer are independent of each other.
const LAYERS: [&[AgentType]; 4] = [
    &[AgentType::Architect],
    &[AgentType::Coder],
    &[AgentType::Debugger, AgentType::Optimizer, AgentType::Tester],
    &[AgentType::Reviewer],
];

/// Turns a task analysis into a dependency-ordered execution plan.
///
/// Emits one step per required worker type with ids `step-1..step-N` in
/// layer order. Every step depends on all steps of the nearest populated
/// earlier layer, so verification steps fan out from the implementation
/// and the review joins them back together.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionPlanner;

impl ExecutionPlanner {
    /// Creates a planner.
    pub fn new() -> Self {
        Self
    }

    /// Builds and validates a plan for `task` from its analysis.
    pub fn plan(
        &self,
        task: &ComplexTask,
        analysis: &TaskAnalysis,
    ) -> EnsembleResult<ExecutionPlan> {
        let mut steps: Vec<ExecutionStep> = Vec::new();
        let mut previous_layer: Vec<String> = Vec::new();

        for layer in LAYERS {
            let mut current_layer = Vec::new();
            for &agent in layer {
                if !analysis.required_agents.contains(&agent) {
                    continue;
                }
                let id = format!("step-{}", steps.len() + 1);
                steps.push(
                    ExecutionStep::new(id.clone(), agent, describe_step(agent, task))
                        .with_dependencies(previous_layer.clone())
                        .with_requirements(task.requirements.clone()),
                );
                current_layer.push(id);
            }
            if !current_layer.is_empty() {
                previous_layer = current_layer;
            }
        }

        let plan = ExecutionPlan {
            task_id: task.id.clone(),
            steps,
            estimated_duration_mins: estimate_duration(analysis),
            risk_level: assess_risk(analysis),
            complexity: analysis.complexity,
        };
        validate(&plan)?;
        debug!(
            task_id = %task.id,
            steps = plan.len(),
            risk = %plan.risk_level,
            "Execution plan built"
        );
        Ok(plan)
    }
}

fn describe_step(agent: AgentType, task: &ComplexTask) -> String {
    match agent {
        AgentType::Architect => {
            format!("Design the structure and interfaces for: {}", task.description)
        }
        AgentType::Coder => format!("Implement: {}", task.description),
        AgentType::Debugger => {
            format!("Diagnose defects and verify coverage for: {}", task.description)
        }
        AgentType::Optimizer => format!("Profile and optimize: {}", task.description),
        AgentType::Tester => format!("Write and run tests covering: {}", task.description),
        AgentType::Reviewer => format!("Review the finished work for: {}", task.description),
    }
}

fn base_minutes(agent: AgentType) -> u32 {
    match agent {
        AgentType::Architect => 30,
        AgentType::Coder => 45,
        AgentType::Debugger => 30,
        AgentType::Optimizer => 25,
        AgentType::Tester => 30,
        AgentType::Reviewer => 20,
    }
}

fn estimate_duration(analysis: &TaskAnalysis) -> u32 {
    let base: u32 = analysis.required_agents.iter().map(|&agent| base_minutes(agent)).sum();
    let multiplier = match analysis.complexity {
        TaskComplexity::Simple => 1,
        TaskComplexity::Medium => 2,
        TaskComplexity::Complex => 3,
    };
    base * multiplier
}

fn assess_risk(analysis: &TaskAnalysis) -> RiskLevel {
    if analysis.complexity == TaskComplexity::Complex || analysis.risks.len() >= 3 {
        RiskLevel::High
    } else if analysis.complexity == TaskComplexity::Medium || !analysis.risks.is_empty() {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// A plan must have steps, plan-unique ids, and dependencies that only
/// point at earlier steps.
fn validate(plan: &ExecutionPlan) -> EnsembleResult<()> {
    if plan.is_empty() {
        return Err(EnsembleError::Planning(format!(
            "plan for task {} has no steps",
            plan.task_id
        )));
    }
    let mut seen: HashSet<&str> = HashSet::new();
    for step in &plan.steps {
        for dep in &step.dependencies {
            if !seen.contains(dep.as_str()) {
                return Err(EnsembleError::Planning(format!(
                    "step {} depends on {dep}, which is not an earlier step",
                    step.id
                )));
            }
        }
        if !seen.insert(&step.id) {
            return Err(EnsembleError::Planning(format!("duplicate step id {}", step.id)));
        }
    }
    Ok(())
}

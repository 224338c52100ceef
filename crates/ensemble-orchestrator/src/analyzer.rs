use std::sync::Arc;

use ensemble_core::{
    AgentType, ChatMessage, ComplexTask, CompletionClient, TaskAnalysis, TaskComplexity, TaskType,
};
use tracing::{debug, warn};

/// System prompt for the classification call. The response contract is a
/// single JSON object; anything else drops us to the keyword tier.
const ANALYSIS_PROMPT: &str = r#"You are the task analyst of a multi-agent engineering team.
Classify the task you are given. Respond with a single JSON object and no other text:
{
  "type": "feature" | "bug" | "refactor" | "design" | "deployment" | "optimization",
  "complexity": "simple" | "medium" | "complex",
  "requiredAgents": ["architect", "coder", "tester", "reviewer", "debugger", "optimizer"],
  "estimatedSteps": <number>,
  "risks": ["..."],
  "opportunities": ["..."]
}
Pick only the agents the task actually needs."#;

/// Why a completion response could not be read as a structured analysis.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisParseError {
    /// The response held no balanced `{...}` region at all.
    #[error("No JSON object in analysis response")]
    NoJsonObject,
    /// Balanced candidates were found but none parsed; carries the parse
    /// error from the first candidate.
    #[error("No candidate in analysis response parsed as JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Classifies tasks, degrading gracefully when the completion backend
/// misbehaves.
///
/// Three tiers: a structured JSON response from the backend, keyword
/// heuristics over an unparseable response, and a fixed conservative
/// fallback when the call itself fails. Every tier yields a well-formed
/// [`TaskAnalysis`], so analysis as a whole never fails.
pub struct TaskAnalyzer {
    client: Arc<dyn CompletionClient>,
}

impl TaskAnalyzer {
    /// Creates an analyzer backed by the given completion client.
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    /// Classifies a task. Infallible; see the type-level docs for the
    /// degradation tiers.
    pub async fn analyze(&self, task: &ComplexTask) -> TaskAnalysis {
        match self.client.chat(&build_messages(task)).await {
            Ok(response) => match parse_analysis(&response) {
                Ok(analysis) => {
                    debug!(
                        task_id = %task.id,
                        task_type = %analysis.task_type,
                        complexity = %analysis.complexity,
                        "Task classified from structured response"
                    );
                    analysis
                }
                Err(err) => {
                    warn!(
                        task_id = %task.id,
                        error = %err,
                        "Unparseable analysis response, falling back to keyword heuristics"
                    );
                    heuristic_analysis(&response)
                }
            },
            Err(err) => {
                warn!(
                    task_id = %task.id,
                    error = %err,
                    "Completion backend unavailable, using fixed fallback analysis"
                );
                fallback_analysis()
            }
        }
    }
}

fn build_messages(task: &ComplexTask) -> Vec<ChatMessage> {
    let mut prompt = format!("Task: {}", task.description);
    if !task.requirements.is_empty() {
        prompt.push_str("\nRequirements:");
        for requirement in &task.requirements {
            prompt.push_str(&format!("\n- {requirement}"));
        }
    }
    if !task.constraints.is_empty() {
        prompt.push_str("\nConstraints:");
        for constraint in &task.constraints {
            prompt.push_str(&format!("\n- {constraint}"));
        }
    }
    vec![ChatMessage::system(ANALYSIS_PROMPT), ChatMessage::user(prompt)]
}

/// Extracts the first well-formed JSON object from `text` and reads an
/// analysis out of it, defaulting each missing or malformed field
/// independently.
///
/// The scanner is brace-matching and string-aware, so objects embedded in
/// prose or fenced code blocks parse fine, and an unparseable candidate
/// does not stop the scan. Text with no balanced region at all is
/// [`AnalysisParseError::NoJsonObject`]; candidates that all fail come
/// back as [`AnalysisParseError::Json`] with the first parse error.
pub fn parse_analysis(text: &str) -> Result<TaskAnalysis, AnalysisParseError> {
    let value = extract_json_object(text)?;
    Ok(analysis_from_value(&value))
}

/// Infers an analysis from keyword matches over the lowercased text.
/// Always selects at least the coder.
pub fn heuristic_analysis(text: &str) -> TaskAnalysis {
    let lowered = text.to_lowercase();
    let contains_any = |needles: &[&str]| needles.iter().any(|needle| lowered.contains(needle));

    let task_type = if contains_any(&["bug", "fix", "error", "crash", "regression"]) {
        TaskType::Bug
    } else if contains_any(&["refactor", "restructure", "clean up", "cleanup"]) {
        TaskType::Refactor
    } else if contains_any(&["deploy", "release", "rollout", "ship"]) {
        TaskType::Deployment
    } else if contains_any(&["optimiz", "performance", "latency", "speed up"]) {
        TaskType::Optimization
    } else if contains_any(&["design", "architecture"]) {
        TaskType::Design
    } else {
        TaskType::Feature
    };

    let complexity = if contains_any(&["complex", "large", "major", "entire", "system-wide"]) {
        TaskComplexity::Complex
    } else if contains_any(&["simple", "small", "minor", "trivial", "quick"]) {
        TaskComplexity::Simple
    } else {
        TaskComplexity::Medium
    };

    let mut required_agents: Vec<AgentType> = AgentType::ALL
        .into_iter()
        .filter(|agent| lowered.contains(agent.as_str()))
        .collect();
    if !required_agents.contains(&AgentType::Coder) {
        required_agents.push(AgentType::Coder);
    }

    TaskAnalysis {
        task_type,
        complexity,
        required_agents,
        estimated_steps: 3,
        risks: Vec::new(),
        opportunities: Vec::new(),
    }
}

/// The conservative analysis used when the completion call itself fails.
pub fn fallback_analysis() -> TaskAnalysis {
    TaskAnalysis {
        task_type: TaskType::Feature,
        complexity: TaskComplexity::Medium,
        required_agents: vec![AgentType::Architect, AgentType::Coder, AgentType::Reviewer],
        estimated_steps: 4,
        risks: vec![
            "Task analysis was unavailable; proceeding with conservative defaults".to_string(),
        ],
        opportunities: Vec::new(),
    }
}

/// Finds the first balanced `{...}` region that parses as JSON. Candidates
/// that fail to parse are skipped and the scan resumes just past their
/// opening brace; the first candidate's parse error is kept for the
/// all-failed case.
fn extract_json_object(text: &str) -> Result<serde_json::Value, AnalysisParseError> {
    let bytes = text.as_bytes();
    let mut search_from = 0;
    let mut first_error: Option<serde_json::Error> = None;
    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = matching_brace(bytes, start) {
            match serde_json::from_str::<serde_json::Value>(&text[start..=end]) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }
        search_from = start + 1;
    }
    match first_error {
        Some(err) => Err(AnalysisParseError::Json(err)),
        None => Err(AnalysisParseError::NoJsonObject),
    }
}

/// Index of the brace closing the one at `start`, honoring JSON string
/// syntax so braces inside string values do not count.
fn matching_brace(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &byte) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn analysis_from_value(value: &serde_json::Value) -> TaskAnalysis {
    let task_type = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .and_then(TaskType::parse)
        .unwrap_or_default();
    let complexity = value
        .get("complexity")
        .and_then(serde_json::Value::as_str)
        .and_then(TaskComplexity::parse)
        .unwrap_or_default();

    let mut required_agents = Vec::new();
    if let Some(agents) = value.get("requiredAgents").and_then(serde_json::Value::as_array) {
        for agent in agents
            .iter()
            .filter_map(serde_json::Value::as_str)
            .filter_map(AgentType::parse)
        {
            if !required_agents.contains(&agent) {
                required_agents.push(agent);
            }
        }
    }
    if required_agents.is_empty() {
        required_agents.push(AgentType::Coder);
    }

    let estimated_steps = value
        .get("estimatedSteps")
        .and_then(serde_json::Value::as_u64)
        .map_or(3, |n| u32::try_from(n).unwrap_or(u32::MAX));

    TaskAnalysis {
        task_type,
        complexity,
        required_agents,
        estimated_steps,
        risks: string_list(value.get("risks")),
        opportunities: string_list(value.get("opportunities")),
    }
}

fn string_list(value: Option<&serde_json::Value>) -> Vec<String> {
    value
        .and_then(serde_json::Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(serde_json::Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

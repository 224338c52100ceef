use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use ensemble_core::{
    AgentContext, AgentResult, AgentType, ComplexTask, CompletionClient, ContextMemory,
    EnsembleResult, EventBus, ExecutionPlan, ExecutionStep, FinalOutput, Notification,
    OrchestrationResult, ProgressPhase, ProgressUpdate, StepEvent, TaskAnalysis, Worker,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::analyzer::TaskAnalyzer;
use crate::planner::ExecutionPlanner;
use crate::registry::WorkerRegistry;

/// Weight of the reviewer-reported score in the overall run score.
const WEIGHT_REVIEW: f64 = 0.3;
/// Weight of the debugger-reported coverage in the overall run score.
const WEIGHT_COVERAGE: f64 = 0.2;
/// Weight of the mean worker confidence in the overall run score.
const WEIGHT_CONFIDENCE: f64 = 0.3;
/// Weight of the completion ratio in the overall run score.
const WEIGHT_COMPLETION: f64 = 0.2;
/// Neutral value for score terms with no reported metric behind them.
const NEUTRAL_TERM: f64 = 0.5;

/// Analysis and plan for a task, without executing anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanPreview {
    /// How the task was classified.
    pub analysis: TaskAnalysis,
    /// The plan that classification produced.
    pub plan: ExecutionPlan,
}

/// Drives a task end to end: analyze, plan, execute steps in dependency
/// order, synthesize the results and score the run.
///
/// Worker and dispatch faults are contained to their step. A faulted or
/// failed step is recorded as a failed [`AgentResult`] and the run moves
/// on; only steps depending on it are skipped. A run only comes back as
/// unsuccessful when no plan could be produced at all.
pub struct Orchestrator {
    analyzer: TaskAnalyzer,
    planner: ExecutionPlanner,
    workers: WorkerRegistry,
    memory: Arc<dyn ContextMemory>,
    events: EventBus,
}

impl Orchestrator {
    /// Creates an orchestrator from its collaborators.
    pub fn new(
        analyzer: TaskAnalyzer,
        planner: ExecutionPlanner,
        workers: WorkerRegistry,
        memory: Arc<dyn ContextMemory>,
    ) -> Self {
        Self {
            analyzer,
            planner,
            workers,
            memory,
            events: EventBus::default(),
        }
    }

    /// Creates an orchestrator with the stock analyzer over `client` and
    /// the default planner.
    pub fn from_client(
        client: Arc<dyn CompletionClient>,
        workers: WorkerRegistry,
        memory: Arc<dyn ContextMemory>,
    ) -> Self {
        Self::new(TaskAnalyzer::new(client), ExecutionPlanner::new(), workers, memory)
    }

    /// Replaces the event bus, for sharing one bus across components.
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// The bus this orchestrator publishes notifications on.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The registered workers.
    pub fn workers(&self) -> &WorkerRegistry {
        &self.workers
    }

    /// Analyzes and plans `task` without executing it.
    pub async fn get_plan(&self, task: &ComplexTask) -> EnsembleResult<PlanPreview> {
        let analysis = self.analyzer.analyze(task).await;
        let plan = self.planner.plan(task, &analysis)?;
        Ok(PlanPreview { analysis, plan })
    }

    /// Runs `task` to completion and reports what happened.
    pub async fn handle_task(&self, task: ComplexTask) -> OrchestrationResult {
        let run_started = Instant::now();
        info!(task_id = %task.id, "Orchestration started");
        self.progress(&task.id, ProgressPhase::Planning, 5, "Analyzing task", None);

        let analysis = self.analyzer.analyze(&task).await;
        let plan = match self.planner.plan(&task, &analysis) {
            Ok(plan) => plan,
            Err(error) => {
                error!(task_id = %task.id, %error, "Planning failed");
                self.progress(
                    &task.id,
                    ProgressPhase::Failed,
                    100,
                    format!("Planning failed: {error}"),
                    None,
                );
                return failed_run(&task, run_started);
            }
        };
        self.progress(
            &task.id,
            ProgressPhase::Planning,
            10,
            format!("Planned {} steps", plan.len()),
            None,
        );

        let total = plan.len();
        let mut results: Vec<AgentResult> = Vec::new();
        let mut completed: HashSet<String> = HashSet::new();

        for (index, step) in plan.steps.iter().enumerate() {
            if !step.is_ready(&completed) {
                debug!(
                    task_id = %task.id,
                    step_id = %step.id,
                    "Skipping step with unmet dependencies"
                );
                continue;
            }
            let Some(worker) = self.workers.get(step.agent_type) else {
                error!(
                    task_id = %task.id,
                    step_id = %step.id,
                    agent = %step.agent_type,
                    "No worker registered for step"
                );
                continue;
            };
            let worker = Arc::clone(worker);

            self.progress(
                &task.id,
                ProgressPhase::Executing,
                exec_percent(index, total),
                format!("Executing {}", step.id),
                Some(step.agent_type),
            );
            self.events.publish(Notification::Step(StepEvent::Started {
                task_id: task.id.clone(),
                step_id: step.id.clone(),
                agent_type: step.agent_type,
            }));

            let step_started = Instant::now();
            match self.dispatch(step, &plan, &results, worker.as_ref()).await {
                Ok(result) => {
                    if result.success {
                        completed.insert(step.id.clone());
                        debug!(task_id = %task.id, step_id = %step.id, "Step completed");
                        self.events.publish(Notification::Step(StepEvent::Completed {
                            task_id: task.id.clone(),
                            step_id: step.id.clone(),
                            agent_type: step.agent_type,
                        }));
                    } else {
                        warn!(task_id = %task.id, step_id = %step.id, "Step reported failure");
                        self.events.publish(Notification::Step(StepEvent::Failed {
                            task_id: task.id.clone(),
                            step_id: step.id.clone(),
                            agent_type: step.agent_type,
                            error: summarize_issues(&result),
                        }));
                    }
                    if result.requires_replanning {
                        warn!(task_id = %task.id, step_id = %step.id, "Step requested replanning");
                        self.events
                            .publish(Notification::Step(StepEvent::ReplanningRequested {
                                task_id: task.id.clone(),
                                step_id: step.id.clone(),
                                agent_type: step.agent_type,
                            }));
                    }
                    results.push(result);
                }
                Err(fault) => {
                    error!(task_id = %task.id, step_id = %step.id, %fault, "Step faulted");
                    let message = fault.to_string();
                    let result = AgentResult::failure(
                        step.id.clone(),
                        step.agent_type,
                        vec![format!("Critical: {message}")],
                    )
                    .with_duration_ms(step_started.elapsed().as_millis() as u64);
                    self.events.publish(Notification::Step(StepEvent::Failed {
                        task_id: task.id.clone(),
                        step_id: step.id.clone(),
                        agent_type: step.agent_type,
                        error: message,
                    }));
                    results.push(result);
                }
            }
        }

        self.progress(&task.id, ProgressPhase::Reviewing, 95, "Synthesizing results", None);
        let final_output = synthesize(&results);
        let overall_score = overall_score(&results);
        let outcome = OrchestrationResult {
            task_id: task.id.clone(),
            success: true,
            results,
            final_output,
            total_duration_ms: run_started.elapsed().as_millis() as u64,
            steps_completed: completed.len(),
            steps_total: total,
            overall_score,
        };
        info!(
            task_id = %task.id,
            score = outcome.overall_score,
            completed = outcome.steps_completed,
            total = outcome.steps_total,
            "Orchestration finished"
        );
        self.progress(&task.id, ProgressPhase::Complete, 100, "Run complete", None);
        outcome
    }

    async fn dispatch(
        &self,
        step: &ExecutionStep,
        plan: &ExecutionPlan,
        previous: &[AgentResult],
        worker: &dyn Worker,
    ) -> EnsembleResult<AgentResult> {
        let memory = self.memory.relevant_context(&step.description).await?;
        let context = AgentContext {
            previous_results: previous.to_vec(),
            memory,
            current_step: step.clone(),
            plan: plan.clone(),
        };
        worker.execute(step, &context).await
    }

    fn progress(
        &self,
        task_id: &str,
        phase: ProgressPhase,
        percent: u8,
        message: impl Into<String>,
        current_worker: Option<AgentType>,
    ) {
        self.events.publish(Notification::Progress(ProgressUpdate {
            task_id: task_id.to_string(),
            phase,
            percent,
            message: message.into(),
            current_worker,
        }));
    }
}

fn failed_run(task: &ComplexTask, started: Instant) -> OrchestrationResult {
    OrchestrationResult {
        task_id: task.id.clone(),
        success: false,
        results: Vec::new(),
        final_output: FinalOutput::default(),
        total_duration_ms: started.elapsed().as_millis() as u64,
        steps_completed: 0,
        steps_total: 0,
        overall_score: 0.0,
    }
}

/// Folds step results into the run-level output: latest successful output
/// per worker type, plus aggregate counters.
fn synthesize(results: &[AgentResult]) -> FinalOutput {
    let mut outputs: HashMap<AgentType, Value> = HashMap::new();
    let mut confidences: Vec<f64> = Vec::new();
    let mut successful_steps = 0;
    let mut total_issues = 0;

    for result in results {
        total_issues += result.issues.len();
        if result.success {
            successful_steps += 1;
            outputs.insert(result.agent_type, result.output.clone());
        }
        if let Some(confidence) = result.confidence {
            confidences.push(confidence);
        }
    }

    let mean_confidence = if confidences.is_empty() {
        None
    } else {
        Some(confidences.iter().sum::<f64>() / confidences.len() as f64)
    };

    FinalOutput { outputs, successful_steps, mean_confidence, total_issues }
}

/// Weighted quality score in `[0, 1]`.
///
/// Terms without a reported metric fall back to [`NEUTRAL_TERM`], except
/// the completion ratio, which is 0 when nothing ran.
fn overall_score(results: &[AgentResult]) -> f64 {
    let review =
        latest_metric(results, AgentType::Reviewer, "score").map_or(NEUTRAL_TERM, clamp_unit);
    let coverage = latest_metric(results, AgentType::Debugger, "coverage")
        .map_or(NEUTRAL_TERM, |percent| clamp_unit(percent / 100.0));

    let confidences: Vec<f64> = results.iter().filter_map(|result| result.confidence).collect();
    let confidence = if confidences.is_empty() {
        NEUTRAL_TERM
    } else {
        clamp_unit(confidences.iter().sum::<f64>() / confidences.len() as f64)
    };

    let completion = if results.is_empty() {
        0.0
    } else {
        results.iter().filter(|result| result.success).count() as f64 / results.len() as f64
    };

    WEIGHT_REVIEW * review
        + WEIGHT_COVERAGE * coverage
        + WEIGHT_CONFIDENCE * confidence
        + WEIGHT_COMPLETION * completion
}

/// Numeric field `key` from the most recent successful result of `agent`.
fn latest_metric(results: &[AgentResult], agent: AgentType, key: &str) -> Option<f64> {
    results
        .iter()
        .rev()
        .find(|result| result.agent_type == agent && result.success)
        .and_then(|result| result.output.get(key))
        .and_then(Value::as_f64)
}

fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

fn summarize_issues(result: &AgentResult) -> String {
    if result.issues.is_empty() {
        "worker reported failure".to_string()
    } else {
        result.issues.join("; ")
    }
}

/// Percent shown while executing: the 10..=90 band split evenly over steps.
fn exec_percent(index: usize, total: usize) -> u8 {
    let share = (80 * (index + 1)) / total.max(1);
    10 + share as u8
}

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ensemble_core::*;
use ensemble_orchestrator::{ExecutionPlanner, Orchestrator, TaskAnalyzer, WorkerRegistry};
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Scripted backends
// ---------------------------------------------------------------------------

/// Completion client replying with one fixed classification.
struct StaticClient {
    reply: String,
}

impl StaticClient {
    fn requiring(agents: &[&str]) -> Arc<dyn CompletionClient> {
        let list = agents
            .iter()
            .map(|agent| format!("\"{agent}\""))
            .collect::<Vec<_>>()
            .join(", ");
        Arc::new(Self {
            reply: format!(
                r#"{{"type": "feature", "complexity": "medium", "requiredAgents": [{list}], "estimatedSteps": 3}}"#
            ),
        })
    }
}

#[async_trait]
impl CompletionClient for StaticClient {
    async fn chat(&self, _messages: &[ChatMessage]) -> EnsembleResult<String> {
        Ok(self.reply.clone())
    }
}

/// Completion client that always fails, forcing the fixed fallback analysis.
struct OfflineClient;

#[async_trait]
impl CompletionClient for OfflineClient {
    async fn chat(&self, _messages: &[ChatMessage]) -> EnsembleResult<String> {
        Err(EnsembleError::Completion("backend offline".to_string()))
    }
}

enum Behavior {
    Succeed { output: Value, confidence: Option<f64> },
    ReportFailure(Vec<String>),
    Fault(String),
    SucceedAndRequestReplan,
}

/// Worker that follows a script and counts how often it was dispatched.
struct ScriptedWorker {
    info: WorkerInfo,
    behavior: Behavior,
    calls: AtomicUsize,
}

impl ScriptedWorker {
    fn new(agent_type: AgentType, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            info: WorkerInfo::new(agent_type, format!("scripted-{agent_type}")),
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    fn succeeding(agent_type: AgentType) -> Arc<Self> {
        Self::new(agent_type, Behavior::Succeed { output: json!({}), confidence: None })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Worker for ScriptedWorker {
    fn info(&self) -> &WorkerInfo {
        &self.info
    }

    async fn execute(
        &self,
        step: &ExecutionStep,
        _context: &AgentContext,
    ) -> EnsembleResult<AgentResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Succeed { output, confidence } => {
                let mut result =
                    AgentResult::success(step.id.clone(), self.info.agent_type, output.clone());
                if let Some(confidence) = confidence {
                    result = result.with_confidence(*confidence);
                }
                Ok(result)
            }
            Behavior::ReportFailure(issues) => {
                Ok(AgentResult::failure(step.id.clone(), self.info.agent_type, issues.clone()))
            }
            Behavior::Fault(message) => Err(EnsembleError::Worker(message.clone())),
            Behavior::SucceedAndRequestReplan => Ok(AgentResult::success(
                step.id.clone(),
                self.info.agent_type,
                json!({}),
            )
            .with_replanning()),
        }
    }
}

/// Context memory that records every query it serves.
struct RecordingMemory {
    queries: Mutex<Vec<String>>,
}

impl RecordingMemory {
    fn new() -> Arc<Self> {
        Arc::new(Self { queries: Mutex::new(Vec::new()) })
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContextMemory for RecordingMemory {
    async fn relevant_context(&self, query: &str) -> EnsembleResult<Value> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(json!({"recall": []}))
    }
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<Notification>) -> Vec<Notification> {
    let mut seen = Vec::new();
    while let Ok(notification) = rx.try_recv() {
        seen.push(notification);
    }
    seen
}

// ---------------------------------------------------------------------------
// 1. Full run with a faulting reviewer still completes and scores
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_tolerates_a_faulting_reviewer() {
    let architect = ScriptedWorker::new(
        AgentType::Architect,
        Behavior::Succeed { output: json!({"design": "layered"}), confidence: Some(0.9) },
    );
    let coder = ScriptedWorker::new(
        AgentType::Coder,
        Behavior::Succeed { output: json!({"files": 4}), confidence: Some(0.8) },
    );
    let reviewer =
        ScriptedWorker::new(AgentType::Reviewer, Behavior::Fault("reviewer exploded".to_string()));

    let mut registry = WorkerRegistry::new();
    registry.register(architect.clone());
    registry.register(coder.clone());
    registry.register(reviewer.clone());

    let orchestrator = Orchestrator::from_client(
        StaticClient::requiring(&["architect", "coder", "reviewer"]),
        registry,
        Arc::new(NullMemory),
    );
    let outcome = orchestrator
        .handle_task(ComplexTask::new("task-1", "Add an export endpoint"))
        .await;

    // The run itself completes; the fault is contained to its step.
    assert!(outcome.success);
    assert_eq!(outcome.steps_total, 3);
    assert_eq!(outcome.steps_completed, 2);
    assert_eq!(outcome.results.len(), 3);
    assert!(outcome.results[0].success);
    assert!(outcome.results[1].success);
    assert!(!outcome.results[2].success);
    assert_eq!(
        outcome.results[2].issues,
        vec!["Critical: Worker error: reviewer exploded".to_string()]
    );

    // Review and coverage terms are neutral, confidence averages the two
    // reported values, completion is two thirds.
    let expected = 0.3 * 0.5 + 0.2 * 0.5 + 0.3 * 0.85 + 0.2 * (2.0 / 3.0);
    assert!((outcome.overall_score - expected).abs() < 1e-9);

    let output = &outcome.final_output;
    assert_eq!(output.successful_steps, 2);
    assert_eq!(output.outputs[&AgentType::Architect], json!({"design": "layered"}));
    assert_eq!(output.outputs[&AgentType::Coder], json!({"files": 4}));
    assert!(!output.outputs.contains_key(&AgentType::Reviewer));
    assert!((output.mean_confidence.unwrap() - 0.85).abs() < 1e-9);
}

// ---------------------------------------------------------------------------
// 2. A failed foundation skips every dependent step
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_architect_skips_dependents() {
    let architect =
        ScriptedWorker::new(AgentType::Architect, Behavior::Fault("no design".to_string()));
    let coder = ScriptedWorker::succeeding(AgentType::Coder);
    let reviewer = ScriptedWorker::succeeding(AgentType::Reviewer);

    let mut registry = WorkerRegistry::new();
    registry.register(architect.clone());
    registry.register(coder.clone());
    registry.register(reviewer.clone());

    let orchestrator = Orchestrator::from_client(
        StaticClient::requiring(&["architect", "coder", "reviewer"]),
        registry,
        Arc::new(NullMemory),
    );
    let outcome = orchestrator
        .handle_task(ComplexTask::new("task-2", "Rework the scheduler"))
        .await;

    assert_eq!(architect.calls(), 1);
    assert_eq!(coder.calls(), 0);
    assert_eq!(reviewer.calls(), 0);

    // Only the attempted step is recorded.
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.steps_completed, 0);
    assert_eq!(outcome.steps_total, 3);
    assert!(outcome.success);
    assert!((outcome.overall_score - 0.4).abs() < 1e-9);
}

// ---------------------------------------------------------------------------
// 3. Verification steps are isolated from each other
// ---------------------------------------------------------------------------

#[tokio::test]
async fn verification_steps_fail_independently() {
    let architect = ScriptedWorker::succeeding(AgentType::Architect);
    let coder = ScriptedWorker::succeeding(AgentType::Coder);
    let debugger =
        ScriptedWorker::new(AgentType::Debugger, Behavior::Fault("tracer crashed".to_string()));
    let tester = ScriptedWorker::succeeding(AgentType::Tester);

    let mut registry = WorkerRegistry::new();
    registry.register(architect.clone());
    registry.register(coder.clone());
    registry.register(debugger.clone());
    registry.register(tester.clone());

    let orchestrator = Orchestrator::from_client(
        StaticClient::requiring(&["architect", "coder", "debugger", "tester"]),
        registry,
        Arc::new(NullMemory),
    );
    let outcome = orchestrator
        .handle_task(ComplexTask::new("task-3", "Harden the importer"))
        .await;

    // The tester depends on the coder, not on its debugger sibling.
    assert_eq!(tester.calls(), 1);
    assert_eq!(outcome.results.len(), 4);
    assert_eq!(outcome.steps_completed, 3);
}

// ---------------------------------------------------------------------------
// 4. Steps without a registered worker are skipped quietly
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unregistered_worker_type_skips_the_step() {
    let orchestrator = Orchestrator::from_client(
        StaticClient::requiring(&["coder"]),
        WorkerRegistry::new(),
        Arc::new(NullMemory),
    );
    let outcome = orchestrator
        .handle_task(ComplexTask::new("task-4", "Anything at all"))
        .await;

    assert!(outcome.success);
    assert!(outcome.results.is_empty());
    assert_eq!(outcome.steps_total, 1);
    assert_eq!(outcome.steps_completed, 0);
    assert!((outcome.overall_score - 0.4).abs() < 1e-9);
}

// ---------------------------------------------------------------------------
// 5. Replanning requests surface on the bus without altering the run
// ---------------------------------------------------------------------------

#[tokio::test]
async fn replanning_request_is_published_and_run_continues() {
    let coder = ScriptedWorker::new(AgentType::Coder, Behavior::SucceedAndRequestReplan);
    let reviewer = ScriptedWorker::succeeding(AgentType::Reviewer);

    let mut registry = WorkerRegistry::new();
    registry.register(coder.clone());
    registry.register(reviewer.clone());

    let orchestrator = Orchestrator::from_client(
        StaticClient::requiring(&["coder", "reviewer"]),
        registry,
        Arc::new(NullMemory),
    );
    let mut rx = orchestrator.events().subscribe();
    let outcome = orchestrator
        .handle_task(ComplexTask::new("task-5", "Migrate the cache layer"))
        .await;

    let notifications = drain(&mut rx);
    assert!(notifications.iter().any(|notification| matches!(
        notification,
        Notification::Step(StepEvent::ReplanningRequested { step_id, .. }) if step_id == "step-1"
    )));

    // The plan is not actually reshaped; the reviewer still ran.
    assert_eq!(reviewer.calls(), 1);
    assert_eq!(outcome.steps_completed, 2);
    assert!(outcome.results[0].requires_replanning);
}

// ---------------------------------------------------------------------------
// 6. Memory is queried once per dispatched step, never for skipped ones
// ---------------------------------------------------------------------------

#[tokio::test]
async fn memory_lookup_follows_dispatch() {
    let architect =
        ScriptedWorker::new(AgentType::Architect, Behavior::Fault("no design".to_string()));
    let coder = ScriptedWorker::succeeding(AgentType::Coder);

    let mut registry = WorkerRegistry::new();
    registry.register(architect.clone());
    registry.register(coder.clone());

    let memory = RecordingMemory::new();
    let orchestrator = Orchestrator::from_client(
        StaticClient::requiring(&["architect", "coder"]),
        registry,
        memory.clone(),
    );
    orchestrator
        .handle_task(ComplexTask::new("task-6", "Split the billing module"))
        .await;

    // The coder step was skipped, so only the architect queried memory.
    let queries = memory.queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(
        queries[0],
        "Design the structure and interfaces for: Split the billing module"
    );
}

// ---------------------------------------------------------------------------
// 7. Offline completion backend degrades to the conservative plan
// ---------------------------------------------------------------------------

#[tokio::test]
async fn offline_backend_still_produces_a_run() {
    let architect = ScriptedWorker::succeeding(AgentType::Architect);
    let coder = ScriptedWorker::succeeding(AgentType::Coder);
    let reviewer = ScriptedWorker::new(
        AgentType::Reviewer,
        Behavior::Succeed { output: json!({"score": 0.9}), confidence: None },
    );

    let mut registry = WorkerRegistry::new();
    registry.register(architect.clone());
    registry.register(coder.clone());
    registry.register(reviewer.clone());

    let orchestrator =
        Orchestrator::from_client(Arc::new(OfflineClient), registry, Arc::new(NullMemory));
    let outcome = orchestrator
        .handle_task(ComplexTask::new("task-7", "Whatever the backend thinks"))
        .await;

    // The fixed fallback plans architect, coder and reviewer.
    assert_eq!(outcome.steps_total, 3);
    assert_eq!(outcome.steps_completed, 3);

    let expected = 0.3 * 0.9 + 0.2 * 0.5 + 0.3 * 0.5 + 0.2 * 1.0;
    assert!((outcome.overall_score - expected).abs() < 1e-9);
}

// ---------------------------------------------------------------------------
// 8. Reported failure counts the attempt but not the completion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reported_failure_blocks_dependents() {
    let coder =
        ScriptedWorker::new(AgentType::Coder, Behavior::ReportFailure(vec![
            "build broke".to_string(),
        ]));
    let tester = ScriptedWorker::succeeding(AgentType::Tester);

    let mut registry = WorkerRegistry::new();
    registry.register(coder.clone());
    registry.register(tester.clone());

    let orchestrator = Orchestrator::from_client(
        StaticClient::requiring(&["coder", "tester"]),
        registry,
        Arc::new(NullMemory),
    );
    let mut rx = orchestrator.events().subscribe();
    let outcome = orchestrator
        .handle_task(ComplexTask::new("task-8", "Port the parser"))
        .await;

    assert_eq!(tester.calls(), 0);
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.steps_completed, 0);

    let notifications = drain(&mut rx);
    assert!(notifications.iter().any(|notification| matches!(
        notification,
        Notification::Step(StepEvent::Failed { error, .. }) if error == "build broke"
    )));
}

// ---------------------------------------------------------------------------
// 9. Progress notifications rise monotonically to completion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn progress_is_monotone_and_terminal() {
    let architect = ScriptedWorker::succeeding(AgentType::Architect);
    let coder = ScriptedWorker::succeeding(AgentType::Coder);
    let reviewer = ScriptedWorker::succeeding(AgentType::Reviewer);

    let mut registry = WorkerRegistry::new();
    registry.register(architect);
    registry.register(coder);
    registry.register(reviewer);

    let orchestrator = Orchestrator::from_client(
        StaticClient::requiring(&["architect", "coder", "reviewer"]),
        registry,
        Arc::new(NullMemory),
    );
    let mut rx = orchestrator.events().subscribe();
    orchestrator
        .handle_task(ComplexTask::new("task-9", "Instrument the worker pool"))
        .await;

    let updates: Vec<ProgressUpdate> = drain(&mut rx)
        .into_iter()
        .filter_map(|notification| match notification {
            Notification::Progress(update) => Some(update),
            _ => None,
        })
        .collect();

    assert!(updates.len() >= 5);
    assert_eq!(updates[0].phase, ProgressPhase::Planning);
    assert!(updates.windows(2).all(|pair| pair[0].percent <= pair[1].percent));

    let last = updates.last().unwrap();
    assert_eq!(last.phase, ProgressPhase::Complete);
    assert_eq!(last.percent, 100);

    // Executing updates carry the worker currently running.
    assert!(updates
        .iter()
        .filter(|update| update.phase == ProgressPhase::Executing)
        .all(|update| update.current_worker.is_some()));
}

// ---------------------------------------------------------------------------
// 10. Plan preview exposes the analysis and the layered plan
// ---------------------------------------------------------------------------

#[tokio::test]
async fn plan_preview_shows_layering_without_executing() {
    let coder = ScriptedWorker::succeeding(AgentType::Coder);

    let mut registry = WorkerRegistry::new();
    registry.register(coder.clone());

    let orchestrator = Orchestrator::from_client(
        StaticClient::requiring(&["architect", "coder", "tester", "reviewer"]),
        registry,
        Arc::new(NullMemory),
    );
    let preview = orchestrator
        .get_plan(&ComplexTask::new("task-10", "Shard the event store"))
        .await
        .unwrap();

    assert_eq!(
        preview.analysis.required_agents,
        vec![AgentType::Architect, AgentType::Coder, AgentType::Tester, AgentType::Reviewer]
    );
    let steps = &preview.plan.steps;
    assert_eq!(steps.len(), 4);
    assert_eq!(steps[2].agent_type, AgentType::Tester);
    assert_eq!(steps[2].dependencies, vec!["step-2".to_string()]);
    assert_eq!(steps[3].agent_type, AgentType::Reviewer);
    assert_eq!(steps[3].dependencies, vec!["step-3".to_string()]);

    // Previewing must not dispatch anything.
    assert_eq!(coder.calls(), 0);
}

// ---------------------------------------------------------------------------
// 11. The analyzer and planner come in through the constructor
// ---------------------------------------------------------------------------

#[tokio::test]
async fn constructor_takes_prebuilt_analyzer_and_planner() {
    let analyzer = TaskAnalyzer::new(StaticClient::requiring(&["coder", "reviewer"]));
    let coder = ScriptedWorker::succeeding(AgentType::Coder);
    let reviewer = ScriptedWorker::succeeding(AgentType::Reviewer);

    let mut registry = WorkerRegistry::new();
    registry.register(coder.clone());
    registry.register(reviewer.clone());

    let orchestrator =
        Orchestrator::new(analyzer, ExecutionPlanner::new(), registry, Arc::new(NullMemory));
    let outcome = orchestrator
        .handle_task(ComplexTask::new("task-11", "Wire up the audit log"))
        .await;

    // The supplied analyzer decided the ensemble; both its picks ran.
    assert_eq!(outcome.steps_total, 2);
    assert_eq!(outcome.steps_completed, 2);
    assert_eq!(coder.calls(), 1);
    assert_eq!(reviewer.calls(), 1);
    assert_eq!(outcome.results[0].agent_type, AgentType::Coder);
    assert_eq!(outcome.results[1].agent_type, AgentType::Reviewer);
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::outcome::AgentResult;
use crate::plan::{ExecutionPlan, ExecutionStep};
use crate::task::AgentType;
use crate::EnsembleResult;

/// Identity and advertised capabilities of a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerInfo {
    /// The specialization this worker fills.
    pub agent_type: AgentType,
    /// Human-readable worker name, used in logs.
    pub name: String,
    /// Free-text capability tags.
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl WorkerInfo {
    /// Creates worker info with no capability tags.
    pub fn new(agent_type: AgentType, name: impl Into<String>) -> Self {
        Self {
            agent_type,
            name: name.into(),
            capabilities: Vec::new(),
        }
    }

    /// Sets the capability tags.
    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.capabilities = capabilities;
        self
    }
}

/// Everything a worker gets to see when executing one step.
///
/// Built fresh for every dispatch and never retained, so a worker always
/// observes the results of all previously attempted steps.
#[derive(Debug, Clone)]
pub struct AgentContext {
    /// Results of every step attempted so far, in dispatch order.
    pub previous_results: Vec<AgentResult>,
    /// Memory lookup keyed on the step description. `Null` when no memory
    /// backend is configured.
    pub memory: serde_json::Value,
    /// The step being executed.
    pub current_step: ExecutionStep,
    /// The full plan the step belongs to.
    pub plan: ExecutionPlan,
}

/// A specialized agent the orchestrator can dispatch steps to.
///
/// Returning `Err` marks the step as faulted; it never aborts the
/// surrounding run.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Identity and capabilities of this worker.
    fn info(&self) -> &WorkerInfo;

    /// Executes one step and reports the outcome.
    async fn execute(
        &self,
        step: &ExecutionStep,
        context: &AgentContext,
    ) -> EnsembleResult<AgentResult>;
}

/// The author of a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// A system-level instruction.
    System,
    /// The caller's request.
    User,
    /// A model response.
    Assistant,
}

/// One message in a completion exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who authored the message.
    pub role: ChatRole,
    /// The message text.
    pub content: String,
}

impl ChatMessage {
    /// Creates a message with [`ChatRole::System`].
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Creates a message with [`ChatRole::User`].
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// A chat-completion backend used for task classification.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Sends the messages and returns the raw completion text.
    async fn chat(&self, messages: &[ChatMessage]) -> EnsembleResult<String>;
}

/// Read access to contextual memory, queried once per dispatched step.
#[async_trait]
pub trait ContextMemory: Send + Sync {
    /// Returns whatever stored context is relevant to `query`.
    async fn relevant_context(&self, query: &str) -> EnsembleResult<serde_json::Value>;
}

/// A [`ContextMemory`] that remembers nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMemory;

#[async_trait]
impl ContextMemory for NullMemory {
    async fn relevant_context(&self, _query: &str) -> EnsembleResult<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use ensemble_core::{AgentType, Worker};
use tracing::info;

/// The workers available for dispatch, keyed by the specialization each
/// one fills.
#[derive(Default)]
pub struct WorkerRegistry {
    workers: HashMap<AgentType, Arc<dyn Worker>>,
}

impl WorkerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            workers: HashMap::new(),
        }
    }

    /// Registers a worker under its own agent type, replacing any previous
    /// worker of that type.
    pub fn register(&mut self, worker: Arc<dyn Worker>) {
        let (agent_type, name) = {
            let info = worker.info();
            (info.agent_type, info.name.clone())
        };
        info!(agent = %agent_type, name = %name, "Worker registered");
        self.workers.insert(agent_type, worker);
    }

    /// Looks up the worker for an agent type.
    pub fn get(&self, agent_type: AgentType) -> Option<&Arc<dyn Worker>> {
        self.workers.get(&agent_type)
    }

    /// Whether a worker of this type is registered.
    pub fn contains(&self, agent_type: AgentType) -> bool {
        self.workers.contains_key(&agent_type)
    }

    /// Registered agent types, in foundational precedence order.
    pub fn agent_types(&self) -> Vec<AgentType> {
        AgentType::ALL
            .into_iter()
            .filter(|agent| self.workers.contains_key(agent))
            .collect()
    }

    /// Number of registered workers.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Whether no workers are registered.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

use ensemble_core::AgentType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_max_concurrent_per_target() -> usize {
    3
}

/// Five minutes.
fn default_timeout_ms() -> u64 {
    300_000
}

/// Routing and capacity rules for delegated handoffs.
///
/// A route with no entry in `allowed_routes` is allowed: the map only
/// restricts source types that appear in it. Capacity is counted per
/// target type across all sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffPolicy {
    /// Maximum non-terminal handoffs a single target type may hold.
    #[serde(default = "default_max_concurrent_per_target")]
    pub max_concurrent_per_target: usize,
    /// Timeout applied when a request does not override it, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Whether handoffs wait in `pending` until the target accepts.
    #[serde(default)]
    pub require_acceptance: bool,
    /// Allowed targets per source type. Absent sources may delegate anywhere.
    /// Kept last so TOML renders the table after plain values.
    #[serde(default)]
    pub allowed_routes: HashMap<AgentType, Vec<AgentType>>,
}

impl Default for HandoffPolicy {
    fn default() -> Self {
        Self {
            max_concurrent_per_target: default_max_concurrent_per_target(),
            default_timeout_ms: default_timeout_ms(),
            require_acceptance: false,
            allowed_routes: HashMap::new(),
        }
    }
}

impl HandoffPolicy {
    /// Whether `source` may delegate to `target` under this policy.
    pub fn route_allowed(&self, source: AgentType, target: AgentType) -> bool {
        match self.allowed_routes.get(&source) {
            Some(targets) => targets.contains(&target),
            None => true,
        }
    }

    /// Restricts `source` to the given targets.
    pub fn with_route(mut self, source: AgentType, targets: Vec<AgentType>) -> Self {
        self.allowed_routes.insert(source, targets);
        self
    }

    /// Requires targets to accept before work starts.
    pub fn with_acceptance_required(mut self) -> Self {
        self.require_acceptance = true;
        self
    }

    /// Applies a partial update, replacing only the fields it carries.
    pub fn apply(&mut self, update: PolicyUpdate) {
        if let Some(max) = update.max_concurrent_per_target {
            self.max_concurrent_per_target = max;
        }
        if let Some(timeout_ms) = update.default_timeout_ms {
            self.default_timeout_ms = timeout_ms;
        }
        if let Some(routes) = update.allowed_routes {
            self.allowed_routes = routes;
        }
        if let Some(require) = update.require_acceptance {
            self.require_acceptance = require;
        }
    }
}

/// A partial [`HandoffPolicy`]: absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyUpdate {
    /// New per-target capacity, if set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_per_target: Option<usize>,
    /// New default timeout in milliseconds, if set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_timeout_ms: Option<u64>,
    /// New acceptance requirement, if set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_acceptance: Option<bool>,
    /// Replacement routing table, if set. Replaces the whole table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_routes: Option<HashMap<AgentType, Vec<AgentType>>>,
}

impl PolicyUpdate {
    /// Sets the per-target capacity.
    pub fn with_max_concurrent_per_target(mut self, max: usize) -> Self {
        self.max_concurrent_per_target = Some(max);
        self
    }

    /// Sets the default timeout.
    pub fn with_default_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = Some(timeout_ms);
        self
    }

    /// Replaces the routing table.
    pub fn with_allowed_routes(mut self, routes: HashMap<AgentType, Vec<AgentType>>) -> Self {
        self.allowed_routes = Some(routes);
        self
    }

    /// Sets the acceptance requirement.
    pub fn with_require_acceptance(mut self, require: bool) -> Self {
        self.require_acceptance = Some(require);
        self
    }
}

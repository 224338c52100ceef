use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use ensemble_core::{AgentType, EventBus, HandoffEvent, Notification};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::HandoffError;
use crate::policy::{HandoffPolicy, PolicyUpdate};
use crate::types::{ActiveHandoff, HandoffOptions, HandoffRequest, HandoffResult, HandoffStatus};

/// Most terminal outcomes retained for statistics, oldest evicted first.
pub const HISTORY_CAPACITY: usize = 100;

/// Failure reason recorded when a handoff's deadline elapses.
pub const TIMEOUT_REASON: &str = "Handoff timed out";

/// Aggregate view of recorded outcomes and live handoffs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandoffStats {
    /// Terminal outcomes currently retained in history.
    pub total_recorded: usize,
    /// Fraction of recorded outcomes that succeeded.
    pub success_rate: f64,
    /// Mean duration of recorded outcomes, in milliseconds.
    pub mean_duration_ms: f64,
    /// Tracked handoffs by current status, terminal ones included until
    /// cleaned up.
    pub by_status: HashMap<HandoffStatus, usize>,
    /// Non-terminal handoffs per `source->target` route.
    pub active_by_route: HashMap<String, usize>,
}

struct ManagerState {
    active: HashMap<Uuid, ActiveHandoff>,
    history: VecDeque<HandoffResult>,
    policy: HandoffPolicy,
    timers: HashMap<Uuid, JoinHandle<()>>,
}

/// The terminal outcome a transition writes.
struct Terminal {
    status: HandoffStatus,
    success: bool,
    artifacts: serde_json::Value,
    notes: Vec<String>,
    reason: Option<String>,
}

impl Terminal {
    fn completed(artifacts: serde_json::Value, notes: Vec<String>) -> Self {
        Self {
            status: HandoffStatus::Completed,
            success: true,
            artifacts,
            notes,
            reason: None,
        }
    }

    fn failed(reason: String) -> Self {
        Self {
            status: HandoffStatus::Failed,
            success: false,
            artifacts: serde_json::Value::Null,
            notes: Vec::new(),
            reason: Some(reason),
        }
    }

    fn rejected(reason: String) -> Self {
        Self {
            status: HandoffStatus::Rejected,
            success: false,
            artifacts: serde_json::Value::Null,
            notes: Vec::new(),
            reason: Some(reason),
        }
    }

    fn cancelled(reason: String) -> Self {
        Self {
            status: HandoffStatus::Cancelled,
            success: false,
            artifacts: serde_json::Value::Null,
            notes: Vec::new(),
            reason: Some(reason),
        }
    }
}

/// Validates and performs one terminal transition under the write lock.
///
/// The status check and the write happen under the same lock acquisition,
/// so two racing terminal calls can never both succeed.
fn transition(
    state: &mut ManagerState,
    id: Uuid,
    operation: &'static str,
    allowed_from: &[HandoffStatus],
    terminal: Terminal,
) -> Result<HandoffResult, HandoffError> {
    let entry = state.active.get_mut(&id).ok_or(HandoffError::NotFound(id))?;
    if !allowed_from.contains(&entry.status) {
        return Err(HandoffError::InvalidState {
            id,
            status: entry.status,
            operation,
        });
    }

    let now = Utc::now();
    let since = entry.started_at.unwrap_or(entry.request.created_at);
    let duration_ms = (now - since).num_milliseconds().max(0) as u64;
    let result = HandoffResult {
        handoff_id: id,
        status: terminal.status,
        success: terminal.success,
        artifacts: terminal.artifacts,
        notes: terminal.notes,
        duration_ms,
        reason: terminal.reason,
        completed_at: now,
    };
    entry.status = terminal.status;
    entry.result = Some(result.clone());

    if let Some(timer) = state.timers.remove(&id) {
        timer.abort();
    }
    state.history.push_back(result.clone());
    if state.history.len() > HISTORY_CAPACITY {
        state.history.pop_front();
    }
    Ok(result)
}

/// Tracks delegated work between workers.
///
/// Cheap to clone; all clones share the same state. Every mutation takes
/// the write lock once and checks state under it, so concurrent callers
/// observe each transition atomically. Each handoff gets one timer at
/// request time that fails it with [`TIMEOUT_REASON`] if it is still
/// non-terminal at the deadline; any terminal transition aborts the timer.
#[derive(Clone)]
pub struct HandoffManager {
    state: Arc<RwLock<ManagerState>>,
    events: EventBus,
}

impl HandoffManager {
    /// Creates a manager with the given policy and a private event bus.
    pub fn new(policy: HandoffPolicy) -> Self {
        Self {
            state: Arc::new(RwLock::new(ManagerState {
                active: HashMap::new(),
                history: VecDeque::new(),
                policy,
                timers: HashMap::new(),
            })),
            events: EventBus::default(),
        }
    }

    /// Publishes onto `events` instead of the private bus, so handoff and
    /// orchestration notifications can share one channel.
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// The bus this manager publishes handoff events to.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Creates a handoff from `source` to `target`.
    ///
    /// Checks the route and the target's capacity against the policy as it
    /// is right now; the policy's default timeout is snapshotted into the
    /// request. Without `require_acceptance` the handoff starts immediately,
    /// otherwise it waits in `pending` for [`accept`](Self::accept).
    pub async fn request_handoff(
        &self,
        source: AgentType,
        target: AgentType,
        task: impl Into<String>,
        options: HandoffOptions,
    ) -> Result<Uuid, HandoffError> {
        let task = task.into();
        let mut state = self.state.write().await;

        if !state.policy.route_allowed(source, target) {
            return Err(HandoffError::RouteDenied { source_agent: source, target });
        }
        let limit = state.policy.max_concurrent_per_target;
        let in_flight = state
            .active
            .values()
            .filter(|h| !h.status.is_terminal() && h.request.target == target)
            .count();
        if in_flight >= limit {
            return Err(HandoffError::CapacityExceeded {
                target,
                active: in_flight,
                limit,
            });
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        let timeout_ms = options.timeout_ms.unwrap_or(state.policy.default_timeout_ms);
        let (status, started_at) = if state.policy.require_acceptance {
            (HandoffStatus::Pending, None)
        } else {
            (HandoffStatus::InProgress, Some(now))
        };
        state.active.insert(
            id,
            ActiveHandoff {
                request: HandoffRequest {
                    id,
                    source,
                    target,
                    task,
                    context: options.context,
                    expectations: options.expectations,
                    priority: options.priority,
                    timeout_ms,
                    callback_data: options.callback_data,
                    created_at: now,
                },
                status,
                started_at,
                result: None,
            },
        );

        let manager = self.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(timeout_ms)).await;
            manager.expire(id).await;
        });
        state.timers.insert(id, timer);
        drop(state);

        info!(
            handoff_id = %id,
            source = %source,
            target = %target,
            status = %status,
            timeout_ms,
            "Handoff requested"
        );
        self.events
            .publish(Notification::Handoff(HandoffEvent::Requested { id, source, target }));
        Ok(id)
    }

    /// Starts a pending handoff.
    pub async fn accept(&self, id: Uuid) -> Result<(), HandoffError> {
        let mut state = self.state.write().await;
        let entry = state.active.get_mut(&id).ok_or(HandoffError::NotFound(id))?;
        if entry.status != HandoffStatus::Pending {
            return Err(HandoffError::InvalidState {
                id,
                status: entry.status,
                operation: "accept",
            });
        }
        entry.status = HandoffStatus::InProgress;
        entry.started_at = Some(Utc::now());
        drop(state);

        info!(handoff_id = %id, "Handoff accepted");
        self.events
            .publish(Notification::Handoff(HandoffEvent::Accepted { id }));
        Ok(())
    }

    /// Declines a pending handoff.
    pub async fn reject(
        &self,
        id: Uuid,
        reason: impl Into<String>,
    ) -> Result<HandoffResult, HandoffError> {
        let reason = reason.into();
        let mut state = self.state.write().await;
        let result = transition(
            &mut state,
            id,
            "reject",
            &[HandoffStatus::Pending],
            Terminal::rejected(reason.clone()),
        )?;
        drop(state);

        info!(handoff_id = %id, reason = %reason, "Handoff rejected");
        self.events
            .publish(Notification::Handoff(HandoffEvent::Rejected { id, reason }));
        Ok(result)
    }

    /// Finishes an in-progress handoff successfully.
    pub async fn complete(
        &self,
        id: Uuid,
        artifacts: serde_json::Value,
        notes: Vec<String>,
    ) -> Result<HandoffResult, HandoffError> {
        let mut state = self.state.write().await;
        let result = transition(
            &mut state,
            id,
            "complete",
            &[HandoffStatus::InProgress],
            Terminal::completed(artifacts, notes),
        )?;
        drop(state);

        info!(handoff_id = %id, duration_ms = result.duration_ms, "Handoff completed");
        self.events
            .publish(Notification::Handoff(HandoffEvent::Completed { id }));
        Ok(result)
    }

    /// Fails an in-progress handoff.
    pub async fn fail(
        &self,
        id: Uuid,
        reason: impl Into<String>,
    ) -> Result<HandoffResult, HandoffError> {
        let reason = reason.into();
        let mut state = self.state.write().await;
        let result = transition(
            &mut state,
            id,
            "fail",
            &[HandoffStatus::InProgress],
            Terminal::failed(reason.clone()),
        )?;
        drop(state);

        warn!(handoff_id = %id, reason = %reason, "Handoff failed");
        self.events
            .publish(Notification::Handoff(HandoffEvent::Failed { id, reason }));
        Ok(result)
    }

    /// Withdraws a handoff that has not reached a terminal state yet.
    pub async fn cancel(
        &self,
        id: Uuid,
        reason: impl Into<String>,
    ) -> Result<HandoffResult, HandoffError> {
        let reason = reason.into();
        let mut state = self.state.write().await;
        let result = transition(
            &mut state,
            id,
            "cancel",
            &[HandoffStatus::Pending, HandoffStatus::InProgress],
            Terminal::cancelled(reason.clone()),
        )?;
        drop(state);

        info!(handoff_id = %id, reason = %reason, "Handoff cancelled");
        self.events
            .publish(Notification::Handoff(HandoffEvent::Cancelled { id, reason }));
        Ok(result)
    }

    /// Timer callback: fails the handoff if it is still non-terminal.
    async fn expire(&self, id: Uuid) {
        let mut state = self.state.write().await;
        // This timer has fired; forget its handle so the transition has
        // nothing to abort.
        state.timers.remove(&id);
        let expired = transition(
            &mut state,
            id,
            "timeout",
            &[HandoffStatus::Pending, HandoffStatus::InProgress],
            Terminal::failed(TIMEOUT_REASON.to_string()),
        );
        drop(state);

        if expired.is_ok() {
            warn!(handoff_id = %id, "Handoff timed out");
            self.events.publish(Notification::Handoff(HandoffEvent::Failed {
                id,
                reason: TIMEOUT_REASON.to_string(),
            }));
        }
    }

    /// Looks up a handoff by ID, terminal or not.
    pub async fn get(&self, id: Uuid) -> Option<ActiveHandoff> {
        self.state.read().await.active.get(&id).cloned()
    }

    /// All non-terminal handoffs, oldest first.
    pub async fn active_handoffs(&self) -> Vec<ActiveHandoff> {
        let state = self.state.read().await;
        let mut list: Vec<ActiveHandoff> = state
            .active
            .values()
            .filter(|h| !h.status.is_terminal())
            .cloned()
            .collect();
        list.sort_by_key(|h| h.request.created_at);
        list
    }

    /// Non-terminal handoffs addressed to `target`, oldest first.
    pub async fn active_for_target(&self, target: AgentType) -> Vec<ActiveHandoff> {
        let state = self.state.read().await;
        let mut list: Vec<ActiveHandoff> = state
            .active
            .values()
            .filter(|h| !h.status.is_terminal() && h.request.target == target)
            .cloned()
            .collect();
        list.sort_by_key(|h| h.request.created_at);
        list
    }

    /// Pending handoffs addressed to `target`, highest priority first,
    /// ties broken oldest first.
    pub async fn pending_for_target(&self, target: AgentType) -> Vec<ActiveHandoff> {
        let state = self.state.read().await;
        let mut list: Vec<ActiveHandoff> = state
            .active
            .values()
            .filter(|h| h.status == HandoffStatus::Pending && h.request.target == target)
            .cloned()
            .collect();
        list.sort_by(|a, b| {
            b.request
                .priority
                .cmp(&a.request.priority)
                .then_with(|| a.request.created_at.cmp(&b.request.created_at))
        });
        list
    }

    /// Recorded terminal outcomes, newest first, optionally limited.
    pub async fn history(&self, limit: Option<usize>) -> Vec<HandoffResult> {
        let state = self.state.read().await;
        let take = limit.unwrap_or(state.history.len());
        state.history.iter().rev().take(take).cloned().collect()
    }

    /// A snapshot of the current policy.
    pub async fn policy(&self) -> HandoffPolicy {
        self.state.read().await.policy.clone()
    }

    /// Applies a partial policy update.
    ///
    /// Only affects future requests: handoffs already in flight keep the
    /// timeout and routing decision they were created under.
    pub async fn update_policy(&self, update: PolicyUpdate) {
        let mut state = self.state.write().await;
        state.policy.apply(update);
        drop(state);

        info!("Handoff policy updated");
        self.events
            .publish(Notification::Handoff(HandoffEvent::PolicyUpdated));
    }

    /// Whether the current policy allows `source` to delegate to `target`.
    pub async fn route_allowed(&self, source: AgentType, target: AgentType) -> bool {
        self.state.read().await.policy.route_allowed(source, target)
    }

    /// Aggregates recorded outcomes and live handoffs.
    pub async fn statistics(&self) -> HandoffStats {
        let state = self.state.read().await;
        let total_recorded = state.history.len();
        let successes = state.history.iter().filter(|r| r.success).count();
        let success_rate = if total_recorded == 0 {
            0.0
        } else {
            successes as f64 / total_recorded as f64
        };
        let mean_duration_ms = if total_recorded == 0 {
            0.0
        } else {
            state.history.iter().map(|r| r.duration_ms as f64).sum::<f64>() / total_recorded as f64
        };

        let mut by_status: HashMap<HandoffStatus, usize> = HashMap::new();
        let mut active_by_route: HashMap<String, usize> = HashMap::new();
        for handoff in state.active.values() {
            *by_status.entry(handoff.status).or_default() += 1;
            if !handoff.status.is_terminal() {
                let route = format!("{}->{}", handoff.request.source, handoff.request.target);
                *active_by_route.entry(route).or_default() += 1;
            }
        }

        HandoffStats {
            total_recorded,
            success_rate,
            mean_duration_ms,
            by_status,
            active_by_route,
        }
    }

    /// Drops terminal handoffs whose completion predates `max_age_ms` ago.
    /// Returns how many were removed. Non-terminal handoffs are never
    /// touched; history is unaffected.
    pub async fn cleanup(&self, max_age_ms: u64) -> usize {
        // Oversized ages saturate; past the calendar range nothing is old
        // enough to sweep.
        let max_age = chrono::Duration::milliseconds(i64::try_from(max_age_ms).unwrap_or(i64::MAX));
        let cutoff = Utc::now()
            .checked_sub_signed(max_age)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
        let mut state = self.state.write().await;
        let before = state.active.len();
        state.active.retain(|_, h| {
            if !h.status.is_terminal() {
                return true;
            }
            match &h.result {
                Some(result) => result.completed_at >= cutoff,
                None => true,
            }
        });
        let removed = before - state.active.len();
        drop(state);

        if removed > 0 {
            debug!(removed, "Cleaned up terminal handoffs");
        }
        removed
    }
}

impl Default for HandoffManager {
    fn default() -> Self {
        Self::new(HandoffPolicy::default())
    }
}

//! Escalation engine
//!
//! Owns every `EscalationRequest`. Requests live in a `DashMap` keyed by
//! `escalation_id`; agent state is only touched through the registry. A
//! request entry is never held while the registry is locked for writing,
//! so the two maps cannot deadlock.

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

use contact_center_config::EscalationConfig;
use contact_center_core::session::keys;
use contact_center_core::{
    Agent, AgentStatus, CustomerData, EscalationReason, EscalationRequest, EscalationStatus,
    NotificationEvent, Priority, QueueSnapshot, Session, TurnRecord,
};

use crate::message::customer_message;
use crate::notifier::NotificationDispatcher;
use crate::priority::{adjust_priority, base_priority};
use crate::registry::AgentRegistry;
use crate::routing::select_queue;
use crate::selection::{select_agent, SelectionCriteria};
use crate::triggers::{TriggerDecision, TriggerEvaluator, TriggerInput};
use crate::wait::estimate_wait;
use crate::{EscalationError, Result};

/// Turns handed to the agent on assignment
pub const ASSIGNMENT_CONTEXT_TURNS: usize = 5;

pub const SUPERVISOR_TAG: &str = "supervisor";
pub const CALLBACK_TAG: &str = "callback";

/// Everything needed to open an escalation
#[derive(Debug, Clone)]
pub struct EscalationDraft {
    /// Supplying an id makes the call idempotent across retries
    pub escalation_id: Option<String>,
    pub session_id: String,
    pub customer_id: Option<String>,
    pub reason: EscalationReason,
    /// Priority fixed by the trigger rule, used instead of the reason's base
    pub trigger_priority: Option<Priority>,
    pub description: String,
    pub history: Vec<TurnRecord>,
    pub customer: CustomerData,
}

impl EscalationDraft {
    pub fn new(session_id: impl Into<String>, reason: EscalationReason) -> Self {
        Self {
            escalation_id: None,
            session_id: session_id.into(),
            customer_id: None,
            reason,
            trigger_priority: None,
            description: String::new(),
            history: Vec::new(),
            customer: CustomerData::default(),
        }
    }

    /// Draft carrying the session's transcript and customer attributes
    pub fn from_session(session: &Session, reason: EscalationReason) -> Self {
        let customer = CustomerData {
            vip: session.context_bool(keys::VIP),
            segment: session.context_str(keys::SEGMENT).map(String::from),
            repeat_customer: session.context_bool(keys::REPEAT_CUSTOMER),
            phone: session.context_str(keys::PHONE).map(String::from),
        };
        Self {
            customer_id: session.user_id.clone(),
            history: session.history.clone(),
            customer,
            ..Self::new(session.session_id.clone(), reason)
        }
    }

    pub fn with_id(mut self, escalation_id: impl Into<String>) -> Self {
        self.escalation_id = Some(escalation_id.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.trigger_priority = Some(priority);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_customer(mut self, customer: CustomerData) -> Self {
        self.customer = customer;
        self
    }
}

/// Result of `create`
#[derive(Debug, Clone)]
pub struct EscalationTicket {
    pub request: EscalationRequest,
    pub customer_message: String,
    /// False when the id already existed and nothing changed
    pub created: bool,
}

/// Status view with live queue information
#[derive(Debug, Clone, Serialize)]
pub struct EscalationView {
    #[serde(flatten)]
    pub request: EscalationRequest,
    pub reference_number: String,
    /// 1-based position among pending requests in the same queue
    pub queue_position: Option<usize>,
    pub current_wait_seconds: u64,
}

/// What `handle_timeouts` did with an overdue request
#[derive(Debug, Clone, PartialEq)]
pub enum TimeoutAction {
    Supervisor {
        escalation_id: String,
        agent_id: String,
    },
    SupervisorUnavailable {
        escalation_id: String,
    },
    Callback {
        escalation_id: String,
        callback_at: DateTime<Utc>,
    },
}

/// Escalation decisioning, queueing and lifecycle
pub struct EscalationEngine {
    config: EscalationConfig,
    triggers: TriggerEvaluator,
    registry: Arc<AgentRegistry>,
    requests: DashMap<String, EscalationRequest>,
    notifications: Arc<NotificationDispatcher>,
}

impl EscalationEngine {
    pub fn new(
        config: EscalationConfig,
        registry: Arc<AgentRegistry>,
        notifications: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            triggers: TriggerEvaluator::new(&config),
            config,
            registry,
            requests: DashMap::new(),
            notifications,
        }
    }

    pub fn config(&self) -> &EscalationConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn notifications(&self) -> &Arc<NotificationDispatcher> {
        &self.notifications
    }

    /// Run the trigger rules for the latest turn
    pub fn evaluate(&self, session: &Session, input: &TriggerInput<'_>) -> Option<TriggerDecision> {
        self.triggers.evaluate(session, input)
    }

    pub fn compute_priority(
        &self,
        reason: EscalationReason,
        trigger_priority: Option<Priority>,
        customer: &CustomerData,
        history_len: usize,
    ) -> Priority {
        let base = trigger_priority.unwrap_or_else(|| base_priority(reason));
        adjust_priority(base, customer.vip, history_len)
    }

    /// Open an escalation and try to assign it right away.
    /// Re-submitting an existing `escalation_id` returns it unchanged.
    pub fn create(&self, draft: EscalationDraft) -> Result<EscalationTicket> {
        let now = Utc::now();
        let escalation_id = draft
            .escalation_id
            .clone()
            .unwrap_or_else(EscalationRequest::mint_id);

        let request = match self.requests.entry(escalation_id.clone()) {
            Entry::Occupied(existing) => {
                let request = existing.get().clone();
                tracing::debug!(escalation_id = %escalation_id, "Escalation already exists");
                return Ok(EscalationTicket {
                    customer_message: customer_message(&request),
                    request,
                    created: false,
                });
            },
            Entry::Vacant(slot) => {
                let request = self.build_request(escalation_id.clone(), draft, now);
                slot.insert(request.clone());
                request
            },
        };

        metrics::counter!(
            "cc_escalations_total",
            "reason" => request.reason.as_str(),
            "priority" => request.priority.as_str()
        )
        .increment(1);
        tracing::info!(
            escalation_id = %request.escalation_id,
            session_id = %request.session_id,
            reason = %request.reason,
            priority = %request.priority,
            queue = %request.queue_name,
            wait_seconds = request.estimated_wait_seconds,
            "Escalation created"
        );

        self.notifications.dispatch(NotificationEvent::EscalationCreated {
            escalation_id: request.escalation_id.clone(),
            session_id: request.session_id.clone(),
            reason: request.reason,
            priority: request.priority,
            queue_name: request.queue_name.clone(),
        });

        self.registry
            .enqueue(&request.queue_name, &request.escalation_id, request.created_at);
        let request = match self.assign(&escalation_id, None)? {
            Some(assigned) => assigned,
            None => request,
        };

        Ok(EscalationTicket {
            customer_message: customer_message(&request),
            request,
            created: true,
        })
    }

    fn build_request(
        &self,
        escalation_id: String,
        draft: EscalationDraft,
        now: DateTime<Utc>,
    ) -> EscalationRequest {
        let priority = self.compute_priority(
            draft.reason,
            draft.trigger_priority,
            &draft.customer,
            draft.history.len(),
        );
        let queue_name = select_queue(&self.config, draft.reason, priority);
        let snapshot = self.registry.queue_snapshot(&queue_name, now);
        let estimated_wait_seconds = estimate_wait(
            &snapshot,
            priority,
            self.config.average_handle_time_seconds,
            self.config.wait_estimate_floor_seconds,
        );

        let start = draft.history.len().saturating_sub(self.config.snapshot_turns);
        let conversation_snapshot = draft.history[start..].to_vec();

        EscalationRequest {
            tags: build_tags(draft.reason, &draft.customer),
            escalation_id,
            session_id: draft.session_id,
            customer_id: draft.customer_id,
            reason: draft.reason,
            priority,
            status: EscalationStatus::Pending,
            description: draft.description,
            conversation_snapshot,
            customer_data: draft.customer,
            assigned_agent: None,
            queue_name,
            created_at: now,
            updated_at: now,
            estimated_wait_seconds,
            callback_at: None,
        }
    }

    /// Assign a pending request, to `agent_id` when given or to the best
    /// scoring agent otherwise. `Ok(None)` means nobody qualified and the
    /// request stays pending.
    pub fn assign(&self, escalation_id: &str, agent_id: Option<&str>) -> Result<Option<EscalationRequest>> {
        let request = self.get(escalation_id)?;
        if request.status != EscalationStatus::Pending {
            return Err(invalid_transition(&request, EscalationStatus::Assigned));
        }

        let agent = match agent_id {
            Some(id) => self.registry.try_reserve(id)?,
            None => match self.reserve_best(&request) {
                Some(agent) => agent,
                None => {
                    tracing::debug!(
                        escalation_id,
                        queue = %request.queue_name,
                        "No eligible agent, request stays pending"
                    );
                    return Ok(None);
                },
            },
        };

        let assigned = {
            let mut stored = self
                .requests
                .get_mut(escalation_id)
                .ok_or_else(|| EscalationError::NotFound(escalation_id.to_string()))?;
            if stored.status.can_transition_to(EscalationStatus::Assigned) {
                stored.status = EscalationStatus::Assigned;
                stored.assigned_agent = Some(agent.agent_id.clone());
                stored.updated_at = Utc::now();
                Ok(stored.clone())
            } else {
                Err(invalid_transition(&stored, EscalationStatus::Assigned))
            }
        };
        let assigned = match assigned {
            Ok(assigned) => assigned,
            Err(e) => {
                // Lost a race with cancel or another assignment
                self.release_agent(&agent.agent_id);
                return Err(e);
            },
        };

        self.registry.dequeue(&assigned.queue_name, escalation_id);
        tracing::info!(
            escalation_id,
            agent_id = %agent.agent_id,
            load = agent.current_load,
            "Escalation assigned"
        );

        let start = assigned
            .conversation_snapshot
            .len()
            .saturating_sub(ASSIGNMENT_CONTEXT_TURNS);
        self.notifications.dispatch(NotificationEvent::EscalationAssigned {
            escalation_id: escalation_id.to_string(),
            agent_id: agent.agent_id.clone(),
            context: assigned.conversation_snapshot[start..].to_vec(),
        });
        if agent.status == AgentStatus::Busy {
            self.notify_agent_status(&agent);
        }
        Ok(Some(assigned))
    }

    fn reserve_best(&self, request: &EscalationRequest) -> Option<Agent> {
        let criteria = SelectionCriteria {
            required_skills: self.config.required_skills(request.reason),
            vip: request.customer_data.vip,
            specialty_skill: self.config.specialty_skill(request.reason),
        };
        let mut candidates: Vec<Agent> = self
            .registry
            .list_available(None)
            .into_iter()
            .filter(|a| self.registry.serves_queue(a, &request.queue_name))
            .collect();

        // Another task may fill the chosen agent first; fall through to the next best
        while let Some(best) = select_agent(&candidates, &criteria) {
            let best_id = best.agent_id.clone();
            match self.registry.try_reserve(&best_id) {
                Ok(agent) => return Some(agent),
                Err(_) => candidates.retain(|a| a.agent_id != best_id),
            }
        }
        None
    }

    pub fn get(&self, escalation_id: &str) -> Result<EscalationRequest> {
        self.requests
            .get(escalation_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| EscalationError::NotFound(escalation_id.to_string()))
    }

    /// Status with queue position and a fresh wait estimate
    pub fn status(&self, escalation_id: &str) -> Result<EscalationView> {
        let request = self.get(escalation_id)?;
        let now = Utc::now();

        let (queue_position, current_wait_seconds) = if request.status == EscalationStatus::Pending {
            let position = self
                .pending()
                .iter()
                .filter(|r| r.queue_name == request.queue_name)
                .position(|r| r.escalation_id == request.escalation_id)
                .map(|i| i + 1);
            let live = self.registry.queue_snapshot(&request.queue_name, now);
            let ahead = QueueSnapshot {
                contacts_in_queue: position.map_or(0, |p| p as u64 - 1),
                ..live
            };
            let wait = estimate_wait(
                &ahead,
                request.priority,
                self.config.average_handle_time_seconds,
                self.config.wait_estimate_floor_seconds,
            );
            (position, wait)
        } else {
            (None, 0)
        };

        Ok(EscalationView {
            reference_number: request.reference_number(),
            request,
            queue_position,
            current_wait_seconds,
        })
    }

    /// Pending requests ordered by descending priority, then age
    pub fn pending(&self) -> Vec<EscalationRequest> {
        let mut pending: Vec<EscalationRequest> = self
            .requests
            .iter()
            .filter(|r| r.status == EscalationStatus::Pending)
            .map(|r| r.value().clone())
            .collect();
        pending.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.escalation_id.cmp(&b.escalation_id))
        });
        pending
    }

    /// Every request, oldest first
    pub fn list(&self) -> Vec<EscalationRequest> {
        let mut all: Vec<EscalationRequest> = self.requests.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        all
    }

    /// Non-terminal request opened for `session_id`, if any
    pub fn open_for_session(&self, session_id: &str) -> Option<EscalationRequest> {
        self.requests
            .iter()
            .filter(|r| r.session_id == session_id && !r.status.is_terminal())
            .map(|r| r.value().clone())
            .min_by(|a, b| a.created_at.cmp(&b.created_at))
    }

    /// Cancel a pending or assigned request
    pub fn cancel(&self, escalation_id: &str, reason: &str) -> Result<EscalationRequest> {
        let cancelled = self.transition(escalation_id, EscalationStatus::Cancelled)?;
        self.registry.dequeue(&cancelled.queue_name, escalation_id);
        tracing::info!(escalation_id, reason, "Escalation cancelled");
        if let Some(agent_id) = &cancelled.assigned_agent {
            self.release_agent(agent_id);
        }
        Ok(cancelled)
    }

    /// Agent picked up the contact
    pub fn accept(&self, escalation_id: &str) -> Result<EscalationRequest> {
        self.transition(escalation_id, EscalationStatus::InProgress)
    }

    /// Agent finished the contact; frees their slot
    pub fn resolve(&self, escalation_id: &str) -> Result<EscalationRequest> {
        let resolved = self.transition(escalation_id, EscalationStatus::Resolved)?;
        if let Some(agent_id) = &resolved.assigned_agent {
            self.release_agent(agent_id);
        }
        Ok(resolved)
    }

    fn transition(&self, escalation_id: &str, to: EscalationStatus) -> Result<EscalationRequest> {
        let updated = {
            let mut stored = self
                .requests
                .get_mut(escalation_id)
                .ok_or_else(|| EscalationError::NotFound(escalation_id.to_string()))?;
            if !stored.status.can_transition_to(to) {
                return Err(invalid_transition(&stored, to));
            }
            stored.status = to;
            stored.updated_at = Utc::now();
            stored.clone()
        };
        self.notifications.dispatch(NotificationEvent::EscalationUpdated {
            escalation_id: escalation_id.to_string(),
            status: to,
        });
        Ok(updated)
    }

    fn release_agent(&self, agent_id: &str) {
        match self.registry.adjust_load(agent_id, -1) {
            Ok(agent) => {
                if agent.status == AgentStatus::Available {
                    self.notify_agent_status(&agent);
                    self.dispatch_pending(Utc::now());
                }
            },
            Err(e) => tracing::error!(agent_id, error = %e, "Failed to release agent"),
        }
    }

    fn notify_agent_status(&self, agent: &Agent) {
        self.notifications.dispatch(NotificationEvent::AgentStatusChanged {
            agent_id: agent.agent_id.clone(),
            status: agent.status,
        });
    }

    /// Add an agent and offer them any waiting contacts
    pub fn register_agent(&self, agent: Agent) {
        self.registry.register(agent);
        self.dispatch_pending(Utc::now());
    }

    /// Change an agent's status; an agent becoming available picks up queued contacts
    pub fn set_agent_status(&self, agent_id: &str, status: AgentStatus) -> Result<Agent> {
        self.registry.set_status(agent_id, status)?;
        let agent = self
            .registry
            .get(agent_id)
            .ok_or_else(|| EscalationError::AgentNotFound(agent_id.to_string()))?;
        self.notify_agent_status(&agent);
        if status == AgentStatus::Available {
            self.dispatch_pending(Utc::now());
        }
        Ok(agent)
    }

    /// Offer queued requests to free agents in priority order.
    /// Returns `(escalation_id, agent_id)` for each assignment made.
    pub fn dispatch_pending(&self, now: DateTime<Utc>) -> Vec<(String, String)> {
        let mut assigned = Vec::new();
        for request in self.pending() {
            if request.callback_at.is_some_and(|at| at > now) {
                continue;
            }
            match self.assign(&request.escalation_id, None) {
                Ok(Some(done)) => {
                    if let Some(agent_id) = done.assigned_agent {
                        assigned.push((done.escalation_id, agent_id));
                    }
                },
                Ok(None) => {},
                Err(e) => tracing::debug!(
                    escalation_id = %request.escalation_id,
                    error = %e,
                    "Skipped during dispatch"
                ),
            }
        }
        assigned
    }

    /// Handle requests pending longer than the configured timeout: critical
    /// ones go to a supervisor, the rest are parked for a call back.
    pub fn handle_timeouts(&self, now: DateTime<Utc>) -> Vec<TimeoutAction> {
        let limit = Duration::seconds(self.config.pending_timeout_seconds as i64);
        let mut actions = Vec::new();

        for request in self.pending() {
            if request.callback_at.is_some() || now - request.created_at <= limit {
                continue;
            }
            let id = request.escalation_id.clone();

            if request.priority == Priority::Critical {
                let supervisors: Vec<Agent> = self
                    .registry
                    .list_available(None)
                    .into_iter()
                    .filter(|a| a.tags.contains(SUPERVISOR_TAG))
                    .collect();
                let chosen = select_agent(&supervisors, &SelectionCriteria::default())
                    .map(|a| a.agent_id.clone());
                match chosen.map(|agent_id| (self.assign(&id, Some(&agent_id)), agent_id)) {
                    Some((Ok(Some(_)), agent_id)) => {
                        tracing::warn!(escalation_id = %id, agent_id = %agent_id, "Escalated to supervisor");
                        actions.push(TimeoutAction::Supervisor {
                            escalation_id: id,
                            agent_id,
                        });
                    },
                    _ => {
                        tracing::error!(escalation_id = %id, "No supervisor available for critical escalation");
                        actions.push(TimeoutAction::SupervisorUnavailable { escalation_id: id });
                    },
                }
                continue;
            }

            let callback_at = now + Duration::seconds(self.config.callback_delay_seconds as i64);
            let parked = match self.requests.get_mut(&id) {
                Some(mut stored) if stored.status == EscalationStatus::Pending => {
                    stored.callback_at = Some(callback_at);
                    stored.tags.insert(CALLBACK_TAG.to_string());
                    stored.updated_at = now;
                    true
                },
                _ => false,
            };
            if parked {
                self.registry.dequeue(&request.queue_name, &id);
                tracing::info!(escalation_id = %id, %callback_at, "Moved to callback");
                actions.push(TimeoutAction::Callback {
                    escalation_id: id,
                    callback_at,
                });
            }
        }
        actions
    }

    /// Every request, for snapshots
    pub fn export(&self) -> Vec<EscalationRequest> {
        self.list()
    }

    /// Restore requests from a snapshot and rebuild the waiting queues
    pub fn import(&self, requests: Vec<EscalationRequest>) -> usize {
        let count = requests.len();
        for request in requests {
            if request.status == EscalationStatus::Pending && request.callback_at.is_none() {
                self.registry
                    .enqueue(&request.queue_name, &request.escalation_id, request.created_at);
            }
            self.requests.insert(request.escalation_id.clone(), request);
        }
        count
    }
}

fn build_tags(reason: EscalationReason, customer: &CustomerData) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    tags.insert(reason.as_str().to_string());
    if customer.vip {
        tags.insert("vip".to_string());
    }
    if customer.repeat_customer {
        tags.insert("returning".to_string());
    }
    if let Some(segment) = customer.segment.as_deref().filter(|s| !s.is_empty()) {
        tags.insert(format!("segment_{segment}"));
    }
    tags
}

fn invalid_transition(request: &EscalationRequest, to: EscalationStatus) -> EscalationError {
    EscalationError::InvalidTransition {
        id: request.escalation_id.clone(),
        from: request.status.to_string(),
        to: to.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contact_center_config::NotifierConfig;
    use crate::notifier::LoggingNotifier;

    fn engine() -> EscalationEngine {
        let dispatcher = Arc::new(NotificationDispatcher::spawn(
            Arc::new(LoggingNotifier),
            &NotifierConfig::default(),
        ));
        EscalationEngine::new(
            EscalationConfig::default(),
            Arc::new(AgentRegistry::new()),
            dispatcher,
        )
    }

    #[tokio::test]
    async fn test_tags() {
        let customer = CustomerData {
            vip: true,
            segment: Some("gold".into()),
            repeat_customer: true,
            phone: None,
        };
        let tags = build_tags(EscalationReason::Complaint, &customer);
        let expected: BTreeSet<String> = ["complaint", "vip", "returning", "segment_gold"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(tags, expected);
    }

    #[tokio::test]
    async fn test_create_without_agents_stays_pending() {
        let engine = engine();
        let ticket = engine
            .create(EscalationDraft::new("s1", EscalationReason::Complaint))
            .unwrap();
        assert!(ticket.created);
        assert_eq!(ticket.request.status, EscalationStatus::Pending);
        assert_eq!(ticket.request.priority, Priority::High);
        assert_eq!(ticket.request.queue_name, "complaint-queue");
        // No agents: floor of 900 s capped to 600 s for high priority
        assert_eq!(ticket.request.estimated_wait_seconds, 600);
        assert!(ticket.customer_message.contains("약 10분"));
    }

    #[tokio::test]
    async fn test_create_assigns_best_agent() {
        let engine = engine();
        engine.register_agent(Agent::new("general", "김", 3));
        engine.register_agent(Agent::new("specialist", "이", 3).with_skills(["complaint"]));

        let ticket = engine
            .create(EscalationDraft::new("s1", EscalationReason::Complaint))
            .unwrap();
        assert_eq!(ticket.request.status, EscalationStatus::Assigned);
        assert_eq!(ticket.request.assigned_agent.as_deref(), Some("specialist"));
        assert_eq!(engine.registry().get("specialist").unwrap().current_load, 1);
    }

    #[tokio::test]
    async fn test_lifecycle_releases_agent() {
        let engine = engine();
        engine.register_agent(Agent::new("a1", "김", 1));
        let ticket = engine
            .create(EscalationDraft::new("s1", EscalationReason::UserRequest))
            .unwrap();
        let id = ticket.request.escalation_id;
        assert_eq!(engine.registry().get("a1").unwrap().status, AgentStatus::Busy);

        engine.cancel(&id, "customer left").unwrap();
        let agent = engine.registry().get("a1").unwrap();
        assert_eq!(agent.current_load, 0);
        assert_eq!(agent.status, AgentStatus::Available);
    }

    #[tokio::test]
    async fn test_cancel_rejected_once_in_progress() {
        let engine = engine();
        engine.register_agent(Agent::new("a1", "김", 2));
        let id = engine
            .create(EscalationDraft::new("s1", EscalationReason::UserRequest))
            .unwrap()
            .request
            .escalation_id;

        engine.accept(&id).unwrap();
        assert!(matches!(
            engine.cancel(&id, "too late"),
            Err(EscalationError::InvalidTransition { .. })
        ));
        engine.resolve(&id).unwrap();
        assert!(engine.cancel(&id, "too late").is_err());
        assert_eq!(engine.registry().get("a1").unwrap().current_load, 0);
    }

    #[tokio::test]
    async fn test_dispatch_pending_in_priority_order() {
        let engine = engine();
        let low = engine
            .create(EscalationDraft::new("s1", EscalationReason::CustomerRequest))
            .unwrap()
            .request;
        let high = engine
            .create(EscalationDraft::new("s2", EscalationReason::PaymentIssue))
            .unwrap()
            .request;
        assert_eq!(engine.pending()[0].escalation_id, high.escalation_id);

        // One slot: the high-priority request takes it
        engine.register_agent(Agent::new("a1", "김", 1).with_skills(["payment"]));
        assert_eq!(engine.get(&high.escalation_id).unwrap().status, EscalationStatus::Assigned);
        assert_eq!(engine.get(&low.escalation_id).unwrap().status, EscalationStatus::Pending);

        // Freeing the slot hands it to the next request
        engine.accept(&high.escalation_id).unwrap();
        engine.resolve(&high.escalation_id).unwrap();
        assert_eq!(engine.get(&low.escalation_id).unwrap().status, EscalationStatus::Assigned);
    }

    #[tokio::test]
    async fn test_status_reports_queue_position() {
        let engine = engine();
        let first = engine
            .create(EscalationDraft::new("s1", EscalationReason::UserRequest))
            .unwrap()
            .request;
        let second = engine
            .create(EscalationDraft::new("s2", EscalationReason::UserRequest))
            .unwrap()
            .request;

        let view = engine.status(&second.escalation_id).unwrap();
        assert_eq!(view.queue_position, Some(2));
        assert_eq!(view.reference_number, second.reference_number());
        assert_eq!(engine.status(&first.escalation_id).unwrap().queue_position, Some(1));
        assert!(engine.status("esc_missing").is_err());
    }

    #[tokio::test]
    async fn test_timeouts() {
        let engine = engine();
        let urgent = engine
            .create(EscalationDraft::new("s1", EscalationReason::UrgentMatter))
            .unwrap()
            .request;
        let normal = engine
            .create(EscalationDraft::new("s2", EscalationReason::UserRequest))
            .unwrap()
            .request;

        let mut supervisor = Agent::new("sup", "박", 2).with_tags(["supervisor"]);
        supervisor.status = AgentStatus::Away;
        engine.registry().register(supervisor);
        engine.registry().set_status("sup", AgentStatus::Available).unwrap();

        let later = Utc::now() + Duration::minutes(16);
        let actions = engine.handle_timeouts(later);
        assert_eq!(actions.len(), 2);
        assert!(actions.iter().any(|a| matches!(a,
            TimeoutAction::Supervisor { escalation_id, agent_id }
                if *escalation_id == urgent.escalation_id && agent_id == "sup")));

        let parked = engine.get(&normal.escalation_id).unwrap();
        assert_eq!(parked.status, EscalationStatus::Pending);
        assert!(parked.tags.contains(CALLBACK_TAG));
        assert_eq!(
            parked.callback_at,
            Some(later + Duration::seconds(3600))
        );

        // Already parked requests are left alone
        assert!(engine.handle_timeouts(later).is_empty());
    }

    #[tokio::test]
    async fn test_from_session_carries_customer_data() {
        let mut session = Session::new("s1", Some("u1".into()), contact_center_core::Channel::WebChat);
        session.set_context(keys::VIP, true);
        session.set_context(keys::SEGMENT, "gold");
        let draft = EscalationDraft::from_session(&session, EscalationReason::BotLimitation);
        assert!(draft.customer.vip);
        assert_eq!(draft.customer_id.as_deref(), Some("u1"));

        let engine = engine();
        let request = engine.create(draft).unwrap().request;
        // VIP lifts the low base priority to high
        assert_eq!(request.priority, Priority::High);
        assert!(request.tags.contains("segment_gold"));
    }
}

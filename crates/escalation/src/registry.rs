//! Agent and queue registry
//!
//! The registry is the only writer of agent state. Each agent lives in its
//! own `DashMap` entry so mutators are atomic per `agent_id`; snapshots
//! iterate the map and may observe a mix of recent states.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};

use contact_center_core::{Agent, AgentStatus, QueueSnapshot};

use crate::{EscalationError, Result};

/// Concurrent registry of agents and waiting contacts
#[derive(Default)]
pub struct AgentRegistry {
    agents: DashMap<String, Agent>,
    /// queue name -> (escalation id -> enqueued at)
    queues: DashMap<String, BTreeMap<String, DateTime<Utc>>>,
    /// routing profile -> queues it serves
    routing_profiles: HashMap<String, Vec<String>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_routing_profiles(routing_profiles: HashMap<String, Vec<String>>) -> Self {
        Self {
            routing_profiles,
            ..Self::default()
        }
    }

    /// Add or replace an agent
    pub fn register(&self, mut agent: Agent) {
        if agent.current_load >= agent.max_capacity && agent.status == AgentStatus::Available {
            agent.status = AgentStatus::Busy;
        }
        tracing::info!(
            agent_id = %agent.agent_id,
            status = %agent.status,
            skills = ?agent.skills,
            "Agent registered"
        );
        self.agents.insert(agent.agent_id.clone(), agent);
    }

    pub fn get(&self, agent_id: &str) -> Option<Agent> {
        self.agents.get(agent_id).map(|a| a.value().clone())
    }

    /// Every agent, ordered by id
    pub fn list(&self) -> Vec<Agent> {
        let mut agents: Vec<Agent> = self.agents.iter().map(|a| a.value().clone()).collect();
        agents.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Agents that can take a contact and hold every listed skill
    pub fn list_available(&self, skills: Option<&[String]>) -> Vec<Agent> {
        self.list()
            .into_iter()
            .filter(|a| a.can_take_contact())
            .filter(|a| skills.map_or(true, |s| s.iter().all(|skill| a.skills.contains(skill))))
            .collect()
    }

    /// Whether the agent's routing profile lets them serve `queue`.
    /// Agents without a profile, or with an unlisted one, serve every queue.
    pub fn serves_queue(&self, agent: &Agent, queue: &str) -> bool {
        if agent.routing_profile.is_empty() {
            return true;
        }
        match self.routing_profiles.get(&agent.routing_profile) {
            Some(queues) => queues.iter().any(|q| q == queue),
            None => true,
        }
    }

    /// Change an agent's status; returns the previous status
    pub fn set_status(&self, agent_id: &str, status: AgentStatus) -> Result<AgentStatus> {
        let mut agent = self
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| EscalationError::AgentNotFound(agent_id.to_string()))?;

        if status == AgentStatus::Available && !agent.has_capacity() {
            return Err(EscalationError::AgentUnavailable(agent_id.to_string()));
        }
        let previous = agent.status;
        agent.status = status;
        agent.last_activity_at = Utc::now();
        tracing::debug!(agent_id, from = %previous, to = %status, "Agent status changed");
        Ok(previous)
    }

    /// Change an agent's load by `delta`, flipping between available and
    /// busy at capacity. Returns the updated agent.
    pub fn adjust_load(&self, agent_id: &str, delta: i32) -> Result<Agent> {
        let mut agent = self
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| EscalationError::AgentNotFound(agent_id.to_string()))?;

        let load = agent.current_load as i64 + delta as i64;
        if load < 0 || load > agent.max_capacity as i64 {
            return Err(EscalationError::LoadOutOfRange {
                agent_id: agent_id.to_string(),
                load,
                capacity: agent.max_capacity,
            });
        }
        agent.current_load = load as u32;
        agent.last_activity_at = Utc::now();

        if !agent.has_capacity() && agent.status == AgentStatus::Available {
            agent.status = AgentStatus::Busy;
        } else if agent.has_capacity() && agent.status == AgentStatus::Busy && delta < 0 {
            agent.status = AgentStatus::Available;
        }
        Ok(agent.clone())
    }

    /// Reserve one slot if the agent can take a contact right now
    pub fn try_reserve(&self, agent_id: &str) -> Result<Agent> {
        let mut agent = self
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| EscalationError::AgentNotFound(agent_id.to_string()))?;
        if !agent.can_take_contact() {
            return Err(EscalationError::AgentUnavailable(agent_id.to_string()));
        }
        agent.current_load += 1;
        agent.last_activity_at = Utc::now();
        if !agent.has_capacity() {
            agent.status = AgentStatus::Busy;
        }
        Ok(agent.clone())
    }

    pub fn update_productivity(&self, agent_id: &str, score: f64) -> Result<()> {
        let mut agent = self
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| EscalationError::AgentNotFound(agent_id.to_string()))?;
        agent.productivity_score = score.clamp(0.0, 100.0);
        Ok(())
    }

    pub fn enqueue(&self, queue: &str, escalation_id: &str, at: DateTime<Utc>) {
        self.queues
            .entry(queue.to_string())
            .or_default()
            .insert(escalation_id.to_string(), at);
    }

    /// Returns whether the contact was waiting in `queue`
    pub fn dequeue(&self, queue: &str, escalation_id: &str) -> bool {
        self.queues
            .get_mut(queue)
            .map(|mut waiting| waiting.remove(escalation_id).is_some())
            .unwrap_or(false)
    }

    pub fn queue_snapshot(&self, queue: &str, now: DateTime<Utc>) -> QueueSnapshot {
        let (contacts_in_queue, longest_queue_wait) = match self.queues.get(queue) {
            Some(waiting) => {
                let longest = waiting
                    .values()
                    .min()
                    .map(|oldest| (now - *oldest).num_seconds().max(0) as u64)
                    .unwrap_or(0);
                (waiting.len() as u64, longest)
            },
            None => (0, 0),
        };
        let agents_available = self
            .agents
            .iter()
            .filter(|a| a.can_take_contact() && self.serves_queue(a.value(), queue))
            .count() as u64;

        QueueSnapshot {
            contacts_in_queue,
            agents_available,
            longest_queue_wait,
        }
    }

    /// Remove every queued contact, for snapshot restore
    pub fn clear_queues(&self) {
        self.queues.clear();
    }
}

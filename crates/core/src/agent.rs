//! Human agents and queue snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Agent availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Available,
    Busy,
    Away,
    #[default]
    Offline,
    AfterCallWork,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Available => "available",
            AgentStatus::Busy => "busy",
            AgentStatus::Away => "away",
            AgentStatus::Offline => "offline",
            AgentStatus::AfterCallWork => "after_call_work",
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human agent tracked by the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: String,
    pub display_name: String,
    #[serde(default)]
    pub skills: BTreeSet<String>,
    /// Free-form markers such as `vip` or `supervisor`
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub current_load: u32,
    pub max_capacity: u32,
    #[serde(default)]
    pub status: AgentStatus,
    #[serde(default)]
    pub routing_profile: String,
    /// In [0, 100]
    #[serde(default)]
    pub productivity_score: f64,
    pub last_activity_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(agent_id: impl Into<String>, display_name: impl Into<String>, max_capacity: u32) -> Self {
        Self {
            agent_id: agent_id.into(),
            display_name: display_name.into(),
            skills: BTreeSet::new(),
            tags: BTreeSet::new(),
            current_load: 0,
            max_capacity,
            status: AgentStatus::Available,
            routing_profile: String::new(),
            productivity_score: 0.0,
            last_activity_at: Utc::now(),
        }
    }

    pub fn with_skills(mut self, skills: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.skills = skills.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_productivity(mut self, score: f64) -> Self {
        self.productivity_score = score.clamp(0.0, 100.0);
        self
    }

    pub fn with_routing_profile(mut self, profile: impl Into<String>) -> Self {
        self.routing_profile = profile.into();
        self
    }

    pub fn has_capacity(&self) -> bool {
        self.current_load < self.max_capacity
    }

    /// Available and below capacity
    pub fn can_take_contact(&self) -> bool {
        self.status == AgentStatus::Available && self.has_capacity()
    }

    /// `current_load <= max_capacity` and `available => load < capacity`
    pub fn invariants_hold(&self) -> bool {
        self.current_load <= self.max_capacity
            && (self.status != AgentStatus::Available || self.has_capacity())
    }
}

/// Point-in-time view of a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct QueueSnapshot {
    pub contacts_in_queue: u64,
    pub agents_available: u64,
    /// Seconds the oldest waiting contact has been queued
    pub longest_queue_wait: u64,
}

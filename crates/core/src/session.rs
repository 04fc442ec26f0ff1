//! Session and turn records

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};
use crate::nlu::Intent;

/// Well-known keys in `Session::context`
pub mod keys {
    pub const LAST_INTENT: &str = "last_intent";
    pub const LAST_CONFIDENCE: &str = "last_confidence";
    pub const CUSTOMER_MOOD: &str = "customer_mood";
    pub const CONVERSATION_STAGE: &str = "conversation_stage";
    pub const ESCALATION_REASON: &str = "escalation_reason";
    pub const ESCALATION_ID: &str = "escalation_id";
    pub const COLLECTED_DATA: &str = "collected_data";
    pub const RESOLVED: &str = "resolved";
    pub const VIP: &str = "vip";
    pub const SEGMENT: &str = "segment";
    pub const REPEAT_CUSTOMER: &str = "repeat_customer";
    pub const PHONE: &str = "phone";
    pub const UTC_OFFSET_MINUTES: &str = "utc_offset_minutes";
    pub const ENTITY_PREFIX: &str = "entity_";
}

/// Inbound channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    #[default]
    WebChat,
    Voice,
    Sms,
    MobileApp,
    Messenger,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::WebChat => "web_chat",
            Channel::Voice => "voice",
            Channel::Sms => "sms",
            Channel::MobileApp => "mobile_app",
            Channel::Messenger => "messenger",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Active,
    BotHandling,
    WaitingInput,
    Escalated,
    AgentAssigned,
    Completed,
    Cancelled,
}

static STATUS_TRANSITIONS: Lazy<HashMap<SessionStatus, &'static [SessionStatus]>> =
    Lazy::new(|| {
        use SessionStatus::*;
        let mut map = HashMap::new();
        map.insert(
            Active,
            &[BotHandling, WaitingInput, Escalated, Completed, Cancelled] as &[_],
        );
        map.insert(
            BotHandling,
            &[Active, WaitingInput, Escalated, Completed, Cancelled] as &[_],
        );
        map.insert(
            WaitingInput,
            &[Active, Escalated, Completed, Cancelled] as &[_],
        );
        map.insert(Escalated, &[AgentAssigned, Completed, Cancelled] as &[_]);
        map.insert(AgentAssigned, &[Completed, Cancelled] as &[_]);
        map.insert(Completed, &[] as &[_]);
        map.insert(Cancelled, &[] as &[_]);
        map
    });

impl SessionStatus {
    pub fn allowed_transitions(&self) -> &'static [SessionStatus] {
        STATUS_TRANSITIONS.get(self).copied().unwrap_or(&[])
    }

    /// Staying in the same status is always allowed
    pub fn can_transition_to(&self, target: SessionStatus) -> bool {
        *self == target || self.allowed_transitions().contains(&target)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }

    pub fn is_with_agent(&self) -> bool {
        matches!(self, SessionStatus::Escalated | SessionStatus::AgentAssigned)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::BotHandling => "bot_handling",
            SessionStatus::WaitingInput => "waiting_input",
            SessionStatus::Escalated => "escalated",
            SessionStatus::AgentAssigned => "agent_assigned",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnSource {
    User,
    Bot,
    Agent,
    System,
}

/// One entry in a session transcript. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub turn_id: String,
    pub timestamp: DateTime<Utc>,
    pub source: TurnSource,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub entities: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action: Option<String>,
}

impl TurnRecord {
    pub fn new(source: TurnSource, content: impl Into<String>) -> Self {
        Self {
            turn_id: format!("turn_{}", uuid::Uuid::new_v4().simple()),
            timestamp: Utc::now(),
            source,
            content: content.into(),
            intent: None,
            confidence: None,
            entities: BTreeMap::new(),
            next_action: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnSource::User, content)
    }

    pub fn bot(content: impl Into<String>) -> Self {
        Self::new(TurnSource::Bot, content)
    }

    pub fn with_classification(mut self, intent: Intent, confidence: f32) -> Self {
        self.intent = Some(intent);
        self.confidence = Some(confidence);
        self
    }

    pub fn with_next_action(mut self, action: impl Into<String>) -> Self {
        self.next_action = Some(action.into());
        self
    }

    pub fn with_entities(mut self, entities: BTreeMap<String, String>) -> Self {
        self.entities = entities;
        self
    }
}

/// Per-conversation state owned by the session store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub channel: Channel,
    pub status: SessionStatus,
    #[serde(default)]
    pub context: BTreeMap<String, Value>,
    #[serde(default)]
    pub current_flow: Option<String>,
    #[serde(default)]
    pub current_step: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub history: Vec<TurnRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency token, bumped by the store on every write
    #[serde(default)]
    pub version: u64,
}

impl Session {
    pub fn new(session_id: impl Into<String>, user_id: Option<String>, channel: Channel) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            user_id,
            channel,
            status: SessionStatus::Active,
            context: BTreeMap::new(),
            current_flow: None,
            current_step: None,
            retry_count: 0,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Mint a server-side session id
    pub fn mint_id() -> String {
        format!("sess_{}", uuid::Uuid::new_v4().simple())
    }

    /// Move to a new status, rejecting transitions outside the lifecycle graph
    pub fn transition_to(&mut self, target: SessionStatus) -> Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(Error::InvalidTransition {
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        self.status = target;
        Ok(())
    }

    /// Check structural invariants
    pub fn check_invariants(&self, max_retries: u32) -> Result<()> {
        if self.current_flow.is_none() && self.current_step.is_some() {
            return Err(Error::InvalidState(format!(
                "session {} has a current step without a flow",
                self.session_id
            )));
        }
        if self.retry_count > max_retries {
            return Err(Error::InvalidState(format!(
                "session {} retry_count {} exceeds {}",
                self.session_id, self.retry_count, max_retries
            )));
        }
        Ok(())
    }

    pub fn has_active_flow(&self) -> bool {
        self.current_flow.is_some()
    }

    pub fn clear_flow(&mut self) {
        self.current_flow = None;
        self.current_step = None;
        self.retry_count = 0;
    }

    pub fn context_str(&self, key: &str) -> Option<&str> {
        self.context.get(key).and_then(Value::as_str)
    }

    pub fn context_bool(&self, key: &str) -> bool {
        match self.context.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => matches!(s.as_str(), "true" | "yes" | "1"),
            _ => false,
        }
    }

    pub fn set_context(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.context.insert(key.into(), value.into());
    }

    /// Values collected by scenario steps, rendered as strings
    pub fn collected_data(&self) -> BTreeMap<String, String> {
        match self.context.get(keys::COLLECTED_DATA) {
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| {
                    let text = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), text)
                })
                .collect(),
            _ => BTreeMap::new(),
        }
    }

    pub fn store_collected(&mut self, field: impl Into<String>, value: Value) {
        let entry = self
            .context
            .entry(keys::COLLECTED_DATA.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
        if !entry.is_object() {
            *entry = Value::Object(Default::default());
        }
        if let Value::Object(map) = entry {
            map.insert(field.into(), value);
        }
    }

    pub fn user_turns(&self) -> impl DoubleEndedIterator<Item = &TurnRecord> {
        self.history.iter().filter(|t| t.source == TurnSource::User)
    }

    pub fn last_turn(&self) -> Option<&TurnRecord> {
        self.history.last()
    }

    /// Most recent turns, oldest first
    pub fn recent_turns(&self, n: usize) -> Vec<TurnRecord> {
        let start = self.history.len().saturating_sub(n);
        self.history[start..].to_vec()
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }

    /// Completed or cancelled and untouched for longer than `retention`
    pub fn is_archivable(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        self.status.is_closed() && now - self.updated_at > retention
    }
}

/// Derived customer mood, kept under `customer_mood`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CustomerMood {
    #[default]
    Neutral,
    Positive,
    Frustrated,
    Confused,
}

impl CustomerMood {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerMood::Neutral => "neutral",
            CustomerMood::Positive => "positive",
            CustomerMood::Frustrated => "frustrated",
            CustomerMood::Confused => "confused",
        }
    }
}

/// Derived conversation stage, kept under `conversation_stage`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStage {
    #[default]
    Greeting,
    Inquiry,
    ProblemSolving,
    DataCollection,
    Handoff,
    Closing,
}

impl ConversationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStage::Greeting => "greeting",
            ConversationStage::Inquiry => "inquiry",
            ConversationStage::ProblemSolving => "problem_solving",
            ConversationStage::DataCollection => "data_collection",
            ConversationStage::Handoff => "handoff",
            ConversationStage::Closing => "closing",
        }
    }
}

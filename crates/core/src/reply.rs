//! Turn request and bot reply types exchanged with the transport

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Error;
use crate::nlu::Intent;
use crate::session::Channel;

/// What the caller should expect next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    Continue,
    Clarify,
    CollectInput,
    Complete,
    Escalate,
    WaitForAgent,
    AgentHandling,
    End,
    Error,
}

impl NextAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            NextAction::Continue => "continue",
            NextAction::Clarify => "clarify",
            NextAction::CollectInput => "collect_input",
            NextAction::Complete => "complete",
            NextAction::Escalate => "escalate",
            NextAction::WaitForAgent => "wait_for_agent",
            NextAction::AgentHandling => "agent_handling",
            NextAction::End => "end",
            NextAction::Error => "error",
        }
    }
}

impl std::fmt::Display for NextAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub channel: Channel,
    pub message: String,
    /// Customer attributes (vip, segment, phone, ...) merged into the session context
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl TurnRequest {
    pub fn new(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            user_id: None,
            channel: Channel::WebChat,
            message: message.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Successful outcome of a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotReply {
    pub session_id: String,
    pub response_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub entities: BTreeMap<String, String>,
    pub next_action: NextAction,
    pub escalation_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_reference: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl BotReply {
    pub fn new(session_id: impl Into<String>, text: impl Into<String>, next_action: NextAction) -> Self {
        Self {
            session_id: session_id.into(),
            response_text: text.into(),
            intent: None,
            confidence: None,
            entities: BTreeMap::new(),
            next_action,
            escalation_required: false,
            escalation_reference: None,
            timestamp: Utc::now(),
        }
    }
}

/// Structured error body; never carries internal details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error_code: String,
    pub message: String,
}

impl From<&Error> for ErrorReply {
    fn from(err: &Error) -> Self {
        Self {
            error_code: err.error_code().to_string(),
            message: err.user_message(),
        }
    }
}

/// Tagged outcome of a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TurnResponse {
    Reply(BotReply),
    Error(ErrorReply),
}

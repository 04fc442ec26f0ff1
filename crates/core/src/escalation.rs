//! Escalation requests and notifier events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::session::TurnRecord;

/// Why a session is being handed to a human
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    UserRequest,
    NegativeSentiment,
    BotLimitation,
    UrgentMatter,
    Timeout,
    Complaint,
    PaymentIssue,
    TechnicalSupport,
    ComplexInquiry,
    CustomerRequest,
    SystemError,
    ScenarioDirected,
}

impl EscalationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationReason::UserRequest => "user_request",
            EscalationReason::NegativeSentiment => "negative_sentiment",
            EscalationReason::BotLimitation => "bot_limitation",
            EscalationReason::UrgentMatter => "urgent_matter",
            EscalationReason::Timeout => "timeout",
            EscalationReason::Complaint => "complaint",
            EscalationReason::PaymentIssue => "payment_issue",
            EscalationReason::TechnicalSupport => "technical_support",
            EscalationReason::ComplexInquiry => "complex_inquiry",
            EscalationReason::CustomerRequest => "customer_request",
            EscalationReason::SystemError => "system_error",
            EscalationReason::ScenarioDirected => "scenario_directed",
        }
    }

    /// Parse a reason string, falling back to `CustomerRequest`
    pub fn parse_or_default(raw: &str) -> Self {
        serde_json::from_value(serde_json::Value::String(raw.trim().to_lowercase()))
            .unwrap_or(EscalationReason::CustomerRequest)
    }
}

impl std::fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Escalation priority; ordering follows urgency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl Priority {
    pub fn level(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }

    /// Raise to at least `floor`
    pub fn at_least(self, floor: Priority) -> Priority {
        self.max(floor)
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Escalation lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationStatus {
    Pending,
    Assigned,
    InProgress,
    Resolved,
    Cancelled,
}

impl EscalationStatus {
    pub fn can_transition_to(&self, target: EscalationStatus) -> bool {
        use EscalationStatus::*;
        matches!(
            (self, target),
            (Pending, Assigned)
                | (Assigned, InProgress)
                | (InProgress, Resolved)
                | (Pending, Cancelled)
                | (Assigned, Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EscalationStatus::Resolved | EscalationStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationStatus::Pending => "pending",
            EscalationStatus::Assigned => "assigned",
            EscalationStatus::InProgress => "in_progress",
            EscalationStatus::Resolved => "resolved",
            EscalationStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for EscalationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Customer attributes relevant to routing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CustomerData {
    #[serde(default)]
    pub vip: bool,
    #[serde(default)]
    pub segment: Option<String>,
    #[serde(default)]
    pub repeat_customer: bool,
    #[serde(default)]
    pub phone: Option<String>,
}

/// A request to hand a session to a human agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationRequest {
    pub escalation_id: String,
    pub session_id: String,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub reason: EscalationReason,
    pub priority: Priority,
    pub status: EscalationStatus,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub conversation_snapshot: Vec<TurnRecord>,
    #[serde(default)]
    pub customer_data: CustomerData,
    #[serde(default)]
    pub assigned_agent: Option<String>,
    pub queue_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub estimated_wait_seconds: u64,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Set when a pending request is parked for a call back
    #[serde(default)]
    pub callback_at: Option<DateTime<Utc>>,
}

impl EscalationRequest {
    /// `esc_<12 hex>`
    pub fn mint_id() -> String {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        format!("esc_{}", &hex[..12])
    }

    /// Short customer-facing reference
    pub fn reference_number(&self) -> String {
        self.escalation_id.chars().take(8).collect::<String>().to_uppercase()
    }
}

/// Event delivered to the notifier collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum NotificationEvent {
    #[serde(rename = "escalation.created")]
    EscalationCreated {
        escalation_id: String,
        session_id: String,
        reason: EscalationReason,
        priority: Priority,
        queue_name: String,
    },
    #[serde(rename = "escalation.assigned")]
    EscalationAssigned {
        escalation_id: String,
        agent_id: String,
        /// Last turns handed to the agent
        #[serde(default)]
        context: Vec<TurnRecord>,
    },
    #[serde(rename = "escalation.updated")]
    EscalationUpdated {
        escalation_id: String,
        status: EscalationStatus,
    },
    #[serde(rename = "agent.status_changed")]
    AgentStatusChanged {
        agent_id: String,
        status: crate::agent::AgentStatus,
    },
}

impl NotificationEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            NotificationEvent::EscalationCreated { .. } => "escalation.created",
            NotificationEvent::EscalationAssigned { .. } => "escalation.assigned",
            NotificationEvent::EscalationUpdated { .. } => "escalation.updated",
            NotificationEvent::AgentStatusChanged { .. } => "agent.status_changed",
        }
    }
}

//! Escalation engine and agent registry
//!
//! Features:
//! - Auto-escalation trigger rules evaluated on every turn
//! - Priority computation with VIP and history modifiers
//! - Queue selection and wait-time estimation
//! - Skill-based agent selection over a concurrent registry
//! - Best-effort notification delivery through a bounded worker pool

pub mod engine;
pub mod message;
pub mod notifier;
pub mod priority;
pub mod registry;
pub mod routing;
pub mod selection;
pub mod triggers;
pub mod wait;

pub use engine::{EscalationDraft, EscalationEngine, EscalationTicket, EscalationView, TimeoutAction};
pub use message::customer_message;
pub use notifier::{DeadLetter, LoggingNotifier, NotificationDispatcher, WebhookNotifier};
pub use priority::{adjust_priority, base_priority};
pub use registry::AgentRegistry;
pub use routing::select_queue;
pub use selection::{score_agent, select_agent, SelectionCriteria};
pub use triggers::{TriggerDecision, TriggerEvaluator, TriggerInput};
pub use wait::estimate_wait;

use thiserror::Error;

/// Escalation errors
#[derive(Error, Debug)]
pub enum EscalationError {
    #[error("Escalation not found: {0}")]
    NotFound(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Agent {0} cannot take another contact")]
    AgentUnavailable(String),

    #[error("Escalation {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
    },

    #[error("Agent {agent_id} load {load} would leave [0, {capacity}]")]
    LoadOutOfRange {
        agent_id: String,
        load: i64,
        capacity: u32,
    },

    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

impl From<EscalationError> for contact_center_core::Error {
    fn from(err: EscalationError) -> Self {
        use contact_center_core::Error;
        match err {
            EscalationError::NotFound(id) | EscalationError::AgentNotFound(id) => {
                Error::NotFound(id)
            },
            EscalationError::InvalidTransition { from, to, .. } => {
                Error::InvalidTransition { from, to }
            },
            EscalationError::AgentUnavailable(_) | EscalationError::LoadOutOfRange { .. } => {
                Error::InvalidState(err.to_string())
            },
            EscalationError::Delivery(msg) => Error::Internal(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, EscalationError>;

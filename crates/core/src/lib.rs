//! Core traits and types for the contact-center orchestrator
//!
//! This crate provides foundational types used across all other crates:
//! - Session, turn and flow data model
//! - FAQ, escalation and agent records
//! - Collaborator traits (NLU, stores, notifier)
//! - The shared error taxonomy

pub mod agent;
pub mod error;
pub mod escalation;
pub mod faq;
pub mod flow;
pub mod nlu;
pub mod reply;
pub mod session;
pub mod traits;

pub use agent::{Agent, AgentStatus, QueueSnapshot};
pub use error::{Error, ErrorCategory, Result};
pub use escalation::{
    CustomerData, EscalationReason, EscalationRequest, EscalationStatus, NotificationEvent,
    Priority,
};
pub use faq::{FaqItem, ScoredFaq};
pub use flow::{FlowDefinition, InputType, Outcome, Step, StepPrompt, Target, ValidationRules};
pub use nlu::{Intent, NluResult, Sentiment, SentimentLabel, SentimentScores};
pub use reply::{BotReply, ErrorReply, NextAction, TurnRequest, TurnResponse};
pub use session::{
    Channel, ConversationStage, CustomerMood, Session, SessionStatus, TurnRecord, TurnSource,
};

pub use traits::{
    FaqStore, NluContext, NluProvider, Notifier, SentimentAnalyzer, SessionFilter, SessionStore,
};

//! Conversation orchestration
//!
//! Features:
//! - Declarative scenario interpreter with typed step validation
//! - Built-in `product_inquiry` and `reservation` flows, YAML flow files
//!   with atomic hot reload
//! - Turn orchestrator: session resolution, NLU, escalation pre-check,
//!   confidence gate and intent dispatch
//! - Mood and stage tracking in the session context

pub mod dialog;
pub mod orchestrator;
pub mod scenario;

pub use dialog::{derive_mood, derive_stage, is_continuation};
pub use orchestrator::{Collaborators, Orchestrator};
pub use scenario::{
    builtin_flows, FlowCatalog, FlowLoader, FlowStatus, ScenarioInterpreter,
};

use thiserror::Error;

/// Scenario errors
#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("Unknown flow: {0}")]
    UnknownFlow(String),

    #[error("Unknown step {step} in flow {flow}")]
    UnknownStep { flow: String, step: String },

    #[error("Session {0} has no active flow")]
    NoActiveFlow(String),

    #[error("Invalid flow definition: {0}")]
    InvalidDefinition(String),

    #[error("Flow load error: {0}")]
    Load(String),

    #[error(transparent)]
    Core(#[from] contact_center_core::Error),
}

impl From<ScenarioError> for contact_center_core::Error {
    fn from(err: ScenarioError) -> Self {
        use contact_center_core::Error;
        match err {
            ScenarioError::UnknownFlow(id) => Error::NotFound(format!("flow {id}")),
            ScenarioError::NoActiveFlow(id) => {
                Error::InvalidState(format!("session {id} has no active flow"))
            },
            ScenarioError::Core(e) => e,
            other => Error::Internal(other.to_string()),
        }
    }
}

impl From<contact_center_config::ConfigError> for ScenarioError {
    fn from(err: contact_center_config::ConfigError) -> Self {
        ScenarioError::Load(err.to_string())
    }
}

//! NLU provider adapter
//!
//! Features:
//! - Slot-based backend (Lex-style `recognize_text` over HTTP)
//! - Generative backend (chat completion constrained to a JSON schema)
//! - Offline keyword backend for development
//! - Regex entity enrichment and a lexicon sentiment analyzer
//!
//! Every backend sits behind [`NluAdapter`], which adds the request
//! timeout, retry with exponential backoff and the mapping onto the core
//! `NluUnavailable` error.

pub mod adapter;
pub mod backend;
pub mod entities;
pub mod factory;
pub mod generative;
pub mod keyword;
pub mod prompt;
pub mod sentiment;
pub mod slot;

pub use adapter::NluAdapter;
pub use backend::NluBackend;
pub use entities::EntityExtractor;
pub use factory::NluFactory;
pub use generative::{GenerativeBackend, GenerativeConfig};
pub use keyword::KeywordBackend;
pub use prompt::{IntentDefinition, PromptBuilder};
pub use sentiment::LexiconSentimentAnalyzer;
pub use slot::{SlotBackend, SlotConfig};

use thiserror::Error;

/// NLU errors
#[derive(Error, Debug)]
pub enum NluError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl NluError {
    /// Transient failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, NluError::Network(_) | NluError::Timeout)
    }
}

impl From<reqwest::Error> for NluError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NluError::Timeout
        } else {
            NluError::Network(err.to_string())
        }
    }
}

impl From<NluError> for contact_center_core::Error {
    fn from(err: NluError) -> Self {
        contact_center_core::Error::NluUnavailable(err.to_string())
    }
}

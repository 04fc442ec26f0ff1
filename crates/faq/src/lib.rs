//! FAQ retrieval
//!
//! Features:
//! - In-memory FAQ table implementing the core `FaqStore` trait
//! - YAML/JSON FAQ file loader and the built-in default entries
//! - Particle-tolerant token-overlap retriever with priority boost and deterministic ordering

pub mod defaults;
pub mod loader;
pub mod retriever;
pub mod store;

pub use defaults::default_faqs;
pub use loader::{FaqEntry, FaqFile, FaqLoader};
pub use retriever::{FaqRetriever, FaqSearchResult};
pub use store::InMemoryFaqStore;

use thiserror::Error;

/// FAQ errors
#[derive(Error, Debug)]
pub enum FaqError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Load error: {0}")]
    Load(String),

    #[error("FAQ lookup timed out")]
    Timeout,
}

impl From<FaqError> for contact_center_core::Error {
    fn from(err: FaqError) -> Self {
        match err {
            FaqError::Load(msg) => contact_center_core::Error::InvalidInput(msg),
            other => contact_center_core::Error::FaqUnavailable(other.to_string()),
        }
    }
}

impl From<contact_center_config::ConfigError> for FaqError {
    fn from(err: contact_center_config::ConfigError) -> Self {
        FaqError::Load(err.to_string())
    }
}

//! Persistence errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session {session_id} already exists")]
    AlreadyExists { session_id: String },

    #[error("Version conflict on {session_id}: expected {expected}, stored {actual}")]
    VersionConflict {
        session_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("Store error: {0}")]
    Store(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<PersistenceError> for contact_center_core::Error {
    fn from(err: PersistenceError) -> Self {
        use contact_center_core::Error;
        match err {
            PersistenceError::NotFound(id) => Error::SessionNotFound(id),
            PersistenceError::AlreadyExists { session_id } => Error::Conflict(session_id),
            PersistenceError::VersionConflict { session_id, .. } => Error::Conflict(session_id),
            other => Error::StoreUnavailable(other.to_string()),
        }
    }
}

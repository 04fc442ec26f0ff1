//! Error taxonomy shared by every crate
//!
//! Only the user-visible variants ever reach the transport as structured
//! errors. Degraded and internal failures are converted into fallback
//! replies at the orchestrator boundary.

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Conflicting update on session {0}")]
    Conflict(String),

    #[error("Session {0} is busy with another turn")]
    SessionBusy(String),

    #[error("NLU unavailable: {0}")]
    NluUnavailable(String),

    #[error("FAQ unavailable: {0}")]
    FaqUnavailable(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Scenario forced escalation: {0}")]
    ScenarioForcedEscalation(String),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result alias using the core error
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse grouping used to pick fallback texts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    UserVisible,
    Degraded,
    Internal,
}

impl Error {
    /// Stable machine-readable code for error responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "invalid_input",
            Error::SessionNotFound(_) => "session_not_found",
            Error::Conflict(_) => "conflict",
            Error::SessionBusy(_) => "session_busy",
            Error::NluUnavailable(_) => "nlu_unavailable",
            Error::FaqUnavailable(_) => "faq_unavailable",
            Error::StoreUnavailable(_) => "store_unavailable",
            Error::ScenarioForcedEscalation(_) => "scenario_forced_escalation",
            Error::InvalidTransition { .. } => "invalid_transition",
            Error::InvalidState(_) => "invalid_state",
            Error::NotFound(_) => "not_found",
            Error::Internal(_) => "internal_error",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidInput(_)
            | Error::SessionNotFound(_)
            | Error::Conflict(_)
            | Error::SessionBusy(_) => ErrorCategory::UserVisible,
            Error::NluUnavailable(_) | Error::FaqUnavailable(_) | Error::StoreUnavailable(_) => {
                ErrorCategory::Degraded
            },
            _ => ErrorCategory::Internal,
        }
    }

    /// Whether the error may be surfaced to the caller as a structured error
    pub fn is_user_visible(&self) -> bool {
        self.category() == ErrorCategory::UserVisible
    }

    /// Guidance text safe to show to a customer
    pub fn user_message(&self) -> String {
        match self {
            Error::InvalidInput(msg) => msg.clone(),
            Error::SessionNotFound(_) => {
                "대화 세션을 찾을 수 없습니다. 새 대화를 시작해주세요.".to_string()
            },
            Error::Conflict(_) => {
                "요청이 동시에 처리되어 충돌했습니다. 잠시 후 다시 시도해주세요.".to_string()
            },
            Error::SessionBusy(_) => {
                "이전 메시지를 처리 중입니다. 응답을 받은 후 다시 보내주세요.".to_string()
            },
            _ => "일시적인 오류가 발생했습니다. 잠시 후 다시 시도해주세요.".to_string(),
        }
    }
}

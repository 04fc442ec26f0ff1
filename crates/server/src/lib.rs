//! Contact-center server
//!
//! HTTP surface over the orchestrator: turn handling, session control,
//! escalation and agent management, FAQ lookup, health and metrics.

pub mod http;
pub mod metrics;
pub mod state;

pub use http::create_router;
pub use metrics::{init_metrics, metrics_handler};
pub use state::AppState;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use contact_center_core::{Error as CoreError, ErrorReply};

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Startup error: {0}")]
    Startup(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Startup(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Core(e) => core_status(e),
        }
    }
}

/// HTTP status for a core error code
pub fn core_status(err: &CoreError) -> StatusCode {
    match err {
        CoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        CoreError::SessionNotFound(_) | CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Conflict(_) | CoreError::SessionBusy(_) => StatusCode::CONFLICT,
        CoreError::InvalidTransition { .. } | CoreError::InvalidState(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        },
        CoreError::NluUnavailable(_)
        | CoreError::FaqUnavailable(_)
        | CoreError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ServerError> for StatusCode {
    fn from(err: ServerError) -> Self {
        err.status_code()
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            ServerError::Core(e) => {
                if status.is_server_error() {
                    tracing::error!(error = %e, "Request failed");
                }
                ErrorReply::from(e)
            },
            ServerError::InvalidRequest(msg) => ErrorReply {
                error_code: "invalid_input".to_string(),
                message: msg.clone(),
            },
            ServerError::NotFound(msg) => ErrorReply {
                error_code: "not_found".to_string(),
                message: msg.clone(),
            },
            ServerError::Startup(_) => ErrorReply {
                error_code: "internal_error".to_string(),
                message: "일시적인 오류가 발생했습니다. 잠시 후 다시 시도해주세요.".to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<contact_center_escalation::EscalationError> for ServerError {
    fn from(err: contact_center_escalation::EscalationError) -> Self {
        ServerError::Core(err.into())
    }
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::replay::Unresolved;

/// Failures of the recording/replay engine
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Instrumentation could not be installed after {attempts} attempts: {message}")]
    InjectionFailure { attempts: u32, message: String },

    #[error("{0}")]
    ElementNotFound(Box<Unresolved>),

    #[error("Page did not reach readyState=complete within {waited_ms}ms")]
    PageNotReady { waited_ms: u64 },

    #[error("Action #{sequence_index} timed out after {timeout_ms}ms")]
    ActionTimeout { sequence_index: u64, timeout_ms: u64 },

    #[error("Cannot {command} while {state}")]
    InvalidTransition { state: String, command: String },

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Invalid action list: {0}")]
    InvalidScript(String),

    #[error("Session is closed")]
    SessionClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Browser error: {0}")]
    Browser(#[from] anyhow::Error),
}

impl RecorderError {
    pub fn not_found(unresolved: Unresolved) -> Self {
        RecorderError::ElementNotFound(Box::new(unresolved))
    }
}

/// Errors returned by the HTTP surface
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid request: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Recorder(#[from] RecorderError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "Not Found"),
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "Bad Request"),
            AppError::Recorder(e) => match e {
                RecorderError::ElementNotFound(_) => (StatusCode::NOT_FOUND, "Element Not Found"),
                RecorderError::InvalidTransition { .. } => (StatusCode::CONFLICT, "Invalid Transition"),
                RecorderError::InvalidAction(_) | RecorderError::InvalidScript(_) => {
                    (StatusCode::BAD_REQUEST, "Bad Request")
                }
                RecorderError::SessionClosed => (StatusCode::GONE, "Session Closed"),
                RecorderError::PageNotReady { .. } | RecorderError::ActionTimeout { .. } => {
                    (StatusCode::GATEWAY_TIMEOUT, "Timeout")
                }
                RecorderError::InjectionFailure { .. } | RecorderError::Browser(_) => {
                    (StatusCode::BAD_GATEWAY, "Browser Error")
                }
                RecorderError::Io(_) | RecorderError::Yaml(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "Storage Error")
                }
            },
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Error"),
        };

        let body = Json(ErrorResponse {
            error: error_message.to_string(),
            detail: self.to_string(),
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TargetDescriptor;

    #[test]
    fn test_status_mapping() {
        let not_found = AppError::from(RecorderError::not_found(Unresolved {
            target: TargetDescriptor::text("Entrar"),
            considered: vec![],
        }));
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let conflict = AppError::from(RecorderError::InvalidTransition {
            state: "stopped".into(),
            command: "resume".into(),
        });
        assert_eq!(conflict.into_response().status(), StatusCode::CONFLICT);

        let missing = AppError::SessionNotFound("abc".into());
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_transition_message() {
        let err = RecorderError::InvalidTransition {
            state: "idle".into(),
            command: "pause".into(),
        };
        assert_eq!(err.to_string(), "Cannot pause while idle");
    }
}

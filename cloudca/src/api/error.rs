use thiserror::Error;

use super::response::ResponseError;
use super::task::TaskStatus;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API returned error (HTTP {status}): {}", summarize(.errors))]
    Remote {
        status: u16,
        errors: Vec<ResponseError>,
    },

    #[error("Entity not found: {}", summarize(.errors))]
    NotFound { errors: Vec<ResponseError> },

    #[error("API returned HTTP {status} without error details: {body}")]
    ProtocolViolation { status: u16, body: String },

    #[error("Task {task_id} failed (status={status}, created={})", .created.as_deref().unwrap_or("unknown"))]
    TaskFailed {
        task_id: String,
        status: TaskStatus,
        created: Option<String>,
    },

    #[error("Task {task_id} did not complete after {attempts} polls")]
    TaskTimeout { task_id: String, attempts: u32 },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation deadline exceeded")]
    DeadlineExceeded,

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl ApiError {
    /// True when the remote object does not exist. Resource handlers use this
    /// to drop local state instead of failing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    /// HTTP status carried by remote classifications.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Remote { status, .. } | ApiError::ProtocolViolation { status, .. } => {
                Some(*status)
            }
            ApiError::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// Structured errors returned by the backend, empty for local failures.
    pub fn errors(&self) -> &[ResponseError] {
        match self {
            ApiError::Remote { errors, .. } | ApiError::NotFound { errors } => errors,
            _ => &[],
        }
    }
}

fn summarize(errors: &[ResponseError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.error_code, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

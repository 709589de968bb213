//! Errors returned by remote platform calls.

use std::time::Duration;

use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request url: {0}")]
    InvalidUrl(String),

    #[error("{operation}: transport error: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    #[error("{operation}: no response within {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("{operation}: unexpected status {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("{operation}: failed to encode request: {message}")]
    Encode {
        operation: &'static str,
        message: String,
    },

    #[error("{operation}: failed to decode response: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },

    /// The envelope reported `result = false`.
    #[error("{operation}: rejected by platform (code {code}): {message}")]
    Rejected {
        operation: &'static str,
        code: String,
        message: String,
    },

    #[error("{operation}: response is missing {field}")]
    MissingField {
        operation: &'static str,
        field: &'static str,
    },
}

impl ApiError {
    /// Name of the remote operation that failed, when known.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            ApiError::InvalidUrl(_) => None,
            ApiError::Transport { operation, .. }
            | ApiError::Timeout { operation, .. }
            | ApiError::Status { operation, .. }
            | ApiError::Encode { operation, .. }
            | ApiError::Decode { operation, .. }
            | ApiError::Rejected { operation, .. }
            | ApiError::MissingField { operation, .. } => Some(operation),
        }
    }
}

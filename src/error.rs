// SPDX-License-Identifier: PMPL-1.0-or-later
//! Error types for upload submissions

use crate::config::ConfigError;
use crate::store::StoreError;
use crate::validator::ValidationError;
use axum::http::StatusCode;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Reasons a submission was not accepted.
///
/// `Display` is the exact text returned to the client.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Error: Invalid key is specified.")]
    InvalidKey,

    #[error("Error: Upload interval is too short. Try later.")]
    RateLimited { retry_after: Duration },

    #[error("Error: Too big data.")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Error: Too long file name.")]
    NameTooLong { len: usize, max: usize },

    #[error("Error: Invalid file name.")]
    InvalidName(String),

    #[error("Error: The file name is not allowed.")]
    NameNotAllowed(String),

    #[error("Error: Invalid file name.")]
    PathEscape(String),

    #[error("Error: Internal server error.")]
    Io(#[source] io::Error),

    #[error("Error: Internal server error.")]
    StatePersist(#[source] io::Error),
}

impl SubmissionError {
    /// HTTP status for this rejection.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidKey | Self::NameNotAllowed(_) => StatusCode::FORBIDDEN,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NameTooLong { .. } | Self::InvalidName(_) | Self::PathEscape(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Io(_) | Self::StatePersist(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable label for logs and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidKey => "invalid_key",
            Self::RateLimited { .. } => "rate_limited",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::NameTooLong { .. } => "name_too_long",
            Self::InvalidName(_) => "invalid_name",
            Self::NameNotAllowed(_) => "name_not_allowed",
            Self::PathEscape(_) => "path_escape",
            Self::Io(_) => "io_error",
            Self::StatePersist(_) => "state_persist_error",
        }
    }

    /// Whether the rejection is the client's doing rather than ours.
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}

impl From<ValidationError> for SubmissionError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidKey => Self::InvalidKey,
            ValidationError::PayloadTooLarge { size, max } => Self::PayloadTooLarge { size, max },
            ValidationError::NameTooLong { len, max } => Self::NameTooLong { len, max },
            ValidationError::InvalidName(name) => Self::InvalidName(name),
            ValidationError::NameNotAllowed(name) => Self::NameNotAllowed(name),
        }
    }
}

impl From<StoreError> for SubmissionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PathEscape(name) => Self::PathEscape(name),
            StoreError::Io(e) => Self::Io(e),
        }
    }
}

/// Failure to assemble the service from its configuration.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage root unavailable: {0}")]
    Storage(#[from] StoreError),

    #[error("Metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),
}

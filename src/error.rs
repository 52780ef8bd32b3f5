//! Error types for any-exporter
//!
//! Recipe errors are scoped to the single registration call that produced
//! them. All application errors implement `IntoResponse` for Axum handlers.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Failure to compile a value-sequence string
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequenceError {
    #[error("sequence is empty")]
    Empty,

    #[error("empty token at position {position} (tokens are separated by exactly one space)")]
    EmptyToken { position: usize },

    #[error("invalid token {token:?}: {reason}")]
    InvalidToken { token: String, reason: &'static str },

    #[error("invalid number {literal:?}")]
    InvalidNumber { literal: String },

    #[error("invalid repeat count {literal:?} (must be a non-negative integer)")]
    InvalidRepeatCount { literal: String },

    #[error("sequence expands to more than {limit} values")]
    TooLong { limit: usize },

    #[error("token {token:?} produces a non-finite value")]
    NonFinite { token: String },
}

/// Failure to register a recipe batch
///
/// `index` is the position of the offending document in the submitted
/// stream, `row` the position of the offending data row inside it.
#[derive(Error, Debug)]
pub enum RecipeError {
    #[error("invalid recipe document: {0}")]
    Parse(String),

    #[error("recipe #{index} ({name}): data row #{row}: {source}")]
    Format {
        index: usize,
        name: String,
        row: usize,
        #[source]
        source: SequenceError,
    },

    #[error("recipe #{index} ({name}): {reason}")]
    Validation {
        index: usize,
        name: String,
        reason: String,
    },

    #[error("recipe #{index}: metric {name:?} is already registered")]
    Conflict { index: usize, name: String },
}

impl RecipeError {
    /// HTTP status reported to the client submitting the recipe
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Parse(_) | Self::Format { .. } | Self::Validation { .. } => {
                StatusCode::BAD_REQUEST
            }
        }
    }

    /// Index of the offending recipe document, if the error names one
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Parse(_) => None,
            Self::Format { index, .. }
            | Self::Validation { index, .. }
            | Self::Conflict { index, .. } => Some(*index),
        }
    }
}

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read config file {path}: {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config file {path}: {reason}")]
    ConfigValidationFailed { path: String, reason: String },

    #[error(transparent)]
    Recipe(#[from] RecipeError),

    #[error("Metrics encoding failed: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Recipe(e) => e.status(),
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Config(_)
            | Self::ConfigFileRead { .. }
            | Self::ConfigParseFailed { .. }
            | Self::ConfigValidationFailed { .. }
            | Self::Metrics(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(serde_json::json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;

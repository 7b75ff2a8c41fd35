//! Error types for the review-queue engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification of every failure the engine can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input to an action (e.g. empty answer text)
    Validation,
    /// Access policy denied the reviewer
    Authorization,
    /// Transition attempted on an already-terminal record
    Conflict,
    /// Network or timeout failure that may succeed on retry
    TransientNetwork,
    /// Non-retryable failure reported by the collaborator store
    TerminalNetwork,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Authorization => "authorization",
            ErrorKind::Conflict => "conflict",
            ErrorKind::TransientNetwork => "transient_network",
            ErrorKind::TerminalNetwork => "terminal_network",
        }
    }
}

/// Errors returned by the engine's public operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Reviewer unauthorized: {0}")]
    Authorization(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    #[error("Store rejected request: {0}")]
    TerminalNetwork(String),
}

impl QueueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueueError::Validation(_) => ErrorKind::Validation,
            QueueError::Authorization(_) => ErrorKind::Authorization,
            QueueError::Conflict(_) => ErrorKind::Conflict,
            QueueError::TransientNetwork(_) => ErrorKind::TransientNetwork,
            QueueError::TerminalNetwork(_) => ErrorKind::TerminalNetwork,
        }
    }

    /// Only transient network failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, QueueError::TransientNetwork(_))
    }
}

/// Errors reported by a collaborator store implementation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Transient(String),

    #[error("store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("unreadable store response: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

impl From<StoreError> for QueueError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Transient(msg) => QueueError::TransientNetwork(msg),
            other => QueueError::TerminalNetwork(other.to_string()),
        }
    }
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Configuration validation failed:\n{0}")]
    Invalid(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

/// Top-level error for the command-line surface
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("Refresh failed ({}): {message}", kind.label())]
    Refresh { kind: ErrorKind, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config rendering error: {0}")]
    ConfigRender(#[from] toml::ser::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Usage(String),
}

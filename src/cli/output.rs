//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::{AppError, ConfigError, QueueError};

/// Map an application error to the message printed on stderr.
pub fn map_error(e: &AppError) -> String {
    match e {
        AppError::Queue(err @ QueueError::Authorization(_)) => {
            format!("{} (check --reviewer-id, --role and --scope)", err)
        }
        AppError::Queue(err) => format!("[{}] {}", err.kind().label(), err),
        AppError::Config(ConfigError::Invalid(msg)) => format!("Invalid configuration:\n{}", msg),
        other => other.to_string(),
    }
}

/// Process exit code for an error
pub fn exit_code(e: &AppError) -> i32 {
    match e {
        AppError::Usage(_) | AppError::Config(_) => 2,
        _ => 1,
    }
}

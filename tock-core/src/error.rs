//! Unified error types for tock-core.

use thiserror::Error;

use crate::time::TimeError;

/// Result type alias using TockError.
pub type Result<T> = std::result::Result<T, TockError>;

/// Instructions shown when a command needs a timezone the user never reported.
pub const MISSING_TIMEZONE_HELP: &str = "Please report your timezone first! Report one of the \
following: the current time in your area `timezone 4:20PM`; the offset `timezone UTC+5`; the \
region name `timezone US/Eastern`.";

#[derive(Error, Debug)]
pub enum TockError {
    /// The user has to report a timezone before this command can run.
    #[error("{}", MISSING_TIMEZONE_HELP)]
    MissingTimezone,

    #[error("time invariant violated: {0}")]
    Time(#[from] TimeError),

    /// A handler was bound to arguments its grammar cannot produce.
    #[error("argument shape mismatch: {0}")]
    ArgumentShape(String),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TockError {
    /// Errors the user can fix by sending a different message.
    pub fn is_user_correctable(&self) -> bool {
        matches!(self, TockError::MissingTimezone)
    }
}

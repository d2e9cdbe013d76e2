//! Error types for the terminal harness.

use std::time::Duration;

use kizuna_session::domain::{BackendError, SessionError, ValueObjectError};
use thiserror::Error;

/// Client-specific errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// A command-line value failed validation
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] ValueObjectError),

    /// Input line that is not a known command
    #[error("unknown command '{0}' (try /help)")]
    UnknownCommand(String),

    /// The HTTP backend client could not be built
    #[error("backend setup failed: {0}")]
    Backend(#[from] BackendError),

    /// The join did not settle in time
    #[error("join did not complete within {0:?}")]
    JoinTimeout(Duration),

    #[error(transparent)]
    Session(#[from] SessionError),
}

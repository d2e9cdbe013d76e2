//! Domain logic for client-side operations.
//!
//! Pure functions (command parsing, user-facing failure messages) kept free
//! of I/O so they are easy to test.

use kizuna_session::domain::{FailureCategory, SessionError};

use crate::error::ClientError;

/// A line typed at the prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Mic(bool),
    Cam(bool),
    Who,
    Link,
    Leave,
    Help,
}

/// Parse one input line.
///
/// `/mic` and `/cam` take `on` or `off`; everything else takes no argument.
pub fn parse_command(line: &str) -> Result<Command, ClientError> {
    let mut words = line.split_whitespace();
    let name = words.next().unwrap_or_default();
    let arg = words.next();
    let unknown = || ClientError::UnknownCommand(line.trim().to_string());
    if words.next().is_some() {
        return Err(unknown());
    }

    let switch = |arg: Option<&str>| match arg {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        _ => Err(unknown()),
    };

    match (name, arg) {
        ("/mic", arg) => switch(arg).map(Command::Mic),
        ("/cam", arg) => switch(arg).map(Command::Cam),
        ("/who", None) => Ok(Command::Who),
        ("/link", None) => Ok(Command::Link),
        ("/leave" | "/quit", None) => Ok(Command::Leave),
        ("/help", None) => Ok(Command::Help),
        _ => Err(unknown()),
    }
}

/// What to tell the user when joining failed
pub fn user_message_for(error: &SessionError) -> &'static str {
    match error.category() {
        FailureCategory::Configuration => {
            "This session link is invalid or has expired. Ask for a new link."
        }
        FailureCategory::Transient => "Network problem. Check your connection and try again.",
        FailureCategory::Permission => {
            "Camera or microphone access was denied. Allow access in your settings and rejoin."
        }
        FailureCategory::Device => "No working camera or microphone was found.",
        FailureCategory::Conflict => "You are already in a session.",
        FailureCategory::Cancelled => "Joining was cancelled.",
    }
}

/// Process exit code for a failed join
pub fn exit_code_for(error: &ClientError) -> i32 {
    match error {
        ClientError::InvalidArgument(_) | ClientError::UnknownCommand(_) => 2,
        ClientError::Session(e) if e.category() == FailureCategory::Configuration => 3,
        ClientError::Session(_) | ClientError::Backend(_) | ClientError::JoinTimeout(_) => 1,
    }
}

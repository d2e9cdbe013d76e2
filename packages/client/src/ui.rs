//! UI utilities for the client.

use std::io::Write;

/// Prompt shown by the line editor
pub fn prompt(channel: &str) -> String {
    format!("{}> ", channel)
}

/// Redisplay the prompt after printing an event
pub fn redisplay_prompt(channel: &str) {
    print!("{}", prompt(channel));
    std::io::stdout().flush().ok();
}

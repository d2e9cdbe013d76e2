//! Interactive session loop.

use std::{sync::Arc, time::Duration};

use kizuna_session::{
    ConnectionManager, LeaveOutcome, SessionEvent, usecase::ToggleOutcome,
};
use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::{broadcast::error::RecvError, mpsc};

use super::{
    domain::{Command, parse_command},
    formatter::SessionFormatter,
    ui::{prompt, redisplay_prompt},
};

const HELP: &str = "/mic on|off  /cam on|off  /who  /link  /leave";

/// Read lines on a blocking thread (rustyline is synchronous).
///
/// The returned channel closes on Ctrl+C, Ctrl+D or end of input.
fn spawn_line_reader(channel: String) -> mpsc::UnboundedReceiver<String> {
    let (input_tx, input_rx) = mpsc::unbounded_channel::<String>();
    std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                tracing::error!("Failed to initialize readline: {}", e);
                return;
            }
        };
        let prompt = prompt(&channel);
        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    rl.add_history_entry(line).ok();
                    if input_tx.send(line.to_string()).is_err() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::debug!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });
    input_rx
}

fn toggle_feedback(what: &str, enabled: bool, outcome: ToggleOutcome) -> String {
    match outcome {
        ToggleOutcome::Applied => format!("{} {}", what, if enabled { "on" } else { "off" }),
        ToggleOutcome::NoEffect => format!("{} is not available", what),
    }
}

/// Apply one command; returns `true` when the user asked to leave
fn handle_command(manager: &ConnectionManager, command: Command) -> bool {
    match command {
        Command::Mic(enabled) => {
            let outcome = manager.set_audio_enabled(enabled);
            println!("{}", toggle_feedback("Microphone", enabled, outcome));
        }
        Command::Cam(enabled) => {
            let outcome = manager.set_video_enabled(enabled);
            println!("{}", toggle_feedback("Camera", enabled, outcome));
        }
        Command::Who => print!("{}", SessionFormatter::format_participants(&manager.snapshot())),
        Command::Link => match manager.join_link() {
            Some(link) => println!("{}", link),
            None => println!("Not connected"),
        },
        Command::Help => println!("{}", HELP),
        Command::Leave => return true,
    }
    false
}

/// Run until the user leaves, the duration elapses, or the provider drops.
///
/// With a `duration`, closing stdin does not end the session; without one,
/// it does.
pub async fn run_session(
    manager: Arc<ConnectionManager>,
    channel: String,
    duration: Option<Duration>,
) -> LeaveOutcome {
    let mut events = manager.subscribe();
    let mut input_rx = spawn_line_reader(channel.clone());
    let mut input_open = true;

    let deadline = async {
        match duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            line = input_rx.recv(), if input_open => match line {
                Some(line) => match parse_command(&line) {
                    Ok(command) => {
                        if handle_command(&manager, command) {
                            break;
                        }
                    }
                    Err(e) => println!("{}", e),
                },
                None => {
                    input_open = false;
                    if duration.is_none() {
                        break;
                    }
                }
            },
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(text) = SessionFormatter::format_event(&event) {
                        print!("{}", text);
                        redisplay_prompt(&channel);
                    }
                    if event == SessionEvent::ProviderDisconnected {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Skipped {} session event(s)", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            _ = &mut deadline => {
                tracing::info!("Session duration elapsed, leaving");
                break;
            }
        }
    }

    manager.leave().await
}

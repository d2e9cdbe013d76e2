//! Terminal harness for kizuna sessions.
//!
//! Joins a channel through the session core, prints lifecycle events and
//! accepts `/mic on|off`, `/cam on|off`, `/who`, `/link` and `/leave`.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin kizuna-client -- --user-id abc123 --group
//! cargo run --bin kizuna-client -- --channel booking-42 --booking-session-id bk-42
//! cargo run --bin kizuna-client -- --offline --duration-secs 5
//! ```

use std::time::Duration;

use clap::{Parser, ValueEnum};

use kizuna_client::{ClientOptions, domain::exit_code_for, run_client};
use kizuna_session::domain::Role;
use kizuna_shared::logger::setup_logger;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoleArg {
    Publisher,
    Subscriber,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Publisher => Role::Publisher,
            RoleArg::Subscriber => Role::Subscriber,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "kizuna-client")]
#[command(about = "Join a kizuna video session from the terminal", long_about = None)]
struct Args {
    /// Backend base URL (createRoom / createToken)
    #[arg(short = 'b', long, default_value = "http://127.0.0.1:8080")]
    backend_url: String,

    /// Signaling relay URL
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:8080/ws")]
    signaling_url: String,

    /// Channel to join; generated from the user id when omitted
    #[arg(short = 'c', long)]
    channel: Option<String>,

    /// Identifier of the local user
    #[arg(short = 'u', long, default_value = "guest")]
    user_id: String,

    /// Group session (shared, idempotently provisioned channel)
    #[arg(short = 'g', long)]
    group: bool,

    /// Link the session to a booking for post-session completion
    #[arg(long)]
    booking_session_id: Option<String>,

    /// Token scope
    #[arg(long, value_enum, default_value_t = RoleArg::Publisher)]
    role: RoleArg,

    /// Origin of the printed invite link
    #[arg(long, default_value = "http://localhost:3000")]
    origin: String,

    /// Leave automatically after this many seconds
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Give up joining after this many seconds
    #[arg(long, default_value = "15")]
    join_timeout_secs: u64,

    /// Run without a backend using in-process fakes
    #[arg(long)]
    offline: bool,

    /// Simulate a machine without a camera
    #[arg(long)]
    no_camera: bool,
}

#[tokio::main]
async fn main() {
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();
    let options = ClientOptions {
        backend_url: args.backend_url,
        signaling_url: args.signaling_url,
        channel: args.channel,
        user_id: args.user_id,
        group: args.group,
        booking_session_id: args.booking_session_id,
        role: args.role.into(),
        join_link_origin: args.origin,
        duration: args.duration_secs.map(Duration::from_secs),
        join_timeout: Duration::from_secs(args.join_timeout_secs),
        offline: args.offline,
        no_camera: args.no_camera,
    };

    if let Err(e) = run_client(options).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(exit_code_for(&e));
    }
}

//! kizuna development backend.
//!
//! Serves `createRoom` / `createToken` and the signaling relay used by the
//! session core's WebSocket provider.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin kizuna-server
//! cargo run --bin kizuna-server -- -H 0.0.0.0 -p 8080 --allow-anonymous
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;

use kizuna_server::{Server, ServerConfig, config::DEFAULT_APP_ID};
use kizuna_shared::{logger::setup_logger, time::SystemClock};

#[derive(Parser, Debug)]
#[command(name = "kizuna-server")]
#[command(about = "Development backend and signaling relay for kizuna", long_about = None)]
struct Args {
    /// Host address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to listen on
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// App id returned by createRoom and required on signaling joins
    #[arg(long, default_value = DEFAULT_APP_ID)]
    app_id: String,

    /// Lifetime of issued tokens in seconds
    #[arg(long, default_value = "3600")]
    token_ttl_secs: u64,

    /// Accept signaling joins without a token
    #[arg(long)]
    allow_anonymous: bool,

    /// Maximum number of members per channel
    #[arg(long, default_value = "16")]
    channel_capacity: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();

    let config = ServerConfig::default()
        .with_app_id(args.app_id)
        .with_token_ttl(Duration::from_secs(args.token_ttl_secs))
        .with_allow_anonymous(args.allow_anonymous)
        .with_channel_capacity(args.channel_capacity);
    tracing::info!("Starting with {:?}", config);

    let server = Server::from_config(&config, Arc::new(SystemClock));
    server.run(args.host, args.port).await
}

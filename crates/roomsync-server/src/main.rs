//! Roomsync server binary.
//!
//! Runs the hub with background maintenance until interrupted. Transports
//! attach to the hub as library users.
//!
//! # Usage
//!
//! ```bash
//! roomsync-server --invite-ttl-secs 60 --max-room-members 8 --seed-user alice
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;
use roomsync_server::{Hub, HubConfig, Maintenance, SystemEnv};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Roomsync chat and clipboard hub
#[derive(Parser, Debug)]
#[command(name = "roomsync-server")]
#[command(about = "Shared rooms for chat and clipboard sync")]
#[command(version)]
struct Args {
    /// Seconds an invite stays acceptable
    #[arg(long, default_value = "30")]
    invite_ttl_secs: u64,

    /// Member cap per room (unbounded when omitted)
    #[arg(long)]
    max_room_members: Option<usize>,

    /// Operations kept per room log
    #[arg(long, default_value = "1000")]
    max_operations: usize,

    /// Chat messages kept in the chat projection
    #[arg(long, default_value = "100")]
    max_chat_messages: usize,

    /// Seconds between heartbeats on live connections
    #[arg(long, default_value = "30")]
    heartbeat_secs: u64,

    /// Seconds between expired-invite sweeps
    #[arg(long, default_value = "10")]
    invite_sweep_secs: u64,

    /// Seconds between empty-room sweeps
    #[arg(long, default_value = "1800")]
    room_sweep_secs: u64,

    /// Outbound event buffer per connection
    #[arg(long, default_value = "64")]
    event_buffer: usize,

    /// Register a user at startup (repeatable)
    #[arg(long = "seed-user")]
    seed_users: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn hub_config(&self) -> HubConfig {
        let mut config = HubConfig::default();
        config.history.max_operations_per_room = self.max_operations;
        config.history.max_chat_messages = self.max_chat_messages;
        config.directory.invite_ttl = Duration::from_secs(self.invite_ttl_secs);
        config.directory.max_room_members = self.max_room_members;
        config.heartbeat_interval = Duration::from_secs(self.heartbeat_secs);
        config.invite_sweep_interval = Duration::from_secs(self.invite_sweep_secs);
        config.room_sweep_interval = Duration::from_secs(self.room_sweep_secs);
        config.event_buffer = self.event_buffer;
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = args.hub_config();
    tracing::info!(?config, "roomsync server starting");

    let hub = Arc::new(Hub::new(SystemEnv::new(), config));

    for name in &args.seed_users {
        let user = hub.register_user(name)?;
        tracing::info!(user = %user.id, name = %user.name, "seeded user");
    }

    let maintenance = Maintenance::start(Arc::clone(&hub));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");

    maintenance.shutdown().await;
    Ok(())
}

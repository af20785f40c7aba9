//! DWC State Coordinator
//!
//! Runs background maintenance over the coordinator database and exposes a
//! few administrative commands.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use dwc_core::config::{Config, load_config};
use dwc_core::friend_code::LegacyCodec;
use dwc_core::liveness::SystemClock;
use dwc_core::tracing_init::init_tracing;

use dwc_coordinator::Coordinator;
use dwc_coordinator::access::{BanRequest, parse_ban_type};
use dwc_coordinator::maintenance;
use dwc_coordinator::storage::StateDatabase;

#[derive(Parser, Debug)]
#[command(name = "dwc-coordinator")]
#[command(version, about = "DWC state coordinator - profiles, sessions, matchmaking and access control")]
struct Args {
    /// Path to a JSON config file layered over the global one.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to SQLite database file.
    #[arg(long, env = "DWC_DATABASE_PATH")]
    db_path: Option<PathBuf>,

    /// Only allow-listed consoles may log in.
    #[arg(long)]
    whitelist_mode: bool,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the maintenance loop until interrupted (default).
    Serve,
    /// Print the live overview as JSON.
    Overview,
    /// Record a statistics snapshot and print it.
    Snapshot,
    /// Add or replace a ban.
    Ban {
        /// One of ip, mac, profile, userid.
        ban_type: String,
        identifier: String,
        #[arg(long, default_value = "")]
        reason: String,
        #[arg(long, default_value = "admin")]
        banned_by: String,
        /// Ban length in seconds; permanent when omitted.
        #[arg(long)]
        duration: Option<i64>,
    },
    /// Lift a ban.
    Unban { ban_type: String, identifier: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    apply_args(&mut config, &args);
    init_tracing(&config.coordinator.log_level, args.log_json)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        whitelist_mode = config.access.whitelist_mode,
        "Starting dwc-coordinator"
    );

    let db_path = match &config.coordinator.database_path {
        Some(path) => path.clone(),
        None => default_db_path()?,
    };
    info!(path = %db_path.display(), "Opening state database");
    let db = StateDatabase::open(&db_path).await?;

    let coordinator = Coordinator::new(
        db,
        Arc::new(SystemClock),
        Arc::new(LegacyCodec),
        config.access.whitelist_mode,
    );

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(coordinator, &config).await?,
        Command::Overview => print_json(&coordinator.stats().overview().await?)?,
        Command::Snapshot => print_json(&coordinator.stats().snapshot().await?)?,
        Command::Ban {
            ban_type,
            identifier,
            reason,
            banned_by,
            duration,
        } => {
            let ban = coordinator
                .access()
                .add_ban(&BanRequest {
                    ban_type: parse_ban_type(&ban_type)?,
                    identifier: &identifier,
                    reason: &reason,
                    banned_by: &banned_by,
                    duration_secs: duration,
                })
                .await?;
            print_json(&ban)?;
        }
        Command::Unban {
            ban_type,
            identifier,
        } => {
            let removed = coordinator
                .access()
                .remove_ban(parse_ban_type(&ban_type)?, &identifier)
                .await?;
            print_json(&serde_json::json!({ "removed": removed }))?;
        }
    }

    Ok(())
}

async fn serve(coordinator: Coordinator, config: &Config) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let handle = maintenance::spawn(coordinator, config.maintenance.clone(), shutdown_rx);
    info!(
        sweep_interval_secs = config.maintenance.sweep_interval_secs,
        snapshot_interval_secs = config.maintenance.snapshot_interval_secs,
        "Maintenance loop started"
    );

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");
    let _ = shutdown_tx.send(true);
    handle.await?;

    info!("Coordinator stopped");
    Ok(())
}

/// CLI flags are the highest-priority config layer.
fn apply_args(config: &mut Config, args: &Args) {
    if let Some(path) = &args.db_path {
        config.coordinator.database_path = Some(path.clone());
    }
    if args.whitelist_mode {
        config.access.whitelist_mode = true;
    }
}

#[allow(clippy::print_stdout)]
fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn default_db_path() -> anyhow::Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(home.join(".dwc").join("coordinator.db"))
}

//! calcboard - calculation history and statistics service
//!
//! Serves the JSON API over HTTP.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/calcboard/data.db (~/.local/share/calcboard/data.db)
//! - Logs: $XDG_STATE_HOME/calcboard/calcboard.log (~/.local/state/calcboard/calcboard.log)
//! - Config: $XDG_CONFIG_HOME/calcboard/config.toml (~/.config/calcboard/config.toml)

use std::path::PathBuf;

use anyhow::{Context, Result};
use calcboard::server::{self, AppState};
use calcboard_core::{Config, Database};
use clap::Parser;

#[derive(Parser)]
#[command(name = "calcboard")]
#[command(about = "Calculation history and statistics API server")]
#[command(version)]
struct Args {
    /// Interface to bind (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database file (overrides config)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Config file to load instead of the XDG default
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Also log to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;

    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.database.is_some() {
        config.database.path = args.database;
    }
    if args.verbose {
        config.logging.stderr = true;
    }

    let _log_guard =
        calcboard_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("calcboard starting up");

    let db_path = config.resolved_database_path();
    tracing::info!(path = %db_path.display(), "Opening database");

    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    server::serve(AppState::new(db, config))
        .await
        .context("server error")?;

    Ok(())
}

//! `npscan`
//!
//! Polls Neptune's Pride games, keeps every player's snapshots, and warns
//! defenders about incoming carriers.

use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use npscan_core::Config;
use npscan_core::config::load_config;
use npscan_core::snapshot::PlayerId;
use npscan_core::tracing_init::init_tracing;
use npscan_daemon::Scanner;
use npscan_daemon::poller::PollOptions;
use npscan_daemon::{scheduler, web};

#[derive(Parser, Debug)]
#[command(name = "npscan")]
#[command(version, about = "npscan - Neptune's Pride snapshot poller and threat notifier")]
struct Cli {
    /// Settings file (JSON). Defaults to the global settings file.
    #[arg(long, global = true, env = "NPSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Match database file path
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Notification record database file path
    #[arg(long, global = true)]
    notifications_db_path: Option<PathBuf>,

    /// Discord webhook receiving threat notifications
    #[arg(long, global = true, env = "NPSCAN_DISCORD_WEBHOOK_URL")]
    discord_webhook_url: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, global = true, env = "NPSCAN_LOG_JSON")]
    log_json: bool,

    /// Log level filter (e.g. "info", "debug", "warn").
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scheduler and the HTTP API until interrupted
    Serve {
        /// HTTP listen address
        #[arg(long)]
        addr: Option<SocketAddr>,

        /// Seconds between poll passes
        #[arg(long, value_name = "SECS")]
        poll_period: Option<u64>,
    },

    /// Poll matches once and notify threats in those that changed
    Poll {
        /// Match ids, or `all`
        #[arg(required = true)]
        matches: Vec<String>,

        /// Poll even credentials that were polled recently
        #[arg(long)]
        force: bool,

        /// Minimum seconds since a credential's last poll
        #[arg(long, value_name = "SECS")]
        min_time_passed: Option<u64>,
    },

    /// Validate an API key and store it for its player
    Set { match_id: String, api_key: String },

    /// Add an access code to a match
    Protect {
        match_id: String,

        #[arg(default_value = "")]
        code: String,

        /// Remove existing access codes first
        #[arg(long)]
        wipe: bool,

        /// Restrict the code to these players (repeatable); default is everyone
        #[arg(long = "allowed-uid", value_name = "PLAYER")]
        allowed_uids: Vec<PlayerId>,
    },

    /// Stop polling a player's credential
    DisablePlayer { match_id: String, player: PlayerId },

    /// Resume polling a disabled credential
    EnablePlayer { match_id: String, player: PlayerId },

    /// Map a player to a Discord user for mentions
    SetDiscord {
        match_id: String,
        player: PlayerId,

        #[arg(default_value = "")]
        discord_id: String,

        /// Remove the mapping instead
        #[arg(long)]
        wipe: bool,
    },

    /// Re-encode stored JSON snapshots as LZ4
    CompressSnapshots,

    /// Fetch and print a snapshot without storing it
    Fetch { match_id: String, api_key: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    init_tracing(&config.log_level, cli.log_json);

    match cli.command {
        Command::Serve { .. } => serve(config).await,
        Command::Poll {
            matches,
            force,
            min_time_passed,
        } => {
            let scanner = Scanner::open(&config).await?;
            let ids = if matches.iter().any(|m| m == "all") {
                Vec::new()
            } else {
                matches
            };
            let options = PollOptions {
                force,
                min_interval: Duration::from_secs(
                    min_time_passed.unwrap_or(config.polling.min_interval_secs),
                ),
            };
            let outcomes = scanner.poll_and_notify(&ids, &options).await?;
            let mut out = io::stdout();
            for (id, outcome) in outcomes {
                let state = if outcome.changed { "changed" } else { "unchanged" };
                writeln!(out, "{id}: {state}")?;
            }
            Ok(())
        }
        Command::Set { match_id, api_key } => {
            let scanner = Scanner::open(&config).await?;
            let player = scanner.set_credentials(&match_id, &api_key).await?;
            writeln!(
                io::stdout(),
                "stored credentials for player {player} in match {match_id}"
            )?;
            Ok(())
        }
        Command::Protect {
            match_id,
            code,
            wipe,
            allowed_uids,
        } => {
            let scanner = Scanner::open(&config).await?;
            scanner.protect(&match_id, &code, &allowed_uids, wipe).await?;
            Ok(())
        }
        Command::DisablePlayer { match_id, player } => {
            let scanner = Scanner::open(&config).await?;
            scanner.disable_player(&match_id, player).await?;
            Ok(())
        }
        Command::EnablePlayer { match_id, player } => {
            let scanner = Scanner::open(&config).await?;
            scanner.enable_player(&match_id, player).await?;
            Ok(())
        }
        Command::SetDiscord {
            match_id,
            player,
            discord_id,
            wipe,
        } => {
            let scanner = Scanner::open(&config).await?;
            scanner
                .set_discord_user(&match_id, player, &discord_id, wipe)
                .await?;
            Ok(())
        }
        Command::CompressSnapshots => {
            let scanner = Scanner::open(&config).await?;
            let converted = scanner.compress_snapshots().await?;
            writeln!(io::stdout(), "compressed {converted} snapshots")?;
            Ok(())
        }
        Command::Fetch { match_id, api_key } => {
            let scanner = Scanner::open(&config).await?;
            let snapshot = scanner.fetch(&match_id, &api_key).await?;
            writeln!(io::stdout(), "{}", serde_json::to_string_pretty(&snapshot)?)?;
            Ok(())
        }
    }
}

/// Defaults, then the settings file and environment, then flags.
fn resolve_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = load_config(cli.config.as_deref()).context("failed to load configuration")?;

    if let Some(path) = &cli.db_path {
        config.storage.database_path = Some(path.clone());
    }
    if let Some(path) = &cli.notifications_db_path {
        config.storage.notifications_database_path = Some(path.clone());
    }
    if let Some(url) = &cli.discord_webhook_url {
        config.notifications.discord_webhook_url = Some(url.clone());
    }
    if let Some(level) = &cli.log_level {
        config.log_level.clone_from(level);
    }
    if let Command::Serve { addr, poll_period } = &cli.command {
        if let Some(addr) = addr {
            config.server.addr = *addr;
        }
        if let Some(secs) = poll_period {
            config.polling.period_secs = *secs;
        }
    }

    Ok(config)
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let addr = config.server.addr;
    let period = Duration::from_secs(config.polling.period_secs.max(1));

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %addr,
        period_secs = period.as_secs(),
        "Starting npscan"
    );

    let scanner = Arc::new(Scanner::open(&config).await?);
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let options = PollOptions {
        force: false,
        min_interval: Duration::from_secs(config.polling.min_interval_secs),
    };
    let scheduler_handle =
        scheduler::spawn_scheduler(Arc::clone(&scanner), period, options, shutdown_rx.clone());
    let mut web_handle = tokio::spawn(web::serve(addr, Arc::clone(&scanner), shutdown_rx));

    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    #[cfg(unix)]
    sd_notify::notify(true, &[sd_notify::NotifyState::Ready])?;

    #[cfg(unix)]
    let sigterm_future = sigterm.recv();
    #[cfg(not(unix))]
    let sigterm_future = std::future::pending::<Option<()>>();

    let finished = tokio::select! {
        result = &mut web_handle => Some(result),
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C shutdown signal");
            None
        }
        _ = sigterm_future => {
            info!("Received SIGTERM shutdown signal");
            None
        }
    };

    let _ = shutdown_tx.send(true);
    let web_result = match finished {
        Some(result) => result,
        None => web_handle.await,
    };
    let _ = scheduler_handle.await;
    web_result??;

    info!("npscan stopped");
    Ok(())
}

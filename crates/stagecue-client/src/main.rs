//! Stagecue -- remote control for a streaming application.
//!
//! Usage:
//!   stagecue start                          # Start streaming now
//!   stagecue stop                           # Stop streaming
//!   stagecue status                         # Show stream status
//!   stagecue schedule --time 19:00 -d 90    # Start at 19:00, stop 90 min later
//!   stagecue run                            # Weekly scheduler from config

use stagecue_client::config::ClientConfig;
use stagecue_client::recurring::{IntervalTicker, RecurringScheduler};
use stagecue_client::schedule::ScheduledAction;
use stagecue_client::trigger::signal_or_pending;
use stagecue_client::{expand_tilde, Action, ActionOutcome, ClientError, Trigger};

use chrono::Local;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;

/// How long in-flight scheduled sessions get to disconnect on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "stagecue", about = "Remote control for a streaming application")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, default_value = "~/.stagecue/config.toml")]
    config: String,

    /// Server host (overrides config)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Server port (overrides config)
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Server password (overrides config)
    #[arg(long, global = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start streaming now
    Start,
    /// Stop streaming
    Stop,
    /// Show stream status
    Status,
    /// Start streaming at a time of day, optionally stopping later
    Schedule {
        /// Start time, HH:MM (24-hour, local)
        #[arg(short, long)]
        time: String,
        /// Stop after this many minutes (0 or absent: keep streaming)
        #[arg(short, long)]
        duration: Option<u64>,
    },
    /// Run the weekly scheduler from the config file
    Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stagecue=info,stagecue_client=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let cfg = ClientConfig::load_or_default(&config_path)?.with_overrides(
        cli.host,
        cli.port,
        cli.password,
    );

    let action = match cli.command {
        Commands::Run => return run_scheduler(cfg).await,
        Commands::Start => Action::Start,
        Commands::Stop => Action::Stop,
        Commands::Status => Action::Status,
        Commands::Schedule { time, duration } => {
            // Plan up front so a bad time fails before connecting.
            match ScheduledAction::plan(&time, duration, &Local::now()) {
                Ok(plan) => println!(
                    "Stream scheduled for {}",
                    plan.target.format("%Y-%m-%d %H:%M")
                ),
                Err(e) => exit_with(&e),
            }
            Action::Schedule {
                time,
                duration_minutes: duration,
            }
        }
    };

    let trigger = Trigger::from_config(&cfg);
    let shutdown = signal_or_pending(tokio::signal::ctrl_c());
    match trigger.run_until(action, shutdown).await {
        Ok(outcome) => print_outcome(&outcome),
        Err(e) => exit_with(&e),
    }

    Ok(())
}

fn print_outcome(outcome: &ActionOutcome) {
    match outcome {
        ActionOutcome::Started => println!("Streaming started"),
        ActionOutcome::Stopped => println!("Streaming stopped"),
        ActionOutcome::Status(status) if status.active => println!(
            "Streaming: {}s elapsed, {} bytes sent",
            status.duration_ms / 1000,
            status.bytes_sent
        ),
        ActionOutcome::Status(_) => println!("Not streaming"),
        ActionOutcome::Scheduled {
            target,
            stopped_after: Some(after),
        } => println!(
            "Streamed from {} and stopped after {} minutes",
            target.format("%H:%M"),
            after.as_secs() / 60
        ),
        ActionOutcome::Scheduled { target, .. } => {
            println!("Streaming started at {}", target.format("%H:%M"))
        }
    }
}

fn exit_with(err: &ClientError) -> ! {
    eprintln!("Error: {err}");
    if err.is_transport() {
        eprintln!("Is the streaming application running with its WebSocket server enabled?");
    }
    std::process::exit(1);
}

async fn run_scheduler(cfg: ClientConfig) -> anyhow::Result<()> {
    let entries = cfg.weekly_entries()?;
    if entries.is_empty() {
        anyhow::bail!("no [[scheduler.entries]] configured");
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %cfg.connection.host,
        port = cfg.connection.port,
        entries = entries.len(),
        "starting stagecue scheduler"
    );

    let trigger = Arc::new(Trigger::from_config(&cfg));
    let scheduler = RecurringScheduler::new(entries, &Local::now());
    let ticker = IntervalTicker::new(cfg.poll_interval());

    // Shutdown broadcast channel
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
    {
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            signal_or_pending(tokio::signal::ctrl_c()).await;
            tracing::info!("shutting down...");
            let _ = shutdown_tx.send(());
        });
    }

    tracing::info!("scheduler running, press Ctrl-C to stop");
    trigger
        .serve(scheduler, ticker, Local::now, &shutdown_tx, SHUTDOWN_GRACE)
        .await;
    Ok(())
}

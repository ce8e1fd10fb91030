use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kestrel_alarm::{AlarmScheduler, AlarmTable, Repeat};
use kestrel_config::AppConfig;
use kestrel_runtime::telemetry::NullTelemetrySource;
use kestrel_runtime::App;

#[derive(Debug, Parser)]
#[command(name = "kestrel-sim", version, about = "Host simulator for the Kestrel interaction orchestrator")]
struct Cli {
    /// Path to the device config file (spec §6 persisted namespaces).
    #[arg(long, default_value = "kestrel.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the orchestrator against the in-memory loopback transport until
    /// Ctrl-C.
    Run,
    /// Alarm-clock (C2) management, independent of a running simulator.
    Alarm {
        #[command(subcommand)]
        command: AlarmCommands,
    },
}

#[derive(Debug, Subcommand)]
enum AlarmCommands {
    /// List every occupied slot.
    List,
    /// Schedule a one-shot alarm `seconds_from_now` seconds out.
    SetRelative { name: String, seconds_from_now: i64 },
    /// Schedule a daily alarm at `HH:MM`.
    SetDaily { name: String, hour: u32, minute: u32 },
    /// Schedule a weekday-only (Mon-Fri) alarm at `HH:MM`.
    SetWorkdays { name: String, hour: u32, minute: u32 },
    /// Schedule a weekend-only alarm at `HH:MM`.
    SetWeekends { name: String, hour: u32, minute: u32 },
    Enable { name: String },
    Disable { name: String },
    Cancel { name: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_simulator(config).await,
        Commands::Alarm { command } => run_alarm_command(&config, command),
    }
}

async fn run_simulator(config: AppConfig) -> Result<()> {
    let (app, serializer) = App::build_simulated(config.clone());
    let serializer_handle = tokio::spawn(serializer.run());
    let loop_handles = app.spawn_background_loops(config, Arc::new(NullTelemetrySource));

    tracing::info!("kestrel-sim running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    app.shutdown();

    serializer_handle.await?;
    for handle in loop_handles {
        handle.await?;
    }
    Ok(())
}

fn run_alarm_command(config: &AppConfig, command: AlarmCommands) -> Result<()> {
    let scheduler = AlarmScheduler::new(AlarmTable::new(&config.alarm.store_path));
    let tz = Tz::from_str(&config.alarm.timezone).unwrap_or(chrono_tz::UTC);
    let now = Utc::now().with_timezone(&tz);
    // Constructing a scheduler from the persisted table is this process's
    // "boot" (spec §4.2 "Catch-up on boot") — recurring alarms that fell
    // due while no process had the table open are advanced before any
    // subcommand observes or mutates the table.
    scheduler.catch_up(now);
    scheduler.clear_overdue(now);

    match command {
        AlarmCommands::List => {
            for alarm in scheduler.all() {
                println!(
                    "{:<16} next_fire={} repeat={:?} enabled={}",
                    alarm.name, alarm.next_fire, alarm.repeat, alarm.enabled
                );
            }
        }
        AlarmCommands::SetRelative { name, seconds_from_now } => {
            scheduler.set_relative(&name, now, seconds_from_now, Repeat::Once, 0)?;
        }
        AlarmCommands::SetDaily { name, hour, minute } => {
            scheduler.set_daily(&name, now, hour, minute)?;
        }
        AlarmCommands::SetWorkdays { name, hour, minute } => {
            scheduler.set_workdays(&name, now, hour, minute)?;
        }
        AlarmCommands::SetWeekends { name, hour, minute } => {
            scheduler.set_weekends(&name, now, hour, minute)?;
        }
        AlarmCommands::Enable { name } => scheduler.enable(&name, true)?,
        AlarmCommands::Disable { name } => scheduler.enable(&name, false)?,
        AlarmCommands::Cancel { name } => scheduler.cancel(&name)?,
    }
    Ok(())
}

//! Rise application binary - composition root.
//!
//! Ties the Rise crates together into a single executable:
//! 1. Parse the command line and load configuration from TOML
//! 2. Open persistence (SQLite blob store or in-memory)
//! 3. Select the trigger adapter from configuration
//! 4. Hydrate the alarm store, rebuilding every trigger
//! 5. Execute the requested command, or service fired triggers in `run` mode
//!
//! Triggers armed by the timer backend live only as long as this process, so
//! `snooze` and `test-notification` stay in the foreground until theirs fires.

mod cli;

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::Parser;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use rise_core::config::{RiseConfig, StorageBackend};
use rise_core::types::{AlarmId, AlarmPatch};
use rise_scheduler::{
    build_adapter, AlarmStore, FireOutcome, FiredTrigger, Reconciler, SystemClock, TriggerKey,
};
use rise_storage::{AlarmPersistence, Database, MemoryPersistence, SqlitePersistence};

use cli::{CliArgs, Command};

/// Expand ~ to home directory in a path string.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if data_dir.starts_with("~/") || data_dir.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&data_dir[2..])
    } else {
        PathBuf::from(data_dir)
    }
}

/// Open the persistence backend selected in config.
fn open_persistence(
    config: &RiseConfig,
) -> Result<Arc<dyn AlarmPersistence>, Box<dyn std::error::Error>> {
    match config.storage.backend {
        StorageBackend::Sqlite => {
            let data_dir = resolve_data_dir(&config.general.data_dir);
            if let Err(e) = std::fs::create_dir_all(&data_dir) {
                tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
                return Err(e.into());
            }
            let db_path = data_dir.join(&config.storage.database_file);
            let db = Arc::new(Database::new(&db_path)?);
            tracing::info!(path = %db_path.display(), "SQLite database opened");
            Ok(Arc::new(SqlitePersistence::new(
                db,
                config.storage.storage_key.clone(),
            )))
        }
        StorageBackend::Memory => {
            tracing::info!("Using in-memory alarm storage");
            Ok(Arc::new(MemoryPersistence::new()))
        }
    }
}

fn print_alarms(store: &AlarmStore) {
    let alarms = store.sorted_alarms();
    if alarms.is_empty() {
        println!("No alarms.");
        return;
    }
    for alarm in alarms {
        let days = if alarm.is_one_time() {
            "once".to_string()
        } else {
            alarm
                .repeat_days
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(",")
        };
        println!(
            "{}  {:>8}  {:<3}  {:<27}  {}",
            alarm.id,
            alarm.formatted_time(),
            if alarm.enabled { "on" } else { "off" },
            days,
            alarm.display_label()
        );
    }
}

/// A line typed while alarms are being serviced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsoleCommand {
    Snooze,
    Dismiss,
}

fn parse_console_line(line: &str) -> Option<ConsoleCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "s" | "snooze" => Some(ConsoleCommand::Snooze),
        "d" | "dismiss" => Some(ConsoleCommand::Dismiss),
        _ => None,
    }
}

/// Forward stdin lines from a detached thread so a pending read never
/// holds up exit.
fn spawn_console_reader() -> UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn recv_or_pending<T>(rx: &mut Option<UnboundedReceiver<T>>) -> Option<T> {
    match rx.as_mut() {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Apply `command` to the ringing alarm, if any. Returns the snooze time.
async fn apply_console_command(
    store: &AlarmStore,
    ringing: &mut Option<AlarmId>,
    command: ConsoleCommand,
) -> Option<DateTime<Utc>> {
    let Some(id) = ringing.take() else {
        println!("No alarm is ringing.");
        return None;
    };
    match command {
        ConsoleCommand::Snooze => {
            let at = store.snooze(id).await;
            match at {
                Some(at) => println!(
                    "Snoozed until {}",
                    at.with_timezone(&chrono::Local).format("%H:%M")
                ),
                None => println!("Alarm {} was not snoozed", id),
            }
            at
        }
        ConsoleCommand::Dismiss => {
            println!("Dismissed.");
            None
        }
    }
}

/// Print a fired trigger and let the store react. Returns the alarm now
/// ringing, if the trigger was an alarm's own.
async fn deliver(store: &mut AlarmStore, event: &FiredTrigger) -> Option<AlarmId> {
    println!("[{}] {}: {}", event.key, event.payload.title, event.payload.body);
    match store.handle_fired(event).await {
        FireOutcome::Rearmed { id, next: Some(next) } => {
            tracing::info!(alarm_id = %id, next = %next, "Alarm re-armed");
            Some(id)
        }
        FireOutcome::Rearmed { id, next: None } => {
            tracing::warn!(alarm_id = %id, "Alarm could not be re-armed");
            Some(id)
        }
        FireOutcome::Disabled(id) => Some(id),
        outcome => {
            tracing::debug!(outcome = ?outcome, "Fired trigger handled");
            None
        }
    }
}

/// Deliver fired triggers until Ctrl-C, the channel closes, or `until` fires.
///
/// Console lines `s` and `d` snooze or dismiss the alarm that rang last.
async fn service_triggers(
    store: &mut AlarmStore,
    mut fired: Option<UnboundedReceiver<FiredTrigger>>,
    mut console: Option<UnboundedReceiver<String>>,
    until: Option<TriggerKey>,
) {
    if fired.is_none() {
        tracing::info!("Trigger backend delivers nothing in-process; waiting for Ctrl-C");
    }
    let mut ringing: Option<AlarmId> = None;

    loop {
        tokio::select! {
            biased;
            event = recv_or_pending(&mut fired) => {
                let Some(event) = event else {
                    tracing::warn!("Trigger channel closed");
                    return;
                };
                if let Some(id) = deliver(store, &event).await {
                    ringing = Some(id);
                    if console.is_some() {
                        println!("  s = snooze, d = dismiss");
                    }
                }
                if until.as_ref() == Some(&event.key) {
                    return;
                }
            }
            line = recv_or_pending(&mut console) => match line {
                Some(line) => match parse_console_line(&line) {
                    Some(command) => {
                        apply_console_command(store, &mut ringing, command).await;
                    }
                    None => println!("Unknown input {:?}; s = snooze, d = dismiss", line.trim()),
                },
                None => console = None,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                return;
            }
        }
    }
}

async fn execute(
    command: Command,
    store: &mut AlarmStore,
    config: &RiseConfig,
    fired: Option<UnboundedReceiver<FiredTrigger>>,
    console: Option<UnboundedReceiver<String>>,
) {
    match command {
        Command::List => print_alarms(store),
        Command::Add {
            time,
            label,
            days,
            disabled,
            no_snooze,
            snooze_minutes,
        } => {
            let mut input = config.alarms.new_alarm();
            input.hour = time.hour;
            input.minute = time.minute;
            input.repeat_days = days.into_iter().collect();
            input.enabled = !disabled;
            if let Some(label) = label {
                input.label = label;
            }
            if no_snooze {
                input.snooze_enabled = false;
            }
            if let Some(minutes) = snooze_minutes {
                input.snooze_duration_minutes = minutes;
            }
            let alarm = store.add(input).await;
            println!("Added {} at {}", alarm.id, alarm.formatted_time());
        }
        Command::Edit {
            id,
            time,
            label,
            days,
            once,
            snooze_minutes,
        } => {
            let mut patch = AlarmPatch::new(id);
            if let Some(time) = time {
                patch.hour = Some(time.hour);
                patch.minute = Some(time.minute);
            }
            patch.label = label;
            patch.repeat_days = match (days, once) {
                (_, true) => Some(Default::default()),
                (Some(days), false) => Some(days.into_iter().collect()),
                (None, false) => None,
            };
            patch.snooze_duration_minutes = snooze_minutes;
            match store.update(patch).await {
                Some(alarm) => println!("Updated {} ({})", alarm.id, alarm.formatted_time()),
                None => println!("No alarm with id {}", id),
            }
        }
        Command::Toggle { id } => match store.toggle(id).await {
            Some(alarm) => println!(
                "{} is now {}",
                alarm.id,
                if alarm.enabled { "on" } else { "off" }
            ),
            None => println!("No alarm with id {}", id),
        },
        Command::Delete { id } => {
            if store.delete(id).await {
                println!("Deleted {}", id);
            } else {
                println!("No alarm with id {}", id);
            }
        }
        Command::Snooze { id } => match store.snooze(id).await {
            Some(at) => {
                println!(
                    "Snoozed until {}",
                    at.with_timezone(&chrono::Local).format("%H:%M")
                );
                if fired.is_some() {
                    println!("Waiting for the snooze to ring; Ctrl-C cancels it.");
                    service_triggers(store, fired, None, Some(TriggerKey::snooze(id))).await;
                } else {
                    tracing::warn!("Trigger backend delivers nothing in-process; the snooze will not ring");
                }
            }
            None => println!("Alarm {} was not snoozed", id),
        },
        Command::Next => {
            let upcoming = store.upcoming();
            if upcoming.is_empty() {
                println!("No active alarms.");
            }
            for (alarm, at) in upcoming {
                println!(
                    "{}  {}  {}",
                    at.format("%a %Y-%m-%d %H:%M"),
                    alarm.display_label(),
                    alarm.id
                );
            }
        }
        Command::TestNotification => {
            if !store.reconciler().request_permission().await {
                println!("Notification permission denied.");
                return;
            }
            if !store.reconciler().display_test().await {
                println!("Test notification could not be shown.");
                return;
            }
            if fired.is_some() {
                service_triggers(store, fired, None, Some(TriggerKey::test())).await;
            } else {
                println!("Test notification sent.");
            }
        }
        Command::Run => service_triggers(store, fired, console, None).await,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = RiseConfig::load_or_default(&config_file);
    if let Some(data_dir) = args.resolve_data_dir() {
        config.general.data_dir = data_dir;
    }
    let log_level = args
        .resolve_log_level()
        .unwrap_or_else(|| config.general.log_level.clone());

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Rise v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    // Storage.
    let persistence = open_persistence(&config)?;

    // Triggers.
    let (adapter, fired) = build_adapter(&config.triggers);
    tracing::info!(adapter = adapter.name(), "Trigger adapter selected");
    let reconciler = Reconciler::new(adapter, SystemClock, config.triggers.channel_id.clone());
    reconciler.initialize().await;
    if !reconciler.request_permission().await {
        tracing::warn!("Alert permission not granted; alarms may not be shown");
    }

    // Store.
    let mut store = AlarmStore::new(persistence, reconciler)
        .with_one_time_policy(config.alarms.one_time_after_fire);
    store.hydrate().await;

    let console = matches!(args.command, Command::Run).then(spawn_console_reader);
    execute(args.command, &mut store, &config, fired, console).await;

    Ok(())
}

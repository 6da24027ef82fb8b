//! Development utility: schedule reminders for a single task and wait for them
//! to go out.
//!
//! Not part of the reminder service API. The task handlers call
//! `TaskReminders` directly; this exists to check SMS gateway credentials end
//! to end from a shell.
//!
//! Usage: cargo run --bin remind -- "<task title>" <deadline> <phone> [task-id]

use anyhow::{anyhow, Result};
use dotenvy::dotenv;
use log::{info, warn};
use std::time::Duration;

use tasky::core::Config;
use tasky::features::reminders::{parse_deadline, TaskId, TaskReminders};

const USAGE: &str = "Usage: remind \"<task title>\" <deadline> <phone> [task-id]";

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (title, deadline_raw, phone) = match args.as_slice() {
        [title, deadline, phone, ..] => (title, deadline, phone),
        _ => return Err(anyhow!(USAGE)),
    };
    let task_id = args
        .get(3)
        .map(|id| TaskId::from(id.as_str()))
        .unwrap_or_else(|| TaskId::new(uuid::Uuid::new_v4().simple().to_string()));

    let deadline = parse_deadline(deadline_raw)?;
    let service = TaskReminders::from_config(&config)?;

    let reminders = service.on_task_created(&task_id, title, deadline, phone)?;
    info!("Task {task_id} due {deadline}");
    for (i, at) in reminders.iter().enumerate() {
        info!("  Reminder {} at {}", i + 1, at);
    }

    let scheduler = service.scheduler().clone();
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                // The entry is pruned only after the last dispatch returns
                if scheduler.jobs(&task_id).is_empty() {
                    info!("All reminders for task {task_id} have been sent");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, cancelling pending reminders");
                service.shutdown();
                break;
            }
        }
    }

    Ok(())
}

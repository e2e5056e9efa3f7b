//! Background sync and cache maintenance commands.

use clap::{Args, Subcommand};
use farmstead::config::MAX_RETENTION_DAYS;
use farmstead::sync::{
    ConstraintChecker, JobOutcome, SchedulerSettings, SensorCleanupJob, SyncScheduler,
    SysfsPowerSource, SYNC_JOB_NAME,
};
use serde::Serialize;
use std::sync::Arc;

use super::{print_json, CommandError, Context, OutputFormat};

/// Run or schedule the sync job
#[derive(Debug, Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    command: SyncSubcommand,
}

#[derive(Debug, Subcommand)]
enum SyncSubcommand {
    /// Run the sync job once, waiting for a network connection
    Now,

    /// Keep the periodic sync job running until interrupted
    Daemon,

    /// Drop cached sensor readings older than the retention window
    Prune {
        /// Retention window in days (defaults to sync.retention_days)
        #[arg(long)]
        days: Option<i64>,
    },

    /// Show sync settings and whether its constraints currently hold
    Status {
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Serialize)]
struct SyncStatus {
    job: &'static str,
    interval_minutes: u64,
    retention_days: i64,
    online: bool,
    battery_level: Option<u8>,
    charging: Option<bool>,
    battery_low: bool,
}

impl SyncCommand {
    pub async fn run(&self, ctx: &Context) -> Result<(), CommandError> {
        match &self.command {
            SyncSubcommand::Now => {
                let scheduler = scheduler(ctx);
                if !ctx.repository.is_online() {
                    println!("Waiting for a network connection... (Ctrl-C to stop)");
                }

                let handle = scheduler.trigger_immediate();
                tokio::select! {
                    outcome = handle => {
                        match outcome {
                            Ok(JobOutcome::Success) => {
                                println!("Sync complete.");
                                Ok(())
                            }
                            Ok(JobOutcome::Retry) => {
                                Err(CommandError::Failed("Sync did not complete".to_string()))
                            }
                            Err(e) => Err(CommandError::Failed(format!("Sync task failed: {}", e))),
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        println!("\nInterrupted.");
                        Ok(())
                    }
                }
            }

            SyncSubcommand::Daemon => {
                let scheduler = scheduler(ctx);
                scheduler.schedule_periodic();
                println!(
                    "Running '{}' every {} minute(s). Press Ctrl-C to stop.",
                    SYNC_JOB_NAME, ctx.config.sync.interval_minutes
                );

                tokio::signal::ctrl_c().await?;
                scheduler.cancel();
                println!("\nStopped.");
                Ok(())
            }

            SyncSubcommand::Prune { days } => {
                let days = days.unwrap_or(ctx.config.sync.retention_days);
                if !(0..=MAX_RETENTION_DAYS).contains(&days) {
                    return Err(CommandError::InvalidInput(format!(
                        "Days must be between 0 and {}",
                        MAX_RETENTION_DAYS
                    )));
                }

                let pruned = ctx.repository.clean_old_sensor_data(days).await?;
                println!(
                    "Removed {} sensor reading(s) older than {} day(s).",
                    pruned, days
                );
                Ok(())
            }

            SyncSubcommand::Status { format } => {
                let checker = checker(ctx);
                let (online, battery) =
                    tokio::task::spawn_blocking(move || (checker.is_online(), checker.battery()))
                        .await
                        .map_err(|e| CommandError::Failed(format!("Status check failed: {}", e)))?;

                let status = SyncStatus {
                    job: SYNC_JOB_NAME,
                    interval_minutes: ctx.config.sync.interval_minutes,
                    retention_days: ctx.config.sync.retention_days,
                    online,
                    battery_level: battery.and_then(|b| b.level),
                    charging: battery.map(|b| b.charging),
                    battery_low: battery.is_some_and(|b| b.is_low()),
                };

                match format {
                    OutputFormat::Json => print_json(&status)?,
                    OutputFormat::Text => {
                        println!("Sync Status");
                        println!("===========\n");
                        println!("Job:        {}", status.job);
                        println!("Interval:   {} minute(s)", status.interval_minutes);
                        println!("Retention:  {} day(s)", status.retention_days);
                        println!("Server:     {}", ctx.config.api.base_url.value);
                        println!(
                            "Network:    {}",
                            if status.online { "online" } else { "offline" }
                        );
                        match (status.battery_level, status.charging) {
                            (Some(level), Some(charging)) => println!(
                                "Battery:    {}%{}{}",
                                level,
                                if charging { " (charging)" } else { "" },
                                if status.battery_low { " - low" } else { "" }
                            ),
                            (None, Some(true)) => println!("Battery:    on mains power"),
                            _ => println!("Battery:    unknown"),
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

fn checker(ctx: &Context) -> Arc<ConstraintChecker> {
    Arc::new(ConstraintChecker::new(
        Arc::clone(&ctx.connectivity),
        Arc::new(SysfsPowerSource::default()),
    ))
}

fn scheduler(ctx: &Context) -> SyncScheduler {
    let job = SensorCleanupJob::new(ctx.repository.clone())
        .with_retention_days(ctx.config.sync.retention_days);
    let settings = SchedulerSettings {
        interval: ctx.config.sync.interval(),
        ..SchedulerSettings::default()
    };
    SyncScheduler::new(Arc::new(job), checker(ctx), settings)
}

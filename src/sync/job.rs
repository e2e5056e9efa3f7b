//! Background job bodies.

use async_trait::async_trait;
use tracing::{error, info};

use crate::repository::{Repository, DEFAULT_RETENTION_DAYS};

/// Result of one job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    /// Run again after the backoff delay. A job is never marked as
    /// permanently failed.
    Retry,
}

#[async_trait]
pub trait Job: Send + Sync {
    /// The name of this job (used for logging).
    fn name(&self) -> &'static str;

    async fn execute(&self) -> JobOutcome;
}

/// Prunes cached sensor readings older than the retention window.
pub struct SensorCleanupJob {
    repository: Repository,
    retention_days: i64,
}

impl SensorCleanupJob {
    pub fn new(repository: Repository) -> Self {
        Self {
            repository,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }

    pub fn with_retention_days(mut self, days: i64) -> Self {
        self.retention_days = days;
        self
    }
}

#[async_trait]
impl Job for SensorCleanupJob {
    fn name(&self) -> &'static str {
        "sensor_cleanup"
    }

    async fn execute(&self) -> JobOutcome {
        match self
            .repository
            .clean_old_sensor_data(self.retention_days)
            .await
        {
            Ok(pruned) => {
                info!(
                    job = self.name(),
                    retention_days = self.retention_days,
                    pruned,
                    "Sensor data cleaned"
                );
                JobOutcome::Success
            }
            Err(e) => {
                error!(job = self.name(), error = %e, "Sensor cleanup failed");
                JobOutcome::Retry
            }
        }
    }
}

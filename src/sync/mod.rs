//! Background sync.
//!
//! A [`SyncScheduler`] keeps one periodic registration of the sync job under
//! a well-known name and can launch independent one-shot runs. Each run waits
//! for its [`Constraints`] and retries with linear backoff until the job
//! reports success.

mod constraints;
mod job;
mod scheduler;

pub use constraints::{BatteryStatus, ConstraintChecker, Constraints, PowerSource, SysfsPowerSource};
pub use job::{Job, JobOutcome, SensorCleanupJob};
pub use scheduler::{
    BackoffPolicy, SchedulerSettings, SyncScheduler, DEFAULT_CONSTRAINT_RECHECK,
    DEFAULT_SYNC_INTERVAL, MAX_BACKOFF, MIN_BACKOFF, SYNC_JOB_NAME,
};

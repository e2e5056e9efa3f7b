//! Periodic and one-shot scheduling of the sync job.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::constraints::{ConstraintChecker, Constraints};
use super::job::{Job, JobOutcome};

/// Well-known name of the periodic job.
pub const SYNC_JOB_NAME: &str = "farm-sync";

pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(15 * 60);
pub const MIN_BACKOFF: Duration = Duration::from_secs(10);
pub const MAX_BACKOFF: Duration = Duration::from_secs(5 * 60 * 60);
pub const DEFAULT_CONSTRAINT_RECHECK: Duration = Duration::from_secs(30);

/// Linear retry delay: `initial * attempt`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: MIN_BACKOFF,
            max: MAX_BACKOFF,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (starting at 1).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.initial.saturating_mul(attempt.max(1)).min(self.max)
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub interval: Duration,
    pub backoff: BackoffPolicy,
    /// How often unmet constraints are checked again.
    pub constraint_recheck: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SYNC_INTERVAL,
            backoff: BackoffPolicy::default(),
            constraint_recheck: DEFAULT_CONSTRAINT_RECHECK,
        }
    }
}

struct Registration {
    cancel_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Owns the periodic sync registration and launches one-shot runs.
///
/// Dropping the scheduler cancels the periodic job.
pub struct SyncScheduler {
    job: Arc<dyn Job>,
    checker: Arc<ConstraintChecker>,
    settings: SchedulerSettings,
    periodic: Mutex<Option<Registration>>,
}

impl SyncScheduler {
    pub fn new(
        job: Arc<dyn Job>,
        checker: Arc<ConstraintChecker>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            job,
            checker,
            settings,
            periodic: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Register the periodic job. If it is already registered this does
    /// nothing and returns false.
    pub fn schedule_periodic(&self) -> bool {
        let mut periodic = self.periodic.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = periodic.as_ref() {
            if !existing.task.is_finished() {
                debug!(name = SYNC_JOB_NAME, "Periodic job already registered; keeping it");
                return false;
            }
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(run_periodic(
            Arc::clone(&self.job),
            Arc::clone(&self.checker),
            self.settings.clone(),
            cancel_rx,
        ));
        *periodic = Some(Registration { cancel_tx, task });

        info!(
            name = SYNC_JOB_NAME,
            interval_secs = self.settings.interval.as_secs(),
            "Periodic job scheduled"
        );
        true
    }

    /// Enqueue a single run that only needs a network. It runs alongside the
    /// periodic job and is not affected by [`cancel`](Self::cancel).
    pub fn trigger_immediate(&self) -> JoinHandle<JobOutcome> {
        let job = Arc::clone(&self.job);
        let checker = Arc::clone(&self.checker);
        let settings = self.settings.clone();

        info!(job = job.name(), "One-shot run enqueued");
        tokio::spawn(async move {
            let (_cancel_tx, mut cancel_rx) = watch::channel(false);
            run_until_success(job, checker, Constraints::network(), &settings, &mut cancel_rx)
                .await
                .unwrap_or(JobOutcome::Retry)
        })
    }

    /// Cancel the periodic job. Returns false when none was registered.
    pub fn cancel(&self) -> bool {
        let mut periodic = self.periodic.lock().unwrap_or_else(PoisonError::into_inner);
        match periodic.take() {
            Some(registration) => {
                let _ = registration.cancel_tx.send(true);
                info!(name = SYNC_JOB_NAME, "Periodic job cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        let periodic = self.periodic.lock().unwrap_or_else(PoisonError::into_inner);
        periodic
            .as_ref()
            .is_some_and(|registration| !registration.task.is_finished())
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run_periodic(
    job: Arc<dyn Job>,
    checker: Arc<ConstraintChecker>,
    settings: SchedulerSettings,
    mut cancel_rx: watch::Receiver<bool>,
) {
    let name = job.name();
    loop {
        let outcome = run_until_success(
            Arc::clone(&job),
            Arc::clone(&checker),
            Constraints::periodic(),
            &settings,
            &mut cancel_rx,
        )
        .await;
        if outcome.is_none() || !sleep_unless_cancelled(settings.interval, &mut cancel_rx).await {
            break;
        }
    }
    info!(job = name, "Job shutting down");
}

/// Run `job` once its constraints hold, retrying with backoff until it
/// succeeds. Returns `None` if cancelled first.
async fn run_until_success(
    job: Arc<dyn Job>,
    checker: Arc<ConstraintChecker>,
    constraints: Constraints,
    settings: &SchedulerSettings,
    cancel_rx: &mut watch::Receiver<bool>,
) -> Option<JobOutcome> {
    let name = job.name();
    let mut attempt: u32 = 0;

    loop {
        let ready =
            wait_for_constraints(&checker, constraints, settings.constraint_recheck, cancel_rx)
                .await;
        if !ready {
            return None;
        }

        let start = Instant::now();
        info!(job = name, attempt, "Job starting");

        match job.execute().await {
            JobOutcome::Success => {
                info!(
                    job = name,
                    elapsed_ms = start.elapsed().as_millis(),
                    "Job completed successfully"
                );
                return Some(JobOutcome::Success);
            }
            JobOutcome::Retry => {
                attempt = attempt.saturating_add(1);
                let delay = settings.backoff.delay(attempt);
                warn!(
                    job = name,
                    attempt,
                    elapsed_ms = start.elapsed().as_millis(),
                    retry_in_ms = delay.as_millis(),
                    "Job failed; retrying"
                );
                if !sleep_unless_cancelled(delay, cancel_rx).await {
                    return None;
                }
            }
        }
    }
}

async fn wait_for_constraints(
    checker: &Arc<ConstraintChecker>,
    constraints: Constraints,
    recheck: Duration,
    cancel_rx: &mut watch::Receiver<bool>,
) -> bool {
    loop {
        // Battery checks read sysfs, so they stay off the async workers.
        let probe = Arc::clone(checker);
        let unmet = tokio::task::spawn_blocking(move || probe.unmet(constraints))
            .await
            .unwrap_or(Some("constraint check failed"));

        match unmet {
            None => return true,
            Some(reason) => {
                debug!(reason, "Constraints not met; waiting");
                if !sleep_unless_cancelled(recheck, cancel_rx).await {
                    return false;
                }
            }
        }
    }
}

/// Sleep for `duration`. Returns false if cancellation arrived first.
async fn sleep_unless_cancelled(duration: Duration, cancel_rx: &mut watch::Receiver<bool>) -> bool {
    if *cancel_rx.borrow() {
        return false;
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        changed = cancel_rx.changed() => changed.is_ok() && !*cancel_rx.borrow(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::test_support::FakeConnectivity;
    use crate::sync::constraints::test_support::FakePower;
    use crate::sync::constraints::BatteryStatus;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingJob {
        runs: Arc<AtomicUsize>,
        failures_before_success: usize,
    }

    #[async_trait]
    impl Job for CountingJob {
        fn name(&self) -> &'static str {
            "counting_job"
        }

        async fn execute(&self) -> JobOutcome {
            let run = self.runs.fetch_add(1, Ordering::SeqCst);
            if run < self.failures_before_success {
                JobOutcome::Retry
            } else {
                JobOutcome::Success
            }
        }
    }

    struct Harness {
        scheduler: SyncScheduler,
        runs: Arc<AtomicUsize>,
        connectivity: Arc<FakeConnectivity>,
        power: Arc<FakePower>,
    }

    fn fast_settings() -> SchedulerSettings {
        SchedulerSettings {
            interval: Duration::from_millis(50),
            backoff: BackoffPolicy {
                initial: Duration::from_millis(5),
                max: Duration::from_millis(20),
            },
            constraint_recheck: Duration::from_millis(10),
        }
    }

    fn harness(failures_before_success: usize, settings: SchedulerSettings) -> Harness {
        let runs = Arc::new(AtomicUsize::new(0));
        let connectivity = Arc::new(FakeConnectivity::online());
        let power = Arc::new(FakePower::mains());
        let job = Arc::new(CountingJob {
            runs: Arc::clone(&runs),
            failures_before_success,
        });
        let checker = Arc::new(ConstraintChecker::new(connectivity.clone(), power.clone()));
        Harness {
            scheduler: SyncScheduler::new(job, checker, settings),
            runs,
            connectivity,
            power,
        }
    }

    async fn wait_for_runs(runs: &AtomicUsize, at_least: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while runs.load(Ordering::SeqCst) < at_least {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("job did not run in time");
    }

    #[test]
    fn test_backoff_is_linear_and_capped() {
        let backoff = BackoffPolicy::default();
        assert_eq!(backoff.delay(1), Duration::from_secs(10));
        assert_eq!(backoff.delay(2), Duration::from_secs(20));
        assert_eq!(backoff.delay(7), Duration::from_secs(70));
        assert_eq!(backoff.delay(100_000), MAX_BACKOFF);
        assert_eq!(backoff.delay(0), Duration::from_secs(10));
    }

    #[test]
    fn test_default_settings() {
        let settings = SchedulerSettings::default();
        assert_eq!(settings.interval, Duration::from_secs(900));
        assert_eq!(settings.backoff.initial, MIN_BACKOFF);
        assert_eq!(settings.constraint_recheck, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_schedule_periodic_keeps_existing() {
        let h = harness(0, fast_settings());

        assert!(h.scheduler.schedule_periodic());
        assert!(!h.scheduler.schedule_periodic());
        assert!(h.scheduler.is_scheduled());

        wait_for_runs(&h.runs, 2).await;
    }

    #[tokio::test]
    async fn test_cancel_stops_periodic_runs() {
        let h = harness(0, fast_settings());

        h.scheduler.schedule_periodic();
        wait_for_runs(&h.runs, 1).await;

        assert!(h.scheduler.cancel());
        assert!(!h.scheduler.is_scheduled());
        assert!(!h.scheduler.cancel());

        tokio::time::sleep(Duration::from_millis(20)).await;
        let after_cancel = h.runs.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(h.runs.load(Ordering::SeqCst), after_cancel);

        // A cancelled job can be registered again.
        assert!(h.scheduler.schedule_periodic());
    }

    #[tokio::test]
    async fn test_failures_are_retried_until_success() {
        let h = harness(3, fast_settings());

        let outcome = h.scheduler.trigger_immediate().await.unwrap();
        assert_eq!(outcome, JobOutcome::Success);
        assert_eq!(h.runs.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_runs_wait_for_network() {
        let h = harness(0, fast_settings());
        h.connectivity.set_online(false);

        let handle = h.scheduler.trigger_immediate();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(h.runs.load(Ordering::SeqCst), 0);

        h.connectivity.set_online(true);
        assert_eq!(handle.await.unwrap(), JobOutcome::Success);
        assert_eq!(h.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_low_battery_blocks_periodic_but_not_immediate() {
        let h = harness(0, fast_settings());
        h.power.set(Some(BatteryStatus {
            level: Some(5),
            charging: false,
        }));

        h.scheduler.schedule_periodic();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(h.runs.load(Ordering::SeqCst), 0);

        assert_eq!(
            h.scheduler.trigger_immediate().await.unwrap(),
            JobOutcome::Success
        );
        assert_eq!(h.runs.load(Ordering::SeqCst), 1);

        h.power.set(None);
        wait_for_runs(&h.runs, 2).await;
    }

    #[tokio::test]
    async fn test_immediate_run_survives_cancel() {
        let h = harness(0, fast_settings());
        h.connectivity.set_online(false);

        h.scheduler.schedule_periodic();
        let handle = h.scheduler.trigger_immediate();
        h.scheduler.cancel();

        h.connectivity.set_online(true);
        assert_eq!(handle.await.unwrap(), JobOutcome::Success);
    }
}

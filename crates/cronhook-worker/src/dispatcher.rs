//! Dispatch cycles: decide which jobs run now, run them under their locks
//! and report what happened.
//!
//! A cycle sweeps the registry once, in order. Jobs that want to be awaited
//! run inline and land in `ran`; the rest are handed back as a
//! [`DeferredRuns`] batch for the caller to start once it has answered its
//! trigger.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::{self, BoxFuture};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, error, info, info_span, warn};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::lock::JobLock;
use crate::registry::{JobDescriptor, JobExecutionError, JobRegistry};

/// What one dispatch cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Jobs that ran to completion before the report was returned.
    pub ran: Vec<String>,
    /// Jobs deferred until after the report.
    pub to_run: Vec<String>,
    /// Jobs skipped because a previous run still holds the lock.
    pub already_running: Vec<String>,
}

impl RunReport {
    /// Whether no job was touched.
    pub fn is_empty(&self) -> bool {
        self.ran.is_empty() && self.to_run.is_empty() && self.already_running.is_empty()
    }
}

/// How a single job run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The job returned successfully.
    Completed {
        /// Wall-clock run time.
        elapsed: Duration,
    },
    /// The job returned an error or panicked.
    Failed {
        /// Wall-clock run time.
        elapsed: Duration,
        /// Rendered error.
        error: String,
    },
}

impl JobOutcome {
    /// Whether the run completed.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Wall-clock run time.
    pub fn elapsed(&self) -> Duration {
        match self {
            Self::Completed { elapsed } | Self::Failed { elapsed, .. } => *elapsed,
        }
    }
}

/// Job runs held back until the caller has produced its response.
pub struct DeferredRuns {
    runs: Vec<BoxFuture<'static, JobOutcome>>,
}

impl std::fmt::Debug for DeferredRuns {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredRuns")
            .field("len", &self.runs.len())
            .finish()
    }
}

impl DeferredRuns {
    /// Number of deferred runs.
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Whether nothing was deferred.
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Run every deferred job concurrently and wait until all have settled.
    ///
    /// Outcomes are in the order the jobs were deferred.
    pub async fn run(self) -> Vec<JobOutcome> {
        future::join_all(self.runs).await
    }

    /// Hand the batch to the runtime.
    pub fn spawn(self) -> JoinHandle<Vec<JobOutcome>> {
        tokio::spawn(self.run())
    }
}

/// Result of one dispatch cycle.
#[derive(Debug)]
pub struct Dispatch {
    /// Report to answer the trigger with.
    pub report: RunReport,
    /// Work to start after answering.
    pub deferred: DeferredRuns,
}

/// Runs dispatch cycles over a fixed registry.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<JobRegistry>,
    lock: JobLock,
    clock: Arc<dyn Clock>,
}

impl Dispatcher {
    /// Create a dispatcher reading the system clock.
    pub fn new(registry: Arc<JobRegistry>, lock: JobLock) -> Self {
        Self {
            registry,
            lock,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used by [`Dispatcher::dispatch_now`].
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The registry being dispatched.
    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// The lock manager.
    pub fn lock(&self) -> &JobLock {
        &self.lock
    }

    /// Run a cycle for the clock's current instant.
    pub async fn dispatch_now(&self, explicit_job: Option<&str>) -> Dispatch {
        self.dispatch(self.clock.now(), explicit_job).await
    }

    /// Run a cycle for `now`.
    ///
    /// With `explicit_job` set, only the job of that name is eligible and
    /// its schedule is ignored. Otherwise every job whose schedule matches
    /// `now` to the minute is eligible.
    pub async fn dispatch(&self, now: DateTime<Utc>, explicit_job: Option<&str>) -> Dispatch {
        let span = info_span!(
            "dispatch",
            cycle_id = %Uuid::now_v7(),
            at = %now.format("%Y-%m-%dT%H:%M"),
            explicit = explicit_job.unwrap_or_default(),
        );
        self.sweep(now, explicit_job).instrument(span).await
    }

    async fn sweep(&self, now: DateTime<Utc>, explicit_job: Option<&str>) -> Dispatch {
        let mut report = RunReport::default();
        let mut deferred = Vec::new();

        if let Some(name) = explicit_job {
            if self.registry.get(name).is_none() {
                warn!(job = name, "Requested job is not registered");
            }
        }

        for job in self.registry.iter() {
            let eligible = match explicit_job {
                Some(name) => job.name() == name,
                None => job.is_due(&now),
            };
            if !eligible {
                continue;
            }

            if self.lock.is_locked(job.name()).await {
                info!(job = job.name(), "Job already running");
                report.already_running.push(job.name().to_string());
                continue;
            }

            let run = execute(Arc::clone(job), self.lock.clone());
            if job.options().should_wait {
                run.await;
                report.ran.push(job.name().to_string());
            } else {
                deferred.push(run.instrument(Span::current()).boxed());
                report.to_run.push(job.name().to_string());
            }
        }

        info!(
            ran = report.ran.len(),
            to_run = report.to_run.len(),
            already_running = report.already_running.len(),
            "Dispatch cycle complete"
        );

        Dispatch {
            report,
            deferred: DeferredRuns { runs: deferred },
        }
    }
}

/// Run one job under its lock.
///
/// The lock is released whether the job succeeds, fails or panics, and the
/// failure is logged rather than returned.
pub async fn execute(job: Arc<JobDescriptor>, lock: JobLock) -> JobOutcome {
    let name = job.name();
    let started = Instant::now();

    info!(job = name, "Job starting");
    lock.acquire(name, job.options().lock_expiration).await;

    let result = AssertUnwindSafe(job.runner().run()).catch_unwind().await;
    let elapsed = started.elapsed();

    lock.release(name).await;

    let error = match result {
        Ok(Ok(())) => {
            info!(
                job = name,
                elapsed_ms = elapsed.as_millis() as u64,
                "Job successful: {:.2}s",
                elapsed.as_secs_f64()
            );
            return JobOutcome::Completed { elapsed };
        }
        Ok(Err(e)) => e,
        Err(panic) => JobExecutionError::Panicked(panic_message(panic.as_ref())),
    };

    error!(
        job = name,
        elapsed_ms = elapsed.as_millis() as u64,
        error = %error,
        "Job failed: {:.2}s",
        elapsed.as_secs_f64()
    );
    JobOutcome::Failed {
        elapsed,
        error: error.to_string(),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use cronhook_cache::memory::MemoryCacheProvider;
    use cronhook_core::traits::cache::CacheProvider;
    use std::sync::Mutex;
    use tokio::sync::Barrier;

    use crate::clock::FixedClock;
    use crate::registry::{JobOptions, JobRunner};
    use crate::testing::{BarrierJob, CountingJob, FailingStore, GateJob, LockProbe};

    const EVERY_MINUTE: &str = "* * * * *";
    const NEW_YEAR: &str = "0 0 1 1 *";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 10, 15, 0).unwrap()
    }

    fn job(name: &str, cron: &str, should_wait: bool, runner: Arc<dyn JobRunner>) -> JobDescriptor {
        JobDescriptor::new(
            name,
            cron,
            runner,
            JobOptions {
                should_wait,
                lock_expiration: Duration::from_secs(60),
            },
        )
    }

    fn dispatcher(jobs: Vec<JobDescriptor>) -> (Dispatcher, Arc<MemoryCacheProvider>) {
        let store = Arc::new(MemoryCacheProvider::default());
        let registry = Arc::new(JobRegistry::new(jobs).unwrap());
        let dispatcher = Dispatcher::new(registry, JobLock::new(store.clone(), true));
        (dispatcher, store)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_single_awaited_job() {
        let x = CountingJob::ok();
        let (dispatcher, store) = dispatcher(vec![job("x", EVERY_MINUTE, true, x.clone())]);

        let dispatch = dispatcher.dispatch(now(), None).await;

        assert_eq!(
            dispatch.report,
            RunReport {
                ran: names(&["x"]),
                to_run: vec![],
                already_running: vec![],
            }
        );
        assert!(dispatch.deferred.is_empty());
        assert_eq!(x.runs(), 1);
        assert_eq!(store.get("job:x").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_wait_and_deferred_routing() {
        let a = CountingJob::ok();
        let b = CountingJob::ok();
        let (dispatcher, _store) = dispatcher(vec![
            job("A", EVERY_MINUTE, true, a.clone()),
            job("B", EVERY_MINUTE, false, b.clone()),
        ]);

        let dispatch = dispatcher.dispatch(now(), None).await;

        assert_eq!(dispatch.report.ran, names(&["A"]));
        assert_eq!(dispatch.report.to_run, names(&["B"]));
        assert!(dispatch.report.already_running.is_empty());
        assert_eq!(a.runs(), 1);
        assert_eq!(b.runs(), 0);

        let outcomes = dispatch.deferred.run().await;
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_success());
        assert_eq!(b.runs(), 1);
    }

    #[tokio::test]
    async fn test_unscheduled_jobs_are_left_out() {
        let due = CountingJob::ok();
        let not_due = CountingJob::ok();
        let (dispatcher, _store) = dispatcher(vec![
            job("due", "15 10 * * *", true, due.clone()),
            job("not-due", NEW_YEAR, true, not_due.clone()),
        ]);

        let dispatch = dispatcher.dispatch(now(), None).await;

        assert_eq!(dispatch.report.ran, names(&["due"]));
        assert_eq!(not_due.runs(), 0);
    }

    #[tokio::test]
    async fn test_held_lock_skips_job() {
        let a = CountingJob::ok();
        let (dispatcher, store) = dispatcher(vec![job("A", EVERY_MINUTE, true, a.clone())]);
        store
            .set("job:A", "true", Duration::from_secs(60))
            .await
            .unwrap();

        let dispatch = dispatcher.dispatch(now(), None).await;

        assert_eq!(dispatch.report.already_running, names(&["A"]));
        assert!(dispatch.report.ran.is_empty());
        assert!(dispatch.report.to_run.is_empty());
        assert_eq!(a.runs(), 0);
    }

    #[tokio::test]
    async fn test_lock_held_only_while_running() {
        let store = Arc::new(MemoryCacheProvider::default());
        let probe = Arc::new(LockProbe {
            store: store.clone(),
            key: "job:probe".to_string(),
            seen: Mutex::new(None),
        });
        let registry =
            Arc::new(JobRegistry::new([job("probe", EVERY_MINUTE, true, probe.clone())]).unwrap());
        let dispatcher = Dispatcher::new(registry, JobLock::new(store.clone(), true));

        dispatcher.dispatch(now(), None).await;

        assert_eq!(
            *probe.seen.lock().unwrap(),
            Some(Some("true".to_string()))
        );
        assert_eq!(store.get("job:probe").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failure_releases_lock_and_spares_siblings() {
        let failing = CountingJob::failing();
        let waited = CountingJob::ok();
        let deferred = CountingJob::ok();
        let (dispatcher, store) = dispatcher(vec![
            job("failing", EVERY_MINUTE, true, failing.clone()),
            job("waited", EVERY_MINUTE, true, waited.clone()),
            job("deferred", EVERY_MINUTE, false, deferred.clone()),
        ]);

        let dispatch = dispatcher.dispatch(now(), None).await;
        assert_eq!(dispatch.report.ran, names(&["failing", "waited"]));
        assert_eq!(dispatch.report.to_run, names(&["deferred"]));
        dispatch.deferred.run().await;

        assert_eq!(failing.runs(), 1);
        assert_eq!(waited.runs(), 1);
        assert_eq!(deferred.runs(), 1);
        assert_eq!(store.get("job:failing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_deferred_failure_reported_in_outcomes() {
        let failing = CountingJob::failing();
        let (dispatcher, store) =
            dispatcher(vec![job("failing", EVERY_MINUTE, false, failing.clone())]);

        let dispatch = dispatcher.dispatch(now(), None).await;
        let outcomes = dispatch.deferred.run().await;

        assert_eq!(outcomes.len(), 1);
        match &outcomes[0] {
            JobOutcome::Failed { error, .. } => assert!(error.contains("boom")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(store.get("job:failing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_panicking_job_is_contained() {
        let panicking = CountingJob::panicking();
        let after = CountingJob::ok();
        let (dispatcher, store) = dispatcher(vec![
            job("panicking", EVERY_MINUTE, true, panicking.clone()),
            job("after", EVERY_MINUTE, true, after.clone()),
        ]);

        let dispatch = dispatcher.dispatch(now(), None).await;

        assert_eq!(dispatch.report.ran, names(&["panicking", "after"]));
        assert_eq!(after.runs(), 1);
        assert_eq!(store.get("job:panicking").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_explicit_job_ignores_schedule() {
        let a = CountingJob::ok();
        let c = CountingJob::ok();
        let (dispatcher, _store) = dispatcher(vec![
            job("A", EVERY_MINUTE, true, a.clone()),
            job("C", NEW_YEAR, true, c.clone()),
        ]);

        let dispatch = dispatcher.dispatch(now(), Some("C")).await;

        assert_eq!(dispatch.report.ran, names(&["C"]));
        assert!(dispatch.report.to_run.is_empty());
        assert!(dispatch.report.already_running.is_empty());
        assert_eq!(a.runs(), 0);
        assert_eq!(c.runs(), 1);
    }

    #[tokio::test]
    async fn test_explicit_job_runs_despite_malformed_cron() {
        let broken = CountingJob::ok();
        let (dispatcher, _store) =
            dispatcher(vec![job("broken", "whenever", true, broken.clone())]);

        assert!(dispatcher.dispatch(now(), None).await.report.is_empty());
        let dispatch = dispatcher.dispatch(now(), Some("broken")).await;
        assert_eq!(dispatch.report.ran, names(&["broken"]));
        assert_eq!(broken.runs(), 1);
    }

    #[tokio::test]
    async fn test_unknown_explicit_job_yields_empty_report() {
        let a = CountingJob::ok();
        let (dispatcher, _store) = dispatcher(vec![job("A", EVERY_MINUTE, true, a.clone())]);

        let dispatch = dispatcher.dispatch(now(), Some("nope")).await;

        assert!(dispatch.report.is_empty());
        assert_eq!(a.runs(), 0);
    }

    #[tokio::test]
    async fn test_back_to_back_cycles_do_not_double_run() {
        let gate = Arc::new(GateJob::default());
        let (dispatcher, store) = dispatcher(vec![job("slow", EVERY_MINUTE, false, gate.clone())]);

        let first = dispatcher.dispatch(now(), None).await;
        assert_eq!(first.report.to_run, names(&["slow"]));
        let handle = first.deferred.spawn();
        gate.started.notified().await;

        let second = dispatcher.dispatch(now(), None).await;
        assert_eq!(second.report.already_running, names(&["slow"]));
        assert!(second.report.to_run.is_empty());
        assert!(second.deferred.is_empty());

        gate.release.notify_one();
        let outcomes = handle.await.unwrap();
        assert!(outcomes[0].is_success());
        assert_eq!(store.get("job:slow").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_deferred_runs_are_concurrent() {
        let barrier = Arc::new(Barrier::new(2));
        let (dispatcher, _store) = dispatcher(vec![
            job("left", EVERY_MINUTE, false, Arc::new(BarrierJob(barrier.clone()))),
            job("right", EVERY_MINUTE, false, Arc::new(BarrierJob(barrier.clone()))),
        ]);

        let dispatch = dispatcher.dispatch(now(), None).await;
        assert_eq!(dispatch.deferred.len(), 2);

        let outcomes = tokio::time::timeout(Duration::from_secs(5), dispatch.deferred.run())
            .await
            .expect("deferred jobs ran one after another");
        assert!(outcomes.iter().all(JobOutcome::is_success));
        assert!(outcomes.iter().all(|o| o.elapsed() < Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_disabled_locks_never_skip() {
        let store = Arc::new(MemoryCacheProvider::default());
        store
            .set("job:A", "true", Duration::from_secs(60))
            .await
            .unwrap();
        let a = CountingJob::ok();
        let registry =
            Arc::new(JobRegistry::new([job("A", EVERY_MINUTE, true, a.clone())]).unwrap());
        let dispatcher = Dispatcher::new(registry, JobLock::new(store, false));

        let dispatch = dispatcher.dispatch(now(), None).await;

        assert_eq!(dispatch.report.ran, names(&["A"]));
        assert_eq!(a.runs(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_store_still_runs_jobs() {
        let a = CountingJob::ok();
        let registry =
            Arc::new(JobRegistry::new([job("A", EVERY_MINUTE, true, a.clone())]).unwrap());
        let dispatcher = Dispatcher::new(registry, JobLock::new(Arc::new(FailingStore), true));

        let dispatch = dispatcher.dispatch(now(), None).await;

        assert_eq!(dispatch.report.ran, names(&["A"]));
        assert_eq!(a.runs(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_now_reads_injected_clock() {
        let new_year = CountingJob::ok();
        let (dispatcher, _store) =
            dispatcher(vec![job("new-year", NEW_YEAR, true, new_year.clone())]);
        let midnight = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let dispatcher = dispatcher.with_clock(Arc::new(FixedClock(midnight)));

        let dispatch = dispatcher.dispatch_now(None).await;

        assert_eq!(dispatch.report.ran, names(&["new-year"]));
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let report = RunReport {
            ran: names(&["a"]),
            to_run: names(&["b"]),
            already_running: names(&["c"]),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "ran": ["a"], "toRun": ["b"], "alreadyRunning": ["c"] })
        );
    }
}

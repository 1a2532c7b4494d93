//! Scheduler executor: fires due jobs, isolates their failures, records
//! every outcome in the run ledger

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Duration as TokioDuration, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::registry::JobRegistry;
use super::types::{ExecutorState, JobContext, JobSpec, SchedulerSnapshot};
use crate::errors::AppError;
use crate::models::{HealthStatus, JobRunStatus};

struct JobEntry {
    spec: JobSpec,
    next_due: DateTime<Utc>,
}

struct ExecutorInner {
    state: Mutex<ExecutorState>,
    entries: Mutex<Vec<JobEntry>>,
    running_jobs: Mutex<HashSet<String>>,
    in_flight: AtomicUsize,
    cancel: Mutex<Option<CancellationToken>>,
    loop_handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

/// Owns the background clock and the at-most-one-per-job-id guarantee
///
/// State machine: Stopped -> Starting -> Running -> Stopping -> Stopped.
/// A second due-trigger for a job still in flight is dropped (coalesced),
/// never queued. A fire time missed by more than the grace period skips
/// that occurrence instead of backlogging it.
pub struct SchedulerExecutor {
    context: JobContext,
    specs: Vec<JobSpec>,
    misfire_grace: chrono::Duration,
    inner: Arc<ExecutorInner>,
}

impl SchedulerExecutor {
    pub fn new(registry: JobRegistry, context: JobContext, misfire_grace_seconds: u64) -> Self {
        Self {
            context,
            specs: registry.jobs().to_vec(),
            misfire_grace: chrono::Duration::seconds(misfire_grace_seconds as i64),
            inner: Arc::new(ExecutorInner {
                state: Mutex::new(ExecutorState::Stopped),
                entries: Mutex::new(Vec::new()),
                running_jobs: Mutex::new(HashSet::new()),
                in_flight: AtomicUsize::new(0),
                cancel: Mutex::new(None),
                loop_handle: tokio::sync::Mutex::new(None),
            }),
        }
    }

    /// Start the background tick loop; no-op when already running
    pub async fn start(&self) -> Result<(), AppError> {
        {
            let mut state = self.lock_state();
            if *state != ExecutorState::Stopped {
                info!("scheduler start ignored, already running");
                return Ok(());
            }
            *state = ExecutorState::Starting;
        }

        let now = Utc::now();
        {
            let mut entries = self.lock_entries();
            *entries = self
                .specs
                .iter()
                .map(|spec| JobEntry {
                    next_due: spec.trigger.first_fire(now),
                    spec: spec.clone(),
                })
                .collect();
        }

        let token = CancellationToken::new();
        {
            let mut cancel = self.inner.cancel.lock().unwrap_or_else(|e| e.into_inner());
            *cancel = Some(token.clone());
        }

        let inner = Arc::clone(&self.inner);
        let context = self.context.clone();
        let grace = self.misfire_grace;
        let handle = tokio::spawn(async move {
            let mut tick = interval(TokioDuration::from_secs(1));
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        fire_due_jobs(&inner, &context, grace, Utc::now());
                    }
                    _ = token.cancelled() => {
                        info!("scheduler received cancellation signal, stopping tick loop");
                        break;
                    }
                }
            }
        });
        {
            let mut loop_handle = self.inner.loop_handle.lock().await;
            *loop_handle = Some(handle);
        }

        *self.lock_state() = ExecutorState::Running;
        info!("Scheduler started with {} jobs", self.specs.len());
        self.publish_health().await;
        Ok(())
    }

    /// Stop firing, wait for in-flight jobs to finish, record final health
    pub async fn shutdown(&self) -> Result<(), AppError> {
        {
            let mut state = self.lock_state();
            if *state == ExecutorState::Stopped {
                debug!("scheduler shutdown ignored, not running");
                return Ok(());
            }
            *state = ExecutorState::Stopping;
        }

        let token = {
            let cancel = self.inner.cancel.lock().unwrap_or_else(|e| e.into_inner());
            cancel.clone()
        };
        if let Some(token) = token {
            token.cancel();
        }

        let handle = {
            let mut loop_handle = self.inner.loop_handle.lock().await;
            loop_handle.take()
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("scheduler tick loop join failed: {e}");
            }
        }

        self.wait_for_in_flight().await;

        *self.lock_state() = ExecutorState::Stopped;
        info!("Scheduler shutdown complete");
        self.publish_health().await;
        Ok(())
    }

    /// Pure read of current jobs, state, and next fire times
    pub fn snapshot(&self) -> SchedulerSnapshot {
        let running = *self.lock_state() == ExecutorState::Running;
        let entries = self.lock_entries();
        let next_runs = if entries.is_empty() {
            // Not started yet: report registrations without fire times
            self.specs
                .iter()
                .map(|spec| (spec.job_id.clone(), None))
                .collect()
        } else {
            entries
                .iter()
                .map(|e| (e.spec.job_id.clone(), Some(e.next_due)))
                .collect()
        };
        SchedulerSnapshot {
            total_jobs: self.specs.len(),
            running,
            next_runs,
        }
    }

    pub fn is_running(&self) -> bool {
        *self.lock_state() == ExecutorState::Running
    }

    /// Persist scheduler-level health for dashboards
    pub async fn publish_health(&self) {
        let snapshot = self.snapshot();
        let status = if snapshot.running {
            HealthStatus::Pass
        } else {
            HealthStatus::Fail
        };
        let detail = serde_json::json!({ "next_runs": snapshot.next_runs }).to_string();
        if let Err(e) = self
            .context
            .database
            .record_health("scheduler", status, Some(&detail))
            .await
        {
            error!("failed to record scheduler health: {e}");
        }
    }

    async fn wait_for_in_flight(&self) {
        while self.inner.in_flight.load(Ordering::SeqCst) > 0 {
            debug!(
                in_flight = self.inner.in_flight.load(Ordering::SeqCst),
                "waiting for in-flight jobs to complete"
            );
            tokio::time::sleep(TokioDuration::from_millis(50)).await;
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ExecutorState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, Vec<JobEntry>> {
        self.inner.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[cfg(test)]
    fn force_due(&self, job_id: &str, due: DateTime<Utc>) {
        let mut entries = self.lock_entries();
        if let Some(entry) = entries.iter_mut().find(|e| e.spec.job_id == job_id) {
            entry.next_due = due;
        }
    }

    #[cfg(test)]
    fn fire_now(&self) {
        fire_due_jobs(&self.inner, &self.context, self.misfire_grace, Utc::now());
    }
}

/// One scheduler tick: spawn every due job that is not already in flight
fn fire_due_jobs(
    inner: &Arc<ExecutorInner>,
    context: &JobContext,
    grace: chrono::Duration,
    now: DateTime<Utc>,
) {
    let mut to_run = Vec::new();
    {
        let mut entries = inner.entries.lock().unwrap_or_else(|e| e.into_inner());
        for entry in entries.iter_mut() {
            if entry.next_due > now {
                continue;
            }
            let overdue = now - entry.next_due;
            entry.next_due = entry.spec.trigger.next_fire(now);

            if overdue > grace {
                warn!(
                    job_id = %entry.spec.job_id,
                    overdue_seconds = overdue.num_seconds(),
                    "fire time missed beyond grace period, skipping occurrence"
                );
                continue;
            }

            let mut running = inner.running_jobs.lock().unwrap_or_else(|e| e.into_inner());
            if running.contains(&entry.spec.job_id) {
                debug!(
                    job_id = %entry.spec.job_id,
                    "previous execution still in flight, dropping trigger"
                );
                continue;
            }
            running.insert(entry.spec.job_id.clone());
            inner.in_flight.fetch_add(1, Ordering::SeqCst);
            to_run.push(entry.spec.clone());
        }
    }

    for spec in to_run {
        let inner = Arc::clone(inner);
        let context = context.clone();
        tokio::spawn(async move {
            run_job_once(&context, &spec).await;
            let mut running = inner.running_jobs.lock().unwrap_or_else(|e| e.into_inner());
            running.remove(&spec.job_id);
            drop(running);
            inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        });
    }
}

/// Execution wrapper around a single job invocation
///
/// Records a JobRun row and a job-scoped health row for every outcome. The
/// job's error never propagates past this boundary: one job's failure must
/// not halt or affect any other job's future executions.
///
/// The body runs on its own task so a panicking action unwinds there and
/// surfaces here as a failure outcome, keeping the caller's bookkeeping
/// intact.
pub async fn run_job_once(context: &JobContext, spec: &JobSpec) {
    let started_at = Utc::now();
    let start = std::time::Instant::now();
    debug!(job_id = %spec.job_id, "running job");

    let result = match tokio::spawn((spec.action)(context.clone())).await {
        Ok(result) => result,
        Err(join_error) => Err(anyhow::anyhow!("job body panicked: {join_error}")),
    };
    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
    let component = format!("job:{}", spec.job_id);

    match result {
        Ok(()) => {
            debug!(job_id = %spec.job_id, duration_ms, "job completed");
            if let Err(e) = context
                .database
                .record_job_run(&spec.job_id, JobRunStatus::Success, started_at, duration_ms, None)
                .await
            {
                error!(job_id = %spec.job_id, "failed to record job run: {e}");
            }
            if let Err(e) = context
                .database
                .record_health(&component, HealthStatus::Pass, Some(&format!("{duration_ms:.2}ms")))
                .await
            {
                error!(job_id = %spec.job_id, "failed to record job health: {e}");
            }
        }
        Err(job_error) => {
            error!(job_id = %spec.job_id, error = %job_error, "job failed");
            let message = job_error.to_string();
            if let Err(e) = context
                .database
                .record_job_run(
                    &spec.job_id,
                    JobRunStatus::Failure,
                    started_at,
                    duration_ms,
                    Some(&message),
                )
                .await
            {
                error!(job_id = %spec.job_id, "failed to record job run: {e}");
            }
            if let Err(e) = context
                .database
                .record_health(&component, HealthStatus::Fail, Some(&message))
                .await
            {
                error!(job_id = %spec.job_id, "failed to record job health: {e}");
            }
        }
    }
}

//! Single-slot job store with bounded history.
//!
//! The store owns at most one non-terminal job (`current`). Admission
//! ([`JobStore::try_start`]) is a single critical section: check the slot,
//! move the job to `Running`, publish it. Terminal transitions move the job
//! into a bounded FIFO history in the same critical section, so an observer
//! never sees a job in both places or in neither.
//!
//! All operations are synchronous and hold the lock only for in-memory work.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::job::{Job, JobStatus};
use crate::types::JobId;

/// Default number of terminal jobs retained.
pub const DEFAULT_MAX_HISTORY: usize = 100;

/// Default interval between history sweeps.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Default age after which terminal jobs are dropped from history.
pub const DEFAULT_MAX_JOB_AGE: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Default)]
struct StoreInner {
    /// The running job, if any.
    current: Option<Job>,
    /// Terminal jobs, oldest first.
    history: VecDeque<Job>,
}

/// Holds the current job and recent job history.
#[derive(Debug)]
pub struct JobStore {
    inner: Mutex<StoreInner>,
    max_history: usize,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore {
    /// Creates a store retaining [`DEFAULT_MAX_HISTORY`] terminal jobs.
    pub fn new() -> Self {
        Self::with_max_history(DEFAULT_MAX_HISTORY)
    }

    /// Creates a store retaining at most `max_history` terminal jobs.
    pub fn with_max_history(max_history: usize) -> Self {
        JobStore {
            inner: Mutex::new(StoreInner::default()),
            max_history,
        }
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Returns a snapshot of the current job.
    pub fn get_current(&self) -> Option<Job> {
        self.inner.lock().current.clone()
    }

    /// Looks a job up by id: the current job first, then history from most
    /// recent to oldest.
    pub fn get_by_id(&self, id: &JobId) -> Option<Job> {
        let inner = self.inner.lock();

        if let Some(current) = inner.current.as_ref().filter(|j| j.id() == id) {
            return Some(current.clone());
        }

        inner.history.iter().rev().find(|j| j.id() == id).cloned()
    }

    /// Returns the most recently finished job.
    pub fn latest_finished(&self) -> Option<Job> {
        self.inner.lock().history.back().cloned()
    }

    /// Returns a snapshot of history, oldest first.
    pub fn history(&self) -> Vec<Job> {
        self.inner.lock().history.iter().cloned().collect()
    }

    /// Admits `job` if no job is running.
    ///
    /// On success the job is moved to `Running` and becomes the current job.
    /// Returns false if another job holds the slot, or if `job` is not
    /// pending.
    pub fn try_start(&self, mut job: Job) -> bool {
        let mut inner = self.inner.lock();

        if let Some(current) = &inner.current
            && current.status() == JobStatus::Running
        {
            debug!(
                job_id = %job.id(),
                running = %current.id(),
                "Admission refused, job already running"
            );
            return false;
        }

        if let Err(e) = job.mark_running() {
            warn!(error = %e, "Refusing to start job");
            return false;
        }

        debug!(job_id = %job.id(), action = %job.action(), "Job started");
        inner.current = Some(job);
        true
    }

    /// Marks the current job completed and moves it to history.
    ///
    /// No-op (returns `None`) when there is no current job.
    pub fn complete_current(&self) -> Option<Job> {
        self.finish(None, |job| job.complete(Utc::now()))
    }

    /// Marks the current job failed with `error` and moves it to history.
    ///
    /// No-op (returns `None`) when there is no current job.
    pub fn fail_current(&self, error: impl Into<String>) -> Option<Job> {
        let error = error.into();
        self.finish(None, move |job| job.fail(error, Utc::now()))
    }

    /// [`complete_current`](Self::complete_current), but only if the current
    /// job is `id`.
    pub fn complete_job(&self, id: &JobId) -> Option<Job> {
        self.finish(Some(id), |job| job.complete(Utc::now()))
    }

    /// [`fail_current`](Self::fail_current), but only if the current job is
    /// `id`.
    pub fn fail_job(&self, id: &JobId, error: impl Into<String>) -> Option<Job> {
        let error = error.into();
        self.finish(Some(id), move |job| job.fail(error, Utc::now()))
    }

    fn finish<F>(&self, expected: Option<&JobId>, finish: F) -> Option<Job>
    where
        F: FnOnce(&mut Job) -> Result<(), super::JobError>,
    {
        let mut inner = self.inner.lock();
        if let Some(expected) = expected
            && inner.current.as_ref().is_none_or(|job| job.id() != expected)
        {
            warn!(job_id = %expected, "Job is not current, ignoring terminal transition");
            return None;
        }
        let mut job = inner.current.take()?;

        if let Err(e) = finish(&mut job) {
            // Only running jobs occupy the slot, so this means a bug elsewhere.
            warn!(error = %e, "Terminal transition rejected");
        }

        inner.history.push_back(job.clone());
        while inner.history.len() > self.max_history {
            inner.history.pop_front();
        }

        debug!(job_id = %job.id(), status = %job.status(), "Job finished");
        Some(job)
    }

    /// Removes every history entry that started more than `max_age` ago.
    ///
    /// Returns the number of jobs removed. The current job is never touched.
    pub fn cleanup_old(&self, max_age: Duration) -> usize {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(max_age)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);

        let mut inner = self.inner.lock();
        let before = inner.history.len();
        inner.history.retain(|job| job.start_time() >= cutoff);
        before - inner.history.len()
    }

    /// Spawns the periodic history sweep.
    ///
    /// Runs `cleanup_old(max_age)` every `interval` until `shutdown` is
    /// cancelled. The first sweep happens one interval after spawning.
    pub fn spawn_cleanup(
        self: &Arc<Self>,
        interval: Duration,
        max_age: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Job cleanup task stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = store.cleanup_old(max_age);
                        if removed > 0 {
                            info!(removed, "Removed old jobs from history");
                        }
                    }
                }
            }
        })
    }
}

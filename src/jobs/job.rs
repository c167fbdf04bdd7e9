//! The job entity and its lifecycle state machine.
//!
//! ```text
//! Pending ──mark_running──► Running ──complete──► Completed
//!                              │
//!                              └──────fail──────► Failed
//! ```
//!
//! Terminal jobs are immutable: every transition method rejects them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Action, JobId};

/// Observable status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Returns true for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from job state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// The requested transition is not allowed from the job's current status.
    #[error("job {id}: cannot transition from {from} to {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },
}

/// One admitted action attempt.
///
/// Fields are private so that status, `end_time` and `error` can only change
/// through the transition methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    id: JobId,
    action: Action,
    status: JobStatus,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    error: Option<String>,
}

impl Job {
    /// Creates a pending job stamped with the current time.
    pub fn new(id: JobId, action: Action) -> Self {
        Self::starting_at(id, action, Utc::now())
    }

    /// Creates a pending job with an explicit start time.
    pub fn starting_at(id: JobId, action: Action, start_time: DateTime<Utc>) -> Self {
        Job {
            id,
            action,
            status: JobStatus::Pending,
            start_time,
            end_time: None,
            error: None,
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Present iff the job is terminal.
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    /// Present iff the job failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Elapsed time from start to end, or to `now` while still in flight.
    pub fn duration(&self, now: DateTime<Utc>) -> chrono::Duration {
        let end = self.end_time.unwrap_or(now);
        (end - self.start_time).max(chrono::Duration::zero())
    }

    /// `Pending → Running`.
    pub fn mark_running(&mut self) -> Result<(), JobError> {
        self.transition(JobStatus::Pending, JobStatus::Running)
    }

    /// `Running → Completed`, stamping `end_time`.
    pub fn complete(&mut self, at: DateTime<Utc>) -> Result<(), JobError> {
        self.transition(JobStatus::Running, JobStatus::Completed)?;
        self.end_time = Some(self.clamp_end(at));
        Ok(())
    }

    /// `Running → Failed`, stamping `end_time` and recording the error.
    pub fn fail(&mut self, error: impl Into<String>, at: DateTime<Utc>) -> Result<(), JobError> {
        self.transition(JobStatus::Running, JobStatus::Failed)?;
        self.end_time = Some(self.clamp_end(at));
        self.error = Some(error.into());
        Ok(())
    }

    fn transition(&mut self, from: JobStatus, to: JobStatus) -> Result<(), JobError> {
        if self.status != from {
            return Err(JobError::InvalidTransition {
                id: self.id.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// The wall clock may step backwards; never record an end before the start.
    fn clamp_end(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        at.max(self.start_time)
    }
}

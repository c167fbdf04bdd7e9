//! Jobs: the lifecycle of one admitted action and the single-slot store
//! that tracks it.

pub mod job;
pub mod store;

pub use job::{Job, JobError, JobStatus};
pub use store::{
    DEFAULT_CLEANUP_INTERVAL, DEFAULT_MAX_HISTORY, DEFAULT_MAX_JOB_AGE, JobStore,
};

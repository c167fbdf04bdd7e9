//! Bounded worker pool for running admitted jobs off the request path.
//!
//! # Module Structure
//!
//! - [`task`]: the unit of work and the cancellation context it receives
//! - [`pool`]: the pool itself (submission, workers, shutdown)

mod pool;
mod task;

pub use pool::{
    DEFAULT_MAX_BACKLOG, DEFAULT_TASK_TIMEOUT, DEFAULT_WORKERS, PoolConfig, PoolError, WorkerPool,
};
pub use task::{Task, TaskContext, TaskFuture, panic_message};

//! Bounded worker pool.
//!
//! A fixed set of workers drains one bounded FIFO channel. Every task runs
//! with a [`TaskContext`] whose token is a child of the pool's root token and
//! is additionally cancelled when the per-task deadline passes.
//!
//! ```text
//!  submit ──try_send──┐
//!                     ▼
//!  submit_wait ──► [ bounded queue ] ──► worker 0 ─┐
//!                                   ├──► worker 1 ─┼─► catch_unwind(task(ctx))
//!                                   └──► worker N ─┘
//! ```
//!
//! # Shutdown
//!
//! `shutdown` drops the queue sender, so workers finish whatever is queued
//! and then exit. If they do not all exit within the timeout, the root token
//! is cancelled (reaching every in-flight task) and `ShutdownTimeout` is
//! returned. Tasks that ignore cancellation keep running; the pool never
//! aborts them.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::task::{Task, TaskContext, panic_message};

/// Default number of workers.
pub const DEFAULT_WORKERS: usize = 10;

/// Default queue capacity.
pub const DEFAULT_MAX_BACKLOG: usize = 100;

/// Default per-task deadline.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Errors returned by pool operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The queue has no free slot.
    #[error("worker pool queue is full")]
    QueueFull,

    /// The pool no longer accepts tasks.
    #[error("worker pool is shut down")]
    Shutdown,

    /// No queue slot became free within the wait timeout.
    #[error("timed out waiting for space in the worker pool queue")]
    Timeout,

    /// Workers did not drain within the shutdown timeout.
    #[error("timed out waiting for workers to finish")]
    ShutdownTimeout,
}

/// Worker pool sizing.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of workers (at least 1).
    pub workers: usize,

    /// Queue capacity (at least 1).
    pub max_backlog: usize,

    /// Deadline applied to every task's context.
    pub task_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            workers: DEFAULT_WORKERS,
            max_backlog: DEFAULT_MAX_BACKLOG,
            task_timeout: DEFAULT_TASK_TIMEOUT,
        }
    }
}

impl PoolConfig {
    /// Creates a configuration, clamping both sizes to at least 1.
    pub fn new(workers: usize, max_backlog: usize) -> Self {
        PoolConfig {
            workers: workers.max(1),
            max_backlog: max_backlog.max(1),
            ..Self::default()
        }
    }

    pub fn with_task_timeout(mut self, task_timeout: Duration) -> Self {
        self.task_timeout = task_timeout;
        self
    }
}

/// A fixed-size pool of async workers fed by a bounded queue.
#[derive(Debug)]
pub struct WorkerPool {
    /// Queue sender; `None` once shutdown has begun.
    sender: RwLock<Option<mpsc::Sender<Task>>>,

    /// Fired when shutdown begins, waking blocked `submit_wait` callers.
    closing: CancellationToken,

    /// Parent of every task context; fired only on shutdown timeout.
    root: CancellationToken,

    /// Worker join handles, taken by the first `shutdown` call.
    workers: Mutex<Vec<JoinHandle<()>>>,

    config: PoolConfig,
}

impl WorkerPool {
    /// Spawns the workers. Must be called from within a tokio runtime.
    pub fn new(config: PoolConfig) -> Self {
        let config = PoolConfig {
            workers: config.workers.max(1),
            max_backlog: config.max_backlog.max(1),
            task_timeout: config.task_timeout,
        };

        let (tx, rx) = mpsc::channel(config.max_backlog);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let root = CancellationToken::new();

        let workers = (0..config.workers)
            .map(|worker_id| {
                let rx = Arc::clone(&rx);
                let root = root.clone();
                let task_timeout = config.task_timeout;
                tokio::spawn(async move {
                    worker_loop(worker_id, rx, root, task_timeout).await;
                })
            })
            .collect();

        info!(
            workers = config.workers,
            max_backlog = config.max_backlog,
            "Worker pool started"
        );

        WorkerPool {
            sender: RwLock::new(Some(tx)),
            closing: CancellationToken::new(),
            root,
            workers: Mutex::new(workers),
            config,
        }
    }

    /// Enqueues a task without waiting.
    pub fn submit(&self, task: Task) -> Result<(), PoolError> {
        let sender = self.sender.read();
        let tx = sender.as_ref().ok_or(PoolError::Shutdown)?;

        tx.try_send(task).map_err(|e| match e {
            TrySendError::Full(_) => PoolError::QueueFull,
            TrySendError::Closed(_) => PoolError::Shutdown,
        })
    }

    /// Enqueues a task, waiting up to `timeout` for queue space.
    pub async fn submit_wait(&self, task: Task, timeout: Duration) -> Result<(), PoolError> {
        let tx = self
            .sender
            .read()
            .as_ref()
            .cloned()
            .ok_or(PoolError::Shutdown)?;

        tokio::select! {
            biased;
            _ = self.closing.cancelled() => Err(PoolError::Shutdown),
            sent = tokio::time::timeout(timeout, tx.send(task)) => match sent {
                Ok(Ok(())) => Ok(()),
                Ok(Err(_)) => Err(PoolError::Shutdown),
                Err(_) => Err(PoolError::Timeout),
            },
        }
    }

    /// Stops accepting tasks and waits for the workers to drain the queue.
    ///
    /// Idempotent: calls after the first return `Ok(())` immediately.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), PoolError> {
        let handles = {
            let mut sender = self.sender.write();
            if sender.take().is_none() {
                return Ok(());
            }
            self.closing.cancel();
            std::mem::take(&mut *self.workers.lock())
        };

        info!(?timeout, workers = handles.len(), "Shutting down worker pool");

        match tokio::time::timeout(timeout, futures::future::join_all(handles)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        error!(error = %e, "Worker exited abnormally");
                    }
                }
                info!("Worker pool stopped");
                Ok(())
            }
            Err(_) => {
                warn!("Worker pool did not drain in time, cancelling in-flight tasks");
                self.root.cancel();
                Err(PoolError::ShutdownTimeout)
            }
        }
    }

    /// Number of tasks waiting in the queue.
    pub fn size(&self) -> usize {
        self.sender
            .read()
            .as_ref()
            .map(|tx| tx.max_capacity() - tx.capacity())
            .unwrap_or(0)
    }

    /// Queue capacity.
    pub fn capacity(&self) -> usize {
        self.config.max_backlog
    }

    /// Number of workers.
    pub fn workers(&self) -> usize {
        self.config.workers
    }

    pub fn is_shutdown(&self) -> bool {
        self.sender.read().is_none()
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Task>>>,
    root: CancellationToken,
    task_timeout: Duration,
) {
    debug!(worker_id, "Worker started");

    loop {
        let next = rx.lock().await.recv().await;
        let Some(task) = next else {
            // Sender dropped and queue drained.
            break;
        };
        run_task(worker_id, task, &root, task_timeout).await;
    }

    debug!(worker_id, "Worker stopped");
}

/// Roughly 30 years; used when a deadline would overflow `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `now + timeout`, saturating at a far-future instant.
fn deadline_after(now: Instant, timeout: Duration) -> Instant {
    now.checked_add(timeout)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Runs one task to completion, cancelling its context at the deadline and
/// containing any panic.
///
/// The task is driven inside a `task` span carrying the worker id, so every
/// event it emits (including the panic hook's backtrace) names its worker.
async fn run_task(worker_id: usize, task: Task, root: &CancellationToken, task_timeout: Duration) {
    let name = task.name().to_string();
    let span = info_span!("task", worker_id, task = %name);
    let token = root.child_token();
    let deadline = deadline_after(Instant::now(), task_timeout);
    let ctx = TaskContext::new(worker_id, token.clone(), deadline);

    async move {
        debug!("Task started");

        let mut running = AssertUnwindSafe(task.into_future(ctx)).catch_unwind();
        let outcome = tokio::select! {
            outcome = &mut running => outcome,
            _ = tokio::time::sleep_until(deadline) => {
                warn!(?task_timeout, "Task deadline passed, cancelling its context");
                token.cancel();
                running.await
            }
        };

        match outcome {
            Ok(()) => debug!("Task finished"),
            Err(payload) => error!(
                panic = %panic_message(payload.as_ref()),
                "Task panicked, worker recovered"
            ),
        }
    }
    .instrument(span)
    .await
}

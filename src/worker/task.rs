//! Units of work submitted to the worker pool and the context they run with.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Boxed future produced by a [`Task`].
pub type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Cancellation context handed to every task.
///
/// The token is a child of the pool's root token, so it fires when the pool
/// gives up on a graceful shutdown *or* when the task's own deadline passes.
/// Tasks are expected to observe it; nothing forcibly stops a task that
/// ignores it.
#[derive(Debug, Clone)]
pub struct TaskContext {
    worker_id: usize,
    token: CancellationToken,
    deadline: Instant,
}

impl TaskContext {
    pub fn new(worker_id: usize, token: CancellationToken, deadline: Instant) -> Self {
        TaskContext {
            worker_id,
            token,
            deadline,
        }
    }

    /// A context that is only cancelled through `token`, with the given
    /// deadline. Used when running work outside the pool.
    pub fn detached(token: CancellationToken, timeout: std::time::Duration) -> Self {
        Self::new(0, token, Instant::now() + timeout)
    }

    /// Id of the worker running the task.
    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// Instant at which the pool cancels this context.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the context is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

/// A named, one-shot unit of work.
pub struct Task {
    name: String,
    run: Box<dyn FnOnce(TaskContext) -> TaskFuture + Send + 'static>,
}

impl Task {
    /// Wraps an async closure as a task.
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Task {
            name: name.into(),
            run: Box::new(move |ctx| Box::pin(f(ctx))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Consumes the task, producing the future to drive.
    pub fn into_future(self, ctx: TaskContext) -> TaskFuture {
        (self.run)(ctx)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Extracts a readable message from a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

//! Shared test fakes and arbitrary generators for property-based testing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

use crate::executor::{ActionError, ActionExecutor};
use crate::system::{
    CommandEnv, Distribution, PackageManager, SystemCommands, SystemError,
};
use crate::types::{Action, JobId, WebhookRequest};
use crate::worker::TaskContext;

// ─── Generators ───

pub fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![Just(Action::Reinit), Just(Action::Reboot), Just(Action::Update)]
}

pub fn arb_webhook_request() -> impl Strategy<Value = WebhookRequest> {
    (
        arb_action(),
        proptest::option::of("[a-z_]{1,20}"),
        1_600_000_000i64..1_900_000_000,
    )
        .prop_map(|(action, module, ts)| {
            let request = WebhookRequest::new(action.as_str(), ts);
            match module {
                Some(m) => request.with_module(m),
                None => request,
            }
        })
}

// ─── Fake system commands ───

/// One call recorded by [`FakeSystem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemCall {
    DetectDistribution,
    UpdateSystem {
        distribution: Distribution,
        env: CommandEnv,
    },
    RunCloudInit {
        module: Option<String>,
        env: CommandEnv,
    },
    Reboot,
}

/// Records calls instead of touching the host.
#[derive(Debug, Clone)]
pub struct FakeSystem {
    calls: Arc<Mutex<Vec<SystemCall>>>,
    distribution: Distribution,
    /// When set, commands wait for cancellation and return `Cancelled`.
    block: bool,
}

impl Default for FakeSystem {
    fn default() -> Self {
        FakeSystem {
            calls: Arc::new(Mutex::new(Vec::new())),
            distribution: Distribution::Supported {
                id: "debian".to_string(),
                package_manager: PackageManager::Apt,
            },
            block: false,
        }
    }
}

impl FakeSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_distribution(mut self, distribution: Distribution) -> Self {
        self.distribution = distribution;
        self
    }

    pub fn blocking(mut self) -> Self {
        self.block = true;
        self
    }

    pub fn calls(&self) -> Vec<SystemCall> {
        self.calls.lock().clone()
    }

    async fn command(&self, call: SystemCall, cancel: &CancellationToken) -> Result<(), SystemError> {
        let command = format!("{call:?}");
        self.calls.lock().push(call);
        if self.block {
            cancel.cancelled().await;
            return Err(SystemError::Cancelled { command });
        }
        Ok(())
    }
}

#[async_trait]
impl SystemCommands for FakeSystem {
    async fn detect_distribution(&self) -> Result<Distribution, SystemError> {
        self.calls.lock().push(SystemCall::DetectDistribution);
        Ok(self.distribution.clone())
    }

    async fn update_system(
        &self,
        distribution: &Distribution,
        env: &CommandEnv,
        cancel: &CancellationToken,
    ) -> Result<(), SystemError> {
        if distribution.package_manager().is_none() {
            return Err(SystemError::UnsupportedDistribution(
                distribution.id().to_string(),
            ));
        }
        let call = SystemCall::UpdateSystem {
            distribution: distribution.clone(),
            env: env.clone(),
        };
        self.command(call, cancel).await
    }

    async fn run_cloud_init(
        &self,
        module: Option<&str>,
        env: &CommandEnv,
        cancel: &CancellationToken,
    ) -> Result<(), SystemError> {
        let call = SystemCall::RunCloudInit {
            module: module.map(str::to_string),
            env: env.clone(),
        };
        self.command(call, cancel).await
    }

    async fn reboot(&self, cancel: &CancellationToken) -> Result<(), SystemError> {
        self.command(SystemCall::Reboot, cancel).await
    }
}

// ─── Fake action executor ───

/// What [`FakeExecutor`] does when invoked.
#[derive(Debug, Clone)]
pub enum FakeBehavior {
    Succeed,
    Fail(String),
    Panic(String),
    /// Wait until [`FakeExecutor::release`] (then succeed) or until the
    /// context is cancelled (then fail with `Cancelled`).
    Block,
}

/// Records every invocation as `(job_id, action)`.
#[derive(Debug)]
pub struct FakeExecutor {
    behavior: FakeBehavior,
    calls: Mutex<Vec<(JobId, String)>>,
    released: CancellationToken,
}

impl FakeExecutor {
    pub fn new(behavior: FakeBehavior) -> Arc<Self> {
        Arc::new(FakeExecutor {
            behavior,
            calls: Mutex::new(Vec::new()),
            released: CancellationToken::new(),
        })
    }

    pub fn succeeding() -> Arc<Self> {
        Self::new(FakeBehavior::Succeed)
    }

    pub fn blocking() -> Arc<Self> {
        Self::new(FakeBehavior::Block)
    }

    pub fn panicking(message: &str) -> Arc<Self> {
        Self::new(FakeBehavior::Panic(message.to_string()))
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Self::new(FakeBehavior::Fail(message.to_string()))
    }

    /// Unblocks every current and future `Block` invocation.
    pub fn release(&self) {
        self.released.cancel();
    }

    pub fn calls(&self) -> Vec<(JobId, String)> {
        self.calls.lock().clone()
    }

    /// Polls until at least `n` calls were recorded or `timeout` passes.
    pub async fn wait_for_calls(&self, n: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.calls.lock().len() >= n {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
}

#[async_trait]
impl ActionExecutor for FakeExecutor {
    async fn process_action(
        &self,
        request: &WebhookRequest,
        job_id: &JobId,
        ctx: &TaskContext,
    ) -> Result<(), ActionError> {
        self.calls
            .lock()
            .push((job_id.clone(), request.action.clone()));

        match &self.behavior {
            FakeBehavior::Succeed => Ok(()),
            FakeBehavior::Fail(message) => Err(ActionError::System(SystemError::CommandFailed {
                command: "fake".to_string(),
                status: Some(1),
                stderr: message.clone(),
            })),
            FakeBehavior::Panic(message) => panic!("{message}"),
            FakeBehavior::Block => {
                tokio::select! {
                    _ = self.released.cancelled() => Ok(()),
                    _ = ctx.cancelled() => Err(ActionError::Cancelled),
                }
            }
        }
    }
}

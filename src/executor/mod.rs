//! The action executor capability and its host-backed implementation.
//!
//! The webhook handler only knows [`ActionExecutor`]. A returned `Err`
//! fails the job; `Ok` completes it.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::system::{CommandEnv, SystemCommands, SystemError};
use crate::types::{Action, JobId, UnknownAction, WebhookRequest};
use crate::worker::TaskContext;

/// Why an action did not complete.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    UnknownAction(#[from] UnknownAction),

    /// A `config` key is not one of [`ALLOWED_ENV_KEYS`].
    #[error("config key {key:?} is not allowed")]
    InvalidConfig { key: String },

    /// The cloud-init module name is not a plain identifier.
    #[error("invalid cloud-init module name {0:?}")]
    InvalidModule(String),

    /// The task context was cancelled (pool shutdown or task deadline).
    #[error("action cancelled")]
    Cancelled,

    #[error(transparent)]
    System(SystemError),
}

impl From<SystemError> for ActionError {
    fn from(err: SystemError) -> Self {
        match err {
            SystemError::Cancelled { .. } => ActionError::Cancelled,
            other => ActionError::System(other),
        }
    }
}

/// Performs the privileged work for one admitted job.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn process_action(
        &self,
        request: &WebhookRequest,
        job_id: &JobId,
        ctx: &TaskContext,
    ) -> Result<(), ActionError>;
}

/// Environment variables a request's `config` may set on the spawned
/// commands. Proxy settings only; anything that steers program lookup,
/// dynamic linking or tool configuration stays with the service.
pub const ALLOWED_ENV_KEYS: &[&str] = &[
    "HTTP_PROXY",
    "HTTPS_PROXY",
    "FTP_PROXY",
    "ALL_PROXY",
    "NO_PROXY",
    "http_proxy",
    "https_proxy",
    "ftp_proxy",
    "all_proxy",
    "no_proxy",
];

/// Checks that `key` may be forwarded to a command.
pub fn is_allowed_env_key(key: &str) -> bool {
    ALLOWED_ENV_KEYS.contains(&key)
}

/// Converts a request's `config` map into command environment.
pub fn command_env(request: &WebhookRequest) -> Result<CommandEnv, ActionError> {
    let Some(config) = &request.config else {
        return Ok(CommandEnv::new());
    };

    config
        .iter()
        .map(|(key, value)| {
            if is_allowed_env_key(key) {
                Ok((key.clone(), value.clone()))
            } else {
                Err(ActionError::InvalidConfig { key: key.clone() })
            }
        })
        .collect()
}

/// Cloud-init module names are identifiers like `cc_users_groups` or
/// `write-files`; anything else (including a leading `-`) is refused.
fn validate_module(module: &str) -> Result<(), ActionError> {
    let valid = !module.is_empty()
        && !module.starts_with('-')
        && module
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ActionError::InvalidModule(module.to_string()))
    }
}

/// [`ActionExecutor`] that maps each [`Action`] onto [`SystemCommands`].
#[derive(Debug, Clone)]
pub struct SystemActionExecutor<S> {
    system: S,
}

impl<S: SystemCommands> SystemActionExecutor<S> {
    pub fn new(system: S) -> Self {
        SystemActionExecutor { system }
    }

    pub fn system(&self) -> &S {
        &self.system
    }
}

#[async_trait]
impl<S: SystemCommands> ActionExecutor for SystemActionExecutor<S> {
    #[instrument(skip_all, fields(job_id = %job_id, action = %request.action))]
    async fn process_action(
        &self,
        request: &WebhookRequest,
        job_id: &JobId,
        ctx: &TaskContext,
    ) -> Result<(), ActionError> {
        if ctx.is_cancelled() {
            warn!("Context cancelled before action started");
            return Err(ActionError::Cancelled);
        }

        let action = request.parsed_action()?;
        let env = command_env(request)?;
        let cancel = ctx.token();

        info!(worker_id = ctx.worker_id(), "Executing action");

        match action {
            Action::Reinit => {
                let module = request.module.as_deref();
                if let Some(module) = module {
                    validate_module(module)?;
                }
                self.system.run_cloud_init(module, &env, cancel).await?;
            }
            Action::Update => {
                let distribution = self.system.detect_distribution().await?;
                info!(%distribution, "Updating system packages");
                self.system.update_system(&distribution, &env, cancel).await?;
            }
            Action::Reboot => {
                self.system.reboot(cancel).await?;
            }
        }

        info!("Action finished");
        Ok(())
    }
}

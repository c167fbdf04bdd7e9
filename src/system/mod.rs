//! Privileged host operations.
//!
//! The rest of the crate depends only on the [`SystemCommands`] capability.
//! [`HostSystem`] is the production implementation; tests substitute a fake.
//!
//! # Module Structure
//!
//! - [`distribution`]: os-release parsing and package manager selection
//! - [`plan`]: pure functions producing [`CommandSpec`]s
//! - [`host`]: runs those specs with `tokio::process`

pub mod distribution;
pub mod host;
pub mod plan;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use distribution::{Distribution, OsRelease, PackageManager, parse_os_release};
pub use host::{HostSystem, run_command};
pub use plan::{CommandEnv, CommandSpec, cloud_init_plan, reboot_plan, update_plan};

/// Errors from host operations.
#[derive(Debug, Error)]
pub enum SystemError {
    /// No package manager is known for this distribution.
    #[error("unsupported distribution: {0}")]
    UnsupportedDistribution(String),

    /// The os-release file could not be read.
    #[error("failed to read {path}: {source}")]
    OsRelease {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The process could not be started.
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The process exited unsuccessfully.
    #[error("command failed: {command} (exit status {status:?})\nstderr: {stderr}")]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    /// Cancellation fired while the process was running; it was killed.
    #[error("command cancelled: {command}")]
    Cancelled { command: String },
}

/// Host operations the action executor needs.
///
/// Every long-running operation takes a cancellation token and must stop
/// (killing any child process) when it fires.
#[async_trait]
pub trait SystemCommands: Send + Sync {
    async fn detect_distribution(&self) -> Result<Distribution, SystemError>;

    async fn update_system(
        &self,
        distribution: &Distribution,
        env: &CommandEnv,
        cancel: &CancellationToken,
    ) -> Result<(), SystemError>;

    /// Re-runs one cloud-init module, or all of cloud-init when `module` is
    /// `None`.
    async fn run_cloud_init(
        &self,
        module: Option<&str>,
        env: &CommandEnv,
        cancel: &CancellationToken,
    ) -> Result<(), SystemError>;

    async fn reboot(&self, cancel: &CancellationToken) -> Result<(), SystemError>;
}

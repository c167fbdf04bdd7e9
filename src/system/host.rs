//! Runs planned commands on the real host.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::distribution::{Distribution, OS_RELEASE_PATH, parse_os_release};
use super::plan::{CommandEnv, CommandSpec, REBOOT_MESSAGE, cloud_init_plan, reboot_plan, update_plan};
use super::{SystemCommands, SystemError};

/// Where dnf is looked for when deciding between dnf and yum.
const DNF_PATHS: [&str; 2] = ["/usr/bin/dnf", "/bin/dnf"];

/// [`SystemCommands`] backed by `tokio::process`.
#[derive(Debug, Clone)]
pub struct HostSystem {
    os_release_path: PathBuf,
    reboot_message: String,
}

impl Default for HostSystem {
    fn default() -> Self {
        HostSystem {
            os_release_path: PathBuf::from(OS_RELEASE_PATH),
            reboot_message: REBOOT_MESSAGE.to_string(),
        }
    }
}

impl HostSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the distribution from a different os-release file.
    pub fn with_os_release(mut self, path: impl Into<PathBuf>) -> Self {
        self.os_release_path = path.into();
        self
    }

    pub fn with_reboot_message(mut self, message: impl Into<String>) -> Self {
        self.reboot_message = message.into();
        self
    }

    async fn run_all(
        &self,
        plan: &[CommandSpec],
        cancel: &CancellationToken,
    ) -> Result<(), SystemError> {
        for spec in plan {
            run_command(spec, cancel).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl SystemCommands for HostSystem {
    async fn detect_distribution(&self) -> Result<Distribution, SystemError> {
        let contents = tokio::fs::read_to_string(&self.os_release_path)
            .await
            .map_err(|source| SystemError::OsRelease {
                path: self.os_release_path.clone(),
                source,
            })?;
        let release = parse_os_release(&contents);
        let dnf_available = DNF_PATHS.iter().any(|p| Path::new(p).exists());
        let distribution = Distribution::from_os_release(&release, dnf_available);
        debug!(%distribution, "Detected distribution");
        Ok(distribution)
    }

    async fn update_system(
        &self,
        distribution: &Distribution,
        env: &CommandEnv,
        cancel: &CancellationToken,
    ) -> Result<(), SystemError> {
        let package_manager = distribution
            .package_manager()
            .ok_or_else(|| SystemError::UnsupportedDistribution(distribution.id().to_string()))?;
        self.run_all(&update_plan(package_manager, env), cancel).await
    }

    async fn run_cloud_init(
        &self,
        module: Option<&str>,
        env: &CommandEnv,
        cancel: &CancellationToken,
    ) -> Result<(), SystemError> {
        self.run_all(&cloud_init_plan(module, env), cancel).await
    }

    async fn reboot(&self, cancel: &CancellationToken) -> Result<(), SystemError> {
        run_command(&reboot_plan(&self.reboot_message), cancel).await
    }
}

/// Runs one command to completion.
///
/// Stdin is closed and output captured. If `cancel` fires first the child is
/// killed (the future owning it is dropped with `kill_on_drop`).
#[instrument(skip_all, fields(command = %spec))]
pub async fn run_command(spec: &CommandSpec, cancel: &CancellationToken) -> Result<(), SystemError> {
    let mut cmd = tokio::process::Command::new(&spec.program);
    cmd.args(&spec.args)
        .envs(&spec.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    info!("Running command");

    let output = tokio::select! {
        _ = cancel.cancelled() => {
            return Err(SystemError::Cancelled { command: spec.to_string() });
        }
        output = cmd.output() => output.map_err(|source| SystemError::Spawn {
            command: spec.to_string(),
            source,
        })?,
    };

    if output.status.success() {
        debug!("Command succeeded");
        Ok(())
    } else {
        Err(SystemError::CommandFailed {
            command: spec.to_string(),
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

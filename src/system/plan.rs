//! Host commands described as data.
//!
//! Planning is pure: these functions only decide *what* to run. The
//! [`HostSystem`](super::HostSystem) interpreter runs the resulting
//! [`CommandSpec`]s.

use std::collections::BTreeMap;
use std::fmt;

use super::distribution::PackageManager;

/// Extra environment forwarded to spawned commands.
pub type CommandEnv = BTreeMap<String, String>;

/// Default broadcast message attached to a scheduled reboot.
pub const REBOOT_MESSAGE: &str = "cloud-update: rebooting at operator request";

/// One process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: CommandEnv,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
            env: CommandEnv::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Adds caller-supplied variables. Variables already set by the plan
    /// take precedence.
    pub fn with_env(mut self, env: &CommandEnv) -> Self {
        for (key, value) in env {
            self.env.entry(key.clone()).or_insert_with(|| value.clone());
        }
        self
    }

    pub fn env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Commands that bring all installed packages up to date.
pub fn update_plan(package_manager: PackageManager, env: &CommandEnv) -> Vec<CommandSpec> {
    let plan: Vec<CommandSpec> = match package_manager {
        PackageManager::Apt => vec![
            CommandSpec::new("apt-get").args(["update"]),
            CommandSpec::new("apt-get").args(["-y", "upgrade"]),
        ]
        .into_iter()
        .map(|c| c.env_var("DEBIAN_FRONTEND", "noninteractive"))
        .collect(),
        PackageManager::Dnf => vec![CommandSpec::new("dnf").args(["-y", "upgrade"])],
        PackageManager::Yum => vec![CommandSpec::new("yum").args(["-y", "update"])],
        PackageManager::Pacman => vec![CommandSpec::new("pacman").args(["-Syu", "--noconfirm"])],
        PackageManager::Zypper => {
            vec![CommandSpec::new("zypper").args(["--non-interactive", "update"])]
        }
        PackageManager::Apk => vec![
            CommandSpec::new("apk").args(["update"]),
            CommandSpec::new("apk").args(["upgrade"]),
        ],
    };

    plan.into_iter().map(|c| c.with_env(env)).collect()
}

/// Commands that re-run cloud-init: a single module when one is named,
/// otherwise a clean full re-initialisation.
pub fn cloud_init_plan(module: Option<&str>, env: &CommandEnv) -> Vec<CommandSpec> {
    let plan = match module {
        Some(module) => vec![
            CommandSpec::new("cloud-init").args(["single", "--name", module, "--frequency", "always"]),
        ],
        None => vec![
            CommandSpec::new("cloud-init").args(["clean", "--logs"]),
            CommandSpec::new("cloud-init").args(["init"]),
        ],
    };

    plan.into_iter().map(|c| c.with_env(env)).collect()
}

/// Schedules a reboot one minute out.
pub fn reboot_plan(message: &str) -> CommandSpec {
    CommandSpec::new("shutdown").args(["-r", "+1", message])
}

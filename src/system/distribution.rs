//! Host distribution detection from `/etc/os-release`.

use std::fmt;

/// Standard location of the os-release file.
pub const OS_RELEASE_PATH: &str = "/etc/os-release";

/// The fields of os-release that matter for picking a package manager.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsRelease {
    /// `ID`, lowercased. Empty when absent.
    pub id: String,
    /// `ID_LIKE`, split on whitespace and lowercased.
    pub id_like: Vec<String>,
    pub pretty_name: Option<String>,
}

/// Parses os-release `KEY=value` lines. Unknown keys, comments and
/// malformed lines are ignored.
pub fn parse_os_release(contents: &str) -> OsRelease {
    let mut release = OsRelease::default();

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = unquote(value.trim());

        match key.trim() {
            "ID" => release.id = value.to_ascii_lowercase(),
            "ID_LIKE" => {
                release.id_like = value
                    .split_whitespace()
                    .map(str::to_ascii_lowercase)
                    .collect();
            }
            "PRETTY_NAME" => release.pretty_name = Some(value.to_string()),
            _ => {}
        }
    }

    release
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// Package manager used to update the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageManager {
    Apt,
    Dnf,
    Yum,
    Pacman,
    Zypper,
    Apk,
}

impl PackageManager {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageManager::Apt => "apt",
            PackageManager::Dnf => "dnf",
            PackageManager::Yum => "yum",
            PackageManager::Pacman => "pacman",
            PackageManager::Zypper => "zypper",
            PackageManager::Apk => "apk",
        }
    }

    /// Family for a single os-release identifier. Red Hat family ids map to
    /// `Dnf`; the yum fallback is decided by [`Distribution::from_os_release`].
    fn for_id(id: &str) -> Option<Self> {
        match id {
            "debian" | "ubuntu" | "raspbian" | "linuxmint" | "pop" | "elementary" => {
                Some(PackageManager::Apt)
            }
            "fedora" | "rhel" | "centos" | "rocky" | "almalinux" | "amzn" | "ol" => {
                Some(PackageManager::Dnf)
            }
            "arch" | "archarm" | "manjaro" | "endeavouros" => Some(PackageManager::Pacman),
            "suse" | "opensuse" | "opensuse-leap" | "opensuse-tumbleweed" | "sles" => {
                Some(PackageManager::Zypper)
            }
            "alpine" => Some(PackageManager::Apk),
            _ => None,
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The detected host distribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Distribution {
    /// A distribution whose package manager is known.
    Supported {
        id: String,
        package_manager: PackageManager,
    },
    /// Anything else, carrying the os-release `ID` (or `"unknown"`).
    Unknown(String),
}

impl Distribution {
    /// Maps `ID`, then each `ID_LIKE` entry, to a package manager.
    /// `dnf_available` selects between dnf and yum on Red Hat family hosts.
    pub fn from_os_release(release: &OsRelease, dnf_available: bool) -> Self {
        let id = if release.id.is_empty() {
            "unknown".to_string()
        } else {
            release.id.clone()
        };

        let family = std::iter::once(release.id.as_str())
            .chain(release.id_like.iter().map(String::as_str))
            .find_map(PackageManager::for_id);

        match family {
            Some(PackageManager::Dnf) if !dnf_available => Distribution::Supported {
                id,
                package_manager: PackageManager::Yum,
            },
            Some(package_manager) => Distribution::Supported {
                id,
                package_manager,
            },
            None => Distribution::Unknown(id),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Distribution::Supported { id, .. } | Distribution::Unknown(id) => id,
        }
    }

    pub fn package_manager(&self) -> Option<PackageManager> {
        match self {
            Distribution::Supported {
                package_manager, ..
            } => Some(*package_manager),
            Distribution::Unknown(_) => None,
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distribution::Supported {
                id,
                package_manager,
            } => write!(f, "{id} ({package_manager})"),
            Distribution::Unknown(id) => write!(f, "{id} (unsupported)"),
        }
    }
}

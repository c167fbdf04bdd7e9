//! Recognized host-maintenance actions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A privileged host operation that a webhook may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Re-run cloud-init (optionally a single module).
    Reinit,
    /// Schedule a reboot of the host.
    Reboot,
    /// Update system packages with the distribution's package manager.
    Update,
}

/// The action tag was not one of the recognized set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid action: {0}")]
pub struct UnknownAction(pub String);

impl Action {
    /// Every recognized action, in wire-tag order.
    pub const ALL: [Action; 3] = [Action::Reinit, Action::Reboot, Action::Update];

    /// Returns the wire tag for this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Reinit => "reinit",
            Action::Reboot => "reboot",
            Action::Update => "update",
        }
    }
}

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

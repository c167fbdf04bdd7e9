//! The webhook request body.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::action::{Action, UnknownAction};

/// A signed request to run an action, as sent by the orchestrator.
///
/// `action` is kept as the raw wire string: validating it against the
/// recognized set is a separate pipeline step that runs after the replay
/// and signature checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookRequest {
    pub action: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<HashMap<String, String>>,

    /// Seconds since the Unix epoch at which the request was signed.
    pub timestamp: i64,
}

impl WebhookRequest {
    pub fn new(action: impl Into<String>, timestamp: i64) -> Self {
        WebhookRequest {
            action: action.into(),
            module: None,
            config: None,
            timestamp,
        }
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn with_config(mut self, config: HashMap<String, String>) -> Self {
        self.config = Some(config);
        self
    }

    /// Parses the action tag.
    pub fn parsed_action(&self) -> Result<Action, UnknownAction> {
        self.action.parse()
    }
}

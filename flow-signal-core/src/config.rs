//! Signal dispatch settings
//!
//! Loaded from the engine's YAML configuration. Every field has a default so
//! an empty document yields the standard behavior.

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalSettings {
    /// Skip subscriptions whose signal already fired in the current unit of work.
    /// Firings are recorded either way.
    pub deduplicate: bool,

    /// Reject subscriptions whose scope configuration is unreadable or names an
    /// unknown scope, instead of treating them as global.
    pub strict_scope_configuration: bool,
}

impl Default for SignalSettings {
    fn default() -> Self {
        Self {
            deduplicate: true,
            strict_scope_configuration: false,
        }
    }
}

impl SignalSettings {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, SettingsError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }
}

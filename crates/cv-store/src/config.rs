//! Runtime settings, read from `config.toml` in the data directory.
//! A missing or unreadable file falls back to defaults.

use std::path::Path;
use std::time::Duration;

use cv_core::{DEFAULT_SETTLE_DELAY_MS, EMPTY_PLACEHOLDER};
use serde::Deserialize;

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Wait between a trigger and the recompute it causes.
    pub settle_delay_ms: u64,
    /// Shown instead of the variable table while nothing is set.
    pub empty_placeholder: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            empty_placeholder: EMPTY_PLACEHOLDER.to_string(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(settings) => {
                    tracing::info!("loaded config from {}", path.display());
                    settings
                }
                Err(e) => {
                    tracing::warn!("failed to parse {}: {e}; using defaults", path.display());
                    Self::default()
                }
            },
            Err(_) => {
                tracing::debug!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn load_from_dir(base_dir: &Path) -> Self {
        Self::load(&base_dir.join(CONFIG_FILE))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

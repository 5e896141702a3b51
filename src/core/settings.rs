//! Agent settings - Built-in defaults with an optional JSON override file

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::guard::DEFAULT_INSTANCE_NAME;
use super::profile::AttributeProfile;

/// Default seconds between scans
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 30;

/// Default process name prefix
pub const DEFAULT_PROCESS_PREFIX: &str = "ace";

/// Agent settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds between scans
    pub check_interval_secs: u64,
    /// Case-insensitive process name prefix
    pub process_prefix: String,
    /// Name of the system-wide single-instance lock
    pub instance_name: String,
    /// Demotions applied to every matched process
    pub profile: AttributeProfile,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            process_prefix: DEFAULT_PROCESS_PREFIX.to_string(),
            instance_name: DEFAULT_INSTANCE_NAME.to_string(),
            profile: AttributeProfile::default(),
        }
    }
}

impl Settings {
    /// Default settings file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("AceThrottle").join("settings.json"))
    }

    /// Load settings from the default location, falling back to defaults
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_or_default(&path),
            None => Self::default(),
        }
    }

    /// Load `path` if it exists. Unreadable or malformed files yield defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            debug!("No settings file at {:?}, using defaults", path);
            return Self::default();
        }

        match Self::load_from(path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring settings file {:?}: {:#}", path, e);
                Self::default()
            }
        }
    }

    /// Read and validate a settings file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut settings: Settings =
            serde_json::from_str(&contents).context("Failed to parse settings")?;
        settings.validate();
        Ok(settings)
    }

    /// Validate settings and fix any invalid values
    pub fn validate(&mut self) {
        self.check_interval_secs = self.check_interval_secs.max(1);
        if self.process_prefix.trim().is_empty() {
            self.process_prefix = DEFAULT_PROCESS_PREFIX.to_string();
        }
        if self.instance_name.is_empty() {
            self.instance_name = DEFAULT_INSTANCE_NAME.to_string();
        }
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

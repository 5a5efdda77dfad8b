// SPDX-License-Identifier: GPL-3.0-only

//! Persisted capture preferences
//!
//! A small JSON file in the user config directory carries the settings that
//! survive restarts: the default camera and the widescreen/HEVC preferences.
//! Everything else (run intents, target format) is per-call state owned by
//! the session layer.

use crate::errors::{CaptureError, CaptureResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const CONFIG_DIR: &str = "capture-core";
const CONFIG_FILE: &str = "config.json";

/// Persisted capture preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Unique id of the user's default camera, if one was ever chosen
    pub default_device_id: Option<String>,
    /// Prefer 16:9 capture bands when the budget allows
    pub prefer_widescreen: bool,
    /// Let local/remote orientation agreement override the widescreen
    /// preference (always true on handheld devices; desktop hosts may pin it)
    pub auto_adjust_widescreen: bool,
    /// Allow HEVC encode when a backend supports it
    pub enable_hevc: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            default_device_id: None,
            prefer_widescreen: true,
            auto_adjust_widescreen: true,
            enable_hevc: false,
        }
    }
}

impl CaptureConfig {
    fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load preferences, falling back to defaults on any failure
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            return Self::default();
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    debug!(path = ?path, error = %e, "Invalid capture config, using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Persist preferences to the user config directory
    pub fn save(&self) -> CaptureResult<()> {
        let path = Self::path()
            .ok_or_else(|| CaptureError::Config("No config directory available".to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| CaptureError::Config(e.to_string()))?;
        std::fs::write(&path, contents)?;

        debug!(path = ?path, "Saved capture config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = CaptureConfig::default();
        assert!(config.prefer_widescreen);
        assert!(config.auto_adjust_widescreen);
        assert!(!config.enable_hevc);
        assert!(config.default_device_id.is_none());
    }

    #[test]
    fn round_trips_through_json() {
        let mut config = CaptureConfig::default();
        config.default_device_id = Some("cam-1".to_string());
        config.enable_hevc = true;

        let json = serde_json::to_string(&config).unwrap();
        let parsed: CaptureConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}

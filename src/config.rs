// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::{LensFacing, ResolutionHint};
use crate::constants::{app_info, gesture};
use crate::errors::{MediaError, MediaResult};
use crate::permission::{Capability, Justifications};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the persisted configuration
pub const CONFIG_FILE: &str = "config.json";

/// Flow configuration
///
/// Missing fields take their default when loading, so older files keep
/// working as fields are added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Text shown when asking for each capability
    pub justifications: Justifications,
    /// Capabilities the flow needs before the camera opens
    pub required_capabilities: Vec<Capability>,
    /// Pinch distance per unit of zoom
    pub zoom_sensitivity: f32,
    /// Press-and-hold countdown cutoff
    pub capture_cutoff_ms: u64,
    /// Countdown progress cadence
    pub progress_interval_ms: u64,
    /// Hold time before a press starts recording
    pub long_press_ms: u64,
    /// Lens opened when the flow reaches the camera
    pub default_lens: LensFacing,
    /// Requested capture resolution
    pub resolution_hint: ResolutionHint,
    /// Where captured media is written (picture directory when unset)
    pub media_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            justifications: Justifications::default(),
            required_capabilities: Capability::ALL.to_vec(),
            zoom_sensitivity: gesture::ZOOM_SENSITIVITY,
            capture_cutoff_ms: gesture::CAPTURE_CUTOFF_MS,
            progress_interval_ms: gesture::PROGRESS_INTERVAL_MS,
            long_press_ms: gesture::LONG_PRESS_MS,
            default_lens: LensFacing::default(),
            resolution_hint: ResolutionHint::default(),
            media_dir: None,
        }
    }
}

impl Config {
    /// Default location: `<config dir>/media-selector/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(app_info::APP_NAME).join(CONFIG_FILE))
    }

    /// Load from the default location, falling back to defaults when absent
    pub fn load() -> MediaResult<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                debug!("No config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load and validate a config file
    pub fn load_from(path: &Path) -> MediaResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| MediaError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Write the config as pretty JSON, creating parent directories
    pub fn save_to(&self, path: &Path) -> MediaResult<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), "Saved config");
        Ok(())
    }

    pub fn validate(&self) -> MediaResult<()> {
        if !(self.zoom_sensitivity.is_finite() && self.zoom_sensitivity > 0.0) {
            return Err(MediaError::Config(format!(
                "zoom_sensitivity must be positive, got {}",
                self.zoom_sensitivity
            )));
        }
        if self.progress_interval_ms == 0 {
            return Err(MediaError::Config(
                "progress_interval_ms must be positive".to_string(),
            ));
        }
        if self.capture_cutoff_ms == 0 {
            return Err(MediaError::Config(
                "capture_cutoff_ms must be positive".to_string(),
            ));
        }
        if self.long_press_ms >= self.capture_cutoff_ms {
            return Err(MediaError::Config(format!(
                "long_press_ms ({}) must be shorter than capture_cutoff_ms ({})",
                self.long_press_ms, self.capture_cutoff_ms
            )));
        }
        if self.resolution_hint.width == 0 || self.resolution_hint.height == 0 {
            return Err(MediaError::Config(format!(
                "resolution_hint must be non-zero, got {}",
                self.resolution_hint
            )));
        }
        Ok(())
    }

    /// Effective media directory
    pub fn media_directory(&self) -> PathBuf {
        self.media_dir
            .clone()
            .unwrap_or_else(crate::storage::default_media_directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.required_capabilities, Capability::ALL.to_vec());
        assert_eq!(config.zoom_sensitivity, 200.0);
    }

    #[test]
    fn test_long_press_must_precede_cutoff() {
        let config = Config {
            long_press_ms: 1000,
            capture_cutoff_ms: 1000,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(MediaError::Config(_))));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"zoom_sensitivity": 50.0}"#).unwrap();
        assert_eq!(config.zoom_sensitivity, 50.0);
        assert_eq!(config.capture_cutoff_ms, 60_000);
        assert_eq!(config.default_lens, LensFacing::Back);
    }
}

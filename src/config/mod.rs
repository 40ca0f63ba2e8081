//! Configuration file support for stitchshot.
//!
//! Settings are loaded from `~/.config/stitchshot/config.toml`. They cover
//! window backend selection, scrolling capture pacing and where finished
//! screenshots go.
//!
//! If no config file exists, sensible defaults are used automatically.

pub mod enums;
pub mod types;

pub use enums::{OutputDestination, WindowCaptureMode};
pub use types::{CaptureConfig, OutputConfig, ScrollConfig};

use anyhow::{Context, Result};
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure containing all user settings.
///
/// # Example TOML
/// ```toml
/// [capture]
/// window_mode = "auto"
/// black_trigger_ratio = 0.01
///
/// [scroll]
/// max_steps = 100
/// step_settle_ms = 150
///
/// [output]
/// save_directory = "~/Pictures/Stitchshot"
/// destination = "clipboard-and-file"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, JsonSchema)]
pub struct Config {
    /// Window capture and backend selection settings
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Scrolling capture settings
    #[serde(default)]
    pub scroll: ScrollConfig,

    /// Output location and delivery settings
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Validates and clamps all configuration values to acceptable ranges.
    ///
    /// Invalid values are clamped to the nearest valid value and a warning is logged.
    ///
    /// Validated ranges:
    /// - `black_trigger_ratio`, `black_different_size_ratio`: 0.0 - 1.0
    /// - `activation_settle_ms`, `step_settle_ms`, `focus_settle_ms`: 0 - 2000
    /// - `max_steps`: 1 - 1000
    /// - `stall_limit`: 1 - 10
    /// - `min_overlap`: at least 1
    pub fn validate_and_clamp(&mut self) {
        if !(0.0..=1.0).contains(&self.capture.black_trigger_ratio) {
            log::warn!(
                "Invalid black_trigger_ratio {:.3}, clamping to 0.0-1.0 range",
                self.capture.black_trigger_ratio
            );
            self.capture.black_trigger_ratio = clamp_ratio(self.capture.black_trigger_ratio);
        }

        if !(0.0..=1.0).contains(&self.capture.black_different_size_ratio) {
            log::warn!(
                "Invalid black_different_size_ratio {:.3}, clamping to 0.0-1.0 range",
                self.capture.black_different_size_ratio
            );
            self.capture.black_different_size_ratio =
                clamp_ratio(self.capture.black_different_size_ratio);
        }

        if self.capture.activation_settle_ms > 2000 {
            log::warn!(
                "Invalid activation_settle_ms {}, clamping to 0-2000 range",
                self.capture.activation_settle_ms
            );
            self.capture.activation_settle_ms = 2000;
        }

        if !(1..=1000).contains(&self.scroll.max_steps) {
            log::warn!(
                "Invalid max_steps {}, clamping to 1-1000 range",
                self.scroll.max_steps
            );
            self.scroll.max_steps = self.scroll.max_steps.clamp(1, 1000);
        }

        if !(1..=10).contains(&self.scroll.stall_limit) {
            log::warn!(
                "Invalid stall_limit {}, clamping to 1-10 range",
                self.scroll.stall_limit
            );
            self.scroll.stall_limit = self.scroll.stall_limit.clamp(1, 10);
        }

        if self.scroll.step_settle_ms > 2000 {
            log::warn!(
                "Invalid step_settle_ms {}, clamping to 0-2000 range",
                self.scroll.step_settle_ms
            );
            self.scroll.step_settle_ms = 2000;
        }

        if self.scroll.focus_settle_ms > 2000 {
            log::warn!(
                "Invalid focus_settle_ms {}, clamping to 0-2000 range",
                self.scroll.focus_settle_ms
            );
            self.scroll.focus_settle_ms = 2000;
        }

        if self.scroll.min_overlap == 0 {
            log::warn!("Invalid min_overlap 0, using 1");
            self.scroll.min_overlap = 1;
        }

        if self.output.filename_template.trim().is_empty() {
            log::warn!("Empty filename_template, falling back to default");
            self.output.filename_template = OutputConfig::default().filename_template;
        }
    }

    /// Returns the path to the configuration file.
    ///
    /// # Errors
    /// Returns an error if the config directory cannot be determined (e.g., HOME not set).
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join("stitchshot");

        Ok(config_dir.join("config.toml"))
    }

    /// Loads configuration from the default location, or returns defaults if not found.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    /// Loads configuration from `config_path`, falling back to defaults when it is missing.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            info!("Config file not found, using defaults");
            debug!("Expected config at: {}", config_path.display());
            return Ok(Self::default());
        }

        let config_str = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config from {}", config_path.display()))?;

        config.validate_and_clamp();

        info!("Loaded config from {}", config_path.display());
        debug!("Config: {:?}", config);

        Ok(config)
    }

    /// Saves the current configuration to the default location.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let config_str = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, config_str)
            .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

        info!("Saved config to {}", config_path.display());
        Ok(())
    }

    /// Writes the documented example config to the user's config directory.
    ///
    /// # Errors
    /// Returns an error if a config file already exists or cannot be written.
    pub fn create_default_file() -> Result<PathBuf> {
        let config_path = Self::get_config_path()?;

        if config_path.exists() {
            return Err(anyhow::anyhow!(
                "Config file already exists at {}",
                config_path.display()
            ));
        }

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let default_config = include_str!("../../config.example.toml");
        fs::write(&config_path, default_config)?;

        info!("Created default config at {}", config_path.display());
        Ok(config_path)
    }

    /// JSON schema describing the config file.
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(Config)
    }
}

fn clamp_ratio(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.capture.window_mode, WindowCaptureMode::Auto);
        assert_eq!(config.scroll.stall_limit, 2);
        assert_eq!(config.output.destination, OutputDestination::File);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[capture]\nwindow_mode = \"direct-copy\"\n\n[output]\ndestination = \"clipboard\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.capture.window_mode, WindowCaptureMode::DirectCopyForced);
        assert_eq!(config.output.destination, OutputDestination::Clipboard);
        assert_eq!(config.scroll.max_steps, 100);
        assert!((config.capture.black_trigger_ratio - 0.01).abs() < f64::EPSILON);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[capture]\nblack_trigger_ratio = 3.5\nactivation_settle_ms = 9000\n\n\
             [scroll]\nmax_steps = 0\nstall_limit = 50\nmin_overlap = 0\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.capture.black_trigger_ratio, 1.0);
        assert_eq!(config.capture.activation_settle_ms, 2000);
        assert_eq!(config.scroll.max_steps, 1);
        assert_eq!(config.scroll.stall_limit, 10);
        assert_eq!(config.scroll.min_overlap, 1);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[capture\nwindow_mode = ").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn example_config_parses() {
        let config: Config = toml::from_str(include_str!("../../config.example.toml")).unwrap();
        assert_eq!(config.capture.window_mode, WindowCaptureMode::Auto);
    }

    #[test]
    fn schema_lists_sections() {
        let schema = serde_json::to_value(Config::json_schema()).unwrap();
        let properties = schema.get("properties").unwrap();
        assert!(properties.get("capture").is_some());
        assert!(properties.get("scroll").is_some());
        assert!(properties.get("output").is_some());
    }
}

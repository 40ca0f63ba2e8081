//! Configuration type definitions.

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::enums::{OutputDestination, WindowCaptureMode};
use crate::capture::selector::{DEFAULT_BLACK_DIFFERENT_SIZE_RATIO, DEFAULT_BLACK_TRIGGER_RATIO};

/// Window capture settings.
///
/// Controls backend selection for window captures and the black-pixel
/// cross-check between direct copies and screen copies.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CaptureConfig {
    /// Backend selection mode: "auto", "compositor", "direct-copy" or "screen"
    #[serde(default)]
    pub window_mode: WindowCaptureMode,

    /// Record the cursor position with each capture
    #[serde(default = "default_include_cursor")]
    pub include_cursor: bool,

    /// Black pixel fraction of a direct copy that triggers a comparison
    /// screen capture (valid range: 0.0 - 1.0)
    #[serde(default = "default_black_trigger_ratio")]
    pub black_trigger_ratio: f64,

    /// Black pixel fraction above which a direct copy loses to a screen
    /// capture of a different size (valid range: 0.0 - 1.0)
    #[serde(default = "default_black_different_size_ratio")]
    pub black_different_size_ratio: f64,

    /// Delay after activating a window before capturing it, in milliseconds (0 - 2000)
    #[serde(default = "default_activation_settle_ms")]
    pub activation_settle_ms: u64,

    /// Capture the full screen when no backend can capture the requested window
    #[serde(default = "default_fallback_to_fullscreen")]
    pub fallback_to_fullscreen: bool,

    /// Process names that must never be captured by direct copy
    #[serde(default)]
    pub direct_copy_denied: Vec<String>,

    /// Process names that must never be captured through the compositor
    #[serde(default)]
    pub compositor_denied: Vec<String>,

    /// Process names that should always go through compositor capture
    /// (wins over `compositor_denied`)
    #[serde(default)]
    pub compositor_preferred: Vec<String>,

    /// Shared-object name fragments identifying UI frameworks that render
    /// black under direct copy when compositing is off
    #[serde(default = "default_incompatible_modules")]
    pub incompatible_modules: Vec<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            window_mode: WindowCaptureMode::default(),
            include_cursor: default_include_cursor(),
            black_trigger_ratio: default_black_trigger_ratio(),
            black_different_size_ratio: default_black_different_size_ratio(),
            activation_settle_ms: default_activation_settle_ms(),
            fallback_to_fullscreen: default_fallback_to_fullscreen(),
            direct_copy_denied: Vec::new(),
            compositor_denied: Vec::new(),
            compositor_preferred: Vec::new(),
            incompatible_modules: default_incompatible_modules(),
        }
    }
}

/// Scrolling capture settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScrollConfig {
    /// Maximum number of pages captured in one scrolling capture (1 - 1000)
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Unchanged scroll positions in a row that mark the end of the content (1 - 10)
    #[serde(default = "default_stall_limit")]
    pub stall_limit: u32,

    /// Delay after each scroll step before capturing, in milliseconds (0 - 2000)
    #[serde(default = "default_step_settle_ms")]
    pub step_settle_ms: u64,

    /// Delay after focusing the window before the first capture, in milliseconds (0 - 2000)
    #[serde(default = "default_focus_settle_ms")]
    pub focus_settle_ms: u64,

    /// Shortest overlap, in pixel lines, accepted when stitching pages
    #[serde(default = "default_min_overlap")]
    pub min_overlap: u32,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            stall_limit: default_stall_limit(),
            step_settle_ms: default_step_settle_ms(),
            focus_settle_ms: default_focus_settle_ms(),
            min_overlap: default_min_overlap(),
        }
    }
}

/// Output settings for finished captures.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OutputConfig {
    /// Directory screenshots are saved to (supports `~/`)
    #[serde(default = "default_save_directory")]
    pub save_directory: String,

    /// Filename template with chrono format specifiers
    #[serde(default = "default_filename_template")]
    pub filename_template: String,

    /// "clipboard", "file" or "clipboard-and-file"
    #[serde(default)]
    pub destination: OutputDestination,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            save_directory: default_save_directory(),
            filename_template: default_filename_template(),
            destination: OutputDestination::default(),
        }
    }
}

impl OutputConfig {
    pub fn save_directory_path(&self) -> PathBuf {
        crate::capture::file::expand_tilde(&self.save_directory)
    }
}

fn default_include_cursor() -> bool {
    false
}

fn default_black_trigger_ratio() -> f64 {
    DEFAULT_BLACK_TRIGGER_RATIO
}

fn default_black_different_size_ratio() -> f64 {
    DEFAULT_BLACK_DIFFERENT_SIZE_RATIO
}

fn default_activation_settle_ms() -> u64 {
    100
}

fn default_fallback_to_fullscreen() -> bool {
    true
}

fn default_incompatible_modules() -> Vec<String> {
    vec!["libQt5Quick".to_string(), "libQt6Quick".to_string()]
}

fn default_max_steps() -> usize {
    100
}

fn default_stall_limit() -> u32 {
    2
}

fn default_step_settle_ms() -> u64 {
    150
}

fn default_focus_settle_ms() -> u64 {
    300
}

fn default_min_overlap() -> u32 {
    1
}

fn default_save_directory() -> String {
    "~/Pictures/Stitchshot".to_string()
}

fn default_filename_template() -> String {
    "screenshot_%Y-%m-%d_%H%M%S".to_string()
}

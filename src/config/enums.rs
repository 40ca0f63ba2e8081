//! Configuration enum types.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::capture::CaptureDestination;

/// How window captures choose their backend.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, JsonSchema)]
pub enum WindowCaptureMode {
    /// Decide per window from platform and process facts
    #[default]
    #[serde(rename = "auto")]
    Auto,
    /// Always use compositor capture (screen copy if compositing is off)
    #[serde(rename = "compositor")]
    CompositorForced,
    /// Always use direct copy (screen copy if the process forbids it)
    #[serde(rename = "direct-copy")]
    DirectCopyForced,
    /// Always copy the visible screen area
    #[serde(rename = "screen")]
    ScreenForced,
}

impl FromStr for WindowCaptureMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "compositor" => Ok(Self::CompositorForced),
            "direct-copy" | "directcopy" => Ok(Self::DirectCopyForced),
            "screen" => Ok(Self::ScreenForced),
            other => Err(format!(
                "unknown window capture mode '{}' (expected auto, compositor, direct-copy or screen)",
                other
            )),
        }
    }
}

impl fmt::Display for WindowCaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::CompositorForced => "compositor",
            Self::DirectCopyForced => "direct-copy",
            Self::ScreenForced => "screen",
        })
    }
}

/// Where finished captures are delivered.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum OutputDestination {
    /// Copy to the clipboard only
    Clipboard,
    /// Save a file only
    #[default]
    File,
    /// Save a file and copy it to the clipboard
    ClipboardAndFile,
}

impl OutputDestination {
    pub fn to_capture_destination(self) -> CaptureDestination {
        match self {
            Self::Clipboard => CaptureDestination::ClipboardOnly,
            Self::File => CaptureDestination::FileOnly,
            Self::ClipboardAndFile => CaptureDestination::ClipboardAndFile,
        }
    }
}

impl FromStr for OutputDestination {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "clipboard" => Ok(Self::Clipboard),
            "file" => Ok(Self::File),
            "clipboard-and-file" | "both" => Ok(Self::ClipboardAndFile),
            other => Err(format!(
                "unknown destination '{}' (expected clipboard, file or clipboard-and-file)",
                other
            )),
        }
    }
}

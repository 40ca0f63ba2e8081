use std::process::{Command, Stdio};

use crate::capture::buffer::CaptureBuffer;
use crate::capture::dependencies::ScreenRegionCapture;
use crate::capture::types::CaptureError;
use crate::util::Rect;

/// Screen copies taken with `grim` (wlroots screencopy).
pub struct GrimScreen;

impl ScreenRegionCapture for GrimScreen {
    fn capture_region(&self, rect: Rect) -> Result<CaptureBuffer, CaptureError> {
        let geometry = grim_geometry(rect);
        log::debug!("Capturing region via grim: {}", geometry);

        let output = Command::new("grim")
            .args(["-g", &geometry, "-"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| CaptureError::ImageError(format!("Failed to run grim: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CaptureError::ImageError(format!(
                "grim failed: {}",
                stderr.trim()
            )));
        }

        if output.stdout.is_empty() {
            return Err(CaptureError::ImageError(
                "grim returned empty screenshot".into(),
            ));
        }

        CaptureBuffer::from_png(&output.stdout, rect.origin())
    }
}

/// `grim -g` geometry string: "x,y wxh".
pub(crate) fn grim_geometry(rect: Rect) -> String {
    format!("{},{} {}x{}", rect.x, rect.y, rect.width, rect.height)
}

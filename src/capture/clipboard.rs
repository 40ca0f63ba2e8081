//! Clipboard integration: copying screenshots out and reading images in.

use super::types::CaptureError;
use std::process::{Command, Stdio};
use wl_clipboard_rs::copy::{MimeType, Options, Source};

/// Puts PNG bytes on the Wayland clipboard, via `wl-copy` when installed and
/// wl-clipboard-rs otherwise.
pub fn copy_to_clipboard(image_data: &[u8]) -> Result<(), CaptureError> {
    log::debug!(
        "Attempting to copy screenshot to clipboard ({} bytes)",
        image_data.len()
    );

    match copy_via_command(image_data) {
        Ok(()) => {
            log::info!("Successfully copied to clipboard via wl-copy command");
            Ok(())
        }
        Err(cmd_err) => {
            log::warn!(
                "wl-copy command path failed ({}). Falling back to wl-clipboard-rs",
                cmd_err
            );
            match copy_via_library(image_data) {
                Ok(()) => {
                    log::info!("Successfully copied to clipboard via wl-clipboard-rs fallback");
                    Ok(())
                }
                Err(lib_err) => {
                    let combined = format!(
                        "wl-copy failed: {} ; wl-clipboard-rs failed: {}",
                        cmd_err, lib_err
                    );
                    Err(CaptureError::ClipboardError(combined))
                }
            }
        }
    }
}

fn copy_via_library(image_data: &[u8]) -> Result<(), CaptureError> {
    use wl_clipboard_rs::copy::ServeRequests;

    let mut opts = Options::new();
    // Answer a single paste, then stop serving.
    opts.serve_requests(ServeRequests::Only(1));

    opts.copy(
        Source::Bytes(image_data.into()),
        MimeType::Specific("image/png".to_string()),
    )
    .map_err(|e| CaptureError::ClipboardError(format!("wl-clipboard-rs error: {}", e)))?;

    Ok(())
}

fn copy_via_command(image_data: &[u8]) -> Result<(), CaptureError> {
    use std::io::Write;

    let mut child = Command::new("wl-copy")
        .arg("--type")
        .arg("image/png")
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            CaptureError::ClipboardError(format!(
                "Failed to spawn wl-copy (is it installed?): {}",
                e
            ))
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(image_data).map_err(|e| {
            CaptureError::ClipboardError(format!("Failed to write to wl-copy stdin: {}", e))
        })?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| CaptureError::ClipboardError(format!("Failed to wait for wl-copy: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CaptureError::ClipboardError(format!(
            "wl-copy failed: {}",
            stderr
        )));
    }

    log::debug!("wl-copy command completed successfully");
    Ok(())
}

/// Read a PNG image from the Wayland clipboard.
///
/// Mirrors [`copy_to_clipboard`]: tries the `wl-paste` command first, then
/// wl-clipboard-rs.
pub fn read_png_from_clipboard() -> Result<Vec<u8>, CaptureError> {
    match paste_via_command() {
        Ok(bytes) => Ok(bytes),
        Err(cmd_err) => {
            log::warn!(
                "wl-paste command path failed ({}). Falling back to wl-clipboard-rs",
                cmd_err
            );
            paste_via_library().map_err(|lib_err| {
                CaptureError::ClipboardError(format!(
                    "wl-paste failed: {} ; wl-clipboard-rs failed: {}",
                    cmd_err, lib_err
                ))
            })
        }
    }
}

fn paste_via_library() -> Result<Vec<u8>, CaptureError> {
    use std::io::Read;
    use wl_clipboard_rs::paste::{self, ClipboardType, Seat};

    let (mut pipe, mime) = paste::get_contents(
        ClipboardType::Regular,
        Seat::Unspecified,
        paste::MimeType::Specific("image/png"),
    )
    .map_err(|e| CaptureError::ClipboardError(format!("wl-clipboard-rs error: {}", e)))?;

    let mut contents = Vec::new();
    pipe.read_to_end(&mut contents)
        .map_err(|e| CaptureError::ClipboardError(format!("Failed to read clipboard: {}", e)))?;
    log::debug!("Read {} bytes of {} from clipboard", contents.len(), mime);
    Ok(contents)
}

fn paste_via_command() -> Result<Vec<u8>, CaptureError> {
    let output = Command::new("wl-paste")
        .arg("--no-newline")
        .arg("--type")
        .arg("image/png")
        .stdin(Stdio::null())
        .output()
        .map_err(|e| {
            CaptureError::ClipboardError(format!(
                "Failed to run wl-paste (is it installed?): {}",
                e
            ))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CaptureError::ClipboardError(format!(
            "wl-paste failed: {}",
            stderr.trim()
        )));
    }

    if output.stdout.is_empty() {
        return Err(CaptureError::ClipboardError(
            "clipboard holds no image".to_string(),
        ));
    }

    Ok(output.stdout)
}

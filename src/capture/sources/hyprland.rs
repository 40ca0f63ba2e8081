use serde_json::Value;
use std::fs;
use std::process::{Command, Stdio};

use crate::capture::dependencies::WindowQuery;
use crate::capture::types::{CaptureError, CaptureTarget, WindowHandle};
use crate::util::{Point, Rect, bounding_box};

/// Window classes captured through the embedded-browser path when one is available.
const BROWSER_CLASSES: &[&str] = &["firefox", "chromium", "google-chrome", "brave-browser"];

/// Window state queried from Hyprland via `hyprctl`.
pub struct HyprlandWindows;

impl WindowQuery for HyprlandWindows {
    fn active_window(&self) -> Result<CaptureTarget, CaptureError> {
        let json = hyprctl_json(&["activewindow", "-j"])?;
        let mut target = parse_client(&json)?;
        target.process_name = process_name(target.pid, &target.process_name);
        Ok(target)
    }

    fn resolve(&self, handle: &WindowHandle) -> Result<CaptureTarget, CaptureError> {
        let clients = hyprctl_json(&["clients", "-j"])?;
        let mut target = find_client(&clients, handle)?;
        target.process_name = process_name(target.pid, &target.process_name);
        Ok(target)
    }

    fn compositing_enabled(&self) -> bool {
        // Hyprland has no uncomposited mode.
        true
    }

    fn desktop_bounds(&self) -> Result<Rect, CaptureError> {
        let monitors = hyprctl_json(&["monitors", "-j"])?;
        parse_desktop_bounds(&monitors)
    }

    fn activate(&self, target: &CaptureTarget) -> Result<(), CaptureError> {
        let selector = format!("address:{}", target.handle);
        log::debug!("Focusing {} before capture", target);
        let output = Command::new("hyprctl")
            .args(["dispatch", "focuswindow", &selector])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                CaptureError::InvalidResponse(format!("Failed to run hyprctl dispatch: {}", e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CaptureError::InvalidResponse(format!(
                "hyprctl dispatch focuswindow failed: {}",
                stderr.trim()
            )));
        }
        Ok(())
    }

    fn cursor_position(&self) -> Option<Point> {
        match hyprctl_json(&["cursorpos", "-j"]) {
            Ok(json) => parse_cursor(&json),
            Err(e) => {
                log::debug!("Cursor position unavailable: {}", e);
                None
            }
        }
    }
}

fn hyprctl_json(args: &[&str]) -> Result<Value, CaptureError> {
    let output = Command::new("hyprctl")
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| {
            CaptureError::InvalidResponse(format!("Failed to run hyprctl {}: {}", args[0], e))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CaptureError::InvalidResponse(format!(
            "hyprctl {} failed: {}",
            args[0],
            stderr.trim()
        )));
    }

    serde_json::from_slice(&output.stdout).map_err(|e| {
        CaptureError::InvalidResponse(format!("Failed to parse hyprctl {} output: {}", args[0], e))
    })
}

fn pair(json: &Value, key: &str) -> Result<(i32, i32), CaptureError> {
    let values = json
        .get(key)
        .and_then(|v| v.as_array())
        .ok_or_else(|| CaptureError::InvalidResponse(format!("Missing '{}' in hyprctl output", key)))?;

    let first = values
        .first()
        .and_then(|v| v.as_f64())
        .ok_or_else(|| CaptureError::InvalidResponse(format!("Invalid '{}[0]' value", key)))?;
    let second = values
        .get(1)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| CaptureError::InvalidResponse(format!("Invalid '{}[1]' value", key)))?;

    Ok((first.round() as i32, second.round() as i32))
}

fn string_field(json: &Value, key: &str) -> String {
    json.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// Builds a capture target from one `hyprctl` client object.
pub(crate) fn parse_client(json: &Value) -> Result<CaptureTarget, CaptureError> {
    let address = json
        .get("address")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CaptureError::InvalidResponse("No active window".into()))?;

    let (x, y) = pair(json, "at")?;
    let (width, height) = pair(json, "size")?;
    let bounds = Rect::new(x, y, width, height).ok_or_else(|| {
        CaptureError::InvalidResponse(format!(
            "Window {} has non-positive dimensions {}x{}",
            address, width, height
        ))
    })?;

    let class = string_field(json, "class");
    let pid = json
        .get("pid")
        .and_then(|v| v.as_i64())
        .and_then(|pid| u32::try_from(pid).ok())
        .unwrap_or(0);
    let xwayland = json.get("xwayland").and_then(|v| v.as_bool()).unwrap_or(false);
    let hidden = json.get("hidden").and_then(|v| v.as_bool()).unwrap_or(false);
    let mapped = json.get("mapped").and_then(|v| v.as_bool()).unwrap_or(true);
    let is_browser = BROWSER_CLASSES
        .iter()
        .any(|known| class.eq_ignore_ascii_case(known));

    Ok(CaptureTarget {
        handle: WindowHandle(address.to_string()),
        bounds,
        pid,
        process_name: class,
        title: string_field(json, "title"),
        is_minimized: hidden,
        is_modern_app: !xwayland,
        is_top_level: mapped,
        is_browser,
    })
}

pub(crate) fn find_client(clients: &Value, handle: &WindowHandle) -> Result<CaptureTarget, CaptureError> {
    let list = clients.as_array().ok_or_else(|| {
        CaptureError::InvalidResponse("hyprctl clients did not return an array".into())
    })?;

    list.iter()
        .find(|client| client.get("address").and_then(|v| v.as_str()) == Some(handle.0.as_str()))
        .ok_or_else(|| CaptureError::InvalidResponse(format!("No window with address {}", handle)))
        .and_then(parse_client)
}

/// Union of all monitors in logical (scaled) coordinates.
pub(crate) fn parse_desktop_bounds(monitors: &Value) -> Result<Rect, CaptureError> {
    let list = monitors.as_array().ok_or_else(|| {
        CaptureError::InvalidResponse("hyprctl monitors did not return an array".into())
    })?;

    let rects: Vec<Rect> = list
        .iter()
        .filter_map(|monitor| {
            let x = monitor.get("x")?.as_i64()?;
            let y = monitor.get("y")?.as_i64()?;
            let width = monitor.get("width")?.as_f64()?;
            let height = monitor.get("height")?.as_f64()?;
            let scale = monitor.get("scale").and_then(|v| v.as_f64()).unwrap_or(1.0);
            let scale = if scale > 0.0 { scale } else { 1.0 };
            // Rotated outputs swap their logical axes.
            let rotated = monitor
                .get("transform")
                .and_then(|v| v.as_i64())
                .is_some_and(|t| t % 2 == 1);
            let (width, height) = if rotated { (height, width) } else { (width, height) };
            Rect::new(
                i32::try_from(x).ok()?,
                i32::try_from(y).ok()?,
                (width / scale).round() as i32,
                (height / scale).round() as i32,
            )
        })
        .collect();

    bounding_box(&rects)
        .ok_or_else(|| CaptureError::InvalidResponse("hyprctl reported no monitors".into()))
}

pub(crate) fn parse_cursor(json: &Value) -> Option<Point> {
    let x = json.get("x")?.as_f64()?;
    let y = json.get("y")?.as_f64()?;
    Some(Point::new(x.round() as i32, y.round() as i32))
}

/// Executable name from `/proc`, or `fallback` when the process is gone.
fn process_name(pid: u32, fallback: &str) -> String {
    if pid == 0 {
        return fallback.to_string();
    }
    fs::read_to_string(format!("/proc/{}/comm", pid))
        .map(|name| name.trim().to_string())
        .ok()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(address: &str, class: &str) -> Value {
        json!({
            "address": address,
            "mapped": true,
            "hidden": false,
            "at": [100, 50],
            "size": [800, 600],
            "class": class,
            "title": "Document",
            "pid": 4242,
            "xwayland": true
        })
    }

    #[test]
    fn parses_client_geometry_and_flags() {
        let target = parse_client(&client("0x5a1", "kitty")).unwrap();
        assert_eq!(target.handle, WindowHandle("0x5a1".into()));
        assert_eq!(target.bounds, Rect::new(100, 50, 800, 600).unwrap());
        assert_eq!(target.pid, 4242);
        assert_eq!(target.process_name, "kitty");
        assert!(!target.is_modern_app);
        assert!(target.is_top_level);
        assert!(!target.is_browser);
    }

    #[test]
    fn recognizes_browser_class() {
        let target = parse_client(&client("0x1", "firefox")).unwrap();
        assert!(target.is_browser);
    }

    #[test]
    fn empty_active_window_is_an_error() {
        assert!(matches!(
            parse_client(&json!({})),
            Err(CaptureError::InvalidResponse(_))
        ));
    }

    #[test]
    fn zero_sized_client_is_rejected() {
        let mut value = client("0x2", "kitty");
        value["size"] = json!([0, 600]);
        assert!(parse_client(&value).is_err());
    }

    #[test]
    fn finds_client_by_address() {
        let clients = json!([client("0x1", "kitty"), client("0x2", "foot")]);
        let target = find_client(&clients, &WindowHandle("0x2".into())).unwrap();
        assert_eq!(target.process_name, "foot");
        assert!(find_client(&clients, &WindowHandle("0x3".into())).is_err());
    }

    #[test]
    fn desktop_bounds_cover_scaled_monitors() {
        let monitors = json!([
            {"x": 0, "y": 0, "width": 2560, "height": 1440, "scale": 2.0, "transform": 0},
            {"x": 1280, "y": 0, "width": 1080, "height": 1920, "scale": 1.0, "transform": 1}
        ]);
        let bounds = parse_desktop_bounds(&monitors).unwrap();
        assert_eq!(bounds, Rect::new(0, 0, 3200, 1080).unwrap());
    }

    #[test]
    fn parses_cursor_position() {
        assert_eq!(
            parse_cursor(&json!({"x": 12, "y": 34})),
            Some(Point::new(12, 34))
        );
        assert_eq!(parse_cursor(&json!({})), None);
    }
}

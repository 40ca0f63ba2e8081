//! Data types for screenshot capture functionality.

use std::{fmt, path::PathBuf};

use chrono::{DateTime, Local};
use thiserror::Error;

use crate::capture::buffer::CaptureBuffer;
use crate::util::{Point, Rect};

/// Type of screenshot capture to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureType {
    /// Capture a rectangle of the virtual desktop.
    Region(Rect),
    /// Capture the rectangle used by the previous region capture.
    LastRegion,
    /// Capture the currently focused window.
    ActiveWindow,
    /// Capture a specific window.
    Window(WindowHandle),
    /// Capture the entire virtual desktop.
    FullScreen,
    /// Scroll through a window and stitch its content (active window when `None`).
    ScrollingWindow(Option<WindowHandle>),
    /// Take the image currently held by the clipboard.
    Clipboard,
    /// Load an image from disk.
    File(PathBuf),
}

/// Opaque platform window handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub String);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A window resolved from live desktop state for one capture request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureTarget {
    pub handle: WindowHandle,
    /// Window bounds in desktop coordinates.
    pub bounds: Rect,
    pub pid: u32,
    pub process_name: String,
    pub title: String,
    pub is_minimized: bool,
    /// Sandboxed/modern application that only the compositor can capture reliably.
    pub is_modern_app: bool,
    pub is_top_level: bool,
    /// Recognized embedded-browser window.
    pub is_browser: bool,
}

impl fmt::Display for CaptureTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} '{}' ({} pid {})",
            self.handle, self.title, self.process_name, self.pid
        )
    }
}

/// Window capture strategies, ordered from most to least capable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Compositor,
    DirectCopy,
    ScreenFallback,
}

impl BackendKind {
    /// The next tier to try when this backend fails.
    pub fn fallback(self) -> Option<BackendKind> {
        match self {
            BackendKind::Compositor => Some(BackendKind::DirectCopy),
            BackendKind::DirectCopy => Some(BackendKind::ScreenFallback),
            BackendKind::ScreenFallback => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Compositor => "compositor",
            BackendKind::DirectCopy => "direct-copy",
            BackendKind::ScreenFallback => "screen",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the final image was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMethod {
    Region,
    FullScreen,
    Window(BackendKind),
    EmbeddedBrowser,
    Scrolling,
    Clipboard,
    File,
}

/// Metadata handed to the editor/export layer together with the pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureDetails {
    pub title: Option<String>,
    pub method: CaptureMethod,
    /// Desktop coordinates of the buffer's top-left pixel.
    pub origin: Point,
    /// Cursor position in buffer-local coordinates.
    pub cursor: Option<Point>,
    pub captured_at: DateTime<Local>,
}

impl CaptureDetails {
    pub fn new(method: CaptureMethod, origin: Point) -> Self {
        Self {
            title: None,
            method,
            origin,
            cursor: None,
            captured_at: Local::now(),
        }
    }
}

/// Result of a screenshot capture operation.
#[derive(Debug)]
pub struct CaptureResult {
    pub buffer: CaptureBuffer,
    pub details: CaptureDetails,
}

/// What the sink did with a capture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Path where the image was saved (if saved).
    pub saved_path: Option<PathBuf>,
    /// Whether the image was copied to clipboard.
    pub copied_to_clipboard: bool,
}

/// Lightweight description of a delivered capture.
#[derive(Debug, Clone)]
pub struct CaptureSummary {
    pub details: CaptureDetails,
    pub width: u32,
    pub height: u32,
    pub delivery: DeliveryReport,
}

/// Outcome of a capture request (success or failure).
#[derive(Debug, Clone)]
pub enum CaptureOutcome {
    Success(CaptureSummary),
    Failed(String),
    Cancelled(String),
}

/// Where the captured image should be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureDestination {
    ClipboardOnly,
    FileOnly,
    ClipboardAndFile,
}

/// Errors that can occur during screenshot capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("{backend} capture is not available: {reason}")]
    BackendUnavailable {
        backend: BackendKind,
        reason: String,
    },

    #[error("{backend} capture denied: {reason}")]
    BackendDenied {
        backend: BackendKind,
        reason: String,
    },

    #[error("{backend} capture produced an empty image")]
    BackendProducedEmptyResult { backend: BackendKind },

    #[error("{backend} capture timed out")]
    Timeout { backend: BackendKind },

    #[error("Could not capture {target}: every capture backend failed")]
    TerminalCaptureFailure { target: String },

    #[error("Nothing to capture: the scrollable viewport has no visible area")]
    StitchDegenerate,

    #[error("Fragment {index} is {actual}px across but the composite is {expected}px")]
    FragmentSizeMismatch {
        index: usize,
        expected: u32,
        actual: u32,
    },

    #[error("No previous region has been captured")]
    NoLastRegion,

    #[error("Invalid capture buffer: {0}")]
    InvalidBuffer(String),

    #[error("Failed to save screenshot: {0}")]
    SaveError(#[from] std::io::Error),

    #[error("Clipboard operation failed: {0}")]
    ClipboardError(String),

    #[error("Image processing error: {0}")]
    ImageError(String),

    #[error("Window query returned invalid response: {0}")]
    InvalidResponse(String),

    #[error("Capture cancelled: {0}")]
    Cancelled(String),
}

impl CaptureError {
    /// Normalizes any error raised while running `backend` into one of the
    /// backend failure kinds, so nothing platform-specific leaks past the selector.
    pub fn into_backend_failure(self, backend: BackendKind) -> CaptureError {
        match self {
            CaptureError::BackendUnavailable { .. }
            | CaptureError::BackendDenied { .. }
            | CaptureError::BackendProducedEmptyResult { .. }
            | CaptureError::Timeout { .. } => self,
            other => CaptureError::BackendUnavailable {
                backend,
                reason: other.to_string(),
            },
        }
    }
}

/// Status of an ongoing capture operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureStatus {
    /// Capture is idle/not started.
    Idle,
    /// Capture is in progress.
    InProgress,
    /// Capture completed successfully.
    Success,
    /// Capture failed.
    Failed(String),
    /// Capture was cancelled by the user.
    Cancelled(String),
}

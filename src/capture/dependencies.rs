use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;

use crate::capture::{
    backend::WindowSnapshotBackend,
    buffer::CaptureBuffer,
    clipboard,
    file::{self, FileSaveConfig},
    scroll::ScrollableWindow,
    sink::DefaultCaptureSink,
    sources,
    types::{
        CaptureDestination, CaptureError, CaptureResult, CaptureTarget, DeliveryReport,
        WindowHandle,
    },
};
use crate::config::CaptureConfig;
use crate::util::{Point, Rect};

/// Copies a rectangle of the virtual desktop into a pixel buffer.
pub trait ScreenRegionCapture: Send + Sync {
    fn capture_region(&self, rect: Rect) -> Result<CaptureBuffer, CaptureError>;
}

/// Live window state: enumeration, geometry, focus and cursor.
pub trait WindowQuery: Send + Sync {
    fn active_window(&self) -> Result<CaptureTarget, CaptureError>;

    fn resolve(&self, handle: &WindowHandle) -> Result<CaptureTarget, CaptureError>;

    /// Whether the desktop is composited.
    fn compositing_enabled(&self) -> bool;

    /// Bounds of the whole virtual desktop (all monitors).
    fn desktop_bounds(&self) -> Result<Rect, CaptureError>;

    /// Brings the window to the foreground, restoring it first if minimized.
    fn activate(&self, target: &CaptureTarget) -> Result<(), CaptureError>;

    fn cursor_position(&self) -> Option<Point>;
}

/// Per-process capability checks consulted by the strategy selector.
pub trait ProcessProbe: Send + Sync {
    fn direct_copy_permitted(&self, target: &CaptureTarget) -> bool;

    fn compositor_permitted(&self, target: &CaptureTarget) -> bool;

    /// Process renders with a framework known to come out black under direct copy.
    fn uses_incompatible_framework(&self, target: &CaptureTarget) -> bool;
}

/// Capture path for recognized embedded-browser windows.
pub trait BrowserCapture: Send + Sync {
    /// Returns `None` to fall through to generic window capture.
    fn capture(&self, target: &CaptureTarget) -> Option<CaptureBuffer>;
}

/// Opens scroll control over a window for the duration of one scan.
pub trait ScrollWindowProvider: Send + Sync {
    fn open(&self, target: &CaptureTarget) -> Result<Box<dyn ScrollableWindow>, CaptureError>;
}

/// Reads an encoded image from the clipboard.
pub trait ClipboardImageSource: Send + Sync {
    fn read_image(&self) -> Result<Vec<u8>, CaptureError>;
}

/// Abstraction over file saving for captured screenshots.
pub trait CaptureFileSaver: Send + Sync {
    fn save(&self, image_data: &[u8], config: &FileSaveConfig) -> Result<PathBuf, CaptureError>;
}

/// Abstraction over copying screenshots to the clipboard.
pub trait CaptureClipboard: Send + Sync {
    fn copy(&self, image_data: &[u8]) -> Result<(), CaptureError>;
}

/// Receives finished captures (the editor/export layer).
#[async_trait]
pub trait CaptureSink: Send + Sync {
    async fn deliver(
        &self,
        result: &CaptureResult,
        destination: CaptureDestination,
        save_config: Option<&FileSaveConfig>,
    ) -> Result<DeliveryReport, CaptureError>;
}

/// Bundle of dependencies used by the capture pipeline. Each component can be mocked in tests.
#[derive(Clone)]
pub struct CaptureDependencies {
    pub windows: Arc<dyn WindowQuery>,
    pub probe: Arc<dyn ProcessProbe>,
    pub screen: Arc<dyn ScreenRegionCapture>,
    pub compositor: Option<Arc<dyn WindowSnapshotBackend>>,
    pub direct_copy: Option<Arc<dyn WindowSnapshotBackend>>,
    pub browser: Option<Arc<dyn BrowserCapture>>,
    pub scroll: Option<Arc<dyn ScrollWindowProvider>>,
    pub clipboard_source: Arc<dyn ClipboardImageSource>,
    pub sink: Arc<dyn CaptureSink>,
}

impl CaptureDependencies {
    /// Platform adapters for Hyprland/wlroots desktops.
    ///
    /// No compositor, direct-copy or scroll-control adapter exists here, so window
    /// capture always resolves to the screen fallback.
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self {
            windows: Arc::new(sources::hyprland::HyprlandWindows),
            probe: Arc::new(sources::procfs::ConfiguredProcessProbe::from_config(config)),
            screen: Arc::new(sources::grim::GrimScreen),
            compositor: None,
            direct_copy: None,
            browser: None,
            scroll: None,
            clipboard_source: Arc::new(DefaultClipboard),
            sink: Arc::new(DefaultCaptureSink::new(
                Arc::new(DefaultFileSaver),
                Arc::new(DefaultClipboard),
            )),
        }
    }
}

impl Default for CaptureDependencies {
    fn default() -> Self {
        Self::from_config(&CaptureConfig::default())
    }
}

struct DefaultFileSaver;
struct DefaultClipboard;

impl CaptureFileSaver for DefaultFileSaver {
    fn save(&self, image_data: &[u8], config: &FileSaveConfig) -> Result<PathBuf, CaptureError> {
        file::save_screenshot(image_data, config)
    }
}

impl CaptureClipboard for DefaultClipboard {
    fn copy(&self, image_data: &[u8]) -> Result<(), CaptureError> {
        clipboard::copy_to_clipboard(image_data)
    }
}

impl ClipboardImageSource for DefaultClipboard {
    fn read_image(&self) -> Result<Vec<u8>, CaptureError> {
        clipboard::read_png_from_clipboard()
    }
}

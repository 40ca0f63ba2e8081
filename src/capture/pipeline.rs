use std::{
    fmt,
    sync::{Arc, Mutex},
};

use tokio::{sync::oneshot, task};

use crate::capture::{
    buffer::CaptureBuffer,
    dependencies::CaptureDependencies,
    file::{self, FileSaveConfig},
    scroll::{CancellationToken, ScrollOptions, ScrollingRegionScanner},
    selector::{CaptureStrategySelector, SelectorOptions},
    types::{
        BackendKind, CaptureDestination, CaptureDetails, CaptureError, CaptureMethod,
        CaptureOutcome, CaptureResult, CaptureSummary, CaptureTarget, CaptureType,
    },
};
use crate::config::{Config, WindowCaptureMode};
use crate::util::{Point, Rect};

/// Capture behaviour taken from the `[capture]` and `[scroll]` config sections.
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub window_mode: WindowCaptureMode,
    pub include_cursor: bool,
    pub fallback_to_fullscreen: bool,
    pub selector: SelectorOptions,
    pub scroll: ScrollOptions,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            window_mode: WindowCaptureMode::Auto,
            include_cursor: false,
            fallback_to_fullscreen: true,
            selector: SelectorOptions::default(),
            scroll: ScrollOptions::default(),
        }
    }
}

impl From<&Config> for CaptureSettings {
    fn from(config: &Config) -> Self {
        Self {
            window_mode: config.capture.window_mode,
            include_cursor: config.capture.include_cursor,
            fallback_to_fullscreen: config.capture.fallback_to_fullscreen,
            selector: SelectorOptions::from(&config.capture),
            scroll: ScrollOptions::from(&config.scroll),
        }
    }
}

pub(crate) struct CaptureRequest {
    pub(crate) capture_type: CaptureType,
    pub(crate) destination: CaptureDestination,
    pub(crate) save_config: Option<FileSaveConfig>,
    pub(crate) reply: Option<oneshot::Sender<CaptureOutcome>>,
}

impl fmt::Debug for CaptureRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureRequest")
            .field("capture_type", &self.capture_type)
            .field("destination", &self.destination)
            .field(
                "save_config",
                &self
                    .save_config
                    .as_ref()
                    .map(|cfg| cfg.filename_template.clone()),
            )
            .field("awaited", &self.reply.is_some())
            .finish()
    }
}

/// Acquires images for each capture mode and hands them to the sink.
///
/// The last captured region is remembered across requests for
/// [`CaptureType::LastRegion`].
pub struct CapturePipeline {
    dependencies: CaptureDependencies,
    settings: CaptureSettings,
    last_region: Mutex<Option<Rect>>,
    cancel: CancellationToken,
}

impl CapturePipeline {
    pub fn new(dependencies: CaptureDependencies, settings: CaptureSettings) -> Self {
        Self {
            dependencies,
            settings,
            last_region: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Token polled by scrolling captures; setting it stops the running scan.
    /// Each scan clears it when it starts.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn last_region(&self) -> Option<Rect> {
        *self.last_region.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn remember_region(&self, rect: Rect) {
        *self.last_region.lock().unwrap_or_else(|e| e.into_inner()) = Some(rect);
    }

    /// Produces the image for `capture_type`. Blocking; run it off the async runtime.
    pub fn acquire(&self, capture_type: CaptureType) -> Result<CaptureResult, CaptureError> {
        let mut result = match capture_type {
            CaptureType::Region(rect) => {
                self.remember_region(rect);
                self.capture_region(rect, CaptureMethod::Region)?
            }
            CaptureType::LastRegion => {
                let rect = self.last_region().ok_or(CaptureError::NoLastRegion)?;
                log::debug!("Repeating last region {}", rect);
                self.capture_region(rect, CaptureMethod::Region)?
            }
            CaptureType::FullScreen => self.capture_full_screen()?,
            CaptureType::ActiveWindow => {
                let target = self.dependencies.windows.active_window()?;
                self.capture_window(&target)?
            }
            CaptureType::Window(handle) => {
                let target = self.dependencies.windows.resolve(&handle)?;
                self.capture_window(&target)?
            }
            CaptureType::ScrollingWindow(handle) => {
                let target = match handle {
                    Some(handle) => self.dependencies.windows.resolve(&handle)?,
                    None => self.dependencies.windows.active_window()?,
                };
                self.capture_scrolling(&target)?
            }
            CaptureType::Clipboard => {
                let bytes = self.dependencies.clipboard_source.read_image()?;
                let buffer = CaptureBuffer::from_png(&bytes, Point::default())?;
                CaptureResult {
                    details: CaptureDetails::new(CaptureMethod::Clipboard, buffer.origin()),
                    buffer,
                }
            }
            CaptureType::File(path) => {
                let buffer = file::load_capture_file(&path)?;
                let mut details = CaptureDetails::new(CaptureMethod::File, buffer.origin());
                details.title = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned());
                CaptureResult { buffer, details }
            }
        };

        if result.buffer.is_empty() {
            return Err(CaptureError::InvalidBuffer(
                "capture produced an empty image".into(),
            ));
        }

        if self.settings.include_cursor
            && !matches!(
                result.details.method,
                CaptureMethod::Clipboard | CaptureMethod::File
            )
        {
            self.annotate_cursor(&mut result);
        }

        Ok(result)
    }

    fn annotate_cursor(&self, result: &mut CaptureResult) {
        let cursor = self.dependencies.windows.cursor_position();
        result.buffer.set_cursor(cursor);
        result.details.cursor = result.buffer.local_cursor();
        log::debug!(
            "Cursor at {:?} (buffer-local {:?})",
            cursor,
            result.details.cursor
        );
    }

    fn capture_region(
        &self,
        rect: Rect,
        method: CaptureMethod,
    ) -> Result<CaptureResult, CaptureError> {
        log::info!("Capturing region {}", rect);
        let buffer = self.dependencies.screen.capture_region(rect)?;
        if buffer.is_empty() {
            return Err(CaptureError::BackendProducedEmptyResult {
                backend: BackendKind::ScreenFallback,
            });
        }

        Ok(CaptureResult {
            details: CaptureDetails::new(method, buffer.origin()),
            buffer,
        })
    }

    fn capture_full_screen(&self) -> Result<CaptureResult, CaptureError> {
        let bounds = self.dependencies.windows.desktop_bounds()?;
        self.capture_region(bounds, CaptureMethod::FullScreen)
    }

    fn capture_window(&self, target: &CaptureTarget) -> Result<CaptureResult, CaptureError> {
        let selector =
            CaptureStrategySelector::new(&self.dependencies, self.settings.selector.clone());
        let mut details = CaptureDetails::new(
            CaptureMethod::Window(BackendKind::ScreenFallback),
            target.bounds.origin(),
        );

        match selector.capture(target, self.settings.window_mode, &mut details) {
            Ok(buffer) => Ok(CaptureResult { buffer, details }),
            Err(CaptureError::TerminalCaptureFailure { target: name })
                if self.settings.fallback_to_fullscreen =>
            {
                log::warn!("Window capture of {} failed, capturing the full screen", name);
                let mut result = self.capture_full_screen()?;
                result.details.title = details.title;
                Ok(result)
            }
            Err(err) => Err(err),
        }
    }

    fn capture_scrolling(&self, target: &CaptureTarget) -> Result<CaptureResult, CaptureError> {
        let provider =
            self.dependencies
                .scroll
                .as_ref()
                .ok_or_else(|| CaptureError::BackendUnavailable {
                    backend: BackendKind::ScreenFallback,
                    reason: "no scroll control for windows on this desktop".into(),
                })?;

        // Cancellation applies to one scan; drop any request left over from the last one.
        self.cancel.clear();
        let mut window = provider.open(target)?;
        let scanner = ScrollingRegionScanner::new(self.settings.scroll.clone());
        let buffer = scanner.scan(
            window.as_mut(),
            self.dependencies.screen.as_ref(),
            &self.cancel,
        )?;

        let mut details = CaptureDetails::new(CaptureMethod::Scrolling, buffer.origin());
        details.title = Some(target.title.clone());
        Ok(CaptureResult { buffer, details })
    }

    /// Acquires on a blocking worker, then delivers through the sink.
    pub(crate) async fn run(
        self: &Arc<Self>,
        request: &CaptureRequest,
    ) -> Result<CaptureSummary, CaptureError> {
        log::info!("Starting capture: {:?}", request.capture_type);

        let pipeline = Arc::clone(self);
        let capture_type = request.capture_type.clone();
        let result = task::spawn_blocking(move || pipeline.acquire(capture_type))
            .await
            .map_err(|e| CaptureError::ImageError(format!("Capture task failed: {}", e)))??;

        log::info!(
            "Obtained {}x{} capture via {:?}",
            result.buffer.width(),
            result.buffer.height(),
            result.details.method
        );

        let delivery = self
            .dependencies
            .sink
            .deliver(&result, request.destination, request.save_config.as_ref())
            .await?;

        Ok(CaptureSummary {
            width: result.buffer.width(),
            height: result.buffer.height(),
            details: result.details,
            delivery,
        })
    }
}

//! Window snapshot backends and the guarded invocation used by the selector.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::capture::{
    buffer::CaptureBuffer,
    dependencies::{ScreenRegionCapture, WindowQuery},
    types::{BackendKind, CaptureError, CaptureTarget},
};

/// Result of a single backend invocation. Errors are always one of the
/// backend failure kinds (unavailable, denied, empty, timeout).
pub type CaptureAttemptResult = Result<CaptureBuffer, CaptureError>;

/// One strategy for turning a window into pixels.
pub trait WindowSnapshotBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn snapshot(&self, target: &CaptureTarget) -> Result<CaptureBuffer, CaptureError>;
}

/// Runs a backend, converting errors, panics and empty images into backend failures.
pub fn attempt(backend: &dyn WindowSnapshotBackend, target: &CaptureTarget) -> CaptureAttemptResult {
    let kind = backend.kind();
    log::debug!("Capturing {} via {} backend", target, kind);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| backend.snapshot(target)));
    let result = match outcome {
        Ok(Ok(buffer)) if buffer.is_empty() => {
            Err(CaptureError::BackendProducedEmptyResult { backend: kind })
        }
        Ok(Ok(buffer)) => Ok(buffer),
        Ok(Err(err)) => Err(err.into_backend_failure(kind)),
        Err(_) => Err(CaptureError::BackendUnavailable {
            backend: kind,
            reason: "backend panicked".into(),
        }),
    };

    if let Err(err) = &result {
        log::warn!("{} backend failed for {}: {}", kind, target, err);
    }
    result
}

/// Captures the on-screen part of a window by copying the desktop area it covers.
pub struct ScreenFallbackBackend {
    screen: Arc<dyn ScreenRegionCapture>,
    windows: Arc<dyn WindowQuery>,
}

impl ScreenFallbackBackend {
    pub fn new(screen: Arc<dyn ScreenRegionCapture>, windows: Arc<dyn WindowQuery>) -> Self {
        Self { screen, windows }
    }
}

impl WindowSnapshotBackend for ScreenFallbackBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::ScreenFallback
    }

    fn snapshot(&self, target: &CaptureTarget) -> Result<CaptureBuffer, CaptureError> {
        let desktop = self.windows.desktop_bounds()?;
        let visible = target.bounds.intersect(&desktop).ok_or_else(|| {
            CaptureError::BackendProducedEmptyResult {
                backend: BackendKind::ScreenFallback,
            }
        })?;

        if visible != target.bounds {
            log::debug!(
                "Window {} extends past the desktop, clipping to {}",
                target.bounds,
                visible
            );
        }

        self.screen.capture_region(visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::buffer::PixelFormat;
    use crate::util::{Point, Rect};

    struct Fixed(Result<u32, &'static str>);

    impl WindowSnapshotBackend for Fixed {
        fn kind(&self) -> BackendKind {
            BackendKind::DirectCopy
        }

        fn snapshot(&self, _target: &CaptureTarget) -> Result<CaptureBuffer, CaptureError> {
            match self.0 {
                Ok(size) => Ok(CaptureBuffer::new(
                    size,
                    size,
                    PixelFormat::Argb32,
                    Point::default(),
                )),
                Err("panic") => panic!("driver exploded"),
                Err(message) => Err(CaptureError::ImageError(message.into())),
            }
        }
    }

    fn target() -> CaptureTarget {
        CaptureTarget {
            handle: crate::capture::types::WindowHandle("0x1".into()),
            bounds: Rect::new(0, 0, 10, 10).unwrap(),
            pid: 1,
            process_name: "test".into(),
            title: "Test".into(),
            is_minimized: false,
            is_modern_app: false,
            is_top_level: true,
            is_browser: false,
        }
    }

    #[test]
    fn empty_image_becomes_empty_result() {
        let err = attempt(&Fixed(Ok(0)), &target()).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::BackendProducedEmptyResult {
                backend: BackendKind::DirectCopy
            }
        ));
    }

    #[test]
    fn platform_errors_are_normalized() {
        let err = attempt(&Fixed(Err("device lost")), &target()).unwrap_err();
        match err {
            CaptureError::BackendUnavailable { backend, reason } => {
                assert_eq!(backend, BackendKind::DirectCopy);
                assert!(reason.contains("device lost"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn panics_are_caught() {
        let err = attempt(&Fixed(Err("panic")), &target()).unwrap_err();
        assert!(matches!(err, CaptureError::BackendUnavailable { .. }));
    }

    #[test]
    fn successful_capture_passes_through() {
        let buffer = attempt(&Fixed(Ok(3)), &target()).unwrap();
        assert_eq!((buffer.width(), buffer.height()), (3, 3));
    }
}

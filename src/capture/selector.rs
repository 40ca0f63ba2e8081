//! Window capture strategy selection.
//!
//! Picks a backend order for a window from platform and process facts, walks
//! that order until something produces pixels, and cross-checks direct copies
//! against the screen when they look suspiciously black.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::capture::{
    backend::{ScreenFallbackBackend, WindowSnapshotBackend, attempt},
    buffer::CaptureBuffer,
    dependencies::{BrowserCapture, CaptureDependencies, ProcessProbe, WindowQuery},
    types::{BackendKind, CaptureDetails, CaptureError, CaptureMethod, CaptureTarget},
};
use crate::config::{CaptureConfig, WindowCaptureMode};

/// Black fraction of a direct copy that triggers a comparison screen capture.
pub const DEFAULT_BLACK_TRIGGER_RATIO: f64 = 0.01;

/// Black fraction above which a direct copy loses to a differently sized screen capture.
pub const DEFAULT_BLACK_DIFFERENT_SIZE_RATIO: f64 = 0.5;

/// Tunables for [`CaptureStrategySelector`].
#[derive(Debug, Clone)]
pub struct SelectorOptions {
    pub black_trigger_ratio: f64,
    pub black_different_size_ratio: f64,
    /// Pause after bringing a window to the foreground.
    pub activation_settle: Duration,
}

impl Default for SelectorOptions {
    fn default() -> Self {
        Self {
            black_trigger_ratio: DEFAULT_BLACK_TRIGGER_RATIO,
            black_different_size_ratio: DEFAULT_BLACK_DIFFERENT_SIZE_RATIO,
            activation_settle: Duration::from_millis(100),
        }
    }
}

impl From<&CaptureConfig> for SelectorOptions {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            black_trigger_ratio: config.black_trigger_ratio,
            black_different_size_ratio: config.black_different_size_ratio,
            activation_settle: Duration::from_millis(config.activation_settle_ms),
        }
    }
}

/// Everything the backend plan depends on besides the target itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlatformFacts {
    pub compositing_enabled: bool,
    pub direct_copy_permitted: bool,
    pub compositor_permitted: bool,
    pub incompatible_framework: bool,
    pub compositor_available: bool,
    pub direct_copy_available: bool,
}

/// Ordered list of backends to try for `target`; the first entry is the preferred one.
pub fn plan_backends(
    mode: WindowCaptureMode,
    target: &CaptureTarget,
    facts: &PlatformFacts,
) -> Vec<BackendKind> {
    match mode {
        WindowCaptureMode::ScreenForced => vec![BackendKind::ScreenFallback],
        WindowCaptureMode::CompositorForced => {
            if facts.compositing_enabled && facts.compositor_available {
                vec![BackendKind::Compositor]
            } else {
                log::info!("Compositor capture forced but not applicable, using screen capture");
                vec![BackendKind::ScreenFallback]
            }
        }
        WindowCaptureMode::DirectCopyForced => {
            if facts.direct_copy_permitted && facts.direct_copy_available {
                vec![BackendKind::DirectCopy]
            } else {
                log::info!(
                    "Direct copy forced but not permitted for {}, using screen capture",
                    target.process_name
                );
                vec![BackendKind::ScreenFallback]
            }
        }
        WindowCaptureMode::Auto => plan_auto(target, facts),
    }
}

fn plan_auto(target: &CaptureTarget, facts: &PlatformFacts) -> Vec<BackendKind> {
    let mut chosen = BackendKind::ScreenFallback;
    let mut direct_copy_usable = false;

    if facts.direct_copy_permitted {
        if !facts.compositing_enabled && facts.incompatible_framework {
            log::info!(
                "Skipping direct copy for {}: compositing is off and the process uses an incompatible UI framework",
                target.process_name
            );
        } else {
            chosen = BackendKind::DirectCopy;
            direct_copy_usable = true;
        }
    }

    if facts.compositing_enabled && (target.is_modern_app || facts.compositor_permitted) {
        chosen = BackendKind::Compositor;
    }

    let mut chain = Vec::with_capacity(3);
    let mut next = Some(chosen);
    while let Some(kind) = next {
        if kind != BackendKind::DirectCopy || direct_copy_usable {
            chain.push(kind);
        }
        next = kind.fallback();
    }
    chain
}

/// How the cross-check between a direct copy and a screen copy was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    KeptDirectCopy,
    /// Same-sized screen pixels were transplanted into the direct-copy buffer.
    ScreenPixels,
    /// The clipped screen capture replaced the direct copy entirely.
    ScreenBuffer,
}

/// Picks between a direct copy and a screen copy of the same window by black-pixel ratio.
pub fn reconcile(
    mut direct: CaptureBuffer,
    screen: CaptureBuffer,
    options: &SelectorOptions,
) -> (CaptureBuffer, Reconciliation) {
    let direct_black = direct.black_fraction();
    let screen_black = screen.black_fraction();
    log::debug!(
        "Black pixel ratio: direct copy {:.3}, screen {:.3}",
        direct_black,
        screen_black
    );

    if direct.same_size(&screen) {
        if direct_black > screen_black {
            log::info!(
                "Direct copy is blacker than the screen ({:.1}% vs {:.1}%), using screen pixels",
                direct_black * 100.0,
                screen_black * 100.0
            );
            // Sizes match, so the transplant cannot fail.
            if direct.replace_pixels(screen).is_ok() {
                return (direct, Reconciliation::ScreenPixels);
            }
        }
        return (direct, Reconciliation::KeptDirectCopy);
    }

    if direct_black > options.black_different_size_ratio && direct_black > screen_black {
        log::info!(
            "Direct copy is {:.1}% black and differs in size from the screen capture, using screen capture",
            direct_black * 100.0
        );
        direct.replace_content(screen);
        return (direct, Reconciliation::ScreenBuffer);
    }

    (direct, Reconciliation::KeptDirectCopy)
}

/// Chooses and runs window capture backends.
pub struct CaptureStrategySelector {
    windows: Arc<dyn WindowQuery>,
    probe: Arc<dyn ProcessProbe>,
    browser: Option<Arc<dyn BrowserCapture>>,
    compositor: Option<Arc<dyn WindowSnapshotBackend>>,
    direct_copy: Option<Arc<dyn WindowSnapshotBackend>>,
    screen: ScreenFallbackBackend,
    options: SelectorOptions,
}

impl CaptureStrategySelector {
    pub fn new(dependencies: &CaptureDependencies, options: SelectorOptions) -> Self {
        Self {
            windows: Arc::clone(&dependencies.windows),
            probe: Arc::clone(&dependencies.probe),
            browser: dependencies.browser.clone(),
            compositor: dependencies.compositor.clone(),
            direct_copy: dependencies.direct_copy.clone(),
            screen: ScreenFallbackBackend::new(
                Arc::clone(&dependencies.screen),
                Arc::clone(&dependencies.windows),
            ),
            options,
        }
    }

    /// Gathers the platform and process facts for `target`.
    pub fn facts(&self, target: &CaptureTarget) -> PlatformFacts {
        PlatformFacts {
            compositing_enabled: self.windows.compositing_enabled(),
            direct_copy_permitted: self.probe.direct_copy_permitted(target),
            compositor_permitted: self.probe.compositor_permitted(target),
            incompatible_framework: self.probe.uses_incompatible_framework(target),
            compositor_available: self.compositor.is_some(),
            direct_copy_available: self.direct_copy.is_some(),
        }
    }

    /// Captures `target`, recording its title, origin and winning method on `details`.
    pub fn capture(
        &self,
        target: &CaptureTarget,
        mode: WindowCaptureMode,
        details: &mut CaptureDetails,
    ) -> Result<CaptureBuffer, CaptureError> {
        details.title = Some(target.title.clone());

        if mode == WindowCaptureMode::Auto
            && target.is_browser
            && let Some(buffer) = self.capture_browser(target)
        {
            details.method = CaptureMethod::EmbeddedBrowser;
            details.origin = buffer.origin();
            return Ok(buffer);
        }

        let chain = plan_backends(mode, target, &self.facts(target));
        log::info!("Capture plan for {}: {:?}", target, chain);

        let mut activated = false;
        for kind in chain {
            if kind != BackendKind::DirectCopy && !activated {
                self.bring_to_front(target);
                activated = true;
            }

            let Some(backend) = self.backend(kind) else {
                log::warn!("{} backend is not available on this platform", kind);
                continue;
            };

            match attempt(backend, target) {
                Ok(buffer) => {
                    let buffer = if kind == BackendKind::DirectCopy {
                        self.cross_validate(buffer, target, &mut activated)
                    } else {
                        buffer
                    };
                    log::info!(
                        "Captured {} via {} ({}x{})",
                        target,
                        kind,
                        buffer.width(),
                        buffer.height()
                    );
                    details.method = CaptureMethod::Window(kind);
                    details.origin = buffer.origin();
                    return Ok(buffer);
                }
                Err(err) => {
                    if let Some(next) = kind.fallback() {
                        log::info!("{} capture failed ({}), falling back towards {}", kind, err, next);
                    }
                }
            }
        }

        log::error!("All capture backends failed for {}", target);
        Err(CaptureError::TerminalCaptureFailure {
            target: target.to_string(),
        })
    }

    fn backend(&self, kind: BackendKind) -> Option<&dyn WindowSnapshotBackend> {
        match kind {
            BackendKind::Compositor => self.compositor.as_deref(),
            BackendKind::DirectCopy => self.direct_copy.as_deref(),
            BackendKind::ScreenFallback => Some(&self.screen as &dyn WindowSnapshotBackend),
        }
    }

    fn capture_browser(&self, target: &CaptureTarget) -> Option<CaptureBuffer> {
        let browser = self.browser.as_ref()?;
        log::debug!("{} is an embedded browser window, trying browser capture", target);
        match panic::catch_unwind(AssertUnwindSafe(|| browser.capture(target))) {
            Ok(Some(buffer)) if !buffer.is_empty() => Some(buffer),
            Ok(_) => {
                log::debug!("Browser capture declined {}, using window capture", target);
                None
            }
            Err(_) => {
                log::warn!("Browser capture panicked for {}, using window capture", target);
                None
            }
        }
    }

    fn cross_validate(
        &self,
        direct: CaptureBuffer,
        target: &CaptureTarget,
        activated: &mut bool,
    ) -> CaptureBuffer {
        let direct_black = direct.black_fraction();
        if direct_black < self.options.black_trigger_ratio {
            return direct;
        }

        log::debug!(
            "Direct copy of {} is {:.1}% black, comparing with a screen capture",
            target,
            direct_black * 100.0
        );
        if !*activated {
            self.bring_to_front(target);
            *activated = true;
        }

        match attempt(&self.screen, target) {
            Ok(screen) => reconcile(direct, screen, &self.options).0,
            Err(err) => {
                log::warn!("Comparison screen capture failed ({}), keeping direct copy", err);
                direct
            }
        }
    }

    fn bring_to_front(&self, target: &CaptureTarget) {
        if target.is_minimized {
            log::debug!("Restoring minimized window {}", target);
        }
        if let Err(err) = self.windows.activate(target) {
            log::warn!("Could not activate {}: {}", target, err);
        }
        if !self.options.activation_settle.is_zero() {
            thread::sleep(self.options.activation_settle);
        }
    }
}

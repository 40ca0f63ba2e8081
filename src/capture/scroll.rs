//! Scrolling capture: drive a window through its scroll range and stitch the viewports.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::capture::{
    buffer::CaptureBuffer,
    dependencies::ScreenRegionCapture,
    stitch::{BitmapStitcher, ScrollAxis, ViewportFragment},
    types::{BackendKind, CaptureError},
};
use crate::config::ScrollConfig;
use crate::util::{self, Rect};

/// Scroll offset reported by a scrollable window, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollPosition {
    pub x: i32,
    pub y: i32,
}

/// Scroll control over one window.
pub trait ScrollableWindow: Send {
    fn axis(&self) -> ScrollAxis;

    /// Client area in desktop coordinates.
    fn client_bounds(&self) -> Result<Rect, CaptureError>;

    /// Child windows drawn over the scroll surface (toolbars, overlays).
    fn child_bounds(&self) -> Vec<Rect>;

    fn scrollbar_bounds(&self) -> Option<Rect>;

    fn position(&self) -> Result<ScrollPosition, CaptureError>;

    fn scroll_to(&mut self, position: ScrollPosition) -> Result<(), CaptureError>;

    fn scroll_to_start(&mut self) -> Result<(), CaptureError>;

    /// Advances by one viewport along [`ScrollableWindow::axis`].
    fn scroll_page(&mut self) -> Result<(), CaptureError>;

    /// Whether scroll input only reaches the window while it has focus.
    fn needs_focus(&self) -> bool;

    fn activate(&mut self) -> Result<(), CaptureError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    NotStarted,
    AtStart,
    Middle,
    AtEnd,
    Reset,
}

/// Cooperative cancellation flag, set by a key or signal listener and polled by the scan loop.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// The underlying flag, for registration with `signal_hook::flag`.
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

/// Tunables for [`ScrollingRegionScanner`].
#[derive(Debug, Clone)]
pub struct ScrollOptions {
    /// Upper bound on captured fragments.
    pub max_steps: usize,
    /// Consecutive unchanged scroll positions that mean the end was reached.
    pub stall_limit: u32,
    pub step_settle: Duration,
    pub focus_settle: Duration,
    pub min_overlap: u32,
}

impl Default for ScrollOptions {
    fn default() -> Self {
        Self {
            max_steps: 100,
            stall_limit: 2,
            step_settle: Duration::from_millis(150),
            focus_settle: Duration::from_millis(300),
            min_overlap: 1,
        }
    }
}

impl From<&ScrollConfig> for ScrollOptions {
    fn from(config: &ScrollConfig) -> Self {
        Self {
            max_steps: config.max_steps,
            stall_limit: config.stall_limit,
            step_settle: Duration::from_millis(config.step_settle_ms),
            focus_settle: Duration::from_millis(config.focus_settle_ms),
            min_overlap: config.min_overlap,
        }
    }
}

fn settle(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

/// Exclusive use of a window's scroll position for one scan.
///
/// The original position is restored on [`ScrollSession::reset`] or when the
/// session is dropped, whichever comes first.
pub struct ScrollSession<'a> {
    window: &'a mut dyn ScrollableWindow,
    original: Option<ScrollPosition>,
    state: ScanState,
    stall_limit: u32,
    step_settle: Duration,
}

impl<'a> ScrollSession<'a> {
    pub fn begin(window: &'a mut dyn ScrollableWindow, options: &ScrollOptions) -> Self {
        let original = match window.position() {
            Ok(position) => Some(position),
            Err(err) => {
                log::warn!("Cannot read scroll position, it will not be restored: {}", err);
                None
            }
        };

        Self {
            window,
            original,
            state: ScanState::NotStarted,
            stall_limit: options.stall_limit.max(1),
            step_settle: options.step_settle,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn position(&self) -> Result<ScrollPosition, CaptureError> {
        self.window.position()
    }

    pub fn start(&mut self) -> Result<ScanState, CaptureError> {
        self.window.scroll_to_start()?;
        settle(self.step_settle);
        self.state = ScanState::AtStart;
        log::debug!("Scrolled to start at {:?}", self.window.position().ok());
        Ok(self.state)
    }

    /// Moves one viewport on, or reports [`ScanState::AtEnd`] once the position stops changing.
    pub fn next(&mut self) -> Result<ScanState, CaptureError> {
        if matches!(self.state, ScanState::AtEnd | ScanState::Reset) {
            return Ok(self.state);
        }

        let mut stalls = 0;
        loop {
            let before = self.window.position()?;
            self.window.scroll_page()?;
            settle(self.step_settle);
            let after = self.window.position()?;

            if after != before {
                log::trace!("Scrolled from {:?} to {:?}", before, after);
                self.state = ScanState::Middle;
                return Ok(self.state);
            }

            stalls += 1;
            if stalls >= self.stall_limit {
                log::debug!("Scroll position stuck at {:?}, reached the end", after);
                self.state = ScanState::AtEnd;
                return Ok(self.state);
            }
        }
    }

    /// Restores the original scroll position. Failure is logged, never returned.
    pub fn reset(&mut self) -> ScanState {
        if self.state == ScanState::Reset {
            return self.state;
        }
        if let Some(original) = self.original
            && let Err(err) = self.window.scroll_to(original)
        {
            log::warn!("Failed to restore scroll position {:?}: {}", original, err);
        }
        self.state = ScanState::Reset;
        self.state
    }
}

impl Drop for ScrollSession<'_> {
    fn drop(&mut self) {
        self.reset();
    }
}

/// Captures a scrollable window page by page and stitches the result.
pub struct ScrollingRegionScanner {
    options: ScrollOptions,
}

impl ScrollingRegionScanner {
    pub fn new(options: ScrollOptions) -> Self {
        Self { options }
    }

    /// Client area minus overlaid children and the scrollbar, as one bounding box.
    pub fn capture_rectangle(window: &dyn ScrollableWindow) -> Result<Rect, CaptureError> {
        let client = window.client_bounds()?;
        let mut holes = window.child_bounds();
        holes.extend(window.scrollbar_bounds());

        let remainder = util::subtract_all(client, &holes);
        util::bounding_box(&remainder).ok_or(CaptureError::StitchDegenerate)
    }

    /// Runs the scan. A cancelled scan returns whatever was stitched so far.
    pub fn scan(
        &self,
        window: &mut dyn ScrollableWindow,
        screen: &dyn ScreenRegionCapture,
        cancel: &CancellationToken,
    ) -> Result<CaptureBuffer, CaptureError> {
        let rect = Self::capture_rectangle(window)?;
        let axis = window.axis();
        log::info!("Scrolling capture of {} along {:?}", rect, axis);

        if window.needs_focus() {
            if let Err(err) = window.activate() {
                log::warn!("Could not focus scroll target: {}", err);
            }
            settle(self.options.focus_settle);
        }

        let mut stitcher = BitmapStitcher::with_min_overlap(axis, self.options.min_overlap);
        let mut session = ScrollSession::begin(window, &self.options);
        session.start()?;

        for index in 0..self.options.max_steps {
            if cancel.is_cancelled() {
                log::info!("Scrolling capture cancelled after {} fragments", index);
                break;
            }

            let offset = session.position().unwrap_or_default();
            let buffer = screen.capture_region(rect)?;
            if buffer.is_empty() {
                return Err(CaptureError::BackendProducedEmptyResult {
                    backend: BackendKind::ScreenFallback,
                });
            }
            stitcher.add_bitmap(ViewportFragment {
                buffer,
                offset,
                index,
            })?;

            if session.next()? == ScanState::AtEnd {
                break;
            }
            if index + 1 == self.options.max_steps {
                log::warn!(
                    "Scrolling capture stopped at the {} step limit",
                    self.options.max_steps
                );
            }
        }

        session.reset();
        stitcher.into_result().ok_or_else(|| {
            CaptureError::Cancelled("scrolling capture cancelled before the first page".into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::buffer::PixelFormat;
    use crate::util::Point;
    use std::sync::Mutex;

    const PAGE_WIDTH: i32 = 40;

    fn page_pixel(x: i32, y: i32) -> u32 {
        0xFF00_0000 | (y as u32 * 1000 + x as u32)
    }

    /// A window over a page `content` rows tall with a `viewport`-row view.
    struct FakeWindow {
        scroll: Arc<Mutex<i32>>,
        viewport: i32,
        content: i32,
        /// Ignores the content limit, scrolling forever.
        endless: bool,
        children: Vec<Rect>,
        scrollbar: Option<Rect>,
        pages_scrolled: Arc<Mutex<usize>>,
        focus: bool,
        activated: Arc<Mutex<bool>>,
    }

    impl FakeWindow {
        fn new(scroll: Arc<Mutex<i32>>, viewport: i32, content: i32) -> Self {
            Self {
                scroll,
                viewport,
                content,
                endless: false,
                children: Vec::new(),
                scrollbar: None,
                pages_scrolled: Arc::new(Mutex::new(0)),
                focus: false,
                activated: Arc::new(Mutex::new(false)),
            }
        }
    }

    impl ScrollableWindow for FakeWindow {
        fn axis(&self) -> ScrollAxis {
            ScrollAxis::Vertical
        }

        fn client_bounds(&self) -> Result<Rect, CaptureError> {
            Ok(Rect::new(0, 0, PAGE_WIDTH, self.viewport).unwrap())
        }

        fn child_bounds(&self) -> Vec<Rect> {
            self.children.clone()
        }

        fn scrollbar_bounds(&self) -> Option<Rect> {
            self.scrollbar
        }

        fn position(&self) -> Result<ScrollPosition, CaptureError> {
            Ok(ScrollPosition {
                x: 0,
                y: *self.scroll.lock().unwrap(),
            })
        }

        fn scroll_to(&mut self, position: ScrollPosition) -> Result<(), CaptureError> {
            *self.scroll.lock().unwrap() = position.y;
            Ok(())
        }

        fn scroll_to_start(&mut self) -> Result<(), CaptureError> {
            *self.scroll.lock().unwrap() = 0;
            Ok(())
        }

        fn scroll_page(&mut self) -> Result<(), CaptureError> {
            *self.pages_scrolled.lock().unwrap() += 1;
            let mut scroll = self.scroll.lock().unwrap();
            let next = *scroll + self.viewport;
            *scroll = if self.endless {
                next
            } else {
                next.min(self.content - self.viewport)
            };
            Ok(())
        }

        fn needs_focus(&self) -> bool {
            self.focus
        }

        fn activate(&mut self) -> Result<(), CaptureError> {
            *self.activated.lock().unwrap() = true;
            Ok(())
        }
    }

    /// Screen showing the page through the window's current scroll offset.
    struct FakeScreen {
        scroll: Arc<Mutex<i32>>,
        captures: Mutex<usize>,
        cancel_on_capture: Option<CancellationToken>,
        fail_on_capture: Option<usize>,
    }

    impl FakeScreen {
        fn new(scroll: Arc<Mutex<i32>>) -> Self {
            Self {
                scroll,
                captures: Mutex::new(0),
                cancel_on_capture: None,
                fail_on_capture: None,
            }
        }
    }

    impl ScreenRegionCapture for FakeScreen {
        fn capture_region(&self, rect: Rect) -> Result<CaptureBuffer, CaptureError> {
            let mut captures = self.captures.lock().unwrap();
            *captures += 1;
            if self.fail_on_capture == Some(*captures) {
                return Err(CaptureError::ImageError("grab failed".into()));
            }
            if let Some(token) = &self.cancel_on_capture {
                token.cancel();
            }

            let scroll = *self.scroll.lock().unwrap();
            let pixels = (rect.y..rect.bottom())
                .flat_map(|y| (rect.x..rect.right()).map(move |x| page_pixel(x, y + scroll)))
                .collect();
            CaptureBuffer::from_pixels(
                rect.width as u32,
                rect.height as u32,
                PixelFormat::Argb32,
                pixels,
                rect.origin(),
            )
        }
    }

    fn options() -> ScrollOptions {
        ScrollOptions {
            step_settle: Duration::ZERO,
            focus_settle: Duration::ZERO,
            ..ScrollOptions::default()
        }
    }

    #[test]
    fn three_page_window_stitches_to_content_height() {
        let scroll = Arc::new(Mutex::new(37));
        let mut window = FakeWindow::new(Arc::clone(&scroll), 100, 260);
        let screen = FakeScreen::new(Arc::clone(&scroll));

        let scanner = ScrollingRegionScanner::new(options());
        let result = scanner
            .scan(&mut window, &screen, &CancellationToken::new())
            .unwrap();

        assert_eq!(result.width(), PAGE_WIDTH as u32);
        assert_eq!(result.height(), 260);
        for y in 0..260u32 {
            assert_eq!(result.pixel(3, y), Some(page_pixel(3, y as i32)), "row {y}");
        }
        assert_eq!(*screen.captures.lock().unwrap(), 3);
        assert_eq!(*scroll.lock().unwrap(), 37, "original position restored");
    }

    #[test]
    fn unscrollable_window_ends_after_two_stalls() {
        let scroll = Arc::new(Mutex::new(0));
        let mut window = FakeWindow::new(Arc::clone(&scroll), 100, 100);
        let pages = Arc::clone(&window.pages_scrolled);
        let screen = FakeScreen::new(Arc::clone(&scroll));

        let result = ScrollingRegionScanner::new(options())
            .scan(&mut window, &screen, &CancellationToken::new())
            .unwrap();

        assert_eq!(result.height(), 100);
        assert_eq!(*pages.lock().unwrap(), 2);
    }

    #[test]
    fn session_walks_the_state_machine() {
        let scroll = Arc::new(Mutex::new(50));
        let mut window = FakeWindow::new(Arc::clone(&scroll), 100, 250);
        let opts = options();
        {
            let mut session = ScrollSession::begin(&mut window, &opts);
            assert_eq!(session.state(), ScanState::NotStarted);
            assert_eq!(session.start().unwrap(), ScanState::AtStart);
            assert_eq!(session.next().unwrap(), ScanState::Middle);
            assert_eq!(session.next().unwrap(), ScanState::Middle);
            assert_eq!(session.next().unwrap(), ScanState::AtEnd);
            assert_eq!(session.next().unwrap(), ScanState::AtEnd);
            assert_eq!(session.reset(), ScanState::Reset);
        }
        assert_eq!(*scroll.lock().unwrap(), 50);
    }

    #[test]
    fn dropping_session_restores_position() {
        let scroll = Arc::new(Mutex::new(80));
        let mut window = FakeWindow::new(Arc::clone(&scroll), 100, 500);
        {
            let mut session = ScrollSession::begin(&mut window, &options());
            session.start().unwrap();
            session.next().unwrap();
        }
        assert_eq!(*scroll.lock().unwrap(), 80);
    }

    #[test]
    fn cancellation_returns_partial_composite() {
        let scroll = Arc::new(Mutex::new(0));
        let mut window = FakeWindow::new(Arc::clone(&scroll), 100, 1000);
        let token = CancellationToken::new();
        let mut screen = FakeScreen::new(Arc::clone(&scroll));
        screen.cancel_on_capture = Some(token.clone());

        let result = ScrollingRegionScanner::new(options())
            .scan(&mut window, &screen, &token)
            .unwrap();

        assert_eq!(result.height(), 100);
        assert_eq!(*screen.captures.lock().unwrap(), 1);
        assert_eq!(*scroll.lock().unwrap(), 0);
    }

    #[test]
    fn capture_failure_still_restores_position() {
        let scroll = Arc::new(Mutex::new(120));
        let mut window = FakeWindow::new(Arc::clone(&scroll), 100, 1000);
        let mut screen = FakeScreen::new(Arc::clone(&scroll));
        screen.fail_on_capture = Some(2);

        let err = ScrollingRegionScanner::new(options())
            .scan(&mut window, &screen, &CancellationToken::new())
            .unwrap_err();

        assert!(matches!(err, CaptureError::ImageError(_)));
        assert_eq!(*scroll.lock().unwrap(), 120);
    }

    #[test]
    fn endless_scroll_is_bounded_by_step_limit() {
        let scroll = Arc::new(Mutex::new(0));
        let mut window = FakeWindow::new(Arc::clone(&scroll), 100, 100);
        window.endless = true;
        let screen = FakeScreen::new(Arc::clone(&scroll));
        let opts = ScrollOptions {
            max_steps: 5,
            ..options()
        };

        let result = ScrollingRegionScanner::new(opts)
            .scan(&mut window, &screen, &CancellationToken::new())
            .unwrap();

        assert_eq!(*screen.captures.lock().unwrap(), 5);
        assert_eq!(result.height(), 500);
    }

    #[test]
    fn focus_is_requested_when_needed() {
        let scroll = Arc::new(Mutex::new(0));
        let mut window = FakeWindow::new(Arc::clone(&scroll), 100, 100);
        window.focus = true;
        let activated = Arc::clone(&window.activated);
        let screen = FakeScreen::new(Arc::clone(&scroll));

        ScrollingRegionScanner::new(options())
            .scan(&mut window, &screen, &CancellationToken::new())
            .unwrap();
        assert!(*activated.lock().unwrap());
    }

    #[test]
    fn capture_rectangle_excludes_toolbar_and_scrollbar() {
        let scroll = Arc::new(Mutex::new(0));
        let mut window = FakeWindow::new(scroll, 300, 300);
        window.children = vec![Rect::new(0, 0, PAGE_WIDTH, 20).unwrap()];
        window.scrollbar = Some(Rect::new(PAGE_WIDTH - 8, 0, 8, 300).unwrap());

        let rect = ScrollingRegionScanner::capture_rectangle(&window).unwrap();
        assert_eq!(rect, Rect::new(0, 20, PAGE_WIDTH - 8, 280).unwrap());
        assert_eq!(rect.origin(), Point::new(0, 20));
    }

    #[test]
    fn fully_covered_viewport_is_degenerate() {
        let scroll = Arc::new(Mutex::new(0));
        let mut window = FakeWindow::new(Arc::clone(&scroll), 100, 300);
        window.children = vec![Rect::new(-10, -10, 500, 500).unwrap()];
        let screen = FakeScreen::new(scroll);

        let err = ScrollingRegionScanner::new(options())
            .scan(&mut window, &screen, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, CaptureError::StitchDegenerate));
        assert_eq!(*screen.captures.lock().unwrap(), 0);
    }
}

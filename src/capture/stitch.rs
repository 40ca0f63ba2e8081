//! Stitching of overlapping viewport captures into one tall (or wide) image.

use crate::capture::{
    buffer::CaptureBuffer,
    scroll::ScrollPosition,
    types::CaptureError,
};

/// Direction the content moves between consecutive fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollAxis {
    #[default]
    Vertical,
    Horizontal,
}

/// One capture of the scroll viewport at a known scroll offset.
#[derive(Debug)]
pub struct ViewportFragment {
    pub buffer: CaptureBuffer,
    pub offset: ScrollPosition,
    /// Position in capture order, starting at 0.
    pub index: usize,
}

/// Accumulates fragments in scan order, dropping the band each new fragment
/// shares with the previous one.
#[derive(Debug)]
pub struct BitmapStitcher {
    axis: ScrollAxis,
    min_overlap: u32,
    composite: Option<CaptureBuffer>,
    previous: Option<ViewportFragment>,
    /// Lines along the scroll axis already present in the composite.
    insertion_offset: u32,
    fragments: usize,
    finished: bool,
}

impl BitmapStitcher {
    pub fn new(axis: ScrollAxis) -> Self {
        Self::with_min_overlap(axis, 1)
    }

    /// Overlaps shorter than `min_overlap` lines are treated as no overlap.
    pub fn with_min_overlap(axis: ScrollAxis, min_overlap: u32) -> Self {
        Self {
            axis,
            min_overlap: min_overlap.max(1),
            composite: None,
            previous: None,
            insertion_offset: 0,
            fragments: 0,
            finished: false,
        }
    }

    pub fn axis(&self) -> ScrollAxis {
        self.axis
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    pub fn insertion_offset(&self) -> u32 {
        self.insertion_offset
    }

    /// Appends the part of `fragment` not already covered by the previous fragment.
    pub fn add_bitmap(&mut self, fragment: ViewportFragment) -> Result<(), CaptureError> {
        if self.finished {
            return Err(CaptureError::InvalidBuffer(
                "stitcher result was already taken".into(),
            ));
        }
        if fragment.buffer.is_empty() {
            return Err(CaptureError::InvalidBuffer(format!(
                "fragment {} is empty",
                fragment.index
            )));
        }

        let Some(composite) = self.composite.take() else {
            log::debug!(
                "Fragment {} at {:?} starts the composite ({}x{})",
                fragment.index,
                fragment.offset,
                fragment.buffer.width(),
                fragment.buffer.height()
            );
            self.insertion_offset = self.line_count(&fragment.buffer);
            self.composite = Some(fragment.buffer.clone());
            self.previous = Some(fragment);
            self.fragments = 1;
            return Ok(());
        };

        let expected = self.cross_size(&composite);
        let actual = self.cross_size(&fragment.buffer);
        if expected != actual {
            self.composite = Some(composite);
            return Err(CaptureError::FragmentSizeMismatch {
                index: fragment.index,
                expected,
                actual,
            });
        }

        let overlap = match &self.previous {
            Some(previous) => self.overlap_with(previous, &fragment),
            None => 0,
        };
        let lines = self.line_count(&fragment.buffer);
        if overlap == 0 {
            log::debug!(
                "Fragment {} shares nothing with its predecessor, appending flush",
                fragment.index
            );
        } else {
            log::debug!(
                "Fragment {} overlaps its predecessor by {} of {} lines",
                fragment.index,
                overlap,
                lines
            );
        }

        let composite = self.append(composite, &fragment.buffer, overlap)?;
        self.insertion_offset += lines - overlap;
        self.composite = Some(composite);
        self.previous = Some(fragment);
        self.fragments += 1;
        Ok(())
    }

    /// The stitched image, or `None` if no fragment was added.
    ///
    /// Releases the previous fragment; later calls return the same composite.
    pub fn result(&mut self) -> Option<&CaptureBuffer> {
        if !self.finished {
            self.finished = true;
            self.previous = None;
            if let Some(composite) = &self.composite {
                log::info!(
                    "Stitched {} fragments into {}x{}",
                    self.fragments,
                    composite.width(),
                    composite.height()
                );
            }
        }
        self.composite.as_ref()
    }

    /// Moves the stitched image out.
    pub fn into_result(mut self) -> Option<CaptureBuffer> {
        self.result();
        self.composite.take()
    }

    fn line_count(&self, buffer: &CaptureBuffer) -> u32 {
        match self.axis {
            ScrollAxis::Vertical => buffer.height(),
            ScrollAxis::Horizontal => buffer.width(),
        }
    }

    fn cross_size(&self, buffer: &CaptureBuffer) -> u32 {
        match self.axis {
            ScrollAxis::Vertical => buffer.width(),
            ScrollAxis::Horizontal => buffer.height(),
        }
    }

    /// Lines along the axis that `next` advanced past `previous`; `None` when
    /// the offsets carry no forward movement (unknown or scrolled back).
    fn scroll_delta(&self, previous: ScrollPosition, next: ScrollPosition) -> Option<u32> {
        let delta = match self.axis {
            ScrollAxis::Vertical => i64::from(next.y) - i64::from(previous.y),
            ScrollAxis::Horizontal => i64::from(next.x) - i64::from(previous.x),
        };
        u32::try_from(delta).ok().filter(|delta| *delta > 0)
    }

    /// Lines `next` shares with `previous`.
    ///
    /// Known offsets fix the band size, so uniform content at the seam is kept.
    /// Without them the largest pixel-identical band is used.
    fn overlap_with(&self, previous: &ViewportFragment, next: &ViewportFragment) -> u32 {
        let previous_lines = self.line_count(&previous.buffer);
        let Some(delta) = self.scroll_delta(previous.offset, next.offset) else {
            return self.find_overlap(&previous.buffer, &next.buffer, previous_lines);
        };

        let expected = previous_lines
            .saturating_sub(delta)
            .min(self.line_count(&next.buffer));
        if expected == 0 {
            return 0;
        }

        let start = previous_lines - expected;
        let matches = (0..expected)
            .all(|line| lines_equal(&previous.buffer, start + line, &next.buffer, line, self.axis));
        if matches {
            return expected;
        }

        log::debug!(
            "Fragment {} does not match its predecessor over the {} lines its offset implies, searching pixels",
            next.index,
            expected
        );
        self.find_overlap(&previous.buffer, &next.buffer, expected)
    }

    /// Largest `k <= limit` such that the last `k` lines of `previous` equal the first `k` of `next`.
    fn find_overlap(&self, previous: &CaptureBuffer, next: &CaptureBuffer, limit: u32) -> u32 {
        let previous_hashes = line_hashes(previous, self.axis);
        let next_hashes = line_hashes(next, self.axis);
        let previous_len = previous_hashes.len();
        let max_overlap = previous_len.min(next_hashes.len()).min(limit as usize);

        for overlap in (self.min_overlap as usize..=max_overlap).rev() {
            let tail = &previous_hashes[previous_len - overlap..];
            let head = &next_hashes[..overlap];
            if tail != head {
                continue;
            }
            let start = (previous_len - overlap) as u32;
            let verified = (0..overlap as u32)
                .all(|line| lines_equal(previous, start + line, next, line, self.axis));
            if verified {
                return overlap as u32;
            }
        }
        0
    }

    fn append(
        &self,
        composite: CaptureBuffer,
        fragment: &CaptureBuffer,
        overlap: u32,
    ) -> Result<CaptureBuffer, CaptureError> {
        let origin = composite.origin();
        let cursor = composite.cursor();
        let format = composite.format();
        let (width, height) = (composite.width(), composite.height());

        let mut stitched = match self.axis {
            ScrollAxis::Vertical => {
                let mut pixels = composite.into_pixels();
                let skip = overlap as usize * fragment.width() as usize;
                pixels.extend_from_slice(&fragment.pixels()[skip..]);
                CaptureBuffer::from_pixels(
                    width,
                    height + fragment.height() - overlap,
                    format,
                    pixels,
                    origin,
                )?
            }
            ScrollAxis::Horizontal => {
                let new_width = width + fragment.width() - overlap;
                let mut pixels = Vec::with_capacity(new_width as usize * height as usize);
                for y in 0..height {
                    pixels.extend_from_slice(composite.row(y));
                    pixels.extend_from_slice(&fragment.row(y)[overlap as usize..]);
                }
                CaptureBuffer::from_pixels(new_width, height, format, pixels, origin)?
            }
        };
        stitched.set_cursor(cursor);
        Ok(stitched)
    }
}

fn line_hashes(buffer: &CaptureBuffer, axis: ScrollAxis) -> Vec<u64> {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let fold = |hash: u64, pixel: u32| (hash ^ u64::from(pixel)).wrapping_mul(FNV_PRIME);
    match axis {
        ScrollAxis::Vertical => (0..buffer.height())
            .map(|y| buffer.row(y).iter().fold(FNV_OFFSET, |h, p| fold(h, *p)))
            .collect(),
        ScrollAxis::Horizontal => (0..buffer.width())
            .map(|x| {
                (0..buffer.height())
                    .filter_map(|y| buffer.pixel(x, y))
                    .fold(FNV_OFFSET, fold)
            })
            .collect(),
    }
}

fn lines_equal(a: &CaptureBuffer, a_line: u32, b: &CaptureBuffer, b_line: u32, axis: ScrollAxis) -> bool {
    match axis {
        ScrollAxis::Vertical => a.row(a_line) == b.row(b_line),
        ScrollAxis::Horizontal => {
            (0..a.height()).all(|y| a.pixel(a_line, y) == b.pixel(b_line, y))
        }
    }
}

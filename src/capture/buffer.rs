//! Owned pixel buffers moved through the capture pipeline.

use std::fmt;
use std::io::Cursor;

use crate::capture::types::CaptureError;
use crate::util::{Point, Rect};

/// Pixel layout of a [`CaptureBuffer`]. Both store one `u32` per pixel as `0xAARRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Premultiplied alpha, matching cairo's `ARgb32`.
    Argb32,
    /// Opaque pixels, alpha byte forced to `0xFF`.
    Rgb24,
}

impl PixelFormat {
    fn cairo_format(self) -> cairo::Format {
        match self {
            PixelFormat::Argb32 => cairo::Format::ARgb32,
            PixelFormat::Rgb24 => cairo::Format::Rgb24,
        }
    }
}

/// An owned pixel grid plus where it came from on the desktop.
///
/// The grid always holds exactly `width * height` pixels. Buffers are moved
/// between components rather than shared.
#[derive(Clone, PartialEq, Eq)]
pub struct CaptureBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<u32>,
    origin: Point,
    cursor: Option<Point>,
}

impl fmt::Debug for CaptureBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("origin", &self.origin)
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl CaptureBuffer {
    /// Creates a zero-filled buffer.
    pub fn new(width: u32, height: u32, format: PixelFormat, origin: Point) -> Self {
        Self {
            width,
            height,
            format,
            pixels: vec![0; width as usize * height as usize],
            origin,
            cursor: None,
        }
    }

    /// Wraps an existing pixel grid, checking it matches the declared size.
    pub fn from_pixels(
        width: u32,
        height: u32,
        format: PixelFormat,
        pixels: Vec<u32>,
        origin: Point,
    ) -> Result<Self, CaptureError> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(CaptureError::InvalidBuffer(format!(
                "{}x{} buffer needs {} pixels, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }

        Ok(Self {
            width,
            height,
            format,
            pixels,
            origin,
            cursor: None,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    pub fn set_origin(&mut self, origin: Point) {
        self.origin = origin;
    }

    /// Cursor position in desktop coordinates, if recorded.
    pub fn cursor(&self) -> Option<Point> {
        self.cursor
    }

    pub fn set_cursor(&mut self, cursor: Option<Point>) {
        self.cursor = cursor;
    }

    /// Cursor position translated into buffer-local coordinates.
    ///
    /// Returns `None` when no cursor was recorded or it lies outside the buffer.
    pub fn local_cursor(&self) -> Option<Point> {
        let cursor = self.cursor?;
        let bounds = self.bounds()?;
        bounds
            .contains_point(cursor)
            .then(|| cursor.relative_to(self.origin))
    }

    /// Desktop rectangle covered by this buffer.
    pub fn bounds(&self) -> Option<Rect> {
        Rect::new(
            self.origin.x,
            self.origin.y,
            i32::try_from(self.width).ok()?,
            i32::try_from(self.height).ok()?,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn same_size(&self, other: &CaptureBuffer) -> bool {
        self.width == other.width && self.height == other.height
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u32] {
        &mut self.pixels
    }

    /// Consumes the buffer, returning its pixel grid.
    pub fn into_pixels(self) -> Vec<u32> {
        self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// One row of pixels. Panics if `y` is out of range.
    pub fn row(&self, y: u32) -> &[u32] {
        let start = y as usize * self.width as usize;
        &self.pixels[start..start + self.width as usize]
    }

    /// Fraction of pixels whose colour channels are all zero (alpha ignored).
    pub fn black_fraction(&self) -> f64 {
        if self.pixels.is_empty() {
            return 0.0;
        }
        let black = self
            .pixels
            .iter()
            .filter(|pixel| **pixel & 0x00FF_FFFF == 0)
            .count();
        black as f64 / self.pixels.len() as f64
    }

    /// Moves the pixels of a same-sized buffer into this one, keeping this
    /// buffer's origin, format and cursor.
    pub fn replace_pixels(&mut self, source: CaptureBuffer) -> Result<(), CaptureError> {
        if !self.same_size(&source) {
            return Err(CaptureError::InvalidBuffer(format!(
                "cannot transplant {}x{} pixels into a {}x{} buffer",
                source.width, source.height, self.width, self.height
            )));
        }
        self.pixels = source.pixels;
        Ok(())
    }

    /// Takes over the size, pixels and origin of `source`; the cursor annotation is kept.
    pub fn replace_content(&mut self, source: CaptureBuffer) {
        self.width = source.width;
        self.height = source.height;
        self.format = source.format;
        self.pixels = source.pixels;
        self.origin = source.origin;
    }

    /// Decodes PNG bytes into a buffer positioned at `origin`.
    pub fn from_png(bytes: &[u8], origin: Point) -> Result<Self, CaptureError> {
        let decoded = cairo::ImageSurface::create_from_png(&mut Cursor::new(bytes))
            .map_err(|e| CaptureError::ImageError(format!("Failed to decode PNG: {}", e)))?;

        let (format, mut surface) = match decoded.format() {
            cairo::Format::ARgb32 => (PixelFormat::Argb32, decoded),
            cairo::Format::Rgb24 => (PixelFormat::Rgb24, decoded),
            other => {
                log::debug!("Converting {:?} PNG surface to ARGB32", other);
                (PixelFormat::Argb32, convert_to_argb32(&decoded)?)
            }
        };

        let width = surface.width().max(0) as u32;
        let height = surface.height().max(0) as u32;
        let stride = surface.stride().max(0) as usize;
        let data = surface
            .data()
            .map_err(|e| CaptureError::ImageError(format!("Cannot read PNG pixels: {}", e)))?;

        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height as usize {
            let row = &data[y * stride..y * stride + width as usize * 4];
            pixels.extend(row.chunks_exact(4).map(|px| {
                let value = u32::from_ne_bytes([px[0], px[1], px[2], px[3]]);
                match format {
                    PixelFormat::Rgb24 => value | 0xFF00_0000,
                    PixelFormat::Argb32 => value,
                }
            }));
        }
        drop(data);

        Self::from_pixels(width, height, format, pixels, origin)
    }

    /// Encodes the buffer as PNG.
    pub fn to_png(&self) -> Result<Vec<u8>, CaptureError> {
        if self.is_empty() {
            return Err(CaptureError::InvalidBuffer(
                "cannot encode an empty buffer".into(),
            ));
        }

        let mut surface = cairo::ImageSurface::create(
            self.format.cairo_format(),
            self.width as i32,
            self.height as i32,
        )
        .map_err(|e| CaptureError::ImageError(format!("Failed to create surface: {}", e)))?;

        let stride = surface.stride().max(0) as usize;
        {
            let mut data = surface
                .data()
                .map_err(|e| CaptureError::ImageError(format!("Cannot write pixels: {}", e)))?;
            for y in 0..self.height {
                let start = y as usize * stride;
                for (x, pixel) in self.row(y).iter().enumerate() {
                    let offset = start + x * 4;
                    data[offset..offset + 4].copy_from_slice(&pixel.to_ne_bytes());
                }
            }
        }

        let mut png = Vec::new();
        surface
            .write_to_png(&mut png)
            .map_err(|e| CaptureError::ImageError(format!("Failed to encode PNG: {}", e)))?;
        Ok(png)
    }
}

fn convert_to_argb32(source: &cairo::ImageSurface) -> Result<cairo::ImageSurface, CaptureError> {
    let target =
        cairo::ImageSurface::create(cairo::Format::ARgb32, source.width(), source.height())
            .map_err(|e| CaptureError::ImageError(format!("Failed to create surface: {}", e)))?;
    {
        let ctx = cairo::Context::new(&target)
            .map_err(|e| CaptureError::ImageError(format!("Failed to create context: {}", e)))?;
        ctx.set_source_surface(source, 0.0, 0.0)
            .map_err(|e| CaptureError::ImageError(format!("Failed to set source: {}", e)))?;
        ctx.paint()
            .map_err(|e| CaptureError::ImageError(format!("Failed to paint: {}", e)))?;
    }
    target.flush();
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: u32 = 0xFF00_0000;
    const WHITE: u32 = 0xFFFF_FFFF;

    fn filled(width: u32, height: u32, black_pixels: usize) -> CaptureBuffer {
        let mut pixels = vec![WHITE; (width * height) as usize];
        for pixel in pixels.iter_mut().take(black_pixels) {
            *pixel = BLACK;
        }
        CaptureBuffer::from_pixels(width, height, PixelFormat::Argb32, pixels, Point::default())
            .unwrap()
    }

    #[test]
    fn rejects_mismatched_grid() {
        let result = CaptureBuffer::from_pixels(
            4,
            4,
            PixelFormat::Argb32,
            vec![0; 15],
            Point::default(),
        );
        assert!(matches!(result, Err(CaptureError::InvalidBuffer(_))));
    }

    #[test]
    fn black_fraction_ignores_alpha() {
        let mut buffer = filled(10, 10, 25);
        assert!((buffer.black_fraction() - 0.25).abs() < f64::EPSILON);

        buffer.pixels_mut()[99] = 0x0000_0000;
        assert!((buffer.black_fraction() - 0.26).abs() < 1e-9);
    }

    #[test]
    fn replace_pixels_keeps_metadata() {
        let mut direct = filled(4, 4, 16);
        direct.set_origin(Point::new(100, 200));
        direct.set_cursor(Some(Point::new(101, 201)));

        direct.replace_pixels(filled(4, 4, 0)).unwrap();
        assert_eq!(direct.black_fraction(), 0.0);
        assert_eq!(direct.origin(), Point::new(100, 200));
        assert_eq!(direct.local_cursor(), Some(Point::new(1, 1)));

        assert!(direct.replace_pixels(filled(2, 2, 0)).is_err());
    }

    #[test]
    fn cursor_outside_buffer_is_dropped() {
        let mut buffer = filled(4, 4, 0);
        buffer.set_cursor(Some(Point::new(10, 10)));
        assert_eq!(buffer.local_cursor(), None);
    }

    #[test]
    fn png_round_trip_preserves_pixels() {
        let mut buffer = filled(3, 2, 2);
        buffer.pixels_mut()[5] = 0xFF12_3456;
        let png = buffer.to_png().unwrap();
        assert_eq!(&png[0..8], &[137, 80, 78, 71, 13, 10, 26, 10]);

        let decoded = CaptureBuffer::from_png(&png, Point::new(5, 5)).unwrap();
        assert_eq!(decoded.width(), 3);
        assert_eq!(decoded.height(), 2);
        assert_eq!(decoded.pixels(), buffer.pixels());
        assert_eq!(decoded.origin(), Point::new(5, 5));
    }

    #[test]
    fn empty_buffer_cannot_be_encoded() {
        let buffer = CaptureBuffer::new(0, 0, PixelFormat::Argb32, Point::default());
        assert!(buffer.is_empty());
        assert!(buffer.to_png().is_err());
    }
}

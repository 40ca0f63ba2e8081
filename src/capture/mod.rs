//! Screenshot capture functionality for stitchshot.
//!
//! This module provides:
//! - Region, last-region and full screen capture
//! - Window capture with backend selection and black-pixel cross-checks
//! - Scrolling capture stitched from overlapping viewports
//! - Clipboard and file image sources
//! - Delivery to files and the clipboard

pub mod backend;
pub mod buffer;
pub mod clipboard;
pub mod dependencies;
pub mod file;
pub mod scroll;
pub mod selector;
pub mod sink;
pub mod stitch;
pub mod types;

mod manager;
mod pipeline;
mod sources;

pub use buffer::{CaptureBuffer, PixelFormat};
pub use dependencies::CaptureDependencies;
pub use manager::CaptureManager;
pub use pipeline::{CapturePipeline, CaptureSettings};
pub use scroll::CancellationToken;
pub use stitch::{BitmapStitcher, ScrollAxis, ViewportFragment};
pub use types::{
    BackendKind, CaptureDestination, CaptureDetails, CaptureError, CaptureMethod, CaptureOutcome,
    CaptureResult, CaptureStatus, CaptureSummary, CaptureTarget, CaptureType, WindowHandle,
};

//! Library exports for stitchshot.
//!
//! Exposes the capture engine (backend selection, scrolling capture and
//! stitching) together with configuration so other front ends can drive
//! captures with their own platform adapters.

pub mod capture;
pub mod config;
pub mod util;

pub use config::Config;

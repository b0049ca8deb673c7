//! Capture backends
//!
//! This module provides the segment capture and concatenation backend,
//! and the concat manifest the backend reads.

pub mod ffmpeg;
pub mod manifest;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use ffmpeg::{FfmpegBackend, FfmpegOptions};
pub use manifest::ConcatManifest;
pub use traits::{default_device_format, CaptureBackend, CaptureError, CaptureSource};

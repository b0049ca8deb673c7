//! Capture trait definitions
//!
//! Backend-agnostic interface for producing and joining segment files.

use super::manifest::ConcatManifest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Capture backend errors
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to start capture backend: {0}")]
    Spawn(std::io::Error),

    #[error("Capture backend exited with {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("Capture backend timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where segments are captured from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum CaptureSource {
    /// Live capture device, read through a platform input format
    Device { format: String, name: String },

    /// Finite media file, looped forever so capture never starves
    File { path: PathBuf },
}

impl CaptureSource {
    /// Classify a configured source string.
    ///
    /// An existing regular file is looped; anything else is opened as a
    /// device through `device_format`.
    pub fn detect(source: &str, device_format: &str) -> Self {
        let path = Path::new(source);
        if path.is_file() {
            CaptureSource::File {
                path: path.to_path_buf(),
            }
        } else {
            CaptureSource::Device {
                format: device_format.to_string(),
                name: source.to_string(),
            }
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, CaptureSource::File { .. })
    }
}

impl std::fmt::Display for CaptureSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureSource::Device { format, name } => write!(f, "{} device '{}'", format, name),
            CaptureSource::File { path } => write!(f, "looped file {:?}", path),
        }
    }
}

/// Default input format for live devices on this platform
pub fn default_device_format() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        "dshow"
    }

    #[cfg(target_os = "macos")]
    {
        "avfoundation"
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        "v4l2"
    }
}

/// External encoder/muxer used by the recorder and the replay assembler.
///
/// Implementations own no buffer state. A returned `Ok` only means the
/// backend reported success; callers still check the output file exists.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Capture exactly `duration` of `source` into `destination`, overwriting it.
    async fn capture_segment(
        &self,
        source: &CaptureSource,
        duration: Duration,
        destination: &Path,
    ) -> Result<(), CaptureError>;

    /// Losslessly join the manifest's inputs, in order, into `destination`.
    async fn concatenate(
        &self,
        manifest: &ConcatManifest,
        destination: &Path,
        timeout: Duration,
    ) -> Result<(), CaptureError>;
}

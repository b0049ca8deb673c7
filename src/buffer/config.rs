//! Buffer configuration
//!
//! Every field has a default, so a config file only needs the values it
//! changes.

use crate::capture::{default_device_format, CaptureSource, FfmpegOptions};
use crate::recorder::RecorderConfig;
use crate::utils::error::{ReplayError, ReplayResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// Buffer Config
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Length of the replay window in seconds
    pub buffer_duration: u64,
    /// Length of one segment in seconds
    pub segment_duration: u64,
    /// Capture device name, or a file path to loop
    pub video_source: String,
    /// Input format for devices; platform default when unset
    pub device_format: Option<String>,
    /// Directory holding the segment files of this buffer
    pub output_dir: PathBuf,
    /// Directory for timestamped replays
    pub replays_dir: PathBuf,
    /// Pause before retrying a failed capture
    pub capture_retry_delay_ms: u64,
    /// Extra wait after the first segment interval on start
    pub warmup_grace_ms: u64,
    /// How long stop waits for the capture loop
    pub stop_timeout_secs: u64,
    /// Upper bound for one concatenation
    pub concat_timeout_secs: u64,
    /// Encoder settings
    pub ffmpeg: FfmpegOptions,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            buffer_duration: 60,
            segment_duration: 10,
            video_source: "USB CAMERA".to_string(),
            device_format: None,
            output_dir: PathBuf::from("buffer"),
            replays_dir: PathBuf::from("replays"),
            capture_retry_delay_ms: 1000,
            warmup_grace_ms: 1000,
            stop_timeout_secs: 5,
            concat_timeout_secs: 30,
            ffmpeg: FfmpegOptions::default(),
        }
    }
}

impl BufferConfig {
    /// Load a config from a JSON file
    pub fn from_file(path: &Path) -> ReplayResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: BufferConfig = serde_json::from_str(&content)?;
        config.validate()?;

        tracing::debug!("Loaded buffer config from {:?}", path);
        Ok(config)
    }

    /// Number of segments the window holds, rounded down
    pub fn max_segments(&self) -> ReplayResult<usize> {
        if self.segment_duration == 0 {
            return Err(ReplayError::Configuration(
                "segment_duration must be greater than zero".to_string(),
            ));
        }

        let max_segments = self.buffer_duration / self.segment_duration;
        if max_segments == 0 {
            return Err(ReplayError::Configuration(format!(
                "buffer_duration ({}s) is shorter than one segment ({}s)",
                self.buffer_duration, self.segment_duration
            )));
        }

        Ok(max_segments as usize)
    }

    pub fn validate(&self) -> ReplayResult<()> {
        self.max_segments()?;
        if self.video_source.trim().is_empty() {
            return Err(ReplayError::Configuration(
                "video_source must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the configured source against the file system
    pub fn capture_source(&self) -> CaptureSource {
        let format = self
            .device_format
            .as_deref()
            .unwrap_or(default_device_format());
        CaptureSource::detect(&self.video_source, format)
    }

    pub fn segment_interval(&self) -> Duration {
        Duration::from_secs(self.segment_duration)
    }

    pub fn concat_timeout(&self) -> Duration {
        Duration::from_secs(self.concat_timeout_secs)
    }

    /// Capture loop settings derived from this config
    pub fn recorder_config(&self) -> RecorderConfig {
        RecorderConfig {
            source: self.capture_source(),
            segment_duration: self.segment_interval(),
            retry_delay: Duration::from_millis(self.capture_retry_delay_ms),
            warmup_grace: Duration::from_millis(self.warmup_grace_ms),
            stop_timeout: Duration::from_secs(self.stop_timeout_secs),
        }
    }
}

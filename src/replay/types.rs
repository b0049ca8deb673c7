//! Replay types
//!
//! Read-only projections handed to callers: buffer health and saved replays.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Point-in-time view of the buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferInfo {
    /// Whether the recorder is running
    pub is_recording: bool,
    /// Segments currently in the window
    pub segment_count: usize,
    /// Window capacity
    pub max_segments: usize,
    /// Configured window length in seconds
    pub buffer_duration: u64,
    /// Length of one segment in seconds
    pub segment_duration: u64,
    /// Seconds of video a replay would contain right now
    pub total_available_duration: u64,
}

impl BufferInfo {
    /// Whether the window has reached capacity
    pub fn is_full(&self) -> bool {
        self.segment_count >= self.max_segments
    }
}

/// A replay materialized on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedReplay {
    /// Unique identifier for the replay
    pub id: Uuid,
    /// Output file
    pub path: PathBuf,
    /// Output size in bytes
    pub file_size: u64,
    /// Segments joined into the output
    pub segment_count: usize,
    /// Approximate length in seconds, at segment granularity
    pub duration_secs: u64,
    /// When the replay was assembled
    pub created_at: DateTime<Utc>,
}

impl SavedReplay {
    /// File name component of the output path
    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

//! Recorder state management
//!
//! Defines the recorder state machine and the events it broadcasts.

use crate::capture::CaptureSource;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Current state of the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    /// No capture loop is producing segments
    #[default]
    Stopped,
    /// The capture loop is producing segments
    Running,
}

impl RecorderState {
    pub fn is_running(&self) -> bool {
        *self == RecorderState::Running
    }
}

/// Events emitted by the recorder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    /// Capture loop launched
    Started,
    /// Capture loop asked to stop
    Stopped,
    /// A segment was captured and appended to the window
    SegmentCaptured {
        sequence: u64,
        evicted: Option<u64>,
    },
    /// A capture attempt failed and will be retried with the same sequence
    CaptureFailed { sequence: u64, message: String },
}

/// Settings for the capture loop
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Source every segment is captured from
    pub source: CaptureSource,

    /// Wall-clock length of one segment
    pub segment_duration: Duration,

    /// Pause before retrying a failed capture
    pub retry_delay: Duration,

    /// Extra wait on top of one segment interval before `start` returns
    pub warmup_grace: Duration,

    /// How long `stop` waits for the loop to acknowledge
    pub stop_timeout: Duration,
}

impl RecorderConfig {
    /// Time `start` blocks so a first segment exists
    pub fn warmup(&self) -> Duration {
        self.segment_duration + self.warmup_grace
    }
}

//! Recording system module
//!
//! This module implements the segmented ring-buffer recorder:
//! - SegmentStore holding the bounded window of recent segments
//! - SegmentRecorder driving the continuous capture loop
//! - RecorderState and events describing its lifecycle

pub mod coordinator;
pub mod state;
pub mod store;

pub use coordinator::SegmentRecorder;
pub use state::{RecorderConfig, RecorderEvent, RecorderState};
pub use store::SegmentStore;

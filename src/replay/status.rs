//! Buffer status reporting

use super::types::BufferInfo;
use crate::recorder::{RecorderState, SegmentStore};

/// Derive buffer health from recorder state and the current window length.
///
/// Takes only the store's own lock and never touches the backend.
pub fn buffer_info(
    state: RecorderState,
    store: &SegmentStore,
    buffer_duration: u64,
    segment_duration: u64,
) -> BufferInfo {
    let segment_count = store.len();
    BufferInfo {
        is_recording: state.is_running(),
        segment_count,
        max_segments: store.max_segments(),
        buffer_duration,
        segment_duration,
        total_available_duration: segment_count as u64 * segment_duration,
    }
}

//! Replay buffer instance
//!
//! Owns the segment store, recorder and assembler for one capture source.
//! Construct it once at startup, hand references to whatever serves
//! requests, and call [`ReplayBuffer::shutdown`] on the way out.

use super::config::BufferConfig;
use crate::capture::{CaptureBackend, FfmpegBackend};
use crate::recorder::{RecorderEvent, RecorderState, SegmentRecorder, SegmentStore};
use crate::replay::{buffer_info, BufferInfo, ReplayAssembler, SavedReplay};
use crate::utils::error::ReplayResult;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Rolling window of recent video that can be saved at any moment
pub struct ReplayBuffer {
    config: BufferConfig,
    store: Arc<SegmentStore>,
    recorder: SegmentRecorder,
    assembler: ReplayAssembler,
}

impl ReplayBuffer {
    /// Build a stopped buffer and wipe segments left by a previous run
    pub fn new(config: BufferConfig, backend: Arc<dyn CaptureBackend>) -> ReplayResult<Self> {
        config.validate()?;
        let max_segments = config.max_segments()?;

        let store = Arc::new(SegmentStore::new(&config.output_dir, max_segments)?);
        store.clear();

        let recorder =
            SegmentRecorder::new(config.recorder_config(), store.clone(), backend.clone());
        let assembler = ReplayAssembler::new(
            store.clone(),
            backend,
            config.concat_timeout(),
            config.segment_duration,
        );

        tracing::info!(
            "Replay buffer initialized: {}s window of {}s segments ({} max) in {:?}",
            config.buffer_duration,
            config.segment_duration,
            max_segments,
            store.dir()
        );

        Ok(Self {
            config,
            store,
            recorder,
            assembler,
        })
    }

    /// Build a buffer that captures through FFmpeg
    pub fn with_ffmpeg(config: BufferConfig) -> ReplayResult<Self> {
        let backend = Arc::new(FfmpegBackend::new(config.ffmpeg.clone()));
        Self::new(config, backend)
    }

    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    pub fn state(&self) -> RecorderState {
        self.recorder.state()
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_running()
    }

    /// Subscribe to recorder events
    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.recorder.subscribe()
    }

    /// Start recording; blocks for one segment interval on a fresh start
    pub async fn start(&self) -> ReplayResult<()> {
        self.recorder.start().await
    }

    /// Stop recording after the in-flight segment
    pub async fn stop(&self) {
        self.recorder.stop().await
    }

    /// Save the current window to `output_path`
    pub async fn save_replay(&self, output_path: &Path) -> ReplayResult<SavedReplay> {
        let result = self
            .assembler
            .assemble(self.recorder.state(), output_path)
            .await;

        match &result {
            Err(e) if e.is_precondition() => {
                tracing::warn!("Replay {:?} not saved: {}", output_path, e)
            }
            Err(e) => tracing::error!("Failed to save replay {:?}: {}", output_path, e),
            Ok(_) => {}
        }
        result
    }

    /// Save the current window into the replays directory under a
    /// timestamped name
    pub async fn save_timestamped_replay(&self) -> ReplayResult<SavedReplay> {
        let path = unique_replay_path(&self.config.replays_dir, Local::now());
        self.save_replay(&path).await
    }

    /// Current buffer health
    pub fn get_buffer_info(&self) -> BufferInfo {
        buffer_info(
            self.recorder.state(),
            &self.store,
            self.config.buffer_duration,
            self.config.segment_duration,
        )
    }

    /// Seconds of video currently available for a replay
    pub fn available_duration(&self) -> u64 {
        self.get_buffer_info().total_available_duration
    }

    /// Stop recording and release the buffer
    pub async fn shutdown(self) {
        self.recorder.stop().await;
        tracing::info!("Replay buffer shut down");
    }
}

/// Replay file name for a save requested at `at`
pub fn replay_file_name(at: DateTime<Local>) -> String {
    at.format("replay-%d-%m-%Y_%H-%M-%S.mp4").to_string()
}

// Saves within the same second get a numeric suffix instead of overwriting.
fn unique_replay_path(dir: &Path, at: DateTime<Local>) -> PathBuf {
    let name = replay_file_name(at);
    let candidate = dir.join(&name);
    if !candidate.exists() {
        return candidate;
    }

    let stem = name.trim_end_matches(".mp4");
    let mut n = 1;
    loop {
        let path = dir.join(format!("{}_{}.mp4", stem, n));
        if !path.exists() {
            return path;
        }
        n += 1;
    }
}

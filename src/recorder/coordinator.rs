//! Segment recorder
//!
//! Drives the continuous capture loop and manages its lifecycle.

use super::state::{RecorderConfig, RecorderEvent, RecorderState};
use super::store::SegmentStore;
use crate::capture::{CaptureBackend, CaptureSource};
use crate::utils::error::{ReplayError, ReplayResult};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;

/// A launched capture loop and its cancellation signal
struct CaptureTask {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Produces segments into a [`SegmentStore`] until stopped
pub struct SegmentRecorder {
    /// Capture loop settings
    config: RecorderConfig,

    /// Window the loop appends to
    store: Arc<SegmentStore>,

    /// Encoder invoked once per segment
    backend: Arc<dyn CaptureBackend>,

    /// Current recorder state
    state: Arc<RwLock<RecorderState>>,

    /// Sequence number of the next segment to capture
    next_sequence: Arc<AtomicU64>,

    /// Running (or abandoned) capture loop
    task: Mutex<Option<CaptureTask>>,

    /// Event broadcaster
    event_tx: broadcast::Sender<RecorderEvent>,
}

impl SegmentRecorder {
    /// Create a stopped recorder
    pub fn new(
        config: RecorderConfig,
        store: Arc<SegmentStore>,
        backend: Arc<dyn CaptureBackend>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            config,
            store,
            backend,
            state: Arc::new(RwLock::new(RecorderState::Stopped)),
            next_sequence: Arc::new(AtomicU64::new(0)),
            task: Mutex::new(None),
            event_tx,
        }
    }

    /// Get the current recorder state
    pub fn state(&self) -> RecorderState {
        *self.state.read()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Sequence number the loop will capture next
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Subscribe to recorder events
    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.event_tx.subscribe()
    }

    /// Start recording.
    ///
    /// Returns immediately if already running. Otherwise clears stale
    /// segments, launches the capture loop and blocks for one segment
    /// interval plus the warm-up grace so a replay can be saved right away.
    pub async fn start(&self) -> ReplayResult<()> {
        let mut task = self.task.lock().await;

        if self.is_running() {
            tracing::warn!("Recorder is already running");
            return Ok(());
        }

        if let Some(stale) = task.take() {
            if let Err(stale) = self.reap(stale).await {
                *task = Some(stale);
                return Err(ReplayError::RecorderBusy);
            }
        }

        std::fs::create_dir_all(self.store.dir())?;
        self.store.clear();

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let capture_loop = CaptureLoop {
            source: self.config.source.clone(),
            segment_duration: self.config.segment_duration,
            retry_delay: self.config.retry_delay,
            store: self.store.clone(),
            backend: self.backend.clone(),
            next_sequence: self.next_sequence.clone(),
            state: self.state.clone(),
            event_tx: self.event_tx.clone(),
            cancel: cancel_rx,
        };

        *self.state.write() = RecorderState::Running;
        let handle = tokio::spawn(capture_loop.run());
        *task = Some(CaptureTask {
            cancel: cancel_tx,
            handle,
        });
        drop(task);

        let _ = self.event_tx.send(RecorderEvent::Started);
        tracing::info!(
            "Recorder started: {} in {:?} segments",
            self.config.source,
            self.config.segment_duration
        );

        tokio::time::sleep(self.config.warmup()).await;
        Ok(())
    }

    /// Stop recording.
    ///
    /// The loop finishes its in-flight segment before exiting. If it does
    /// not acknowledge within the stop timeout it is left to exit on its own.
    pub async fn stop(&self) {
        let mut task = self.task.lock().await;

        if !self.is_running() {
            return;
        }

        tracing::info!("Stopping recorder");
        let running = task.take();
        if let Some(running) = &running {
            running.cancel.send_replace(true);
        }
        // Waits out an append in progress; later appends see Stopped.
        *self.state.write() = RecorderState::Stopped;
        let _ = self.event_tx.send(RecorderEvent::Stopped);

        let Some(mut running) = running else {
            return;
        };

        match tokio::time::timeout(self.config.stop_timeout, &mut running.handle).await {
            Ok(Ok(())) => tracing::info!("Recorder stopped"),
            Ok(Err(e)) => tracing::error!("Capture loop ended abnormally: {}", e),
            Err(_) => {
                tracing::warn!(
                    "Capture loop did not exit within {:?}; it will exit after its current segment",
                    self.config.stop_timeout
                );
                *task = Some(running);
            }
        }
    }

    /// Wait once more for a loop abandoned by a timed-out stop
    async fn reap(&self, mut stale: CaptureTask) -> Result<(), CaptureTask> {
        if stale.handle.is_finished() {
            return Ok(());
        }

        tracing::info!("Waiting for previous capture loop to exit");
        match tokio::time::timeout(self.config.stop_timeout, &mut stale.handle).await {
            Ok(_) => Ok(()),
            Err(_) => Err(stale),
        }
    }
}

impl Drop for SegmentRecorder {
    fn drop(&mut self) {
        *self.state.write() = RecorderState::Stopped;
        if let Some(task) = self.task.get_mut().as_ref() {
            task.cancel.send_replace(true);
        }
    }
}

/// State owned by one run of the capture loop
struct CaptureLoop {
    source: CaptureSource,
    segment_duration: Duration,
    retry_delay: Duration,
    store: Arc<SegmentStore>,
    backend: Arc<dyn CaptureBackend>,
    next_sequence: Arc<AtomicU64>,
    state: Arc<RwLock<RecorderState>>,
    event_tx: broadcast::Sender<RecorderEvent>,
    cancel: watch::Receiver<bool>,
}

impl CaptureLoop {
    async fn run(self) {
        tracing::debug!(
            "Capture loop running from segment {}",
            self.next_sequence.load(Ordering::SeqCst)
        );

        // Cancellation is only observed between iterations, never mid-capture.
        while !self.is_cancelled() {
            let sequence = self.next_sequence.load(Ordering::SeqCst);
            let path = self.store.segment_path(sequence);

            tracing::debug!("Capturing segment {}: {:?}", sequence, path);
            match self.capture(&path).await {
                Ok(()) => {
                    let Some(evicted) = self.append(sequence) else {
                        discard_segment(sequence, &path);
                        break;
                    };
                    tracing::debug!("Segment {} added to buffer", sequence);
                    let _ = self
                        .event_tx
                        .send(RecorderEvent::SegmentCaptured { sequence, evicted });
                }
                Err(message) => {
                    tracing::warn!("Failed to capture segment {}: {}", sequence, message);
                    let _ = self
                        .event_tx
                        .send(RecorderEvent::CaptureFailed { sequence, message });
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }

        tracing::debug!("Capture loop exited");
    }

    async fn capture(&self, path: &Path) -> Result<(), String> {
        self.backend
            .capture_segment(&self.source, self.segment_duration, path)
            .await
            .map_err(|e| e.to_string())?;

        if !path.exists() {
            return Err(format!("backend reported success but {:?} is missing", path));
        }
        Ok(())
    }

    /// Append a finished segment unless the run has been stopped.
    ///
    /// Returns `None` when the segment must be discarded, otherwise the
    /// sequence evicted to make room.
    fn append(&self, sequence: u64) -> Option<Option<u64>> {
        let state = self.state.read();
        if !state.is_running() || self.is_cancelled() {
            return None;
        }

        let evicted = self.store.append(sequence);
        self.next_sequence.store(sequence + 1, Ordering::SeqCst);
        Some(evicted)
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel.borrow() || self.cancel.has_changed().is_err()
    }
}

// A segment finished after its run was cancelled never joins the window.
fn discard_segment(sequence: u64, path: &Path) {
    tracing::debug!("Discarding segment {} captured after stop", sequence);
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!("Could not remove discarded segment {:?}: {}", path, e);
    }
}

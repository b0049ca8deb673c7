//! In-memory stand-in for FFmpeg used by unit tests

use super::traits::{CaptureBackend, CaptureError, CaptureSource};
use super::manifest::ConcatManifest;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Backend that sleeps for the segment duration and writes small files
#[derive(Default)]
pub struct FakeBackend {
    capture_failures: AtomicUsize,
    skip_output: AtomicBool,
    fail_concat: AtomicBool,
    skip_concat_output: AtomicBool,
    captures: Mutex<Vec<PathBuf>>,
    concats: Mutex<Vec<Vec<PathBuf>>>,
    manifests_seen: Mutex<Vec<(PathBuf, bool)>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` captures
    pub fn failing_captures(self, n: usize) -> Self {
        self.capture_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn always_failing(self) -> Self {
        self.failing_captures(usize::MAX)
    }

    /// Report success without producing a file
    pub fn without_capture_output(self) -> Self {
        self.skip_output.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_concat(self) -> Self {
        self.fail_concat.store(true, Ordering::SeqCst);
        self
    }

    /// Destinations of every capture attempt, in order
    pub fn captures(&self) -> Vec<PathBuf> {
        self.captures.lock().clone()
    }

    /// Report concat success without producing a file
    pub fn without_concat_output(self) -> Self {
        self.skip_concat_output.store(true, Ordering::SeqCst);
        self
    }

    /// Inputs of every concat attempt, in order
    pub fn concats(&self) -> Vec<Vec<PathBuf>> {
        self.concats.lock().clone()
    }

    /// Manifest paths with whether each existed while the backend ran
    pub fn manifests_seen(&self) -> Vec<(PathBuf, bool)> {
        self.manifests_seen.lock().clone()
    }
}

#[async_trait]
impl CaptureBackend for FakeBackend {
    async fn capture_segment(
        &self,
        _source: &CaptureSource,
        duration: Duration,
        destination: &Path,
    ) -> Result<(), CaptureError> {
        tokio::time::sleep(duration).await;
        self.captures.lock().push(destination.to_path_buf());

        let remaining = self.capture_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != usize::MAX {
                self.capture_failures.store(remaining - 1, Ordering::SeqCst);
            }
            return Err(CaptureError::Failed {
                code: Some(1),
                stderr: "device busy".to_string(),
            });
        }

        if !self.skip_output.load(Ordering::SeqCst) {
            let name = destination.file_name().unwrap_or_default().to_string_lossy();
            std::fs::write(destination, format!("{}\n", name))?;
        }
        Ok(())
    }

    async fn concatenate(
        &self,
        manifest: &ConcatManifest,
        destination: &Path,
        _timeout: Duration,
    ) -> Result<(), CaptureError> {
        self.manifests_seen
            .lock()
            .push((manifest.path().to_path_buf(), manifest.path().exists()));
        self.concats.lock().push(manifest.inputs().to_vec());

        if self.fail_concat.load(Ordering::SeqCst) {
            return Err(CaptureError::Failed {
                code: Some(1),
                stderr: "Invalid data found when processing input".to_string(),
            });
        }

        if self.skip_concat_output.load(Ordering::SeqCst) {
            return Ok(());
        }

        let mut joined = Vec::new();
        for input in manifest.inputs() {
            joined.extend(std::fs::read(input)?);
        }
        std::fs::write(destination, joined)?;
        Ok(())
    }
}

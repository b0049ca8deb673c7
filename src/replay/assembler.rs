//! Replay assembler
//!
//! Joins a consistent snapshot of the segment window into one output file
//! while the recorder keeps capturing.

use super::types::SavedReplay;
use crate::capture::{CaptureBackend, ConcatManifest};
use crate::recorder::{RecorderState, SegmentStore};
use crate::utils::error::{ReplayError, ReplayResult};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempPath;
use uuid::Uuid;

/// File name prefix of an in-progress replay
const STAGING_PREFIX: &str = ".replay_";

/// Builds replay files from the segment window
pub struct ReplayAssembler {
    store: Arc<SegmentStore>,
    backend: Arc<dyn CaptureBackend>,
    timeout: Duration,
    segment_duration: u64,
}

impl ReplayAssembler {
    pub fn new(
        store: Arc<SegmentStore>,
        backend: Arc<dyn CaptureBackend>,
        timeout: Duration,
        segment_duration: u64,
    ) -> Self {
        Self {
            store,
            backend,
            timeout,
            segment_duration,
        }
    }

    /// Save the current window to `output_path`.
    ///
    /// Fails without touching the output when the recorder is stopped or the
    /// window is empty. Segments evicted between the snapshot and the file
    /// check are skipped. Many saves may run at once; each writes its own
    /// manifest, which is removed whatever the outcome. A failed save leaves
    /// whatever was at `output_path` untouched.
    pub async fn assemble(
        &self,
        state: RecorderState,
        output_path: &Path,
    ) -> ReplayResult<SavedReplay> {
        if !state.is_running() {
            return Err(ReplayError::NotRecording);
        }

        let snapshot = self.store.snapshot_paths();
        if snapshot.is_empty() {
            return Err(ReplayError::EmptyWindow);
        }

        let listed = snapshot.len();
        let inputs: Vec<PathBuf> = snapshot.into_iter().filter(|p| p.exists()).collect();
        if inputs.is_empty() {
            return Err(ReplayError::MissingSegments);
        }
        if inputs.len() < listed {
            tracing::debug!(
                "{} segments evicted before assembly, saving {}",
                listed - inputs.len(),
                inputs.len()
            );
        }

        let parent = match output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent,
            None => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let manifest = ConcatManifest::write_in(self.store.dir(), inputs)?;
        let segment_count = manifest.inputs().len();

        tracing::info!(
            "Saving replay {:?} from {} segments",
            output_path,
            segment_count
        );

        // The backend writes a staging file; the output only appears once it is complete.
        let staged = staging_file(parent, output_path)?;
        let result = self
            .backend
            .concatenate(&manifest, &staged, self.timeout)
            .await;

        if let Err(e) = manifest.close() {
            tracing::warn!("Could not remove concat manifest: {}", e);
        }

        if let Err(e) = result {
            return Err(ReplayError::Assembly(e.to_string()));
        }

        let file_size = match fs::metadata(&staged) {
            Ok(metadata) if metadata.is_file() && metadata.len() > 0 => metadata.len(),
            _ => {
                return Err(ReplayError::Assembly(format!(
                    "backend reported success but {:?} was not written",
                    output_path
                )))
            }
        };
        staged.persist(output_path).map_err(|e| e.error)?;

        let replay = SavedReplay {
            id: Uuid::new_v4(),
            path: output_path.to_path_buf(),
            file_size,
            segment_count,
            duration_secs: segment_count as u64 * self.segment_duration,
            created_at: Utc::now(),
        };

        tracing::info!("Replay saved: {:?} ({} bytes)", replay.path, replay.file_size);
        Ok(replay)
    }
}

// Hidden sibling of the output, keeping its extension so the muxer is inferred the same way.
fn staging_file(dir: &Path, output_path: &Path) -> std::io::Result<TempPath> {
    let suffix = output_path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    let file = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .suffix(&suffix)
        .tempfile_in(dir)?;
    Ok(file.into_temp_path())
}

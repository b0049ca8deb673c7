//! Segment store
//!
//! Bounded, time-ordered window of captured segments backed by files in one
//! directory. The store alone decides membership and eviction; the file
//! system only holds the bytes.

use crate::capture::manifest;
use crate::utils::error::{ReplayError, ReplayResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// File name prefix of every segment
pub const SEGMENT_PREFIX: &str = "segment_";

/// File extension of every segment
pub const SEGMENT_EXTENSION: &str = "ts";

/// File name for a sequence number, zero-padded so names sort in capture order
pub fn segment_file_name(sequence: u64) -> String {
    format!("{}{:06}.{}", SEGMENT_PREFIX, sequence, SEGMENT_EXTENSION)
}

/// Parse the sequence number back out of a segment file name
pub fn parse_sequence(name: &str) -> Option<u64> {
    name.strip_prefix(SEGMENT_PREFIX)?
        .strip_suffix(SEGMENT_EXTENSION)?
        .strip_suffix('.')?
        .parse()
        .ok()
}

/// Bounded FIFO of segment sequence numbers
#[derive(Debug)]
pub struct SegmentStore {
    dir: PathBuf,
    max_segments: usize,
    window: Mutex<VecDeque<u64>>,
}

impl SegmentStore {
    /// Create a store in `dir`, creating the directory if needed.
    ///
    /// A capacity of zero is a configuration error.
    pub fn new(dir: impl Into<PathBuf>, max_segments: usize) -> ReplayResult<Self> {
        if max_segments == 0 {
            return Err(ReplayError::Configuration(
                "buffer must hold at least one segment".to_string(),
            ));
        }

        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        // Manifests list absolute paths, which the concat demuxer resolves regardless of cwd.
        let dir = dir.canonicalize()?;

        Ok(Self {
            dir,
            max_segments,
            window: Mutex::new(VecDeque::with_capacity(max_segments + 1)),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_segments(&self) -> usize {
        self.max_segments
    }

    /// Deterministic path of a segment, whether or not it exists
    pub fn segment_path(&self, sequence: u64) -> PathBuf {
        self.dir.join(segment_file_name(sequence))
    }

    /// Add a freshly captured segment to the tail of the window.
    ///
    /// When capacity is exceeded the head is dropped and its file deleted,
    /// all under the window lock. Returns the evicted sequence, if any.
    pub fn append(&self, sequence: u64) -> Option<u64> {
        let mut window = self.window.lock();

        if let Some(&tail) = window.back() {
            if sequence <= tail {
                tracing::warn!(
                    "Ignoring out-of-order segment {} (window tail is {})",
                    sequence,
                    tail
                );
                return None;
            }
        }

        window.push_back(sequence);
        if window.len() <= self.max_segments {
            return None;
        }

        let evicted = window.pop_front()?;
        self.remove_segment_file(evicted);
        Some(evicted)
    }

    /// Ordered copy of the window, oldest first
    pub fn snapshot(&self) -> Vec<u64> {
        self.window.lock().iter().copied().collect()
    }

    /// Ordered paths of the window, oldest first
    pub fn snapshot_paths(&self) -> Vec<PathBuf> {
        self.snapshot()
            .into_iter()
            .map(|sequence| self.segment_path(sequence))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.window.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.lock().is_empty()
    }

    /// Empty the window and delete every segment or manifest file left in
    /// the directory. Returns the number of files removed.
    pub fn clear(&self) -> usize {
        let mut window = self.window.lock();
        window.clear();

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Could not list segment directory {:?}: {}", self.dir, e);
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if parse_sequence(name).is_none() && !manifest::is_manifest_name(name) {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => {
                    tracing::debug!("Removed stale file {:?}", path);
                    removed += 1;
                }
                Err(e) => tracing::warn!("Could not remove stale file {:?}: {}", path, e),
            }
        }

        if removed > 0 {
            tracing::info!("Cleared {} stale files from {:?}", removed, self.dir);
        }
        removed
    }

    // Eviction failures are non-fatal: the window entry is already gone.
    fn remove_segment_file(&self, sequence: u64) {
        let path = self.segment_path(sequence);
        match fs::remove_file(&path) {
            Ok(()) => tracing::debug!("Evicted segment {}", sequence),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("Evicted segment {} had no file on disk", sequence)
            }
            Err(e) => tracing::warn!("Could not delete evicted segment {:?}: {}", path, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    fn touch(store: &SegmentStore, sequence: u64) {
        fs::write(store.segment_path(sequence), b"ts").unwrap();
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let dir = tempdir().unwrap();
        let result = SegmentStore::new(dir.path(), 0);
        assert!(matches!(result, Err(ReplayError::Configuration(_))));
    }

    #[test]
    fn test_segment_file_names() {
        assert_eq!(segment_file_name(42), "segment_000042.ts");
        assert_eq!(parse_sequence("segment_000042.ts"), Some(42));
        assert_eq!(parse_sequence("segment_1234567.ts"), Some(1234567));
        assert_eq!(parse_sequence("segment_000042.mp4"), None);
        assert_eq!(parse_sequence("concat_abc.txt"), None);
        assert_eq!(parse_sequence("segment_.ts"), None);
    }

    #[test]
    fn test_fifo_eviction_deletes_oldest_file() {
        let dir = tempdir().unwrap();
        let store = SegmentStore::new(dir.path(), 3).unwrap();

        let mut evicted = Vec::new();
        for sequence in 0..5 {
            touch(&store, sequence);
            evicted.extend(store.append(sequence));
            assert!(store.len() <= 3);
        }

        assert_eq!(evicted, vec![0, 1]);
        assert_eq!(store.snapshot(), vec![2, 3, 4]);
        assert!(!store.segment_path(0).exists());
        assert!(!store.segment_path(1).exists());
        assert!(store.segment_path(2).exists());
        assert!(store.segment_path(4).exists());
    }

    #[test]
    fn test_window_stabilizes_at_capacity() {
        let dir = tempdir().unwrap();
        let store = SegmentStore::new(dir.path(), 6).unwrap();

        for sequence in 0..6 {
            touch(&store, sequence);
            store.append(sequence);
        }
        assert_eq!(store.len(), 6);

        for sequence in 6..40 {
            touch(&store, sequence);
            store.append(sequence);
            assert_eq!(store.len(), 6);
        }
        assert_eq!(store.snapshot(), (34..40).collect::<Vec<_>>());
    }

    #[test]
    fn test_eviction_tolerates_missing_files() {
        let dir = tempdir().unwrap();
        let store = SegmentStore::new(dir.path(), 2).unwrap();

        for sequence in 0..5 {
            store.append(sequence);
        }
        assert_eq!(store.snapshot(), vec![3, 4]);
    }

    #[test]
    fn test_out_of_order_append_is_ignored() {
        let dir = tempdir().unwrap();
        let store = SegmentStore::new(dir.path(), 4).unwrap();

        store.append(5);
        assert_eq!(store.append(5), None);
        assert_eq!(store.append(3), None);
        assert_eq!(store.snapshot(), vec![5]);
    }

    #[test]
    fn test_snapshot_paths_are_absolute_and_ordered() {
        let dir = tempdir().unwrap();
        let store = SegmentStore::new(dir.path(), 4).unwrap();
        store.append(1);
        store.append(2);

        let paths = store.snapshot_paths();
        assert_eq!(paths.len(), 2);
        assert!(paths.iter().all(|p| p.is_absolute()));
        assert!(paths[0].ends_with("segment_000001.ts"));
        assert!(paths[1].ends_with("segment_000002.ts"));
    }

    #[test]
    fn test_clear_removes_only_buffer_files() {
        let dir = tempdir().unwrap();
        let store = SegmentStore::new(dir.path(), 4).unwrap();

        touch(&store, 0);
        touch(&store, 1);
        store.append(0);
        store.append(1);
        fs::write(dir.path().join("concat_stale.txt"), b"file 'x'").unwrap();
        fs::write(dir.path().join("notes.txt"), b"keep me").unwrap();

        assert_eq!(store.clear(), 3);
        assert!(store.is_empty());
        assert!(dir.path().join("notes.txt").exists());
        assert!(!store.segment_path(0).exists());
    }

    #[test]
    fn test_clear_on_empty_directory() {
        let dir = tempdir().unwrap();
        let store = SegmentStore::new(dir.path().join("fresh"), 4).unwrap();
        assert_eq!(store.clear(), 0);
        assert!(store.dir().is_dir());
    }

    #[test]
    fn test_snapshot_is_atomic_with_append() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SegmentStore::new(dir.path(), 5).unwrap());

        let writer = {
            let store = store.clone();
            thread::spawn(move || {
                for sequence in 0..2_000 {
                    store.append(sequence);
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        let snapshot = store.snapshot();
                        let Some(&last) = snapshot.last() else {
                            continue;
                        };
                        // Every observable window is a contiguous run ending at the latest append.
                        let expected = (last as usize + 1).min(5);
                        assert_eq!(snapshot.len(), expected);
                        assert!(snapshot.windows(2).all(|w| w[1] == w[0] + 1));
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.snapshot(), (1_995..2_000).collect::<Vec<_>>());
    }
}

//! FFmpeg concat demuxer manifest
//!
//! Each save writes its own manifest next to the segments. The file is a
//! `NamedTempFile`, so it disappears on every exit path of the save.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// File name prefix shared by every manifest
pub const MANIFEST_PREFIX: &str = "concat_";

/// File name suffix shared by every manifest
pub const MANIFEST_SUFFIX: &str = ".txt";

/// Ordered list of segment files handed to the concatenation backend
#[derive(Debug)]
pub struct ConcatManifest {
    file: NamedTempFile,
    inputs: Vec<PathBuf>,
}

impl ConcatManifest {
    /// Write a manifest for `inputs` into `dir`
    pub fn write_in(dir: &Path, inputs: Vec<PathBuf>) -> io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix(MANIFEST_PREFIX)
            .suffix(MANIFEST_SUFFIX)
            .tempfile_in(dir)?;

        file.write_all(render(&inputs).as_bytes())?;
        file.flush()?;

        tracing::debug!("Wrote concat manifest {:?} ({} inputs)", file.path(), inputs.len());

        Ok(Self { file, inputs })
    }

    /// Location of the manifest on disk
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Segment files listed in the manifest, oldest first
    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    /// Delete the manifest, reporting any removal error
    pub fn close(self) -> io::Result<()> {
        self.file.close()
    }
}

/// Render manifest lines in the concat demuxer syntax
pub fn render(inputs: &[PathBuf]) -> String {
    inputs
        .iter()
        .map(|path| format!("file {}\n", quote(path)))
        .collect()
}

/// Check whether a file name looks like a manifest left behind by a crash
pub fn is_manifest_name(name: &str) -> bool {
    name.starts_with(MANIFEST_PREFIX) && name.ends_with(MANIFEST_SUFFIX)
}

// The demuxer reads single-quoted strings; a literal quote is closed, escaped and reopened.
fn quote(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', "'\\''"))
}

//! Per-run scratch storage.
//!
//! Every run gets its own temporary directory for the downloaded bundle,
//! the extraction tree and any remediated model copy. The directory and
//! everything in it are removed when the `ScratchSpace` is dropped.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

const PREFIX: &str = "mia-probe-";

/// Subdirectory holding the prepared model copy, apart from the bundle
/// and its extraction tree.
pub const MODEL_DIR: &str = "model";

#[derive(Debug)]
pub struct ScratchSpace {
    dir: TempDir,
}

impl ScratchSpace {
    /// Create a fresh directory under the system temp dir.
    pub fn create() -> std::io::Result<Self> {
        let dir = tempfile::Builder::new().prefix(PREFIX).tempdir()?;
        debug!(path = %dir.path().display(), "Created scratch directory");
        Ok(Self { dir })
    }

    /// Create a fresh directory under `parent`.
    pub fn create_in(parent: &Path) -> std::io::Result<Self> {
        let dir = tempfile::Builder::new().prefix(PREFIX).tempdir_in(parent)?;
        debug!(path = %dir.path().display(), "Created scratch directory");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Location for the prepared model copy, creating its directory.
    pub fn model_file(&self, name: &str) -> std::io::Result<PathBuf> {
        let dir = self.dir.path().join(MODEL_DIR);
        std::fs::create_dir_all(&dir)?;
        Ok(dir.join(name))
    }
}

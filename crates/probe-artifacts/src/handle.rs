//! Readable handle to one extracted artifact file.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// An opened artifact file on local scratch storage.
///
/// Owned by the caller; the file is closed when the handle is dropped.
#[derive(Debug)]
pub struct ArtifactHandle {
    path: PathBuf,
    file: File,
}

impl ArtifactHandle {
    /// Open `path` for reading.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = File::open(&path)?;
        Ok(Self { path, file })
    }

    /// Location of the extracted file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the remaining bytes and release the handle.
    pub fn into_bytes(mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.file.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl Read for ArtifactHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_handle_reads_file_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, b"\x08\x07onnx").unwrap();

        let handle = ArtifactHandle::open(&path).unwrap();
        assert_eq!(handle.path(), path.as_path());
        assert_eq!(handle.into_bytes().unwrap(), b"\x08\x07onnx");
    }

    #[test]
    fn test_open_missing_file_fails() {
        let dir = tempdir().unwrap();
        let err = ArtifactHandle::open(dir.path().join("absent")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}

//! Artifact bundle storage and extraction.
//!
//! Both vendors ship artifacts as zip bundles. A bundle is written to
//! `<scratch>/artifacts.zip` and extracted into `<scratch>/artifacts/`;
//! callers must hand in a per-run scratch directory.

use std::fs::File;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::error::RetrievalError;
use crate::handle::ArtifactHandle;

/// Bundle file name inside the scratch directory.
pub const BUNDLE_FILE: &str = "artifacts.zip";

/// Extraction root inside the scratch directory.
pub const EXTRACT_DIR: &str = "artifacts";

/// Write `bundle` to scratch storage and extract it fully.
///
/// Returns the extraction root.
pub fn store_and_extract(bundle: &[u8], scratch: &Path) -> Result<PathBuf, RetrievalError> {
    let bundle_path = scratch.join(BUNDLE_FILE);
    std::fs::write(&bundle_path, bundle)?;

    let extract_root = scratch.join(EXTRACT_DIR);
    std::fs::create_dir_all(&extract_root)?;

    let file = File::open(&bundle_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let entries = archive.len();
    archive.extract(&extract_root)?;

    debug!(
        bundle = %bundle_path.display(),
        entries,
        "Extracted artifact bundle"
    );
    Ok(extract_root)
}

/// Open `relative` under the extraction root.
///
/// Fails with `NotFound` if the path is absent or would leave the root.
pub fn open_extracted(root: &Path, relative: &str) -> Result<ArtifactHandle, RetrievalError> {
    let relative = Path::new(relative);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes || relative.as_os_str().is_empty() {
        return Err(RetrievalError::NotFound(format!(
            "artifact path '{}' is not inside the artifact archive",
            relative.display()
        )));
    }

    let target = root.join(relative);
    if !target.is_file() {
        return Err(RetrievalError::NotFound(format!(
            "'{}' not found in the extracted artifact",
            relative.display()
        )));
    }

    Ok(ArtifactHandle::open(target)?)
}

/// Final path segment of an artifact-relative path.
pub fn basename(artifact_path: &str) -> &str {
    artifact_path
        .rsplit('/')
        .next()
        .unwrap_or(artifact_path)
}


#[cfg(test)]
mod tests {
    use super::test_support::zip_bundle;
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_store_and_extract_nested_layout() {
        let scratch = tempdir().unwrap();
        let bundle = zip_bundle(&[("build/models/model.onnx", b"weights"), ("README", b"hi")]);

        let root = store_and_extract(&bundle, scratch.path()).unwrap();
        assert_eq!(root, scratch.path().join(EXTRACT_DIR));
        assert!(scratch.path().join(BUNDLE_FILE).is_file());

        let handle = open_extracted(&root, "build/models/model.onnx").unwrap();
        assert_eq!(handle.into_bytes().unwrap(), b"weights");
    }

    #[test]
    fn test_missing_path_is_not_found() {
        let scratch = tempdir().unwrap();
        let bundle = zip_bundle(&[("model.onnx", b"weights")]);
        let root = store_and_extract(&bundle, scratch.path()).unwrap();

        let err = open_extracted(&root, "build/model.onnx").unwrap_err();
        assert!(matches!(err, RetrievalError::NotFound(_)));
    }

    #[test]
    fn test_escaping_path_is_rejected() {
        let scratch = tempdir().unwrap();
        let bundle = zip_bundle(&[("model.onnx", b"weights")]);
        let root = store_and_extract(&bundle, scratch.path()).unwrap();

        assert!(matches!(
            open_extracted(&root, "../artifacts.zip"),
            Err(RetrievalError::NotFound(_))
        ));
        assert!(matches!(
            open_extracted(&root, "/etc/passwd"),
            Err(RetrievalError::NotFound(_))
        ));
    }

    #[test]
    fn test_garbage_bundle_is_archive_error() {
        let scratch = tempdir().unwrap();
        let err = store_and_extract(b"not a zip", scratch.path()).unwrap_err();
        assert!(matches!(err, RetrievalError::Archive(_)));
    }

    #[test]
    fn test_basename() {
        assert_eq!(basename("build/models/model.onnx"), "model.onnx");
        assert_eq!(basename("model.onnx"), "model.onnx");
    }
}

//! Verification of stage derivatives and removal of their sources.
//!
//! A stage may only delete its source volume after the derivative has been checked here.
//! The check is deliberately shallow: the file must exist, be a regular file and be
//! non-empty. Whether the volume is a well-formed NIfTI image is the external tool's
//! business.

use crate::constants::SNIFF_LEN;
use crate::{io_context, FilesError};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// Metadata for a verified derivative
///
/// Serialised into the batch report so that every derivative can be traced back to the
/// stage and source that produced it.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct ArtifactInfo {
    /// Location of the derivative
    pub path: PathBuf,

    /// Size of the file in bytes (always > 0)
    pub size_bytes: u64,

    /// Hexadecimal SHA-256 digest of the file content
    pub sha256: String,

    /// Detected media type (MIME type), if available
    ///
    /// Best-effort only. Plain NIfTI volumes have no registered signature and usually
    /// come back as `None`.
    pub media_type: Option<String>,

    /// UTC timestamp of verification
    pub verified_at: DateTime<Utc>,
}

/// Checks that `path` is a non-empty regular file and records its metadata.
///
/// # Errors
///
/// Returns `FilesError` if:
/// - the path does not exist (`Missing`)
/// - the path is not a regular file (`NotAFile`)
/// - the file is zero bytes long (`Empty`)
/// - reading the file for hashing fails (`Io`)
pub fn verify_artifact(path: &Path) -> Result<ArtifactInfo, FilesError> {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(FilesError::Missing(path.display().to_string()));
        }
        Err(e) => return Err(io_context(e, "stat", path)),
    };

    if !metadata.is_file() {
        return Err(FilesError::NotAFile(path.display().to_string()));
    }

    if metadata.len() == 0 {
        return Err(FilesError::Empty(path.display().to_string()));
    }

    let file = File::open(path).map_err(|e| io_context(e, "open", path))?;
    let mut reader = BufReader::new(file);

    let mut head = Vec::with_capacity(SNIFF_LEN);
    (&mut reader)
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut head)
        .map_err(|e| io_context(e, "read", path))?;

    let mut hasher = Sha256::new();
    hasher.update(&head);
    io::copy(&mut reader, &mut hasher).map_err(|e| io_context(e, "read", path))?;
    let sha256 = hex::encode(hasher.finalize());

    let media_type = infer::get(&head).map(|kind| kind.mime_type().to_string());

    Ok(ArtifactInfo {
        path: path.to_path_buf(),
        size_bytes: metadata.len(),
        sha256,
        media_type,
        verified_at: Utc::now(),
    })
}

/// Removes a source volume after its derivative has been verified.
///
/// # Errors
///
/// Returns `FilesError::Io` with the path in the message if removal fails.
pub fn remove_source(path: &Path) -> Result<(), FilesError> {
    fs::remove_file(path).map_err(|e| io_context(e, "remove source", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_verify_artifact_records_size_and_digest() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a_N4_Bias_Corr.nii");
        fs::write(&path, b"Hello, World!").unwrap();

        let info = verify_artifact(&path).unwrap();

        assert_eq!(info.path, path);
        assert_eq!(info.size_bytes, 13);
        assert_eq!(
            info.sha256,
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
        assert_eq!(info.media_type, None);
    }

    #[test]
    fn test_verify_artifact_hashes_past_sniff_window() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("big.nii");
        let payload = vec![1u8; SNIFF_LEN * 3 + 17];
        fs::write(&path, &payload).unwrap();

        let info = verify_artifact(&path).unwrap();

        assert_eq!(info.size_bytes, payload.len() as u64);
        assert_eq!(info.sha256, hex::encode(Sha256::digest(&payload)));
    }

    #[test]
    fn test_verify_artifact_detects_gzip_media_type() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("x.nii.gz");
        fs::write(&path, [0x1f, 0x8b, 0x08, 0x00, 0, 0, 0, 0, 0, 0x03]).unwrap();

        let info = verify_artifact(&path).unwrap();
        assert_eq!(info.media_type.as_deref(), Some("application/gzip"));
    }

    #[test]
    fn test_verify_artifact_rejects_empty_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("empty.nii");
        fs::write(&path, b"").unwrap();

        assert!(matches!(verify_artifact(&path), Err(FilesError::Empty(_))));
    }

    #[test]
    fn test_verify_artifact_rejects_missing_and_directory() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            verify_artifact(&temp.path().join("nope.nii")),
            Err(FilesError::Missing(_))
        ));

        let dir = temp.path().join("dir.nii");
        fs::create_dir(&dir).unwrap();
        assert!(matches!(
            verify_artifact(&dir),
            Err(FilesError::NotAFile(_))
        ));
    }

    #[test]
    fn test_remove_source() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.nii");
        fs::write(&path, b"x").unwrap();

        remove_source(&path).unwrap();
        assert!(!path.exists());

        let err = remove_source(&path).unwrap_err();
        assert!(err.to_string().contains("a.nii"));
    }
}

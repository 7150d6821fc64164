//! neuroprep artifact handling
//!
//! The external tools used by the preprocessing stages leave their results on disk, and
//! some of them only ever write gzip-compressed volumes. This crate owns the filesystem
//! side of turning a tool's output into a trusted derivative:
//!
//! - decompressing a `.gz` artifact into its sibling path and removing the compressed copy
//! - verifying that a derivative exists, is a regular file and is non-empty
//! - recording size, SHA-256 digest and detected media type for the batch report
//! - removing a source volume once its derivative has been verified
//!
//! ```text
//! AD/
//! ├── sub-01.nii                        # source, removed last
//! ├── sub-01_skull_stripped.nii.gz      # tool output, removed after decompression
//! └── sub-01_skull_stripped.nii         # verified derivative
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use neuroprep_files::{decompress_gz_sibling, verify_artifact};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let plain = decompress_gz_sibling(Path::new("AD/sub-01_reg.nii.gz"))?;
//! let info = verify_artifact(&plain)?;
//! println!("{} ({} bytes, sha256 {})", info.path.display(), info.size_bytes, info.sha256);
//! # Ok(())
//! # }
//! ```

mod artifact;
mod constants;
mod gzip;

pub use artifact::{remove_source, verify_artifact, ArtifactInfo};
pub use constants::GZ_SUFFIX;
pub use gzip::{decompress_gz_sibling, gz_sibling_path, is_gzip_path};

/// Errors that can occur during artifact handling
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// The path does not name what the operation expects (e.g. no `.gz` suffix)
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// An expected artifact was not produced
    #[error("Artifact missing: {0}")]
    Missing(String),

    /// The artifact exists but is zero bytes long
    #[error("Artifact is empty: {0}")]
    Empty(String),

    /// The artifact is a directory, socket or other non-regular file
    #[error("Artifact is not a regular file: {0}")]
    NotAFile(String),

    /// A `.gz` file does not start with the gzip magic bytes
    #[error("Not a gzip stream: {0}")]
    NotGzip(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Wraps an I/O error with the operation and path that caused it.
pub(crate) fn io_context(e: std::io::Error, action: &str, path: &std::path::Path) -> FilesError {
    FilesError::Io(std::io::Error::new(
        e.kind(),
        format!("Failed to {} {}: {}", action, path.display(), e),
    ))
}

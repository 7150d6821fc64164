//! Decompression of gzip-compressed tool output.
//!
//! `bet` and `flirt` write `<name>.nii.gz`. Downstream stages expect plain `.nii`, so the
//! compressed artifact is expanded next to itself and then removed. The compressed file is
//! only removed once the plain copy has been completely written and flushed; on any error the
//! partial plain copy is removed instead and the `.gz` is left untouched.

use crate::constants::{GZ_SUFFIX, SNIFF_LEN};
use crate::{io_context, FilesError};
use flate2::read::MultiGzDecoder;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Returns true if the path's file name ends in `.gz`.
pub fn is_gzip_path(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.len() > GZ_SUFFIX.len() && n.ends_with(GZ_SUFFIX))
}

/// Computes the sibling path with the trailing `.gz` removed.
///
/// # Errors
///
/// Returns `FilesError::InvalidPath` if the file name does not end in `.gz`.
pub fn gz_sibling_path(gz_path: &Path) -> Result<PathBuf, FilesError> {
    let name = gz_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| FilesError::InvalidPath(gz_path.display().to_string()))?;

    let stem = name
        .strip_suffix(GZ_SUFFIX)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            FilesError::InvalidPath(format!("{} has no {} suffix", gz_path.display(), GZ_SUFFIX))
        })?;

    Ok(gz_path.with_file_name(stem))
}

/// Decompresses `gz_path` into its sibling path and removes the compressed file.
///
/// Multi-member gzip streams are decoded in full. Any existing file at the sibling path is
/// overwritten.
///
/// # Returns
///
/// The path of the decompressed file.
///
/// # Errors
///
/// Returns `FilesError` if:
/// - the path has no `.gz` suffix (`InvalidPath`)
/// - the file does not exist (`Missing`) or lacks the gzip magic bytes (`NotGzip`)
/// - reading, decoding, writing or removing fails (`Io`)
pub fn decompress_gz_sibling(gz_path: &Path) -> Result<PathBuf, FilesError> {
    let out_path = gz_sibling_path(gz_path)?;

    if !gz_path.exists() {
        return Err(FilesError::Missing(gz_path.display().to_string()));
    }

    ensure_gzip_magic(gz_path)?;

    if let Err(e) = expand(gz_path, &out_path) {
        if out_path.exists() {
            if let Err(cleanup) = fs::remove_file(&out_path) {
                tracing::warn!(
                    "failed to remove partial output {}: {}",
                    out_path.display(),
                    cleanup
                );
            }
        }
        return Err(e);
    }

    fs::remove_file(gz_path).map_err(|e| io_context(e, "remove", gz_path))?;

    tracing::debug!("decompressed {} -> {}", gz_path.display(), out_path.display());
    Ok(out_path)
}

fn ensure_gzip_magic(gz_path: &Path) -> Result<(), FilesError> {
    let mut head = Vec::with_capacity(SNIFF_LEN);
    File::open(gz_path)
        .map_err(|e| io_context(e, "open", gz_path))?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut head)
        .map_err(|e| io_context(e, "read", gz_path))?;

    if !infer::archive::is_gz(&head) {
        return Err(FilesError::NotGzip(gz_path.display().to_string()));
    }
    Ok(())
}

fn expand(gz_path: &Path, out_path: &Path) -> Result<(), FilesError> {
    let input = File::open(gz_path).map_err(|e| io_context(e, "open", gz_path))?;
    let mut decoder = MultiGzDecoder::new(BufReader::new(input));

    let output = File::create(out_path).map_err(|e| io_context(e, "create", out_path))?;
    let mut writer = BufWriter::new(output);

    io::copy(&mut decoder, &mut writer).map_err(|e| io_context(e, "decompress", gz_path))?;
    writer
        .flush()
        .map_err(|e| io_context(e, "flush", out_path))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| io_context(e, "sync", out_path))?;

    Ok(())
}

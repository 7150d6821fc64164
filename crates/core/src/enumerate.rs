//! Discovery of source volumes and task construction.
//!
//! Enumeration is shallow: only the regular files directly inside a cohort directory are
//! considered, matched purely on the end of their file name. The order of the returned list
//! is whatever the directory listing yields.

use crate::stage::Stage;
use crate::task::Task;
use crate::{PrepError, PrepResult};
use neuroprep_types::{CohortName, FileSuffix};
use std::fs;
use std::path::{Path, PathBuf};

/// A candidate source volume found in a cohort directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VolumeFile {
    pub cohort: CohortName,
    pub path: PathBuf,
    pub file_name: String,
}

/// Lists the regular files in `cohort_dir` whose names end with `suffix`.
///
/// Symlinks are followed, so a link to a volume counts as a volume. Subdirectories are never
/// descended into, even when their name matches. Names that are not valid UTF-8 are skipped
/// with a warning since they cannot be matched against a suffix.
///
/// # Errors
///
/// Returns `PrepError::CohortMissing` if the directory does not exist and
/// `PrepError::CohortRead` for any other listing failure.
pub fn gather_volumes(
    cohort_dir: &Path,
    cohort: &CohortName,
    suffix: &FileSuffix,
) -> PrepResult<Vec<VolumeFile>> {
    if !cohort_dir.exists() {
        return Err(PrepError::CohortMissing(cohort_dir.to_path_buf()));
    }

    let read_err = |source| PrepError::CohortRead {
        path: cohort_dir.to_path_buf(),
        source,
    };

    let mut volumes = Vec::new();
    for entry in fs::read_dir(cohort_dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();

        let Some(file_name) = entry.file_name().to_str().map(str::to_owned) else {
            tracing::warn!("skipping non UTF-8 file name: {}", path.display());
            continue;
        };

        if !suffix.matches(&file_name) {
            continue;
        }

        // fs::metadata follows symlinks; a dangling link is simply not a volume.
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {}
            _ => continue,
        }

        volumes.push(VolumeFile {
            cohort: cohort.clone(),
            path,
            file_name,
        });
    }

    Ok(volumes)
}

/// Derivative file name for `file_name` produced by `stage`.
///
/// The extension part of the input suffix (from its first `.`) is replaced by the stage's
/// output suffix, so chained stages accumulate markers:
/// `a.nii` → `a_N4_Bias_Corr.nii` → `a_N4_Bias_Corr_skull_stripped.nii`.
pub fn derivative_name(file_name: &str, input_suffix: &FileSuffix, stage: Stage) -> Option<String> {
    if !input_suffix.matches(file_name) {
        return None;
    }
    let stem = file_name.strip_suffix(input_suffix.extension())?;
    Some(format!("{}{}", stem, stage.output_suffix()))
}

/// Turns volumes into tasks for `stage`.
///
/// Volumes ending in the output suffix of this stage or of any later stage in the chain are
/// skipped: they are derivatives of an earlier run. With an input suffix such as the default
/// `.nii`, which every derivative also ends in, processing them again would feed finished
/// volumes back into the chain.
pub fn build_tasks(stage: Stage, input_suffix: &FileSuffix, volumes: Vec<VolumeFile>) -> Vec<Task> {
    let derived: Vec<(Stage, FileSuffix)> = stage
        .downstream()
        .map(|s| (s, s.output_suffix()))
        .collect();

    volumes
        .into_iter()
        .filter_map(|volume| {
            if let Some((producer, _)) = derived
                .iter()
                .find(|(_, suffix)| suffix.matches(&volume.file_name))
            {
                tracing::debug!(
                    "skipping {}: already a {} derivative",
                    volume.path.display(),
                    producer
                );
                return None;
            }
            let name = derivative_name(&volume.file_name, input_suffix, stage)?;
            Some(Task {
                output: volume.path.with_file_name(name),
                input: volume.path,
                cohort: volume.cohort,
            })
        })
        .collect()
}

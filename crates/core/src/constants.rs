//! Constants used throughout the neuroprep core crate.
//!
//! Default cohort names, filename suffixes, tool names and tool parameters. These mirror the
//! values the preprocessing was originally run with; anything here can be overridden through
//! [`crate::config::PipelineConfig`].

/// Default cohort directories, relative to the data root.
pub const DEFAULT_COHORTS: [&str; 2] = ["AD", "CN"];

/// Default data root when none is configured.
pub const DEFAULT_DATA_DIR: &str = ".";

/// Default suffix of volumes picked up by every stage.
pub const DEFAULT_INPUT_SUFFIX: &str = ".nii";

/// Default reference template for registration, relative to the working directory.
pub const DEFAULT_REFERENCE_TEMPLATE: &str = "MNI152_T1_1mm.nii";

/// Output suffix written by the bias-field-correction stage.
pub const BIAS_CORRECTION_SUFFIX: &str = "_N4_Bias_Corr.nii";

/// Output suffix of the skull-stripping stage once decompressed.
pub const SKULL_STRIP_SUFFIX: &str = "_skull_stripped.nii";

/// Output suffix of the registration stage once decompressed.
pub const REGISTRATION_SUFFIX: &str = "_reg.nii";

/// Default executable for N4 bias-field correction (ANTs).
pub const N4_PROGRAM: &str = "N4BiasFieldCorrection";

/// Default executable for brain extraction (FSL).
pub const BET_PROGRAM: &str = "bet";

/// Default executable for linear registration (FSL).
pub const FLIRT_PROGRAM: &str = "flirt";

/// Environment variable FSL tools read to pick their output format.
pub const FSL_OUTPUT_TYPE_VAR: &str = "FSLOUTPUTTYPE";

/// Output format requested from FSL tools: gzip-compressed NIfTI.
pub const FSL_OUTPUT_TYPE: &str = "NIFTI_GZ";

/// Upper bound on the default I/O pool size.
pub const MAX_DEFAULT_IO_THREADS: usize = 32;

/// Extra I/O workers on top of the core count; those workers mostly block on a child process.
pub const IO_THREADS_OVER_CORES: usize = 4;

/// Bytes of tool stderr kept in a failure reason.
pub const STDERR_TAIL_BYTES: usize = 2048;

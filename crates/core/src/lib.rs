//! # Neuroprep Core
//!
//! Batch preprocessing of brain MRI volumes for the AD and CN cohorts.
//!
//! Three stages, each run over every cohort directory:
//! - **bias correction**: `N4BiasFieldCorrection` writes `<stem>_N4_Bias_Corr.nii`
//! - **skull stripping**: `bet` writes `<stem>_skull_stripped.nii.gz`, expanded in place
//! - **registration**: `flirt` against a reference template writes `<stem>_reg.nii.gz`,
//!   expanded in place
//!
//! A successful task leaves exactly one derivative behind and removes its source. A failed task
//! leaves its source untouched and is recorded in the stage's [`BatchReport`].
//!
//! **No process concerns**: argument parsing, logging setup and environment handling belong in
//! the binaries. Configuration arrives here fully resolved as a [`PipelineConfig`].

pub mod config;
pub mod constants;
pub mod dispatch;
pub mod enumerate;
mod error;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod stage;
pub mod task;
pub mod tools;
pub mod transform;

#[cfg(test)]
mod test_support;

pub use config::{ConfigOverrides, PipelineConfig};
pub use error::{PrepError, PrepResult, TaskFailure};
pub use pipeline::Pipeline;
pub use progress::{BarProgress, LogProgress, ProgressSink};
pub use report::{exit_status, write_reports_yaml, BatchReport};
pub use stage::Stage;
pub use task::{Task, TaskOutcome, TaskStatus};
pub use tools::{ProcessRunner, ToolRunner};

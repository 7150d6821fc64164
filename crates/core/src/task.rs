//! Units of work and their outcomes.

use crate::error::TaskFailure;
use neuroprep_files::{ArtifactInfo, GZ_SUFFIX};
use neuroprep_types::CohortName;
use serde::Serialize;
use std::path::PathBuf;

/// One source volume and the derivative it should become.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Task {
    pub cohort: CohortName,
    pub input: PathBuf,
    /// Final derivative path, after any decompression.
    pub output: PathBuf,
}

impl Task {
    /// Path the external tool writes to: the derivative itself, or `<derivative>.gz` when the
    /// tool only produces compressed volumes.
    pub fn tool_output(&self, compressed: bool) -> PathBuf {
        if !compressed {
            return self.output.clone();
        }
        let mut name = self.output.clone().into_os_string();
        name.push(GZ_SUFFIX);
        PathBuf::from(name)
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskStatus {
    Succeeded { artifact: ArtifactInfo },
    Failed { reason: TaskFailure },
}

#[derive(Clone, Debug, Serialize)]
pub struct TaskOutcome {
    #[serde(flatten)]
    pub task: Task,
    #[serde(flatten)]
    pub status: TaskStatus,
    pub elapsed_ms: u64,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, TaskStatus::Succeeded { .. })
    }

    pub fn failure(&self) -> Option<&TaskFailure> {
        match &self.status {
            TaskStatus::Failed { reason } => Some(reason),
            TaskStatus::Succeeded { .. } => None,
        }
    }

    /// `failed on <source>: <reason>`, the one line logged per failed task.
    pub fn failure_line(&self) -> Option<String> {
        self.failure()
            .map(|reason| format!("failed on {}: {}", self.task.input.display(), reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_output_appends_gz_when_compressed() {
        let task = Task {
            cohort: CohortName::new("AD").unwrap(),
            input: PathBuf::from("AD/a.nii"),
            output: PathBuf::from("AD/a_reg.nii"),
        };
        assert_eq!(task.tool_output(false), PathBuf::from("AD/a_reg.nii"));
        assert_eq!(task.tool_output(true), PathBuf::from("AD/a_reg.nii.gz"));
    }

    #[test]
    fn test_failure_line_names_source_and_reason() {
        let outcome = TaskOutcome {
            task: Task {
                cohort: CohortName::new("AD").unwrap(),
                input: PathBuf::from("AD/b.nii"),
                output: PathBuf::from("AD/b_N4_Bias_Corr.nii"),
            },
            status: TaskStatus::Failed {
                reason: TaskFailure::Spawn {
                    program: "N4BiasFieldCorrection".into(),
                    message: "No such file or directory".into(),
                },
            },
            elapsed_ms: 1,
        };

        assert_eq!(
            outcome.failure_line().as_deref(),
            Some(
                "failed on AD/b.nii: failed to start N4BiasFieldCorrection: \
                 No such file or directory"
            )
        );
    }
}

//! External tool invocation.
//!
//! Each stage delegates the actual image processing to an external program. A
//! [`ToolCommand`] turns the stage's parameter set into an [`Invocation`] for one file, and a
//! [`ToolRunner`] executes it. Production code uses [`ProcessRunner`]; tests substitute a
//! runner that fakes the tool's output.

mod bet;
mod flirt;
mod n4;

use crate::constants::{FSL_OUTPUT_TYPE, FSL_OUTPUT_TYPE_VAR, STDERR_TAIL_BYTES};
use crate::error::TaskFailure;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// A fully-resolved command line for one file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<OsString>,
    /// Extra environment for the child, on top of the inherited one.
    pub env: Vec<(OsString, OsString)>,
    /// Source volume passed to the tool.
    pub input: PathBuf,
    /// Path the tool is expected to write.
    pub output: PathBuf,
}

impl Invocation {
    /// Shell-like rendering for logs. Not quoted; not meant to be re-executed.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

/// Builds the command line for one external tool.
pub trait ToolCommand: Send + Sync {
    fn program(&self) -> &str;

    /// Command line that reads `input` and writes `output`.
    fn invocation(&self, input: &Path, output: &Path) -> Invocation;
}

/// Executes an [`Invocation`].
///
/// Implementations must block until the tool has exited. A returned `Ok` only means the tool
/// reported success; the caller still verifies the output.
pub trait ToolRunner: Send + Sync {
    fn run(&self, invocation: &Invocation) -> Result<(), TaskFailure>;
}

/// Runs tools as child processes, capturing their output.
///
/// There is no timeout: a hung tool hangs its worker.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> Result<(), TaskFailure> {
        tracing::debug!("running: {}", invocation.command_line());

        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| TaskFailure::Spawn {
                program: invocation.program.clone(),
                message: e.to_string(),
            })?;

        if output.status.success() {
            return Ok(());
        }

        Err(TaskFailure::ToolExit {
            program: invocation.program.clone(),
            status: output.status.to_string(),
            stderr: stderr_tail(&output.stderr),
        })
    }
}

/// Last few kilobytes of a tool's stderr, trimmed, for the failure reason.
fn stderr_tail(stderr: &[u8]) -> String {
    let start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&stderr[start..]).trim().to_string()
}

fn path_arg(path: &Path) -> OsString {
    path.as_os_str().to_owned()
}

/// Pins FSL tools to `.nii.gz` output whatever `FSLOUTPUTTYPE` the caller has set.
fn fsl_output_env() -> Vec<(OsString, OsString)> {
    vec![(FSL_OUTPUT_TYPE_VAR.into(), FSL_OUTPUT_TYPE.into())]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Invocation {
        Invocation {
            program: "sh".into(),
            args: vec!["-c".into(), script.into()],
            env: Vec::new(),
            input: PathBuf::from("in.nii"),
            output: PathBuf::from("out.nii"),
        }
    }

    #[test]
    fn test_command_line_rendering() {
        let inv = sh("exit 0");
        assert_eq!(inv.command_line(), "sh -c exit 0");
    }

    #[test]
    fn test_stderr_tail_keeps_the_end() {
        let long = vec![b'x'; STDERR_TAIL_BYTES + 10];
        let mut bytes = long.clone();
        bytes.extend_from_slice(b"END\n");
        let tail = stderr_tail(&bytes);
        assert!(tail.ends_with("END"));
        assert!(tail.len() <= STDERR_TAIL_BYTES);
    }

    #[cfg(unix)]
    #[test]
    fn test_process_runner_success() {
        assert_eq!(ProcessRunner.run(&sh("exit 0")), Ok(()));
    }

    #[cfg(unix)]
    #[test]
    fn test_process_runner_reports_exit_and_stderr() {
        let err = ProcessRunner
            .run(&sh("echo 'Image Exception : no such file' >&2; exit 3"))
            .unwrap_err();

        match err {
            TaskFailure::ToolExit {
                program,
                status,
                stderr,
            } => {
                assert_eq!(program, "sh");
                assert!(status.contains('3'));
                assert_eq!(stderr, "Image Exception : no such file");
            }
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_process_runner_overrides_child_environment() {
        let mut inv = sh(r#"test "$FSLOUTPUTTYPE" = NIFTI_GZ"#);
        inv.env = fsl_output_env();
        assert_eq!(ProcessRunner.run(&inv), Ok(()));
    }

    #[test]
    fn test_process_runner_spawn_failure() {
        let inv = Invocation {
            program: "neuroprep-definitely-missing-tool".into(),
            args: vec![],
            env: Vec::new(),
            input: PathBuf::from("in.nii"),
            output: PathBuf::from("out.nii"),
        };
        assert!(matches!(
            ProcessRunner.run(&inv),
            Err(TaskFailure::Spawn { .. })
        ));
    }
}

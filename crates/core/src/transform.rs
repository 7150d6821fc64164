//! The per-file transform shared by all stages.
//!
//! Order of operations for one task:
//!
//! 1. run the external tool, writing `tool_output`
//! 2. if the tool writes gzip, expand to the derivative path and drop the `.gz`; a tool that
//!    wrote the derivative uncompressed instead is accepted as is
//! 3. verify the derivative exists and is non-empty
//! 4. remove the source volume
//!
//! The source is only removed after step 3 succeeds. On any earlier failure the source is
//! kept and the files this task created are removed. Files that were already there before
//! the tool ran, such as a derivative left by an earlier run, are kept; a derivative that
//! fails verification is always removed.

use crate::error::TaskFailure;
use crate::stage::Stage;
use crate::task::Task;
use crate::tools::{ToolCommand, ToolRunner};
use neuroprep_files::{decompress_gz_sibling, remove_source, verify_artifact, ArtifactInfo};
use std::path::Path;

pub struct StageTransform<'a> {
    stage: Stage,
    tool: &'a dyn ToolCommand,
    runner: &'a dyn ToolRunner,
}

impl<'a> StageTransform<'a> {
    pub fn new(stage: Stage, tool: &'a dyn ToolCommand, runner: &'a dyn ToolRunner) -> Self {
        Self {
            stage,
            tool,
            runner,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Transform one source volume into its verified derivative.
    pub fn apply(&self, task: &Task) -> Result<ArtifactInfo, TaskFailure> {
        let compressed = self.stage.compressed_output();
        let tool_output = task.tool_output(compressed);
        let invocation = self.tool.invocation(&task.input, &tool_output);

        let had_tool_output = tool_output.exists();
        let had_output = task.output.exists();
        let discard_created = || {
            if !had_tool_output {
                discard(&tool_output);
            }
            if !had_output {
                discard(&task.output);
            }
        };

        if let Err(failure) = self.runner.run(&invocation) {
            discard_created();
            return Err(failure);
        }

        if compressed {
            let wrote_plain = !had_output && !tool_output.exists() && task.output.exists();
            if wrote_plain {
                tracing::debug!(
                    "{} wrote uncompressed output {}",
                    invocation.program,
                    task.output.display()
                );
            } else if let Err(e) = decompress_gz_sibling(&tool_output) {
                discard_created();
                return Err(TaskFailure::Decompress(e.to_string()));
            }
        }

        let artifact = match verify_artifact(&task.output) {
            Ok(artifact) => artifact,
            Err(e) => {
                discard(&task.output);
                return Err(TaskFailure::Verify(e.to_string()));
            }
        };

        remove_source(&task.input).map_err(|e| TaskFailure::RemoveSource(e.to_string()))?;

        Ok(artifact)
    }
}

/// Best-effort removal of a partial artifact.
fn discard(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!("removed partial artifact {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("failed to remove partial artifact {}: {}", path.display(), e),
    }
}

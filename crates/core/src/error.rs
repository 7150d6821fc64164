use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PrepError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid text value: {0}")]
    Text(#[from] neuroprep_types::TextError),
    #[error("failed to read config file {path}: {source}", path = path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}", path = path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to read cohort directory {path}: {source}", path = path.display())]
    CohortRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cohort directory does not exist: {}", .0.display())]
    CohortMissing(PathBuf),
    #[error("reference template not found: {}", .0.display())]
    ReferenceMissing(PathBuf),
    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
    #[error("progress reporter stopped before all tasks finished")]
    ReporterDisconnected,
    #[error("failed to write report: {0}")]
    ReportWrite(std::io::Error),
    #[error("failed to serialize report: {0}")]
    ReportSerialization(serde_yaml::Error),
}

pub type PrepResult<T> = std::result::Result<T, PrepError>;

/// Reason a single task did not produce a verified derivative.
///
/// Kept separate from [`PrepError`]: a task failure is recorded in the batch report and never
/// stops the batch.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TaskFailure {
    #[error("failed to start {program}: {message}")]
    Spawn { program: String, message: String },
    #[error("{program} exited with {status}: {stderr}")]
    ToolExit {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("failed to decompress tool output: {0}")]
    Decompress(String),
    #[error("derivative failed verification: {0}")]
    Verify(String),
    #[error("failed to remove source: {0}")]
    RemoveSource(String),
    #[error("worker panicked: {0}")]
    Panicked(String),
}

impl serde::Serialize for TaskFailure {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

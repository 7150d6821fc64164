//! Batch reports.
//!
//! Every stage run ends with a [`BatchReport`]: one entry per task, success or failure, plus
//! totals. Reports can be written as YAML so a later run (or a person) can see which
//! derivative came from which source, and which sources still need attention.

use crate::stage::Stage;
use crate::task::TaskOutcome;
use crate::{PrepError, PrepResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub stage: Stage,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<TaskOutcome>,
}

impl BatchReport {
    /// Build a report from the collected outcomes. Outcomes are sorted by input path so the
    /// written report does not depend on completion order.
    pub fn from_outcomes(
        stage: Stage,
        started_at: DateTime<Utc>,
        mut outcomes: Vec<TaskOutcome>,
    ) -> Self {
        outcomes.sort_by(|a, b| a.task.input.cmp(&b.task.input));
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        let total = outcomes.len();

        Self {
            stage,
            started_at,
            finished_at: Utc::now(),
            total,
            succeeded,
            failed: total - succeeded,
            outcomes,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// One line, e.g. `registration: 41/42 succeeded, 1 failed (12.3s)`.
    pub fn summary(&self) -> String {
        let elapsed = (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0;
        format!(
            "{}: {}/{} succeeded, {} failed ({:.1}s)",
            self.stage, self.succeeded, self.total, self.failed, elapsed
        )
    }
}

/// Process exit status for a run: 1 if any task in any stage failed, 0 otherwise.
pub fn exit_status(reports: &[BatchReport]) -> u8 {
    if reports.iter().all(BatchReport::is_success) {
        0
    } else {
        1
    }
}

#[derive(Serialize)]
struct ReportFile<'a> {
    generated_at: DateTime<Utc>,
    stages: &'a [BatchReport],
}

/// Write one or more stage reports to `path` as YAML.
pub fn write_reports_yaml(path: &Path, reports: &[BatchReport]) -> PrepResult<()> {
    let file = ReportFile {
        generated_at: Utc::now(),
        stages: reports,
    };
    let yaml = serde_yaml::to_string(&file).map_err(PrepError::ReportSerialization)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(PrepError::ReportWrite)?;
    }
    std::fs::write(path, yaml).map_err(PrepError::ReportWrite)?;

    tracing::info!("wrote report to {}", path.display());
    Ok(())
}

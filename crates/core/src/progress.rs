//! Progress reporting.
//!
//! Workers never touch the progress display. Each finished task sends its outcome over a
//! bounded channel, and a single reporter thread receives exactly `total` of them, feeding a
//! [`ProgressSink`] and collecting the outcomes for the batch report.

use crate::task::TaskOutcome;
use crossbeam_channel::Receiver;
use indicatif::{ProgressBar, ProgressStyle};

/// Receives one signal per finished task.
pub trait ProgressSink: Send {
    fn start(&mut self, total: usize);
    fn advance(&mut self, outcome: &TaskOutcome);
    fn finish(&mut self);
}

const BAR_TEMPLATE: &str = "{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})";

/// Terminal progress bar, drawn on stderr. Failures are counted in the bar's message; the
/// failure lines themselves go to the log.
pub struct BarProgress {
    label: String,
    failed: usize,
    bar: Option<ProgressBar>,
}

impl BarProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            failed: 0,
            bar: None,
        }
    }
}

impl ProgressSink for BarProgress {
    fn start(&mut self, total: usize) {
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        let bar = ProgressBar::new(total as u64);
        bar.set_style(style);
        bar.set_message(self.label.clone());
        self.bar = Some(bar);
    }

    fn advance(&mut self, outcome: &TaskOutcome) {
        if let Some(bar) = &self.bar {
            if !outcome.is_success() {
                self.failed += 1;
                bar.set_message(format!("{} ({} failed)", self.label, self.failed));
            }
            bar.inc(1);
        }
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish();
        }
    }
}

/// Plain log lines for non-interactive runs, roughly every tenth of the batch.
pub struct LogProgress {
    label: String,
    total: usize,
    done: usize,
    step: usize,
}

impl LogProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            total: 0,
            done: 0,
            step: 1,
        }
    }
}

impl ProgressSink for LogProgress {
    fn start(&mut self, total: usize) {
        self.total = total;
        self.done = 0;
        self.step = (total / 10).max(1);
    }

    fn advance(&mut self, _outcome: &TaskOutcome) {
        self.done += 1;
        if self.done % self.step == 0 || self.done == self.total {
            tracing::info!("{}: {}/{} files", self.label, self.done, self.total);
        }
    }

    fn finish(&mut self) {}
}

/// Reporter loop: receive exactly `total` outcomes, or stop early if every sender is gone.
pub(crate) fn consume(
    rx: Receiver<TaskOutcome>,
    total: usize,
    sink: &mut dyn ProgressSink,
) -> Vec<TaskOutcome> {
    let mut outcomes = Vec::with_capacity(total);
    sink.start(total);
    for _ in 0..total {
        match rx.recv() {
            Ok(outcome) => {
                sink.advance(&outcome);
                outcomes.push(outcome);
            }
            Err(_) => break,
        }
    }
    sink.finish();
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskFailure;
    use crate::task::{Task, TaskStatus};
    use crate::test_support::RecordingProgress;
    use neuroprep_types::CohortName;
    use std::path::PathBuf;

    fn failed(name: &str) -> TaskOutcome {
        TaskOutcome {
            task: Task {
                cohort: CohortName::new("CN").unwrap(),
                input: PathBuf::from(name),
                output: PathBuf::from(format!("{name}.out")),
            },
            status: TaskStatus::Failed {
                reason: TaskFailure::Panicked("boom".into()),
            },
            elapsed_ms: 0,
        }
    }

    #[test]
    fn test_consume_stops_after_total() {
        let (tx, rx) = crossbeam_channel::unbounded();
        for i in 0..5 {
            tx.send(failed(&format!("{i}.nii"))).unwrap();
        }

        let mut sink = RecordingProgress::default();
        let outcomes = consume(rx, 3, &mut sink);

        assert_eq!(outcomes.len(), 3);
        assert_eq!(sink.total, Some(3));
        assert_eq!(sink.advanced, 3);
        assert_eq!(sink.failures_seen, 3);
        assert!(sink.finished);
    }

    #[test]
    fn test_consume_returns_early_when_senders_drop() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let producer = std::thread::spawn(move || {
            tx.send(failed("only.nii")).unwrap();
        });

        let mut sink = RecordingProgress::default();
        let outcomes = consume(rx, 4, &mut sink);
        producer.join().unwrap();

        assert_eq!(outcomes.len(), 1);
        assert!(sink.finished);
    }

    #[test]
    fn test_log_progress_counts() {
        let mut sink = LogProgress::new("registration");
        sink.start(25);
        for i in 0..25 {
            sink.advance(&failed(&format!("{i}.nii")));
        }
        sink.finish();
        assert_eq!(sink.done, 25);
        assert_eq!(sink.step, 2);
    }

    #[test]
    fn test_bar_progress_tracks_position() {
        let mut sink = BarProgress::new("bias-correction");
        sink.start(2);
        sink.advance(&failed("a.nii"));
        sink.advance(&failed("b.nii"));
        assert_eq!(sink.bar.as_ref().map(|b| b.position()), Some(2));
        assert_eq!(
            sink.bar.as_ref().map(|b| b.message()),
            Some("bias-correction (2 failed)".to_string())
        );
        sink.finish();
        assert!(sink.bar.is_none());
    }
}

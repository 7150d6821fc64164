//! Bounded parallel dispatch of tasks.
//!
//! One rayon pool is built per stage run. Every task is submitted exactly once; each task's
//! error or panic is turned into a failed [`TaskOutcome`] so siblings keep running, and every
//! task sends exactly one outcome to the reporter thread.

use crate::constants::{IO_THREADS_OVER_CORES, MAX_DEFAULT_IO_THREADS};
use crate::error::TaskFailure;
use crate::progress::{self, ProgressSink};
use crate::task::{Task, TaskOutcome, TaskStatus};
use crate::{PrepError, PrepResult};
use neuroprep_files::ArtifactInfo;
use rayon::prelude::*;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

/// Worker pool sizing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolShape {
    /// One worker per core, for CPU-bound tools.
    Cpu,
    /// `min(32, cores + 4)` workers, for tools whose workers mostly wait on a child process.
    Io,
}

impl PoolShape {
    /// Worker count for this shape; `requested` overrides the default when set.
    pub fn threads(self, requested: Option<usize>) -> usize {
        if let Some(n) = requested {
            return n.max(1);
        }
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        match self {
            PoolShape::Cpu => cores,
            PoolShape::Io => (cores + IO_THREADS_OVER_CORES).min(MAX_DEFAULT_IO_THREADS),
        }
    }
}

/// Run `work` for every task on a pool of `threads` workers and block until all finish.
///
/// Returns one outcome per task, in completion order.
///
/// # Errors
///
/// Returns `PrepError::WorkerPool` if the pool cannot be built and
/// `PrepError::ReporterDisconnected` if the reporter thread died before receiving every
/// outcome. Individual task failures are never errors here.
pub fn dispatch<F>(
    tasks: Vec<Task>,
    threads: usize,
    sink: &mut dyn ProgressSink,
    work: F,
) -> PrepResult<Vec<TaskOutcome>>
where
    F: Fn(&Task) -> Result<ArtifactInfo, TaskFailure> + Sync,
{
    let total = tasks.len();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .thread_name(|i| format!("neuroprep-worker-{i}"))
        .build()?;

    let (tx, rx) = crossbeam_channel::bounded::<TaskOutcome>(threads.max(1));

    let outcomes = std::thread::scope(|scope| {
        let reporter = scope.spawn(move || progress::consume(rx, total, sink));

        pool.install(|| {
            tasks.into_par_iter().for_each_with(tx, |tx, task| {
                let outcome = run_guarded(&work, task);
                if let Err(e) = tx.send(outcome) {
                    tracing::error!(
                        "progress reporter gone, dropping outcome for {}",
                        e.0.task.input.display()
                    );
                }
            });
        });

        reporter.join()
    })
    .map_err(|_| PrepError::ReporterDisconnected)?;

    if outcomes.len() != total {
        return Err(PrepError::ReporterDisconnected);
    }

    Ok(outcomes)
}

fn run_guarded<F>(work: &F, task: Task) -> TaskOutcome
where
    F: Fn(&Task) -> Result<ArtifactInfo, TaskFailure>,
{
    let started = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| work(&task)))
        .unwrap_or_else(|payload| Err(TaskFailure::Panicked(panic_message(payload.as_ref()))));
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let status = match result {
        Ok(artifact) => {
            tracing::debug!("processed {} -> {}", task.input.display(), task.output.display());
            TaskStatus::Succeeded { artifact }
        }
        Err(reason) => TaskStatus::Failed { reason },
    };

    let outcome = TaskOutcome {
        task,
        status,
        elapsed_ms,
    };
    if let Some(line) = outcome.failure_line() {
        tracing::error!("{}", line);
    }
    outcome
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

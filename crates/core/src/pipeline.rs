//! Stage orchestration.
//!
//! A [`Pipeline`] turns the cohort directories into tasks for one stage, dispatches them on the
//! stage's worker pool and folds the outcomes into a [`BatchReport`]. [`Pipeline::run_chain`]
//! runs all three stages, feeding each stage's derivatives into the next.

use crate::config::PipelineConfig;
use crate::dispatch::dispatch;
use crate::enumerate::{build_tasks, gather_volumes};
use crate::progress::ProgressSink;
use crate::report::BatchReport;
use crate::stage::Stage;
use crate::task::Task;
use crate::tools::ToolRunner;
use crate::transform::StageTransform;
use crate::{PrepError, PrepResult};
use chrono::Utc;
use neuroprep_types::FileSuffix;

pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    runner: &'a dyn ToolRunner,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a PipelineConfig, runner: &'a dyn ToolRunner) -> Self {
        Self { config, runner }
    }

    /// Enumerate every cohort and build the tasks `stage` would run for files ending in
    /// `input_suffix`.
    ///
    /// # Errors
    ///
    /// Returns the enumeration error of the first cohort directory that is missing or cannot
    /// be listed.
    pub fn plan(&self, stage: Stage, input_suffix: &FileSuffix) -> PrepResult<Vec<Task>> {
        let mut tasks = Vec::new();
        for cohort in &self.config.cohorts {
            let dir = self.config.cohort_dir(cohort);
            let volumes = gather_volumes(&dir, cohort, input_suffix)?;
            tracing::debug!("{}: {} candidate volumes", dir.display(), volumes.len());
            tasks.extend(build_tasks(stage, input_suffix, volumes));
        }
        Ok(tasks)
    }

    /// Run one stage over the files matching its configured input suffix.
    pub fn run_stage(&self, stage: Stage, sink: &mut dyn ProgressSink) -> PrepResult<BatchReport> {
        let input_suffix = stage.configured_input_suffix(self.config);
        self.run_stage_with_suffix(stage, input_suffix, sink)
    }

    /// Run one stage over the files ending in `input_suffix`.
    ///
    /// Individual task failures end up in the report, never in the error.
    ///
    /// # Errors
    ///
    /// - `PrepError::ReferenceMissing` if this is the registration stage and the reference
    ///   template is not a file
    /// - enumeration errors from [`Pipeline::plan`]
    /// - dispatch errors (worker pool or reporter failures)
    pub fn run_stage_with_suffix(
        &self,
        stage: Stage,
        input_suffix: &FileSuffix,
        sink: &mut dyn ProgressSink,
    ) -> PrepResult<BatchReport> {
        if stage == Stage::Registration {
            self.check_reference()?;
        }

        let tasks = self.plan(stage, input_suffix)?;
        tracing::info!("{}: Total files to process: {}", stage, tasks.len());

        let tool = stage.tool(self.config);
        let threads = stage.pool_shape().threads(self.config.threads);
        tracing::debug!("{}: running {} on {} workers", stage, tool.program(), threads);

        let transform = StageTransform::new(stage, tool, self.runner);
        let started_at = Utc::now();
        let outcomes = dispatch(tasks, threads, sink, |task| transform.apply(task))?;

        let report = BatchReport::from_outcomes(stage, started_at, outcomes);
        if report.is_success() {
            tracing::info!("{}", report.summary());
        } else {
            tracing::warn!("{}", report.summary());
        }
        Ok(report)
    }

    /// Run bias correction, skull stripping and registration in order.
    ///
    /// The first stage uses its configured input suffix; every later stage takes the previous
    /// stage's output suffix. The chain stops after a stage with failed tasks, returning the
    /// reports of the stages that ran.
    pub fn run_chain<S>(&self, mut make_sink: S) -> PrepResult<Vec<BatchReport>>
    where
        S: FnMut(Stage) -> Box<dyn ProgressSink>,
    {
        // Fail before the first stage consumes any source volume.
        self.check_reference()?;

        let mut reports = Vec::with_capacity(Stage::CHAIN.len());
        let mut input_suffix = Stage::BiasCorrection
            .configured_input_suffix(self.config)
            .clone();

        for stage in Stage::CHAIN {
            let mut sink = make_sink(stage);
            let report = self.run_stage_with_suffix(stage, &input_suffix, sink.as_mut())?;
            let failed = report.failed;
            reports.push(report);

            if failed > 0 {
                tracing::warn!("stopping after {}: {} files failed", stage, failed);
                break;
            }
            input_suffix = stage.output_suffix();
        }

        Ok(reports)
    }

    fn check_reference(&self) -> PrepResult<()> {
        let reference = &self.config.registration.flirt.reference;
        if !reference.is_file() {
            return Err(PrepError::ReferenceMissing(reference.clone()));
        }
        Ok(())
    }
}

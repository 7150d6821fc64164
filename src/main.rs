use anyhow::Context;
use neuroprep_core::{
    exit_status, BarProgress, ConfigOverrides, LogProgress, Pipeline, PipelineConfig, ProcessRunner,
    ProgressSink,
};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the neuroprep pipeline
///
/// Runs bias correction, skull stripping and registration over every cohort directory,
/// configured from the environment only. Use the `neuroprep` CLI for single stages.
///
/// # Environment Variables
/// - `NEUROPREP_CONFIG`: YAML configuration file (optional)
/// - `NEUROPREP_DATA_DIR`: Directory containing the cohort directories (default: ".")
/// - `NEUROPREP_REFERENCE`: Registration template (default: "MNI152_T1_1mm.nii")
/// - `NEUROPREP_THREADS`: Worker threads per stage (default: per-stage pool size)
///
/// # Returns
/// * `Ok(ExitCode::SUCCESS)` - If every file in every stage was processed
/// * `Ok(ExitCode::FAILURE)` - If any file failed; its source is left in place
/// * `Err(anyhow::Error)` - If configuration, enumeration or the worker pool fails
fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("neuroprep=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let base = match std::env::var("NEUROPREP_CONFIG") {
        Ok(path) => PipelineConfig::from_yaml_file(&PathBuf::from(path))?,
        Err(_) => PipelineConfig::default(),
    };

    let threads = std::env::var("NEUROPREP_THREADS")
        .ok()
        .map(|v| v.parse::<usize>())
        .transpose()
        .context("NEUROPREP_THREADS must be a positive integer")?;

    let config = base.with_overrides(ConfigOverrides {
        data_dir: std::env::var("NEUROPREP_DATA_DIR").ok().map(PathBuf::from),
        cohorts: None,
        threads,
        reference: std::env::var("NEUROPREP_REFERENCE").ok().map(PathBuf::from),
    })?;

    tracing::info!("preprocessing cohorts under {}", config.data_dir.display());

    let interactive = std::io::stderr().is_terminal();
    let runner = ProcessRunner;
    let reports = Pipeline::new(&config, &runner).run_chain(|stage| -> Box<dyn ProgressSink> {
        if interactive {
            Box::new(BarProgress::new(stage.name()))
        } else {
            Box::new(LogProgress::new(stage.name()))
        }
    })?;

    let status = exit_status(&reports);
    if status != 0 {
        let failed: usize = reports.iter().map(|r| r.failed).sum();
        tracing::error!("{} files failed; their sources were left in place", failed);
    }

    Ok(ExitCode::from(status))
}

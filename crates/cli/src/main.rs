use anyhow::Context;
use clap::{Parser, Subcommand};
use neuroprep_core::{
    exit_status, write_reports_yaml, BarProgress, BatchReport, ConfigOverrides, LogProgress, Pipeline,
    PipelineConfig, ProcessRunner, ProgressSink, Stage,
};
use neuroprep_types::{CohortName, FileSuffix};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "neuroprep")]
#[command(about = "Batch MRI preprocessing: bias correction, skull stripping, registration")]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true, env = "NEUROPREP_CONFIG")]
    config: Option<PathBuf>,
    /// Directory containing the cohort directories
    #[arg(long, global = true, env = "NEUROPREP_DATA_DIR")]
    data_dir: Option<PathBuf>,
    /// Cohort directory names (comma-separated)
    #[arg(long, global = true, value_delimiter = ',')]
    cohorts: Option<Vec<CohortName>>,
    /// Worker threads per stage
    #[arg(long, global = true, env = "NEUROPREP_THREADS")]
    threads: Option<usize>,
    /// Log progress lines instead of drawing a progress bar
    #[arg(long, global = true)]
    quiet: bool,
    /// Write a YAML report of every processed file
    #[arg(long, global = true)]
    report: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// N4 bias-field correction
    BiasCorrect {
        /// Suffix of the volumes to correct
        #[arg(long)]
        input_suffix: Option<FileSuffix>,
    },
    /// Brain extraction with bet
    SkullStrip {
        /// Suffix of the volumes to strip
        #[arg(long)]
        input_suffix: Option<FileSuffix>,
    },
    /// Linear registration to a reference template with flirt
    Register {
        /// Suffix of the volumes to register
        #[arg(long)]
        input_suffix: Option<FileSuffix>,
        /// Reference template
        #[arg(long, env = "NEUROPREP_REFERENCE")]
        reference: Option<PathBuf>,
    },
    /// Bias correction, skull stripping and registration in sequence
    RunAll {
        /// Suffix of the raw volumes fed to bias correction
        #[arg(long)]
        input_suffix: Option<FileSuffix>,
        /// Reference template
        #[arg(long, env = "NEUROPREP_REFERENCE")]
        reference: Option<PathBuf>,
    },
}

impl Commands {
    fn reference(&self) -> Option<PathBuf> {
        match self {
            Commands::Register { reference, .. } | Commands::RunAll { reference, .. } => {
                reference.clone()
            }
            _ => None,
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("neuroprep=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = resolve_config(&cli)?;
    let runner = ProcessRunner;
    let pipeline = Pipeline::new(&config, &runner);
    let quiet = cli.quiet;

    let reports: Vec<BatchReport> = match cli.command {
        Commands::BiasCorrect { .. } => vec![run_stage(&pipeline, Stage::BiasCorrection, quiet)?],
        Commands::SkullStrip { .. } => vec![run_stage(&pipeline, Stage::SkullStrip, quiet)?],
        Commands::Register { .. } => vec![run_stage(&pipeline, Stage::Registration, quiet)?],
        Commands::RunAll { .. } => pipeline.run_chain(|stage| progress(quiet, stage))?,
    };

    if let Some(path) = &cli.report {
        write_reports_yaml(path, &reports)
            .with_context(|| format!("writing report to {}", path.display()))?;
    }

    let status = exit_status(&reports);
    if status != 0 {
        let failed: usize = reports.iter().map(|r| r.failed).sum();
        tracing::error!("{} files failed; their sources were left in place", failed);
    }

    Ok(ExitCode::from(status))
}

/// Defaults, then the YAML file, then environment and flags.
fn resolve_config(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    let base = match &cli.config {
        Some(path) => PipelineConfig::from_yaml_file(path)?,
        None => PipelineConfig::default(),
    };

    let overrides = ConfigOverrides {
        data_dir: cli.data_dir.clone(),
        cohorts: cli.cohorts.clone(),
        threads: cli.threads,
        reference: cli.command.reference(),
    };
    let mut config = base.with_overrides(overrides)?;

    match &cli.command {
        Commands::BiasCorrect { input_suffix } | Commands::RunAll { input_suffix, .. } => {
            if let Some(suffix) = input_suffix {
                config.bias_correction.input_suffix = suffix.clone();
            }
        }
        Commands::SkullStrip { input_suffix } => {
            if let Some(suffix) = input_suffix {
                config.skull_strip.input_suffix = suffix.clone();
            }
        }
        Commands::Register { input_suffix, .. } => {
            if let Some(suffix) = input_suffix {
                config.registration.input_suffix = suffix.clone();
            }
        }
    }

    tracing::debug!("resolved configuration: {:?}", config);
    Ok(config)
}

fn run_stage(pipeline: &Pipeline<'_>, stage: Stage, quiet: bool) -> anyhow::Result<BatchReport> {
    let mut sink = progress(quiet, stage);
    Ok(pipeline.run_stage(stage, sink.as_mut())?)
}

fn progress(quiet: bool, stage: Stage) -> Box<dyn ProgressSink> {
    if quiet || !std::io::stderr().is_terminal() {
        Box::new(LogProgress::new(stage.name()))
    } else {
        Box::new(BarProgress::new(stage.name()))
    }
}

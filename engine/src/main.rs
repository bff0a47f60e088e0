// Engine main entry point
use anyhow::Context;
use clap::{Parser, Subcommand};
use engine::config::PipelineSettings;
use engine::services::ForecastService;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "engine", version, about = "Indicator preprocessing, LSTM training and price forecasting")]
struct Cli {
    /// TOML settings file; built-in defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory that relative data and artifact paths are resolved against
    #[arg(short, long)]
    workdir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute indicators from the raw price file
    Preprocess,
    /// Train the model and write model and scaler artifacts
    Train,
    /// Predict closes for the processed dataset
    Predict,
    /// Summarize the predictions into a forecast report
    Report,
}

fn load_settings(cli: &Cli) -> anyhow::Result<PipelineSettings> {
    let mut settings = match &cli.config {
        Some(path) => PipelineSettings::from_file(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => PipelineSettings::default(),
    };
    if let Some(dir) = &cli.workdir {
        settings.rebase(dir);
    }
    Ok(settings)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let service = ForecastService::new(load_settings(&cli)?);
    match cli.command {
        Command::Preprocess => {
            let summary = service.preprocess().context("preprocess stage failed")?;
            info!(input_rows = summary.input_rows, retained_rows = summary.retained_rows, "Preprocess finished");
        }
        Command::Train => {
            let report = service.train().context("train stage failed")?;
            info!(
                epochs_run = report.epochs_run,
                best_epoch = report.best_epoch,
                stopped_early = report.stopped_early,
                test_mse = report.test_mse,
                test_mae = report.test_mae,
                "Train finished"
            );
        }
        Command::Predict => {
            let summary = service.predict().context("predict stage failed")?;
            info!(rows = summary.rows, predicted_rows = summary.predicted_rows, "Predict finished");
        }
        Command::Report => {
            let report = service.report().context("report stage failed")?;
            info!(
                current_price = report.current_price,
                target_price = report.target_price,
                advice = %report.advice,
                "Report finished"
            );
        }
    }
    Ok(())
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting price forecasting engine...");
    if let Err(e) = run(Cli::parse()) {
        tracing::error!("Run failed: {:#}", e);
        std::process::exit(1);
    }
}

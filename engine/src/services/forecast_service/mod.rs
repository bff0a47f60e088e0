// engine/src/services/forecast_service/mod.rs
// Holds the ForecastService struct and declares one handler module per pipeline stage.
use crate::config::PipelineSettings;
use crate::error::Result;
use crate::model::Topology;
use crate::report::ForecastReport;
use crate::training::TrainingReport;

pub mod predict;
pub mod preprocess;
pub mod report;
pub mod train;

pub use predict::PredictSummary;
pub use preprocess::PreprocessSummary;

pub struct ForecastService {
    settings: PipelineSettings,
    topology: Topology,
}

impl ForecastService {
    pub fn new(settings: PipelineSettings) -> Self {
        Self::with_topology(settings, Topology::price_forecaster())
    }

    pub fn with_topology(settings: PipelineSettings, topology: Topology) -> Self {
        ForecastService { settings, topology }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Raw price CSV -> processed indicator dataset.
    pub fn preprocess(&self) -> Result<PreprocessSummary> {
        tracing::info!(input = %self.settings.paths.raw_data.display(), "Running preprocess stage");
        preprocess::handle_preprocess(&self.settings)
    }

    /// Processed dataset -> model and scaler artifacts.
    pub fn train(&self) -> Result<TrainingReport> {
        tracing::info!(input = %self.settings.paths.processed_data.display(), "Running train stage");
        train::handle_train(&self.settings, &self.topology)
    }

    /// Processed dataset + artifacts -> predictions dataset.
    pub fn predict(&self) -> Result<PredictSummary> {
        tracing::info!(input = %self.settings.paths.processed_data.display(), "Running predict stage");
        predict::handle_predict(&self.settings)
    }

    /// Predictions dataset -> forecast report.
    pub fn report(&self) -> Result<ForecastReport> {
        tracing::info!(input = %self.settings.paths.predictions.display(), "Running report stage");
        report::handle_report(&self.settings)
    }
}

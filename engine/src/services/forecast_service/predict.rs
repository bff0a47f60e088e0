// Handler for the predict stage
use crate::config::PipelineSettings;
use crate::data::dataset;
use crate::error::Result;
use crate::inference::{run_inference, ForecastArtifacts};
use crate::model::LoadedModel;
use crate::services::InferenceBackend;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictSummary {
    pub rows: usize,
    pub predicted_rows: usize,
}

pub fn handle_predict(settings: &PipelineSettings) -> Result<PredictSummary> {
    let paths = &settings.paths;
    let device = Default::default();
    let artifacts = ForecastArtifacts::<LoadedModel<InferenceBackend>>::load(paths, &device)?;
    let records = dataset::load_processed(&paths.processed_data)?;

    let predictions = run_inference(&records, &artifacts, settings.inference.chunk_size)?;
    dataset::write_predictions(&paths.predictions, &predictions)?;
    Ok(PredictSummary {
        rows: predictions.len(),
        predicted_rows: predictions.iter().filter(|r| r.predicted_close.is_some()).count(),
    })
}

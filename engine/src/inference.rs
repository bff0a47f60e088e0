// Batched inference over a processed dataset using persisted artifacts.
use crate::config::PathSettings;
use crate::error::{EngineError, Result};
use crate::model::{LoadedModel, Predictor};
use crate::scaler::ScalerState;
use burn::tensor::backend::Backend;
use shared::models::{IndicatorRecord, PredictionRecord, FEATURE_COUNT};

/// Model and scalers loaded for one run. Dropped when the run ends.
#[derive(Debug)]
pub struct ForecastArtifacts<P: Predictor> {
    pub predictor: P,
    pub scalers: ScalerState,
}

impl<P: Predictor> ForecastArtifacts<P> {
    pub fn new(predictor: P, scalers: ScalerState) -> Result<Self> {
        let expected = predictor.input_width();
        let actual = scalers.features.width();
        if expected != actual {
            return Err(EngineError::ScalerMismatch(format!(
                "feature scaler has {} dimensions but the model expects {} inputs",
                actual, expected
            )));
        }
        Ok(ForecastArtifacts { predictor, scalers })
    }
}

impl<B: Backend> ForecastArtifacts<LoadedModel<B>> {
    pub fn load(paths: &PathSettings, device: &B::Device) -> Result<Self> {
        let model = LoadedModel::<B>::load(&paths.model, device)?;
        let scalers = ScalerState::load(&paths.feature_scaler, &paths.target_scaler)?;
        ForecastArtifacts::new(model, scalers)
    }
}

/// Runs the predictor over `rows` in consecutive chunks of at most `chunk_size` rows.
pub fn predict_in_chunks<P: Predictor + ?Sized>(predictor: &P, rows: &[Vec<f64>], chunk_size: usize) -> Result<Vec<f64>> {
    if chunk_size == 0 {
        return Err(EngineError::ConfigError("chunk size must be greater than 0".into()));
    }
    let mut predictions = Vec::with_capacity(rows.len());
    for (idx, chunk) in rows.chunks(chunk_size).enumerate() {
        let output = predictor.predict(chunk)?;
        if output.len() != chunk.len() {
            return Err(EngineError::shape(chunk.len(), output.len(), format!("predictions for chunk {}", idx)));
        }
        predictions.extend(output);
    }
    tracing::debug!(rows = rows.len(), chunk_size, "Chunked prediction complete");
    Ok(predictions)
}

/// Attaches predictions to the trailing rows of the dataset; earlier rows get none.
pub fn merge_predictions(dataset: &[IndicatorRecord], predictions: &[f64]) -> Result<Vec<PredictionRecord>> {
    if predictions.len() > dataset.len() {
        return Err(EngineError::shape(dataset.len(), predictions.len(), "predictions vs dataset rows"));
    }
    let offset = dataset.len() - predictions.len();
    Ok(dataset
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let predicted = i.checked_sub(offset).map(|j| predictions[j]);
            PredictionRecord::from_indicator(record, predicted)
        })
        .collect())
}

/// Scales the feature matrix, predicts in chunks, unscales and merges into the dataset.
pub fn run_inference<P: Predictor>(
    dataset: &[IndicatorRecord],
    artifacts: &ForecastArtifacts<P>,
    chunk_size: usize,
) -> Result<Vec<PredictionRecord>> {
    if dataset.is_empty() {
        return Err(EngineError::EmptyInput("processed dataset has no rows".into()));
    }
    let features: Vec<[f64; FEATURE_COUNT]> = dataset.iter().map(|r| r.features()).collect();
    let scaled = artifacts.scalers.features.transform_rows(&features)?;

    let predictions = predict_in_chunks(&artifacts.predictor, &scaled, chunk_size)?
        .into_iter()
        .map(|v| artifacts.scalers.unscale_target(v))
        .collect::<Result<Vec<f64>>>()?;

    tracing::info!(rows = dataset.len(), predictions = predictions.len(), chunk_size, "Inference complete");
    merge_predictions(dataset, &predictions)
}

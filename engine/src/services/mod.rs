// Pipeline services invoked by the CLI.
pub mod forecast_service;

pub use forecast_service::ForecastService;

/// Backend used for inference and for the trained model once training finishes.
pub type InferenceBackend = burn::backend::NdArray<f32>;
/// Autodiff wrapper used while training.
pub type TrainingBackend = burn::backend::Autodiff<InferenceBackend>;

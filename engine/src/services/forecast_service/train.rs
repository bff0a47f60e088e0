// Handler for the train stage
use crate::config::PipelineSettings;
use crate::data::dataset;
use crate::error::Result;
use crate::model::Topology;
use crate::services::{InferenceBackend, TrainingBackend};
use crate::training::{Trainer, TrainingReport};
use burn::tensor::backend::Backend;

pub fn handle_train(settings: &PipelineSettings, topology: &Topology) -> Result<TrainingReport> {
    let records = dataset::load_processed(&settings.paths.processed_data)?;
    let device = <InferenceBackend as Backend>::Device::default();

    let trainer = Trainer::new(&settings.training, topology.clone())?;
    let outcome = trainer.fit::<TrainingBackend>(&records, &device)?;
    outcome.persist(&settings.paths)?;
    Ok(outcome.report)
}

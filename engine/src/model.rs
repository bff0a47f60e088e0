//! Recurrent price regressor and its on-disk artifact.
//!
//! The layer stack is described by a [`Topology`] value, an ordered list of
//! layer descriptors that is stored in the artifact header. The network itself
//! is built from that description.

use crate::error::{EngineError, Result};
use crate::store;
use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, Lstm, LstmConfig};
use burn::record::{BinBytesRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::{backend::Backend, Tensor, TensorData};
use serde::{Deserialize, Serialize};
use shared::models::FEATURE_COUNT;
use std::path::Path;

const ARTIFACT_FORMAT: &str = "price-model/burn-bin/v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerSpec {
    /// LSTM layer. `return_sequences` keeps every timestep; otherwise only the last one is passed on.
    Recurrent { units: usize, return_sequences: bool },
    Dropout { rate: f64 },
    Dense { units: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub input_width: usize,
    /// Timesteps per sample. Each sample is a single feature row, so this is 1.
    pub timesteps: usize,
    pub layers: Vec<LayerSpec>,
}

impl Default for Topology {
    fn default() -> Self {
        Topology::price_forecaster()
    }
}

impl Topology {
    /// LSTM(50, sequences) -> Dropout(0.2) -> LSTM(50, last) -> Dropout(0.2) -> Dense(1).
    pub fn price_forecaster() -> Self {
        Topology {
            input_width: FEATURE_COUNT,
            timesteps: 1,
            layers: vec![
                LayerSpec::Recurrent { units: 50, return_sequences: true },
                LayerSpec::Dropout { rate: 0.2 },
                LayerSpec::Recurrent { units: 50, return_sequences: false },
                LayerSpec::Dropout { rate: 0.2 },
                LayerSpec::Dense { units: 1 },
            ],
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(EngineError::ModelError(format!("invalid topology: {}", msg)));

        if self.input_width == 0 {
            return invalid("input width must be greater than 0".into());
        }
        if self.timesteps != 1 {
            return invalid(format!("only single-timestep samples are supported, got {}", self.timesteps));
        }

        let recurrent: Vec<usize> = self
            .layers
            .iter()
            .enumerate()
            .filter(|(_, l)| matches!(l, LayerSpec::Recurrent { .. }))
            .map(|(i, _)| i)
            .collect();
        let last_recurrent = match recurrent.last() {
            Some(i) => *i,
            None => return invalid("at least one recurrent layer is required".into()),
        };

        for (i, layer) in self.layers.iter().enumerate() {
            match *layer {
                LayerSpec::Recurrent { units, return_sequences } => {
                    if units == 0 {
                        return invalid(format!("layer {} has zero units", i));
                    }
                    if i != last_recurrent && !return_sequences {
                        return invalid(format!("recurrent layer {} feeds another recurrent layer and must return sequences", i));
                    }
                    if i == last_recurrent && return_sequences {
                        return invalid(format!("final recurrent layer {} must return only its last output", i));
                    }
                }
                LayerSpec::Dropout { rate } => {
                    if !(0.0..1.0).contains(&rate) {
                        return invalid(format!("dropout rate {} at layer {} is outside [0, 1)", rate, i));
                    }
                    if i == 0 || !matches!(self.layers[i - 1], LayerSpec::Recurrent { .. }) {
                        return invalid(format!("dropout at layer {} must follow a recurrent layer", i));
                    }
                }
                LayerSpec::Dense { units } => {
                    if i != self.layers.len() - 1 {
                        return invalid(format!("dense layer {} must be the last layer", i));
                    }
                    if units != 1 {
                        return invalid(format!("output layer must have 1 unit, got {}", units));
                    }
                }
            }
        }
        if !matches!(self.layers.last(), Some(LayerSpec::Dense { .. })) {
            return invalid("the stack must end with a dense output layer".into());
        }
        Ok(())
    }
}

#[derive(Module, Debug)]
pub struct RecurrentBlock<B: Backend> {
    lstm: Lstm<B>,
    dropout: Option<Dropout>,
}

#[derive(Module, Debug)]
pub struct PriceModel<B: Backend> {
    blocks: Vec<RecurrentBlock<B>>,
    head: Linear<B>,
}

impl<B: Backend> PriceModel<B> {
    pub fn new(topology: &Topology, device: &B::Device) -> Result<Self> {
        topology.validate()?;

        let mut blocks: Vec<RecurrentBlock<B>> = Vec::new();
        let mut width = topology.input_width;
        let mut head = None;
        for layer in &topology.layers {
            match *layer {
                LayerSpec::Recurrent { units, .. } => {
                    blocks.push(RecurrentBlock {
                        lstm: LstmConfig::new(width, units, true).init(device),
                        dropout: None,
                    });
                    width = units;
                }
                LayerSpec::Dropout { rate } => {
                    if let Some(block) = blocks.last_mut() {
                        block.dropout = Some(DropoutConfig::new(rate).init());
                    }
                }
                LayerSpec::Dense { units } => head = Some(LinearConfig::new(width, units).init(device)),
            }
        }
        let head = head.ok_or_else(|| EngineError::ModelError("topology has no output layer".into()))?;
        Ok(PriceModel { blocks, head })
    }

    /// `input` is `[batch, timesteps, features]`; returns `[batch, 1]`.
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        let mut x = input;
        for block in &self.blocks {
            let (output, _state) = block.lstm.forward(x, None);
            x = match &block.dropout {
                Some(dropout) => dropout.forward(output),
                None => output,
            };
        }
        let [batch, timesteps, hidden] = x.dims();
        let last = x.slice([0..batch, timesteps - 1..timesteps, 0..hidden]).reshape([batch, hidden]);
        self.head.forward(last)
    }
}

/// Packs feature rows into a `[rows, 1, width]` input tensor.
pub fn rows_to_input<B: Backend, R: AsRef<[f64]>>(rows: &[R], width: usize, device: &B::Device) -> Result<Tensor<B, 3>> {
    let mut flat = Vec::with_capacity(rows.len() * width);
    for (i, row) in rows.iter().enumerate() {
        let row = row.as_ref();
        if row.len() != width {
            return Err(EngineError::shape(width, row.len(), format!("model input row {}", i)));
        }
        flat.extend(row.iter().map(|v| *v as f32));
    }
    Ok(Tensor::<B, 3>::from_data(TensorData::new(flat, [rows.len(), 1, width]), device))
}

pub fn values_to_target<B: Backend>(values: &[f64], device: &B::Device) -> Tensor<B, 2> {
    let flat: Vec<f32> = values.iter().map(|v| *v as f32).collect();
    Tensor::<B, 2>::from_data(TensorData::new(flat, [values.len(), 1]), device)
}

pub fn tensor_to_values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f64>> {
    let values = tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| EngineError::ModelError(format!("reading model output: {:?}", e)))?;
    Ok(values.into_iter().map(f64::from).collect())
}

/// Anything that maps scaled feature rows to scaled target values, one per row, in order.
pub trait Predictor {
    fn input_width(&self) -> usize;
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>>;
}

/// A trained model together with the topology it was built from.
#[derive(Debug)]
pub struct LoadedModel<B: Backend> {
    pub model: PriceModel<B>,
    pub topology: Topology,
    device: B::Device,
}

impl<B: Backend> LoadedModel<B> {
    pub fn new(model: PriceModel<B>, topology: Topology, device: B::Device) -> Self {
        LoadedModel { model, topology, device }
    }

    pub fn load(path: &Path, device: &B::Device) -> Result<Self> {
        let (topology, model) = load_model::<B>(path, device)?;
        Ok(LoadedModel::new(model, topology, device.clone()))
    }
}

impl<B: Backend> Predictor for LoadedModel<B> {
    fn input_width(&self) -> usize {
        self.topology.input_width
    }

    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let input = rows_to_input::<B, _>(rows, self.topology.input_width, &self.device)?;
        tensor_to_values(self.model.forward(input))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ArtifactHeader {
    format: String,
    topology: Topology,
}

/// Writes `header-json \n parameter-bytes` atomically.
pub fn save_model<B: Backend>(model: &PriceModel<B>, topology: &Topology, path: &Path) -> Result<()> {
    let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
    let blob = Recorder::<B>::record(&recorder, model.clone().into_record(), ())
        .map_err(|e| EngineError::ModelError(format!("serializing parameters: {:?}", e)))?;

    let header = ArtifactHeader { format: ARTIFACT_FORMAT.to_string(), topology: topology.clone() };
    let mut bytes = serde_json::to_vec(&header)?;
    bytes.push(b'\n');
    bytes.extend_from_slice(&blob);

    store::atomic_write(path, &bytes)?;
    tracing::info!(path = %path.display(), parameters = model.num_params(), "Saved model artifact");
    Ok(())
}

pub fn load_model<B: Backend>(path: &Path, device: &B::Device) -> Result<(Topology, PriceModel<B>)> {
    if !path.exists() {
        return Err(EngineError::MissingArtifact { path: path.to_path_buf() });
    }
    let bytes = std::fs::read(path)?;
    let split = bytes
        .iter()
        .position(|b| *b == b'\n')
        .ok_or_else(|| EngineError::ModelError(format!("{} has no artifact header", path.display())))?;

    let header: ArtifactHeader = serde_json::from_slice(&bytes[..split])?;
    if header.format != ARTIFACT_FORMAT {
        return Err(EngineError::ModelError(format!(
            "{} has unsupported format '{}', expected '{}'",
            path.display(),
            header.format,
            ARTIFACT_FORMAT
        )));
    }

    let model = PriceModel::<B>::new(&header.topology, device)?;
    let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
    let record = Recorder::<B>::load(&recorder, bytes[split + 1..].to_vec(), device)
        .map_err(|e| EngineError::ModelError(format!("loading parameters from {}: {:?}", path.display(), e)))?;
    let model = model.load_record(record);
    tracing::info!(path = %path.display(), layers = header.topology.layers.len(), "Loaded model artifact");
    Ok((header.topology, model))
}

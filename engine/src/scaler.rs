//! Reversible min-max scaling for features and target.
//!
//! Two independent scalers are fit during training (one over the four feature
//! columns, one over the close price) and persisted next to the model. Inference
//! reloads them read-only.

use crate::error::{EngineError, Result};
use crate::store;
use serde::{Deserialize, Serialize};
use shared::models::{FEATURE_COLUMNS, FEATURE_COUNT, TARGET_COLUMN};
use std::path::Path;

/// What `fit` does with a dimension whose observed min equals its max.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DegenerateRangePolicy {
    /// Fail with `DegenerateRange`.
    #[default]
    Reject,
    /// Keep the dimension with unit scale: `x -> x - min`.
    Identity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionRange {
    pub name: String,
    pub min: f64,
    pub max: f64,
}

impl DimensionRange {
    fn scale(&self) -> f64 {
        let range = self.max - self.min;
        if range == 0.0 {
            1.0
        } else {
            range
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub policy: DegenerateRangePolicy,
    pub dimensions: Vec<DimensionRange>,
}

impl MinMaxScaler {
    /// Fits per-dimension min/max over `samples`. `names` labels the dimensions and fixes the width.
    pub fn fit<R: AsRef<[f64]>>(names: &[&str], samples: &[R], policy: DegenerateRangePolicy) -> Result<Self> {
        if samples.is_empty() {
            return Err(EngineError::EmptyInput("cannot fit a scaler on zero samples".into()));
        }
        let width = names.len();
        let mut mins = vec![f64::INFINITY; width];
        let mut maxs = vec![f64::NEG_INFINITY; width];

        for (row_idx, sample) in samples.iter().enumerate() {
            let sample = sample.as_ref();
            if sample.len() != width {
                return Err(EngineError::shape(width, sample.len(), format!("scaler fit sample {}", row_idx)));
            }
            for (d, &value) in sample.iter().enumerate() {
                if !value.is_finite() {
                    return Err(EngineError::NonFiniteValue {
                        dimension: d,
                        name: names[d].to_string(),
                        sample: row_idx,
                        value,
                    });
                }
                mins[d] = mins[d].min(value);
                maxs[d] = maxs[d].max(value);
            }
        }

        let mut dimensions = Vec::with_capacity(width);
        for (d, name) in names.iter().enumerate() {
            if mins[d] == maxs[d] && policy == DegenerateRangePolicy::Reject {
                return Err(EngineError::DegenerateRange {
                    dimension: d,
                    name: name.to_string(),
                    value: mins[d],
                });
            }
            dimensions.push(DimensionRange { name: name.to_string(), min: mins[d], max: maxs[d] });
        }
        Ok(MinMaxScaler { policy, dimensions })
    }

    pub fn width(&self) -> usize {
        self.dimensions.len()
    }

    fn check_width(&self, len: usize, context: &str) -> Result<()> {
        if len != self.width() {
            return Err(EngineError::shape(self.width(), len, context));
        }
        Ok(())
    }

    /// Maps each value to `(x - min) / (max - min)`. Values outside the fitted range are not clamped.
    pub fn transform(&self, x: &[f64]) -> Result<Vec<f64>> {
        self.check_width(x.len(), "scaler transform input")?;
        Ok(x.iter().zip(&self.dimensions).map(|(v, dim)| (v - dim.min) / dim.scale()).collect())
    }

    pub fn inverse_transform(&self, y: &[f64]) -> Result<Vec<f64>> {
        self.check_width(y.len(), "scaler inverse_transform input")?;
        Ok(y.iter().zip(&self.dimensions).map(|(v, dim)| v * dim.scale() + dim.min).collect())
    }

    pub fn transform_rows<R: AsRef<[f64]>>(&self, rows: &[R]) -> Result<Vec<Vec<f64>>> {
        rows.iter().map(|row| self.transform(row.as_ref())).collect()
    }

    pub fn mins(&self) -> Vec<f64> {
        self.dimensions.iter().map(|d| d.min).collect()
    }

    pub fn maxs(&self) -> Vec<f64> {
        self.dimensions.iter().map(|d| d.max).collect()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        store::write_json(path, self)?;
        tracing::info!(path = %path.display(), width = self.width(), "Saved scaler");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let scaler: MinMaxScaler = store::read_json_artifact(path)?;
        if scaler.dimensions.iter().any(|d| !(d.min.is_finite() && d.max.is_finite()) || d.min > d.max) {
            return Err(EngineError::ScalerMismatch(format!("{} holds an invalid range", path.display())));
        }
        Ok(scaler)
    }
}

/// The feature scaler and the target scaler produced by one training run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalerState {
    pub features: MinMaxScaler,
    pub target: MinMaxScaler,
}

impl ScalerState {
    pub fn fit(
        features: &[[f64; FEATURE_COUNT]],
        targets: &[f64],
        policy: DegenerateRangePolicy,
    ) -> Result<Self> {
        if features.len() != targets.len() {
            return Err(EngineError::shape(features.len(), targets.len(), "feature rows vs target values"));
        }
        let target_rows: Vec<[f64; 1]> = targets.iter().map(|t| [*t]).collect();
        Ok(ScalerState {
            features: MinMaxScaler::fit(&FEATURE_COLUMNS, features, policy)?,
            target: MinMaxScaler::fit(&[TARGET_COLUMN], &target_rows, policy)?,
        })
    }

    /// Loads both scalers and checks their widths.
    pub fn load(feature_path: &Path, target_path: &Path) -> Result<Self> {
        let features = MinMaxScaler::load(feature_path)?;
        let target = MinMaxScaler::load(target_path)?;
        if target.width() != 1 {
            return Err(EngineError::ScalerMismatch(format!(
                "target scaler {} has {} dimensions, expected 1",
                target_path.display(),
                target.width()
            )));
        }
        Ok(ScalerState { features, target })
    }

    pub fn save(&self, feature_path: &Path, target_path: &Path) -> Result<()> {
        self.features.save(feature_path)?;
        self.target.save(target_path)
    }

    pub fn feature_min(&self) -> Vec<f64> {
        self.features.mins()
    }

    pub fn feature_max(&self) -> Vec<f64> {
        self.features.maxs()
    }

    pub fn target_min(&self) -> f64 {
        self.target.dimensions[0].min
    }

    pub fn target_max(&self) -> f64 {
        self.target.dimensions[0].max
    }

    pub fn scale_target(&self, value: f64) -> Result<f64> {
        Ok(self.target.transform(&[value])?[0])
    }

    pub fn unscale_target(&self, value: f64) -> Result<f64> {
        Ok(self.target.inverse_transform(&[value])?[0])
    }
}

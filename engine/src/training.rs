// Training orchestrator: chronological split, scaler fitting, mini-batch training with
// early stopping, held-out evaluation and artifact persistence.
use crate::config::{PathSettings, TrainingSettings};
use crate::error::{EngineError, Result};
use crate::model::{rows_to_input, save_model, tensor_to_values, values_to_target, PriceModel, Topology};
use crate::scaler::ScalerState;
use burn::module::AutodiffModule;
use burn::nn::loss::{MseLoss, Reduction};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::ElementConversion;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use shared::models::{IndicatorRecord, FEATURE_COUNT};
use shared::utils::{mean_absolute_error, mean_squared_error};

/// Row counts of the chronological partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SplitSizes {
    pub rows: usize,
    /// Training partition, i.e. fit + validation.
    pub train: usize,
    pub fit: usize,
    pub validation: usize,
    pub test: usize,
}

impl SplitSizes {
    pub fn new(rows: usize, settings: &TrainingSettings) -> Self {
        let train = ((rows as f64) * settings.train_fraction).floor() as usize;
        let fit = ((train as f64) * (1.0 - settings.validation_split)).floor() as usize;
        SplitSizes {
            rows,
            train,
            fit,
            validation: train - fit,
            test: rows - train,
        }
    }

    pub fn is_viable(&self) -> bool {
        self.fit > 0 && self.validation > 0 && self.test > 0
    }

    /// Smallest dataset size for which every partition is non-empty.
    pub fn minimum_rows(settings: &TrainingSettings) -> usize {
        (1..=1_000_000)
            .find(|n| SplitSizes::new(*n, settings).is_viable())
            .unwrap_or(usize::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub split: SplitSizes,
    pub epochs_run: usize,
    pub best_epoch: usize,
    pub best_validation_loss: f64,
    pub stopped_early: bool,
    /// Held-out errors in price units.
    pub test_mse: f64,
    pub test_mae: f64,
}

/// A finished training run. The model lives on the inner (non-autodiff) backend.
#[derive(Debug)]
pub struct TrainingOutcome<B: Backend> {
    pub model: PriceModel<B>,
    pub topology: Topology,
    pub scalers: ScalerState,
    pub report: TrainingReport,
}

impl<B: Backend> TrainingOutcome<B> {
    /// Writes the model and then both scalers, each file atomically.
    /// A failed model write leaves the previous scalers untouched.
    pub fn persist(&self, paths: &PathSettings) -> Result<()> {
        save_model(&self.model, &self.topology, &paths.model)?;
        self.scalers.save(&paths.feature_scaler, &paths.target_scaler)?;
        Ok(())
    }
}

pub struct Trainer<'a> {
    settings: &'a TrainingSettings,
    topology: Topology,
}

impl<'a> Trainer<'a> {
    pub fn new(settings: &'a TrainingSettings, topology: Topology) -> Result<Self> {
        topology.validate()?;
        if topology.input_width != FEATURE_COUNT {
            return Err(EngineError::shape(FEATURE_COUNT, topology.input_width, "topology input width"));
        }
        Ok(Trainer { settings, topology })
    }

    pub fn fit<B: AutodiffBackend>(
        &self,
        records: &[IndicatorRecord],
        device: &B::Device,
    ) -> Result<TrainingOutcome<B::InnerBackend>> {
        let settings = self.settings;
        let split = SplitSizes::new(records.len(), settings);
        if !split.is_viable() {
            return Err(EngineError::InsufficientData {
                rows: records.len(),
                required: SplitSizes::minimum_rows(settings),
                context: format!(
                    "train/validation/test partitions of {}/{}/{} rows",
                    split.fit, split.validation, split.test
                ),
            });
        }
        tracing::info!(
            rows = split.rows,
            fit = split.fit,
            validation = split.validation,
            test = split.test,
            "Partitioned dataset chronologically"
        );

        let (train, test) = records.split_at(split.train);
        let train_features: Vec<[f64; FEATURE_COUNT]> = train.iter().map(|r| r.features()).collect();
        let train_targets: Vec<f64> = train.iter().map(|r| r.close).collect();
        let scalers = ScalerState::fit(&train_features, &train_targets, settings.degenerate_policy)?;

        let x_train = scalers.features.transform_rows(&train_features)?;
        let y_train = train_targets
            .iter()
            .map(|t| scalers.scale_target(*t))
            .collect::<Result<Vec<f64>>>()?;
        let (x_fit, x_val) = x_train.split_at(split.fit);
        let (y_fit, y_val) = y_train.split_at(split.fit);

        B::seed(settings.seed);
        let mut rng = StdRng::seed_from_u64(settings.seed);
        let mut model = PriceModel::<B>::new(&self.topology, device)?;
        let mut optim = AdamConfig::new().init();
        let loss_fn = MseLoss::new();

        let val_input = rows_to_input::<B::InnerBackend, _>(x_val, FEATURE_COUNT, device)?;
        let val_target = values_to_target::<B::InnerBackend>(y_val, device);

        let mut order: Vec<usize> = (0..x_fit.len()).collect();
        let mut best: Option<(usize, f64, PriceModel<B::InnerBackend>)> = None;
        let mut since_best = 0;
        let mut epochs_run = 0;
        let mut stopped_early = false;

        for epoch in 1..=settings.epochs {
            epochs_run = epoch;
            order.shuffle(&mut rng);

            let mut epoch_loss = 0.0;
            for batch in order.chunks(settings.batch_size) {
                let rows: Vec<&[f64]> = batch.iter().map(|i| x_fit[*i].as_slice()).collect();
                let targets: Vec<f64> = batch.iter().map(|i| y_fit[*i]).collect();
                let input = rows_to_input::<B, _>(&rows, FEATURE_COUNT, device)?;
                let target = values_to_target::<B>(&targets, device);

                let output = model.forward(input);
                let loss = loss_fn.forward(output, target, Reduction::Mean);
                epoch_loss += loss.clone().into_scalar().elem::<f64>() * batch.len() as f64;

                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optim.step(settings.learning_rate, model, grads);
            }
            let train_loss = epoch_loss / x_fit.len() as f64;

            let candidate = model.valid();
            let val_loss = loss_fn
                .forward(candidate.forward(val_input.clone()), val_target.clone(), Reduction::Mean)
                .into_scalar()
                .elem::<f64>();
            tracing::info!(epoch, train_loss, val_loss, "Epoch complete");

            let improved = match &best {
                Some((_, best_loss, _)) => val_loss < *best_loss,
                None => val_loss.is_finite(),
            };
            if improved {
                tracing::debug!(epoch, val_loss, "Validation loss improved");
                best = Some((epoch, val_loss, candidate));
                since_best = 0;
            } else {
                since_best += 1;
                if since_best >= settings.patience {
                    tracing::info!(epoch, patience = settings.patience, "Early stopping");
                    stopped_early = true;
                    break;
                }
            }
        }

        let (best_epoch, best_validation_loss, model) = match best {
            Some(best) => best,
            None => (epochs_run, f64::NAN, model.valid()),
        };

        let (test_mse, test_mae) = evaluate(&model, &scalers, test, device)?;
        let report = TrainingReport {
            split,
            epochs_run,
            best_epoch,
            best_validation_loss,
            stopped_early,
            test_mse,
            test_mae,
        };
        tracing::info!(
            epochs_run,
            best_epoch,
            best_validation_loss,
            test_mse,
            test_mae,
            "Training complete"
        );

        Ok(TrainingOutcome {
            model,
            topology: self.topology.clone(),
            scalers,
            report,
        })
    }
}

/// MSE and MAE of the model on `rows`, in price units.
fn evaluate<B: Backend>(
    model: &PriceModel<B>,
    scalers: &ScalerState,
    rows: &[IndicatorRecord],
    device: &B::Device,
) -> Result<(f64, f64)> {
    let features: Vec<[f64; FEATURE_COUNT]> = rows.iter().map(|r| r.features()).collect();
    let scaled = scalers.features.transform_rows(&features)?;
    let input = rows_to_input::<B, _>(&scaled, FEATURE_COUNT, device)?;
    let predicted = tensor_to_values(model.forward(input))?
        .into_iter()
        .map(|v| scalers.unscale_target(v))
        .collect::<Result<Vec<f64>>>()?;
    let actual: Vec<f64> = rows.iter().map(|r| r.close).collect();

    let empty = || EngineError::EmptyInput("no rows to evaluate".into());
    let mse = mean_squared_error(&actual, &predicted).ok_or_else(empty)?;
    let mae = mean_absolute_error(&actual, &predicted).ok_or_else(empty)?;
    Ok((mse, mae))
}

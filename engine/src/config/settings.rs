// Pipeline settings, loaded from a TOML file or taken from defaults.
use crate::error::{EngineError, Result};
use crate::scaler::DegenerateRangePolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    pub paths: PathSettings,
    pub indicators: IndicatorSettings,
    pub training: TrainingSettings,
    pub inference: InferenceSettings,
    pub report: ReportSettings,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PathSettings {
    pub raw_data: PathBuf,
    pub processed_data: PathBuf,
    pub predictions: PathBuf,
    pub model: PathBuf,
    pub feature_scaler: PathBuf,
    pub target_scaler: PathBuf,
    pub report: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        PathSettings {
            raw_data: PathBuf::from("data/btc_data.csv"),
            processed_data: PathBuf::from("data/processed_data.csv"),
            predictions: PathBuf::from("data/predictions.csv"),
            model: PathBuf::from("artifacts/price_model.bin"),
            feature_scaler: PathBuf::from("artifacts/feature_scaler.json"),
            target_scaler: PathBuf::from("artifacts/target_scaler.json"),
            report: PathBuf::from("data/forecast_report.json"),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct IndicatorSettings {
    pub ma_short: usize,
    pub ma_long: usize,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        IndicatorSettings {
            ma_short: 7,
            ma_long: 30,
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TrainingSettings {
    /// Share of the dataset (chronologically first) used for training.
    pub train_fraction: f64,
    /// Share of the training partition (chronologically last) held for validation.
    pub validation_split: f64,
    pub epochs: usize,
    pub batch_size: usize,
    pub patience: usize,
    pub learning_rate: f64,
    pub seed: u64,
    pub degenerate_policy: DegenerateRangePolicy,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        TrainingSettings {
            train_fraction: 0.8,
            validation_split: 0.2,
            epochs: 200,
            batch_size: 32,
            patience: 10,
            learning_rate: 1e-3,
            seed: 42,
            degenerate_policy: DegenerateRangePolicy::Reject,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct InferenceSettings {
    pub chunk_size: usize,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        InferenceSettings { chunk_size: 1000 }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ReportSettings {
    /// Number of most recent predictions listed in the report.
    pub horizon: usize,
}

impl Default for ReportSettings {
    fn default() -> Self {
        ReportSettings { horizon: 10 }
    }
}

impl PipelineSettings {
    /// Load settings from a TOML file. Keys that are absent keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(EngineError::MissingFile { path: path.to_path_buf() });
        }
        let content = std::fs::read_to_string(path)?;
        let settings: PipelineSettings = toml::from_str(&content)
            .map_err(|e| EngineError::ConfigError(format!("{}: {}", path.display(), e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let ind = &self.indicators;
        for (name, period) in [
            ("ma_short", ind.ma_short),
            ("ma_long", ind.ma_long),
            ("rsi_period", ind.rsi_period),
            ("macd_fast", ind.macd_fast),
            ("macd_slow", ind.macd_slow),
        ] {
            if period == 0 {
                return Err(EngineError::ConfigError(format!("indicators.{} must be greater than 0", name)));
            }
        }
        if ind.macd_fast >= ind.macd_slow {
            return Err(EngineError::ConfigError(format!(
                "indicators.macd_fast ({}) must be shorter than indicators.macd_slow ({})",
                ind.macd_fast, ind.macd_slow
            )));
        }

        let tr = &self.training;
        if !(tr.train_fraction > 0.0 && tr.train_fraction < 1.0) {
            return Err(EngineError::ConfigError(format!(
                "training.train_fraction must be in (0, 1), got {}",
                tr.train_fraction
            )));
        }
        if !(tr.validation_split > 0.0 && tr.validation_split < 1.0) {
            return Err(EngineError::ConfigError(format!(
                "training.validation_split must be in (0, 1), got {}",
                tr.validation_split
            )));
        }
        if tr.epochs == 0 {
            return Err(EngineError::ConfigError("training.epochs must be greater than 0".into()));
        }
        if tr.batch_size == 0 {
            return Err(EngineError::ConfigError("training.batch_size must be greater than 0".into()));
        }
        if !(tr.learning_rate > 0.0) {
            return Err(EngineError::ConfigError(format!(
                "training.learning_rate must be positive, got {}",
                tr.learning_rate
            )));
        }

        if self.inference.chunk_size == 0 {
            return Err(EngineError::ConfigError("inference.chunk_size must be greater than 0".into()));
        }
        if self.report.horizon == 0 {
            return Err(EngineError::ConfigError("report.horizon must be greater than 0".into()));
        }
        Ok(())
    }

    /// Re-root every relative path under `base`. Used by the CLI `--workdir` flag.
    pub fn rebase(&mut self, base: &Path) {
        let p = &mut self.paths;
        for path in [
            &mut p.raw_data,
            &mut p.processed_data,
            &mut p.predictions,
            &mut p.model,
            &mut p.feature_scaler,
            &mut p.target_scaler,
            &mut p.report,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let settings = PipelineSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.training.epochs, 200);
        assert_eq!(settings.training.batch_size, 32);
        assert_eq!(settings.training.patience, 10);
        assert_eq!(settings.inference.chunk_size, 1000);
        assert_eq!(settings.indicators.ma_long, 30);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[training]\nepochs = 5\ndegenerate_policy = \"identity\"\n\n[inference]\nchunk_size = 64"
        )
        .unwrap();

        let settings = PipelineSettings::from_file(file.path()).unwrap();
        assert_eq!(settings.training.epochs, 5);
        assert_eq!(settings.training.batch_size, 32);
        assert_eq!(settings.training.degenerate_policy, DegenerateRangePolicy::Identity);
        assert_eq!(settings.inference.chunk_size, 64);
        assert_eq!(settings.paths, PathSettings::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut settings = PipelineSettings::default();
        settings.inference.chunk_size = 0;
        assert!(matches!(settings.validate(), Err(EngineError::ConfigError(_))));

        let mut settings = PipelineSettings::default();
        settings.training.train_fraction = 1.0;
        assert!(settings.validate().is_err());

        let mut settings = PipelineSettings::default();
        settings.indicators.macd_fast = 26;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let err = PipelineSettings::from_file("does/not/exist.toml").unwrap_err();
        assert!(matches!(err, EngineError::MissingFile { .. }));
    }

    #[test]
    fn test_rebase_only_touches_relative_paths() {
        let mut settings = PipelineSettings::default();
        settings.paths.report = PathBuf::from("/abs/report.json");
        settings.rebase(Path::new("/work"));
        assert_eq!(settings.paths.model, PathBuf::from("/work/artifacts/price_model.bin"));
        assert_eq!(settings.paths.report, PathBuf::from("/abs/report.json"));
    }
}

// Forecast summary derived from a predictions dataset.
use crate::error::{EngineError, Result};
use crate::store;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use shared::models::PredictionRecord;
use shared::utils::{mean_absolute_error, mean_squared_error, round_to};
use std::path::Path;

const BUY_ADVICE: &str = "Buy: Prices are predicted to rise.";
const SELL_ADVICE: &str = "Sell: Prices are predicted to fall.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Upward,
    Downward,
}

impl Trend {
    pub fn advice(&self) -> &'static str {
        match self {
            Trend::Upward => BUY_ADVICE,
            Trend::Downward => SELL_ADVICE,
        }
    }

    fn target_multiplier(&self) -> f64 {
        match self {
            Trend::Upward => 1.10,
            Trend::Downward => 0.90,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedPrice {
    pub date: NaiveDate,
    pub predicted_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPrice {
    pub date: NaiveDate,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastReport {
    pub current_price: f64,
    pub predictions: Vec<PredictedPrice>,
    pub advice: String,
    pub absolute_mean: f64,
    pub mae: f64,
    pub mse: f64,
    pub predicted_trend: Trend,
    pub target_price: f64,
    pub historical_prices: Vec<HistoricalPrice>,
}

impl ForecastReport {
    /// Builds the report from merged predictions.
    ///
    /// `current_price` defaults to the last close in `records`. Only the most recent
    /// `horizon` predictions are listed; the error metrics use every predicted row.
    pub fn build(records: &[PredictionRecord], horizon: usize, current_price: Option<f64>) -> Result<Self> {
        if horizon == 0 {
            return Err(EngineError::ConfigError("report horizon must be greater than 0".into()));
        }
        let predicted: Vec<(&PredictionRecord, f64)> = records
            .iter()
            .filter_map(|r| r.predicted_close.map(|p| (r, p)))
            .collect();
        if predicted.is_empty() {
            return Err(EngineError::EmptyInput("predictions dataset has no predicted rows".into()));
        }

        let current_price = match current_price {
            Some(price) => price,
            // predicted is non-empty, so records is too
            None => records.last().map(|r| r.close).unwrap_or_default(),
        };

        let recent = &predicted[predicted.len().saturating_sub(horizon)..];
        let predictions: Vec<PredictedPrice> = recent
            .iter()
            .map(|(r, p)| PredictedPrice { date: r.date, predicted_price: *p })
            .collect();

        let first = predictions[0].predicted_price;
        let last = predictions[predictions.len() - 1].predicted_price;
        let trend = if first > current_price { Trend::Upward } else { Trend::Downward };
        let target_price = round_to(last * trend.target_multiplier(), 2);
        let absolute_mean =
            predictions.iter().map(|p| p.predicted_price.abs()).sum::<f64>() / predictions.len() as f64;

        let actual: Vec<f64> = predicted.iter().map(|(r, _)| r.close).collect();
        let forecast: Vec<f64> = predicted.iter().map(|(_, p)| *p).collect();
        let empty = || EngineError::EmptyInput("no predicted rows to score".into());
        let mae = mean_absolute_error(&forecast, &actual).ok_or_else(empty)?;
        let mse = mean_squared_error(&forecast, &actual).ok_or_else(empty)?;

        let historical_prices = records
            .iter()
            .map(|r| HistoricalPrice { date: r.date, price: r.close })
            .collect();

        tracing::info!(
            current_price,
            target_price,
            trend = ?trend,
            predictions = predictions.len(),
            "Built forecast report"
        );

        Ok(ForecastReport {
            current_price,
            predictions,
            advice: trend.advice().to_string(),
            absolute_mean,
            mae,
            mse,
            predicted_trend: trend,
            target_price,
            historical_prices,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        store::write_json(path, self)?;
        tracing::info!(path = %path.display(), "Saved forecast report");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn rows(closes: &[f64], predictions: &[Option<f64>]) -> Vec<PredictionRecord> {
        let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        closes
            .iter()
            .zip(predictions)
            .enumerate()
            .map(|(i, (close, predicted))| PredictionRecord {
                date: start + Duration::days(i as i64),
                close: *close,
                ma_7: *close,
                ma_30: *close,
                rsi: 50.0,
                macd: 0.0,
                predicted_close: *predicted,
            })
            .collect()
    }

    #[test]
    fn test_upward_report() {
        let records = rows(&[10.0, 11.0, 12.0, 13.0], &[None, Some(14.0), Some(15.0), Some(16.0)]);
        let report = ForecastReport::build(&records, 10, None).unwrap();

        assert_eq!(report.current_price, 13.0);
        assert_eq!(report.predictions.len(), 3);
        assert_eq!(report.predicted_trend, Trend::Upward);
        assert_eq!(report.advice, "Buy: Prices are predicted to rise.");
        assert_eq!(report.target_price, 17.6);
        assert!((report.absolute_mean - 15.0).abs() < 1e-12);
        // errors against closes 11, 12, 13
        assert!((report.mae - 3.0).abs() < 1e-12);
        assert!((report.mse - 9.0).abs() < 1e-12);
        assert_eq!(report.historical_prices.len(), 4);
        assert_eq!(report.historical_prices[0].price, 10.0);
    }

    #[test]
    fn test_equal_first_prediction_is_downward() {
        let records = rows(&[10.0, 20.0], &[Some(20.0), Some(30.0)]);
        let report = ForecastReport::build(&records, 10, None).unwrap();
        assert_eq!(report.predicted_trend, Trend::Downward);
        assert_eq!(report.advice, "Sell: Prices are predicted to fall.");
        assert_eq!(report.target_price, 27.0);
    }

    #[test]
    fn test_horizon_limits_listed_predictions() {
        let closes: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        let preds: Vec<Option<f64>> = closes.iter().map(|c| Some(c + 1.0)).collect();
        let report = ForecastReport::build(&rows(&closes, &preds), 10, Some(50.0)).unwrap();

        assert_eq!(report.predictions.len(), 10);
        assert_eq!(report.predictions[0].predicted_price, 106.0);
        assert_eq!(report.current_price, 50.0);
        // metrics still cover all 15 predicted rows
        assert!((report.mae - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_predictions_is_empty_input() {
        let records = rows(&[1.0, 2.0], &[None, None]);
        let err = ForecastReport::build(&records, 10, None).unwrap_err();
        assert!(matches!(err, EngineError::EmptyInput(_)));
    }

    #[test]
    fn test_report_json_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = ForecastReport::build(&rows(&[1.0, 2.0], &[None, Some(1.5)]), 10, None).unwrap();
        report.save(&path).unwrap();

        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["predicted_trend"], "downward");
        assert_eq!(json["predictions"][0]["date"], "2024-05-02");
        assert_eq!(json["predictions"][0]["predicted_price"], 1.5);
        assert_eq!(json["target_price"], 1.35);
        assert_eq!(json["historical_prices"].as_array().unwrap().len(), 2);
    }
}

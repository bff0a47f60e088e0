use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Feature columns fed to the scaler and the model, in model input order.
pub const FEATURE_COLUMNS: [&str; 4] = ["MA_7", "MA_30", "RSI", "MACD"];

/// Width of the feature vector. Scaler, training and inference must agree on it.
pub const FEATURE_COUNT: usize = FEATURE_COLUMNS.len();

/// Column the model learns to predict.
pub const TARGET_COLUMN: &str = "Close";

/// Column holding the calendar date in every tabular file.
pub const DATE_COLUMN: &str = "Date";

/// Column appended by inference.
pub const PREDICTION_COLUMN: &str = "predicted_close";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// One row of the processed dataset. Field names match the CSV headers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRecord {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "MA_7")]
    pub ma_7: f64,
    #[serde(rename = "MA_30")]
    pub ma_30: f64,
    #[serde(rename = "RSI")]
    pub rsi: f64,
    #[serde(rename = "MACD")]
    pub macd: f64,
}

impl IndicatorRecord {
    /// Feature vector in `FEATURE_COLUMNS` order.
    pub fn features(&self) -> [f64; FEATURE_COUNT] {
        [self.ma_7, self.ma_30, self.rsi, self.macd]
    }
}

/// A processed row plus the model's forecast, if one was produced for it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "MA_7")]
    pub ma_7: f64,
    #[serde(rename = "MA_30")]
    pub ma_30: f64,
    #[serde(rename = "RSI")]
    pub rsi: f64,
    #[serde(rename = "MACD")]
    pub macd: f64,
    pub predicted_close: Option<f64>,
}

impl PredictionRecord {
    pub fn from_indicator(record: &IndicatorRecord, predicted_close: Option<f64>) -> Self {
        PredictionRecord {
            date: record.date,
            close: record.close,
            ma_7: record.ma_7,
            ma_30: record.ma_30,
            rsi: record.rsi,
            macd: record.macd,
            predicted_close,
        }
    }

    pub fn indicator(&self) -> IndicatorRecord {
        IndicatorRecord {
            date: self.date,
            close: self.close,
            ma_7: self.ma_7,
            ma_30: self.ma_30,
            rsi: self.rsi,
            macd: self.macd,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> IndicatorRecord {
        IndicatorRecord {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            close: 101.5,
            ma_7: 100.0,
            ma_30: 98.0,
            rsi: 55.0,
            macd: 1.25,
        }
    }

    #[test]
    fn test_features_follow_column_order() {
        assert_eq!(record().features(), [100.0, 98.0, 55.0, 1.25]);
        assert_eq!(FEATURE_COUNT, 4);
    }

    #[test]
    fn test_prediction_record_keeps_indicator_fields() {
        let rec = record();
        let pred = PredictionRecord::from_indicator(&rec, Some(102.0));
        assert_eq!(pred.indicator(), rec);
        assert_eq!(pred.predicted_close, Some(102.0));
    }
}

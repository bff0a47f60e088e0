// Reading and writing the processed dataset and the predictions dataset.
use crate::error::{EngineError, Result};
use crate::store::atomic_write;
use csv::{ReaderBuilder, Trim, WriterBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared::models::{
    IndicatorRecord, PredictionRecord, DATE_COLUMN, FEATURE_COLUMNS, PREDICTION_COLUMN, TARGET_COLUMN,
};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

fn required_columns() -> Vec<&'static str> {
    let mut columns = vec![DATE_COLUMN, TARGET_COLUMN];
    columns.extend(FEATURE_COLUMNS);
    columns
}

fn read_rows<T: DeserializeOwned>(path: &Path, required: &[&str]) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(EngineError::MissingFile { path: path.to_path_buf() });
    }
    let file = File::open(path)?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::Headers)
        .from_reader(BufReader::new(file));

    let headers = rdr.headers()?.clone();
    for column in required {
        if !headers.iter().any(|h| h == *column) {
            return Err(EngineError::missing_column(*column));
        }
    }

    let mut rows = Vec::new();
    for (idx, result) in rdr.deserialize::<T>().enumerate() {
        let row = result.map_err(|e| {
            EngineError::CsvDataFormatError(format!("{} line {}: {}", path.display(), idx + 2, e))
        })?;
        rows.push(row);
    }
    Ok(rows)
}

fn check_ordering<I: Iterator<Item = chrono::NaiveDate>>(path: &Path, dates: I) -> Result<()> {
    let mut previous = None;
    for (idx, date) in dates.enumerate() {
        if let Some(prev) = previous {
            if date <= prev {
                return Err(EngineError::CsvDataFormatError(format!(
                    "{} line {}: date {} does not follow {} (dates must be strictly increasing)",
                    path.display(),
                    idx + 2,
                    date,
                    prev
                )));
            }
        }
        previous = Some(date);
    }
    Ok(())
}

/// Rejects rows carrying non-finite values or an RSI outside [0, 100].
fn check_values(path: &Path, idx: usize, record: &IndicatorRecord, predicted: Option<f64>) -> Result<()> {
    let fields = [
        (TARGET_COLUMN, record.close),
        (FEATURE_COLUMNS[0], record.ma_7),
        (FEATURE_COLUMNS[1], record.ma_30),
        (FEATURE_COLUMNS[2], record.rsi),
        (FEATURE_COLUMNS[3], record.macd),
    ];
    let bad = |column: &str, value: f64, why: &str| {
        EngineError::CsvDataFormatError(format!(
            "{} line {}: column '{}' value {} {}",
            path.display(),
            idx + 2,
            column,
            value,
            why
        ))
    };
    for (column, value) in fields {
        if !value.is_finite() {
            return Err(bad(column, value, "is not a finite number"));
        }
    }
    if !(0.0..=100.0).contains(&record.rsi) {
        return Err(bad(FEATURE_COLUMNS[2], record.rsi, "is outside [0, 100]"));
    }
    if let Some(value) = predicted.filter(|v| !v.is_finite()) {
        return Err(bad(PREDICTION_COLUMN, value, "is not a finite number"));
    }
    Ok(())
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = WriterBuilder::new().has_headers(true).from_writer(Vec::new());
    for row in rows {
        wtr.serialize(row)?;
    }
    let bytes = wtr.into_inner().map_err(|e| EngineError::from(e.into_error()))?;
    atomic_write(path, &bytes)
}

/// Loads a processed dataset, checking required columns and date ordering.
pub fn load_processed(path: &Path) -> Result<Vec<IndicatorRecord>> {
    let records: Vec<IndicatorRecord> = read_rows(path, &required_columns())?;
    check_ordering(path, records.iter().map(|r| r.date))?;
    for (idx, record) in records.iter().enumerate() {
        check_values(path, idx, record, None)?;
    }
    tracing::info!(path = %path.display(), rows = records.len(), "Loaded processed dataset");
    Ok(records)
}

pub fn write_processed(path: &Path, records: &[IndicatorRecord]) -> Result<()> {
    write_rows(path, records)?;
    tracing::info!(path = %path.display(), rows = records.len(), "Saved processed dataset");
    Ok(())
}

pub fn load_predictions(path: &Path) -> Result<Vec<PredictionRecord>> {
    let mut required = required_columns();
    required.push(PREDICTION_COLUMN);
    let records: Vec<PredictionRecord> = read_rows(path, &required)?;
    check_ordering(path, records.iter().map(|r| r.date))?;
    for (idx, record) in records.iter().enumerate() {
        check_values(path, idx, &record.indicator(), record.predicted_close)?;
    }
    tracing::info!(path = %path.display(), rows = records.len(), "Loaded predictions dataset");
    Ok(records)
}

pub fn write_predictions(path: &Path, records: &[PredictionRecord]) -> Result<()> {
    write_rows(path, records)?;
    tracing::info!(path = %path.display(), rows = records.len(), "Saved predictions dataset");
    Ok(())
}

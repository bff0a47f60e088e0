// Turns a raw price table into the processed indicator dataset.
use super::{IndicatorCalculator, Macd, Rsi, Sma};
use crate::config::IndicatorSettings;
use crate::data::csv_parser::{price_format, RawTable};
use crate::error::{EngineError, Result};
use shared::models::{IndicatorRecord, PricePoint, DATE_COLUMN, TARGET_COLUMN};

pub struct IndicatorEngine {
    ma_short: Box<dyn IndicatorCalculator>,
    ma_long: Box<dyn IndicatorCalculator>,
    rsi: Box<dyn IndicatorCalculator>,
    macd: Box<dyn IndicatorCalculator>,
}

impl IndicatorEngine {
    pub fn new(settings: &IndicatorSettings) -> Self {
        Self::with_calculators(
            Box::new(Sma::new(settings.ma_short)),
            Box::new(Sma::new(settings.ma_long)),
            Box::new(Rsi::new(settings.rsi_period)),
            Box::new(Macd::new(settings.macd_fast, settings.macd_slow)),
        )
    }

    pub fn with_calculators(
        ma_short: Box<dyn IndicatorCalculator>,
        ma_long: Box<dyn IndicatorCalculator>,
        rsi: Box<dyn IndicatorCalculator>,
        macd: Box<dyn IndicatorCalculator>,
    ) -> Self {
        IndicatorEngine { ma_short, ma_long, rsi, macd }
    }

    /// Validates and parses the raw table into a date-sorted, de-duplicated price series.
    pub fn price_series(table: &RawTable) -> Result<Vec<PricePoint>> {
        let date_idx = table.require_column(DATE_COLUMN)?;
        let close_idx = table.require_column(TARGET_COLUMN)?;

        let mut invalid_rows = Vec::new();
        let mut points = Vec::with_capacity(table.len());
        for (idx, row) in table.rows.iter().enumerate() {
            let raw_date = row.get(date_idx).map(String::as_str).unwrap_or("");
            match price_format::parse_date(raw_date) {
                Ok(date) => points.push((date, row.get(close_idx).map(String::as_str).unwrap_or(""))),
                Err(_) => invalid_rows.push(idx + 1),
            }
        }
        if !invalid_rows.is_empty() {
            tracing::error!(count = invalid_rows.len(), "Invalid dates in raw price table");
            return Err(EngineError::InvalidDate {
                column: DATE_COLUMN.to_string(),
                count: invalid_rows.len(),
                rows: invalid_rows,
            });
        }

        let mut series = Vec::with_capacity(points.len());
        for (idx, (date, raw_close)) in points.into_iter().enumerate() {
            let close = price_format::parse_price(raw_close).map_err(|e| {
                EngineError::CsvDataFormatError(format!("row {}: column '{}': {}", idx + 1, TARGET_COLUMN, e))
            })?;
            series.push(PricePoint { date, close });
        }

        // Vec::sort_by_key is stable, so equal dates keep file order
        series.sort_by_key(|p| p.date);
        let before = series.len();
        series.dedup_by_key(|p| p.date);
        let dropped = before - series.len();
        if dropped > 0 {
            tracing::warn!(dropped, "Dropped rows with duplicate dates, keeping the first occurrence");
        }
        Ok(series)
    }

    /// Computes indicators for a raw table and drops rows with any undefined indicator.
    pub fn process(&self, table: &RawTable) -> Result<Vec<IndicatorRecord>> {
        let series = Self::price_series(table)?;
        let records = self.compute(&series);
        tracing::info!(
            input_rows = series.len(),
            retained_rows = records.len(),
            "Indicator computation complete"
        );
        Ok(records)
    }

    /// Computes indicators over an already sorted, de-duplicated series.
    pub fn compute(&self, series: &[PricePoint]) -> Vec<IndicatorRecord> {
        let closes: Vec<f64> = series.iter().map(|p| p.close).collect();

        let mut columns = Vec::with_capacity(4);
        for calculator in [&self.ma_short, &self.ma_long, &self.rsi, &self.macd] {
            tracing::debug!(indicator = calculator.name(), params = %calculator.parameters(), "Computing indicator");
            let values = calculator.calculate(&closes);
            debug_assert_eq!(values.len(), closes.len());
            columns.push(values);
        }

        series
            .iter()
            .enumerate()
            .filter_map(|(i, point)| {
                let value = |col: usize| columns[col].get(i).copied().flatten();
                Some(IndicatorRecord {
                    date: point.date,
                    close: point.close,
                    ma_7: value(0)?,
                    ma_30: value(1)?,
                    rsi: value(2)?,
                    macd: value(3)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct SpyCalculator {
        calls: Arc<AtomicUsize>,
    }

    impl IndicatorCalculator for SpyCalculator {
        fn name(&self) -> &str {
            "spy"
        }

        fn parameters(&self) -> Value {
            Value::Null
        }

        fn calculate(&self, closes: &[f64]) -> Vec<Option<f64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            vec![Some(0.0); closes.len()]
        }
    }

    fn spy_engine(calls: &Arc<AtomicUsize>) -> IndicatorEngine {
        let spy = || Box::new(SpyCalculator { calls: calls.clone() }) as Box<dyn IndicatorCalculator>;
        IndicatorEngine::with_calculators(spy(), spy(), spy(), spy())
    }

    fn table(headers: &[&str], rows: Vec<Vec<String>>) -> RawTable {
        RawTable::new(headers.iter().map(|h| h.to_string()).collect(), rows)
    }

    fn daily_table(closes: &[f64]) -> RawTable {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let rows = closes
            .iter()
            .enumerate()
            .map(|(i, c)| vec![(start + Duration::days(i as i64)).to_string(), c.to_string()])
            .collect();
        table(&["Date", "Close"], rows)
    }

    fn default_engine() -> IndicatorEngine {
        IndicatorEngine::new(&IndicatorSettings::default())
    }

    #[test]
    fn test_flat_prices_scenario() {
        let records = default_engine().process(&daily_table(&[100.0; 35])).unwrap();

        assert_eq!(records.len(), 6);
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 1, 30).unwrap());
        for r in &records {
            assert!((r.ma_7 - 100.0).abs() < 1e-9);
            assert!((r.ma_30 - 100.0).abs() < 1e-9);
            assert_eq!(r.rsi, 100.0);
            assert!(r.macd.abs() < 1e-9);
        }
    }

    #[test]
    fn test_output_sorted_unique_and_bounded() {
        // Shuffled, oscillating series with a duplicate date
        let start = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
        let mut rows: Vec<Vec<String>> = (0..80)
            .map(|i| {
                let close = 100.0 + 10.0 * ((i as f64) * 0.7).sin() + (i % 3) as f64;
                vec![(start + Duration::days(i * 2)).to_string(), format!("{:.2}", close)]
            })
            .collect();
        rows.reverse();
        rows.push(vec![start.to_string(), "1.0".into()]);

        let records = default_engine().process(&table(&["Date", "Close"], rows)).unwrap();
        assert_eq!(records.len(), 80 - 29);
        for pair in records.windows(2) {
            assert!(pair[0].date < pair[1].date);
        }
        for r in &records {
            assert!((0.0..=100.0).contains(&r.rsi), "RSI out of range: {}", r.rsi);
            assert!(r.ma_7.is_finite() && r.ma_30.is_finite() && r.macd.is_finite());
        }
    }

    #[test]
    fn test_duplicate_dates_keep_first_occurrence() {
        let rows = vec![
            vec!["2024-01-02".into(), "20".into()],
            vec!["2024-01-01".into(), "10".into()],
            vec!["2024-01-02".into(), "99".into()],
        ];
        let series = IndicatorEngine::price_series(&table(&["Date", "Close"], rows)).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].close, 10.0);
        assert_eq!(series[1].close, 20.0);
    }

    #[test]
    fn test_headers_with_whitespace_and_extra_columns() {
        let rows = vec![vec!["x".into(), "2024-01-01".into(), "5".into()]];
        let series = IndicatorEngine::price_series(&table(&["Open", "  Date", "Close  "], rows)).unwrap();
        assert_eq!(series[0].close, 5.0);
    }

    #[test]
    fn test_missing_close_fails_before_any_computation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = spy_engine(&calls);
        let rows = vec![vec!["2024-01-01".into(), "1".into()]];

        let err = engine.process(&table(&["Date", "Open"], rows)).unwrap_err();
        assert!(matches!(err, EngineError::MissingColumn { ref column } if column == "Close"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_date_column() {
        let err = default_engine().process(&table(&["Close"], vec![])).unwrap_err();
        assert!(matches!(err, EngineError::MissingColumn { column } if column == "Date"));
    }

    #[test]
    fn test_invalid_dates_are_counted() {
        let calls = Arc::new(AtomicUsize::new(0));
        let rows = vec![
            vec!["2024-01-01".into(), "1".into()],
            vec!["garbage".into(), "2".into()],
            vec!["2024-01-03".into(), "3".into()],
            vec!["".into(), "4".into()],
        ];
        let err = spy_engine(&calls).process(&table(&["Date", "Close"], rows)).unwrap_err();
        match err {
            EngineError::InvalidDate { count, rows, .. } => {
                assert_eq!(count, 2);
                assert_eq!(rows, vec![2, 4]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalid_close_is_rejected() {
        let rows = vec![vec!["2024-01-01".into(), "n/a".into()]];
        let err = default_engine().process(&table(&["Date", "Close"], rows)).unwrap_err();
        assert!(matches!(err, EngineError::CsvDataFormatError(msg) if msg.contains("row 1")));
    }

    #[test]
    fn test_short_series_yields_empty_dataset() {
        let records = default_engine().process(&daily_table(&[1.0; 29])).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_spy_sees_sorted_closes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let rows = vec![
            vec!["2024-01-02".into(), "2".into()],
            vec!["2024-01-01".into(), "1".into()],
        ];
        let records = spy_engine(&calls).process(&table(&["Date", "Close"], rows)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].close, 1.0);
    }
}

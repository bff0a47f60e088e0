use crate::error::{EngineError, Result};
use csv::ReaderBuilder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

// Parsing of the loosely formatted fields found in exported price files
pub mod price_format {
    use anyhow::{anyhow, Result};
    use chrono::{DateTime, NaiveDate, NaiveDateTime};
    use std::str::FromStr;

    const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
    const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

    /// Parses a calendar date. Timestamps are accepted and truncated to their date.
    pub fn parse_date(s: &str) -> Result<NaiveDate> {
        let s = s.trim();
        for fmt in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
                return Ok(date);
            }
        }
        for fmt in DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Ok(dt.date());
            }
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.date_naive());
        }
        Err(anyhow!("Failed to parse date '{}'", s))
    }

    /// Parses a price such as "43,210.50" or " 101.2 ". Must be finite and non-negative.
    pub fn parse_price(s: &str) -> Result<f64> {
        let normalized = s.trim().replace(',', ""); // thousands separators
        let value = f64::from_str(&normalized).map_err(|e| anyhow!("Failed to parse price '{}': {}", s, e))?;
        if !value.is_finite() || value < 0.0 {
            return Err(anyhow!("Price '{}' is not a finite non-negative number", s));
        }
        Ok(value)
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use chrono::Datelike;

        #[test]
        fn test_parse_date_formats() {
            let expected = NaiveDate::from_ymd_opt(2024, 12, 30).unwrap();
            assert_eq!(parse_date("2024-12-30").unwrap(), expected);
            assert_eq!(parse_date("2024/12/30").unwrap(), expected);
            assert_eq!(parse_date("12/30/2024").unwrap(), expected);
            assert_eq!(parse_date(" 2024-12-30 18:20:00 ").unwrap(), expected);
            assert_eq!(parse_date("2024-12-30T18:20:00+02:00").unwrap().day(), 30);
        }

        #[test]
        fn test_parse_date_invalid() {
            assert!(parse_date("32/12/2024").is_err());
            assert!(parse_date("not a date").is_err());
            assert!(parse_date("").is_err());
        }

        #[test]
        fn test_parse_price() {
            assert_eq!(parse_price("123.45").unwrap(), 123.45);
            assert_eq!(parse_price(" 43,210.50 ").unwrap(), 43210.5);
            assert_eq!(parse_price("0").unwrap(), 0.0);
        }

        #[test]
        fn test_parse_price_invalid() {
            assert!(parse_price("abc").is_err());
            assert!(parse_price("-1.0").is_err());
            assert!(parse_price("NaN").is_err());
            assert!(parse_price("").is_err());
        }
    }
}

/// A tabular price file as read from disk: raw header names and string cells.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        RawTable { headers, rows }
    }

    /// Position of the column whose header equals `name` once surrounding whitespace is stripped.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header.trim() == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| EngineError::missing_column(name))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub struct PriceCsvParser;

impl PriceCsvParser {
    pub fn load_raw_table<P: AsRef<Path>>(path: P) -> Result<RawTable> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(EngineError::MissingFile { path: path.to_path_buf() });
        }
        let file = File::open(path)?;
        let table = Self::read_raw_table(BufReader::new(file))?;
        tracing::info!(path = %path.display(), rows = table.len(), columns = ?table.headers, "Loaded raw price table");
        Ok(table)
    }

    pub fn read_raw_table<R: Read>(reader: R) -> Result<RawTable> {
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for (idx, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| {
                EngineError::CsvDataFormatError(format!("Error reading CSV record at line {}: {}", idx + 2, e))
            })?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(RawTable::new(headers, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_load_raw_table_keeps_raw_headers() {
        let csv_content = "\
 Date ,Open, Close
2024-01-02,10,11
2024-01-01,9,10";
        let tmp_file = create_test_csv(csv_content);
        let table = PriceCsvParser::load_raw_table(tmp_file.path()).unwrap();

        assert_eq!(table.headers, vec![" Date ", "Open", " Close"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0], vec!["2024-01-02", "10", "11"]);
        assert_eq!(table.column_index("Date"), Some(0));
        assert_eq!(table.column_index("Close"), Some(2));
        assert_eq!(table.column_index("Volume"), None);
    }

    #[test]
    fn test_load_raw_table_header_only() {
        let tmp_file = create_test_csv("Date,Close");
        let table = PriceCsvParser::load_raw_table(tmp_file.path()).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_load_raw_table_missing_file() {
        let err = PriceCsvParser::load_raw_table("no/such/file.csv").unwrap_err();
        assert!(matches!(err, EngineError::MissingFile { .. }));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let csv_content = "Date,Close\n2024-01-01,10\n2024-01-02";
        let result = PriceCsvParser::read_raw_table(csv_content.as_bytes());
        assert!(matches!(result, Err(EngineError::CsvDataFormatError(msg)) if msg.contains("line 3")));
    }

    #[test]
    fn test_require_column() {
        let table = RawTable::new(vec!["Date".into()], vec![]);
        let err = table.require_column("Close").unwrap_err();
        assert!(matches!(err, EngineError::MissingColumn { column } if column == "Close"));
    }
}

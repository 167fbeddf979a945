//! Data loading utilities

use crate::error::{Result, SelectError};
use polars::prelude::*;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Loads CSV tables from local files or HTTP(S) URLs
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Field separator
    separator: u8,
    /// Rows used for schema inference
    infer_schema_length: Option<usize>,
    /// Timeout for remote downloads
    timeout: Duration,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            separator: b',',
            infer_schema_length: Some(100),
            timeout: Duration::from_secs(30),
        }
    }

    /// Set the field separator
    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    /// Set the number of rows used to infer column types
    pub fn with_infer_schema_length(mut self, rows: Option<usize>) -> Self {
        self.infer_schema_length = rows;
        self
    }

    /// Set the download timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn read_options(&self) -> CsvReadOptions {
        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .with_parse_options(CsvParseOptions::default().with_separator(self.separator))
    }

    /// Load a CSV file
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| SelectError::DataError(format!("{}: {}", path.display(), e)))?;

        self.read_options()
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| SelectError::DataError(e.to_string()))
    }

    /// Parse CSV content already held in memory
    pub fn load_csv_bytes(&self, bytes: Vec<u8>) -> Result<DataFrame> {
        self.read_options()
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()
            .map_err(|e| SelectError::DataError(e.to_string()))
    }

    /// Download and parse a CSV over HTTP(S)
    pub fn load_csv_url(&self, url: &str) -> Result<DataFrame> {
        let start = Instant::now();
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;

        let response = client
            .get(url)
            .send()
            .map_err(|e| SelectError::DataError(format!("failed to fetch {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SelectError::DataError(format!(
                "failed to fetch {}: HTTP {}",
                url, status
            )));
        }

        let bytes = response
            .bytes()
            .map_err(|e| SelectError::DataError(format!("failed to read {}: {}", url, e)))?;
        debug!(url, bytes = bytes.len(), "Downloaded dataset");

        let df = self.load_csv_bytes(bytes.to_vec())?;
        info!(
            url,
            rows = df.height(),
            cols = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded remote dataset"
        );
        Ok(df)
    }

    /// Load from a URL or a local path depending on the source's scheme
    pub fn load_auto(&self, source: &str) -> Result<DataFrame> {
        let lower = source.to_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return self.load_csv_url(source);
        }

        let path = source.strip_prefix("file://").unwrap_or(source);
        let df = if lower.ends_with(".tsv") {
            self.clone().with_separator(b'\t').load_csv(path)?
        } else {
            self.load_csv(path)?
        };
        info!(path, rows = df.height(), cols = df.width(), "Loaded local dataset");
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_csv_bytes() {
        let csv = b"crim,rm,medv\n0.00632,6.575,24.0\n0.02731,6.421,21.6\n".to_vec();
        let df = DataLoader::new().load_csv_bytes(csv).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 3);
    }

    #[test]
    fn test_load_auto_local_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .unwrap();
        writeln!(file, "rm,medv").unwrap();
        writeln!(file, "6.575,24.0").unwrap();
        writeln!(file, "6.421,21.6").unwrap();
        writeln!(file, "7.185,34.7").unwrap();
        file.flush().unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let df = DataLoader::new().load_auto(&path).unwrap();
        assert_eq!(df.height(), 3);
        assert!(df.column("medv").is_ok());
    }

    #[test]
    fn test_load_tsv() {
        let mut file = tempfile::Builder::new()
            .suffix(".tsv")
            .tempfile()
            .unwrap();
        writeln!(file, "rm\tmedv").unwrap();
        writeln!(file, "6.575\t24.0").unwrap();
        file.flush().unwrap();

        let df = DataLoader::new().load_auto(file.path().to_str().unwrap()).unwrap();
        assert_eq!(df.width(), 2);
    }

    #[test]
    fn test_missing_file_is_data_error() {
        let err = DataLoader::new().load_csv("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, SelectError::DataError(_)));
    }
}

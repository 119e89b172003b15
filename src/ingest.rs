//! CSV upload ingestion.

use std::collections::HashSet;
use std::io::Cursor;

use polars::io::csv::read::NullValues;
use polars::prelude::*;
use thiserror::Error;

use crate::config::{AppConfig, DEFAULT_NULL_VALUES};
use crate::dataset::Dataset;
use crate::error_display::user_message_from_polars;

/// A file as received from the upload widget.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    /// Size reported by the client. Checked against the cap before parsing.
    pub declared_size: u64,
    pub bytes: Vec<u8>,
    /// Reading stopped at the size cap; `bytes` is empty and the real size is unknown.
    pub exceeds_limit: bool,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let declared_size = bytes.len() as u64;
        Self {
            name: name.into(),
            declared_size,
            bytes,
            exceeds_limit: false,
        }
    }

    /// A file whose body went past the cap after `received` bytes.
    pub fn over_limit(name: impl Into<String>, received: u64) -> Self {
        Self {
            name: name.into(),
            declared_size: received,
            bytes: Vec::new(),
            exceeds_limit: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// None = unlimited
    pub max_upload_bytes: Option<u64>,
    pub delimiter: u8,
    pub null_values: Vec<String>,
    pub infer_schema_length: Option<usize>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            max_upload_bytes: Some(crate::config::DEFAULT_MAX_UPLOAD_MB * 1024 * 1024),
            delimiter: b',',
            null_values: DEFAULT_NULL_VALUES.iter().map(|s| s.to_string()).collect(),
            infer_schema_length: None,
        }
    }
}

impl From<&AppConfig> for IngestOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_upload_bytes: config.upload.max_upload_bytes(),
            delimiter: config.file_loading.delimiter,
            null_values: config.file_loading.null_values.clone(),
            infer_schema_length: config.file_loading.infer_schema_length,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("No file uploaded")]
    NoFile,
    #[error("File is too large ({}); the limit is {}", format_file_size(*.size), format_file_size(*.limit))]
    TooLarge { size: u64, limit: u64 },
    #[error("File is larger than the {} limit", format_file_size(*.limit))]
    ExceedsLimit { limit: u64 },
    #[error("Only .csv files are accepted")]
    NotCsv,
    #[error("Could not read CSV: {0}")]
    Parse(String),
}

/// Parse an upload into a dataset.
pub fn ingest(file: Option<&UploadedFile>, options: &IngestOptions) -> Result<Dataset, IngestError> {
    let file = file.ok_or(IngestError::NoFile)?;

    if let Some(limit) = options.max_upload_bytes {
        if file.exceeds_limit {
            return Err(IngestError::ExceedsLimit { limit });
        }
        if file.declared_size > limit {
            return Err(IngestError::TooLarge {
                size: file.declared_size,
                limit,
            });
        }
    }

    if !has_csv_extension(&file.name) {
        return Err(IngestError::NotCsv);
    }

    let df = read_csv_bytes(&file.bytes, options)
        .map_err(|e| IngestError::Parse(user_message_from_polars(&e)))?;
    tracing::info!(
        "Data loaded from {}: {} rows x {} columns",
        file.name,
        df.height(),
        df.width()
    );
    Ok(Dataset::new(df))
}

fn has_csv_extension(name: &str) -> bool {
    std::path::Path::new(name)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

fn read_csv_bytes(bytes: &[u8], options: &IngestOptions) -> PolarsResult<DataFrame> {
    let mut read_options = CsvReadOptions::default().with_has_header(true);
    read_options.infer_schema_length = options.infer_schema_length;

    let null_values = build_null_values(&options.null_values);
    let delimiter = options.delimiter;
    read_options = read_options.map_parse_options(|opts| {
        let o = opts.with_separator(delimiter).with_try_parse_dates(false);
        match &null_values {
            Some(n) => o.with_null_values(Some(n.clone())),
            None => o,
        }
    });

    let df = CsvReader::new(Cursor::new(bytes.to_vec()))
        .with_options(read_options)
        .finish()?;
    let df = empty_columns_as_float(df)?;
    trim_column_names(df)
}

/// Columns with no values at all are read as text; every cell parses as a number, so make
/// them Float64.
fn empty_columns_as_float(df: DataFrame) -> PolarsResult<DataFrame> {
    if df.height() == 0 {
        return Ok(df);
    }
    let empty: Vec<Expr> = df
        .get_columns()
        .iter()
        .filter(|c| c.dtype() == &DataType::String && c.null_count() == df.height())
        .map(|c| col(c.name().clone()).cast(DataType::Float64))
        .collect();
    if empty.is_empty() {
        return Ok(df);
    }
    df.lazy().with_columns(empty).collect()
}

fn build_null_values(tokens: &[String]) -> Option<NullValues> {
    if tokens.is_empty() {
        return None;
    }
    let vals: Vec<PlSmallStr> = tokens.iter().map(|s| PlSmallStr::from(s.as_str())).collect();
    Some(NullValues::AllColumns(vals))
}

/// Header names with surrounding whitespace removed, unless trimming would make two names
/// equal.
fn trim_column_names(df: DataFrame) -> PolarsResult<DataFrame> {
    let names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();
    let trimmed: Vec<String> = names.iter().map(|s| s.trim().to_string()).collect();
    if names == trimmed {
        return Ok(df);
    }
    let unique: HashSet<&str> = trimmed.iter().map(|s| s.as_str()).collect();
    if unique.len() < trimmed.len() {
        tracing::debug!("Keeping untrimmed headers; trimming would duplicate a name");
        return Ok(df);
    }
    df.lazy()
        .rename(
            names.iter().map(|s| s.as_str()),
            trimmed.iter().map(|s| s.as_str()),
            false,
        )
        .collect()
}

/// Human readable size: KB below 1 MB, MB otherwise, two decimals.
pub fn format_file_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    let size = bytes as f64;
    if size < MB {
        format!("{:.2} KB", size / KB)
    } else {
        format!("{:.2} MB", size / MB)
    }
}

//! In-memory dataset parsed from an uploaded CSV file.

use color_eyre::Result;
use polars::prelude::*;
use serde::Serialize;

/// Logical column type as seen by the analysis pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Text,
}

/// Tabular data produced by a successful upload. Never mutated; filtering produces a new
/// frame and a new upload replaces the whole dataset.
#[derive(Debug, Clone)]
pub struct Dataset {
    df: DataFrame,
}

impl Dataset {
    pub fn new(df: DataFrame) -> Self {
        Self { df }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        self.df.shape()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.df.column(name).is_ok()
    }

    pub fn series(&self, name: &str) -> Option<&Series> {
        self.df
            .column(name)
            .ok()
            .map(|c| c.as_materialized_series())
    }

    pub fn dtype(&self, name: &str) -> Option<DataType> {
        self.df.column(name).ok().map(|c| c.dtype().clone())
    }

    pub fn kind(&self, name: &str) -> Option<ColumnKind> {
        self.dtype(name).map(|dtype| column_kind(&dtype))
    }

    /// Number of distinct non-missing values, or None if the column does not exist.
    pub fn distinct_count(&self, name: &str) -> Option<usize> {
        let series = self.series(name)?;
        match distinct_non_missing(series) {
            Ok(n) => Some(n),
            Err(e) => {
                tracing::warn!("Could not count distinct values of {}: {}", name, e);
                None
            }
        }
    }

    /// Non-missing values of a numeric column as f64. None if the column is absent or not
    /// numeric.
    pub fn numeric_values(&self, name: &str) -> Option<Vec<f64>> {
        let series = self.series(name)?;
        if !is_numeric_type(series.dtype()) {
            return None;
        }
        Some(numeric_values(series))
    }

    /// First `n` rows.
    pub fn head(&self, n: usize) -> DataFrame {
        self.df.head(Some(n))
    }
}

pub fn is_numeric_type(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

pub fn column_kind(dtype: &DataType) -> ColumnKind {
    if is_numeric_type(dtype) {
        ColumnKind::Numeric
    } else {
        ColumnKind::Text
    }
}

/// Non-missing values of a numeric series as f64. NaN counts as missing.
pub fn numeric_values(series: &Series) -> Vec<f64> {
    match series.cast(&DataType::Float64) {
        Ok(cast) => match cast.f64() {
            Ok(ca) => ca.iter().flatten().filter(|v| !v.is_nan()).collect(),
            Err(_) => Vec::new(),
        },
        Err(_) => Vec::new(),
    }
}

/// Distinct non-missing values. Numeric columns compare by value (NaN excluded), other
/// columns by their polars representation.
pub fn distinct_non_missing(series: &Series) -> Result<usize> {
    if is_numeric_type(series.dtype()) {
        let mut values = numeric_values(series);
        values.sort_by(|a, b| a.total_cmp(b));
        values.dedup();
        return Ok(values.len());
    }
    Ok(series.drop_nulls().n_unique()?)
}

/// Render a cell for display; missing values become None.
pub fn display_value(value: &AnyValue) -> Option<String> {
    match value {
        AnyValue::Null => None,
        AnyValue::String(s) => Some(s.to_string()),
        AnyValue::StringOwned(s) => Some(s.to_string()),
        v => Some(v.str_value().to_string()),
    }
}

//! Numeric range filter over the active column.

use std::sync::Arc;

use polars::prelude::*;
use serde::Serialize;

use crate::dataset::{is_numeric_type, Dataset};

/// Inclusive `[lo, hi]` bound. Always ordered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RangeBound {
    lo: f64,
    hi: f64,
}

impl RangeBound {
    /// Build a bound from two ends given in any order.
    pub fn new(a: f64, b: f64) -> Self {
        if a <= b {
            Self { lo: a, hi: b }
        } else {
            Self { lo: b, hi: a }
        }
    }

    pub fn lo(&self) -> f64 {
        self.lo
    }

    pub fn hi(&self) -> f64 {
        self.hi
    }

    pub fn contains(&self, value: f64) -> bool {
        self.lo <= value && value <= self.hi
    }
}

impl Default for RangeBound {
    /// Used when a column has no usable extremes.
    fn default() -> Self {
        Self { lo: 0.0, hi: 100.0 }
    }
}

impl std::fmt::Display for RangeBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.lo, self.hi)
    }
}

/// Bound covering the whole column, or the fallback when the column has no numeric values.
pub fn reset_bound(dataset: Option<&Dataset>, column: Option<&str>) -> RangeBound {
    let values = match (dataset, column) {
        (Some(ds), Some(name)) => ds.numeric_values(name),
        _ => None,
    };
    match values {
        Some(values) if !values.is_empty() => {
            // Infinite values stay in the bound
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            RangeBound::new(min, max)
        }
        _ => RangeBound::default(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterStatus {
    Applied { column: String, bound: RangeBound },
    Passthrough { reason: String },
}

/// Rows of the dataset that pass the active range filter.
#[derive(Debug, Clone)]
pub struct FilteredView {
    pub data: Arc<Dataset>,
    pub status: FilterStatus,
}

impl FilteredView {
    pub fn dataset(&self) -> &Dataset {
        &self.data
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.shape()
    }

    pub fn is_applied(&self) -> bool {
        matches!(self.status, FilterStatus::Applied { .. })
    }

    fn passthrough(data: Arc<Dataset>, reason: impl Into<String>) -> Self {
        Self {
            data,
            status: FilterStatus::Passthrough {
                reason: reason.into(),
            },
        }
    }
}

/// Keep rows whose value in `column` lies in `bound` (inclusive). Missing values are dropped.
///
/// Returns None only when there is no dataset.
pub fn apply_range_filter(
    dataset: Option<&Arc<Dataset>>,
    column: Option<&str>,
    bound: RangeBound,
) -> Option<FilteredView> {
    let dataset = dataset?;
    let Some(column) = column else {
        return Some(FilteredView::passthrough(
            Arc::clone(dataset),
            "no numeric column selected",
        ));
    };
    let Some(dtype) = dataset.dtype(column) else {
        return Some(FilteredView::passthrough(
            Arc::clone(dataset),
            format!("column {} not found", column),
        ));
    };
    if !is_numeric_type(&dtype) {
        return Some(FilteredView::passthrough(
            Arc::clone(dataset),
            format!("column {} is not numeric", column),
        ));
    }

    match filter_frame(dataset.frame(), column, bound) {
        Ok(df) => {
            tracing::debug!(
                "Filtered {} on [{}, {}]: {} -> {} rows",
                column,
                bound.lo(),
                bound.hi(),
                dataset.height(),
                df.height()
            );
            Some(FilteredView {
                data: Arc::new(Dataset::new(df)),
                status: FilterStatus::Applied {
                    column: column.to_string(),
                    bound,
                },
            })
        }
        Err(e) => {
            tracing::warn!("Error filtering data on {}: {}", column, e);
            Some(FilteredView::passthrough(
                Arc::clone(dataset),
                format!("filter failed: {}", e),
            ))
        }
    }
}

fn filter_frame(df: &DataFrame, column: &str, bound: RangeBound) -> PolarsResult<DataFrame> {
    let value = col(column).cast(DataType::Float64);
    df.clone()
        .lazy()
        .filter(
            value
                .clone()
                .gt_eq(lit(bound.lo()))
                .and(value.lt_eq(lit(bound.hi()))),
        )
        .collect()
}

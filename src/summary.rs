//! Descriptive statistics and the missing-value report.

use polars::polars_compute::rolling::QuantileMethod;
use polars::prelude::*;
use serde::Serialize;

use crate::dataset::{is_numeric_type, Dataset};
use crate::error_display::user_message_from_polars;
use crate::filter::FilteredView;
use crate::outcome::Outcome;

pub const NO_NUMERIC_COLUMNS: &str = "No numerical columns found";

/// Row labels of the describe table, in display order.
pub const STATISTIC_LABELS: [&str; 8] = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];

/// Describe statistics for one numeric column. Undefined values are None.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub median: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

impl ColumnSummary {
    /// Values in the order of `STATISTIC_LABELS`.
    pub fn values(&self) -> [Option<f64>; 8] {
        [
            Some(self.count as f64),
            self.mean,
            self.std,
            self.min,
            self.q25,
            self.median,
            self.q75,
            self.max,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SummaryReport {
    Describe(Vec<ColumnSummary>),
    Placeholder(String),
}

/// Summary statistics over the numeric columns of the filtered view.
pub fn summarize(view: Option<&FilteredView>) -> Outcome<SummaryReport> {
    let Some(view) = view else {
        return Outcome::Empty;
    };
    match describe_numeric(view.dataset()) {
        Ok(report) => Outcome::Ready(report),
        Err(msg) => {
            tracing::warn!("Error in summary stats: {}", msg);
            Outcome::Failed(msg)
        }
    }
}

/// Describe every numeric column with a single aggregation pass.
pub fn describe_numeric(dataset: &Dataset) -> Result<SummaryReport, String> {
    let df = dataset.frame();
    let numeric: Vec<String> = df
        .get_columns()
        .iter()
        .filter(|c| is_numeric_type(c.dtype()))
        .map(|c| c.name().to_string())
        .collect();
    if numeric.is_empty() {
        return Ok(SummaryReport::Placeholder(NO_NUMERIC_COLUMNS.to_string()));
    }

    let exprs = build_describe_exprs(&numeric);
    let agg_df = df
        .clone()
        .lazy()
        .select(exprs)
        .collect()
        .map_err(|e| user_message_from_polars(&e))?;

    let mut summaries = Vec::with_capacity(numeric.len());
    for name in &numeric {
        let prefix = format!("{}::", name);
        let summary = ColumnSummary {
            column: name.clone(),
            count: get_count(&agg_df, &format!("{}count", prefix)),
            mean: get_stat(&agg_df, &format!("{}mean", prefix)),
            std: get_stat(&agg_df, &format!("{}std", prefix)),
            min: get_stat(&agg_df, &format!("{}min", prefix)),
            q25: get_stat(&agg_df, &format!("{}q25", prefix)),
            median: get_stat(&agg_df, &format!("{}median", prefix)),
            q75: get_stat(&agg_df, &format!("{}q75", prefix)),
            max: get_stat(&agg_df, &format!("{}max", prefix)),
        };
        if summary.values().iter().flatten().any(|v| v.is_infinite()) {
            return Err(format!("Non-finite statistic in column {}", name));
        }
        summaries.push(summary);
    }
    Ok(SummaryReport::Describe(summaries))
}

/// count, mean, std (ddof 1), min, quartiles (linear) and max per column.
fn build_describe_exprs(columns: &[String]) -> Vec<Expr> {
    let mut exprs = Vec::with_capacity(columns.len() * 8);
    for name in columns {
        let name = name.as_str();
        let prefix = format!("{}::", name);
        let c = col(name).cast(DataType::Float64);
        exprs.push(col(name).count().alias(format!("{}count", prefix)));
        exprs.push(c.clone().mean().alias(format!("{}mean", prefix)));
        exprs.push(c.clone().std(1).alias(format!("{}std", prefix)));
        exprs.push(c.clone().min().alias(format!("{}min", prefix)));
        exprs.push(
            c.clone()
                .quantile(lit(0.25), QuantileMethod::Linear)
                .alias(format!("{}q25", prefix)),
        );
        exprs.push(
            c.clone()
                .quantile(lit(0.5), QuantileMethod::Linear)
                .alias(format!("{}median", prefix)),
        );
        exprs.push(
            c.clone()
                .quantile(lit(0.75), QuantileMethod::Linear)
                .alias(format!("{}q75", prefix)),
        );
        exprs.push(c.max().alias(format!("{}max", prefix)));
    }
    exprs
}

fn get_count(df: &DataFrame, col_name: &str) -> usize {
    df.column(col_name)
        .ok()
        .and_then(|s| match s.get(0).ok()? {
            AnyValue::UInt32(x) => Some(x as usize),
            AnyValue::UInt64(x) => Some(x as usize),
            AnyValue::Int64(x) => Some(x as usize),
            _ => None,
        })
        .unwrap_or(0)
}

/// Aggregated value; null and NaN mean the statistic is undefined.
fn get_stat(df: &DataFrame, col_name: &str) -> Option<f64> {
    let value = df.column(col_name).ok()?.get(0).ok()?;
    let x = match value {
        AnyValue::Float64(x) => x,
        AnyValue::Float32(x) => x as f64,
        AnyValue::Int32(x) => x as f64,
        AnyValue::Int64(x) => x as f64,
        AnyValue::UInt32(x) => x as f64,
        _ => return None,
    };
    if x.is_nan() {
        None
    } else {
        Some(x)
    }
}

/// One row of the missing-value report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingRow {
    pub column: String,
    pub dtype: String,
    pub missing: usize,
    pub missing_pct: f64,
    pub complete: usize,
    pub complete_pct: f64,
}

pub const MISSING_HEADERS: [&str; 6] = [
    "Column",
    "Type",
    "Missing",
    "Missing (%)",
    "Complete",
    "Complete (%)",
];

/// Missing and complete counts for every column of the raw dataset.
pub fn missing_report(dataset: Option<&Dataset>) -> Outcome<Vec<MissingRow>> {
    let Some(dataset) = dataset else {
        return Outcome::Empty;
    };
    let rows = dataset.height();
    let report = dataset
        .frame()
        .get_columns()
        .iter()
        .map(|c| {
            let missing = c.null_count();
            let complete = rows - missing;
            MissingRow {
                column: c.name().to_string(),
                dtype: c.dtype().to_string(),
                missing,
                missing_pct: percent(missing, rows),
                complete,
                complete_pct: percent(complete, rows),
            }
        })
        .collect();
    Outcome::Ready(report)
}

/// Share of `total` as a percentage rounded to two decimals. Zero when there are no rows.
fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 10_000.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::apply_range_filter;
    use crate::filter::RangeBound;
    use std::sync::Arc;

    fn describe(df: DataFrame) -> SummaryReport {
        describe_numeric(&Dataset::new(df)).unwrap()
    }

    #[test]
    fn describe_matches_linear_quartiles() {
        let report = describe(df!("v" => &[1.0f64, 2.0, 3.0, 4.0]).unwrap());
        let SummaryReport::Describe(cols) = report else {
            panic!("expected describe");
        };
        let s = &cols[0];
        assert_eq!(s.count, 4);
        assert_eq!(s.mean, Some(2.5));
        assert_eq!(s.min, Some(1.0));
        assert_eq!(s.q25, Some(1.75));
        assert_eq!(s.median, Some(2.5));
        assert_eq!(s.q75, Some(3.25));
        assert_eq!(s.max, Some(4.0));
        let std = s.std.unwrap();
        assert!((std - 1.2909944487358056).abs() < 1e-12);
    }

    #[test]
    fn describe_skips_text_and_counts_non_missing() {
        let report = describe(
            df!(
                "a" => &[Some(1i64), None, Some(3)],
                "b" => &["x", "y", "z"]
            )
            .unwrap(),
        );
        let SummaryReport::Describe(cols) = report else {
            panic!("expected describe");
        };
        assert_eq!(cols.len(), 1);
        assert_eq!(cols[0].column, "a");
        assert_eq!(cols[0].count, 2);
    }

    #[test]
    fn single_value_has_no_std() {
        let SummaryReport::Describe(cols) = describe(df!("v" => &[5.0f64]).unwrap()) else {
            panic!("expected describe");
        };
        assert_eq!(cols[0].std, None);
        assert_eq!(cols[0].mean, Some(5.0));
    }

    #[test]
    fn text_only_gives_placeholder() {
        assert_eq!(
            describe(df!("b" => &["x", "y"]).unwrap()),
            SummaryReport::Placeholder(NO_NUMERIC_COLUMNS.to_string())
        );
    }

    #[test]
    fn infinite_statistic_fails() {
        let result = describe_numeric(&Dataset::new(df!("v" => &[1.0f64, f64::INFINITY]).unwrap()));
        assert!(result.is_err());
    }

    #[test]
    fn summary_count_tracks_filter() {
        let ds = Arc::new(Dataset::new(df!("a" => &[Some(1i64), Some(2), Some(3), None]).unwrap()));
        let view = apply_range_filter(Some(&ds), Some("a"), RangeBound::new(1.0, 2.0));
        let Outcome::Ready(SummaryReport::Describe(cols)) = summarize(view.as_ref()) else {
            panic!("expected describe");
        };
        assert_eq!(cols[0].count, 2);
        assert_eq!(summarize(None), Outcome::Empty);
    }

    #[test]
    fn missing_percentages() {
        let ds = Dataset::new(
            df!(
                "a" => &[Some(1i64), Some(2), Some(3), None],
                "b" => &["x", "y", "x", "z"]
            )
            .unwrap(),
        );
        let Outcome::Ready(rows) = missing_report(Some(&ds)) else {
            panic!("expected report");
        };
        assert_eq!(rows[0].column, "a");
        assert_eq!(rows[0].missing, 1);
        assert_eq!(rows[0].missing_pct, 25.0);
        assert_eq!(rows[0].complete, 3);
        assert_eq!(rows[0].complete_pct, 75.0);
        assert_eq!(rows[1].missing, 0);
        for row in &rows {
            assert!((row.missing_pct + row.complete_pct - 100.0).abs() < 0.02);
        }
    }

    #[test]
    fn missing_report_with_no_rows() {
        let ds = Dataset::new(DataFrame::new(vec![Series::new_empty("a".into(), &DataType::Int64).into()]).unwrap());
        let Outcome::Ready(rows) = missing_report(Some(&ds)) else {
            panic!("expected report");
        };
        assert_eq!(rows[0].missing_pct, 0.0);
        assert_eq!(rows[0].complete_pct, 0.0);
        assert!(missing_report(None).is_empty());
    }

    #[test]
    fn percent_rounds_to_two_decimals() {
        assert_eq!(percent(1, 3), 33.33);
        assert_eq!(percent(2, 3), 66.67);
    }
}

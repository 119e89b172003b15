//! Text and tabular panels shown next to the charts.

use serde::Serialize;
use serde_json::Value;

use crate::classify::ScatterColor;
use crate::dataset::{display_value, Dataset};
use crate::filter::{FilteredView, RangeBound};
use crate::ingest::{format_file_size, IngestError};
use crate::outcome::Outcome;
use crate::summary::{MissingRow, SummaryReport, MISSING_HEADERS, STATISTIC_LABELS};

pub const NO_FILE_UPLOADED: &str = "No file uploaded yet";
pub const NO_DATA_UPLOADED: &str = "No data uploaded";
pub const NO_NUMERIC_SELECTION: &str = "No numerical column selected";

/// Column headers plus rows of JSON scalars (null for missing cells).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.rows.is_empty()
    }

    fn single(header: &str, message: &str) -> Self {
        Self {
            columns: vec![header.to_string()],
            rows: vec![vec![Value::String(message.to_string())]],
        }
    }
}

fn number(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// First `n` rows of the dataset.
pub fn preview_table(dataset: &Dataset, n: usize) -> Table {
    let head = dataset.head(n);
    let columns = dataset.column_names();
    let rows = (0..head.height())
        .map(|i| {
            head.get_columns()
                .iter()
                .map(|c| match c.get(i) {
                    Ok(v) => display_value(&v).map(Value::String).unwrap_or(Value::Null),
                    Err(_) => Value::Null,
                })
                .collect()
        })
        .collect();
    Table { columns, rows }
}

/// Describe layout: one row per statistic, one column per numeric column.
pub fn summary_table(report: &Outcome<SummaryReport>) -> Table {
    match report {
        Outcome::Empty => Table::empty(),
        Outcome::Failed(msg) => Table::single("Error", msg),
        Outcome::Ready(SummaryReport::Placeholder(note)) => Table::single("Note", note),
        Outcome::Ready(SummaryReport::Describe(columns)) => {
            let headers = std::iter::once("statistic".to_string())
                .chain(columns.iter().map(|c| c.column.clone()))
                .collect();
            let values: Vec<_> = columns.iter().map(|c| c.values()).collect();
            let rows = STATISTIC_LABELS
                .iter()
                .enumerate()
                .map(|(i, label)| {
                    std::iter::once(Value::String(label.to_string()))
                        .chain(values.iter().map(|v| v[i].map(number).unwrap_or(Value::Null)))
                        .collect()
                })
                .collect();
            Table {
                columns: headers,
                rows,
            }
        }
    }
}

pub fn missing_table(report: &Outcome<Vec<MissingRow>>) -> Table {
    match report {
        Outcome::Ready(rows) => Table {
            columns: MISSING_HEADERS.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| {
                    vec![
                        Value::String(r.column.clone()),
                        Value::String(r.dtype.clone()),
                        Value::from(r.missing),
                        number(r.missing_pct),
                        Value::from(r.complete),
                        number(r.complete_pct),
                    ]
                })
                .collect(),
        },
        Outcome::Empty => Table::empty(),
        Outcome::Failed(msg) => Table::single("Error", msg),
    }
}

/// Name and size of the last upload, plus the reason it was rejected if it was.
pub fn file_info_text(file: Option<(&str, u64)>, rejection: Option<&IngestError>) -> String {
    let Some((name, size)) = file else {
        return NO_FILE_UPLOADED.to_string();
    };
    let size = match rejection {
        Some(IngestError::ExceedsLimit { limit }) => format!("over {}", format_file_size(*limit)),
        _ => format_file_size(size),
    };
    let mut text = format!("Uploaded file: {}\nSize: {}", name, size);
    if let Some(err) = rejection {
        text.push_str(&format!("\nRejected: {}", err));
    }
    text
}

/// Everything the diagnostic panel needs to describe the current state.
pub struct DiagnosticsInput<'a> {
    pub raw: Option<&'a Dataset>,
    pub filtered: Option<&'a FilteredView>,
    pub num_column: Option<&'a str>,
    pub cat_column: Option<&'a str>,
    pub scatter_x: Option<&'a str>,
    pub scatter_y: Option<&'a str>,
    pub scatter_color: &'a ScatterColor,
    pub bound: RangeBound,
}

pub fn diagnostics_text(input: &DiagnosticsInput<'_>) -> String {
    let Some(raw) = input.raw else {
        return NO_DATA_UPLOADED.to_string();
    };
    let Some(num_column) = input.num_column else {
        return NO_NUMERIC_SELECTION.to_string();
    };
    let filtered_shape = input
        .filtered
        .map(|v| format_shape(v.shape()))
        .unwrap_or_else(|| "N/A".to_string());
    let dtype_of = |name: Option<&str>| {
        name.and_then(|n| raw.dtype(n))
            .map(|d| d.to_string())
            .unwrap_or_else(|| "N/A".to_string())
    };
    let cat_unique = input
        .cat_column
        .and_then(|c| raw.distinct_count(c))
        .map(|n| n.to_string())
        .unwrap_or_else(|| "N/A".to_string());

    [
        format!("Raw data shape: {}", format_shape(raw.shape())),
        format!("Filtered data shape: {}", filtered_shape),
        format!("Selected numerical column: {}", num_column),
        format!(
            "Selected categorical column: {}",
            input.cat_column.unwrap_or("None")
        ),
        format!("Scatter X column: {}", input.scatter_x.unwrap_or("None")),
        format!("Scatter Y column: {}", input.scatter_y.unwrap_or("None")),
        format!("Scatter color column: {}", input.scatter_color),
        format!("Num column type: {}", dtype_of(Some(num_column))),
        format!("Cat column type: {}", dtype_of(input.cat_column)),
        format!("Filter range: {}", input.bound),
        format!("Cat column unique values: {}", cat_unique),
    ]
    .join("\n")
}

fn format_shape((rows, cols): (usize, usize)) -> String {
    format!("({}, {})", rows, cols)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::describe_numeric;
    use polars::prelude::*;

    fn sample() -> Dataset {
        Dataset::new(
            df!(
                "a" => &[Some(1i64), Some(2), Some(3), None],
                "b" => &["x", "y", "x", "z"]
            )
            .unwrap(),
        )
    }

    #[test]
    fn file_info_formats_size() {
        assert_eq!(file_info_text(None, None), "No file uploaded yet");
        assert_eq!(
            file_info_text(Some(("data.csv", 2048)), None),
            "Uploaded file: data.csv\nSize: 2.00 KB"
        );
        let rejected = file_info_text(Some(("big.csv", 20 * 1024 * 1024)), Some(&IngestError::NotCsv));
        assert!(rejected.contains("Size: 20.00 MB"));
        assert!(rejected.contains("Rejected: Only .csv files are accepted"));

        let truncated = file_info_text(
            Some(("big.csv", 1024 * 1024 + 1)),
            Some(&IngestError::ExceedsLimit { limit: 1024 * 1024 }),
        );
        assert_eq!(
            truncated,
            "Uploaded file: big.csv\nSize: over 1.00 MB\nRejected: File is larger than the 1.00 MB limit"
        );
    }

    #[test]
    fn preview_keeps_nulls() {
        let table = preview_table(&sample(), 5);
        assert_eq!(table.columns, vec!["a", "b"]);
        assert_eq!(table.rows.len(), 4);
        assert_eq!(table.rows[0][0], Value::String("1".into()));
        assert_eq!(table.rows[3][0], Value::Null);
    }

    #[test]
    fn summary_table_layout() {
        let report = Outcome::Ready(describe_numeric(&sample()).unwrap());
        let table = summary_table(&report);
        assert_eq!(table.columns, vec!["statistic", "a"]);
        assert_eq!(table.rows.len(), 8);
        assert_eq!(table.rows[0], vec![Value::String("count".into()), number(3.0)]);
        assert_eq!(summary_table(&Outcome::Empty), Table::empty());
        assert_eq!(
            summary_table(&Outcome::Failed("boom".into())).columns,
            vec!["Error"]
        );
    }

    #[test]
    fn diagnostics_short_circuits() {
        let color = ScatterColor::None;
        let mut input = DiagnosticsInput {
            raw: None,
            filtered: None,
            num_column: None,
            cat_column: None,
            scatter_x: None,
            scatter_y: None,
            scatter_color: &color,
            bound: RangeBound::default(),
        };
        assert_eq!(diagnostics_text(&input), NO_DATA_UPLOADED);
        let ds = sample();
        input.raw = Some(&ds);
        assert_eq!(diagnostics_text(&input), NO_NUMERIC_SELECTION);
        input.num_column = Some("a");
        input.cat_column = Some("b");
        let text = diagnostics_text(&input);
        assert!(text.contains("Raw data shape: (4, 2)"));
        assert!(text.contains("Cat column unique values: 3"));
        assert!(text.contains("Scatter color column: None"));
        assert!(text.contains("Filter range: (0, 100)"));
    }
}

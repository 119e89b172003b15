//! Data preparation for the four charts.
//!
//! Each `prepare_*` function checks its inputs and returns `Outcome::Empty` when there is
//! nothing to draw (no dataset, stale or non-numeric selection, no rows left after
//! filtering). Rendering lives in `chart_render`.

use polars::prelude::*;
use serde::Serialize;

use crate::classify::ScatterColor;
use crate::dataset::{is_numeric_type, Dataset};
use crate::filter::FilteredView;
use crate::outcome::Outcome;

/// Default histogram bin count.
pub const DEFAULT_HISTOGRAM_BINS: usize = 30;

/// Whisker reach as a multiple of the interquartile range.
pub const WHISKER_IQR_FACTOR: f64 = 1.5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramData {
    pub column: String,
    pub bins: Vec<HistogramBin>,
    pub x_min: f64,
    pub x_max: f64,
    pub max_count: usize,
}

/// Equal-width histogram of the selected column in the filtered view.
pub fn prepare_histogram(
    view: Option<&FilteredView>,
    column: Option<&str>,
    bins: usize,
) -> Outcome<HistogramData> {
    let Some((column, values)) = selected_values(view, column) else {
        return Outcome::Empty;
    };
    match histogram(&values, bins) {
        Some(bins) => {
            let x_min = bins.first().map(|b| b.start).unwrap_or(0.0);
            let x_max = bins.last().map(|b| b.end).unwrap_or(1.0);
            let max_count = bins.iter().map(|b| b.count).max().unwrap_or(0);
            Outcome::Ready(HistogramData {
                column: column.to_string(),
                bins,
                x_min,
                x_max,
                max_count,
            })
        }
        None => Outcome::Empty,
    }
}

/// Bin values into `bins` equal-width bins over [min, max]; the last bin is closed.
/// A constant column spans [v - 0.5, v + 0.5].
pub fn histogram(values: &[f64], bins: usize) -> Option<Vec<HistogramBin>> {
    if values.is_empty() || bins == 0 {
        return None;
    }
    let mut min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let mut max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !min.is_finite() || !max.is_finite() {
        return None;
    }
    if min == max {
        min -= 0.5;
        max += 0.5;
    }
    // Divided before subtracting so extremes near f64::MAX do not overflow
    let width = max / bins as f64 - min / bins as f64;
    if !width.is_finite() || width <= 0.0 {
        return None;
    }
    let mut counts = vec![0usize; bins];
    for &v in values {
        let idx = ((v / width - min / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }
    Some(
        counts
            .into_iter()
            .enumerate()
            .map(|(i, count)| HistogramBin {
                start: min + width * i as f64,
                end: if i + 1 == bins {
                    max
                } else {
                    min + width * (i + 1) as f64
                },
                count,
            })
            .collect(),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxPlotData {
    pub column: String,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    /// Most extreme values within the whisker reach.
    pub whisker_low: f64,
    pub whisker_high: f64,
    pub outliers: Vec<f64>,
    pub min: f64,
    pub max: f64,
}

/// Five-number summary with 1.5 IQR whiskers for the selected column.
pub fn prepare_box_plot(view: Option<&FilteredView>, column: Option<&str>) -> Outcome<BoxPlotData> {
    let Some((column, mut values)) = selected_values(view, column) else {
        return Outcome::Empty;
    };
    if values.is_empty() {
        return Outcome::Empty;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let q1 = quantile_sorted(&values, 0.25);
    let median = quantile_sorted(&values, 0.5);
    let q3 = quantile_sorted(&values, 0.75);
    let iqr = q3 - q1;
    let low_fence = q1 - WHISKER_IQR_FACTOR * iqr;
    let high_fence = q3 + WHISKER_IQR_FACTOR * iqr;

    let (inside, outliers): (Vec<f64>, Vec<f64>) = values
        .iter()
        .partition(|v| **v >= low_fence && **v <= high_fence);
    let whisker_low = inside.iter().copied().fold(f64::INFINITY, f64::min).min(q1);
    let whisker_high = inside.iter().copied().fold(f64::NEG_INFINITY, f64::max).max(q3);

    Outcome::Ready(BoxPlotData {
        column: column.to_string(),
        q1,
        median,
        q3,
        whisker_low,
        whisker_high,
        outliers,
        min: values[0],
        max: values[values.len() - 1],
    })
}

/// Linear-interpolated quantile of sorted values.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = pos.floor() as usize;
            let upper = pos.ceil() as usize;
            let frac = pos - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * frac
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarChartData {
    pub column: String,
    /// (category, count), most frequent first.
    pub categories: Vec<(String, usize)>,
}

/// Counts per category over the unfiltered dataset.
pub fn prepare_bar_chart(dataset: Option<&Dataset>, column: Option<&str>) -> Outcome<BarChartData> {
    let (Some(dataset), Some(column)) = (dataset, column) else {
        return Outcome::Empty;
    };
    let Some(series) = dataset.series(column) else {
        return Outcome::Empty;
    };
    let labels = match category_labels(series) {
        Ok(labels) => labels,
        Err(e) => {
            tracing::warn!("Error creating barplot for {}: {}", column, e);
            return Outcome::Failed(e.to_string());
        }
    };
    let categories = value_counts(labels.into_iter().flatten());
    if categories.is_empty() {
        return Outcome::Empty;
    }
    Outcome::Ready(BarChartData {
        column: column.to_string(),
        categories,
    })
}

/// Counts per distinct value, sorted by descending count. Ties keep first-occurrence order.
pub fn value_counts(values: impl IntoIterator<Item = String>) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut index: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    for v in values {
        match index.get(&v) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(v.clone(), counts.len());
                counts.push((v, 1));
            }
        }
    }
    // stable
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterGroup {
    /// Category value; None for the single ungrouped series.
    pub label: Option<String>,
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterData {
    pub x_column: String,
    pub y_column: String,
    /// Set when points are grouped by a category column.
    pub color_column: Option<String>,
    pub groups: Vec<ScatterGroup>,
}

impl ScatterData {
    pub fn point_count(&self) -> usize {
        self.groups.iter().map(|g| g.points.len()).sum()
    }

    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut points = self.groups.iter().flat_map(|g| g.points.iter());
        let &(x0, y0) = points.next()?;
        Some(points.fold((x0, x0, y0, y0), |(xl, xh, yl, yh), &(x, y)| {
            (xl.min(x), xh.max(x), yl.min(y), yh.max(y))
        }))
    }
}

/// (x, y) points of the filtered view, grouped by the color column when it is usable.
pub fn prepare_scatter(
    view: Option<&FilteredView>,
    x: Option<&str>,
    y: Option<&str>,
    color: &ScatterColor,
) -> Outcome<ScatterData> {
    let (Some(view), Some(x), Some(y)) = (view, x, y) else {
        return Outcome::Empty;
    };
    let dataset = view.dataset();
    let (Some(xs), Some(ys)) = (numeric_column(dataset, x), numeric_column(dataset, y)) else {
        return Outcome::Empty;
    };

    let color_column = color.column().filter(|c| dataset.has_column(c));
    let labels: Option<Vec<Option<String>>> = match color_column.and_then(|c| dataset.series(c)) {
        Some(series) => match category_labels(series) {
            Ok(labels) => Some(labels),
            Err(e) => {
                tracing::warn!("Error creating scatterplot colors: {}", e);
                return Outcome::Failed(e.to_string());
            }
        },
        None => None,
    };

    let pairs = xs.into_iter().zip(ys).enumerate().filter_map(|(i, (x, y))| match (x, y) {
        (Some(x), Some(y)) if !x.is_nan() && !y.is_nan() => Some((i, (x, y))),
        _ => None,
    });

    let groups = match &labels {
        None => vec![ScatterGroup {
            label: None,
            points: pairs.map(|(_, p)| p).collect(),
        }],
        Some(labels) => {
            let mut groups: Vec<ScatterGroup> = Vec::new();
            for (i, point) in pairs {
                let Some(Some(label)) = labels.get(i) else {
                    continue;
                };
                match groups
                    .iter()
                    .position(|g| g.label.as_deref() == Some(label.as_str()))
                {
                    Some(idx) => groups[idx].points.push(point),
                    None => groups.push(ScatterGroup {
                        label: Some(label.clone()),
                        points: vec![point],
                    }),
                }
            }
            groups
        }
    };

    let data = ScatterData {
        x_column: x.to_string(),
        y_column: y.to_string(),
        color_column: labels.as_ref().and(color_column.map(str::to_string)),
        groups,
    };
    if data.point_count() == 0 {
        return Outcome::Empty;
    }
    Outcome::Ready(data)
}

/// The selected column's non-missing values, when it exists and is numeric.
fn selected_values<'a>(
    view: Option<&FilteredView>,
    column: Option<&'a str>,
) -> Option<(&'a str, Vec<f64>)> {
    let view = view?;
    let column = column?;
    let values = view.dataset().numeric_values(column)?;
    Some((column, values))
}

/// Row-aligned f64 values of a numeric column.
fn numeric_column(dataset: &Dataset, name: &str) -> Option<Vec<Option<f64>>> {
    let series = dataset.series(name)?;
    if !is_numeric_type(series.dtype()) {
        return None;
    }
    let cast = series.cast(&DataType::Float64).ok()?;
    let ca = cast.f64().ok()?;
    Some(ca.iter().collect())
}

/// Row-aligned category labels as displayed; missing values are None.
fn category_labels(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let cast = series.cast(&DataType::String)?;
    let ca = cast.str()?;
    Ok(ca.iter().map(|v| v.map(str::to_string)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{apply_range_filter, RangeBound};
    use std::sync::Arc;

    fn view(df: DataFrame) -> FilteredView {
        let ds = Arc::new(Dataset::new(df));
        apply_range_filter(Some(&ds), None, RangeBound::default()).unwrap()
    }

    #[test]
    fn histogram_covers_range_with_closed_last_bin() {
        let values: Vec<f64> = (0..=30).map(|v| v as f64).collect();
        let bins = histogram(&values, 30).unwrap();
        assert_eq!(bins.len(), 30);
        assert_eq!(bins[0].start, 0.0);
        assert_eq!(bins[29].end, 30.0);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 31);
        assert_eq!(bins[29].count, 2);
    }

    #[test]
    fn histogram_of_constant_column() {
        let bins = histogram(&[4.0, 4.0], 30).unwrap();
        assert_eq!(bins[0].start, 3.5);
        assert_eq!(bins[29].end, 4.5);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 2);
    }

    #[test]
    fn histogram_of_values_near_the_float_limit() {
        let bins = histogram(&[-1e308, 0.0, 1e308], 30).unwrap();
        assert!(bins.iter().all(|b| b.start.is_finite() && b.end.is_finite()));
        assert_eq!(bins[0].start, -1e308);
        assert_eq!(bins[29].end, 1e308);
        assert_eq!(bins[0].count, 1);
        assert_eq!(bins[29].count, 1);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 3);
    }

    #[test]
    fn histogram_needs_numeric_selection() {
        let v = view(df!("a" => &[1i64, 2, 3], "b" => &["x", "y", "z"]).unwrap());
        assert!(prepare_histogram(Some(&v), Some("a"), 30).is_ready());
        assert!(prepare_histogram(Some(&v), Some("b"), 30).is_empty());
        assert!(prepare_histogram(Some(&v), Some("gone"), 30).is_empty());
        assert!(prepare_histogram(Some(&v), None, 30).is_empty());
        assert!(prepare_histogram(None, Some("a"), 30).is_empty());
    }

    #[test]
    fn box_plot_marks_outliers() {
        let v = view(df!("a" => &[1.0f64, 2.0, 3.0, 4.0, 5.0, 100.0]).unwrap());
        let Outcome::Ready(data) = prepare_box_plot(Some(&v), Some("a")) else {
            panic!("expected box plot");
        };
        assert_eq!(data.q1, 2.25);
        assert_eq!(data.median, 3.5);
        assert_eq!(data.q3, 4.75);
        assert_eq!(data.whisker_low, 1.0);
        assert_eq!(data.whisker_high, 5.0);
        assert_eq!(data.outliers, vec![100.0]);
        assert_eq!(data.max, 100.0);
    }

    #[test]
    fn quantiles_interpolate() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile_sorted(&sorted, 0.25), 1.75);
        assert_eq!(quantile_sorted(&sorted, 0.5), 2.5);
        assert_eq!(quantile_sorted(&[7.0], 0.75), 7.0);
    }

    #[test]
    fn value_counts_sort_descending_and_keep_tie_order() {
        let counts = value_counts(["b", "a", "c", "a", "c"].iter().map(|s| s.to_string()));
        assert_eq!(
            counts,
            vec![("a".to_string(), 2), ("c".to_string(), 2), ("b".to_string(), 1)]
        );
    }

    #[test]
    fn bar_chart_ignores_missing() {
        let ds = Dataset::new(df!("b" => &[Some("x"), None, Some("x"), Some("y")]).unwrap());
        let Outcome::Ready(data) = prepare_bar_chart(Some(&ds), Some("b")) else {
            panic!("expected bar chart");
        };
        assert_eq!(data.categories, vec![("x".to_string(), 2), ("y".to_string(), 1)]);
        assert!(prepare_bar_chart(Some(&ds), Some("nope")).is_empty());
        assert!(prepare_bar_chart(None, Some("b")).is_empty());
    }

    #[test]
    fn scatter_groups_by_color_in_first_occurrence_order() {
        let v = view(
            df!(
                "x" => &[Some(1.0f64), Some(2.0), None, Some(4.0), Some(5.0)],
                "y" => &[1.0f64, 2.0, 3.0, 4.0, 5.0],
                "g" => &[Some("b"), Some("a"), Some("a"), None, Some("b")]
            )
            .unwrap(),
        );
        let color = ScatterColor::Column("g".into());
        let Outcome::Ready(data) = prepare_scatter(Some(&v), Some("x"), Some("y"), &color) else {
            panic!("expected scatter");
        };
        assert_eq!(data.color_column.as_deref(), Some("g"));
        let labels: Vec<_> = data.groups.iter().map(|g| g.label.clone().unwrap()).collect();
        assert_eq!(labels, vec!["b", "a"]);
        assert_eq!(data.groups[0].points, vec![(1.0, 1.0), (5.0, 5.0)]);
        assert_eq!(data.groups[1].points, vec![(2.0, 2.0)]);
    }

    #[test]
    fn scatter_without_usable_color_is_one_group() {
        let v = view(df!("x" => &[1.0f64, 2.0], "y" => &[3.0f64, 4.0]).unwrap());
        for color in [ScatterColor::None, ScatterColor::Column("missing".into())] {
            let Outcome::Ready(data) = prepare_scatter(Some(&v), Some("x"), Some("y"), &color)
            else {
                panic!("expected scatter");
            };
            assert_eq!(data.groups.len(), 1);
            assert_eq!(data.color_column, None);
            assert_eq!(data.bounds(), Some((1.0, 2.0, 3.0, 4.0)));
        }
        assert!(prepare_scatter(Some(&v), Some("x"), None, &ScatterColor::None).is_empty());
    }
}

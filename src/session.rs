//! Per-user analysis session: the source cells set by user actions and the derived views.

use std::sync::Arc;

use serde::Serialize;

use crate::chart_data::{prepare_bar_chart, prepare_box_plot, prepare_histogram, prepare_scatter};
use crate::chart_render::{render_bar_chart, render_box_plot, render_histogram, render_scatter};
use crate::classify::{classify, ColumnClassification, ScatterColor};
use crate::config::AppConfig;
use crate::dataset::Dataset;
use crate::error_display::user_message_from_report;
use crate::filter::{apply_range_filter, reset_bound, FilteredView, RangeBound};
use crate::ingest::{ingest, IngestError, IngestOptions, UploadedFile};
use crate::outcome::Outcome;
use crate::panels::{self, DiagnosticsInput, Table};
use crate::reactive::{dependents, Memo, Node, Source, Version};
use crate::summary::{missing_report, summarize, MissingRow, SummaryReport};

/// Settings a session needs from the application configuration.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub ingest: IngestOptions,
    pub category_threshold: usize,
    pub histogram_bins: usize,
    pub preview_rows: usize,
    pub histogram_size: (u32, u32),
    pub box_plot_size: (u32, u32),
    pub bar_chart_size: (u32, u32),
    pub scatter_size: (u32, u32),
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for SessionOptions {
    fn from(config: &AppConfig) -> Self {
        let chart = &config.chart;
        Self {
            ingest: IngestOptions::from(config),
            category_threshold: config.analysis.category_threshold,
            histogram_bins: config.analysis.histogram_bins,
            preview_rows: config.analysis.preview_rows,
            histogram_size: (chart.width, chart.height),
            box_plot_size: (chart.width, chart.box_plot_height),
            bar_chart_size: (chart.width, chart.height),
            scatter_size: (chart.width, chart.scatter_height),
        }
    }
}

/// Outcome of the most recent upload attempt.
#[derive(Debug, Clone, Default)]
pub struct UploadState {
    /// Name and declared size of the uploaded file.
    pub file: Option<(String, u64)>,
    pub dataset: Option<Arc<Dataset>>,
    pub rejection: Option<IngestError>,
}

/// Which chart to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Histogram,
    BoxPlot,
    Bar,
    Scatter,
}

impl ChartKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "histogram" => Some(Self::Histogram),
            "boxplot" | "box_plot" => Some(Self::BoxPlot),
            "bar" => Some(Self::Bar),
            "scatter" => Some(Self::Scatter),
            _ => None,
        }
    }

    pub fn node(self) -> Node {
        match self {
            Self::Histogram => Node::Histogram,
            Self::BoxPlot => Node::BoxPlot,
            Self::Bar => Node::BarChart,
            Self::Scatter => Node::Scatter,
        }
    }
}

pub struct Session {
    options: SessionOptions,

    dataset: Source<UploadState>,
    num_column: Source<Option<String>>,
    range: Source<RangeBound>,
    cat_column: Source<Option<String>>,
    scatter_x: Source<Option<String>>,
    scatter_y: Source<Option<String>>,
    scatter_color: Source<ScatterColor>,

    classification: Memo<ColumnClassification>,
    file_info: Memo<String>,
    preview: Memo<Table>,
    missing: Memo<Outcome<Vec<MissingRow>>>,
    filtered: Memo<Option<FilteredView>>,
    summary: Memo<Outcome<SummaryReport>>,
    histogram: Memo<Outcome<String>>,
    box_plot: Memo<Outcome<String>>,
    bar_chart: Memo<Outcome<String>>,
    scatter: Memo<Outcome<String>>,
    diagnostics: Memo<String>,
}

impl Session {
    pub fn new(options: SessionOptions) -> Self {
        let mut session = Self {
            options,
            dataset: Source::new(UploadState::default()),
            num_column: Source::new(None),
            range: Source::new(RangeBound::default()),
            cat_column: Source::new(None),
            scatter_x: Source::new(None),
            scatter_y: Source::new(None),
            scatter_color: Source::new(ScatterColor::None),
            classification: Memo::new(ColumnClassification::default()),
            file_info: Memo::new(String::new()),
            preview: Memo::new(Table::empty()),
            missing: Memo::new(Outcome::Empty),
            filtered: Memo::new(None),
            summary: Memo::new(Outcome::Empty),
            histogram: Memo::new(Outcome::Empty),
            box_plot: Memo::new(Outcome::Empty),
            bar_chart: Memo::new(Outcome::Empty),
            scatter: Memo::new(Outcome::Empty),
            diagnostics: Memo::new(String::new()),
        };
        for node in Node::DERIVED {
            session.evaluate(node);
        }
        session
    }

    /// Ingest a file and reset every selection to the defaults of the new classification.
    pub fn upload(&mut self, file: Option<UploadedFile>) -> Vec<Node> {
        let state = match ingest(file.as_ref(), &self.options.ingest) {
            Ok(dataset) => UploadState {
                file: file.as_ref().map(|f| (f.name.clone(), f.declared_size)),
                dataset: Some(Arc::new(dataset)),
                rejection: None,
            },
            Err(err) => {
                tracing::warn!("Upload rejected: {}", err);
                UploadState {
                    file: file.as_ref().map(|f| (f.name.clone(), f.declared_size)),
                    dataset: None,
                    rejection: Some(err),
                }
            }
        };
        self.dataset.replace(state);
        let mut changed = vec![Node::Dataset];

        self.evaluate(Node::Classification);
        let defaults = self.classification.get().defaults();
        if self.num_column.set(defaults.num_column) {
            changed.push(Node::NumColumn);
        }
        if self.cat_column.set(defaults.cat_column) {
            changed.push(Node::CatColumn);
        }
        if self.scatter_x.set(defaults.scatter_x) {
            changed.push(Node::ScatterX);
        }
        if self.scatter_y.set(defaults.scatter_y) {
            changed.push(Node::ScatterY);
        }
        if self.scatter_color.set(defaults.scatter_color) {
            changed.push(Node::ScatterColor);
        }
        let bound = reset_bound(self.raw_dataset(), self.num_column.get().as_deref());
        if self.range.set(bound) {
            changed.push(Node::RangeBound);
        }
        self.propagate(&changed)
    }

    /// Select the numeric column; a different column also resets the range bound.
    pub fn select_numeric(&mut self, column: Option<String>) -> Vec<Node> {
        if !self.num_column.set(column) {
            return Vec::new();
        }
        let mut changed = vec![Node::NumColumn];
        let bound = reset_bound(self.raw_dataset(), self.num_column.get().as_deref());
        if self.range.set(bound) {
            changed.push(Node::RangeBound);
        }
        self.propagate(&changed)
    }

    pub fn set_range(&mut self, lo: f64, hi: f64) -> Vec<Node> {
        if self.range.set(RangeBound::new(lo, hi)) {
            self.propagate(&[Node::RangeBound])
        } else {
            Vec::new()
        }
    }

    pub fn select_categorical(&mut self, column: Option<String>) -> Vec<Node> {
        if self.cat_column.set(column) {
            self.propagate(&[Node::CatColumn])
        } else {
            Vec::new()
        }
    }

    pub fn select_scatter_x(&mut self, column: Option<String>) -> Vec<Node> {
        if self.scatter_x.set(column) {
            self.propagate(&[Node::ScatterX])
        } else {
            Vec::new()
        }
    }

    pub fn select_scatter_y(&mut self, column: Option<String>) -> Vec<Node> {
        if self.scatter_y.set(column) {
            self.propagate(&[Node::ScatterY])
        } else {
            Vec::new()
        }
    }

    pub fn select_scatter_color(&mut self, color: ScatterColor) -> Vec<Node> {
        if self.scatter_color.set(color) {
            self.propagate(&[Node::ScatterColor])
        } else {
            Vec::new()
        }
    }

    /// Recompute the derived cells reachable from `changed` and return them.
    fn propagate(&mut self, changed: &[Node]) -> Vec<Node> {
        let dirty = dependents(changed);
        for node in &dirty {
            self.evaluate(*node);
        }
        tracing::debug!(
            "Changed {:?}; invalidated {:?}",
            changed.iter().map(|n| n.name()).collect::<Vec<_>>(),
            dirty.iter().map(|n| n.name()).collect::<Vec<_>>()
        );
        dirty
    }

    fn version_of(&self, node: Node) -> Version {
        match node {
            Node::Dataset => self.dataset.version(),
            Node::NumColumn => self.num_column.version(),
            Node::RangeBound => self.range.version(),
            Node::CatColumn => self.cat_column.version(),
            Node::ScatterX => self.scatter_x.version(),
            Node::ScatterY => self.scatter_y.version(),
            Node::ScatterColor => self.scatter_color.version(),
            Node::Classification => self.classification.version(),
            Node::FileInfo => self.file_info.version(),
            Node::Preview => self.preview.version(),
            Node::Missing => self.missing.version(),
            Node::Filtered => self.filtered.version(),
            Node::Summary => self.summary.version(),
            Node::Histogram => self.histogram.version(),
            Node::BoxPlot => self.box_plot.version(),
            Node::BarChart => self.bar_chart.version(),
            Node::Scatter => self.scatter.version(),
            Node::Diagnostics => self.diagnostics.version(),
        }
    }

    /// Recompute one derived cell unless it is already current for its inputs.
    fn evaluate(&mut self, node: Node) {
        let inputs: Vec<Version> = node.upstream().iter().map(|n| self.version_of(*n)).collect();
        if node.is_source() || self.is_current(node, &inputs) {
            return;
        }
        let opts = &self.options;
        match node {
            Node::Classification => {
                let value = self
                    .raw_dataset()
                    .map(|ds| classify(ds, opts.category_threshold))
                    .unwrap_or_default();
                self.classification.store(inputs, value);
            }
            Node::FileInfo => {
                let upload = self.dataset.get();
                let value = panels::file_info_text(
                    upload.file.as_ref().map(|(name, size)| (name.as_str(), *size)),
                    upload.rejection.as_ref(),
                );
                self.file_info.store(inputs, value);
            }
            Node::Preview => {
                let value = self
                    .raw_dataset()
                    .map(|ds| panels::preview_table(ds, opts.preview_rows))
                    .unwrap_or_default();
                self.preview.store(inputs, value);
            }
            Node::Missing => {
                let value = missing_report(self.raw_dataset());
                self.missing.store(inputs, value);
            }
            Node::Filtered => {
                let value = apply_range_filter(
                    self.dataset.get().dataset.as_ref(),
                    self.num_column.get().as_deref(),
                    *self.range.get(),
                );
                self.filtered.store(inputs, value);
            }
            Node::Summary => {
                let value = summarize(self.filtered.get().as_ref());
                self.summary.store(inputs, value);
            }
            Node::Histogram => {
                let value = prepare_histogram(
                    self.filtered.get().as_ref(),
                    self.num_column.get().as_deref(),
                    opts.histogram_bins,
                )
                .and_then(|data| render_histogram(&data, opts.histogram_size).map_err(|e| user_message_from_report(&e)));
                self.histogram.store(inputs, logged("histogram", value));
            }
            Node::BoxPlot => {
                let value = prepare_box_plot(
                    self.filtered.get().as_ref(),
                    self.num_column.get().as_deref(),
                )
                .and_then(|data| render_box_plot(&data, opts.box_plot_size).map_err(|e| user_message_from_report(&e)));
                self.box_plot.store(inputs, logged("boxplot", value));
            }
            Node::BarChart => {
                let value = prepare_bar_chart(self.raw_dataset(), self.cat_column.get().as_deref())
                    .and_then(|data| render_bar_chart(&data, opts.bar_chart_size).map_err(|e| user_message_from_report(&e)));
                self.bar_chart.store(inputs, logged("barplot", value));
            }
            Node::Scatter => {
                let value = prepare_scatter(
                    self.filtered.get().as_ref(),
                    self.scatter_x.get().as_deref(),
                    self.scatter_y.get().as_deref(),
                    self.scatter_color.get(),
                )
                .and_then(|data| render_scatter(&data, opts.scatter_size).map_err(|e| user_message_from_report(&e)));
                self.scatter.store(inputs, logged("scatterplot", value));
            }
            Node::Diagnostics => {
                let value = panels::diagnostics_text(&DiagnosticsInput {
                    raw: self.raw_dataset(),
                    filtered: self.filtered.get().as_ref(),
                    num_column: self.num_column.get().as_deref(),
                    cat_column: self.cat_column.get().as_deref(),
                    scatter_x: self.scatter_x.get().as_deref(),
                    scatter_y: self.scatter_y.get().as_deref(),
                    scatter_color: self.scatter_color.get(),
                    bound: *self.range.get(),
                });
                self.diagnostics.store(inputs, value);
            }
            Node::Dataset
            | Node::NumColumn
            | Node::RangeBound
            | Node::CatColumn
            | Node::ScatterX
            | Node::ScatterY
            | Node::ScatterColor => {}
        }
    }

    fn is_current(&self, node: Node, inputs: &[Version]) -> bool {
        match node {
            Node::Classification => self.classification.is_current(inputs),
            Node::FileInfo => self.file_info.is_current(inputs),
            Node::Preview => self.preview.is_current(inputs),
            Node::Missing => self.missing.is_current(inputs),
            Node::Filtered => self.filtered.is_current(inputs),
            Node::Summary => self.summary.is_current(inputs),
            Node::Histogram => self.histogram.is_current(inputs),
            Node::BoxPlot => self.box_plot.is_current(inputs),
            Node::BarChart => self.bar_chart.is_current(inputs),
            Node::Scatter => self.scatter.is_current(inputs),
            Node::Diagnostics => self.diagnostics.is_current(inputs),
            _ => true,
        }
    }

    /// Times a derived cell has been computed.
    pub fn evaluations(&self, node: Node) -> u64 {
        match node {
            Node::Classification => self.classification.evaluations(),
            Node::FileInfo => self.file_info.evaluations(),
            Node::Preview => self.preview.evaluations(),
            Node::Missing => self.missing.evaluations(),
            Node::Filtered => self.filtered.evaluations(),
            Node::Summary => self.summary.evaluations(),
            Node::Histogram => self.histogram.evaluations(),
            Node::BoxPlot => self.box_plot.evaluations(),
            Node::BarChart => self.bar_chart.evaluations(),
            Node::Scatter => self.scatter.evaluations(),
            Node::Diagnostics => self.diagnostics.evaluations(),
            _ => 0,
        }
    }

    pub fn raw_dataset(&self) -> Option<&Dataset> {
        self.dataset.get().dataset.as_deref()
    }

    pub fn rejection(&self) -> Option<&IngestError> {
        self.dataset.get().rejection.as_ref()
    }

    pub fn classification(&self) -> &ColumnClassification {
        self.classification.get()
    }

    pub fn filtered(&self) -> Option<&FilteredView> {
        self.filtered.get().as_ref()
    }

    pub fn selection(&self) -> SelectionSnapshot {
        SelectionSnapshot {
            num_column: self.num_column.get().clone(),
            cat_column: self.cat_column.get().clone(),
            scatter_x: self.scatter_x.get().clone(),
            scatter_y: self.scatter_y.get().clone(),
            scatter_color: self.scatter_color.get().clone(),
            range: *self.range.get(),
        }
    }

    pub fn file_info(&self) -> &str {
        self.file_info.get()
    }

    pub fn preview(&self) -> &Table {
        self.preview.get()
    }

    pub fn summary(&self) -> &Outcome<SummaryReport> {
        self.summary.get()
    }

    pub fn missing(&self) -> &Outcome<Vec<MissingRow>> {
        self.missing.get()
    }

    pub fn chart(&self, kind: ChartKind) -> &Outcome<String> {
        match kind {
            ChartKind::Histogram => self.histogram.get(),
            ChartKind::BoxPlot => self.box_plot.get(),
            ChartKind::Bar => self.bar_chart.get(),
            ChartKind::Scatter => self.scatter.get(),
        }
    }

    pub fn diagnostics(&self) -> &str {
        self.diagnostics.get()
    }
}

/// Current values of the selection widgets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionSnapshot {
    pub num_column: Option<String>,
    pub cat_column: Option<String>,
    pub scatter_x: Option<String>,
    pub scatter_y: Option<String>,
    pub scatter_color: ScatterColor,
    pub range: RangeBound,
}

fn logged(chart: &str, value: Outcome<String>) -> Outcome<String> {
    if let Outcome::Failed(msg) = &value {
        tracing::warn!("Error creating {}: {}", chart, msg);
    }
    value
}

//! Dependency graph between session inputs and the views derived from them.
//!
//! Source cells hold user input and carry a version that only moves when the value
//! actually changes. Derived cells remember the upstream versions they were computed from,
//! so re-evaluating a derived cell whose inputs did not move is a no-op.

use serde::Serialize;

pub type Version = u64;

/// Every cell of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    // sources
    Dataset,
    NumColumn,
    RangeBound,
    CatColumn,
    ScatterX,
    ScatterY,
    ScatterColor,
    // derived
    Classification,
    FileInfo,
    Preview,
    Missing,
    Filtered,
    Summary,
    Histogram,
    BoxPlot,
    BarChart,
    Scatter,
    Diagnostics,
}

impl Node {
    pub const SOURCES: [Node; 7] = [
        Node::Dataset,
        Node::NumColumn,
        Node::RangeBound,
        Node::CatColumn,
        Node::ScatterX,
        Node::ScatterY,
        Node::ScatterColor,
    ];

    /// Derived cells in an order where every cell follows its upstream cells.
    pub const DERIVED: [Node; 11] = [
        Node::Classification,
        Node::FileInfo,
        Node::Preview,
        Node::Missing,
        Node::Filtered,
        Node::Summary,
        Node::Histogram,
        Node::BoxPlot,
        Node::BarChart,
        Node::Scatter,
        Node::Diagnostics,
    ];

    pub fn is_source(self) -> bool {
        Self::SOURCES.contains(&self)
    }

    /// Cells read when computing this one. Empty for sources.
    pub fn upstream(self) -> &'static [Node] {
        use Node::*;
        match self {
            Dataset | NumColumn | RangeBound | CatColumn | ScatterX | ScatterY | ScatterColor => {
                &[]
            }
            Classification | FileInfo | Preview | Missing => &[Dataset],
            Filtered => &[Dataset, NumColumn, RangeBound],
            Summary => &[Filtered],
            Histogram | BoxPlot => &[Filtered, NumColumn],
            BarChart => &[Dataset, CatColumn],
            Scatter => &[Filtered, ScatterX, ScatterY, ScatterColor],
            Diagnostics => &[
                Dataset,
                Filtered,
                NumColumn,
                CatColumn,
                ScatterX,
                ScatterY,
                ScatterColor,
                RangeBound,
            ],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Node::Dataset => "dataset",
            Node::NumColumn => "num_column",
            Node::RangeBound => "range_bound",
            Node::CatColumn => "cat_column",
            Node::ScatterX => "scatter_x",
            Node::ScatterY => "scatter_y",
            Node::ScatterColor => "scatter_color",
            Node::Classification => "classification",
            Node::FileInfo => "file_info",
            Node::Preview => "preview",
            Node::Missing => "missing",
            Node::Filtered => "filtered",
            Node::Summary => "summary",
            Node::Histogram => "histogram",
            Node::BoxPlot => "box_plot",
            Node::BarChart => "bar_chart",
            Node::Scatter => "scatter",
            Node::Diagnostics => "diagnostics",
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Derived cells reachable from `changed`, in evaluation order.
pub fn dependents(changed: &[Node]) -> Vec<Node> {
    let mut dirty: Vec<Node> = Vec::new();
    for node in Node::DERIVED {
        let invalidated = node
            .upstream()
            .iter()
            .any(|up| changed.contains(up) || dirty.contains(up));
        if invalidated {
            dirty.push(node);
        }
    }
    dirty
}

/// Input cell.
#[derive(Debug, Clone)]
pub struct Source<T> {
    value: T,
    version: Version,
}

impl<T> Source<T> {
    pub fn new(value: T) -> Self {
        Self { value, version: 0 }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Replace the value and bump the version unconditionally.
    pub fn replace(&mut self, value: T) {
        self.value = value;
        self.version += 1;
    }
}

impl<T: PartialEq> Source<T> {
    /// Store `value`; returns false (and keeps the version) when it equals the current one.
    pub fn set(&mut self, value: T) -> bool {
        if self.value == value {
            return false;
        }
        self.replace(value);
        true
    }
}

/// Derived cell memoized on the versions of its upstream cells.
#[derive(Debug, Clone)]
pub struct Memo<T> {
    value: T,
    inputs: Option<Vec<Version>>,
    version: Version,
    evaluations: u64,
}

impl<T> Memo<T> {
    /// A cell holding `initial` that has never been evaluated.
    pub fn new(initial: T) -> Self {
        Self {
            value: initial,
            inputs: None,
            version: 0,
            evaluations: 0,
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// True when the cell was last computed from exactly these upstream versions.
    pub fn is_current(&self, inputs: &[Version]) -> bool {
        self.inputs.as_deref() == Some(inputs)
    }

    /// Record a freshly computed value.
    pub fn store(&mut self, inputs: Vec<Version>, value: T) {
        self.value = value;
        self.inputs = Some(inputs);
        self.version += 1;
        self.evaluations += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_only_names_earlier_cells() {
        for (i, node) in Node::DERIVED.iter().enumerate() {
            for up in node.upstream() {
                assert!(
                    up.is_source() || Node::DERIVED[..i].contains(up),
                    "{} reads {} before it is computed",
                    node,
                    up
                );
            }
        }
        for source in Node::SOURCES {
            assert!(source.upstream().is_empty());
        }
    }

    #[test]
    fn numeric_selection_leaves_raw_views_alone() {
        let dirty = dependents(&[Node::NumColumn]);
        assert_eq!(
            dirty,
            vec![
                Node::Filtered,
                Node::Summary,
                Node::Histogram,
                Node::BoxPlot,
                Node::Scatter,
                Node::Diagnostics
            ]
        );
        assert!(!dirty.contains(&Node::Missing));
        assert!(!dirty.contains(&Node::BarChart));
        assert!(!dirty.contains(&Node::Preview));
    }

    #[test]
    fn categorical_selection_touches_bar_chart_and_diagnostics() {
        assert_eq!(
            dependents(&[Node::CatColumn]),
            vec![Node::BarChart, Node::Diagnostics]
        );
    }

    #[test]
    fn scatter_selection_touches_scatter_only() {
        assert_eq!(
            dependents(&[Node::ScatterColor]),
            vec![Node::Scatter, Node::Diagnostics]
        );
    }

    #[test]
    fn dataset_change_reaches_everything() {
        assert_eq!(dependents(&[Node::Dataset]), Node::DERIVED.to_vec());
        assert!(dependents(&[]).is_empty());
    }

    #[test]
    fn source_keeps_version_for_equal_value() {
        let mut s = Source::new(1);
        assert!(!s.set(1));
        assert_eq!(s.version(), 0);
        assert!(s.set(2));
        assert_eq!(s.version(), 1);
        s.replace(2);
        assert_eq!(s.version(), 2);
    }

    #[test]
    fn memo_tracks_inputs() {
        let mut m = Memo::new(0);
        assert!(!m.is_current(&[0]));
        m.store(vec![0, 1], 5);
        assert!(m.is_current(&[0, 1]));
        assert!(!m.is_current(&[0, 2]));
        assert_eq!((*m.get(), m.version(), m.evaluations()), (5, 1, 1));
    }
}

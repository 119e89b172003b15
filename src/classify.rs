//! Column classification and the default selections derived from it.

use serde::Serialize;

use crate::dataset::{ColumnKind, Dataset};

/// Distinct-value threshold separating continuous from categorical numeric columns.
pub const DEFAULT_CATEGORY_THRESHOLD: usize = 8;

/// Reserved scatter-color choice meaning no color grouping.
pub const NO_COLOR: &str = "None";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnClassification {
    /// Numeric columns with more distinct values than the threshold, in dataset order.
    pub continuous: Vec<String>,
    /// Text columns, then discrete numeric columns; both limited to the threshold.
    pub categorical: Vec<String>,
}

/// Partition the dataset's columns.
///
/// Text columns with more distinct values than the threshold end up in neither list.
pub fn classify(dataset: &Dataset, threshold: usize) -> ColumnClassification {
    let mut continuous = Vec::new();
    let mut discrete_numeric = Vec::new();
    let mut text = Vec::new();

    for name in dataset.column_names() {
        let Some(kind) = dataset.kind(&name) else {
            continue;
        };
        let Some(distinct) = dataset.distinct_count(&name) else {
            continue;
        };
        match kind {
            ColumnKind::Numeric if distinct > threshold => continuous.push(name),
            ColumnKind::Numeric => discrete_numeric.push((name, distinct)),
            ColumnKind::Text => text.push((name, distinct)),
        }
    }

    let categorical = text
        .into_iter()
        .chain(discrete_numeric)
        .filter(|(_, distinct)| *distinct <= threshold)
        .map(|(name, _)| name)
        .collect();

    tracing::debug!(
        "Classified columns: continuous={:?} categorical={:?}",
        continuous,
        categorical
    );
    ColumnClassification {
        continuous,
        categorical,
    }
}

/// Scatter color choice: the sentinel or a column name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum ScatterColor {
    #[default]
    None,
    Column(String),
}

impl ScatterColor {
    /// Parse a widget value; the sentinel and the empty string mean no grouping.
    pub fn from_choice(choice: &str) -> Self {
        if choice.is_empty() || choice == NO_COLOR {
            ScatterColor::None
        } else {
            ScatterColor::Column(choice.to_string())
        }
    }

    pub fn column(&self) -> Option<&str> {
        match self {
            ScatterColor::None => None,
            ScatterColor::Column(name) => Some(name),
        }
    }

    pub fn as_choice(&self) -> &str {
        match self {
            ScatterColor::None => NO_COLOR,
            ScatterColor::Column(name) => name,
        }
    }
}

impl std::fmt::Display for ScatterColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_choice())
    }
}

impl Serialize for ScatterColor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_choice())
    }
}

/// Column selections made right after a (re)classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultSelections {
    pub num_column: Option<String>,
    pub cat_column: Option<String>,
    pub scatter_x: Option<String>,
    pub scatter_y: Option<String>,
    pub scatter_color: ScatterColor,
}

impl ColumnClassification {
    pub fn defaults(&self) -> DefaultSelections {
        let first = self.continuous.first().cloned();
        DefaultSelections {
            num_column: first.clone(),
            cat_column: self.categorical.first().cloned(),
            scatter_x: first.clone(),
            scatter_y: self.continuous.get(1).cloned().or(first),
            scatter_color: ScatterColor::None,
        }
    }

    /// Options for the scatter color dropdown: the sentinel followed by the categories.
    pub fn color_choices(&self) -> Vec<String> {
        std::iter::once(NO_COLOR.to_string())
            .chain(self.categorical.iter().cloned())
            .collect()
    }
}

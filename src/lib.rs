//! Exploratory data analysis for uploaded CSV files.
//!
//! An upload is parsed into a [`Dataset`], its columns are classified, and a per-session
//! reactive graph ([`Session`]) keeps the filtered view, summary tables and charts in step
//! with the user's selections. [`server`] exposes sessions over HTTP.

pub mod chart_data;
pub mod chart_render;
pub mod classify;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod error_display;
pub mod filter;
pub mod ingest;
pub mod outcome;
pub mod panels;
pub mod reactive;
pub mod server;
pub mod session;
pub mod summary;

pub use classify::{classify, ColumnClassification, ScatterColor};
pub use cli::Args;
pub use config::{AppConfig, ConfigManager};
pub use dataset::{ColumnKind, Dataset};
pub use filter::{apply_range_filter, reset_bound, FilteredView, RangeBound};
pub use ingest::{ingest, IngestError, IngestOptions, UploadedFile};
pub use outcome::Outcome;
pub use reactive::Node;
pub use session::{ChartKind, Session, SessionOptions};
pub use summary::{MissingRow, SummaryReport};

/// Application name used for the config directory and other app-specific paths
pub const APP_NAME: &str = "edalens";

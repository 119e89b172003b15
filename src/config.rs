use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::chart_data::DEFAULT_HISTOGRAM_BINS;
use crate::classify::DEFAULT_CATEGORY_THRESHOLD;

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a new ConfigManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not determine config directory"))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get path to a specific config file or subdirectory
    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    /// Ensure the config directory exists
    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Generate default configuration template as a string with comments.
    /// All fields are commented out so defaults are used, but users can uncomment to override
    pub fn generate_default_config(&self) -> String {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config)
            .unwrap_or_else(|e| panic!("Failed to serialize default config: {}", e));

        let comments = Self::collect_all_comments();
        Self::comment_all_fields(toml_str, comments)
    }

    /// Collect all field comments from struct constants into a map keyed by `section.field`
    fn collect_all_comments() -> HashMap<String, String> {
        let mut comments = HashMap::new();

        for (field, comment) in APP_COMMENTS {
            comments.insert(field.to_string(), comment.to_string());
        }

        let sections: &[(&str, &[(&str, &str)])] = &[
            ("server", SERVER_COMMENTS),
            ("upload", UPLOAD_COMMENTS),
            ("file_loading", FILE_LOADING_COMMENTS),
            ("analysis", ANALYSIS_COMMENTS),
            ("chart", CHART_COMMENTS),
            ("session", SESSION_COMMENTS),
            ("debug", DEBUG_COMMENTS),
        ];
        for (section, fields) in sections {
            for (field, comment) in *fields {
                comments.insert(format!("{}.{}", section, field), comment.to_string());
            }
        }

        comments
    }

    /// Comment out all fields in TOML and add comments
    fn comment_all_fields(toml: String, comments: HashMap<String, String>) -> String {
        let mut result = String::new();
        result.push_str("# edalens configuration file\n");
        result
            .push_str("# This file uses TOML format. See https://toml.io/ for syntax reference.\n");
        result.push('\n');

        let mut current_section = String::new();
        let mut seen_fields: HashSet<String> = HashSet::new();

        for line in toml.lines() {
            if let Some(section) = Self::extract_section_name(line) {
                current_section = section.clone();

                if let Some(header) = SECTION_HEADERS.iter().find(|(s, _)| *s == section) {
                    result.push_str(header.1);
                    result.push('\n');
                }

                result.push_str("# ");
                result.push_str(line);
                result.push('\n');
                continue;
            }

            if let Some(field_path) = Self::extract_field_path(line, &current_section) {
                if let Some(comment) = comments.get(&field_path) {
                    for comment_line in comment.lines() {
                        result.push_str("# ");
                        result.push_str(comment_line);
                        result.push('\n');
                    }
                }
                seen_fields.insert(field_path);

                result.push_str("# ");
                result.push_str(line);
                result.push('\n');
            } else {
                // Empty line, array continuation or other content
                if line.trim().is_empty() {
                    result.push('\n');
                } else {
                    result.push_str("# ");
                    result.push_str(line);
                    result.push('\n');
                }
            }
        }

        result
    }

    /// Extract section name from TOML line like "[upload]"
    fn extract_section_name(line: &str) -> Option<String> {
        let trimmed = line.trim();
        if trimmed.starts_with('[') && trimmed.ends_with(']') && !trimmed.contains('=') {
            Some(trimmed[1..trimmed.len() - 1].to_string())
        } else {
            None
        }
    }

    /// Extract `section.field` from an assignment line
    fn extract_field_path(line: &str, current_section: &str) -> Option<String> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('[') {
            return None;
        }

        let eq_pos = trimmed.find('=')?;
        let field_name = trimmed[..eq_pos].trim();
        if field_name.starts_with('"') {
            return None;
        }
        if current_section.is_empty() {
            Some(field_name.to_string())
        } else {
            Some(format!("{}.{}", current_section, field_name))
        }
    }

    /// Write default configuration to config file
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path("config.toml");

        if config_path.exists() && !force {
            return Err(eyre!(
                "Config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            ));
        }

        self.ensure_config_dir()?;

        let template = self.generate_default_config();
        std::fs::write(&config_path, template)?;

        Ok(config_path)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration format version (for future compatibility)
    pub version: String,
    pub server: ServerConfig,
    pub upload: UploadConfig,
    pub file_loading: FileLoadingConfig,
    pub analysis: AnalysisConfig,
    pub chart: ChartConfig,
    pub session: SessionConfig,
    pub debug: DebugConfig,
}

const APP_COMMENTS: &[(&str, &str)] = &[(
    "version",
    "Configuration format version (for future compatibility)",
)];

const SECTION_HEADERS: &[(&str, &str)] = &[
    (
        "server",
        "# ============================================================================\n# HTTP Server\n# ============================================================================",
    ),
    (
        "upload",
        "# ============================================================================\n# Uploads\n# ============================================================================",
    ),
    (
        "file_loading",
        "# ============================================================================\n# CSV Parsing\n# ============================================================================",
    ),
    (
        "analysis",
        "# ============================================================================\n# Analysis\n# ============================================================================",
    ),
    (
        "chart",
        "# ============================================================================\n# Charts\n# ============================================================================",
    ),
    (
        "session",
        "# ============================================================================\n# Sessions\n# ============================================================================",
    ),
    (
        "debug",
        "# ============================================================================\n# Debug Settings\n# ============================================================================",
    ),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

const SERVER_COMMENTS: &[(&str, &str)] = &[(
    "bind",
    "Address the HTTP server listens on. Example: bind = \"0.0.0.0:8000\"",
)];

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn merge(&mut self, other: Self) {
        if other.bind != ServerConfig::default().bind {
            self.bind = other.bind;
        }
    }
}

/// Default upload cap in megabytes.
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 15;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Maximum accepted file size in MB (0 = no limit).
    pub max_size_mb: u64,
}

const UPLOAD_COMMENTS: &[(&str, &str)] = &[(
    "max_size_mb",
    "Largest CSV file accepted, in megabytes (1 MB = 1024 * 1024 bytes).\nSet to 0 to accept files of any size.",
)];

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_size_mb: DEFAULT_MAX_UPLOAD_MB,
        }
    }
}

impl UploadConfig {
    pub fn merge(&mut self, other: Self) {
        if other.max_size_mb != UploadConfig::default().max_size_mb {
            self.max_size_mb = other.max_size_mb;
        }
    }

    /// Upload cap in bytes, None when unlimited.
    pub fn max_upload_bytes(&self) -> Option<u64> {
        if self.max_size_mb == 0 {
            None
        } else {
            Some(self.max_size_mb.saturating_mul(1024 * 1024))
        }
    }
}

/// Tokens read as missing values, matching the defaults of common dataframe tools.
pub const DEFAULT_NULL_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoadingConfig {
    /// Field delimiter as an ASCII value (44 = comma)
    pub delimiter: u8,
    /// Values treated as missing in every column
    pub null_values: Vec<String>,
    /// Rows used for type inference. None = scan the whole file.
    pub infer_schema_length: Option<usize>,
}

const FILE_LOADING_COMMENTS: &[(&str, &str)] = &[
    (
        "delimiter",
        "Field delimiter (as ASCII value, e.g., 44 for comma, 59 for semicolon)",
    ),
    (
        "null_values",
        "Cell values read as missing in every column",
    ),
    (
        "infer_schema_length",
        "Number of rows used to infer column types.\nnull = scan the whole file so a column is numeric only if every value parses as a number",
    ),
];

impl Default for FileLoadingConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            null_values: DEFAULT_NULL_VALUES.iter().map(|s| s.to_string()).collect(),
            infer_schema_length: None,
        }
    }
}

impl FileLoadingConfig {
    pub fn merge(&mut self, other: Self) {
        let default = FileLoadingConfig::default();
        if other.delimiter != default.delimiter {
            self.delimiter = other.delimiter;
        }
        if other.null_values != default.null_values {
            self.null_values = other.null_values;
        }
        if other.infer_schema_length.is_some() {
            self.infer_schema_length = other.infer_schema_length;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Columns with at most this many distinct values are treated as categories
    pub category_threshold: usize,
    /// Number of histogram bins
    pub histogram_bins: usize,
    /// Rows shown in the data preview
    pub preview_rows: usize,
}

const ANALYSIS_COMMENTS: &[(&str, &str)] = &[
    (
        "category_threshold",
        "Numeric columns with more distinct values than this are continuous;\ncolumns with at most this many are offered as categories",
    ),
    ("histogram_bins", "Number of equal-width histogram bins"),
    ("preview_rows", "Number of rows shown in the data preview"),
];

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            category_threshold: DEFAULT_CATEGORY_THRESHOLD,
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
            preview_rows: 5,
        }
    }
}

impl AnalysisConfig {
    pub fn merge(&mut self, other: Self) {
        let default = AnalysisConfig::default();
        if other.category_threshold != default.category_threshold {
            self.category_threshold = other.category_threshold;
        }
        if other.histogram_bins != default.histogram_bins {
            self.histogram_bins = other.histogram_bins;
        }
        if other.preview_rows != default.preview_rows {
            self.preview_rows = other.preview_rows;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub width: u32,
    pub height: u32,
    /// Box plots are drawn as a short horizontal strip
    pub box_plot_height: u32,
    /// Height of the scatter plot, which also reserves room for its legend
    pub scatter_height: u32,
}

const CHART_COMMENTS: &[(&str, &str)] = &[
    ("width", "Chart width in pixels"),
    ("height", "Height of histogram and bar charts in pixels"),
    ("box_plot_height", "Height of the horizontal box plot in pixels"),
    ("scatter_height", "Height of the scatter plot in pixels"),
];

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 400,
            box_plot_height: 200,
            scatter_height: 400,
        }
    }
}

impl ChartConfig {
    pub fn merge(&mut self, other: Self) {
        let default = ChartConfig::default();
        if other.width != default.width {
            self.width = other.width;
        }
        if other.height != default.height {
            self.height = other.height;
        }
        if other.box_plot_height != default.box_plot_height {
            self.box_plot_height = other.box_plot_height;
        }
        if other.scatter_height != default.scatter_height {
            self.scatter_height = other.scatter_height;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Minutes of inactivity before a session is dropped
    pub idle_timeout_minutes: u64,
    /// Upper bound on live sessions; the least recently used is dropped first
    pub max_sessions: usize,
}

const SESSION_COMMENTS: &[(&str, &str)] = &[
    (
        "idle_timeout_minutes",
        "Minutes without requests before a session and its uploaded data are dropped",
    ),
    (
        "max_sessions",
        "Maximum number of live sessions; the least recently used one is dropped first",
    ),
];

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_minutes: 60,
            max_sessions: 256,
        }
    }
}

impl SessionConfig {
    pub fn merge(&mut self, other: Self) {
        let default = SessionConfig::default();
        if other.idle_timeout_minutes != default.idle_timeout_minutes {
            self.idle_timeout_minutes = other.idle_timeout_minutes;
        }
        if other.max_sessions != default.max_sessions {
            self.max_sessions = other.max_sessions;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub enabled: bool,
    /// tracing-subscriber filter directive used when RUST_LOG is not set
    pub log_filter: String,
}

const DEBUG_COMMENTS: &[(&str, &str)] = &[
    (
        "enabled",
        "Log at debug level (same as --debug)",
    ),
    (
        "log_filter",
        "Log filter used when RUST_LOG is not set. Example: log_filter = \"edalens=debug,tower_http=info\"",
    ),
];

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_filter: "info".to_string(),
        }
    }
}

impl DebugConfig {
    pub fn merge(&mut self, other: Self) {
        let default = DebugConfig::default();
        if other.enabled != default.enabled {
            self.enabled = other.enabled;
        }
        if other.log_filter != default.log_filter {
            self.log_filter = other.log_filter;
        }
    }

    /// Effective filter directive
    pub fn filter_directive(&self) -> String {
        if self.enabled {
            "debug".to_string()
        } else {
            self.log_filter.clone()
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            server: ServerConfig::default(),
            upload: UploadConfig::default(),
            file_loading: FileLoadingConfig::default(),
            analysis: AnalysisConfig::default(),
            chart: ChartConfig::default(),
            session: SessionConfig::default(),
            debug: DebugConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from all layers (default → user)
    pub fn load(app_name: &str) -> Result<Self> {
        let manager = ConfigManager::new(app_name)?;
        Self::load_from(&manager)
    }

    /// Load configuration using a specific config directory
    pub fn load_from(manager: &ConfigManager) -> Result<Self> {
        let mut config = AppConfig::default();
        let config_path = manager.config_path("config.toml");

        let user_config = Self::load_user_config(&config_path)?;
        config.merge(user_config);

        config
            .validate()
            .map_err(|e| eyre!("Invalid configuration in {}: {}", config_path.display(), e))?;

        Ok(config)
    }

    fn load_user_config(config_path: &Path) -> Result<AppConfig> {
        if !config_path.exists() {
            return Ok(AppConfig::default());
        }

        let content = std::fs::read_to_string(config_path).map_err(|e| {
            eyre!(
                "Failed to read config file at {}: {}",
                config_path.display(),
                e
            )
        })?;

        toml::from_str(&content).map_err(|e| {
            eyre!(
                "Failed to parse config file at {}: {}",
                config_path.display(),
                e
            )
        })
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: AppConfig) {
        if other.version != AppConfig::default().version {
            self.version = other.version;
        }

        self.server.merge(other.server);
        self.upload.merge(other.upload);
        self.file_loading.merge(other.file_loading);
        self.analysis.merge(other.analysis);
        self.chart.merge(other.chart);
        self.session.merge(other.session);
        self.debug.merge(other.debug);
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with("0.1") {
            return Err(eyre!(
                "Unsupported config version: {}. Expected 0.1.x",
                self.version
            ));
        }

        if self.server.bind.parse::<std::net::SocketAddr>().is_err() {
            return Err(eyre!(
                "server.bind must be an address like 127.0.0.1:8000, got {}",
                self.server.bind
            ));
        }

        if self.analysis.histogram_bins == 0 {
            return Err(eyre!("analysis.histogram_bins must be greater than 0"));
        }

        if self.chart.width < 100
            || self.chart.height < 100
            || self.chart.box_plot_height < 100
            || self.chart.scatter_height < 100
        {
            return Err(eyre!("chart dimensions must be at least 100 pixels"));
        }

        if self.session.max_sessions == 0 {
            return Err(eyre!("session.max_sessions must be greater than 0"));
        }

        if !self.file_loading.delimiter.is_ascii() || self.file_loading.delimiter == b'\n' {
            return Err(eyre!(
                "file_loading.delimiter must be a single ASCII character, got {}",
                self.file_loading.delimiter
            ));
        }

        tracing_subscriber::EnvFilter::try_new(&self.debug.log_filter).map_err(|e| {
            eyre!(
                "debug.log_filter is not a valid filter ({}): {}",
                self.debug.log_filter,
                e
            )
        })?;

        Ok(())
    }
}

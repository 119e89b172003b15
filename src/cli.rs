use clap::Parser;

use crate::config::AppConfig;

/// Command-line arguments for edalens
#[derive(Parser, Debug, Default)]
#[command(version, about = "Exploratory data analysis for CSV files in the browser")]
pub struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8000
    #[arg(long = "bind", value_name = "ADDR")]
    pub bind: Option<String>,

    /// Largest accepted upload in megabytes
    #[arg(long = "max-upload-mb", value_name = "MB", conflicts_with = "no_upload_limit")]
    pub max_upload_mb: Option<u64>,

    /// Accept uploads of any size
    #[arg(long = "no-upload-limit", action)]
    pub no_upload_limit: bool,

    /// Enable debug logging
    #[arg(long = "debug", action)]
    pub debug: bool,

    /// Write a commented default config file and exit
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Force overwrite existing config file when using --generate-config
    #[arg(long = "force", requires = "generate_config", action)]
    pub force: bool,
}

impl Args {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(mb) = self.max_upload_mb {
            config.upload.max_size_mb = mb;
        }
        if self.no_upload_limit {
            config.upload.max_size_mb = 0;
        }
        if self.debug {
            config.debug.enabled = true;
        }
    }
}

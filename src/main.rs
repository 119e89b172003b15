use clap::Parser;
use color_eyre::Result;
use edalens::{AppConfig, Args, ConfigManager, APP_NAME};
use tracing_subscriber::EnvFilter;

fn handle_early_exit_flags(args: &Args) -> Result<Option<()>> {
    if args.generate_config {
        match ConfigManager::new(APP_NAME) {
            Ok(manager) => match manager.write_default_config(args.force) {
                Ok(path) => {
                    println!("Wrote default configuration to {}", path.display());
                    return Ok(Some(()));
                }
                Err(e) => {
                    eprintln!("Error writing config file: {}", e);
                    std::process::exit(1);
                }
            },
            Err(e) => {
                eprintln!("Error initializing config manager: {}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(None)
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.debug.filter_directive()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(()) = handle_early_exit_flags(&args)? {
        return Ok(());
    }

    color_eyre::install()?;

    let mut config = AppConfig::load(APP_NAME)?;
    args.apply_to(&mut config);
    config.validate()?;

    init_logging(&config);
    tracing::debug!("Configuration: {:?}", config);

    edalens::server::serve(&config).await
}

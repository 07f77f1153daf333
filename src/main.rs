//! authbroker - OAuth2 authorization broker
//!
#![doc = "Main entry point for the authbroker application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use authbroker::cli::{Cli, Commands};
use authbroker::commands;
use authbroker::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    init_tracing(cli.verbose, cli.json_logs);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/authbroker.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Serve { .. } => {
            tracing::info!("Starting broker server");
            commands::serve::run_serve(config).await?;
            Ok(())
        }
        Commands::List { .. } => {
            commands::list::run_list(config).await?;
            Ok(())
        }
        Commands::Fetch { config_id, url, .. } => {
            tracing::debug!("Fetching {} as {}", url, config_id);
            commands::fetch::run_fetch(config, config_id, url).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(verbose: bool, json_logs: bool) {
    let default_level = if verbose {
        "authbroker=debug"
    } else {
        "authbroker=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

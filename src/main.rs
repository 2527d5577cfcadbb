//! MediCore CLI entry point.

use anyhow::Result;
use clap::Parser;
use medicore::cli::{commands, Cli, Commands, Output};
use medicore::config::{load_env_file, Settings};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Credentials usually live in ./.env
    if let Err(e) = load_env_file(&std::env::current_dir()?) {
        Output::warning(&e.to_string());
    }

    let cli = Cli::parse();

    // Load configuration
    let config_path = cli
        .config
        .as_deref()
        .map(Settings::expand_path)
        .unwrap_or_else(Settings::default_config_path);
    let mut settings = Settings::load_from(Some(&config_path))?;

    // Initialize logging
    let log_level = match cli.verbose {
        0 => settings.general.log_level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("medicore={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Commands::Run {
        executor: Some(kind),
        ..
    }
    | Commands::Serve {
        executor: Some(kind),
        ..
    } = &cli.command
    {
        settings.sandbox.executor = *kind;
    }
    debug!("Sandbox executor: {}", settings.sandbox.executor);

    // Execute command
    match &cli.command {
        Commands::Run { query, model, .. } => {
            commands::run_query(query.as_deref(), model.clone(), settings).await?;
        }

        Commands::Serve { host, port, .. } => {
            commands::run_serve(host.as_deref(), *port, settings).await?;
        }

        Commands::Verify => {
            commands::run_verify(&settings)?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings, config_path)?;
        }
    }

    Ok(())
}

use anyhow::Result;
use clap::Parser;

use trapsink_core::config::TrapsinkConfig;
use trapsink_core::error::{ConfigError, TrapsinkError};
use trapsink_daemon::cli::DaemonCli;
use trapsink_daemon::logging::{self, FilterSource};
use trapsink_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();
    let config = load_config(&cli).await?;

    if cli.validate {
        println!("configuration OK: {}", cli.config.display());
        return Ok(());
    }

    let source = if cli.log_level.is_some() {
        FilterSource::ConfigOnly
    } else {
        FilterSource::EnvThenConfig
    };
    let log_setup = logging::build_dispatch(&config.general, source)?;
    let _log_guard = tracing::dispatcher::set_default(&log_setup.dispatch);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        log_file = ?log_setup.log_file,
        "trapsink-daemon starting"
    );

    let mut orchestrator = Orchestrator::build_from_config(config)?;
    if let Err(e) = orchestrator.run().await {
        tracing::error!(error = %e, "trapsink-daemon exited with error");
        return Err(e);
    }

    tracing::info!("trapsink-daemon shut down");
    Ok(())
}

/// File, then environment, then command line. A missing file at the default
/// location falls back to built-in defaults.
async fn load_config(cli: &DaemonCli) -> Result<TrapsinkConfig> {
    let mut config = match TrapsinkConfig::from_file(&cli.config).await {
        Ok(config) => config,
        Err(TrapsinkError::Config(ConfigError::FileNotFound { .. })) if cli.uses_default_config() => {
            eprintln!(
                "config file {} not found, using defaults",
                cli.config.display()
            );
            TrapsinkConfig::default()
        }
        Err(e) => return Err(anyhow::anyhow!("failed to load config: {}", e)),
    };

    config.apply_env_overrides();
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if config.listener.port == 0 {
        return Err(anyhow::anyhow!("listener.port must not be 0"));
    }
    Ok(config)
}

mod config;
mod observability;

use clap::{Args, Parser};
use config::{Config, ConfigError};
use std::path::PathBuf;

#[derive(Parser)]
enum CliCommand {
    /// Run the send-to-device endpoint
    Dispatch(ConfigArgs),
    /// Load and validate the config file, then exit
    CheckConfig(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long, default_value = "linkpush.yaml")]
    config_file_path: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid dispatch config: {0}")]
    InvalidConfig(#[from] dispatch::config::ValidationError),
    #[error("missing `dispatch` section in config")]
    MissingDispatchConfig,
    #[error("could not install metrics recorder: {0}")]
    Metrics(String),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Dispatch(#[from] dispatch::errors::DispatchError),
}

fn main() -> Result<(), CliError> {
    let cli = CliCommand::parse();

    match cli {
        CliCommand::Dispatch(args) => {
            let config = Config::from_file(&args.config_file_path)?;
            let dispatch_config = config.dispatch.ok_or(CliError::MissingDispatchConfig)?;

            let _sentry_guard = observability::init_logging(config.common.logging.as_ref());
            if let Some(metrics_config) = &config.common.metrics {
                observability::init_metrics(metrics_config)?;
            }

            tracing::info!("Starting dispatch");
            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            rt.block_on(dispatch::run(dispatch_config))?;
        }
        CliCommand::CheckConfig(args) => {
            let config = Config::from_file(&args.config_file_path)?;
            let dispatch_config = config.dispatch.ok_or(CliError::MissingDispatchConfig)?;
            dispatch_config.validate()?;
            println!("{} is valid", args.config_file_path.display());
        }
    }

    Ok(())
}

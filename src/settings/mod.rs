use crate::config::AppConfig;
use crate::data_model::settings::AppSettings;
use crate::logging::{LogFormat, LogLevel};
use clap::Parser;
use std::path::PathBuf;
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_PROBES_PATH: &str = "probe_config.yaml";

#[derive(Parser, Debug)]
#[command(name = "probechain")]
#[command(about = "Periodic probe scheduler with cross-probe dependency resolution", long_about = None)]
pub struct CliArgs {
    /// Application config (logging, timeouts, identity)
    #[arg(short, long, env = "PROBECHAIN_CONFIG", value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Probe definitions file
    #[arg(short, long, env = "PROBECHAIN_PROBES", value_name = "PATH", default_value = DEFAULT_PROBES_PATH)]
    probes: PathBuf,

    /// Log level: trace|debug|info|warn|error
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: text|json
    #[arg(long, env = "LOG_FORMAT")]
    log_format: Option<String>,

    /// Load and validate both files, then exit
    #[arg(long)]
    validate: bool,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("unknown log level {value:?}")]
    InvalidLogLevel { value: String },
    #[error("unknown log format {value:?}")]
    InvalidLogFormat { value: String },
}

pub fn load_from_cli() -> Result<AppSettings, SettingsError> {
    let args = CliArgs::parse();
    from_args(args)
}

pub fn from_args(args: CliArgs) -> Result<AppSettings, SettingsError> {
    let log_level = args
        .log_level
        .map(|value| {
            value
                .parse::<LogLevel>()
                .map_err(|_| SettingsError::InvalidLogLevel { value })
        })
        .transpose()?;
    let log_format = args
        .log_format
        .map(|value| {
            value
                .parse::<LogFormat>()
                .map_err(|_| SettingsError::InvalidLogFormat { value })
        })
        .transpose()?;

    Ok(AppSettings {
        config_path: args.config,
        probes_path: args.probes,
        log_level,
        log_format,
        validate_only: args.validate,
    })
}

/// Command-line and environment overrides win over the config file.
pub fn apply_overrides(settings: &AppSettings, config: &mut AppConfig) {
    if let Some(level) = settings.log_level {
        config.log.level = level;
    }
    if let Some(format) = settings.log_format {
        config.log.format = format;
    }
}

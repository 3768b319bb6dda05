use crate::logging::{LogFormat, LogLevel};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub config_path: PathBuf,
    pub probes_path: PathBuf,
    pub log_level: Option<LogLevel>,
    pub log_format: Option<LogFormat>,
    pub validate_only: bool,
}

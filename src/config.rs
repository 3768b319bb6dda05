use crate::common::net::parse_target_url;
use crate::logging::LogConfig;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_TIMEOUT_SECS: f64 = 10.0;
pub const MAX_TIMEOUT_SECS: f64 = 60.0;
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
pub const DEFAULT_DEPENDENCY_RETRIES: u32 = 3;
pub const DEFAULT_DEPENDENCY_RETRY_DELAY_SECS: u64 = 3;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {origin}: {source}")]
    Parse {
        origin: String,
        source: serde_yaml::Error,
    },
    #[error("probe #{index} has no operation")]
    MissingOperation { index: usize },
    #[error("operation {operation} is configured more than once")]
    DuplicateOperation { operation: String },
    #[error("probe {operation} must have an interval greater than zero")]
    InvalidInterval { operation: String },
    #[error("probe {operation} has an invalid address {address:?}")]
    InvalidAddress { operation: String, address: String },
    #[error("probe timeout must be within (0, 60] seconds (got {value})")]
    InvalidTimeout { value: f64 },
    #[error("dependency retries must be greater than zero")]
    InvalidRetries,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub probe: ProbeSettings,
    #[serde(default)]
    pub app: AppIdentity,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AppIdentity {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub env: String,
    #[serde(default)]
    pub tribe: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeSettings {
    #[serde(default = "default_timeout_secs")]
    pub normal_timeout: f64,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default = "default_dependency_retries")]
    pub dependency_retries: u32,
    #[serde(default = "default_dependency_retry_delay")]
    pub dependency_retry_delay: u64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            normal_timeout: DEFAULT_TIMEOUT_SECS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            dependency_retries: DEFAULT_DEPENDENCY_RETRIES,
            dependency_retry_delay: DEFAULT_DEPENDENCY_RETRY_DELAY_SECS,
        }
    }
}

impl ProbeSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.normal_timeout)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.dependency_retry_delay)
    }
}

fn default_timeout_secs() -> f64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

fn default_dependency_retries() -> u32 {
    DEFAULT_DEPENDENCY_RETRIES
}

fn default_dependency_retry_delay() -> u64 {
    DEFAULT_DEPENDENCY_RETRY_DELAY_SECS
}

/// Tribe/operation pair. The operation alone is the publish key.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct ProbeIdentity {
    pub tribe: String,
    pub operation: String,
}

impl ProbeIdentity {
    pub fn new(tribe: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            tribe: tribe.into(),
            operation: operation.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.operation
    }
}

impl fmt::Display for ProbeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tribe.is_empty() {
            f.write_str(&self.operation)
        } else {
            write!(f, "{}.{}", self.tribe, self.operation)
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    #[default]
    Http,
    Tcp,
}

impl CheckKind {
    pub fn label(self) -> &'static str {
        match self {
            CheckKind::Http => "http",
            CheckKind::Tcp => "tcp",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    #[serde(alias = "get")]
    Get,
    #[serde(alias = "post")]
    Post,
    #[serde(alias = "put")]
    Put,
    #[serde(alias = "patch")]
    Patch,
    #[serde(alias = "delete")]
    Delete,
    #[serde(alias = "head")]
    Head,
    #[serde(alias = "options")]
    Options,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    /// Basic auth is only sent when both halves are present.
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.expose().is_empty()
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RequestTemplate {
    pub method: HttpMethod,
    pub body: String,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub credentials: Option<Credentials>,
}

#[derive(Clone, Debug)]
pub struct ProbeDefinition {
    pub identity: ProbeIdentity,
    pub address: Url,
    pub interval: Duration,
    pub dependencies: Vec<String>,
    pub request: RequestTemplate,
    pub order: i64,
    pub check: CheckKind,
    pub max_in_flight: Option<usize>,
}

#[derive(Clone, Default, Eq, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ProbesFile {
    #[serde(default)]
    probes: Vec<RawProbe>,
}

#[derive(Debug, Deserialize)]
struct RawProbe {
    #[serde(default)]
    tribe: String,
    #[serde(default)]
    operation: String,
    #[serde(default)]
    order: i64,
    #[serde(default)]
    ip: String,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    interval: u64,
    #[serde(default)]
    check: CheckKind,
    #[serde(default)]
    max_in_flight: Option<usize>,
    #[serde(default)]
    probe_config: Option<RawRequest>,
}

#[derive(Debug, Default, Deserialize)]
struct RawRequest {
    #[serde(default)]
    method: HttpMethod,
    #[serde(default)]
    authorization: Option<RawAuthorization>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    body: String,
    #[serde(default)]
    query: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawAuthorization {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: SecretString,
}

pub fn load_app_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = read_file(path)?;
    parse_app_config(&content, &path.display().to_string())
}

pub fn parse_app_config(content: &str, origin: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig =
        serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            origin: origin.to_string(),
            source,
        })?;

    let timeout = config.probe.normal_timeout;
    if !(timeout > 0.0 && timeout <= MAX_TIMEOUT_SECS) {
        return Err(ConfigError::InvalidTimeout { value: timeout });
    }
    if config.probe.dependency_retries == 0 {
        return Err(ConfigError::InvalidRetries);
    }

    Ok(config)
}

pub fn load_probe_definitions(path: &Path) -> Result<Vec<ProbeDefinition>, ConfigError> {
    let content = read_file(path)?;
    parse_probe_definitions(&content, &path.display().to_string())
}

/// Parses and validates probe definitions, returned in `order` sequence.
pub fn parse_probe_definitions(
    content: &str,
    origin: &str,
) -> Result<Vec<ProbeDefinition>, ConfigError> {
    let file: ProbesFile = serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
        origin: origin.to_string(),
        source,
    })?;

    let mut seen = HashSet::new();
    let mut definitions = Vec::with_capacity(file.probes.len());
    for (index, raw) in file.probes.into_iter().enumerate() {
        let definition = definition_from_raw(index, raw)?;
        if !seen.insert(definition.identity.operation.clone()) {
            return Err(ConfigError::DuplicateOperation {
                operation: definition.identity.operation,
            });
        }
        definitions.push(definition);
    }

    for definition in &definitions {
        for dependency in &definition.dependencies {
            if !seen.contains(dependency) {
                tracing::warn!(
                    probe = %definition.identity,
                    dependency = %dependency,
                    "dependency does not name a configured operation"
                );
            }
        }
    }

    definitions.sort_by_key(|definition| definition.order);
    Ok(definitions)
}

fn definition_from_raw(index: usize, raw: RawProbe) -> Result<ProbeDefinition, ConfigError> {
    let operation = raw.operation.trim().to_string();
    if operation.is_empty() {
        return Err(ConfigError::MissingOperation { index });
    }
    if raw.interval == 0 {
        return Err(ConfigError::InvalidInterval { operation });
    }
    let Some(address) = parse_target_url(&raw.ip) else {
        return Err(ConfigError::InvalidAddress {
            operation,
            address: raw.ip,
        });
    };

    let request = raw.probe_config.unwrap_or_default();
    let credentials = request.authorization.map(|auth| Credentials {
        username: auth.username,
        password: auth.password,
    });

    Ok(ProbeDefinition {
        identity: ProbeIdentity::new(raw.tribe, operation),
        address,
        interval: Duration::from_secs(raw.interval),
        dependencies: raw.dependencies,
        request: RequestTemplate {
            method: request.method,
            body: request.body,
            headers: request.headers,
            query: request.query,
            credentials,
        },
        order: raw.order,
        check: raw.check,
        max_in_flight: raw.max_in_flight.filter(|limit| *limit > 0),
    })
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

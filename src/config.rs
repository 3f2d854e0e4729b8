use std::fmt;
use std::net::SocketAddr;
use std::num::NonZeroU64;

use serde::Deserialize;
use tracing::trace;

use crate::check::CheckId;

/// How often a check logs once its initial verbose burst is over
///
/// Zero is rejected when the configuration is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "u64")]
pub struct LoggingFrequency(NonZeroU64);

impl LoggingFrequency {
    pub fn new(runs: u64) -> Result<Self, ConfigError> {
        NonZeroU64::new(runs)
            .map(Self)
            .ok_or(ConfigError::InvalidLoggingFrequency)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl Default for LoggingFrequency {
    fn default() -> Self {
        Self(NonZeroU64::new(DEFAULT_LOGGING_FREQUENCY).unwrap_or(NonZeroU64::MIN))
    }
}

impl TryFrom<u64> for LoggingFrequency {
    type Error = ConfigError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for LoggingFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors raised while validating a configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `logging_frequency` must be strictly positive
    InvalidLoggingFrequency,

    /// `check_runners` must be strictly positive
    NoWorkers,

    /// Two checks share the same identifier
    DuplicateCheck(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidLoggingFrequency => {
                write!(f, "logging_frequency must be greater than zero")
            }
            ConfigError::NoWorkers => write!(f, "check_runners must be greater than zero"),
            ConfigError::DuplicateCheck(id) => write!(f, "check {id} is configured twice"),
        }
    }
}

impl std::error::Error for ConfigError {}

const DEFAULT_LOGGING_FREQUENCY: u64 = 500;

fn default_check_runners() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    100
}

fn default_api_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5001))
}

fn default_interval() -> u64 {
    15
}

fn default_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Number of workers pulling checks from the queue
    #[serde(default = "default_check_runners")]
    pub check_runners: usize,

    #[serde(default)]
    pub logging_frequency: LoggingFrequency,

    /// Capacity of the pending check queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Overrides the hostname reported with service checks
    pub hostname: Option<String>,

    /// Status API (disabled if absent)
    pub api: Option<ApiSettings>,

    #[serde(default)]
    pub checks: Vec<CheckConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            check_runners: default_check_runners(),
            logging_frequency: LoggingFrequency::default(),
            queue_capacity: default_queue_capacity(),
            hostname: None,
            api: None,
            checks: vec![],
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.check_runners == 0 {
            return Err(ConfigError::NoWorkers);
        }

        let mut seen = std::collections::HashSet::new();
        for check in &self.checks {
            let id = check.id();
            if !seen.insert(id.clone()) {
                return Err(ConfigError::DuplicateCheck(id.to_string()));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_api_bind")]
    pub bind: SocketAddr,
}

/// A configured check instance
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckConfig {
    Http(HttpCheckConfig),
    Resources(ResourcesCheckConfig),
}

impl CheckConfig {
    pub fn id(&self) -> CheckId {
        match self {
            CheckConfig::Http(config) => CheckId::new("http", &config.name),
            CheckConfig::Resources(config) => CheckId::new("resources", &config.name),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Head,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpCheckConfig {
    pub name: String,
    pub url: String,

    /// Seconds between runs, 0 for a long-running check
    #[serde(default = "default_interval")]
    pub interval: u64,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub method: HttpMethod,

    /// Accepted status codes (any 2xx if absent)
    pub expected_status: Option<Vec<u16>>,

    /// Regex the body should match, a warning is raised otherwise
    pub body_pattern: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourcesCheckConfig {
    pub name: String,

    #[serde(default = "default_interval")]
    pub interval: u64,

    /// Warn above this average CPU usage (percent)
    pub cpu_limit: Option<f32>,

    /// Warn above this memory usage (percent)
    pub memory_limit: Option<f32>,
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))?;
    config.validate()?;
    trace!("loaded config: {config:?}");
    Ok(config)
}

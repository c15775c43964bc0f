use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::workflows::recall::config::{ApprovalPolicy, RecallConfig, RecallConfigError};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub recall: RecallConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            recall: load_recall()?,
        })
    }
}

fn load_recall() -> Result<RecallConfig, ConfigError> {
    let mut recall = RecallConfig::default();

    if let Some(value) = parsed::<f64>("RECALL_GAP_THRESHOLD")? {
        recall.gap_threshold = value;
    }
    if let Some(value) = parsed::<f64>("RECALL_HIGH_URGENCY_RATIO")? {
        recall.urgency_bands.high_above = value;
    }
    if let Some(value) = parsed::<f64>("RECALL_MEDIUM_URGENCY_RATIO")? {
        recall.urgency_bands.medium_above = value;
    }
    if let Some(value) = parsed::<f64>("RECALL_STAFFING_FACTOR")? {
        recall.staffing_factor = value;
    }
    if let Ok(raw) = env::var("RECALL_SCORING_WEIGHTS") {
        recall.weights = raw.parse().map_err(ConfigError::Recall)?;
    }
    if let Some(value) = parsed::<usize>("RECALL_MAX_CANDIDATES")? {
        recall.max_candidates = value;
    }
    if let Some(value) = parsed::<usize>("RECALL_CONTACT_CONCURRENCY")? {
        recall.contact.concurrency_limit = value;
    }
    if let Some(value) = parsed::<u64>("RECALL_ATTEMPT_TIMEOUT_MS")? {
        recall.contact.attempt_timeout = Duration::from_millis(value);
    }
    if let Ok(raw) = env::var("RECALL_APPROVAL_POLICY") {
        recall.approval_policy = raw.parse::<ApprovalPolicy>().map_err(ConfigError::Recall)?;
    }
    if let Some(value) = parsed::<u64>("RECALL_SIMULATION_SEED")? {
        recall.simulation_seed = value;
    }

    recall.validate().map_err(ConfigError::Recall)?;
    Ok(recall)
}

fn parsed<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
        Err(_) => Ok(None),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidValue { name: &'static str, value: String },
    Recall(RecallConfigError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidValue { name, value } => {
                write!(f, "{name} has an unparseable value '{value}'")
            }
            ConfigError::Recall(err) => write!(f, "invalid recall settings: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidValue { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::Recall(err) => Some(err),
        }
    }
}

use rust_decimal::Decimal;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

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
    pub scheduling: SchedulingConfig,
    pub storage: StorageConfig,
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

        let max_shift_hours = env::var("APP_MAX_SHIFT_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .parse::<u32>()
            .ok()
            .filter(|hours| *hours > 0)
            .ok_or(ConfigError::InvalidMaxShiftHours)?;

        let raw_multiplier =
            env::var("APP_OVERTIME_MULTIPLIER").unwrap_or_else(|_| "1.5".to_string());
        let overtime_multiplier = Decimal::from_str(raw_multiplier.trim())
            .ok()
            .filter(|multiplier| *multiplier >= Decimal::ONE)
            .ok_or(ConfigError::InvalidOvertimeMultiplier {
                value: raw_multiplier,
            })?;

        let timeout_ms = env::var("APP_STORAGE_TIMEOUT_MS")
            .unwrap_or_else(|_| "2000".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidStorageTimeout)?;

        let retry_attempts = env::var("APP_RETRY_ATTEMPTS")
            .unwrap_or_else(|_| "3".to_string())
            .parse::<u32>()
            .ok()
            .filter(|attempts| *attempts > 0)
            .ok_or(ConfigError::InvalidRetryAttempts)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            scheduling: SchedulingConfig {
                max_shift_hours,
                overtime_multiplier,
            },
            storage: StorageConfig {
                timeout: Duration::from_millis(timeout_ms),
                retry_attempts,
            },
        })
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Limits applied when normalizing schedules and pricing worked time.
#[derive(Debug, Clone)]
pub struct SchedulingConfig {
    pub max_shift_hours: u32,
    pub overtime_multiplier: Decimal,
}

/// Storage access bounds: how long to wait for the store and how often to retry.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub timeout: Duration,
    pub retry_attempts: u32,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidMaxShiftHours,
    InvalidOvertimeMultiplier { value: String },
    InvalidStorageTimeout,
    InvalidRetryAttempts,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidMaxShiftHours => {
                write!(f, "APP_MAX_SHIFT_HOURS must be a positive whole number")
            }
            ConfigError::InvalidOvertimeMultiplier { value } => write!(
                f,
                "APP_OVERTIME_MULTIPLIER must be a decimal of at least 1.0 (found '{}')",
                value
            ),
            ConfigError::InvalidStorageTimeout => {
                write!(f, "APP_STORAGE_TIMEOUT_MS must be a whole number of milliseconds")
            }
            ConfigError::InvalidRetryAttempts => {
                write!(f, "APP_RETRY_ATTEMPTS must be a positive whole number")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

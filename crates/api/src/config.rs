//! Application configuration loaded from environment variables.

use std::time::Duration;

use common::Resource;
use participants::CoordinatorConfig;

use crate::error::ConfigError;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::Invalid {
                key: "LOG_FORMAT",
                value: other.to_string(),
            }),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `ORDER_SERVICE_URL`, `INVENTORY_SERVICE_URL`, `PAYMENT_SERVICE_URL`:
///   resource manager base URLs (default: `http://localhost:5001`, `5002`, `5003`)
/// - `TWO_PHASE_PATH_PREFIX`, `SAGA_PATH_PREFIX`: path appended to each base
///   URL per protocol (default: `/2pc`, `/saga`)
/// - `RESOURCE_MANAGER_TIMEOUT_MS`: per-call deadline (default: `5000`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub order_service_url: String,
    pub inventory_service_url: String,
    pub payment_service_url: String,
    pub two_phase_path_prefix: String,
    pub saga_path_prefix: String,
    pub resource_manager_timeout: Duration,
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    ///
    /// Unset variables take their default; set but malformed ones are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = match std::env::var("PORT") {
            Ok(p) => p.parse().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                value: p,
            })?,
            Err(_) => defaults.port,
        };
        let log_format = match std::env::var("LOG_FORMAT") {
            Ok(f) => f.parse()?,
            Err(_) => defaults.log_format,
        };
        let resource_manager_timeout = match std::env::var("RESOURCE_MANAGER_TIMEOUT_MS") {
            Ok(ms) => match ms.parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "RESOURCE_MANAGER_TIMEOUT_MS",
                        value: ms,
                    });
                }
            },
            Err(_) => defaults.resource_manager_timeout,
        };

        Ok(Self {
            host: var_or("HOST", &defaults.host),
            port,
            log_level: var_or("RUST_LOG", &defaults.log_level),
            log_format,
            order_service_url: var_or("ORDER_SERVICE_URL", &defaults.order_service_url),
            inventory_service_url: var_or(
                "INVENTORY_SERVICE_URL",
                &defaults.inventory_service_url,
            ),
            payment_service_url: var_or("PAYMENT_SERVICE_URL", &defaults.payment_service_url),
            two_phase_path_prefix: var_or("TWO_PHASE_PATH_PREFIX", &defaults.two_phase_path_prefix),
            saga_path_prefix: var_or("SAGA_PATH_PREFIX", &defaults.saga_path_prefix),
            resource_manager_timeout,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn service_url(&self, resource: Resource) -> &str {
        match resource {
            Resource::Order => &self.order_service_url,
            Resource::Inventory => &self.inventory_service_url,
            Resource::Payment => &self.payment_service_url,
        }
    }

    /// Base URL of the two-phase commit endpoints of `resource`.
    pub fn two_phase_url(&self, resource: Resource) -> String {
        join(self.service_url(resource), &self.two_phase_path_prefix)
    }

    /// Base URL of the saga endpoints of `resource`.
    pub fn saga_url(&self, resource: Resource) -> String {
        join(self.service_url(resource), &self.saga_path_prefix)
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            call_timeout: self.resource_manager_timeout,
        }
    }
}

fn join(base: &str, prefix: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        return base.trim_end_matches('/').to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), prefix)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            order_service_url: "http://localhost:5001".to_string(),
            inventory_service_url: "http://localhost:5002".to_string(),
            payment_service_url: "http://localhost:5003".to_string(),
            two_phase_path_prefix: "/2pc".to_string(),
            saga_path_prefix: "/saga".to_string(),
            resource_manager_timeout: participants::DEFAULT_CALL_TIMEOUT,
        }
    }
}

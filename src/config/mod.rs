//! Telemetry configuration
//!
//! Process-wide switches consumed by the metrics registry, the tracer and the
//! demo binary. Values come from `METERED_IO_*` environment variables.

pub mod error;

pub use error::{ConfigError, ConfigResult};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const ENV_SERVICE_NAME: &str = "METERED_IO_SERVICE_NAME";
pub const ENV_ENABLE_METRIC_COLLECTION: &str = "METERED_IO_ENABLE_METRIC_COLLECTION";
pub const ENV_ENABLE_TRACE_COLLECTION: &str = "METERED_IO_ENABLE_TRACE_COLLECTION";
pub const ENV_DETACHED_QUEUE_CAPACITY: &str = "METERED_IO_DETACHED_QUEUE_CAPACITY";
pub const ENV_LOG_FORMAT: &str = "METERED_IO_LOG_FORMAT";

/// Output format for the log subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    #[default]
    Color,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "color" => Ok(LogFormat::Color),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected one of text, color, json; got {other}")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogFormat::Text => "text",
            LogFormat::Color => "color",
            LogFormat::Json => "json",
        };
        f.write_str(s)
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Service name attached to spans
    pub service_name: String,

    /// When false the metric registry never creates instruments
    pub enable_metric_collection: bool,

    /// When false the tracer hands out disabled spans
    pub enable_trace_collection: bool,

    /// Queue depth for fire-and-forget metric delivery
    pub detached_queue_capacity: usize,

    /// Log output format
    pub log_format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "metered-io".to_string(),
            enable_metric_collection: true,
            enable_trace_collection: true,
            detached_queue_capacity: 1024,
            log_format: LogFormat::default(),
        }
    }
}

impl TelemetryConfig {
    /// Load from the process environment, falling back to defaults
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let service_name = match lookup(ENV_SERVICE_NAME) {
            Some(name) if name.trim().is_empty() => {
                return Err(ConfigError::MissingEnv(ENV_SERVICE_NAME.to_string()))
            }
            Some(name) => name,
            None => defaults.service_name,
        };

        let enable_metric_collection = match lookup(ENV_ENABLE_METRIC_COLLECTION) {
            Some(v) => parse_bool(ENV_ENABLE_METRIC_COLLECTION, &v)?,
            None => defaults.enable_metric_collection,
        };

        let enable_trace_collection = match lookup(ENV_ENABLE_TRACE_COLLECTION) {
            Some(v) => parse_bool(ENV_ENABLE_TRACE_COLLECTION, &v)?,
            None => defaults.enable_trace_collection,
        };

        let detached_queue_capacity = match lookup(ENV_DETACHED_QUEUE_CAPACITY) {
            Some(v) => parse_capacity(ENV_DETACHED_QUEUE_CAPACITY, &v)?,
            None => defaults.detached_queue_capacity,
        };

        let log_format = match lookup(ENV_LOG_FORMAT) {
            Some(v) => v.parse().map_err(|reason| ConfigError::InvalidEnv {
                key: ENV_LOG_FORMAT.to_string(),
                value: v.clone(),
                reason,
            })?,
            None => defaults.log_format,
        };

        Ok(Self {
            service_name,
            enable_metric_collection,
            enable_trace_collection,
            detached_queue_capacity,
            log_format,
        })
    }

    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    pub fn with_metric_collection(mut self, enabled: bool) -> Self {
        self.enable_metric_collection = enabled;
        self
    }

    pub fn with_trace_collection(mut self, enabled: bool) -> Self {
        self.enable_trace_collection = enabled;
        self
    }

    pub fn with_detached_queue_capacity(mut self, capacity: usize) -> Self {
        self.detached_queue_capacity = capacity;
        self
    }

    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }
}

fn parse_bool(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

fn parse_capacity(key: &str, value: &str) -> ConfigResult<usize> {
    let invalid = |reason: &str| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let capacity: usize = value
        .trim()
        .parse()
        .map_err(|_| invalid("expected a positive integer"))?;

    if capacity == 0 {
        return Err(invalid("capacity must be greater than zero"));
    }

    Ok(capacity)
}

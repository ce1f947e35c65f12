// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::batch::{DEFAULT_MAX_BYTES, DEFAULT_MAX_COUNT};
use crate::errors::ConfigError;
use crate::intake_server::IntakeServerConfig;
use crate::pipeline::{PipelineConfig, DEFAULT_FLUSH_INTERVAL, DEFAULT_QUEUE_CAPACITY};
use crate::sink::SinkMode;

pub const ENV_PREFIX: &str = "LOKI_FWD_";

const DEFAULT_PRODUCERS: usize = 5;
const DEFAULT_INTAKE_HOST: &str = "0.0.0.0";
const DEFAULT_INTAKE_PORT: u16 = 9514;
const DEFAULT_ROUTING_KEY: &str = "udp";
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Settings for the whole forwarder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwarderConfig {
    /// Full URL of the Loki push endpoint, e.g. `http://loki:3100/loki/api/v1/push`
    pub push_url: String,
    pub sink_mode: SinkMode,
    pub batch_max_count: usize,
    /// Uncompressed, unserialized bytes per batch
    pub batch_max_bytes: usize,
    pub flush_interval: Duration,
    pub queue_capacity: usize,
    /// Number of intake tasks pushing into the pipeline
    pub producers: usize,
    pub intake_host: String,
    pub intake_port: u16,
    pub routing_key: String,
    /// One of trace, debug, info, warn, error
    pub log_level: String,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            push_url: String::new(),
            sink_mode: SinkMode::Text,
            batch_max_count: DEFAULT_MAX_COUNT,
            batch_max_bytes: DEFAULT_MAX_BYTES,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            producers: DEFAULT_PRODUCERS,
            intake_host: DEFAULT_INTAKE_HOST.to_string(),
            intake_port: DEFAULT_INTAKE_PORT,
            routing_key: DEFAULT_ROUTING_KEY.to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl ForwarderConfig {
    /// Create configuration from `LOKI_FWD_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Create configuration from any variable source. `lookup` receives the
    /// full variable name, prefix included.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            lookup(&format!("{ENV_PREFIX}{suffix}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let config = Self {
            push_url: var("PUSH_URL").ok_or(ConfigError::Missing("LOKI_FWD_PUSH_URL"))?,
            sink_mode: parse_or("LOKI_FWD_SINK_MODE", var("SINK_MODE"), defaults.sink_mode)?,
            batch_max_count: parse_or(
                "LOKI_FWD_BATCH_MAX_COUNT",
                var("BATCH_MAX_COUNT"),
                defaults.batch_max_count,
            )?,
            batch_max_bytes: parse_or(
                "LOKI_FWD_BATCH_MAX_BYTES",
                var("BATCH_MAX_BYTES"),
                defaults.batch_max_bytes,
            )?,
            flush_interval: Duration::from_secs(parse_or(
                "LOKI_FWD_FLUSH_INTERVAL_SECS",
                var("FLUSH_INTERVAL_SECS"),
                defaults.flush_interval.as_secs(),
            )?),
            queue_capacity: parse_or(
                "LOKI_FWD_QUEUE_CAPACITY",
                var("QUEUE_CAPACITY"),
                defaults.queue_capacity,
            )?,
            producers: parse_or("LOKI_FWD_PRODUCERS", var("PRODUCERS"), defaults.producers)?,
            intake_host: var("INTAKE_HOST").unwrap_or(defaults.intake_host),
            intake_port: parse_or(
                "LOKI_FWD_INTAKE_PORT",
                var("INTAKE_PORT"),
                defaults.intake_port,
            )?,
            routing_key: var("ROUTING_KEY").unwrap_or(defaults.routing_key),
            log_level: var("LOG_LEVEL")
                .map(|level| level.to_lowercase())
                .unwrap_or(defaults.log_level),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.push_url.trim().is_empty() {
            return Err(ConfigError::Missing("LOKI_FWD_PUSH_URL"));
        }
        if !self.push_url.starts_with("http://") && !self.push_url.starts_with("https://") {
            return Err(ConfigError::invalid(
                "LOKI_FWD_PUSH_URL",
                &self.push_url,
                "must be an http(s) URL",
            ));
        }

        for (name, value) in [
            ("LOKI_FWD_BATCH_MAX_COUNT", self.batch_max_count),
            ("LOKI_FWD_BATCH_MAX_BYTES", self.batch_max_bytes),
            ("LOKI_FWD_QUEUE_CAPACITY", self.queue_capacity),
            ("LOKI_FWD_PRODUCERS", self.producers),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid(name, value, "must be greater than 0"));
            }
        }
        if self.flush_interval.is_zero() {
            return Err(ConfigError::invalid(
                "LOKI_FWD_FLUSH_INTERVAL_SECS",
                0,
                "must be greater than 0",
            ));
        }
        if self.intake_port == 0 {
            return Err(ConfigError::invalid(
                "LOKI_FWD_INTAKE_PORT",
                0,
                "must be greater than 0",
            ));
        }
        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::invalid(
                "LOKI_FWD_LOG_LEVEL",
                &self.log_level,
                "must be one of: trace, debug, info, warn, error",
            ));
        }

        Ok(())
    }

    #[must_use]
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            max_count: self.batch_max_count,
            max_bytes: self.batch_max_bytes,
            flush_interval: self.flush_interval,
            queue_capacity: self.queue_capacity,
        }
    }

    #[must_use]
    pub fn intake_server_config(&self) -> IntakeServerConfig {
        IntakeServerConfig {
            host: self.intake_host.clone(),
            port: self.intake_port,
            producers: self.producers,
            routing_key: self.routing_key.clone(),
        }
    }
}

fn parse_or<T>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    match value {
        Some(value) => value
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(name, &value, e)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    fn valid() -> ForwarderConfig {
        ForwarderConfig {
            push_url: "http://localhost:3100/loki/api/v1/push".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = ForwarderConfig::from_lookup(lookup(&[(
            "LOKI_FWD_PUSH_URL",
            "http://localhost:3100/loki/api/v1/push",
        )]))
        .expect("config should load");

        assert_eq!(config, valid());
        assert_eq!(config.batch_max_count, 10_000);
        assert_eq!(config.batch_max_bytes, 2_147_483_647);
        assert_eq!(config.flush_interval, Duration::from_secs(60));
        assert_eq!(config.queue_capacity, 1000);
        assert_eq!(config.sink_mode, SinkMode::Text);
    }

    #[test]
    fn test_overrides() {
        let config = ForwarderConfig::from_lookup(lookup(&[
            ("LOKI_FWD_PUSH_URL", "https://loki.example.com/loki/api/v1/push"),
            ("LOKI_FWD_SINK_MODE", "proto"),
            ("LOKI_FWD_BATCH_MAX_COUNT", "500"),
            ("LOKI_FWD_BATCH_MAX_BYTES", "1048576"),
            ("LOKI_FWD_FLUSH_INTERVAL_SECS", "5"),
            ("LOKI_FWD_QUEUE_CAPACITY", "64"),
            ("LOKI_FWD_PRODUCERS", "2"),
            ("LOKI_FWD_INTAKE_HOST", "127.0.0.1"),
            ("LOKI_FWD_INTAKE_PORT", "10514"),
            ("LOKI_FWD_ROUTING_KEY", "events"),
            ("LOKI_FWD_LOG_LEVEL", "DEBUG"),
        ]))
        .expect("config should load");

        assert_eq!(config.sink_mode, SinkMode::Binary);
        assert_eq!(
            config.pipeline_config(),
            PipelineConfig {
                max_count: 500,
                max_bytes: 1_048_576,
                flush_interval: Duration::from_secs(5),
                queue_capacity: 64,
            }
        );
        let intake = config.intake_server_config();
        assert_eq!(intake.host, "127.0.0.1");
        assert_eq!(intake.port, 10514);
        assert_eq!(intake.producers, 2);
        assert_eq!(intake.routing_key, "events");
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_missing_push_url() {
        assert_eq!(
            ForwarderConfig::from_lookup(lookup(&[])),
            Err(ConfigError::Missing("LOKI_FWD_PUSH_URL"))
        );
        assert_eq!(
            ForwarderConfig::from_lookup(lookup(&[("LOKI_FWD_PUSH_URL", "   ")])),
            Err(ConfigError::Missing("LOKI_FWD_PUSH_URL"))
        );
    }

    #[test]
    fn test_invalid_values() {
        let cases = [
            ("LOKI_FWD_SINK_MODE", "grpc"),
            ("LOKI_FWD_BATCH_MAX_COUNT", "lots"),
            ("LOKI_FWD_BATCH_MAX_COUNT", "-1"),
            ("LOKI_FWD_BATCH_MAX_COUNT", "0"),
            ("LOKI_FWD_BATCH_MAX_BYTES", "0"),
            ("LOKI_FWD_FLUSH_INTERVAL_SECS", "0"),
            ("LOKI_FWD_QUEUE_CAPACITY", "0"),
            ("LOKI_FWD_PRODUCERS", "0"),
            ("LOKI_FWD_INTAKE_PORT", "0"),
            ("LOKI_FWD_INTAKE_PORT", "70000"),
            ("LOKI_FWD_LOG_LEVEL", "verbose"),
        ];
        for (name, value) in cases {
            let result = ForwarderConfig::from_lookup(lookup(&[
                ("LOKI_FWD_PUSH_URL", "http://localhost:3100/loki/api/v1/push"),
                (name, value),
            ]));
            assert!(
                matches!(result, Err(ConfigError::Invalid { .. })),
                "{name}={value} should be rejected, got {result:?}"
            );
        }
    }

    #[test]
    fn test_validate_push_url_scheme() {
        let config = ForwarderConfig {
            push_url: "loki:3100".to_string(),
            ..valid()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_log_levels() {
        for level in VALID_LOG_LEVELS {
            let config = ForwarderConfig {
                log_level: level.to_string(),
                ..valid()
            };
            assert!(config.validate().is_ok(), "{level} should be valid");
        }
    }
}

//! Configuration file management for tls-checker.
//!
//! This module handles loading, parsing, and merging configuration from TOML files
//! and command-line arguments. Settings can be given in several places with clear
//! precedence rules.
//!
//! # Configuration Precedence
//!
//! 1. Default values (lowest priority)
//! 2. Configuration file (tls-checker.toml or specified with --config)
//! 3. Command-line arguments (highest priority)
//!
//! # Example Configuration File
//!
//! ```toml
//! targets = ["example.com", "mx.example.com", "ldap.example.com:389:ldap"]
//! output = "summary"
//! exit_code = 2
//! tlsa = true
//!
//! [timeouts]
//! connect = 30
//! read = 10
//!
//! [prometheus]
//! enabled = true
//! address = "http://localhost:9091"
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;

use crate::fetcher::{FetchOptions, DEFAULT_CONNECT_TIMEOUT};
use crate::socket::DEFAULT_READ_TIMEOUT;
use crate::CheckOptions;

/// Main configuration structure.
///
/// All fields are optional to support partial configuration and merging.
/// Missing values will be filled in by defaults or overridden by CLI arguments.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// Targets to check, as `host[:port[:mode]]`
    pub targets: Option<Vec<String>>,
    /// Output format: json, text, summary
    pub output: Option<String>,
    /// Exit code to use when any result is critical
    pub exit_code: Option<i32>,
    /// Look up and match TLSA records
    pub tlsa: Option<bool>,
    /// Network timeouts
    pub timeouts: Option<TimeoutConfig>,
    /// Prometheus configuration
    pub prometheus: Option<PrometheusConfig>,
}

/// Network timeouts, in seconds.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TimeoutConfig {
    /// Time allowed to establish the TCP connection
    pub connect: Option<u64>,
    /// Time allowed for each read while negotiating
    pub read: Option<u64>,
}

/// Prometheus integration configuration.
///
/// Controls whether metrics are pushed to a Prometheus Push Gateway
/// and specifies the gateway address.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PrometheusConfig {
    /// Enable prometheus metrics pushing
    pub enabled: Option<bool>,
    /// Prometheus push gateway address (e.g., "http://localhost:9091")
    pub address: Option<String>,
}

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OutputFormat {
    Json,
    Text,
    Summary,
}

impl Default for Config {
    /// # Default Values
    ///
    /// - `targets`: None (must be provided)
    /// - `output`: "summary"
    /// - `exit_code`: 2
    /// - `tlsa`: false
    /// - `timeouts`: 30s connect, 10s read
    /// - `prometheus.enabled`: false
    /// - `prometheus.address`: "http://localhost:9091"
    fn default() -> Self {
        Config {
            targets: None,
            output: Some("summary".to_string()),
            exit_code: Some(2),
            tlsa: Some(false),
            timeouts: Some(TimeoutConfig {
                connect: Some(DEFAULT_CONNECT_TIMEOUT.as_secs()),
                read: Some(DEFAULT_READ_TIMEOUT.as_secs()),
            }),
            prometheus: Some(PrometheusConfig {
                enabled: Some(false),
                address: Some("http://localhost:9091".to_string()),
            }),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully parsed configuration
    /// * `Err(ConfigError::Io)` - File could not be read
    /// * `Err(ConfigError::Parse)` - File contains invalid TOML
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use tls_checker::config::Config;
    /// let config = Config::from_file("tls-checker.toml")?;
    /// # Ok::<(), tls_checker::config::ConfigError>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(config)
    }

    /// Merges this configuration with another, prioritizing the other's values.
    ///
    /// For each field, if the `other` config has a value (Some), it overrides
    /// this config's value. If the `other` value is None, keeps the current value.
    ///
    /// # Example
    ///
    /// ```
    /// # use tls_checker::config::Config;
    /// let defaults = Config::default();
    /// let file_config = Config::from_file("tls-checker.toml").unwrap_or_default();
    /// let merged = defaults.merge_with(file_config);
    /// ```
    pub fn merge_with(mut self, other: Config) -> Self {
        if other.targets.is_some() {
            self.targets = other.targets;
        }
        if other.output.is_some() {
            self.output = other.output;
        }
        if other.exit_code.is_some() {
            self.exit_code = other.exit_code;
        }
        if other.tlsa.is_some() {
            self.tlsa = other.tlsa;
        }
        if let Some(other_timeouts) = other.timeouts {
            if let Some(ref mut self_timeouts) = self.timeouts {
                if other_timeouts.connect.is_some() {
                    self_timeouts.connect = other_timeouts.connect;
                }
                if other_timeouts.read.is_some() {
                    self_timeouts.read = other_timeouts.read;
                }
            } else {
                self.timeouts = Some(other_timeouts);
            }
        }
        if let Some(other_prom) = other.prometheus {
            if let Some(ref mut self_prom) = self.prometheus {
                if other_prom.enabled.is_some() {
                    self_prom.enabled = other_prom.enabled;
                }
                if other_prom.address.is_some() {
                    self_prom.address = other_prom.address;
                }
            } else {
                self.prometheus = Some(other_prom);
            }
        }
        self
    }

    /// Creates a Config from command-line arguments for merging.
    ///
    /// Only provided arguments (Some values) will override other
    /// configurations.
    #[allow(clippy::too_many_arguments)]
    pub fn from_cli_args(
        targets: Option<Vec<String>>,
        output: Option<String>,
        exit_code: Option<i32>,
        tlsa: Option<bool>,
        connect_timeout: Option<u64>,
        read_timeout: Option<u64>,
        prometheus: Option<bool>,
        prometheus_address: Option<String>,
    ) -> Self {
        Config {
            targets,
            output,
            exit_code,
            tlsa,
            timeouts: Some(TimeoutConfig {
                connect: connect_timeout,
                read: read_timeout,
            }),
            prometheus: Some(PrometheusConfig {
                enabled: prometheus,
                address: prometheus_address,
            }),
        }
    }

    /// Checks the merged configuration before a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.targets {
            Some(targets) if !targets.is_empty() => {}
            _ => return Err(ConfigError::Validation("no target to check".to_string())),
        }
        self.output_format()?;
        if let Some(timeouts) = &self.timeouts {
            if timeouts.connect == Some(0) || timeouts.read == Some(0) {
                return Err(ConfigError::Validation(
                    "timeouts must be at least one second".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn output_format(&self) -> Result<OutputFormat, ConfigError> {
        let output = self.output.as_deref().unwrap_or("summary");
        output
            .parse()
            .map_err(|_| ConfigError::Validation(format!("unknown output format '{output}'")))
    }

    /// Check settings derived from this configuration.
    pub fn check_options(&self) -> CheckOptions {
        let timeouts = self.timeouts.as_ref();
        let seconds = |value: Option<u64>, default: Duration| {
            value.map(Duration::from_secs).unwrap_or(default)
        };

        CheckOptions {
            fetch: FetchOptions {
                connect_timeout: seconds(
                    timeouts.and_then(|t| t.connect),
                    DEFAULT_CONNECT_TIMEOUT,
                ),
                read_timeout: seconds(timeouts.and_then(|t| t.read), DEFAULT_READ_TIMEOUT),
                ehlo_name: None,
            },
            tlsa: self.tlsa.unwrap_or(false),
        }
    }

    /// Push gateway address, when pushing is enabled.
    pub fn prometheus_address(&self) -> Option<&str> {
        let prometheus = self.prometheus.as_ref()?;
        if prometheus.enabled == Some(true) {
            prometheus.address.as_deref()
        } else {
            None
        }
    }

    /// Generates an example configuration file in TOML format.
    ///
    /// # Example
    ///
    /// ```
    /// # use tls_checker::config::Config;
    /// let example = Config::example_toml();
    /// assert!(example.contains("targets"));
    /// ```
    pub fn example_toml() -> String {
        let example = Config {
            targets: Some(vec![
                "example.com".to_string(),
                "mx.example.com".to_string(),
                "imap.example.com:143:imap".to_string(),
                "ldap.example.com:389:ldap".to_string(),
                "[2001:db8::1]:443".to_string(),
            ]),
            output: Some("summary".to_string()),
            exit_code: Some(2),
            tlsa: Some(true),
            timeouts: Some(TimeoutConfig {
                connect: Some(30),
                read: Some(10),
            }),
            prometheus: Some(PrometheusConfig {
                enabled: Some(true),
                address: Some("http://localhost:9091".to_string()),
            }),
        };

        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| "# Error generating example".to_string())
    }
}

/// Errors that can occur during configuration loading and parsing.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("IO Error: {0}")]
    Io(String),
    /// TOML parsing error (invalid syntax, type mismatch, etc.)
    #[error("Parse Error: {0}")]
    Parse(String),
    /// Validation error (missing required fields, invalid values, etc.)
    #[error("Validation Error: {0}")]
    Validation(String),
}

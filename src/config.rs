//! Configuration management for eventhook
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to layer defaults, an `eventhook.toml` file, environment variables
//! and command-line arguments.
//!
//! `Config` is the raw, user-facing shape. The reporter consumes the
//! validated [`ReporterSettings`] built from it once at startup.

use crate::cli::Cli;
use crate::filter::Subscription;
use anyhow::Result;
use chrono::format::{Item, StrftimeItems};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use sysinfo::System;
use thiserror::Error;
use url::Url;

/// Renders `YYMMDD/HHmmss.SSS`.
pub const DEFAULT_TIME_FORMAT: &str = "%y%m%d/%H%M%S%.3f";

const DEFAULT_CONFIG_FILE: &str = "eventhook.toml";

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Webhook target and message rendering options.
    pub reporter: ReporterConfig,
    /// Which event kinds and tags are forwarded. Empty forwards everything.
    #[serde(default)]
    pub events: BTreeMap<String, Subscription>,
    /// Configuration for the Prometheus metrics endpoint.
    pub metrics: MetricsConfig,
    /// Queueing and shutdown settings.
    pub performance: PerformanceConfig,
}

/// Webhook target and message rendering options.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ReporterConfig {
    /// The incoming webhook URL. Required.
    pub url: Option<String>,
    /// Static fields merged into every payload (channel, username, ...).
    #[serde(default)]
    pub slack: Map<String, Value>,
    /// strftime pattern used for the timestamp in the pretext.
    pub format: String,
    /// Origin label shown in the pretext. Defaults to the local hostname.
    pub host: Option<String>,
    /// Send generic log events as bare `{ text }` messages.
    #[serde(default)]
    pub basic: bool,
    /// Per-request timeout applied by the HTTP transport.
    pub timeout_seconds: Option<u64>,
}

/// Configuration for the Prometheus metrics endpoint.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen_address: SocketAddr,
}

/// Queueing and shutdown settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PerformanceConfig {
    /// Capacity of the channel between the event source and the reporter.
    pub queue_capacity: usize,
    /// How long to wait for in-flight deliveries when the reporter stops.
    pub drain_timeout_seconds: u64,
}

impl Config {
    /// Loads the application configuration.
    ///
    /// Sources are layered in increasing precedence: built-in defaults, the
    /// TOML file (`--config` or `eventhook.toml`), `EVENTHOOK_*` environment
    /// variables (nested keys separated by `__`), then CLI arguments.
    pub fn load(cli: &Cli) -> Result<Self> {
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            // e.g. EVENTHOOK_REPORTER__URL=https://hooks.slack.com/services/...
            .merge(Env::prefixed("EVENTHOOK_").split("__"))
            .merge(cli)
            .extract()?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            reporter: ReporterConfig {
                url: None,
                slack: Map::new(),
                format: DEFAULT_TIME_FORMAT.to_string(),
                host: None,
                basic: false,
                timeout_seconds: Some(10),
            },
            events: BTreeMap::new(),
            metrics: MetricsConfig {
                enabled: false,
                listen_address: SocketAddr::from(([127, 0, 0, 1], 9090)),
            },
            performance: PerformanceConfig {
                queue_capacity: 1024,
                drain_timeout_seconds: 5,
            },
        }
    }
}

/// Errors detected while validating the reporter configuration.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("url must be a non-empty string")]
    MissingUrl,

    #[error("invalid webhook url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("webhook url must use http or https, got `{0}`")]
    UnsupportedScheme(String),

    #[error("invalid time format `{0}`")]
    InvalidTimeFormat(String),
}

/// Validated, immutable reporter settings.
///
/// Built once through [`ReporterSettings::from_config`] and shared behind an
/// `Arc`; nothing mutates it afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ReporterSettings {
    target_url: String,
    static_payload: Map<String, Value>,
    time_format: String,
    origin_label: String,
    basic_mode: bool,
}

impl ReporterSettings {
    /// Validates the raw configuration and fills in defaults.
    pub fn from_config(config: &ReporterConfig) -> Result<Self, ConfigError> {
        let target_url = match config.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => return Err(ConfigError::MissingUrl),
        };

        let parsed = Url::parse(&target_url).map_err(|source| ConfigError::InvalidUrl {
            url: target_url.clone(),
            source,
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ConfigError::UnsupportedScheme(parsed.scheme().to_string()));
        }

        if config.format.is_empty()
            || StrftimeItems::new(&config.format).any(|item| matches!(item, Item::Error))
        {
            return Err(ConfigError::InvalidTimeFormat(config.format.clone()));
        }

        let origin_label = config
            .host
            .clone()
            .filter(|host| !host.is_empty())
            .unwrap_or_else(|| local_hostname().to_string());

        Ok(Self {
            target_url,
            static_payload: config.slack.clone(),
            time_format: config.format.clone(),
            origin_label,
            basic_mode: config.basic,
        })
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    pub fn static_payload(&self) -> &Map<String, Value> {
        &self.static_payload
    }

    pub fn time_format(&self) -> &str {
        &self.time_format
    }

    pub fn origin_label(&self) -> &str {
        &self.origin_label
    }

    pub fn basic_mode(&self) -> bool {
        self.basic_mode
    }
}

impl ReporterConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }
}

/// The local hostname, resolved once per process.
pub fn local_hostname() -> &'static str {
    static HOSTNAME: OnceLock<String> = OnceLock::new();
    HOSTNAME.get_or_init(|| System::host_name().unwrap_or_else(|| "localhost".to_string()))
}

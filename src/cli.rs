//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged with
//! the configuration from the `eventhook.toml` file and environment variables.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Formats structured process events read from stdin and forwards each one
/// to a Slack-style incoming webhook.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Incoming webhook URL.
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// strftime pattern for the timestamp in each message.
    #[arg(long, value_name = "PATTERN")]
    pub format: Option<String>,

    /// Origin label shown in each message (defaults to the hostname).
    #[arg(long, value_name = "NAME")]
    pub host: Option<String>,

    /// Send generic log events as plain text messages.
    #[arg(long)]
    pub basic: bool,

    /// Logging level (trace, debug, info, warn, error).
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();
        let mut reporter = Dict::new();

        if let Some(url) = &self.url {
            reporter.insert("url".into(), Value::from(url.clone()));
        }

        if let Some(format) = &self.format {
            reporter.insert("format".into(), Value::from(format.clone()));
        }

        if let Some(host) = &self.host {
            reporter.insert("host".into(), Value::from(host.clone()));
        }

        // Only a present flag overrides; its absence leaves file/env values alone.
        if self.basic {
            reporter.insert("basic".into(), Value::from(true));
        }

        if !reporter.is_empty() {
            dict.insert("reporter".into(), Value::from(reporter));
        }

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}

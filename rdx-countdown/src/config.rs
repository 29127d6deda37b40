//! Configuration for the countdown engine and its binaries.
//!
//! Settings are layered with the `config` crate: serde defaults, then an
//! optional TOML file, then `COUNTDOWN_*` environment variables.

use anyhow::{bail, Context, Result};
use chrono_tz::Tz;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Prefix for environment overrides, e.g. `COUNTDOWN_TICK_INTERVAL_MS=500`.
pub const ENV_PREFIX: &str = "COUNTDOWN";

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// The top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CountdownConfig {
    /// Milliseconds between clock ticks. Only affects display smoothness.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// IANA zone used for calendar stepping and for offset-less start times.
    #[serde(default = "default_timezone")]
    pub timezone: Tz,

    /// Events registered when a binary starts.
    #[serde(default)]
    pub events: Vec<EventConfig>,
}

/// An event listed in the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct EventConfig {
    pub name: String,
    /// ISO-8601 start time. Missing or unparsable values display as "N/A".
    #[serde(default)]
    pub starts_at: Option<String>,
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

fn default_timezone() -> Tz {
    Tz::UTC
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            timezone: default_timezone(),
            events: Vec::new(),
        }
    }
}

impl CountdownConfig {
    /// Loads the configuration from an optional TOML file plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }
        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let config: Self = builder
            .build()
            .context("failed to read countdown configuration")?
            .try_deserialize()
            .context("invalid countdown configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML document without consulting the environment.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()
            .context("failed to parse countdown configuration")?
            .try_deserialize()
            .context("invalid countdown configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            bail!("tick_interval_ms must be greater than zero");
        }
        if let Some(position) = self.events.iter().position(|event| event.name.trim().is_empty()) {
            bail!("event #{} has an empty name", position);
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

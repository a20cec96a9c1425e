//! Client settings and their loader.
//!
//! ## Loading Strategy
//! 1. Environment variables, when `BREAKWATER_TIMEOUT_MS` is set
//! 2. Otherwise the first of `./breakwater.toml`, `./breakwater.json`
//! 3. Otherwise [`ClientSettings::default`]
//!
//! ## Environment Variables
//! - `BREAKWATER_TIMEOUT_MS`: per-attempt timeout in milliseconds (required)
//! - `BREAKWATER_MAX_RETRIES`: retries after the first attempt
//! - `BREAKWATER_BACKOFF_INTERVAL_MS`: constant backoff interval
//! - `BREAKWATER_BACKOFF_JITTER_MS`: maximum random extra wait
//!
//! ## File Format
//! ```toml
//! timeout = 100
//!
//! [retry]
//! max_retries = 2
//! backoff = { kind = "constant", interval = 10, jitter = 5 }
//!
//! [commands.MyCommand]
//! timeout = 1100
//! max_concurrent_requests = 100
//! error_percent_threshold = 25
//! sleep_window = 10
//! request_volume_threshold = 10
//! ```
//! All durations are integer milliseconds.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use breakwater_common::resilience::{
    BackoffStrategy, CircuitBreakerConfig, ConfigError, RetryPolicy,
};
use breakwater_common::{duration_millis, optional_duration_millis};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const ENV_TIMEOUT: &str = "BREAKWATER_TIMEOUT_MS";
const ENV_MAX_RETRIES: &str = "BREAKWATER_MAX_RETRIES";
const ENV_BACKOFF_INTERVAL: &str = "BREAKWATER_BACKOFF_INTERVAL_MS";
const ENV_BACKOFF_JITTER: &str = "BREAKWATER_BACKOFF_JITTER_MS";

/// Errors raised while loading or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid {format} in {path}: {message}")]
    Parse { path: PathBuf, format: &'static str, message: String },

    #[error("environment variable {name}: {message}")]
    Env { name: &'static str, message: String },

    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

pub type SettingsResult<T> = Result<T, SettingsError>;

/// Settings for building clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Per-attempt timeout; `0` disables it.
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
    pub retry: RetrySettings,
    /// Breaker settings keyed by command name.
    pub commands: BTreeMap<String, CommandSettings>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetrySettings::default(),
            commands: BTreeMap::new(),
        }
    }
}

impl ClientSettings {
    /// Check every policy and breaker configuration these settings produce.
    pub fn validate(&self) -> SettingsResult<()> {
        self.retry_policy()?;
        for name in self.commands.keys() {
            self.breaker_config(name)?;
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy, ConfigError> {
        self.retry.to_policy()
    }

    /// Breaker configuration for `command`, defaults when it has no entry.
    pub fn breaker_config(&self, command: &str) -> Result<CircuitBreakerConfig, ConfigError> {
        let config = self.commands.get(command).cloned().unwrap_or_default().to_config();
        config.validate()?;
        Ok(config)
    }
}

/// Retry section.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub backoff: BackoffSettings,
    /// Limit on the whole retry sequence, waits included.
    #[serde(with = "optional_duration_millis")]
    pub max_total_time: Option<Duration>,
}

impl RetrySettings {
    pub fn to_policy(&self) -> Result<RetryPolicy, ConfigError> {
        let builder = RetryPolicy::builder()
            .max_retries(self.max_retries)
            .backoff(self.backoff.to_strategy());
        match self.max_total_time {
            Some(limit) => builder.max_total_time(limit).build(),
            None => builder.build(),
        }
    }
}

/// Backoff section, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffSettings {
    #[default]
    None,
    Constant {
        #[serde(with = "duration_millis")]
        interval: Duration,
        #[serde(default, with = "duration_millis")]
        jitter: Duration,
    },
    Exponential {
        #[serde(with = "duration_millis")]
        initial: Duration,
        #[serde(with = "duration_millis")]
        max: Duration,
        #[serde(default = "default_factor")]
        factor: f64,
        #[serde(default, with = "duration_millis")]
        jitter: Duration,
    },
}

fn default_factor() -> f64 {
    2.0
}

impl BackoffSettings {
    pub fn to_strategy(&self) -> BackoffStrategy {
        match self {
            Self::None => BackoffStrategy::None,
            Self::Constant { interval, jitter } => {
                BackoffStrategy::constant_with_jitter(*interval, *jitter)
            }
            Self::Exponential { initial, max, factor, jitter } => {
                BackoffStrategy::exponential_with(*initial, *max, *factor, *jitter)
            }
        }
    }
}

/// Breaker settings for one command, durations in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandSettings {
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
    pub max_concurrent_requests: usize,
    pub error_percent_threshold: u8,
    #[serde(with = "duration_millis")]
    pub sleep_window: Duration,
    pub request_volume_threshold: u64,
    #[serde(with = "duration_millis")]
    pub rolling_window: Duration,
    pub rolling_buckets: u32,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self::from(&CircuitBreakerConfig::default())
    }
}

impl From<&CircuitBreakerConfig> for CommandSettings {
    fn from(config: &CircuitBreakerConfig) -> Self {
        Self {
            timeout: config.timeout,
            max_concurrent_requests: config.max_concurrent_requests,
            error_percent_threshold: config.error_percent_threshold,
            sleep_window: config.sleep_window,
            request_volume_threshold: config.request_volume_threshold,
            rolling_window: config.rolling_window,
            rolling_buckets: config.rolling_buckets,
        }
    }
}

impl CommandSettings {
    pub fn to_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            timeout: self.timeout,
            max_concurrent_requests: self.max_concurrent_requests,
            error_percent_threshold: self.error_percent_threshold,
            sleep_window: self.sleep_window,
            request_volume_threshold: self.request_volume_threshold,
            rolling_window: self.rolling_window,
            rolling_buckets: self.rolling_buckets,
        }
    }
}

/// Load settings from the environment, then the standard files, then
/// defaults.
///
/// # Errors
/// Returns an error when a source is present but malformed; a missing
/// source only moves on to the next one.
pub fn load() -> SettingsResult<ClientSettings> {
    let cwd = std::env::current_dir().ok();
    load_from_sources(|name| std::env::var(name).ok(), cwd.as_deref())
}

fn load_from_sources(
    lookup: impl Fn(&str) -> Option<String>,
    dir: Option<&Path>,
) -> SettingsResult<ClientSettings> {
    if lookup(ENV_TIMEOUT).is_some() {
        let settings = settings_from_vars(lookup)?;
        tracing::info!("client settings loaded from environment variables");
        return Ok(settings);
    }

    match dir.and_then(probe_settings_in) {
        Some(path) => load_from_file(&path),
        None => {
            tracing::debug!("no settings file found, using defaults");
            Ok(ClientSettings::default())
        }
    }
}

/// Load settings from `BREAKWATER_*` environment variables.
///
/// # Errors
/// Returns `SettingsError::Env` if `BREAKWATER_TIMEOUT_MS` is missing or any
/// variable is not a non-negative integer.
pub fn load_from_env() -> SettingsResult<ClientSettings> {
    settings_from_vars(|name| std::env::var(name).ok())
}

/// Load settings from a TOML or JSON file, chosen by extension.
pub fn load_from_file(path: &Path) -> SettingsResult<ClientSettings> {
    tracing::info!(path = %path.display(), "loading client settings from file");

    let contents = std::fs::read_to_string(path)
        .map_err(|source| SettingsError::Io { path: path.to_path_buf(), source })?;

    let settings = parse_settings(&contents, path)?;
    settings.validate()?;
    Ok(settings)
}

/// First existing settings file in the working directory.
pub fn probe_settings_paths() -> Option<PathBuf> {
    probe_settings_in(&std::env::current_dir().ok()?)
}

fn probe_settings_in(dir: &Path) -> Option<PathBuf> {
    [dir.join("breakwater.toml"), dir.join("breakwater.json")]
        .into_iter()
        .find(|candidate| candidate.is_file())
}

fn parse_settings(contents: &str, path: &Path) -> SettingsResult<ClientSettings> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            format: "TOML",
            message: e.to_string(),
        }),
        "json" => serde_json::from_str(contents).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            format: "JSON",
            message: e.to_string(),
        }),
        other => Err(SettingsError::Parse {
            path: path.to_path_buf(),
            format: "settings",
            message: format!("unsupported extension '{other}'"),
        }),
    }
}

fn settings_from_vars(lookup: impl Fn(&str) -> Option<String>) -> SettingsResult<ClientSettings> {
    let millis = |name: &'static str| -> SettingsResult<Option<u64>> {
        lookup(name)
            .map(|raw| {
                raw.trim().parse::<u64>().map_err(|e| SettingsError::Env {
                    name,
                    message: format!("expected milliseconds, got '{raw}': {e}"),
                })
            })
            .transpose()
    };

    let timeout = millis(ENV_TIMEOUT)?
        .ok_or(SettingsError::Env { name: ENV_TIMEOUT, message: "not set".to_string() })?;

    let max_retries = lookup(ENV_MAX_RETRIES)
        .map(|raw| {
            raw.trim().parse::<u32>().map_err(|e| SettingsError::Env {
                name: ENV_MAX_RETRIES,
                message: format!("expected a retry count, got '{raw}': {e}"),
            })
        })
        .transpose()?
        .unwrap_or(0);

    let backoff = match (millis(ENV_BACKOFF_INTERVAL)?, millis(ENV_BACKOFF_JITTER)?) {
        (None, None) => BackoffSettings::None,
        (interval, jitter) => BackoffSettings::Constant {
            interval: Duration::from_millis(interval.unwrap_or(0)),
            jitter: Duration::from_millis(jitter.unwrap_or(0)),
        },
    };

    let settings = ClientSettings {
        timeout: Duration::from_millis(timeout),
        retry: RetrySettings { max_retries, backoff, max_total_time: None },
        commands: BTreeMap::new(),
    };
    settings.validate()?;
    Ok(settings)
}

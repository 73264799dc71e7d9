//! Configuration for rustible-aws
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values
//! - System configuration (/etc/rustible/aws.toml)
//! - User configuration (~/.rustible/aws.toml)
//! - Project configuration (./rustible-aws.toml)
//! - Environment variables
//!
//! Module and lookup parameters always win over anything configured here.

use crate::aws::AwsConnectionInfo;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default connection settings
    pub aws: AwsConnectionInfo,

    /// Retry settings per service
    pub retry: RetrySettings,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Retry settings for each AWS service client.
///
/// Each table only overrides the fields it sets; the rest come from that
/// service's own defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Backoff for CloudFormation calls
    pub cloudformation: BackoffSettings,
    /// Backoff for RDS auth-token generation
    pub rds: BackoffSettings,
}

impl RetrySettings {
    /// Resolved backoff for CloudFormation calls.
    pub fn cloudformation(&self) -> Backoff {
        self.cloudformation.resolve(Backoff::CLOUDFORMATION)
    }

    /// Resolved backoff for RDS auth-token generation.
    pub fn rds(&self) -> Backoff {
        self.rds.resolve(Backoff::RDS)
    }

    /// Fields set here win; unset fields come from `base`.
    fn or(&self, base: &RetrySettings) -> RetrySettings {
        RetrySettings {
            cloudformation: self.cloudformation.or(&base.cloudformation),
            rds: self.rds.or(&base.rds),
        }
    }
}

/// Partial backoff table as written in a configuration file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    /// Retries after the first attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// Delay before the first retry, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_delay_secs: Option<u64>,
    /// Upper bound on any single delay, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_delay_secs: Option<u64>,
}

impl BackoffSettings {
    /// Fill unset fields from `defaults`.
    pub fn resolve(&self, defaults: Backoff) -> Backoff {
        Backoff {
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            initial_delay_secs: self.initial_delay_secs.unwrap_or(defaults.initial_delay_secs),
            max_delay_secs: self.max_delay_secs.unwrap_or(defaults.max_delay_secs),
        }
    }

    fn or(&self, base: &BackoffSettings) -> BackoffSettings {
        BackoffSettings {
            max_retries: self.max_retries.or(base.max_retries),
            initial_delay_secs: self.initial_delay_secs.or(base.initial_delay_secs),
            max_delay_secs: self.max_delay_secs.or(base.max_delay_secs),
        }
    }
}

/// Jittered exponential backoff bounds for one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub max_retries: u32,
    pub initial_delay_secs: u64,
    pub max_delay_secs: u64,
}

impl Backoff {
    /// CloudFormation: 10 retries, 3s initial delay, 30s cap.
    pub const CLOUDFORMATION: Backoff = Backoff {
        max_retries: 10,
        initial_delay_secs: 3,
        max_delay_secs: 30,
    };

    /// RDS: 10 retries, 3s initial delay, 60s cap.
    pub const RDS: Backoff = Backoff {
        max_retries: 10,
        initial_delay_secs: 3,
        max_delay_secs: 60,
    };

    /// Build the retry policy these bounds describe.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::jittered_backoff(
            self.max_retries,
            Duration::from_secs(self.initial_delay_secs),
            Duration::from_secs(self.max_delay_secs),
        )
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// JSON lines
    Json,
}

/// Logging settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when neither `-v` nor `RUST_LOG` is given
    pub level: Option<String>,

    /// Output format; text when unset
    pub format: Option<LogFormat>,
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = Config::default();

        let (paths, explicit) = Self::get_config_paths(config_path);
        for path in paths {
            if path.exists() {
                config = config.merge(Self::read_file(&path)?);
            } else if explicit {
                return Err(Error::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
        }

        config.apply_env_overrides()?;

        Ok(config)
    }

    /// Get the list of configuration file paths to check.
    ///
    /// The flag is set when the path was named by `-c` or
    /// `RUSTIBLE_AWS_CONFIG`, in which case it must exist.
    fn get_config_paths(explicit_path: Option<&Path>) -> (Vec<PathBuf>, bool) {
        // Explicit path takes priority
        if let Some(path) = explicit_path {
            return (vec![path.to_path_buf()], true);
        }

        if let Ok(env_config) = std::env::var("RUSTIBLE_AWS_CONFIG") {
            return (vec![PathBuf::from(env_config)], true);
        }

        let mut paths = vec![PathBuf::from("/etc/rustible/aws.toml")];

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".rustible/aws.toml"));
        }

        paths.push(PathBuf::from("rustible-aws.toml"));

        (paths, false)
    }

    /// Parse a single configuration file
    pub fn read_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let parsed: Config = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            "toml" => toml::from_str(&content)?,
            _ => toml::from_str(&content)
                .or_else(|_| serde_yaml::from_str(&content))
                .map_err(|e| {
                    Error::Config(format!("failed to parse {}: {}", path.display(), e))
                })?,
        };

        Ok(parsed)
    }

    /// Merge another config into this one
    fn merge(&self, other: Config) -> Config {
        Config {
            aws: other.aws.or(&self.aws),
            retry: other.retry.or(&self.retry),
            logging: LoggingConfig {
                level: other.logging.level.or_else(|| self.logging.level.clone()),
                format: other.logging.format.or(self.logging.format),
            },
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(region) = std::env::var("RUSTIBLE_AWS_REGION") {
            self.aws.region = Some(region);
        }

        if let Ok(profile) = std::env::var("RUSTIBLE_AWS_PROFILE") {
            self.aws.profile = Some(profile);
        }

        if let Ok(endpoint) = std::env::var("RUSTIBLE_AWS_ENDPOINT_URL") {
            self.aws.endpoint_url = Some(endpoint);
        }

        if let Ok(retries) = std::env::var("RUSTIBLE_AWS_MAX_RETRIES") {
            let retries: u32 = retries.parse().map_err(|_| {
                Error::Config(format!(
                    "RUSTIBLE_AWS_MAX_RETRIES must be a non-negative integer, got '{}'",
                    retries
                ))
            })?;
            self.retry.cloudformation.max_retries = Some(retries);
            self.retry.rds.max_retries = Some(retries);
        }

        if let Ok(level) = std::env::var("RUSTIBLE_LOG_LEVEL") {
            self.logging.level = Some(level);
        }

        if let Ok(format) = std::env::var("RUSTIBLE_LOG_FORMAT") {
            self.logging.format = match format.to_lowercase().as_str() {
                "json" => Some(LogFormat::Json),
                "text" => Some(LogFormat::Text),
                other => {
                    return Err(Error::Config(format!(
                        "RUSTIBLE_LOG_FORMAT must be 'text' or 'json', got '{}'",
                        other
                    )))
                }
            };
        }

        Ok(())
    }
}

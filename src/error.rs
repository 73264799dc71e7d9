//! Error types for rustible-aws.
//!
//! Each layer keeps its own error enum ([`AwsError`](crate::aws::AwsError),
//! [`ModuleError`](crate::modules::ModuleError),
//! [`LookupError`](crate::lookup::LookupError)); this type covers loading
//! the configuration the CLI starts from.

use thiserror::Error;

/// Result type alias for rustible-aws operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for rustible-aws.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl Error {
    /// Get the process exit code for this error.
    ///
    /// Every variant is a setup problem, reported as a usage error.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

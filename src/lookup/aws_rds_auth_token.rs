//! RDS IAM auth token lookup.
//!
//! Generates a short-lived token that authenticates a database connection
//! in place of a static password.
//!
//! # Options
//!
//! - `hostname` (required): database endpoint
//! - `username` (required): database user
//! - `port` (default `5432`): database port
//! - connection options: `region`, `profile`, `aws_access_key_id`,
//!   `aws_secret_access_key`, `session_token`, `endpoint_url` and aliases
//!
//! ```yaml
//! - set_fact:
//!     db_password: "{{ lookup('aws_rds_auth_token', 'hostname=db.internal', 'username=app') }}"
//! ```

use super::{Lookup, LookupContext, LookupError, LookupResult};
use crate::aws::{is_connection_option, AwsConnectionInfo, RdsAuthApi};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

/// Port used when the `port` option is omitted.
pub const DEFAULT_PORT: u16 = 5432;

/// Validated options of an auth token request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthTokenRequest {
    pub hostname: String,
    pub username: String,
    pub port: u16,
    pub connection: AwsConnectionInfo,
}

impl AuthTokenRequest {
    pub fn new(hostname: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            username: username.into(),
            port: DEFAULT_PORT,
            connection: AwsConnectionInfo::default(),
        }
    }

    /// Validate parsed lookup options.
    ///
    /// Connection fields missing from `options` are taken from `defaults`.
    pub fn from_options(
        options: &HashMap<String, String>,
        defaults: &AwsConnectionInfo,
    ) -> LookupResult<Self> {
        let mut unsupported: Vec<&str> = options
            .keys()
            .map(|k| k.as_str())
            .filter(|k| !matches!(*k, "hostname" | "username" | "port") && !is_connection_option(k))
            .collect();
        if !unsupported.is_empty() {
            unsupported.sort_unstable();
            return Err(LookupError::InvalidArguments(format!(
                "unsupported options: {}",
                unsupported.join(", ")
            )));
        }

        let required = |key: &str| -> LookupResult<String> {
            options
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| LookupError::MissingArgument(key.to_string()))
        };

        let hostname = required("hostname")?;
        let username = required("username")?;

        let port = match options.get("port") {
            None => DEFAULT_PORT,
            Some(raw) => match raw.trim().parse::<u16>() {
                Ok(port) if port > 0 => port,
                _ => {
                    return Err(LookupError::InvalidArguments(format!(
                        "port must be an integer between 1 and 65535, got '{}'",
                        raw
                    )))
                }
            },
        };

        Ok(Self {
            hostname,
            username,
            port,
            connection: AwsConnectionInfo::from_options(|name| options.get(name).cloned())
                .or(defaults),
        })
    }
}

/// Request one token and return it as a single-element list.
///
/// Backend errors are returned unmodified once the client's own retries are
/// exhausted.
pub async fn fetch(client: &dyn RdsAuthApi, request: &AuthTokenRequest) -> LookupResult<Vec<String>> {
    let token = client
        .generate_db_auth_token(&request.hostname, request.port, &request.username)
        .await?;
    Ok(vec![token])
}

/// Lookup that generates RDS IAM auth tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct AwsRdsAuthTokenLookup;

#[async_trait]
impl Lookup for AwsRdsAuthTokenLookup {
    fn name(&self) -> &'static str {
        "aws_rds_auth_token"
    }

    fn description(&self) -> &'static str {
        "Generate an AWS RDS IAM authentication token"
    }

    async fn lookup(&self, args: &[&str], context: &LookupContext) -> LookupResult<Vec<String>> {
        let options = self.parse_options(args);
        let request = AuthTokenRequest::from_options(&options, &context.connection_defaults)?;

        debug!(
            hostname = %request.hostname,
            port = request.port,
            username = %request.username,
            "Requesting RDS auth token"
        );

        let client = context
            .clients
            .rds(&request.connection)
            .await
            .map_err(LookupError::Configuration)?;

        fetch(client.as_ref(), &request).await
    }
}

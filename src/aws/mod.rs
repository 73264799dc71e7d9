//! AWS client plumbing shared by the modules and lookups.
//!
//! Modules and lookups never talk to the AWS SDK directly. They ask a
//! [`ClientFactory`] for a service capability ([`CloudFormationApi`],
//! [`RdsAuthApi`]) that is already wrapped in a retry policy. The default
//! factory, [`SdkClientFactory`], builds those capabilities from the official
//! AWS SDK for Rust.
//!
//! ## Authentication
//!
//! Credentials come from explicit parameters when given, otherwise from the
//! standard AWS credential chain:
//!
//! 1. Environment variables (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`)
//! 2. AWS credentials file (`~/.aws/credentials`), optionally via `profile`
//! 3. IAM instance profile / ECS task role
//!
//! The region can be specified via:
//! - Module or lookup parameter (`region`)
//! - Environment variable (`AWS_REGION` or `AWS_DEFAULT_REGION`)
//! - AWS config file (`~/.aws/config`)

pub mod cloudformation;
pub mod rds;

pub use cloudformation::{CloudFormationApi, SdkCloudFormationClient, StackDescription, StackOutput};
pub use rds::{RdsAuthApi, SdkRdsClient};

use crate::config::RetrySettings;
use crate::retry::{Retrying, TransientError};
use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_cloudformation::config::{Credentials, Region};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Message used when no region could be resolved from any source.
pub const MISSING_REGION_MSG: &str = "Region must be specified as a parameter, in AWS_REGION or \
     AWS_DEFAULT_REGION environment variable or in the AWS config file";

/// Error codes AWS services use for throttling and temporary unavailability.
const RETRYABLE_CODES: &[&str] = &[
    "RequestLimitExceeded",
    "Throttling",
    "ThrottlingException",
    "ThrottledException",
    "TooManyRequestsException",
    "RequestThrottled",
    "RequestThrottledException",
    "ProvisionedThroughputExceededException",
    "Unavailable",
    "ServiceUnavailable",
    "InternalFailure",
    "InternalError",
];

/// Errors raised while building clients or calling AWS.
#[derive(Error, Debug)]
pub enum AwsError {
    /// No region could be resolved.
    #[error("{}", MISSING_REGION_MSG)]
    MissingRegion,

    /// Client construction failed for any other reason.
    #[error("{message}")]
    Connection {
        /// Error message
        message: String,
        /// Source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The service answered without the payload it promised.
    #[error("an empty response was returned")]
    EmptyResponse,

    /// The service call itself failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl AwsError {
    /// Create a connection error without a source.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }
}

/// Result type for AWS operations
pub type AwsResult<T> = Result<T, AwsError>;

/// A failed service call, reduced to what the callers classify on.
#[derive(Debug)]
pub struct BackendError {
    /// Service error code (e.g. `ValidationError`), when the service sent one
    pub code: Option<String>,
    /// Human-readable error message
    pub message: String,
    /// Whether the request never got a response (dispatch failure, timeout)
    pub transport: bool,
    /// Underlying SDK error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BackendError {
    /// Create a service error with an error code.
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
            transport: false,
            source: None,
        }
    }

    /// Create an error for a request that never got a response.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            transport: true,
            source: None,
        }
    }

    /// Attach the underlying error.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Whether the backend reported that the named resource does not exist.
    ///
    /// CloudFormation reports a missing stack as a `ValidationError` whose
    /// message reads "Stack with id X does not exist"; the code is shared with
    /// real validation failures, so the message is what distinguishes them.
    pub fn is_not_found(&self) -> bool {
        self.message.contains("does not exist")
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{}: {}", code, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl TransientError for BackendError {
    fn is_transient(&self) -> bool {
        self.transport
            || self
                .code
                .as_deref()
                .is_some_and(|code| RETRYABLE_CODES.contains(&code))
    }
}

/// Connection option names and the aliases accepted for each.
pub const CONNECTION_OPTIONS: &[(&str, &[&str])] = &[
    ("region", &["aws_region", "ec2_region"]),
    ("profile", &["aws_profile"]),
    ("aws_access_key_id", &["aws_access_key", "ec2_access_key"]),
    ("aws_secret_access_key", &["aws_secret_key", "ec2_secret_key"]),
    ("session_token", &["aws_session_token", "security_token"]),
    ("endpoint_url", &["aws_endpoint_url", "ec2_url"]),
];

/// Whether `name` is a connection option or one of its aliases.
pub fn is_connection_option(name: &str) -> bool {
    CONNECTION_OPTIONS
        .iter()
        .any(|(canonical, aliases)| *canonical == name || aliases.contains(&name))
}

/// Format an error and its `source()` chain, one cause per line.
///
/// Used as the `exception` detail of failed results.
pub fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut out = error.to_string();
    let mut current = error.source();
    while let Some(cause) = current {
        out.push_str("\n  caused by: ");
        out.push_str(&cause.to_string());
        current = cause.source();
    }
    out
}

/// Where and as whom to connect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConnectionInfo {
    /// AWS region
    pub region: Option<String>,
    /// Named profile from the shared config/credentials files
    pub profile: Option<String>,
    /// Explicit access key id
    pub access_key_id: Option<String>,
    /// Explicit secret access key
    pub secret_access_key: Option<String>,
    /// Session token for temporary credentials
    pub session_token: Option<String>,
    /// Alternative service endpoint (e.g. LocalStack)
    pub endpoint_url: Option<String>,
}

impl AwsConnectionInfo {
    /// Build connection info from named options, honouring aliases.
    ///
    /// `get` returns the raw value of an option by name.
    pub fn from_options<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let option = |canonical: &str| -> Option<String> {
            let (name, aliases) = CONNECTION_OPTIONS
                .iter()
                .find(|(name, _)| *name == canonical)?;
            get(*name).or_else(|| aliases.iter().find_map(|alias| get(*alias)))
        };

        Self {
            region: option("region"),
            profile: option("profile"),
            access_key_id: option("aws_access_key_id"),
            secret_access_key: option("aws_secret_access_key"),
            session_token: option("session_token"),
            endpoint_url: option("endpoint_url"),
        }
    }

    /// Fill unset fields from `defaults`.
    pub fn or(mut self, defaults: &AwsConnectionInfo) -> Self {
        self.region = self.region.or_else(|| defaults.region.clone());
        self.profile = self.profile.or_else(|| defaults.profile.clone());
        self.access_key_id = self.access_key_id.or_else(|| defaults.access_key_id.clone());
        self.secret_access_key = self
            .secret_access_key
            .or_else(|| defaults.secret_access_key.clone());
        self.session_token = self.session_token.or_else(|| defaults.session_token.clone());
        self.endpoint_url = self.endpoint_url.or_else(|| defaults.endpoint_url.clone());
        self
    }

    /// Check the fields that can be rejected before touching the SDK.
    pub fn validate(&self) -> AwsResult<()> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(_), None) | (None, Some(_)) => {
                return Err(AwsError::connection(
                    "aws_access_key_id and aws_secret_access_key must be specified together",
                ));
            }
            _ => {}
        }

        if let Some(endpoint) = &self.endpoint_url {
            url::Url::parse(endpoint).map_err(|e| AwsError::Connection {
                message: format!("invalid endpoint_url '{}'", endpoint),
                source: Some(Box::new(e)),
            })?;
        }

        Ok(())
    }

    /// Resolve region and credentials into an SDK configuration.
    ///
    /// SDK-level retries are disabled; callers wrap clients in
    /// [`Retrying`] instead.
    pub async fn load_sdk_config(&self) -> AwsResult<SdkConfig> {
        self.validate()?;

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).retry_config(RetryConfig::disabled());

        if let Some(region) = &self.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(profile) = &self.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(endpoint) = &self.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        if let (Some(access_key), Some(secret_key)) = (&self.access_key_id, &self.secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                self.session_token.clone(),
                None,
                "rustible-aws",
            ));
        }

        let config = loader.load().await;

        let region = config.region().ok_or(AwsError::MissingRegion)?;
        if config.credentials_provider().is_none() {
            return Err(AwsError::connection("no AWS credentials provider is available"));
        }

        debug!(region = %region, profile = ?self.profile, "Loaded AWS configuration");
        Ok(config)
    }
}

/// Builds retry-wrapped service clients for one invocation.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Build a CloudFormation client.
    async fn cloudformation(&self, conn: &AwsConnectionInfo) -> AwsResult<Arc<dyn CloudFormationApi>>;

    /// Build an RDS auth-token client.
    async fn rds(&self, conn: &AwsConnectionInfo) -> AwsResult<Arc<dyn RdsAuthApi>>;
}

/// [`ClientFactory`] backed by the AWS SDK for Rust.
#[derive(Debug, Clone, Default)]
pub struct SdkClientFactory {
    retry: RetrySettings,
}

impl SdkClientFactory {
    /// Create a factory using the given per-service retry settings.
    pub fn new(retry: RetrySettings) -> Self {
        Self { retry }
    }
}

#[async_trait]
impl ClientFactory for SdkClientFactory {
    async fn cloudformation(&self, conn: &AwsConnectionInfo) -> AwsResult<Arc<dyn CloudFormationApi>> {
        let config = conn.load_sdk_config().await?;
        let client = SdkCloudFormationClient::new(&config);
        Ok(Arc::new(Retrying::new(client, self.retry.cloudformation().policy())))
    }

    async fn rds(&self, conn: &AwsConnectionInfo) -> AwsResult<Arc<dyn RdsAuthApi>> {
        let config = conn.load_sdk_config().await?;
        let client = SdkRdsClient::new(config);
        Ok(Arc::new(Retrying::new(client, self.retry.rds().policy())))
    }
}

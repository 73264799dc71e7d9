//! RDS IAM auth-token capability.

use super::BackendError;
use crate::retry::Retrying;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_rds::auth_token::{AuthTokenGenerator, Config as AuthTokenConfig};
use tracing::debug;

/// RDS operations used by the lookups.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RdsAuthApi: Send + Sync {
    /// Generate a signed IAM database authentication token.
    async fn generate_db_auth_token(
        &self,
        hostname: &str,
        port: u16,
        username: &str,
    ) -> Result<String, BackendError>;
}

#[async_trait]
impl<C: RdsAuthApi> RdsAuthApi for Retrying<C> {
    async fn generate_db_auth_token(
        &self,
        hostname: &str,
        port: u16,
        username: &str,
    ) -> Result<String, BackendError> {
        self.policy()
            .execute(|| self.inner().generate_db_auth_token(hostname, port, username))
            .await
    }
}

/// [`RdsAuthApi`] over the AWS SDK token generator.
///
/// The token is a presigned request, so generation only needs region and
/// credentials from the resolved [`SdkConfig`].
#[derive(Debug, Clone)]
pub struct SdkRdsClient {
    config: SdkConfig,
}

impl SdkRdsClient {
    pub fn new(config: SdkConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RdsAuthApi for SdkRdsClient {
    async fn generate_db_auth_token(
        &self,
        hostname: &str,
        port: u16,
        username: &str,
    ) -> Result<String, BackendError> {
        debug!(hostname, port, username, "Generating RDS auth token");

        let token_config = AuthTokenConfig::builder()
            .hostname(hostname)
            .port(u64::from(port))
            .username(username)
            .build()
            .map_err(|e| BackendError {
                code: None,
                message: format!("invalid auth token request: {}", e),
                transport: false,
                source: Some(e),
            })?;

        let token = AuthTokenGenerator::new(token_config)
            .auth_token(&self.config)
            .await
            .map_err(|e| BackendError {
                code: None,
                message: e.to_string(),
                transport: false,
                source: Some(e),
            })?;

        Ok(token.as_str().to_string())
    }
}

//! CloudFormation client capability.

use super::BackendError;
use crate::retry::Retrying;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cloudformation::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One `Outputs` entry of a stack description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackOutput {
    pub output_key: Option<String>,
    pub output_value: Option<String>,
}

impl StackOutput {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            output_key: Some(key.into()),
            output_value: Some(value.into()),
        }
    }
}

/// The parts of a `DescribeStacks` entry the modules consume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackDescription {
    pub outputs: Option<Vec<StackOutput>>,
}

/// CloudFormation operations used by the modules.
#[async_trait]
pub trait CloudFormationApi: Send + Sync {
    /// Describe the named stack.
    ///
    /// `Ok(None)` means the service answered without a `Stacks` list.
    async fn describe_stacks(
        &self,
        stack_name: &str,
    ) -> Result<Option<Vec<StackDescription>>, BackendError>;
}

#[async_trait]
impl<C: CloudFormationApi> CloudFormationApi for Retrying<C> {
    async fn describe_stacks(
        &self,
        stack_name: &str,
    ) -> Result<Option<Vec<StackDescription>>, BackendError> {
        self.policy()
            .execute(|| self.inner().describe_stacks(stack_name))
            .await
    }
}

/// [`CloudFormationApi`] over the AWS SDK.
#[derive(Debug, Clone)]
pub struct SdkCloudFormationClient {
    client: Client,
}

impl SdkCloudFormationClient {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl CloudFormationApi for SdkCloudFormationClient {
    async fn describe_stacks(
        &self,
        stack_name: &str,
    ) -> Result<Option<Vec<StackDescription>>, BackendError> {
        debug!(stack_name, "Calling DescribeStacks");

        let resp = self
            .client
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(resp.stacks.map(|stacks| {
            stacks
                .into_iter()
                .map(|stack| StackDescription {
                    outputs: stack.outputs.map(|outputs| {
                        outputs
                            .into_iter()
                            .map(|o| StackOutput {
                                output_key: o.output_key,
                                output_value: o.output_value,
                            })
                            .collect()
                    }),
                })
                .collect()
        }))
    }
}

/// Reduce an SDK error to a [`BackendError`].
pub(crate) fn sdk_error<E, R>(err: SdkError<E, R>) -> BackendError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let transport = matches!(
        err,
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_)
    );
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());

    BackendError {
        code: err.code().map(str::to_string),
        message,
        transport,
        source: Some(Box::new(err)),
    }
}

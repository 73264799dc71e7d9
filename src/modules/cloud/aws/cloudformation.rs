//! CloudFormation stack outputs module.
//!
//! Reads the `Outputs` of a stack and returns them as a flat mapping. A
//! stack that does not exist is not an error; the result is simply empty,
//! so playbooks can query stacks that may not have been created yet.
//!
//! # Example Usage (Playbook YAML)
//!
//! ```yaml
//! - name: Read outputs of the network stack
//!   gather_stack_outputs:
//!     stack_name: network-prod
//!     region: eu-west-1
//!   register: network
//!
//! - debug:
//!     msg: "VPC is {{ network.outputs.VpcId }}"
//! ```

use crate::aws::{
    AwsConnectionInfo, AwsError, CloudFormationApi, StackDescription, StackOutput,
    MISSING_REGION_MSG,
};
use crate::modules::{
    Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleResult, ParamExt,
};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Flat output key to output value mapping.
pub type StackOutputs = IndexMap<String, String>;

/// Validated parameters of a `gather_stack_outputs` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackOutputsRequest {
    pub stack_name: String,
    pub connection: AwsConnectionInfo,
}

impl StackOutputsRequest {
    pub fn from_params(params: &ModuleParams, context: &ModuleContext) -> ModuleResult<Self> {
        let stack_name = params.get_string_required("stack_name")?;
        if stack_name.trim().is_empty() {
            return Err(ModuleError::InvalidParameter(
                "stack_name must not be blank".to_string(),
            ));
        }

        Ok(Self {
            stack_name,
            connection: context.connection_info(params),
        })
    }
}

/// Outcome of describing a stack that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackLookup {
    /// The backend returned these stack descriptions
    Found(Vec<StackDescription>),
    /// The backend reported that the stack does not exist
    NotFound,
}

/// Describe a single stack.
///
/// A null stack list is an [`AwsError::EmptyResponse`]; a "does not exist"
/// backend error is [`StackLookup::NotFound`]. Every other backend error is
/// returned as is.
pub async fn describe_stack(
    client: &dyn CloudFormationApi,
    stack_name: &str,
) -> Result<StackLookup, AwsError> {
    match client.describe_stacks(stack_name).await {
        Ok(Some(stacks)) => Ok(StackLookup::Found(stacks)),
        Ok(None) => Err(AwsError::EmptyResponse),
        Err(e) if e.is_not_found() => {
            debug!(stack_name, error = %e, "Stack not found");
            Ok(StackLookup::NotFound)
        }
        Err(e) => Err(AwsError::Backend(e)),
    }
}

/// Flatten `Outputs` entries into a mapping.
///
/// Later entries overwrite earlier ones with the same key. Entries without a
/// key are dropped and a missing value becomes the empty string.
pub fn flatten_outputs(outputs: &[StackOutput]) -> StackOutputs {
    outputs
        .iter()
        .filter_map(|output| {
            let key = output.output_key.clone()?;
            Some((key, output.output_value.clone().unwrap_or_default()))
        })
        .collect()
}

/// Resolve the outputs of a stack, empty when it does not exist.
///
/// When the backend returns several descriptions, the last one wins.
pub async fn resolve_outputs(
    client: &dyn CloudFormationApi,
    stack_name: &str,
) -> Result<StackOutputs, AwsError> {
    let stacks = match describe_stack(client, stack_name).await? {
        StackLookup::Found(stacks) => stacks,
        StackLookup::NotFound => return Ok(StackOutputs::new()),
    };

    let mut outputs = StackOutputs::new();
    for stack in &stacks {
        outputs = flatten_outputs(stack.outputs.as_deref().unwrap_or_default());
    }
    Ok(outputs)
}

/// Map a client construction failure to a module failure.
fn connection_failure(err: AwsError) -> ModuleError {
    match err {
        AwsError::MissingRegion => ModuleError::ExecutionFailed {
            msg: MISSING_REGION_MSG.to_string(),
            exception: None,
        },
        other => {
            ModuleError::failed_with(format!("Can't establish connection - {}", other), &other)
        }
    }
}

/// Map a describe failure to a module failure.
fn describe_failure(err: AwsError) -> ModuleError {
    match err {
        AwsError::EmptyResponse => ModuleError::ExecutionFailed {
            msg: format!("Error describing stack - {}", err),
            exception: None,
        },
        other => ModuleError::failed_with(format!("Error describing stack - {}", other), &other),
    }
}

/// Module that gathers CloudFormation stack outputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct GatherStackOutputsModule;

#[async_trait]
impl Module for GatherStackOutputsModule {
    fn name(&self) -> &'static str {
        "gather_stack_outputs"
    }

    fn description(&self) -> &'static str {
        "Gather the outputs of a CloudFormation stack as a flat mapping"
    }

    fn required_params(&self) -> &[&'static str] {
        &["stack_name"]
    }

    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        if let Some(serde_json::Value::Array(_) | serde_json::Value::Object(_)) =
            params.get("stack_name")
        {
            return Err(ModuleError::InvalidParameter(
                "stack_name must be a string".to_string(),
            ));
        }
        Ok(())
    }

    async fn execute(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let request = StackOutputsRequest::from_params(params, context)?;

        let client: Arc<dyn CloudFormationApi> = context
            .clients
            .cloudformation(&request.connection)
            .await
            .map_err(connection_failure)?;

        let outputs = resolve_outputs(client.as_ref(), &request.stack_name)
            .await
            .map_err(describe_failure)?;

        info!(
            stack_name = %request.stack_name,
            outputs = outputs.len(),
            "Gathered stack outputs"
        );

        let outputs: serde_json::Map<String, serde_json::Value> = outputs
            .into_iter()
            .map(|(key, value)| (key, serde_json::Value::String(value)))
            .collect();

        Ok(ModuleOutput::ok("").with_data("outputs", serde_json::Value::Object(outputs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::{AwsResult, BackendError, ClientFactory, RdsAuthApi};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Reply {
        Stacks(Option<Vec<StackDescription>>),
        Fail { code: &'static str, message: &'static str },
    }

    struct FakeCloudFormation {
        reply: Reply,
        calls: AtomicUsize,
    }

    impl FakeCloudFormation {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CloudFormationApi for FakeCloudFormation {
        async fn describe_stacks(
            &self,
            _stack_name: &str,
        ) -> Result<Option<Vec<StackDescription>>, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Reply::Stacks(stacks) => Ok(stacks.clone()),
                Reply::Fail { code, message } => Err(BackendError::service(*code, *message)),
            }
        }
    }

    enum FactoryMode {
        Client(Arc<FakeCloudFormation>),
        MissingRegion,
        Broken,
    }

    struct FakeFactory {
        mode: FactoryMode,
    }

    #[async_trait]
    impl ClientFactory for FakeFactory {
        async fn cloudformation(
            &self,
            _conn: &AwsConnectionInfo,
        ) -> AwsResult<Arc<dyn CloudFormationApi>> {
            match &self.mode {
                FactoryMode::Client(client) => Ok(client.clone()),
                FactoryMode::MissingRegion => Err(AwsError::MissingRegion),
                FactoryMode::Broken => Err(AwsError::Connection {
                    message: "failed to load credentials".to_string(),
                    source: Some(Box::new(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "no such profile",
                    ))),
                }),
            }
        }

        async fn rds(&self, _conn: &AwsConnectionInfo) -> AwsResult<Arc<dyn RdsAuthApi>> {
            Err(AwsError::connection("rds is not available in this test"))
        }
    }

    fn stack(outputs: Option<Vec<StackOutput>>) -> StackDescription {
        StackDescription { outputs }
    }

    fn context(mode: FactoryMode) -> ModuleContext {
        ModuleContext::default().with_clients(Arc::new(FakeFactory { mode }))
    }

    fn params(stack_name: &str) -> ModuleParams {
        let mut params: ModuleParams = HashMap::new();
        params.insert("stack_name".to_string(), json!(stack_name));
        params
    }

    async fn run(mode: FactoryMode) -> ModuleResult<ModuleOutput> {
        GatherStackOutputsModule
            .execute(&params("web"), &context(mode))
            .await
    }

    #[tokio::test]
    async fn test_flattens_outputs() {
        let client = FakeCloudFormation::new(Reply::Stacks(Some(vec![stack(Some(vec![
            StackOutput::new("Url", "https://x"),
            StackOutput::new("Id", "abc"),
        ]))])));

        let outputs = resolve_outputs(client.as_ref(), "web").await.unwrap();

        let expected: StackOutputs = [("Url", "https://x"), ("Id", "abc")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(outputs, expected);
    }

    #[tokio::test]
    async fn test_module_result_shape() {
        let client = FakeCloudFormation::new(Reply::Stacks(Some(vec![stack(Some(vec![
            StackOutput::new("Url", "https://x"),
            StackOutput::new("Id", "abc"),
        ]))])));

        let output = run(FactoryMode::Client(client)).await.unwrap();
        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(
            value,
            json!({"changed": false, "outputs": {"Url": "https://x", "Id": "abc"}})
        );
    }

    #[tokio::test]
    async fn test_missing_stack_is_empty() {
        let client = FakeCloudFormation::new(Reply::Fail {
            code: "ValidationError",
            message: "Stack with id web does not exist",
        });

        assert_eq!(
            describe_stack(client.as_ref(), "web").await.unwrap(),
            StackLookup::NotFound
        );

        let output = run(FactoryMode::Client(client)).await.unwrap();
        assert!(!output.changed);
        assert!(!output.failed);
        assert_eq!(output.data["outputs"], json!({}));
    }

    #[tokio::test]
    async fn test_null_stack_list_is_fatal() {
        let client = FakeCloudFormation::new(Reply::Stacks(None));

        let err = resolve_outputs(client.as_ref(), "web").await.unwrap_err();
        assert!(matches!(err, AwsError::EmptyResponse));

        let err = run(FactoryMode::Client(client)).await.unwrap_err();
        assert!(err.to_string().contains("empty response"));
        assert_eq!(
            err.to_string(),
            "Error describing stack - an empty response was returned"
        );
    }

    #[tokio::test]
    async fn test_stack_without_outputs() {
        let client = FakeCloudFormation::new(Reply::Stacks(Some(vec![stack(None)])));

        let output = run(FactoryMode::Client(client)).await.unwrap();
        assert!(!output.changed);
        assert_eq!(output.data["outputs"], json!({}));
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let client = FakeCloudFormation::new(Reply::Stacks(Some(vec![stack(Some(vec![
            StackOutput::new("Bucket", "assets"),
        ]))])));

        let first = resolve_outputs(client.as_ref(), "web").await.unwrap();
        let second = resolve_outputs(client.as_ref(), "web").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_other_backend_error_is_fatal() {
        let client = FakeCloudFormation::new(Reply::Fail {
            code: "AccessDenied",
            message: "User is not authorized to perform cloudformation:DescribeStacks",
        });

        let err = run(FactoryMode::Client(client)).await.unwrap_err();
        match err {
            ModuleError::ExecutionFailed { msg, exception } => {
                assert!(msg.starts_with("Error describing stack - AccessDenied"));
                assert!(exception.unwrap().contains("not authorized"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_region_message_is_specific() {
        let missing = run(FactoryMode::MissingRegion).await.unwrap_err();
        let generic = run(FactoryMode::Broken).await.unwrap_err();

        assert_eq!(missing.to_string(), MISSING_REGION_MSG);
        assert!(generic
            .to_string()
            .starts_with("Can't establish connection - failed to load credentials"));
        assert_ne!(missing.to_string(), generic.to_string());

        match generic {
            ModuleError::ExecutionFailed { exception, .. } => {
                assert!(exception.unwrap().contains("caused by: no such profile"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_flatten_last_write_wins() {
        let outputs = flatten_outputs(&[
            StackOutput::new("Url", "old"),
            StackOutput {
                output_key: None,
                output_value: Some("orphan".to_string()),
            },
            StackOutput {
                output_key: Some("Empty".to_string()),
                output_value: None,
            },
            StackOutput::new("Url", "new"),
        ]);

        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs["Url"], "new");
        assert_eq!(outputs["Empty"], "");
    }

    #[tokio::test]
    async fn test_last_stack_wins() {
        let client = FakeCloudFormation::new(Reply::Stacks(Some(vec![
            stack(Some(vec![StackOutput::new("Url", "first")])),
            stack(Some(vec![StackOutput::new("Id", "second")])),
        ])));

        let outputs = resolve_outputs(client.as_ref(), "web").await.unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs["Id"], "second");
    }

    #[test]
    fn test_request_rejects_blank_stack_name() {
        let err = StackOutputsRequest::from_params(&params("  "), &ModuleContext::default())
            .unwrap_err();
        assert!(matches!(err, ModuleError::InvalidParameter(_)));
    }

    #[test]
    fn test_request_uses_connection_defaults() {
        let context = ModuleContext::default().with_connection_defaults(AwsConnectionInfo {
            region: Some("us-east-1".to_string()),
            ..Default::default()
        });
        let mut params = params("web");
        params.insert("aws_profile".to_string(), json!("ops"));

        let request = StackOutputsRequest::from_params(&params, &context).unwrap();
        assert_eq!(request.stack_name, "web");
        assert_eq!(request.connection.region.as_deref(), Some("us-east-1"));
        assert_eq!(request.connection.profile.as_deref(), Some("ops"));
    }
}

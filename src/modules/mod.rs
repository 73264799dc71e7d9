//! Module system for rustible-aws
//!
//! This module provides the core traits, types, and registry for modules.
//! A module receives a parameter map, performs its work against AWS, and
//! reports an Ansible-compatible result document.

pub mod cloud;

use crate::aws::{error_chain, is_connection_option, AwsConnectionInfo, ClientFactory, SdkClientFactory};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during module execution
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("Module not found: {0}")]
    NotFound(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("missing required arguments: {0}")]
    MissingParameter(String),

    #[error("Unsupported parameters for ({module}) module: {unsupported}. Supported parameters include: {supported}.")]
    UnsupportedParameters {
        module: String,
        unsupported: String,
        supported: String,
    },

    /// The module ran and failed; `exception` carries the cause chain.
    #[error("{msg}")]
    ExecutionFailed {
        msg: String,
        exception: Option<String>,
    },
}

impl ModuleError {
    /// Failure with a message and the formatted cause chain of `source`.
    pub fn failed_with(
        msg: impl Into<String>,
        source: &(dyn std::error::Error + 'static),
    ) -> Self {
        ModuleError::ExecutionFailed {
            msg: msg.into(),
            exception: Some(error_chain(source)),
        }
    }

    /// Render this error as a failed module result.
    pub fn to_output(&self) -> ModuleOutput {
        let output = ModuleOutput::failed(self.to_string());
        match self {
            ModuleError::ExecutionFailed {
                exception: Some(exception),
                ..
            } => output.with_exception(exception.clone()),
            _ => output,
        }
    }
}

/// Result type for module operations
pub type ModuleResult<T> = Result<T, ModuleError>;

/// Status of a module execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleStatus {
    /// Module executed successfully
    Ok,
    /// Module execution failed
    Failed,
    /// Module was skipped
    Skipped,
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleStatus::Ok => write!(f, "ok"),
            ModuleStatus::Failed => write!(f, "failed"),
            ModuleStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Result of a module execution.
///
/// Serializes to the document Ansible expects from a module: `changed`,
/// `failed`/`skipped` when set, `msg`, `exception`, and any module data as
/// top-level keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleOutput {
    /// Whether the module changed anything; always false for the read-only modules here
    pub changed: bool,
    /// Human-readable message about what happened
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub msg: String,
    /// Status of the execution
    #[serde(skip, default = "default_status")]
    pub status: ModuleStatus,
    /// Set when the module failed
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub failed: bool,
    /// Set when the module did not run
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    /// Error cause chain for failed results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    /// Additional data returned by the module
    #[serde(flatten)]
    pub data: IndexMap<String, serde_json::Value>,
}

fn default_status() -> ModuleStatus {
    ModuleStatus::Ok
}

impl ModuleOutput {
    fn with_status(status: ModuleStatus, msg: impl Into<String>) -> Self {
        Self {
            changed: false,
            msg: msg.into(),
            status,
            failed: status == ModuleStatus::Failed,
            skipped: status == ModuleStatus::Skipped,
            exception: None,
            data: IndexMap::new(),
        }
    }

    /// Create a new successful output with no changes
    pub fn ok(msg: impl Into<String>) -> Self {
        Self::with_status(ModuleStatus::Ok, msg)
    }

    /// Create a failed output
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::with_status(ModuleStatus::Failed, msg)
    }

    /// Create a skipped output
    pub fn skipped(msg: impl Into<String>) -> Self {
        Self::with_status(ModuleStatus::Skipped, msg)
    }

    /// Add data to the output
    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Attach an error cause chain
    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }
}

/// Parameters passed to a module
pub type ModuleParams = HashMap<String, serde_json::Value>;

/// Context for module execution
#[derive(Clone)]
pub struct ModuleContext {
    /// Whether to run in check mode (dry run)
    pub check_mode: bool,
    /// Builds the AWS clients a module needs
    pub clients: Arc<dyn ClientFactory>,
    /// Connection settings used where the parameters leave a field unset
    pub connection_defaults: AwsConnectionInfo,
}

impl std::fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleContext")
            .field("check_mode", &self.check_mode)
            .field("connection_defaults", &self.connection_defaults)
            .finish_non_exhaustive()
    }
}

impl Default for ModuleContext {
    fn default() -> Self {
        Self {
            check_mode: false,
            clients: Arc::new(SdkClientFactory::default()),
            connection_defaults: AwsConnectionInfo::default(),
        }
    }
}

impl ModuleContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    pub fn with_clients(mut self, clients: Arc<dyn ClientFactory>) -> Self {
        self.clients = clients;
        self
    }

    pub fn with_connection_defaults(mut self, defaults: AwsConnectionInfo) -> Self {
        self.connection_defaults = defaults;
        self
    }

    /// Connection info from the module parameters, falling back to the defaults.
    pub fn connection_info(&self, params: &ModuleParams) -> AwsConnectionInfo {
        AwsConnectionInfo::from_options(|name| params.get_string(name).ok().flatten())
            .or(&self.connection_defaults)
    }
}

/// Trait that all modules must implement
#[async_trait]
pub trait Module: Send + Sync {
    /// Returns the name of the module
    fn name(&self) -> &'static str;

    /// Returns a description of what the module does
    fn description(&self) -> &'static str;

    /// Whether the module can run in check mode
    fn supports_check_mode(&self) -> bool {
        false
    }

    /// Whether the module accepts the common AWS connection parameters
    fn accepts_connection_params(&self) -> bool {
        true
    }

    /// Execute the module with the given parameters
    async fn execute(&self, params: &ModuleParams, context: &ModuleContext)
        -> ModuleResult<ModuleOutput>;

    /// Validate the parameters before execution
    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        let _ = params;
        Ok(())
    }

    /// Returns the list of required parameters
    fn required_params(&self) -> &[&'static str] {
        &[]
    }
}

/// Helper trait for extracting parameters
pub trait ParamExt {
    fn get_string(&self, key: &str) -> ModuleResult<Option<String>>;
    fn get_string_required(&self, key: &str) -> ModuleResult<String>;
    fn get_bool(&self, key: &str) -> ModuleResult<Option<bool>>;
}

impl ParamExt for ModuleParams {
    fn get_string(&self, key: &str) -> ModuleResult<Option<String>> {
        match self.get(key) {
            Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
            Some(serde_json::Value::Null) | None => Ok(None),
            Some(v) => Ok(Some(v.to_string().trim_matches('"').to_string())),
        }
    }

    fn get_string_required(&self, key: &str) -> ModuleResult<String> {
        self.get_string(key)?
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ModuleError::MissingParameter(key.to_string()))
    }

    fn get_bool(&self, key: &str) -> ModuleResult<Option<bool>> {
        match self.get(key) {
            Some(serde_json::Value::Bool(b)) => Ok(Some(*b)),
            Some(serde_json::Value::String(s)) => match s.to_lowercase().as_str() {
                "true" | "yes" | "1" | "on" => Ok(Some(true)),
                "false" | "no" | "0" | "off" => Ok(Some(false)),
                _ => Err(ModuleError::InvalidParameter(format!(
                    "{} must be a boolean",
                    key
                ))),
            },
            Some(serde_json::Value::Null) | None => Ok(None),
            Some(_) => Err(ModuleError::InvalidParameter(format!(
                "{} must be a boolean",
                key
            ))),
        }
    }
}

/// Prefix Ansible uses for the internal parameters it injects.
const ANSIBLE_INTERNAL_PREFIX: &str = "_ansible_";

/// Registry for looking up modules by name
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<dyn Module>>,
}

impl ModuleRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            modules: HashMap::new(),
        }
    }

    /// Create a registry with all built-in modules
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(cloud::aws::GatherStackOutputsModule));
        registry
    }

    /// Register a module
    pub fn register(&mut self, module: Arc<dyn Module>) {
        self.modules.insert(module.name().to_string(), module);
    }

    /// Get a module by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.modules.get(name).cloned()
    }

    /// Check if a module exists
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Get all module names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Execute a module by name
    ///
    /// Ansible's internal `_ansible_*` parameters are stripped; only
    /// `_ansible_check_mode` is honoured.
    pub async fn execute(
        &self,
        name: &str,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let module = self
            .get(name)
            .ok_or_else(|| ModuleError::NotFound(name.to_string()))?;

        let check_mode = context.check_mode
            || params
                .get_bool(&format!("{}check_mode", ANSIBLE_INTERNAL_PREFIX))?
                .unwrap_or(false);

        let params: ModuleParams = params
            .iter()
            .filter(|(key, _)| !key.starts_with(ANSIBLE_INTERNAL_PREFIX))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self::check_supported(module.as_ref(), &params)?;

        // Check required parameters
        let missing: Vec<&str> = module
            .required_params()
            .iter()
            .copied()
            .filter(|param| params.get_string(param).ok().flatten().is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ModuleError::MissingParameter(missing.join(", ")));
        }

        module.validate_params(&params)?;

        if check_mode && !module.supports_check_mode() {
            debug!(module = name, "Skipping module in check mode");
            return Ok(ModuleOutput::skipped(
                "remote module does not support check mode",
            ));
        }

        let context = context.clone().with_check_mode(check_mode);
        module.execute(&params, &context).await
    }

    /// Reject parameters the module does not declare.
    fn check_supported(module: &dyn Module, params: &ModuleParams) -> ModuleResult<()> {
        let is_supported = |key: &str| {
            module.required_params().iter().any(|p| *p == key)
                || (module.accepts_connection_params() && is_connection_option(key))
        };

        let mut unsupported: Vec<&str> = params
            .keys()
            .map(|k| k.as_str())
            .filter(|k| !is_supported(k))
            .collect();

        if unsupported.is_empty() {
            return Ok(());
        }
        unsupported.sort_unstable();

        let mut supported: Vec<&str> = module.required_params().to_vec();
        if module.accepts_connection_params() {
            supported.extend(crate::aws::CONNECTION_OPTIONS.iter().map(|(name, _)| *name));
        }
        supported.sort_unstable();

        Err(ModuleError::UnsupportedParameters {
            module: module.name().to_string(),
            unsupported: unsupported.join(", "),
            supported: supported.join(", "),
        })
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

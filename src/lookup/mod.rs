//! Lookup plugin system for rustible-aws
//!
//! Lookups retrieve a value from an external source and hand it back as a
//! list of strings, the way Ansible lookup plugins do. Arguments arrive as
//! `key=value` terms.
//!
//! # Available Plugins
//!
//! - [`AwsRdsAuthTokenLookup`] - Generate an RDS IAM database auth token
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use rustible_aws::lookup::{LookupContext, LookupRegistry};
//!
//! let registry = LookupRegistry::with_builtins();
//! let context = LookupContext::default();
//!
//! let token = registry
//!     .lookup_first(
//!         "aws_rds_auth_token",
//!         &["hostname=db.example.com", "username=app"],
//!         &context,
//!     )
//!     .await?;
//! ```

pub mod aws_rds_auth_token;

pub use aws_rds_auth_token::{AuthTokenRequest, AwsRdsAuthTokenLookup};

use crate::aws::{AwsConnectionInfo, AwsError, BackendError, ClientFactory, SdkClientFactory};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during lookup operations
#[derive(Error, Debug)]
pub enum LookupError {
    /// Lookup plugin not found
    #[error("Lookup plugin not found: {0}")]
    NotFound(String),

    /// Invalid arguments provided to lookup
    #[error("Invalid lookup arguments: {0}")]
    InvalidArguments(String),

    /// Missing required argument
    #[error("Missing required argument: {0}")]
    MissingArgument(String),

    /// The AWS client could not be built (missing region, bad credentials)
    #[error(transparent)]
    Configuration(AwsError),

    /// The AWS call failed after retries
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Generic lookup error
    #[error("{0}")]
    Other(String),
}

/// Result type for lookup operations
pub type LookupResult<T> = Result<T, LookupError>;

/// Context for lookup plugin execution
#[derive(Clone)]
pub struct LookupContext {
    /// Builds the AWS clients a lookup needs
    pub clients: Arc<dyn ClientFactory>,

    /// Connection settings used where the options leave a field unset
    pub connection_defaults: AwsConnectionInfo,
}

impl std::fmt::Debug for LookupContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupContext")
            .field("connection_defaults", &self.connection_defaults)
            .finish_non_exhaustive()
    }
}

impl Default for LookupContext {
    fn default() -> Self {
        Self {
            clients: Arc::new(SdkClientFactory::default()),
            connection_defaults: AwsConnectionInfo::default(),
        }
    }
}

impl LookupContext {
    /// Create a new lookup context
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different client factory
    pub fn with_clients(mut self, clients: Arc<dyn ClientFactory>) -> Self {
        self.clients = clients;
        self
    }

    /// Set the connection defaults
    pub fn with_connection_defaults(mut self, defaults: AwsConnectionInfo) -> Self {
        self.connection_defaults = defaults;
        self
    }
}

/// Trait that all lookup plugins must implement
#[async_trait]
pub trait Lookup: Send + Sync {
    /// Returns the name of the lookup plugin
    fn name(&self) -> &'static str;

    /// Returns a description of what this lookup does
    fn description(&self) -> &'static str;

    /// Execute the lookup with the given arguments
    ///
    /// Returns one string per resolved value.
    async fn lookup(&self, args: &[&str], context: &LookupContext) -> LookupResult<Vec<String>>;

    /// Parse key=value arguments from the args list
    fn parse_options(&self, args: &[&str]) -> HashMap<String, String> {
        let mut options = HashMap::new();
        for arg in args {
            if let Some((key, value)) = arg.split_once('=') {
                options.insert(key.trim().to_string(), value.to_string());
            }
        }
        options
    }
}

/// Registry for looking up plugins by name
pub struct LookupRegistry {
    plugins: HashMap<String, Arc<dyn Lookup>>,
}

impl LookupRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            plugins: HashMap::new(),
        }
    }

    /// Create a registry with all built-in lookup plugins
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(AwsRdsAuthTokenLookup));
        registry
    }

    /// Register a lookup plugin
    pub fn register(&mut self, plugin: Arc<dyn Lookup>) {
        self.plugins.insert(plugin.name().to_string(), plugin);
    }

    /// Get a lookup plugin by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Lookup>> {
        self.plugins.get(name).cloned()
    }

    /// Check if a lookup plugin exists
    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Get all registered plugin names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.plugins.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Execute a lookup by plugin name
    pub async fn lookup(
        &self,
        name: &str,
        args: &[&str],
        context: &LookupContext,
    ) -> LookupResult<Vec<String>> {
        let plugin = self
            .get(name)
            .ok_or_else(|| LookupError::NotFound(name.to_string()))?;

        plugin.lookup(args, context).await
    }

    /// Execute a lookup and return a single value
    ///
    /// This is a convenience method that returns the first value from the lookup.
    pub async fn lookup_first(
        &self,
        name: &str,
        args: &[&str],
        context: &LookupContext,
    ) -> LookupResult<String> {
        let results = self.lookup(name, args, context).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| LookupError::Other("Lookup returned no results".to_string()))
    }
}

impl Default for LookupRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Convenient re-exports for lookup plugin development and usage.
pub mod prelude {
    pub use super::AwsRdsAuthTokenLookup;
    pub use super::Lookup;
    pub use super::LookupContext;
    pub use super::LookupError;
    pub use super::LookupRegistry;
    pub use super::LookupResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoLookup;

    #[async_trait]
    impl Lookup for EchoLookup {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn description(&self) -> &'static str {
            "Test lookup"
        }

        async fn lookup(
            &self,
            args: &[&str],
            _context: &LookupContext,
        ) -> LookupResult<Vec<String>> {
            Ok(args.iter().map(|a| a.to_string()).collect())
        }
    }

    #[test]
    fn test_registry_with_builtins() {
        let registry = LookupRegistry::with_builtins();
        assert!(registry.contains("aws_rds_auth_token"));
        assert_eq!(registry.names(), vec!["aws_rds_auth_token"]);
    }

    #[tokio::test]
    async fn test_registry_not_found() {
        let registry = LookupRegistry::new();
        let context = LookupContext::default();

        let result = registry.lookup("nonexistent", &[], &context).await;
        assert!(matches!(result, Err(LookupError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_lookup_first() {
        let mut registry = LookupRegistry::new();
        registry.register(Arc::new(EchoLookup));
        let context = LookupContext::default();

        let first = registry
            .lookup_first("echo", &["a", "b"], &context)
            .await
            .unwrap();
        assert_eq!(first, "a");

        let empty = registry.lookup_first("echo", &[], &context).await;
        assert!(matches!(empty, Err(LookupError::Other(_))));
    }

    #[test]
    fn test_parse_options() {
        let options = EchoLookup.parse_options(&["key1=value1", "key2=a=b", "no_equals"]);

        assert_eq!(options.get("key1"), Some(&"value1".to_string()));
        assert_eq!(options.get("key2"), Some(&"a=b".to_string()));
        assert!(!options.contains_key("no_equals"));
    }
}

//! # rustible-aws - AWS helpers for Ansible-style automation
//!
//! rustible-aws provides two AWS helpers shaped like Ansible plugins:
//!
//! - the `aws_rds_auth_token` **lookup**, which generates an RDS IAM
//!   database authentication token, and
//! - the `gather_stack_outputs` **module**, which returns the outputs of a
//!   CloudFormation stack as a flat mapping.
//!
//! Both are thin adapters over a single AWS call. The logic owned here is
//! argument validation, retry with jittered backoff, and turning AWS
//! failures into messages an operator can act on.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │        ModuleRegistry        │   │        LookupRegistry        │
//! │    (gather_stack_outputs)    │   │     (aws_rds_auth_token)     │
//! └──────────────────────────────┘   └──────────────────────────────┘
//!                 │                                 │
//!                 └────────────────┬────────────────┘
//!                                  ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         ClientFactory                           │
//! │      (AwsConnectionInfo -> SdkConfig -> Retrying<client>)       │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//!                                  ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     AWS SDK for Rust                            │
//! │              (CloudFormation, RDS auth token)                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use rustible_aws::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let registry = ModuleRegistry::with_builtins();
//!     let mut params = ModuleParams::new();
//!     params.insert("stack_name".into(), "network-prod".into());
//!
//!     let output = registry
//!         .execute("gather_stack_outputs", &params, &ModuleContext::default())
//!         .await?;
//!     println!("{}", serde_json::to_string(&output)?);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    // AWS plumbing
    pub use crate::aws::{
        AwsConnectionInfo, AwsError, ClientFactory, CloudFormationApi, RdsAuthApi,
        SdkClientFactory,
    };

    // Configuration
    pub use crate::config::Config;

    // Error handling
    pub use crate::error::{Error, Result};

    // Lookups
    pub use crate::lookup::{Lookup, LookupContext, LookupRegistry};

    // Module system
    pub use crate::modules::{
        Module, ModuleContext, ModuleOutput, ModuleParams, ModuleRegistry, ModuleResult,
    };

    // Retry
    pub use crate::retry::{RetryPolicy, Retrying};
}

/// AWS connection settings, client capabilities and error classification.
pub mod aws;

/// Layered configuration loading.
pub mod config;

/// Error types and result aliases.
pub mod error;

/// Lookup plugins.
pub mod lookup;

/// Module system and built-in modules.
pub mod modules;

/// Retry policies and the retrying client decorator.
pub mod retry;

//! AWS modules.
//!
//! ## Available Modules
//!
//! - [`GatherStackOutputsModule`](cloudformation::GatherStackOutputsModule):
//!   read the outputs of a CloudFormation stack
//!
//! All AWS modules accept the common connection parameters (`region`,
//! `profile`, `aws_access_key_id`, `aws_secret_access_key`, `session_token`,
//! `endpoint_url`) and their aliases. See [`crate::aws`] for how region and
//! credentials are resolved when they are omitted.

pub mod cloudformation;

pub use cloudformation::GatherStackOutputsModule;

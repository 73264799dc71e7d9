//! Cloud provider modules.
//!
//! Only AWS is supported. Modules here reach the provider through the
//! [`ClientFactory`](crate::aws::ClientFactory) carried by the
//! [`ModuleContext`](super::ModuleContext).

pub mod aws;

pub use aws::GatherStackOutputsModule;

//! Subcommands module for the rustible-aws CLI
//!
//! This module contains all the subcommand implementations.

pub mod aws;
pub mod lookup;
pub mod module;

use crate::cli::{Cli, OutputFormat};
use anyhow::Result;
use rustible_aws::aws::{AwsConnectionInfo, ClientFactory, SdkClientFactory};
use rustible_aws::config::Config;
use rustible_aws::lookup::{LookupContext, LookupRegistry};
use rustible_aws::modules::{ModuleContext, ModuleOutput, ModuleRegistry};
use serde::Serialize;
use std::sync::Arc;

/// Common context shared between commands
pub struct CommandContext {
    /// Configuration
    pub config: Config,
    /// Output format
    pub output: OutputFormat,
    /// Verbosity level
    pub verbosity: u8,
    /// Builds AWS clients with the configured retry policies
    pub clients: Arc<dyn ClientFactory>,
    /// Registered modules
    pub modules: ModuleRegistry,
    /// Registered lookups
    pub lookups: LookupRegistry,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &Cli, config: Config) -> Self {
        let clients = Arc::new(SdkClientFactory::new(config.retry.clone()));

        Self {
            config,
            output: cli.output,
            verbosity: cli.verbosity(),
            clients,
            modules: ModuleRegistry::with_builtins(),
            lookups: LookupRegistry::with_builtins(),
        }
    }

    /// Connection defaults: command-line flags first, then the config file.
    fn connection_defaults(&self, flags: &AwsConnectionInfo) -> AwsConnectionInfo {
        flags.clone().or(&self.config.aws)
    }

    /// Build the context modules run with
    pub fn module_context(&self, flags: &AwsConnectionInfo) -> ModuleContext {
        ModuleContext::new()
            .with_clients(self.clients.clone())
            .with_connection_defaults(self.connection_defaults(flags))
    }

    /// Build the context lookups run with
    pub fn lookup_context(&self, flags: &AwsConnectionInfo) -> LookupContext {
        LookupContext::new()
            .with_clients(self.clients.clone())
            .with_connection_defaults(self.connection_defaults(flags))
    }

    /// Print a value as a single JSON line on stdout
    pub fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string(value)?);
        Ok(())
    }

    /// Print a failure to stderr, with its cause chain when verbose
    pub fn report_failure(&self, output: &ModuleOutput) {
        eprintln!("Error: {}", output.msg);
        if self.verbosity >= 1 {
            if let Some(exception) = &output.exception {
                eprintln!("{}", exception);
            }
        }
    }
}

/// Exit code for a module result
pub fn exit_code(output: &ModuleOutput) -> i32 {
    if output.failed {
        1
    } else {
        0
    }
}

/// List the registered modules and lookups
pub fn list(ctx: &CommandContext) -> Result<i32> {
    let modules: Vec<(&str, &str)> = ctx
        .modules
        .names()
        .into_iter()
        .filter_map(|name| ctx.modules.get(name).map(|m| (name, m.description())))
        .collect();
    let lookups: Vec<(&str, &str)> = ctx
        .lookups
        .names()
        .into_iter()
        .filter_map(|name| ctx.lookups.get(name).map(|l| (name, l.description())))
        .collect();

    match ctx.output {
        OutputFormat::Json => {
            let to_map = |entries: &[(&str, &str)]| -> serde_json::Map<String, serde_json::Value> {
                entries
                    .iter()
                    .map(|(name, description)| {
                        (name.to_string(), serde_json::Value::String(description.to_string()))
                    })
                    .collect()
            };
            ctx.print_json(&serde_json::json!({
                "modules": to_map(&modules),
                "lookups": to_map(&lookups),
            }))?;
        }
        OutputFormat::Human => {
            println!("Modules:");
            for (name, description) in &modules {
                println!("  {:<24} {}", name, description);
            }
            println!("Lookups:");
            for (name, description) in &lookups {
                println!("  {:<24} {}", name, description);
            }
        }
    }

    Ok(0)
}

//! Lookup command
//!
//! Runs a lookup with `key=value` terms and prints the resulting list as a
//! JSON array, whatever `--output` says.

use super::CommandContext;
use anyhow::Result;
use clap::Parser;
use rustible_aws::aws::AwsConnectionInfo;
use tracing::error;

/// Arguments for the lookup command
#[derive(Parser, Debug, Clone)]
pub struct LookupArgs {
    /// Lookup name
    pub name: String,

    /// Lookup terms (key=value)
    pub terms: Vec<String>,
}

impl LookupArgs {
    /// Execute the lookup command
    pub async fn execute(&self, ctx: &CommandContext) -> Result<i32> {
        let terms: Vec<&str> = self.terms.iter().map(String::as_str).collect();
        let context = ctx.lookup_context(&AwsConnectionInfo::default());

        match ctx.lookups.lookup(&self.name, &terms, &context).await {
            Ok(values) => {
                ctx.print_json(&values)?;
                Ok(0)
            }
            Err(e) => {
                error!(lookup = %self.name, error = %e, "Lookup failed");
                eprintln!("Error: {}", e);
                Ok(1)
            }
        }
    }
}

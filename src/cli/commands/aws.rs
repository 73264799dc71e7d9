//! Direct AWS commands
//!
//! `rds-auth-token` and `stack-outputs` run the built-in lookup and module
//! with arguments taken from command-line flags.

use super::{exit_code, CommandContext};
use crate::cli::{ConnectionArgs, OutputFormat};
use anyhow::Result;
use clap::Parser;
use rustible_aws::modules::{ModuleOutput, ModuleParams};
use tracing::error;

/// Arguments for the rds-auth-token command
#[derive(Parser, Debug, Clone)]
pub struct RdsAuthTokenArgs {
    /// Database endpoint hostname
    #[arg(long)]
    pub hostname: String,

    /// Database user
    #[arg(long)]
    pub username: String,

    /// Database port
    #[arg(long, default_value_t = 5432, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl RdsAuthTokenArgs {
    /// Execute the rds-auth-token command
    pub async fn execute(&self, ctx: &CommandContext) -> Result<i32> {
        let terms = [
            format!("hostname={}", self.hostname),
            format!("username={}", self.username),
            format!("port={}", self.port),
        ];
        let terms: Vec<&str> = terms.iter().map(String::as_str).collect();
        let context = ctx.lookup_context(&self.connection.to_connection_info());

        match ctx.lookups.lookup("aws_rds_auth_token", &terms, &context).await {
            Ok(tokens) => {
                match ctx.output {
                    OutputFormat::Json => ctx.print_json(&tokens)?,
                    OutputFormat::Human => {
                        for token in &tokens {
                            println!("{}", token);
                        }
                    }
                }
                Ok(0)
            }
            Err(e) => {
                error!(error = %e, "RDS auth token lookup failed");
                eprintln!("Error: {}", e);
                Ok(1)
            }
        }
    }
}

/// Arguments for the stack-outputs command
#[derive(Parser, Debug, Clone)]
pub struct StackOutputsArgs {
    /// Name or id of the CloudFormation stack
    #[arg(long)]
    pub stack_name: String,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl StackOutputsArgs {
    /// Execute the stack-outputs command
    pub async fn execute(&self, ctx: &CommandContext) -> Result<i32> {
        let mut params = ModuleParams::new();
        params.insert(
            "stack_name".to_string(),
            serde_json::Value::String(self.stack_name.clone()),
        );
        let context = ctx.module_context(&self.connection.to_connection_info());

        let output = ctx
            .modules
            .execute("gather_stack_outputs", &params, &context)
            .await
            .unwrap_or_else(|e| e.to_output());

        match ctx.output {
            OutputFormat::Json => ctx.print_json(&output)?,
            OutputFormat::Human if output.failed => ctx.report_failure(&output),
            OutputFormat::Human => print_outputs(&output),
        }

        Ok(exit_code(&output))
    }
}

fn print_outputs(output: &ModuleOutput) {
    if let Some(serde_json::Value::Object(outputs)) = output.data.get("outputs") {
        for (key, value) in outputs {
            match value {
                serde_json::Value::String(s) => println!("{}={}", key, s),
                other => println!("{}={}", key, other),
            }
        }
    }
}

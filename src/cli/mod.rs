//! CLI module for rustible-aws
//!
//! This module provides the command-line interface: argument parsing and
//! subcommand dispatch.

pub mod commands;

use clap::{Args, Parser, Subcommand, ValueEnum};
use rustible_aws::aws::AwsConnectionInfo;
use std::path::PathBuf;

/// rustible-aws - AWS lookups and modules for Ansible-style automation
#[derive(Parser, Debug, Clone)]
#[command(name = "rustible-aws")]
#[command(author = "Rustible Contributors")]
#[command(version)]
#[command(about = "RDS auth tokens and CloudFormation stack outputs", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "human")]
    pub output: OutputFormat,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain values, one per line
    #[default]
    Human,
    /// JSON output for scripting
    Json,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Generate an RDS IAM authentication token
    #[command(name = "rds-auth-token")]
    RdsAuthToken(commands::aws::RdsAuthTokenArgs),

    /// Print the outputs of a CloudFormation stack
    #[command(name = "stack-outputs")]
    StackOutputs(commands::aws::StackOutputsArgs),

    /// Run a module with an Ansible arguments file
    Module(commands::module::ModuleArgs),

    /// Run a lookup with key=value terms
    Lookup(commands::lookup::LookupArgs),

    /// List available modules and lookups
    List,
}

/// AWS connection flags shared by the direct commands
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// AWS region
    #[arg(long)]
    pub region: Option<String>,

    /// Named profile from the shared AWS config
    #[arg(long)]
    pub profile: Option<String>,

    /// Alternative service endpoint
    #[arg(long)]
    pub endpoint_url: Option<String>,
}

impl ConnectionArgs {
    /// Connection info from the flags; unset fields stay unset.
    pub fn to_connection_info(&self) -> AwsConnectionInfo {
        AwsConnectionInfo {
            region: self.region.clone(),
            profile: self.profile.clone(),
            endpoint_url: self.endpoint_url.clone(),
            ..Default::default()
        }
    }
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_outputs_parsing() {
        let cli = Cli::try_parse_from([
            "rustible-aws",
            "stack-outputs",
            "--stack-name",
            "web",
            "--region",
            "eu-west-1",
        ])
        .unwrap();

        match cli.command {
            Commands::StackOutputs(args) => {
                assert_eq!(args.stack_name, "web");
                assert_eq!(args.connection.region.as_deref(), Some("eu-west-1"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_rds_auth_token_default_port() {
        let cli = Cli::try_parse_from([
            "rustible-aws",
            "rds-auth-token",
            "--hostname",
            "db",
            "--username",
            "app",
        ])
        .unwrap();

        match cli.command {
            Commands::RdsAuthToken(args) => assert_eq!(args.port, 5432),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_rds_auth_token_rejects_port_zero() {
        let result = Cli::try_parse_from([
            "rustible-aws",
            "rds-auth-token",
            "--hostname",
            "db",
            "--username",
            "app",
            "--port",
            "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_verbosity() {
        let cli = Cli::try_parse_from(["rustible-aws", "-vvvvv", "list"]).unwrap();
        assert_eq!(cli.verbosity(), 3);
    }

    #[test]
    fn test_lookup_terms() {
        let cli = Cli::try_parse_from([
            "rustible-aws",
            "--output",
            "json",
            "lookup",
            "aws_rds_auth_token",
            "hostname=db",
            "username=app",
        ])
        .unwrap();

        assert_eq!(cli.output, OutputFormat::Json);
        match cli.command {
            Commands::Lookup(args) => {
                assert_eq!(args.name, "aws_rds_auth_token");
                assert_eq!(args.terms, vec!["hostname=db", "username=app"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_connection_args() {
        let args = ConnectionArgs {
            profile: Some("ops".to_string()),
            ..Default::default()
        };
        let conn = args.to_connection_info();
        assert_eq!(conn.profile.as_deref(), Some("ops"));
        assert_eq!(conn.region, None);
    }
}

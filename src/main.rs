//! rustible-aws - AWS lookups and modules for Ansible-style automation
//!
//! This is the main entry point for the rustible-aws CLI.

mod cli;

use anyhow::Result;
use cli::commands::{self, CommandContext};
use cli::{Cli, Commands};
use rustible_aws::config::{Config, LogFormat, LoggingConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application version information
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration; a broken config is a usage error
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    };

    // Initialize logging based on verbosity
    init_logging(cli.verbosity(), &config.logging);
    tracing::debug!(version = VERSION, "Starting rustible-aws");

    let ctx = CommandContext::new(&cli, config);

    // Execute the appropriate command
    let result = match &cli.command {
        Commands::RdsAuthToken(args) => args.execute(&ctx).await,
        Commands::StackOutputs(args) => args.execute(&ctx).await,
        Commands::Module(args) => args.execute(&ctx).await,
        Commands::Lookup(args) => args.execute(&ctx).await,
        Commands::List => commands::list(&ctx),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

/// Initialize logging on stderr; stdout carries command results.
///
/// `RUST_LOG` wins, then `-v`, then the configured level.
fn init_logging(verbosity: u8, logging: &LoggingConfig) {
    let filter = match verbosity {
        0 => logging.level.clone().unwrap_or_else(|| "warn".to_string()),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match logging.format.unwrap_or_default() {
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(verbosity >= 3)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init(),
    }
}

//! Module command - Ansible binary module protocol
//!
//! Ansible runs a binary module as `<module> <args-file>`, where the file
//! holds the task arguments as a JSON object, and reads one JSON result
//! object from stdout. Failures are reported in that object too, never as a
//! bare error.

use super::{exit_code, CommandContext};
use anyhow::{Context, Result};
use clap::Parser;
use rustible_aws::aws::AwsConnectionInfo;
use rustible_aws::modules::{ModuleOutput, ModuleParams};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Arguments for the module command
#[derive(Parser, Debug, Clone)]
pub struct ModuleArgs {
    /// Module name
    pub name: String,

    /// JSON file with the module arguments
    pub args_file: PathBuf,
}

impl ModuleArgs {
    /// Execute the module command
    pub async fn execute(&self, ctx: &CommandContext) -> Result<i32> {
        let output = match read_args(&self.args_file) {
            Ok(params) => {
                debug!(module = %self.name, params = params.len(), "Running module");
                let context = ctx.module_context(&AwsConnectionInfo::default());
                ctx.modules
                    .execute(&self.name, &params, &context)
                    .await
                    .unwrap_or_else(|e| e.to_output())
            }
            Err(e) => {
                warn!(error = %e, "Could not read module arguments");
                ModuleOutput::failed(format!("{:#}", e))
            }
        };

        ctx.print_json(&output)?;
        Ok(exit_code(&output))
    }
}

/// Read a module arguments file.
///
/// Accepts a plain JSON object, or one wrapped in `ANSIBLE_MODULE_ARGS`.
pub fn read_args(path: &Path) -> Result<ModuleParams> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read arguments file {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("arguments file {} is not valid JSON", path.display()))?;

    let value = match value {
        serde_json::Value::Object(mut map) if map.contains_key("ANSIBLE_MODULE_ARGS") => map
            .remove("ANSIBLE_MODULE_ARGS")
            .unwrap_or(serde_json::Value::Null),
        other => other,
    };

    match value {
        serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
        _ => anyhow::bail!(
            "arguments file {} must contain a JSON object",
            path.display()
        ),
    }
}

//! CLI tests for rustible-aws
//!
//! These run the compiled binary. Nothing here reaches AWS: every case fails
//! or finishes before a request would be sent.

use assert_cmd::Command;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use std::io::Write;
use tempfile::{tempdir, NamedTempFile, TempDir};

/// Empty config file so host config never leaks into a test.
fn empty_config() -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "# empty").unwrap();
    file
}

fn rustible_aws_cmd(config: &NamedTempFile) -> Command {
    let mut cmd = Command::cargo_bin("rustible-aws").unwrap();
    cmd.arg("-c").arg(config.path());
    for var in [
        "RUSTIBLE_AWS_CONFIG",
        "RUSTIBLE_AWS_REGION",
        "RUSTIBLE_AWS_PROFILE",
        "RUSTIBLE_AWS_ENDPOINT_URL",
        "RUSTIBLE_AWS_MAX_RETRIES",
        "RUSTIBLE_LOG_LEVEL",
        "RUSTIBLE_LOG_FORMAT",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

/// Command with no way to resolve an AWS region.
fn without_region(config: &NamedTempFile, home: &TempDir) -> Command {
    let mut cmd = rustible_aws_cmd(config);
    for var in ["AWS_REGION", "AWS_DEFAULT_REGION", "AWS_PROFILE"] {
        cmd.env_remove(var);
    }
    cmd.env("AWS_CONFIG_FILE", home.path().join("config"))
        .env("AWS_SHARED_CREDENTIALS_FILE", home.path().join("credentials"))
        .env("AWS_EC2_METADATA_DISABLED", "true")
        .env("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE")
        .env("AWS_SECRET_ACCESS_KEY", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY");
    cmd
}

fn args_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", content).unwrap();
    file
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_help() {
    let config = empty_config();
    rustible_aws_cmd(&config)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("stack-outputs"))
        .stdout(predicate::str::contains("rds-auth-token"));
}

#[test]
fn test_list() {
    let config = empty_config();
    rustible_aws_cmd(&config)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("gather_stack_outputs"))
        .stdout(predicate::str::contains("aws_rds_auth_token"));
}

#[test]
fn test_list_json() {
    let config = empty_config();
    let output = rustible_aws_cmd(&config)
        .args(["--output", "json", "list"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let value = stdout_json(&output);
    assert!(value["modules"]["gather_stack_outputs"].is_string());
    assert!(value["lookups"]["aws_rds_auth_token"].is_string());
}

#[test]
fn test_module_missing_stack_name() {
    let config = empty_config();
    let args = args_file(r#"{"region": "us-east-1"}"#);

    let output = rustible_aws_cmd(&config)
        .args(["module", "gather_stack_outputs"])
        .arg(args.path())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(
        stdout_json(&output),
        serde_json::json!({
            "changed": false,
            "failed": true,
            "msg": "missing required arguments: stack_name"
        })
    );
}

#[test]
fn test_module_unsupported_parameter() {
    let config = empty_config();
    let args = args_file(r#"{"stack_name": "web", "bogus": 1}"#);

    let output = rustible_aws_cmd(&config)
        .args(["module", "gather_stack_outputs"])
        .arg(args.path())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let value = stdout_json(&output);
    assert_eq!(value["failed"], serde_json::json!(true));
    assert!(value["msg"]
        .as_str()
        .unwrap()
        .starts_with("Unsupported parameters for (gather_stack_outputs) module: bogus."));
}

#[test]
fn test_module_check_mode_is_skipped() {
    let config = empty_config();
    let args = args_file(r#"{"stack_name": "web", "_ansible_check_mode": true}"#);

    let output = rustible_aws_cmd(&config)
        .args(["module", "gather_stack_outputs"])
        .arg(args.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    let value = stdout_json(&output);
    assert_eq!(value["skipped"], serde_json::json!(true));
    assert_eq!(value["changed"], serde_json::json!(false));
}

#[test]
fn test_module_unknown() {
    let config = empty_config();
    let args = args_file("{}");

    let output = rustible_aws_cmd(&config)
        .args(["module", "nope"])
        .arg(args.path())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout_json(&output)["msg"], serde_json::json!("Module not found: nope"));
}

#[test]
fn test_module_unreadable_args_file() {
    let config = empty_config();
    let dir = tempdir().unwrap();

    let output = rustible_aws_cmd(&config)
        .args(["module", "gather_stack_outputs"])
        .arg(dir.path().join("missing.json"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let value = stdout_json(&output);
    assert_eq!(value["failed"], serde_json::json!(true));
    assert!(value["msg"]
        .as_str()
        .unwrap()
        .contains("failed to read arguments file"));
}

#[test]
fn test_module_missing_region() {
    let config = empty_config();
    let home = tempdir().unwrap();
    let args = args_file(r#"{"stack_name": "web"}"#);

    let output = without_region(&config, &home)
        .args(["module", "gather_stack_outputs"])
        .arg(args.path())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let value = stdout_json(&output);
    assert_eq!(value["failed"], serde_json::json!(true));
    assert_eq!(
        value["msg"],
        serde_json::json!(
            "Region must be specified as a parameter, in AWS_REGION or AWS_DEFAULT_REGION \
             environment variable or in the AWS config file"
        )
    );
}

#[test]
fn test_stack_outputs_bad_endpoint() {
    let config = empty_config();
    let home = tempdir().unwrap();

    let output = without_region(&config, &home)
        .args([
            "--output",
            "json",
            "stack-outputs",
            "--stack-name",
            "web",
            "--region",
            "us-east-1",
            "--endpoint-url",
            "not a url",
        ])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let value = stdout_json(&output);
    let msg = value["msg"].as_str().unwrap();
    assert!(msg.starts_with("Can't establish connection - invalid endpoint_url"));
    assert!(value["exception"].as_str().unwrap().contains("caused by"));
}

#[test]
fn test_lookup_missing_hostname() {
    let config = empty_config();

    rustible_aws_cmd(&config)
        .args(["lookup", "aws_rds_auth_token", "username=app"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Missing required argument: hostname"));
}

#[test]
fn test_lookup_missing_region() {
    let config = empty_config();
    let home = tempdir().unwrap();

    without_region(&config, &home)
        .args(["lookup", "aws_rds_auth_token", "hostname=db", "username=app"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Region must be specified"));
}

#[test]
fn test_rds_auth_token_rejects_bad_port() {
    let config = empty_config();

    rustible_aws_cmd(&config)
        .args([
            "rds-auth-token",
            "--hostname",
            "db",
            "--username",
            "app",
            "--port",
            "70000",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--port"));
}

#[test]
fn test_missing_config_file() {
    let dir = tempdir().unwrap();

    Command::cargo_bin("rustible-aws")
        .unwrap()
        .arg("-c")
        .arg(dir.path().join("absent.toml"))
        .arg("list")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("config file not found"));
}

#[test]
fn test_invalid_log_format_env() {
    let config = empty_config();

    rustible_aws_cmd(&config)
        .env("RUSTIBLE_LOG_FORMAT", "xml")
        .arg("list")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("RUSTIBLE_LOG_FORMAT"));
}

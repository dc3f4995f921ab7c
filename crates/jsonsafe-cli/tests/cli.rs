use std::{fs, path::Path};

use assert_cmd::Command;
use insta::assert_snapshot;
use tempfile::TempDir;

fn cli(dir: &TempDir, args: &[&str]) -> std::process::Output {
    Command::new(assert_cmd::cargo::cargo_bin!("jsonsafe-cli"))
        .current_dir(dir.path())
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("Failed to run the CLI")
}

fn write(dir: &TempDir, name: &str, content: &str) {
    fs::write(dir.path().join(Path::new(name)), content).expect("Failed to write a fixture");
}

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_valid_instance() {
    let dir = TempDir::new().expect("Temporary directory");
    write(&dir, "schema.json", r#"{"type": "integer"}"#);
    write(&dir, "instance.json", "42");
    let output = cli(&dir, &["schema.json", "-i", "instance.json"]);
    assert_eq!(output.status.code(), Some(0));
    assert_snapshot!(stdout(&output), @"instance.json - VALID");
}

#[test]
fn test_invalid_instance() {
    let dir = TempDir::new().expect("Temporary directory");
    write(&dir, "schema.json", r#"{"type": "integer"}"#);
    write(&dir, "instance.json", r#""a""#);
    let output = cli(&dir, &["schema.json", "-i", "instance.json"]);
    assert_eq!(output.status.code(), Some(1));
    assert_snapshot!(stdout(&output), @r#"
    instance.json - INVALID. Errors:
    1. "a" is not of type "integer" (instance: "", keyword: "/type")
    "#);
}

#[test]
fn test_mixed_instances() {
    let dir = TempDir::new().expect("Temporary directory");
    write(&dir, "schema.json", r#"{"maxLength": 3}"#);
    write(&dir, "short.json", r#""abc""#);
    write(&dir, "long.json", r#""abcd""#);
    let output = cli(&dir, &["schema.json", "-i", "short.json", "-i", "long.json"]);
    assert_eq!(output.status.code(), Some(1));
    assert_snapshot!(stdout(&output), @r#"
    short.json - VALID
    long.json - INVALID. Errors:
    1. "abcd" is longer than 3 characters (instance: "", keyword: "/maxLength")
    "#);
}

#[test]
fn test_all_errors() {
    let dir = TempDir::new().expect("Temporary directory");
    write(&dir, "schema.json", r#"{"required": ["a", "b"]}"#);
    write(&dir, "instance.json", "{}");
    let output = cli(&dir, &["schema.json", "-i", "instance.json", "--all-errors"]);
    assert_eq!(output.status.code(), Some(1));
    assert_snapshot!(stdout(&output), @r#"
    instance.json - INVALID. Errors:
    1. "a" is a required property (instance: "", keyword: "/required")
    2. "b" is a required property (instance: "", keyword: "/required")
    "#);
}

#[test]
fn test_json_output() {
    let dir = TempDir::new().expect("Temporary directory");
    write(&dir, "schema.json", r#"{"minimum": 2}"#);
    write(&dir, "instance.json", "1");
    let output = cli(&dir, &["schema.json", "-i", "instance.json", "--output", "json"]);
    assert_eq!(output.status.code(), Some(1));
    let record: serde_json::Value =
        serde_json::from_str(stdout(&output).trim()).expect("JSON output");
    assert_eq!(
        record,
        serde_json::json!({
            "instance": "instance.json",
            "output": {
                "valid": false,
                "errors": [{
                    "keywordLocation": "/minimum",
                    "instanceLocation": "",
                    "error": "1 is less than the minimum of 2"
                }]
            }
        })
    );
}

#[test]
fn test_compile_error() {
    let dir = TempDir::new().expect("Temporary directory");
    write(&dir, "schema.json", r#"{"foo": 1}"#);
    let output = cli(&dir, &["schema.json"]);
    assert_eq!(output.status.code(), Some(2));
    assert_snapshot!(
        stderr(&output),
        @"Error: Schema compilation failed: Unknown keyword 'foo' at '/foo'"
    );
}

#[test]
fn test_permissive_mode() {
    let dir = TempDir::new().expect("Temporary directory");
    write(&dir, "schema.json", r#"{"foo": 1}"#);
    write(&dir, "instance.json", "null");
    let output = cli(&dir, &["schema.json", "-i", "instance.json", "--mode", "permissive"]);
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn test_strict_mode_requires_schema_keyword() {
    let dir = TempDir::new().expect("Temporary directory");
    write(&dir, "schema.json", r#"{"type": "integer"}"#);
    let output = cli(&dir, &["schema.json", "--mode", "strict"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("Strict mode violation"));
}

#[test]
fn test_config_file() {
    let dir = TempDir::new().expect("Temporary directory");
    write(&dir, "schema.json", r#"{"foo": 1, "type": "string"}"#);
    write(&dir, "config.json", r#"{"mode": "permissive"}"#);
    write(&dir, "instance.json", "1");
    let output = cli(&dir, &["schema.json", "-i", "instance.json", "--config", "config.json"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_invalid_config_file() {
    let dir = TempDir::new().expect("Temporary directory");
    write(&dir, "schema.json", "{}");
    write(&dir, "config.json", r#"{"mode": "lenient"}"#);
    let output = cli(&dir, &["schema.json", "--config", "config.json"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).starts_with("Error: Invalid configuration in config.json"));
}

#[test]
fn test_schema_ref() {
    let dir = TempDir::new().expect("Temporary directory");
    write(&dir, "schema.json", r#"{"$ref": "https://example.com/name.json"}"#);
    write(&dir, "name.json", r#"{"type": "string", "maxLength": 2}"#);
    write(&dir, "instance.json", r#""abc""#);
    let output = cli(
        &dir,
        &[
            "schema.json",
            "-i",
            "instance.json",
            "--schema-ref",
            "https://example.com/name.json=name.json",
        ],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("is longer than 2 characters"));
}

#[test]
fn test_yaml_schema() {
    let dir = TempDir::new().expect("Temporary directory");
    write(&dir, "schema.yaml", "type: object\nrequired:\n  - name\n");
    write(&dir, "instance.json", r#"{"name": "x"}"#);
    let output = cli(&dir, &["schema.yaml", "-i", "instance.json"]);
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn test_listing() {
    let dir = TempDir::new().expect("Temporary directory");
    write(&dir, "schema.json", r#"{"minimum": 2}"#);
    let output = cli(&dir, &["schema.json", "--listing"]);
    assert_eq!(output.status.code(), Some(0));
    let listing = stdout(&output);
    assert!(listing.contains("function validate(data) {"));
    assert!(listing.ends_with("})()\n\n"));
}

#[test]
fn test_missing_schema_file() {
    let dir = TempDir::new().expect("Temporary directory");
    let output = cli(&dir, &["missing.json"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).starts_with("Error: Failed to read missing.json"));
}

#[test]
fn test_malformed_instance() {
    let dir = TempDir::new().expect("Temporary directory");
    write(&dir, "schema.json", "{}");
    write(&dir, "instance.json", "{");
    let output = cli(&dir, &["schema.json", "-i", "instance.json"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).starts_with("Error: Failed to parse instance.json"));
}

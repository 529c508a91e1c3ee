//! Integration tests for CLI commands.
//!
//! Every test runs against a throwaway project directory with its own
//! capmask.toml, and with HOME pointed inside it so no user config leaks in.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const PROJECT_CONFIG: &str = r#"
[catalog]
subjects = ["all", "Order", "Invoice"]
actions = ["CREATE", "READ", "UPDATE", "DELETE"]

[guard]
audit = false

[operations.health]
requires_auth = false

[operations."orders.create"]
requires_auth = true
abilities = [{ subject = "Order", actions = ["CREATE"] }]

[operations."orders.delete"]
requires_auth = true
abilities = [{ subject = "Order", actions = ["DELETE"] }]

[operations."orders.export"]
requires_auth = true
abilities = [
    { subject = "Order", actions = ["READ"] },
    { subject = "Invoice", actions = ["READ"] },
]

[operations."orders.misconfigured"]
requires_auth = true
abilities = []
"#;

/// Identity holding {CREATE, UPDATE} on Order (subject index 1).
const CLERK_PAYLOAD: &str = r#"{"identity_id":7,"subject_permission_map":{"1":5},"issued_at":0}"#;

fn project() -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("capmask.toml"), PROJECT_CONFIG).unwrap();
    fs::write(temp.path().join("clerk.json"), CLERK_PAYLOAD).unwrap();
    temp
}

fn capmask(project: &Path) -> Command {
    let mut cmd = Command::cargo_bin("capmask").unwrap();
    cmd.env("HOME", project)
        .env("XDG_CONFIG_HOME", project.join(".config"))
        .args(["--no-color", "--project", project.to_str().unwrap()]);
    cmd
}

fn clerk(project: &Path) -> String {
    project.join("clerk.json").to_str().unwrap().to_string()
}

// ============================================================================
// Catalog / Codec Commands
// ============================================================================

#[test]
fn catalog_text_lists_subjects_and_actions() {
    let temp = project();

    capmask(temp.path())
        .arg("catalog")
        .assert()
        .success()
        .stdout(predicate::str::contains("Invoice"))
        .stdout(predicate::str::contains("DELETE"))
        .stdout(predicate::str::contains("0b1000"));
}

#[test]
fn catalog_json_is_the_snapshot() {
    let temp = project();

    let output = capmask(temp.path())
        .args(["catalog", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let snapshot: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(snapshot["subjects"][1], "Order");
    assert_eq!(snapshot["actions"][3], "DELETE");
}

#[test]
fn encode_is_order_independent() {
    let temp = project();

    capmask(temp.path())
        .args(["encode", "UPDATE", "CREATE"])
        .assert()
        .success()
        .stdout(predicate::str::contains("5 0b101"));
}

#[test]
fn encode_rejects_unknown_action() {
    let temp = project();

    capmask(temp.path())
        .args(["encode", "CREATE", "PURGE"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("PURGE"));
}

#[test]
fn decode_lists_actions_in_catalog_order() {
    let temp = project();

    capmask(temp.path())
        .args(["decode", "0b0101"])
        .assert()
        .success()
        .stdout(predicate::str::diff("CREATE\nUPDATE\n"));
}

#[test]
fn decode_ignores_bits_beyond_catalog() {
    let temp = project();

    capmask(temp.path())
        .args(["decode", "0x12"])
        .assert()
        .success()
        .stdout(predicate::str::diff("READ\n"))
        .stderr(predicate::str::contains("beyond the catalog"));
}

// ============================================================================
// Check Command
// ============================================================================

#[test]
fn check_allows_granted_operation() {
    let temp = project();

    capmask(temp.path())
        .args(["check", "orders.create", "--payload", &clerk(temp.path())])
        .assert()
        .success()
        .stdout(predicate::str::contains("ALLOW"));
}

#[test]
fn check_forbids_missing_ability() {
    let temp = project();

    capmask(temp.path())
        .args(["check", "orders.delete", "--payload", &clerk(temp.path())])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("DENY forbidden"));
}

#[test]
fn check_multiple_groups_is_bad_request() {
    let temp = project();

    capmask(temp.path())
        .args(["check", "orders.export", "--payload", &clerk(temp.path())])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("DENY bad request"));
}

#[test]
fn check_empty_ability_list_is_forbidden() {
    let temp = project();

    capmask(temp.path())
        .args(["check", "orders.misconfigured", "--payload", &clerk(temp.path())])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("no predefined ability"));
}

#[test]
fn check_anonymous_request() {
    let temp = project();

    capmask(temp.path())
        .args(["check", "health"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ALLOW"));

    capmask(temp.path())
        .args(["check", "orders.create"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("DENY unauthorized: authentication required"));
}

#[test]
fn check_unknown_operation_fails_closed() {
    let temp = project();

    capmask(temp.path())
        .args(["check", "orders.purge", "--payload", &clerk(temp.path())])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("DENY forbidden"));
}

#[test]
fn check_rejects_malformed_payload() {
    let temp = project();
    let payload = temp.path().join("broken.json");
    fs::write(&payload, "{not json").unwrap();

    capmask(temp.path())
        .args(["check", "orders.create", "--payload", payload.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid payload"));
}

// ============================================================================
// Config Commands
// ============================================================================

#[test]
fn config_show_in_each_format() {
    let temp = project();

    capmask(temp.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("orders.export"));

    capmask(temp.path())
        .args(["config", "show", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"requires_auth\": true"));

    capmask(temp.path())
        .args(["config", "show", "--format", "toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[catalog]"));
}

#[test]
fn config_validate_accepts_project() {
    let temp = project();

    capmask(temp.path())
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"));
}

#[test]
fn config_validate_rejects_unknown_subject() {
    let temp = project();
    fs::write(
        temp.path().join("capmask.local.toml"),
        r#"
[operations."carts.list"]
requires_auth = true
abilities = [{ subject = "Cart", actions = ["READ"] }]
"#,
    )
    .unwrap();

    capmask(temp.path())
        .args(["config", "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown subject"));
}

#[test]
fn uninitialized_project_warns_and_uses_defaults() {
    let temp = TempDir::new().unwrap();

    capmask(temp.path())
        .args(["encode", "READ"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 0b10"))
        .stderr(predicate::str::contains("no capmask.toml"));
}

#[test]
fn explicit_config_file_bypasses_project() {
    let temp = project();
    let file = temp.path().join("alt.toml");
    fs::write(
        &file,
        r#"
[catalog]
subjects = ["all"]
actions = ["VIEW", "EDIT"]
"#,
    )
    .unwrap();

    capmask(temp.path())
        .args(["--config", file.to_str().unwrap(), "encode", "EDIT"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 0b10"));
}

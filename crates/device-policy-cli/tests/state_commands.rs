// device-policy-cli/tests/state_commands.rs
// ============================================================================
// Module: CLI State Command Tests
// Description: Integration tests for config validation and state inspection.
// Purpose: Ensure the binary reports persisted state and fails closed.
// Dependencies: device-policy-cli binary
// ============================================================================

//! ## Overview
//! Runs the CLI binary against a temporary `SQLite` store populated through
//! the policy engine.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;

use device_policy_core::EnforcingAdmin;
use device_policy_core::NoopNotifier;
use device_policy_core::PolicyCatalog;
use device_policy_core::PolicyEngine;
use device_policy_core::PolicyEngineConfig;
use device_policy_core::PolicyKey;
use device_policy_core::PolicyValue;
use device_policy_core::UserId;
use device_policy_core::catalog::AUTO_TIMEZONE_POLICY;
use device_policy_core::catalog::KEYGUARD_DISABLED_FEATURES_POLICY;
use device_policy_store_sqlite::SqlitePolicyStore;
use device_policy_store_sqlite::SqliteStoreConfig;
use rusqlite::Connection;
use rusqlite::params;
use serde_json::Value;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn device_policy_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_device-policy"))
}

/// Writes a sqlite-backed config and returns its path.
fn write_config(root: &Path) -> PathBuf {
    let config_path = root.join("device-policy.toml");
    let db_path = root.join("policies.db");
    let body = format!("[store]\ntype = \"sqlite\"\npath = {:?}\n", db_path.to_string_lossy());
    fs::write(&config_path, body).expect("write config");
    config_path
}

/// Stores two policies (two snapshot versions) in the configured database.
fn populate(root: &Path) {
    let store = SqlitePolicyStore::new(SqliteStoreConfig::new(root.join("policies.db"))).unwrap();
    let engine = PolicyEngine::open(
        PolicyCatalog::builtin(),
        store,
        NoopNotifier,
        PolicyEngineConfig::default(),
    )
    .unwrap();
    let dpc = EnforcingAdmin::dpc("com.example.dpc", UserId::new(10));
    engine
        .set_policy(
            &PolicyKey::no_args(AUTO_TIMEZONE_POLICY),
            UserId::ALL,
            &dpc,
            PolicyValue::Boolean(true),
        )
        .unwrap();
    engine
        .set_policy(
            &PolicyKey::no_args(KEYGUARD_DISABLED_FEATURES_POLICY),
            UserId::new(10),
            &dpc,
            PolicyValue::Integer(6),
        )
        .unwrap();
}

fn run(args: &[&str], config: &Path) -> Output {
    Command::new(device_policy_bin())
        .args(args)
        .args(["--config", config.to_string_lossy().as_ref()])
        .env_remove("DEVICE_POLICY_CONFIG")
        .output()
        .expect("run device-policy")
}

// ============================================================================
// SECTION: Tests
// ============================================================================

/// Verifies config validation succeeds and names the backend.
#[test]
fn cli_config_validate_accepts_valid_config() {
    let root = TempDir::new().unwrap();
    let config = write_config(root.path());
    let output = run(&["config", "validate"], &config);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("config valid (store: sqlite)"));
}

/// Verifies invalid configuration fails closed.
#[test]
fn cli_config_validate_rejects_invalid_config() {
    let root = TempDir::new().unwrap();
    let config = root.path().join("device-policy.toml");
    fs::write(&config, "[store]\ntype = \"sqlite\"\n").unwrap();
    let output = run(&["config", "validate"], &config);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("sqlite store requires path"));
}

/// Verifies state commands refuse the in-memory backend.
#[test]
fn cli_state_requires_sqlite_store() {
    let root = TempDir::new().unwrap();
    let config = root.path().join("device-policy.toml");
    fs::write(&config, "").unwrap();
    let output = run(&["state", "history"], &config);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("require a sqlite store"));
}

/// Verifies `state show` prints canonical JSON and honors bucket filters.
#[test]
fn cli_state_show_prints_snapshot() {
    let root = TempDir::new().unwrap();
    let config = write_config(root.path());
    populate(root.path());

    let output = run(&["state", "show"], &config);
    assert!(output.status.success());
    let snapshot: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(snapshot["sequence"], 2);
    assert_eq!(snapshot["policies"].as_array().unwrap().len(), 2);

    let output = run(&["state", "show", "--global"], &config);
    let global: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(global["policies"].as_array().unwrap().len(), 1);

    let output = run(&["state", "show", "--user", "10"], &config);
    let local: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(local["policies"].as_array().unwrap().len(), 1);
}

/// Verifies `state history` lists one JSON line per version.
#[test]
fn cli_state_history_lists_versions() {
    let root = TempDir::new().unwrap();
    let config = write_config(root.path());
    populate(root.path());

    let output = run(&["state", "history"], &config);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let versions: Vec<Value> =
        stdout.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0]["version"], 2);
    assert_eq!(versions[0]["hash_algorithm"], "sha256");
}

/// Verifies `state verify` accepts an untouched store and rejects tampering.
#[test]
fn cli_state_verify_detects_tampering() {
    let root = TempDir::new().unwrap();
    let config = write_config(root.path());

    let empty = run(&["state", "verify"], &config);
    assert!(empty.status.success());
    assert!(String::from_utf8_lossy(&empty.stdout).contains("no snapshot stored"));

    populate(root.path());
    let output = run(&["state", "verify"], &config);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("snapshot verified (sequence: 2"));

    let connection = Connection::open(root.path().join("policies.db")).unwrap();
    connection
        .execute(
            "UPDATE snapshot_versions SET snapshot_hash = ?1 WHERE version = 2",
            params!["0".repeat(64)],
        )
        .unwrap();
    drop(connection);
    let output = run(&["state", "verify"], &config);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("corruption"));
}

/// Verifies `state verify` writes audit events when auditing is enabled.
#[test]
fn cli_state_verify_writes_configured_audit_log() {
    let root = TempDir::new().unwrap();
    let config = write_config(root.path());
    let audit_path = root.path().join("audit.jsonl");
    let mut body = fs::read_to_string(&config).unwrap();
    body.push_str(&format!(
        "[audit]\nenabled = true\npath = {:?}\n",
        audit_path.to_string_lossy()
    ));
    fs::write(&config, body).unwrap();
    populate(root.path());

    let output = run(&["state", "verify"], &config);
    assert!(output.status.success());
    let log = fs::read_to_string(&audit_path).unwrap();
    let event: Value = serde_json::from_str(log.lines().next().unwrap()).unwrap();
    assert_eq!(event["event"], "state_loaded");
}

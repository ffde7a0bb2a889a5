//! Config load validation tests for device-policy-config.
// device-policy-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards (path, size, encoding).
// Purpose: Ensure config input handling is strict and fail-closed.
// =============================================================================

use std::io::Write;
use std::path::Path;

use device_policy_config::DevicePolicyConfig;
use device_policy_config::MAX_CONFIG_FILE_SIZE;
use device_policy_config::StoreType;
use tempfile::NamedTempFile;

mod common;

use common::assert_invalid;

type TestResult = Result<(), String>;

#[test]
fn load_rejects_path_too_long() -> TestResult {
    let long_path = "a".repeat(5_000);
    assert_invalid(
        DevicePolicyConfig::load(Some(Path::new(&long_path))),
        "config path exceeds max length",
    )
}

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    assert_invalid(
        DevicePolicyConfig::load(Some(Path::new(&long_component))),
        "config path component too long",
    )
}

#[test]
fn load_rejects_missing_file() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let missing = dir.path().join("absent.toml");
    assert_invalid(DevicePolicyConfig::load(Some(&missing)), "config io error")
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    let payload = vec![b'#'; MAX_CONFIG_FILE_SIZE + 1];
    file.write_all(&payload).map_err(|err| err.to_string())?;
    assert_invalid(DevicePolicyConfig::load(Some(file.path())), "config file exceeds size limit")
}

#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&[0xFF, 0xFE, 0xFF]).map_err(|err| err.to_string())?;
    assert_invalid(DevicePolicyConfig::load(Some(file.path())), "config file must be utf-8")
}

#[test]
fn load_rejects_malformed_toml() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(b"[store\ntype = ").map_err(|err| err.to_string())?;
    assert_invalid(DevicePolicyConfig::load(Some(file.path())), "config parse error")
}

#[test]
fn load_reads_full_config() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let config_path = dir.path().join("device-policy.toml");
    let body = r#"
[store]
type = "sqlite"
path = "state/policies.db"
journal_mode = "delete"
sync_mode = "normal"
max_versions = 16

[notifications]
channel_capacity = 8
delivery_timeout_ms = 250

[audit]
enabled = true
path = "audit/policy.jsonl"

[engine]
max_entries_per_admin = 500
"#;
    std::fs::write(&config_path, body).map_err(|err| err.to_string())?;
    let config = DevicePolicyConfig::load(Some(&config_path)).map_err(|err| err.to_string())?;
    if config.store.store_type != StoreType::Sqlite {
        return Err("expected sqlite store".to_string());
    }
    let sqlite = config.store.sqlite_config().ok_or("missing sqlite config")?;
    if sqlite.max_versions != Some(16) || sqlite.busy_timeout_ms != 5_000 {
        return Err("sqlite settings not carried over".to_string());
    }
    if config.notifications.channel_capacity != 8
        || config.notifications.delivery_timeout_ms != 250
    {
        return Err("notification settings not parsed".to_string());
    }
    if config.audit.active_path() != Some(Path::new("audit/policy.jsonl")) {
        return Err("audit path not parsed".to_string());
    }
    if config.engine.engine_config().max_entries_per_admin != Some(500) {
        return Err("engine limit not parsed".to_string());
    }
    if config.source_modified_at.is_none() {
        return Err("expected source metadata".to_string());
    }
    Ok(())
}

//! Section validation tests for device-policy-config.
// device-policy-config/tests/section_validation.rs
// =============================================================================
// Module: Section Validation Tests
// Description: Validate store, notification, audit, and engine constraints.
// Purpose: Ensure every section rejects out-of-range settings.
// =============================================================================

use std::path::PathBuf;

use device_policy_config::DevicePolicyConfig;
use device_policy_config::MAX_CHANNEL_CAPACITY;
use device_policy_config::StoreType;

mod common;

use common::assert_invalid;

type TestResult = Result<(), String>;

// ============================================================================
// SECTION: Store
// ============================================================================

#[test]
fn memory_store_rejects_path() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.store.store_type = StoreType::Memory;
    config.store.path = Some(PathBuf::from("policies.db"));
    assert_invalid(config.validate(), "memory store must not set path")
}

#[test]
fn sqlite_store_requires_path() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.store.store_type = StoreType::Sqlite;
    assert_invalid(config.validate(), "sqlite store requires path")
}

#[test]
fn sqlite_store_rejects_zero_max_versions() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.store.store_type = StoreType::Sqlite;
    config.store.path = Some(PathBuf::from("policies.db"));
    config.store.max_versions = Some(0);
    assert_invalid(config.validate(), "store max_versions must be greater than zero")
}

#[test]
fn sqlite_store_rejects_overlong_component() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.store.store_type = StoreType::Sqlite;
    config.store.path = Some(PathBuf::from("a".repeat(300)));
    assert_invalid(config.validate(), "store path component too long")
}

#[test]
fn unknown_store_type_fails_parse() -> TestResult {
    assert_invalid(
        DevicePolicyConfig::from_toml_str("[store]\ntype = \"redis\"\n"),
        "config parse error",
    )
}

// ============================================================================
// SECTION: Notifications
// ============================================================================

#[test]
fn channel_capacity_bounds_are_enforced() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.notifications.channel_capacity = 0;
    assert_invalid(config.validate(), "notifications.channel_capacity")?;
    config.notifications.channel_capacity = MAX_CHANNEL_CAPACITY + 1;
    assert_invalid(config.validate(), "notifications.channel_capacity")?;
    config.notifications.channel_capacity = MAX_CHANNEL_CAPACITY;
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn delivery_timeout_bounds_are_enforced() -> TestResult {
    assert_invalid(
        DevicePolicyConfig::from_toml_str("[notifications]\ndelivery_timeout_ms = 0\n"),
        "notifications.delivery_timeout_ms must be between 1 and 600000 milliseconds",
    )?;
    assert_invalid(
        DevicePolicyConfig::from_toml_str("[notifications]\ndelivery_timeout_ms = 600001\n"),
        "notifications.delivery_timeout_ms",
    )
}

// ============================================================================
// SECTION: Audit and Engine
// ============================================================================

#[test]
fn enabled_audit_requires_path() -> TestResult {
    assert_invalid(
        DevicePolicyConfig::from_toml_str("[audit]\nenabled = true\n"),
        "enabled audit requires path",
    )
}

#[test]
fn disabled_audit_ignores_path() -> TestResult {
    let config = DevicePolicyConfig::from_toml_str("[audit]\npath = \"audit.jsonl\"\n")
        .map_err(|err| err.to_string())?;
    if config.audit.active_path().is_some() {
        return Err("disabled audit should not expose a path".to_string());
    }
    Ok(())
}

#[test]
fn zero_admin_entry_limit_is_rejected() -> TestResult {
    assert_invalid(
        DevicePolicyConfig::from_toml_str("[engine]\nmax_entries_per_admin = 0\n"),
        "engine.max_entries_per_admin must be greater than zero",
    )
}

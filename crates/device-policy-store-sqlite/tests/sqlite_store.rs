// device-policy-store-sqlite/tests/sqlite_store.rs
// ============================================================================
// Module: SQLite Store Integrity Tests
// Description: Durable snapshot store behavior through a live policy engine.
// Purpose: Validate path safety, schema versioning, retention, and corruption
//          detection.
// ============================================================================

//! ## Overview
//! Integration tests for [`device_policy_store_sqlite::SqlitePolicyStore`]:
//! - Path safety checks and configuration limits
//! - Reload equivalence across engine restarts
//! - Version history, explicit loads, and retention pruning
//! - Hash and schema tampering detection

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
    reason = "Test-only assertions and helpers are permitted."
)]

use std::path::Path;
use std::sync::Arc;

use device_policy_core::DEFAULT_HASH_ALGORITHM;
use device_policy_core::EnforcingAdmin;
use device_policy_core::LockTaskPolicy;
use device_policy_core::NoopNotifier;
use device_policy_core::PolicyCatalog;
use device_policy_core::PolicyEngine;
use device_policy_core::PolicyEngineConfig;
use device_policy_core::PolicyEngineError;
use device_policy_core::PolicyKey;
use device_policy_core::PolicyStateStore;
use device_policy_core::PolicyValue;
use device_policy_core::StoreError;
use device_policy_core::UserId;
use device_policy_core::catalog::AUTO_TIMEZONE_POLICY;
use device_policy_core::catalog::KEYGUARD_DISABLED_FEATURES_POLICY;
use device_policy_core::catalog::LOCK_TASK_POLICY;
use device_policy_store_sqlite::SqlitePolicyStore;
use device_policy_store_sqlite::SqliteStoreConfig;
use device_policy_store_sqlite::SqliteStoreError;
use device_policy_store_sqlite::SqliteStoreMode;
use device_policy_store_sqlite::SqliteSyncMode;
use rusqlite::Connection;
use rusqlite::params;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Local test user.
const USER: UserId = UserId::new(10);

type SqliteEngine = PolicyEngine<Arc<SqlitePolicyStore>, NoopNotifier>;

fn config_for_path(path: &Path, max_versions: Option<u64>) -> SqliteStoreConfig {
    SqliteStoreConfig {
        path: path.to_path_buf(),
        busy_timeout_ms: 1_000,
        journal_mode: SqliteStoreMode::Wal,
        sync_mode: SqliteSyncMode::Full,
        max_versions,
    }
}

fn store_for(path: &Path, max_versions: Option<u64>) -> Arc<SqlitePolicyStore> {
    Arc::new(SqlitePolicyStore::new(config_for_path(path, max_versions)).expect("store init"))
}

fn engine_for(store: &Arc<SqlitePolicyStore>) -> SqliteEngine {
    PolicyEngine::open(
        PolicyCatalog::builtin(),
        Arc::clone(store),
        NoopNotifier,
        PolicyEngineConfig::default(),
    )
    .expect("engine open")
}

fn dpc() -> EnforcingAdmin {
    EnforcingAdmin::dpc("com.example.dpc", USER)
}

/// Applies three state-changing writes (three saved versions).
fn populate(engine: &SqliteEngine) {
    engine
        .set_policy(
            &PolicyKey::no_args(LOCK_TASK_POLICY),
            USER,
            &dpc(),
            PolicyValue::LockTask(LockTaskPolicy::new(["com.kiosk"], 0)),
        )
        .unwrap();
    engine
        .set_policy(
            &PolicyKey::no_args(AUTO_TIMEZONE_POLICY),
            UserId::ALL,
            &dpc(),
            PolicyValue::Boolean(true),
        )
        .unwrap();
    engine
        .set_policy(
            &PolicyKey::no_args(KEYGUARD_DISABLED_FEATURES_POLICY),
            USER,
            &dpc(),
            PolicyValue::Integer(6),
        )
        .unwrap();
}

// ============================================================================
// SECTION: Path Validation
// ============================================================================

#[test]
fn sqlite_store_rejects_directory_path() {
    let temp = TempDir::new().unwrap();
    let Err(err) = SqlitePolicyStore::new(config_for_path(temp.path(), None)) else {
        panic!("expected invalid directory path to fail");
    };
    assert!(matches!(err, SqliteStoreError::Invalid(_)));
}

#[test]
fn sqlite_store_rejects_zero_max_versions() {
    let temp = TempDir::new().unwrap();
    let Err(err) = SqlitePolicyStore::new(config_for_path(&temp.path().join("store.db"), Some(0)))
    else {
        panic!("expected zero retention to fail");
    };
    assert!(matches!(err, SqliteStoreError::Invalid(_)));
}

#[test]
fn sqlite_store_creates_parent_directories() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("deeper").join("store.db");
    let store = store_for(&path, None);
    assert!(path.exists());
    assert_eq!(store.latest_version().unwrap(), None);
    assert!(store.load().unwrap().is_none());
}

// ============================================================================
// SECTION: Round Trip
// ============================================================================

#[test]
fn engine_state_survives_reopen() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.db");
    let (before, snapshot) = {
        let store = store_for(&path, None);
        let engine = engine_for(&store);
        populate(&engine);
        (engine.device_policy_state().unwrap(), engine.snapshot().unwrap())
    };

    let store = store_for(&path, None);
    let reopened = engine_for(&store);
    assert_eq!(reopened.device_policy_state().unwrap(), before);
    assert_eq!(reopened.snapshot().unwrap(), snapshot);
    assert_eq!(store.load().unwrap(), Some(snapshot));
}

#[test]
fn history_lists_versions_newest_first() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.db"), None);
    let engine = engine_for(&store);
    populate(&engine);

    let versions = store.list_versions().unwrap();
    assert_eq!(versions.iter().map(|summary| summary.version).collect::<Vec<_>>(), vec![3, 2, 1]);
    assert_eq!(versions[0].sequence, 3);
    assert!(versions.iter().all(|summary| summary.hash_algorithm == "sha256"));

    let latest = engine.snapshot().unwrap();
    let (bytes, digest) = latest.canonical_bytes_with_digest(DEFAULT_HASH_ALGORITHM).unwrap();
    assert_eq!(versions[0].snapshot_hash, digest.value);
    assert_eq!(versions[0].snapshot_bytes, bytes.len());

    let first = store.load_version(1).unwrap().unwrap();
    assert_eq!(first.sequence, 1);
    assert_eq!(first.policies.len(), 1);
    assert!(store.load_version(9).unwrap().is_none());
    assert!(matches!(store.load_version(0), Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn idempotent_set_does_not_add_version() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.db"), None);
    let engine = engine_for(&store);
    populate(&engine);
    engine
        .set_policy(
            &PolicyKey::no_args(KEYGUARD_DISABLED_FEATURES_POLICY),
            USER,
            &dpc(),
            PolicyValue::Integer(6),
        )
        .unwrap();
    assert_eq!(store.latest_version().unwrap(), Some(3));
}

// ============================================================================
// SECTION: Retention
// ============================================================================

#[test]
fn retention_keeps_newest_versions() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.db"), Some(2));
    let engine = engine_for(&store);
    populate(&engine);
    let versions = store.list_versions().unwrap();
    assert_eq!(versions.iter().map(|summary| summary.version).collect::<Vec<_>>(), vec![3, 2]);
    assert!(store.load_version(1).unwrap().is_none());
}

#[test]
fn prune_versions_deletes_older_entries() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.db"), None);
    let engine = engine_for(&store);
    populate(&engine);
    assert!(matches!(store.prune_versions(0), Err(SqliteStoreError::Invalid(_))));
    assert_eq!(store.prune_versions(1).unwrap(), 2);
    assert_eq!(store.prune_versions(1).unwrap(), 0);
    assert_eq!(store.latest_version().unwrap(), Some(3));
    assert_eq!(store.load().unwrap(), Some(engine.snapshot().unwrap()));
}

// ============================================================================
// SECTION: Tampering
// ============================================================================

#[test]
fn tampered_payload_fails_closed() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.db");
    {
        let store = store_for(&path, None);
        populate(&engine_for(&store));
    }
    let connection = Connection::open(&path).unwrap();
    connection
        .execute(
            "UPDATE snapshot_versions SET snapshot_json = ?1 WHERE version = 3",
            params![b"{}".as_slice()],
        )
        .unwrap();
    drop(connection);

    let store = store_for(&path, None);
    assert!(matches!(store.load(), Err(StoreError::Corrupt(_))));
    let err = PolicyEngine::open(
        PolicyCatalog::builtin(),
        Arc::clone(&store),
        NoopNotifier,
        PolicyEngineConfig::default(),
    )
    .err()
    .unwrap();
    assert!(matches!(err, PolicyEngineError::Store(StoreError::Corrupt(_))));
    assert!(store.load_version(2).unwrap().is_some());
}

#[test]
fn mismatched_sequence_column_is_corrupt() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.db");
    {
        let store = store_for(&path, None);
        populate(&engine_for(&store));
    }
    let connection = Connection::open(&path).unwrap();
    connection.execute("UPDATE snapshot_versions SET sequence = 99 WHERE version = 3", []).unwrap();
    drop(connection);

    let store = store_for(&path, None);
    assert!(matches!(store.load_version(3), Err(SqliteStoreError::Corrupt(_))));
}

#[test]
fn unknown_hash_algorithm_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.db");
    {
        let store = store_for(&path, None);
        populate(&engine_for(&store));
    }
    let connection = Connection::open(&path).unwrap();
    connection.execute("UPDATE snapshot_versions SET hash_algorithm = 'md5'", []).unwrap();
    drop(connection);

    let store = store_for(&path, None);
    assert!(matches!(store.load(), Err(StoreError::Invalid(_))));
}

#[test]
fn unsupported_schema_version_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.db");
    drop(store_for(&path, None));
    let connection = Connection::open(&path).unwrap();
    connection.execute("UPDATE store_meta SET version = 42", []).unwrap();
    drop(connection);

    let Err(err) = SqlitePolicyStore::new(config_for_path(&path, None)) else {
        panic!("expected schema version mismatch");
    };
    assert!(matches!(err, SqliteStoreError::VersionMismatch(_)));
}

#[test]
fn delete_journal_mode_round_trips() {
    let temp = TempDir::new().unwrap();
    let mut config = SqliteStoreConfig::new(temp.path().join("store.db"));
    config.journal_mode = SqliteStoreMode::Delete;
    config.sync_mode = SqliteSyncMode::Normal;
    let store = Arc::new(SqlitePolicyStore::new(config).unwrap());
    let engine = engine_for(&store);
    populate(&engine);
    assert_eq!(store.load().unwrap(), Some(engine.snapshot().unwrap()));
    assert_eq!(store.config().journal_mode, SqliteStoreMode::Delete);
}

// device-policy-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Policy State Store
// Description: Durable PolicyStateStore backed by SQLite WAL.
// Purpose: Persist device policy snapshots with deterministic serialization.
// Dependencies: device-policy-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements a durable [`PolicyStateStore`] using `SQLite`. Each
//! save writes the canonical JSON snapshot into an append-only version table
//! together with its digest. Loads recompute the digest and fail closed on any
//! mismatch, so a tampered or truncated database never reaches the engine.
//! Invariants:
//! - Version numbers start at 1 and increase by one per save.
//! - The newest version is never pruned by retention.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use device_policy_core::DEFAULT_HASH_ALGORITHM;
use device_policy_core::DevicePolicySnapshot;
use device_policy_core::HashAlgorithm;
use device_policy_core::PolicyStateStore;
use device_policy_core::StoreError;
use device_policy_core::hashing::hash_bytes;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum snapshot payload accepted by the store.
pub const MAX_SNAPSHOT_BYTES: usize = 64 * 1024 * 1024;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode.
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` policy state store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `max_versions`, when set, must be greater than zero.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Optional number of snapshot versions to keep (older versions pruned).
    #[serde(default)]
    pub max_versions: Option<u64>,
}

impl SqliteStoreConfig {
    /// Returns a configuration with defaults for every field except `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            max_versions: None,
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding raw snapshot payloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption or hash mismatch.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data or configuration.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Snapshot payload exceeded the size limit.
    #[error("sqlite store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::Invalid(format!(
                "snapshot_json exceeds size limit: {actual_bytes} bytes (max {max_bytes})"
            )),
        }
    }
}

/// Maps a rusqlite error into [`SqliteStoreError::Db`].
#[allow(clippy::needless_pass_by_value, reason = "Used as a map_err adapter.")]
fn db_error(err: rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed policy state store with WAL support.
///
/// # Invariants
/// - Snapshot loads verify stored hashes before deserialization.
/// - `SQLite` connection access is serialized through a mutex.
#[derive(Debug)]
pub struct SqlitePolicyStore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Connection guarded by a mutex.
    connection: Mutex<Connection>,
}

/// Summary metadata for a stored snapshot version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotVersionSummary {
    /// Stored version number.
    pub version: i64,
    /// Engine mutation sequence recorded in the snapshot.
    pub sequence: u64,
    /// Timestamp when the version was saved (unix ms).
    pub saved_at: i64,
    /// Stored snapshot hash.
    pub snapshot_hash: String,
    /// Stored hash algorithm label.
    pub hash_algorithm: String,
    /// Stored payload length in bytes.
    pub snapshot_bytes: usize,
}

/// Raw payload for a stored snapshot.
struct SnapshotPayload {
    /// Version the payload was read from.
    version: i64,
    /// Sequence column recorded at save time.
    sequence: i64,
    /// Stored canonical JSON bytes.
    bytes: Vec<u8>,
    /// Stored hash value for the payload.
    hash_value: String,
    /// Stored hash algorithm label.
    hash_algorithm: String,
}

impl SqlitePolicyStore {
    /// Opens an `SQLite`-backed policy state store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path is unsafe, the configuration
    /// is invalid, or the database cannot be opened or initialized.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        if config.max_versions == Some(0) {
            return Err(SqliteStoreError::Invalid(
                "max_versions must be greater than zero".to_string(),
            ));
        }
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            config,
            connection: Mutex::new(connection),
        })
    }

    /// Returns the store configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Lists all stored snapshot versions, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] if the query fails or a stored row is
    /// malformed.
    pub fn list_versions(&self) -> Result<Vec<SnapshotVersionSummary>, SqliteStoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare(
                "SELECT version, sequence, saved_at, snapshot_hash, hash_algorithm, \
                 length(snapshot_json) FROM snapshot_versions ORDER BY version DESC",
            )
            .map_err(db_error)?;
        let rows = stmt
            .query_map([], |row| {
                let version: i64 = row.get(0)?;
                let sequence: i64 = row.get(1)?;
                let saved_at: i64 = row.get(2)?;
                let snapshot_hash: String = row.get(3)?;
                let hash_algorithm: String = row.get(4)?;
                let length: i64 = row.get(5)?;
                Ok((version, sequence, saved_at, snapshot_hash, hash_algorithm, length))
            })
            .map_err(db_error)?;
        let mut results = Vec::new();
        for row in rows {
            let (version, sequence, saved_at, snapshot_hash, hash_algorithm, length) =
                row.map_err(db_error)?;
            let sequence = u64::try_from(sequence).map_err(|_| {
                SqliteStoreError::Corrupt(format!("negative sequence for version {version}"))
            })?;
            let snapshot_bytes = usize::try_from(length).map_err(|_| {
                SqliteStoreError::Corrupt(format!("negative snapshot length for version {version}"))
            })?;
            results.push(SnapshotVersionSummary {
                version,
                sequence,
                saved_at,
                snapshot_hash,
                hash_algorithm,
                snapshot_bytes,
            });
        }
        drop(stmt);
        drop(guard);
        Ok(results)
    }

    /// Returns the newest stored version number, if any.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] if the query fails.
    pub fn latest_version(&self) -> Result<Option<i64>, SqliteStoreError> {
        let guard = self.lock()?;
        latest_version_in(&guard)
    }

    /// Loads a specific snapshot version.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] if the version is invalid, the payload is
    /// corrupt, or the stored hash does not match the payload.
    pub fn load_version(
        &self,
        version: i64,
    ) -> Result<Option<DevicePolicySnapshot>, SqliteStoreError> {
        if version < 1 {
            return Err(SqliteStoreError::Invalid("version must be >= 1".to_string()));
        }
        let payload = {
            let guard = self.lock()?;
            fetch_payload(&guard, version)?
        };
        payload.map(decode_payload).transpose()
    }

    /// Prunes older snapshot versions, keeping the most recent `keep` entries.
    ///
    /// Returns the number of versions deleted.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] if `keep` is less than 1 or if the database
    /// query fails.
    pub fn prune_versions(&self, keep: u64) -> Result<u64, SqliteStoreError> {
        if keep == 0 {
            return Err(SqliteStoreError::Invalid("keep must be >= 1".to_string()));
        }
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_error)?;
        let deleted = match latest_version_in(&tx)? {
            Some(latest) => delete_versions_before(&tx, latest, keep)?,
            None => 0,
        };
        tx.commit().map_err(db_error)?;
        drop(guard);
        u64::try_from(deleted).map_err(|_| {
            SqliteStoreError::Invalid(format!("pruned version count exceeds u64: {deleted}"))
        })
    }

    /// Loads the newest snapshot.
    fn load_latest(&self) -> Result<Option<DevicePolicySnapshot>, SqliteStoreError> {
        let payload = {
            let guard = self.lock()?;
            match latest_version_in(&guard)? {
                Some(version) => {
                    let payload = fetch_payload(&guard, version)?;
                    Some(payload.ok_or_else(|| {
                        SqliteStoreError::Corrupt(format!("missing snapshot version {version}"))
                    })?)
                }
                None => None,
            }
        };
        payload.map(decode_payload).transpose()
    }

    /// Appends a snapshot as the next version.
    fn save_snapshot(&self, snapshot: &DevicePolicySnapshot) -> Result<(), SqliteStoreError> {
        let (bytes, digest) = snapshot
            .canonical_bytes_with_digest(DEFAULT_HASH_ALGORITHM)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        if bytes.len() > MAX_SNAPSHOT_BYTES {
            return Err(SqliteStoreError::TooLarge {
                max_bytes: MAX_SNAPSHOT_BYTES,
                actual_bytes: bytes.len(),
            });
        }
        let sequence = i64::try_from(snapshot.sequence).map_err(|_| {
            SqliteStoreError::Invalid(format!("sequence out of range: {}", snapshot.sequence))
        })?;
        let saved_at = unix_millis();
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_error)?;
        let next_version = match latest_version_in(&tx)? {
            None => 1,
            Some(value) => value.checked_add(1).ok_or_else(|| {
                SqliteStoreError::Corrupt("snapshot version overflow".to_string())
            })?,
        };
        tx.execute(
            "INSERT INTO snapshot_versions (version, sequence, snapshot_json, snapshot_hash, \
             hash_algorithm, saved_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                next_version,
                sequence,
                bytes.as_slice(),
                digest.value.as_str(),
                digest.algorithm.as_str(),
                saved_at
            ],
        )
        .map_err(db_error)?;
        enforce_retention(&tx, next_version, self.config.max_versions)?;
        tx.commit().map_err(db_error)?;
        drop(guard);
        Ok(())
    }

    /// Locks the connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection
            .lock()
            .map_err(|_| SqliteStoreError::Db("sqlite mutex poisoned".to_string()))
    }
}

impl PolicyStateStore for SqlitePolicyStore {
    fn load(&self) -> Result<Option<DevicePolicySnapshot>, StoreError> {
        self.load_latest().map_err(StoreError::from)
    }

    fn save(&self, snapshot: &DevicePolicySnapshot) -> Result<(), StoreError> {
        self.save_snapshot(snapshot).map_err(StoreError::from)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory exists for the store path.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(db_error)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(db_error)?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(db_error)?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(db_error)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(db_error)?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(db_error)?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(db_error)?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS snapshot_versions (
                    version INTEGER PRIMARY KEY,
                    sequence INTEGER NOT NULL,
                    snapshot_json BLOB NOT NULL,
                    snapshot_hash TEXT NOT NULL,
                    hash_algorithm TEXT NOT NULL,
                    saved_at INTEGER NOT NULL
                );",
            )
            .map_err(db_error)?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(db_error)?;
    Ok(())
}

/// Returns the newest stored version visible to `connection`.
fn latest_version_in(connection: &Connection) -> Result<Option<i64>, SqliteStoreError> {
    let latest: Option<i64> = connection
        .query_row("SELECT MAX(version) FROM snapshot_versions", params![], |row| row.get(0))
        .map_err(db_error)?;
    match latest {
        Some(value) if value < 1 => {
            Err(SqliteStoreError::Corrupt(format!("invalid snapshot version {value}")))
        }
        other => Ok(other),
    }
}

/// Deletes versions older than the newest `keep`; returns the row count.
fn delete_versions_before(
    tx: &rusqlite::Transaction<'_>,
    latest_version: i64,
    keep: u64,
) -> Result<usize, SqliteStoreError> {
    let keep = i64::try_from(keep)
        .map_err(|_| SqliteStoreError::Invalid(format!("keep value out of range: {keep}")))?;
    if latest_version <= keep {
        return Ok(0);
    }
    let min_version = latest_version - keep + 1;
    tx.execute("DELETE FROM snapshot_versions WHERE version < ?1", params![min_version])
        .map_err(db_error)
}

/// Enforces version retention if configured.
fn enforce_retention(
    tx: &rusqlite::Transaction<'_>,
    latest_version: i64,
    max_versions: Option<u64>,
) -> Result<(), SqliteStoreError> {
    let Some(max_versions) = max_versions else {
        return Ok(());
    };
    if max_versions == 0 {
        return Err(SqliteStoreError::Invalid(
            "max_versions must be greater than zero".to_string(),
        ));
    }
    delete_versions_before(tx, latest_version, max_versions)?;
    Ok(())
}

/// Reads the payload stored for `version`.
fn fetch_payload(
    connection: &Connection,
    version: i64,
) -> Result<Option<SnapshotPayload>, SqliteStoreError> {
    let metadata = connection
        .query_row(
            "SELECT length(snapshot_json), sequence, snapshot_hash, hash_algorithm FROM \
             snapshot_versions WHERE version = ?1",
            params![version],
            |row| {
                let length: i64 = row.get(0)?;
                let sequence: i64 = row.get(1)?;
                let hash: String = row.get(2)?;
                let algorithm: String = row.get(3)?;
                Ok((length, sequence, hash, algorithm))
            },
        )
        .optional()
        .map_err(db_error)?;
    let Some((length, sequence, hash_value, hash_algorithm)) = metadata else {
        return Ok(None);
    };
    let length = usize::try_from(length).map_err(|_| {
        SqliteStoreError::Corrupt(format!("negative snapshot length for version {version}"))
    })?;
    if length > MAX_SNAPSHOT_BYTES {
        return Err(SqliteStoreError::TooLarge {
            max_bytes: MAX_SNAPSHOT_BYTES,
            actual_bytes: length,
        });
    }
    let bytes: Vec<u8> = connection
        .query_row(
            "SELECT snapshot_json FROM snapshot_versions WHERE version = ?1",
            params![version],
            |row| row.get(0),
        )
        .map_err(db_error)?;
    Ok(Some(SnapshotPayload {
        version,
        sequence,
        bytes,
        hash_value,
        hash_algorithm,
    }))
}

/// Verifies and decodes a stored payload.
#[allow(clippy::needless_pass_by_value, reason = "Consumes the payload after verification.")]
fn decode_payload(payload: SnapshotPayload) -> Result<DevicePolicySnapshot, SqliteStoreError> {
    let algorithm = parse_hash_algorithm(&payload.hash_algorithm)?;
    let expected = hash_bytes(algorithm, &payload.bytes);
    if expected.value != payload.hash_value {
        return Err(SqliteStoreError::Corrupt(format!(
            "hash mismatch for snapshot version {}",
            payload.version
        )));
    }
    let snapshot: DevicePolicySnapshot = serde_json::from_slice(&payload.bytes)
        .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    if i64::try_from(snapshot.sequence).ok() != Some(payload.sequence) {
        return Err(SqliteStoreError::Corrupt(format!(
            "sequence mismatch between row and payload for snapshot version {}",
            payload.version
        )));
    }
    Ok(snapshot)
}

/// Returns the current unix epoch in milliseconds.
fn unix_millis() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}

/// Parses a hash algorithm label.
fn parse_hash_algorithm(label: &str) -> Result<HashAlgorithm, SqliteStoreError> {
    HashAlgorithm::parse(label)
        .ok_or_else(|| SqliteStoreError::Invalid(format!("unsupported hash algorithm: {label}")))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

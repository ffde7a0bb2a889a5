// device-policy-config/src/config.rs
// ============================================================================
// Module: Device Policy Configuration
// Description: Configuration loading and validation for the policy engine.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: device-policy-broker, device-policy-core,
//               device-policy-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed. Every section is optional
//! and defaults to an in-memory store, default delivery limits, and no audit
//! log. Validated sections convert into the runtime pieces they configure:
//! the `SQLite` store config, the notification router, the audit sink, and
//! the engine limits.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use std::time::SystemTime;

use device_policy_broker::ChannelRouter;
use device_policy_core::FileAuditSink;
use device_policy_core::NoopAuditSink;
use device_policy_core::PolicyAuditSink;
use device_policy_core::PolicyEngineConfig;
use device_policy_store_sqlite::SqliteStoreConfig;
use device_policy_store_sqlite::SqliteStoreMode;
use device_policy_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "device-policy.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "DEVICE_POLICY_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default `SQLite` busy timeout in milliseconds.
const DEFAULT_STORE_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default per-admin notification queue capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;
/// Maximum per-admin notification queue capacity.
pub const MAX_CHANNEL_CAPACITY: usize = 65_536;
/// Default notification wait window in milliseconds.
pub const DEFAULT_DELIVERY_TIMEOUT_MS: u64 = 60_000;
/// Minimum notification wait window in milliseconds.
const MIN_DELIVERY_TIMEOUT_MS: u64 = 1;
/// Maximum notification wait window in milliseconds.
const MAX_DELIVERY_TIMEOUT_MS: u64 = 600_000;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Device policy engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DevicePolicyConfig {
    /// Snapshot store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Notification delivery configuration.
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// Audit log configuration.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Engine limits.
    #[serde(default)]
    pub engine: EngineLimitsConfig,
    /// Optional config source metadata (not serialized).
    #[serde(skip)]
    pub source_modified_at: Option<SystemTime>,
}

impl DevicePolicyConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// The path is `path` when given, else `DEVICE_POLICY_CONFIG`, else
    /// `device-policy.toml` in the current directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config = Self::from_toml_str(content)?;
        config.source_modified_at = fs::metadata(&resolved).and_then(|meta| meta.modified()).ok();
        Ok(config)
    }

    /// Parses and validates configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        self.notifications.validate()?;
        self.audit.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// Snapshot store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Optional number of snapshot versions to retain.
    #[serde(default)]
    pub max_versions: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            max_versions: None,
        }
    }
}

impl StoreConfig {
    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            StoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid("memory store must not set path".to_string()));
                }
                Ok(())
            }
            StoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite store requires path".to_string())
                })?;
                validate_field_path("store path", path)?;
                if self.max_versions == Some(0) {
                    return Err(ConfigError::Invalid(
                        "store max_versions must be greater than zero".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Returns the `SQLite` store configuration when the sqlite backend is
    /// selected.
    #[must_use]
    pub fn sqlite_config(&self) -> Option<SqliteStoreConfig> {
        match (self.store_type, &self.path) {
            (StoreType::Sqlite, Some(path)) => Some(SqliteStoreConfig {
                path: path.clone(),
                busy_timeout_ms: self.busy_timeout_ms,
                journal_mode: self.journal_mode,
                sync_mode: self.sync_mode,
                max_versions: self.max_versions,
            }),
            _ => None,
        }
    }
}

/// Snapshot store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// Use the in-memory store.
    #[default]
    Memory,
    /// Use the `SQLite`-backed durable store.
    Sqlite,
}

/// Notification delivery configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct NotificationConfig {
    /// Per-admin queue capacity.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Default wait window for awaiting a result, in milliseconds.
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            delivery_timeout_ms: DEFAULT_DELIVERY_TIMEOUT_MS,
        }
    }
}

impl NotificationConfig {
    /// Validates notification limits.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_capacity == 0 || self.channel_capacity > MAX_CHANNEL_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "notifications.channel_capacity must be between 1 and {MAX_CHANNEL_CAPACITY}"
            )));
        }
        validate_timeout_range(
            "notifications.delivery_timeout_ms",
            self.delivery_timeout_ms,
            MIN_DELIVERY_TIMEOUT_MS,
            MAX_DELIVERY_TIMEOUT_MS,
        )
    }

    /// Returns the wait window as a [`Duration`].
    #[must_use]
    pub const fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }

    /// Builds a notification router with the configured queue capacity and
    /// wait window.
    #[must_use]
    pub fn channel_router(&self) -> ChannelRouter {
        ChannelRouter::new(self.channel_capacity).with_delivery_timeout(self.delivery_timeout())
    }
}

/// Audit log configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AuditConfig {
    /// Enables JSON-lines audit output.
    #[serde(default)]
    pub enabled: bool,
    /// Append-only audit log path.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (&self.path, self.enabled) {
            (None, true) => Err(ConfigError::Invalid("enabled audit requires path".to_string())),
            (Some(path), _) => validate_field_path("audit path", path),
            (None, false) => Ok(()),
        }
    }

    /// Returns the audit path when auditing is enabled.
    #[must_use]
    pub fn active_path(&self) -> Option<&Path> {
        if self.enabled { self.path.as_deref() } else { None }
    }

    /// Opens the configured audit sink; a no-op sink when auditing is off.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the audit log cannot be opened.
    pub fn open_sink(&self) -> Result<Arc<dyn PolicyAuditSink>, ConfigError> {
        let Some(path) = self.active_path() else {
            return Ok(Arc::new(NoopAuditSink));
        };
        let sink = FileAuditSink::new(path).map_err(|err| {
            ConfigError::Io(format!("failed to open audit log {}: {err}", path.display()))
        })?;
        Ok(Arc::new(sink))
    }
}

/// Engine limits configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct EngineLimitsConfig {
    /// Maximum number of policy entries one admin may hold.
    #[serde(default)]
    pub max_entries_per_admin: Option<usize>,
}

impl EngineLimitsConfig {
    /// Validates engine limits.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_entries_per_admin == Some(0) {
            return Err(ConfigError::Invalid(
                "engine.max_entries_per_admin must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the engine configuration.
    #[must_use]
    pub const fn engine_config(&self) -> PolicyEngineConfig {
        PolicyEngineConfig {
            max_entries_per_admin: self.max_entries_per_admin,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Default `SQLite` busy timeout.
const fn default_store_busy_timeout_ms() -> u64 {
    DEFAULT_STORE_BUSY_TIMEOUT_MS
}

/// Default notification queue capacity.
const fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

/// Default notification wait window.
const fn default_delivery_timeout_ms() -> u64 {
    DEFAULT_DELIVERY_TIMEOUT_MS
}

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a configured file path against security limits.
fn validate_field_path(field: &str, path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} component too long")));
        }
    }
    Ok(())
}

/// Validates a timeout value against bounds.
fn validate_timeout_range(
    field: &str,
    value_ms: u64,
    min_ms: u64,
    max_ms: u64,
) -> Result<(), ConfigError> {
    if value_ms < min_ms || value_ms > max_ms {
        return Err(ConfigError::Invalid(format!(
            "{field} must be between {min_ms} and {max_ms} milliseconds",
        )));
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

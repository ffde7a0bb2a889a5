// device-policy-core/src/runtime/audit.rs
// ============================================================================
// Module: Policy Audit Logging
// Description: Structured audit events for policy mutations and lifecycle.
// Purpose: Emit JSON-lines audit records without a logging framework.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The engine records one [`PolicyAuditEvent`] per mutation, rejection,
//! lifecycle step, and dropped notification. Sinks serialize events as JSON
//! lines. A failing sink never fails the policy call that produced the event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::core::EnforcingAdmin;
use crate::core::PolicyKey;
use crate::core::UserId;

// ============================================================================
// SECTION: Event Names
// ============================================================================

/// A value was recorded.
pub const EVENT_POLICY_SET: &str = "policy_set";
/// A value was cleared.
pub const EVENT_POLICY_CLEARED: &str = "policy_cleared";
/// A mutation was rejected by validation.
pub const EVENT_POLICY_REJECTED: &str = "policy_rejected";
/// An admin's values were swept.
pub const EVENT_ADMIN_REMOVED: &str = "admin_removed";
/// A user bucket was dropped.
pub const EVENT_USER_REMOVED: &str = "user_removed";
/// State was loaded at startup.
pub const EVENT_STATE_LOADED: &str = "state_loaded";
/// Persisting a mutation failed and it was rolled back.
pub const EVENT_PERSIST_FAILED: &str = "persist_failed";
/// A notification could not be delivered.
pub const EVENT_NOTIFICATION_DROPPED: &str = "notification_dropped";

// ============================================================================
// SECTION: Event
// ============================================================================

/// Policy audit event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyAuditEvent {
    /// Event name.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Policy identifier when the event concerns one key.
    pub policy_identifier: Option<String>,
    /// User bucket when known.
    pub user: Option<UserId>,
    /// Admin package when known.
    pub admin_package: Option<String>,
    /// Admin authority label when known.
    pub authority: Option<&'static str>,
    /// Outcome label.
    pub outcome: Option<String>,
    /// Whether the resolved value changed.
    pub resolved_changed: Option<bool>,
    /// Free-form detail.
    pub detail: Option<String>,
}

impl PolicyAuditEvent {
    /// Creates an event with only a name and timestamp.
    #[must_use]
    pub fn new(event: &'static str) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event,
            timestamp_ms,
            policy_identifier: None,
            user: None,
            admin_package: None,
            authority: None,
            outcome: None,
            resolved_changed: None,
            detail: None,
        }
    }

    /// Attaches the key and user.
    #[must_use]
    pub fn with_key(mut self, key: &PolicyKey, user: UserId) -> Self {
        self.policy_identifier = Some(key.identifier().to_string());
        self.user = Some(user);
        self
    }

    /// Attaches the user only.
    #[must_use]
    pub const fn with_user(mut self, user: UserId) -> Self {
        self.user = Some(user);
        self
    }

    /// Attaches admin identity.
    #[must_use]
    pub fn with_admin(mut self, admin: &EnforcingAdmin) -> Self {
        self.admin_package = Some(admin.package_name.clone());
        self.authority = Some(admin.authority.label());
        self
    }

    /// Attaches an outcome label.
    #[must_use]
    pub fn with_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self
    }

    /// Attaches the resolved-change flag.
    #[must_use]
    pub const fn with_resolved_changed(mut self, changed: bool) -> Self {
        self.resolved_changed = Some(changed);
        self
    }

    /// Attaches detail text.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for policy events.
pub trait PolicyAuditSink: Send + Sync {
    /// Records an audit event.
    fn record(&self, event: &PolicyAuditEvent);
}

/// Audit sink that discards events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

impl PolicyAuditSink for NoopAuditSink {
    fn record(&self, _event: &PolicyAuditEvent) {}
}

/// Audit sink appending JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl PolicyAuditSink for FileAuditSink {
    fn record(&self, event: &PolicyAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// Audit sink writing JSON lines to an arbitrary writer.
pub struct WriterAuditSink<W: Write + Send> {
    /// Writer guarded for concurrent recording.
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterAuditSink<W> {
    /// Wraps a writer.
    #[must_use]
    pub const fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Returns the wrapped writer.
    ///
    /// # Errors
    ///
    /// Returns an error when the writer mutex is poisoned.
    pub fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|_| io::Error::other("audit writer mutex poisoned"))
    }
}

impl<W: Write + Send> PolicyAuditSink for WriterAuditSink<W> {
    fn record(&self, event: &PolicyAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut writer) = self.writer.lock()
        {
            let _ = writeln!(writer, "{payload}");
            let _ = writer.flush();
        }
    }
}

// device-policy-broker/src/sink/log.rs
// ============================================================================
// Module: JSON Lines Notification Sink
// Description: Notifier that writes each notification as one JSON line.
// Purpose: Keep a durable trail of policy outcomes for offline inspection.
// Dependencies: device-policy-core, serde_json
// ============================================================================

//! ## Overview
//! [`LogSink`] serializes notifications with `serde_json` and appends one
//! record per line to the wrapped writer, flushing after each record.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::sync::Mutex;
use std::sync::PoisonError;

use device_policy_core::NotifyError;
use device_policy_core::PolicyUpdateNotification;
use device_policy_core::PolicyUpdateNotifier;
use serde_json::json;

// ============================================================================
// SECTION: Log Sink
// ============================================================================

/// Notifier writing JSON lines to a writer.
pub struct LogSink<W> {
    /// Wrapped writer.
    writer: Mutex<W>,
}

impl<W: Write + Send> LogSink<W> {
    /// Wraps a writer.
    pub const fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> PolicyUpdateNotifier for LogSink<W> {
    fn notify(&self, notification: &PolicyUpdateNotification) -> Result<(), NotifyError> {
        let record = json!({
            "admin_package": notification.admin.package_name,
            "authority": notification.admin.authority.label(),
            "user": notification.admin.user.get(),
            "policy_identifier": notification.policy_identifier,
            "result": notification.result.as_str(),
            "result_code": notification.result.code(),
            "target_user": notification.target_user.code(),
            "extras": notification.extras,
        });
        let line = serde_json::to_string(&record)
            .map_err(|err| NotifyError::Delivery(format!("log sink encode failed: {err}")))?;
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{line}")
            .and_then(|()| writer.flush())
            .map_err(|err| NotifyError::Delivery(format!("log sink write failed: {err}")))
    }
}

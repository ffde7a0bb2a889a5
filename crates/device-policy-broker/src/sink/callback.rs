// device-policy-broker/src/sink/callback.rs
// ============================================================================
// Module: Callback Notification Sink
// Description: Notifier that hands each notification to a closure.
// Purpose: Embed policy update delivery into host code without channels.
// Dependencies: device-policy-core
// ============================================================================

//! ## Overview
//! [`CallbackSink`] invokes a closure for every notification. The closure's
//! error string is reported as [`NotifyError::Delivery`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use device_policy_core::NotifyError;
use device_policy_core::PolicyUpdateNotification;
use device_policy_core::PolicyUpdateNotifier;

// ============================================================================
// SECTION: Callback Sink
// ============================================================================

/// Boxed delivery closure.
type Callback = Box<dyn Fn(&PolicyUpdateNotification) -> Result<(), String> + Send + Sync>;

/// Notifier that calls a closure for each notification.
pub struct CallbackSink {
    /// Delivery closure.
    callback: Callback,
}

impl CallbackSink {
    /// Wraps a delivery closure.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&PolicyUpdateNotification) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }
}

impl PolicyUpdateNotifier for CallbackSink {
    fn notify(&self, notification: &PolicyUpdateNotification) -> Result<(), NotifyError> {
        (self.callback)(notification).map_err(NotifyError::Delivery)
    }
}

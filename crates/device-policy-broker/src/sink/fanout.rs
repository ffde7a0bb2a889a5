// device-policy-broker/src/sink/fanout.rs
// ============================================================================
// Module: Fan-Out Notifier
// Description: Notifier that forwards each notification to several notifiers.
// Purpose: Combine channel delivery with logging or host callbacks.
// Dependencies: device-policy-core
// ============================================================================

//! ## Overview
//! [`FanoutNotifier`] delivers to every child in registration order. A failing
//! child does not stop delivery to the rest; the first error is returned.

// ============================================================================
// SECTION: Imports
// ============================================================================

use device_policy_core::NotifyError;
use device_policy_core::PolicyUpdateNotification;
use device_policy_core::PolicyUpdateNotifier;

// ============================================================================
// SECTION: Fan-Out Notifier
// ============================================================================

/// Notifier forwarding to several children.
#[derive(Default)]
pub struct FanoutNotifier {
    /// Child notifiers in delivery order.
    children: Vec<Box<dyn PolicyUpdateNotifier + Send + Sync>>,
}

impl FanoutNotifier {
    /// Creates an empty fan-out.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a child notifier.
    #[must_use]
    pub fn with<N>(mut self, notifier: N) -> Self
    where
        N: PolicyUpdateNotifier + Send + Sync + 'static,
    {
        self.children.push(Box::new(notifier));
        self
    }

    /// Returns the number of children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Returns true when no children are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl PolicyUpdateNotifier for FanoutNotifier {
    fn notify(&self, notification: &PolicyUpdateNotification) -> Result<(), NotifyError> {
        let mut first_error = None;
        for child in &self.children {
            if let Err(err) = child.notify(notification) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

// device-policy-broker/src/router.rs
// ============================================================================
// Module: Device Policy Channel Router
// Description: Per-admin bounded channels for policy update notifications.
// Purpose: Route each notification to the package it is addressed to.
// Dependencies: device-policy-core, thiserror, tokio
// ============================================================================

//! ## Overview
//! [`ChannelRouter`] keeps one bounded [`tokio::sync::mpsc`] channel per
//! registered admin package. Sends never block: a notification for an
//! unregistered package, a full queue, or a dropped receiver yields a
//! [`NotifyError`] that the engine records and discards.
//! Invariants:
//! - At most one live receiver exists per package; re-registering replaces it.
//! - Notifications for one package arrive in send order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use device_policy_core::NotifyError;
use device_policy_core::PolicyUpdateNotification;
use device_policy_core::PolicyUpdateNotifier;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::error::TrySendError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default per-package queue capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Default window for [`PolicyUpdateReceiver::await_result`].
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors returned while waiting for a notification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReceiveError {
    /// No matching notification arrived within the window.
    #[error("policy update receiver timed out after {0} ms")]
    Timeout(u128),
    /// The router dropped this receiver.
    #[error("policy update receiver closed")]
    Closed,
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Routes notifications to per-package channels.
#[derive(Debug)]
pub struct ChannelRouter {
    /// Capacity of each package queue.
    capacity: usize,
    /// Wait window handed to new receivers.
    delivery_timeout: Duration,
    /// Live senders keyed by package name.
    senders: Mutex<BTreeMap<String, mpsc::Sender<PolicyUpdateNotification>>>,
}

impl Default for ChannelRouter {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl ChannelRouter {
    /// Creates a router with the given per-package capacity (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
            senders: Mutex::new(BTreeMap::new()),
        }
    }

    /// Overrides the wait window used by receivers created afterwards.
    #[must_use]
    pub const fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// Registers `package_name` and returns its receiver.
    ///
    /// A previous receiver for the same package is closed.
    pub fn register(&self, package_name: impl Into<String>) -> PolicyUpdateReceiver {
        let package_name = package_name.into();
        let (sender, receiver) = mpsc::channel(self.capacity);
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(package_name.clone(), sender);
        PolicyUpdateReceiver {
            package_name,
            receiver,
            timeout: self.delivery_timeout,
        }
    }

    /// Removes a package registration; returns whether one existed.
    pub fn unregister(&self, package_name: &str) -> bool {
        self.senders.lock().unwrap_or_else(PoisonError::into_inner).remove(package_name).is_some()
    }

    /// Returns the registered package names.
    #[must_use]
    pub fn registered(&self) -> Vec<String> {
        self.senders.lock().unwrap_or_else(PoisonError::into_inner).keys().cloned().collect()
    }
}

impl PolicyUpdateNotifier for ChannelRouter {
    fn notify(&self, notification: &PolicyUpdateNotification) -> Result<(), NotifyError> {
        let package = &notification.admin.package_name;
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = senders.get(package) else {
            return Err(NotifyError::Unregistered(package.clone()));
        };
        match sender.try_send(notification.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(NotifyError::QueueFull(package.clone())),
            Err(TrySendError::Closed(_)) => {
                senders.remove(package);
                Err(NotifyError::Closed(package.clone()))
            }
        }
    }
}

// ============================================================================
// SECTION: Receiver
// ============================================================================

/// Receiving end of one package's notification queue.
#[derive(Debug)]
pub struct PolicyUpdateReceiver {
    /// Package the receiver was registered for.
    package_name: String,
    /// Queue receiver.
    receiver: mpsc::Receiver<PolicyUpdateNotification>,
    /// Default wait window.
    timeout: Duration,
}

impl PolicyUpdateReceiver {
    /// Returns the registered package name.
    #[must_use]
    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    /// Waits for the next notification.
    ///
    /// Returns `None` once the router has dropped the sender.
    pub async fn recv(&mut self) -> Option<PolicyUpdateNotification> {
        self.receiver.recv().await
    }

    /// Returns the next queued notification without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiveError::Closed`] when the router dropped the sender.
    pub fn try_recv(&mut self) -> Result<Option<PolicyUpdateNotification>, ReceiveError> {
        match self.receiver.try_recv() {
            Ok(notification) => Ok(Some(notification)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(ReceiveError::Closed),
        }
    }

    /// Waits up to the default window for a notification matching `predicate`.
    ///
    /// Non-matching notifications received meanwhile are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiveError`] on timeout or when the queue closes.
    pub async fn await_result<F>(
        &mut self,
        predicate: F,
    ) -> Result<PolicyUpdateNotification, ReceiveError>
    where
        F: FnMut(&PolicyUpdateNotification) -> bool,
    {
        let timeout = self.timeout;
        self.await_result_within(predicate, timeout).await
    }

    /// Waits up to `timeout` for a notification matching `predicate`.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiveError`] on timeout or when the queue closes.
    pub async fn await_result_within<F>(
        &mut self,
        mut predicate: F,
        timeout: Duration,
    ) -> Result<PolicyUpdateNotification, ReceiveError>
    where
        F: FnMut(&PolicyUpdateNotification) -> bool,
    {
        let receiver = &mut self.receiver;
        let wait = async move {
            while let Some(notification) = receiver.recv().await {
                if predicate(&notification) {
                    return Ok(notification);
                }
            }
            Err(ReceiveError::Closed)
        };
        tokio::time::timeout(timeout, wait)
            .await
            .unwrap_or_else(|_| Err(ReceiveError::Timeout(timeout.as_millis())))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

// device-policy-core/src/interfaces/mod.rs
// ============================================================================
// Module: Device Policy Interfaces
// Description: Backend-agnostic seams for storage, delivery, and authorization.
// Purpose: Define the contract surfaces the policy engine depends on.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The engine persists through [`PolicyStateStore`], reports outcomes through
//! [`PolicyUpdateNotifier`], and the admin facade consults an
//! [`AdminAuthorizer`]. Implementations must fail closed on missing or invalid
//! data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::core::EnforcingAdmin;
use crate::core::PolicyKey;
use crate::core::PolicyUpdateNotification;
use crate::core::snapshot::DevicePolicySnapshot;

// ============================================================================
// SECTION: Policy State Store
// ============================================================================

/// Policy state store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("policy state store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("policy state store corruption: {0}")]
    Corrupt(String),
    /// Store data version is incompatible.
    #[error("policy state store version mismatch: {0}")]
    VersionMismatch(String),
    /// Store data is invalid.
    #[error("policy state store invalid data: {0}")]
    Invalid(String),
    /// Store reported an error.
    #[error("policy state store error: {0}")]
    Store(String),
}

/// Durable storage for engine snapshots.
pub trait PolicyStateStore {
    /// Loads the latest snapshot, if one was ever saved.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn load(&self) -> Result<Option<DevicePolicySnapshot>, StoreError>;

    /// Saves a snapshot; must be durable when this returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when saving fails.
    fn save(&self, snapshot: &DevicePolicySnapshot) -> Result<(), StoreError>;
}

impl<T: PolicyStateStore + ?Sized> PolicyStateStore for Arc<T> {
    fn load(&self) -> Result<Option<DevicePolicySnapshot>, StoreError> {
        self.as_ref().load()
    }

    fn save(&self, snapshot: &DevicePolicySnapshot) -> Result<(), StoreError> {
        self.as_ref().save(snapshot)
    }
}

// ============================================================================
// SECTION: Policy Update Notifier
// ============================================================================

/// Notification delivery errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    /// No receiver is registered for the admin.
    #[error("policy notifier unregistered admin: {0}")]
    Unregistered(String),
    /// The receiver queue is full.
    #[error("policy notifier queue full: {0}")]
    QueueFull(String),
    /// The receiver has gone away.
    #[error("policy notifier closed: {0}")]
    Closed(String),
    /// The notifier reported an error.
    #[error("policy notifier error: {0}")]
    Delivery(String),
}

/// Best-effort delivery of mutation outcomes to admins.
pub trait PolicyUpdateNotifier {
    /// Delivers one notification.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] when delivery fails; the engine drops it.
    fn notify(&self, notification: &PolicyUpdateNotification) -> Result<(), NotifyError>;
}

impl<T: PolicyUpdateNotifier + ?Sized> PolicyUpdateNotifier for Arc<T> {
    fn notify(&self, notification: &PolicyUpdateNotification) -> Result<(), NotifyError> {
        self.as_ref().notify(notification)
    }
}

/// Notifier that discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl PolicyUpdateNotifier for NoopNotifier {
    fn notify(&self, _notification: &PolicyUpdateNotification) -> Result<(), NotifyError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Admin Authorizer
// ============================================================================

/// Kind of access an admin requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAccess {
    /// Read the resolved or own value.
    Read,
    /// Set or clear a value.
    Write,
}

/// Authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationDecision {
    /// Permit the access.
    Permit,
    /// Deny the access.
    Deny,
}

/// Authorization errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    /// Authorizer reported an error.
    #[error("admin authorization error: {0}")]
    DecisionFailed(String),
}

/// Decides whether an admin may touch a policy.
pub trait AdminAuthorizer {
    /// Evaluates access for `admin` on `key`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizationError`] when the decision cannot be made.
    fn authorize(
        &self,
        admin: &EnforcingAdmin,
        key: &PolicyKey,
        access: PolicyAccess,
    ) -> Result<AuthorizationDecision, AuthorizationError>;
}

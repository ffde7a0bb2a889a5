// device-policy-core/src/core/notification.rs
// ============================================================================
// Module: Policy Update Notifications
// Description: Outcome records delivered to admins after policy mutations.
// Purpose: Mirror the broadcast contract: identifier, result, scope, extras.
// Dependencies: crate::core::{identifiers, key}, serde
// ============================================================================

//! ## Overview
//! A [`PolicyUpdateNotification`] tells one admin how a policy mutation turned
//! out for it. Result and target-user codes keep the platform's integer values
//! so consumers can compare them directly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::EnforcingAdmin;
use crate::core::identifiers::UserId;
use crate::core::key::PolicyKey;
use crate::core::key::Qualifier;

// ============================================================================
// SECTION: Extras Keys
// ============================================================================

/// Extra carrying the package name of a package-scoped key.
pub const EXTRA_PACKAGE_NAME: &str = "android.app.admin.extra.PACKAGE_NAME";
/// Extra carrying the permission name of a permission-scoped key.
pub const EXTRA_PERMISSION_NAME: &str = "android.app.admin.extra.PERMISSION_NAME";
/// Extra carrying the intent filter of a filter-scoped key.
pub const EXTRA_INTENT_FILTER: &str = "android.app.admin.extra.INTENT_FILTER";
/// Extra carrying the account type of an account-scoped key.
pub const EXTRA_ACCOUNT_TYPE: &str = "android.app.admin.extra.ACCOUNT_TYPE";

// ============================================================================
// SECTION: Result Codes
// ============================================================================

/// Outcome of a policy mutation for one admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyUpdateResult {
    /// Unknown failure.
    FailureUnknown,
    /// The admin's value is enforced.
    PolicySet,
    /// Another admin's value won.
    FailureConflictingAdminPolicy,
    /// The admin's value was cleared.
    PolicyCleared,
    /// Storage limits prevented the update.
    FailureStorageLimitReached,
    /// Hardware cannot enforce the value.
    FailureHardwareLimitation,
}

impl PolicyUpdateResult {
    /// Returns the platform integer code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::FailureUnknown => -1,
            Self::PolicySet => 0,
            Self::FailureConflictingAdminPolicy => 1,
            Self::PolicyCleared => 2,
            Self::FailureStorageLimitReached => 3,
            Self::FailureHardwareLimitation => 4,
        }
    }

    /// Parses a platform integer code.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(Self::FailureUnknown),
            0 => Some(Self::PolicySet),
            1 => Some(Self::FailureConflictingAdminPolicy),
            2 => Some(Self::PolicyCleared),
            3 => Some(Self::FailureStorageLimitReached),
            4 => Some(Self::FailureHardwareLimitation),
            _ => None,
        }
    }

    /// Returns the stable label for the result.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FailureUnknown => "failure_unknown",
            Self::PolicySet => "policy_set",
            Self::FailureConflictingAdminPolicy => "failure_conflicting_admin_policy",
            Self::PolicyCleared => "policy_cleared",
            Self::FailureStorageLimitReached => "failure_storage_limit_reached",
            Self::FailureHardwareLimitation => "failure_hardware_limitation",
        }
    }
}

impl fmt::Display for PolicyUpdateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Target User
// ============================================================================

/// Scope a notification applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetUser {
    /// The admin's own user.
    Local,
    /// Device-wide.
    Global,
}

impl TargetUser {
    /// Raw code for a local target.
    pub const LOCAL_USER_ID: i32 = -1;
    /// Raw code for a global target.
    pub const GLOBAL_USER_ID: i32 = -3;

    /// Returns the target for a state stored under `user`.
    #[must_use]
    pub const fn for_user(user: UserId) -> Self {
        if user.is_all() { Self::Global } else { Self::Local }
    }

    /// Returns the platform integer code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Local => Self::LOCAL_USER_ID,
            Self::Global => Self::GLOBAL_USER_ID,
        }
    }
}

// ============================================================================
// SECTION: Notification
// ============================================================================

/// Outcome delivered to one admin after a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyUpdateNotification {
    /// Admin receiving the notification.
    pub admin: EnforcingAdmin,
    /// Policy identifier.
    pub policy_identifier: String,
    /// Outcome for the admin.
    pub result: PolicyUpdateResult,
    /// Scope of the affected state.
    pub target_user: TargetUser,
    /// Key parameters.
    pub extras: BTreeMap<String, String>,
}

impl PolicyUpdateNotification {
    /// Builds a notification for a key stored under `user`.
    #[must_use]
    pub fn new(
        admin: EnforcingAdmin,
        key: &PolicyKey,
        user: UserId,
        result: PolicyUpdateResult,
    ) -> Self {
        Self {
            admin,
            policy_identifier: key.identifier().to_string(),
            result,
            target_user: TargetUser::for_user(user),
            extras: extras_for_key(key),
        }
    }
}

/// Returns the extras bundle describing a key's qualifier.
#[must_use]
pub fn extras_for_key(key: &PolicyKey) -> BTreeMap<String, String> {
    let mut extras = BTreeMap::new();
    match key.qualifier() {
        Qualifier::None
        | Qualifier::UserRestriction {
            ..
        } => {}
        Qualifier::Package {
            package_name,
        } => {
            extras.insert(EXTRA_PACKAGE_NAME.to_string(), package_name.clone());
        }
        Qualifier::PackagePermission {
            package_name,
            permission_name,
        } => {
            extras.insert(EXTRA_PACKAGE_NAME.to_string(), package_name.clone());
            extras.insert(EXTRA_PERMISSION_NAME.to_string(), permission_name.clone());
        }
        Qualifier::IntentFilter {
            filter,
        } => {
            extras.insert(EXTRA_INTENT_FILTER.to_string(), filter.to_string());
        }
        Qualifier::AccountType {
            account_type,
        } => {
            extras.insert(EXTRA_ACCOUNT_TYPE.to_string(), account_type.clone());
        }
    }
    extras
}

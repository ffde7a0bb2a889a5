// device-policy-core/src/core/value.rs
// ============================================================================
// Module: Policy Values
// Description: Tagged union of policy values and typed value access.
// Purpose: Replace runtime casts with a closed value type and explicit kind checks.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Every value an admin sets is a [`PolicyValue`]. Its runtime tag is a
//! [`ValueKind`], and [`PolicyValueType`] maps Rust types onto that tag so
//! typed reads fail with [`KindMismatch`] instead of coercing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Lock Task Features
// ============================================================================

/// No lock-task features enabled.
pub const LOCK_TASK_FEATURE_NONE: i32 = 0;
/// System info area in the status bar.
pub const LOCK_TASK_FEATURE_SYSTEM_INFO: i32 = 1;
/// Notifications and quick settings.
pub const LOCK_TASK_FEATURE_NOTIFICATIONS: i32 = 1 << 1;
/// Home button.
pub const LOCK_TASK_FEATURE_HOME: i32 = 1 << 2;
/// Overview (recents) button.
pub const LOCK_TASK_FEATURE_OVERVIEW: i32 = 1 << 3;
/// Global actions dialog.
pub const LOCK_TASK_FEATURE_GLOBAL_ACTIONS: i32 = 1 << 4;
/// Keyguard.
pub const LOCK_TASK_FEATURE_KEYGUARD: i32 = 1 << 5;
/// Blocks activity starts into the locked task.
pub const LOCK_TASK_FEATURE_BLOCK_ACTIVITY_START_IN_TASK: i32 = 1 << 6;

/// Union of every known lock-task feature bit.
const LOCK_TASK_FEATURE_ALL: i32 = LOCK_TASK_FEATURE_SYSTEM_INFO
    | LOCK_TASK_FEATURE_NOTIFICATIONS
    | LOCK_TASK_FEATURE_HOME
    | LOCK_TASK_FEATURE_OVERVIEW
    | LOCK_TASK_FEATURE_GLOBAL_ACTIONS
    | LOCK_TASK_FEATURE_KEYGUARD
    | LOCK_TASK_FEATURE_BLOCK_ACTIVITY_START_IN_TASK;

// ============================================================================
// SECTION: Structured Values
// ============================================================================

/// String-keyed bundle used by non-coexistable restriction policies.
pub type Bundle = BTreeMap<String, serde_json::Value>;

/// Lock-task configuration: allowed packages plus enabled features.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockTaskPolicy {
    /// Packages allowed to enter lock-task mode.
    pub packages: BTreeSet<String>,
    /// Bitmask of `LOCK_TASK_FEATURE_*` flags.
    pub flags: i32,
}

impl LockTaskPolicy {
    /// Creates a lock-task policy from packages and feature flags.
    #[must_use]
    pub fn new<I, S>(packages: I, flags: i32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            packages: packages.into_iter().map(Into::into).collect(),
            flags,
        }
    }

    /// Checks the feature flags for unknown bits and missing dependencies.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn validate_flags(&self) -> Result<(), String> {
        if self.flags & !LOCK_TASK_FEATURE_ALL != 0 {
            return Err(format!("unknown lock task feature bits: {:#x}", self.flags));
        }
        let needs_home = LOCK_TASK_FEATURE_OVERVIEW | LOCK_TASK_FEATURE_NOTIFICATIONS;
        if self.flags & needs_home != 0 && self.flags & LOCK_TASK_FEATURE_HOME == 0 {
            return Err("overview and notifications lock task features require home".to_string());
        }
        Ok(())
    }
}

/// Fully qualified activity component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentName {
    /// Owning package.
    pub package_name: String,
    /// Fully qualified class name.
    pub class_name: String,
}

impl ComponentName {
    /// Creates a component name.
    #[must_use]
    pub fn new(package_name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            class_name: class_name.into(),
        }
    }
}

// ============================================================================
// SECTION: Value Kind
// ============================================================================

/// Runtime tag of a [`PolicyValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Boolean value.
    Boolean,
    /// 32-bit integer value.
    Integer,
    /// 64-bit integer value.
    Long,
    /// Ordered set of strings.
    StringSet,
    /// Lock-task configuration.
    LockTask,
    /// Activity component.
    Component,
    /// Key/value bundle.
    Bundle,
}

impl ValueKind {
    /// Returns the stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Long => "long",
            Self::StringSet => "string_set",
            Self::LockTask => "lock_task",
            Self::Component => "component",
            Self::Bundle => "bundle",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Policy Value
// ============================================================================

/// Closed set of values an admin can supply for a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PolicyValue {
    /// Boolean value.
    Boolean(bool),
    /// 32-bit integer value.
    Integer(i32),
    /// 64-bit integer value.
    Long(i64),
    /// Ordered set of strings.
    StringSet(BTreeSet<String>),
    /// Lock-task configuration.
    LockTask(LockTaskPolicy),
    /// Activity component.
    Component(ComponentName),
    /// Key/value bundle.
    Bundle(Bundle),
}

impl PolicyValue {
    /// Returns the runtime tag of the value.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Integer(_) => ValueKind::Integer,
            Self::Long(_) => ValueKind::Long,
            Self::StringSet(_) => ValueKind::StringSet,
            Self::LockTask(_) => ValueKind::LockTask,
            Self::Component(_) => ValueKind::Component,
            Self::Bundle(_) => ValueKind::Bundle,
        }
    }

    /// Creates a string-set value.
    #[must_use]
    pub fn string_set<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::StringSet(values.into_iter().map(Into::into).collect())
    }

    /// Converts the value into `T`, failing on a kind mismatch.
    ///
    /// # Errors
    ///
    /// Returns [`KindMismatch`] when the tag differs from `T::KIND`.
    pub fn to_typed<T: PolicyValueType>(&self) -> Result<T, KindMismatch> {
        T::from_policy_value(self).ok_or(KindMismatch {
            expected: T::KIND,
            actual: self.kind(),
        })
    }
}

// ============================================================================
// SECTION: Typed Access
// ============================================================================

/// Typed read of a value whose runtime tag did not match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("policy value kind mismatch: expected {expected}, found {actual}")]
pub struct KindMismatch {
    /// Kind requested by the caller.
    pub expected: ValueKind,
    /// Kind actually stored.
    pub actual: ValueKind,
}

/// Rust types that map onto one [`ValueKind`].
pub trait PolicyValueType: Sized {
    /// Tag this type maps to.
    const KIND: ValueKind;

    /// Wraps the value in its tagged form.
    fn into_policy_value(self) -> PolicyValue;

    /// Extracts a copy of the value when the tag matches.
    fn from_policy_value(value: &PolicyValue) -> Option<Self>;
}

/// Implements [`PolicyValueType`] for a variant holding the type directly.
macro_rules! policy_value_type {
    ($ty:ty, $variant:ident) => {
        impl PolicyValueType for $ty {
            const KIND: ValueKind = ValueKind::$variant;

            fn into_policy_value(self) -> PolicyValue {
                PolicyValue::$variant(self)
            }

            fn from_policy_value(value: &PolicyValue) -> Option<Self> {
                match value {
                    PolicyValue::$variant(inner) => Some(inner.clone()),
                    _ => None,
                }
            }
        }
    };
}

policy_value_type!(bool, Boolean);
policy_value_type!(i32, Integer);
policy_value_type!(i64, Long);
policy_value_type!(BTreeSet<String>, StringSet);
policy_value_type!(LockTaskPolicy, LockTask);
policy_value_type!(ComponentName, Component);
policy_value_type!(Bundle, Bundle);

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        reason = "Test-only assertions are permitted."
    )]

    use super::*;

    #[test]
    fn typed_read_matches_tag() {
        let value = PolicyValue::Integer(5);
        assert_eq!(value.to_typed::<i32>().unwrap(), 5);
        let err = value.to_typed::<bool>().unwrap_err();
        assert_eq!(err.expected, ValueKind::Boolean);
        assert_eq!(err.actual, ValueKind::Integer);
    }

    #[test]
    fn lock_task_overview_requires_home() {
        let bad = LockTaskPolicy::new(["a"], LOCK_TASK_FEATURE_OVERVIEW);
        assert!(bad.validate_flags().is_err());
        let bad = LockTaskPolicy::new(["a"], LOCK_TASK_FEATURE_NOTIFICATIONS);
        assert!(bad.validate_flags().is_err());
        let good = LockTaskPolicy::new(
            ["a"],
            LOCK_TASK_FEATURE_OVERVIEW | LOCK_TASK_FEATURE_NOTIFICATIONS | LOCK_TASK_FEATURE_HOME,
        );
        assert!(good.validate_flags().is_ok());
    }

    #[test]
    fn lock_task_rejects_unknown_bits() {
        let bad = LockTaskPolicy::new(["a"], 1 << 12);
        assert!(bad.validate_flags().is_err());
    }

    #[test]
    fn value_serializes_with_kind_tag() {
        let json = serde_json::to_value(PolicyValue::Boolean(true)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "boolean", "value": true}));
    }
}

// device-policy-core/src/core/state.rs
// ============================================================================
// Module: Policy State
// Description: Per-(key, user) aggregates of admin values and resolved results.
// Purpose: Keep the resolved cache a pure function of admin values.
// Dependencies: crate::core::{identifiers, key, resolution, value}
// ============================================================================

//! ## Overview
//! [`PolicyState`] tracks every admin value for one policy key in one user
//! bucket. The resolved value is recomputed after every mutation and cannot be
//! set directly. [`DevicePolicyState`] is an owned, read-only snapshot of all
//! buckets as returned by the engine.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::EnforcingAdmin;
use crate::core::identifiers::UserId;
use crate::core::key::PolicyKey;
use crate::core::resolution::ResolutionMechanism;
use crate::core::value::KindMismatch;
use crate::core::value::PolicyValue;
use crate::core::value::PolicyValueType;
use crate::core::value::ValueKind;

// ============================================================================
// SECTION: Admin Policy
// ============================================================================

/// One admin's recorded value for a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminPolicy {
    /// Value set by the admin.
    pub value: PolicyValue,
    /// Logical sequence number of the set call.
    pub set_at: u64,
}

// ============================================================================
// SECTION: Policy State
// ============================================================================

/// Aggregate of admin values for one policy key and user.
///
/// # Invariants
/// - `resolved` always equals `mechanism.resolve(values_by_admin)`.
/// - Every recorded value has kind `value_kind`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyState {
    /// Policy key.
    key: PolicyKey,
    /// User bucket owning the state.
    user: UserId,
    /// Declared value kind.
    value_kind: ValueKind,
    /// Resolution mechanism chosen at first set.
    mechanism: ResolutionMechanism,
    /// Values keyed by the admin that set them.
    values_by_admin: BTreeMap<EnforcingAdmin, AdminPolicy>,
    /// Cached resolved value.
    resolved: Option<PolicyValue>,
}

impl PolicyState {
    /// Creates an empty state for a key.
    pub(crate) const fn new(
        key: PolicyKey,
        user: UserId,
        value_kind: ValueKind,
        mechanism: ResolutionMechanism,
    ) -> Self {
        Self {
            key,
            user,
            value_kind,
            mechanism,
            values_by_admin: BTreeMap::new(),
            resolved: None,
        }
    }

    /// Rebuilds a state from persisted admin values, recomputing resolution.
    pub(crate) fn from_parts(
        key: PolicyKey,
        user: UserId,
        value_kind: ValueKind,
        mechanism: ResolutionMechanism,
        values_by_admin: BTreeMap<EnforcingAdmin, AdminPolicy>,
    ) -> Self {
        let mut state = Self::new(key, user, value_kind, mechanism);
        state.values_by_admin = values_by_admin;
        state.recompute();
        state
    }

    /// Returns the policy key.
    #[must_use]
    pub const fn key(&self) -> &PolicyKey {
        &self.key
    }

    /// Returns the owning user bucket.
    #[must_use]
    pub const fn user(&self) -> UserId {
        self.user
    }

    /// Returns the declared value kind.
    #[must_use]
    pub const fn value_kind(&self) -> ValueKind {
        self.value_kind
    }

    /// Returns the resolution mechanism.
    #[must_use]
    pub const fn mechanism(&self) -> &ResolutionMechanism {
        &self.mechanism
    }

    /// Returns the resolved value, absent for non-coexistable policies.
    #[must_use]
    pub const fn current_resolved_policy(&self) -> Option<&PolicyValue> {
        self.resolved.as_ref()
    }

    /// Returns the recorded admin entries including sequence numbers.
    #[must_use]
    pub const fn admin_entries(&self) -> &BTreeMap<EnforcingAdmin, AdminPolicy> {
        &self.values_by_admin
    }

    /// Returns the values set by each admin.
    #[must_use]
    pub fn policies_set_by_admins(&self) -> BTreeMap<EnforcingAdmin, PolicyValue> {
        self.values_by_admin
            .iter()
            .map(|(admin, entry)| (admin.clone(), entry.value.clone()))
            .collect()
    }

    /// Returns the value set by `admin`, if any.
    #[must_use]
    pub fn admin_value(&self, admin: &EnforcingAdmin) -> Option<&PolicyValue> {
        self.values_by_admin.get(admin).map(|entry| &entry.value)
    }

    /// Returns true when `admin`'s value is part of the resolved outcome.
    #[must_use]
    pub fn is_enforced_for(&self, admin: &EnforcingAdmin) -> bool {
        self.mechanism.is_enforced_for(admin, &self.values_by_admin, self.resolved.as_ref())
    }

    /// Returns true when no admin holds a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values_by_admin.is_empty()
    }

    /// Records `value` for `admin`; returns false when nothing changed.
    ///
    /// An identical value is still re-stamped under `MostRecent` when another
    /// admin wrote after it, so the caller becomes the latest writer.
    pub(crate) fn record(
        &mut self,
        admin: EnforcingAdmin,
        value: PolicyValue,
        set_at: u64,
    ) -> bool {
        if let Some(existing) = self.values_by_admin.get(&admin)
            && existing.value == value
            && !self.superseded_under_most_recent(&admin, existing.set_at)
        {
            return false;
        }
        self.values_by_admin.insert(
            admin,
            AdminPolicy {
                value,
                set_at,
            },
        );
        self.recompute();
        true
    }

    /// Returns true when the mechanism is `MostRecent` and another admin's
    /// entry is newer than `set_at`.
    fn superseded_under_most_recent(&self, admin: &EnforcingAdmin, set_at: u64) -> bool {
        matches!(self.mechanism, ResolutionMechanism::MostRecent)
            && self
                .values_by_admin
                .iter()
                .any(|(other, entry)| other != admin && entry.set_at > set_at)
    }

    /// Removes `admin`'s value; returns true when an entry existed.
    pub(crate) fn remove(&mut self, admin: &EnforcingAdmin) -> bool {
        let removed = self.values_by_admin.remove(admin).is_some();
        if removed {
            self.recompute();
        }
        removed
    }

    /// Recomputes the resolved cache from the admin values.
    fn recompute(&mut self) {
        self.resolved = self.mechanism.resolve(&self.values_by_admin);
    }

    /// Converts the state into a typed view.
    ///
    /// # Errors
    ///
    /// Returns [`KindMismatch`] when `T` does not match the declared kind.
    pub fn to_typed<T: PolicyValueType>(&self) -> Result<TypedPolicyState<T>, KindMismatch> {
        if T::KIND != self.value_kind {
            return Err(KindMismatch {
                expected: T::KIND,
                actual: self.value_kind,
            });
        }
        let mut values_by_admin = BTreeMap::new();
        for (admin, entry) in &self.values_by_admin {
            values_by_admin.insert(admin.clone(), entry.value.to_typed::<T>()?);
        }
        let resolved = self.resolved.as_ref().map(PolicyValue::to_typed::<T>).transpose()?;
        Ok(TypedPolicyState {
            key: self.key.clone(),
            user: self.user,
            values_by_admin,
            resolved,
        })
    }
}

// ============================================================================
// SECTION: Typed Policy State
// ============================================================================

/// Typed view of a [`PolicyState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedPolicyState<T> {
    /// Policy key.
    pub key: PolicyKey,
    /// Owning user bucket.
    pub user: UserId,
    /// Values keyed by admin.
    pub values_by_admin: BTreeMap<EnforcingAdmin, T>,
    /// Resolved value.
    pub resolved: Option<T>,
}

impl<T> TypedPolicyState<T> {
    /// Returns the resolved value.
    #[must_use]
    pub const fn current_resolved_policy(&self) -> Option<&T> {
        self.resolved.as_ref()
    }

    /// Returns the values set by each admin.
    #[must_use]
    pub const fn policies_set_by_admins(&self) -> &BTreeMap<EnforcingAdmin, T> {
        &self.values_by_admin
    }
}

// ============================================================================
// SECTION: Device Policy State
// ============================================================================

/// Policies of one user bucket.
pub type UserPolicies = BTreeMap<PolicyKey, PolicyState>;

/// Owned snapshot of every policy bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DevicePolicyState {
    /// Buckets keyed by user; [`UserId::ALL`] holds global policies.
    users: BTreeMap<UserId, UserPolicies>,
}

impl DevicePolicyState {
    /// Creates a snapshot from user buckets.
    #[must_use]
    pub const fn new(users: BTreeMap<UserId, UserPolicies>) -> Self {
        Self {
            users,
        }
    }

    /// Returns the policies of one user bucket.
    #[must_use]
    pub fn policies_for_user(&self, user: UserId) -> UserPolicies {
        self.users.get(&user).cloned().unwrap_or_default()
    }

    /// Returns every user bucket.
    #[must_use]
    pub const fn policies_for_all_users(&self) -> &BTreeMap<UserId, UserPolicies> {
        &self.users
    }

    /// Returns the state for one key, if present.
    #[must_use]
    pub fn policy_state(&self, key: &PolicyKey, user: UserId) -> Option<&PolicyState> {
        self.users.get(&user).and_then(|bucket| bucket.get(key))
    }
}

// device-policy-core/src/core/snapshot.rs
// ============================================================================
// Module: Policy Snapshots
// Description: Serializable form of every policy bucket.
// Purpose: Persist policy state and rebuild it with verified resolution.
// Dependencies: crate::core::{hashing, identifiers, key, resolution, state, value}
// ============================================================================

//! ## Overview
//! A [`DevicePolicySnapshot`] lists every policy state in key order with its
//! admin entries and resolved value. Rebuilding recomputes each resolved value
//! and rejects snapshots whose stored result disagrees, so a reload is
//! bit-for-bit equivalent to the state that was saved.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::hashing::HashAlgorithm;
use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::hashing::canonical_json_bytes;
use crate::core::hashing::hash_bytes;
use crate::core::identifiers::EnforcingAdmin;
use crate::core::identifiers::UserId;
use crate::core::key::PolicyKey;
use crate::core::resolution::ResolutionMechanism;
use crate::core::state::AdminPolicy;
use crate::core::state::PolicyState;
use crate::core::state::UserPolicies;
use crate::core::value::PolicyValue;
use crate::core::value::ValueKind;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Current snapshot format version.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

// ============================================================================
// SECTION: Records
// ============================================================================

/// Persisted admin entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminPolicyRecord {
    /// Admin that set the value.
    pub admin: EnforcingAdmin,
    /// Recorded value.
    pub value: PolicyValue,
    /// Logical sequence number of the set call.
    pub set_at: u64,
}

/// Persisted policy state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStateRecord {
    /// Owning user bucket.
    pub user: UserId,
    /// Policy key.
    pub key: PolicyKey,
    /// Declared value kind.
    pub value_kind: ValueKind,
    /// Resolution mechanism.
    pub mechanism: ResolutionMechanism,
    /// Admin entries in admin order.
    pub admins: Vec<AdminPolicyRecord>,
    /// Resolved value at save time.
    pub resolved: Option<PolicyValue>,
}

/// Persisted form of the whole engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePolicySnapshot {
    /// Format version.
    pub format_version: u32,
    /// Engine sequence counter at save time.
    pub sequence: u64,
    /// Policy states ordered by user then key.
    pub policies: Vec<PolicyStateRecord>,
}

/// Snapshot integrity failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// Unsupported format version.
    #[error("snapshot version mismatch: found {0}")]
    Version(u32),
    /// Structural problem in the snapshot.
    #[error("snapshot invalid: {0}")]
    Invalid(String),
    /// A stored resolved value disagrees with recomputation.
    #[error("snapshot resolution mismatch for {0}")]
    ResolvedMismatch(String),
}

// ============================================================================
// SECTION: Conversion
// ============================================================================

impl DevicePolicySnapshot {
    /// Builds a snapshot from engine buckets.
    #[must_use]
    pub fn from_buckets(sequence: u64, users: &BTreeMap<UserId, UserPolicies>) -> Self {
        let policies = users
            .iter()
            .flat_map(|(user, bucket)| {
                bucket.values().map(move |state| PolicyStateRecord {
                    user: *user,
                    key: state.key().clone(),
                    value_kind: state.value_kind(),
                    mechanism: state.mechanism().clone(),
                    admins: state
                        .admin_entries()
                        .iter()
                        .map(|(admin, entry)| AdminPolicyRecord {
                            admin: admin.clone(),
                            value: entry.value.clone(),
                            set_at: entry.set_at,
                        })
                        .collect(),
                    resolved: state.current_resolved_policy().cloned(),
                })
            })
            .collect();
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            sequence,
            policies,
        }
    }

    /// Rebuilds engine buckets, recomputing and checking resolution.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] when the snapshot is malformed or a stored
    /// resolved value differs from the recomputed one.
    pub fn to_buckets(&self) -> Result<BTreeMap<UserId, UserPolicies>, SnapshotError> {
        if self.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(SnapshotError::Version(self.format_version));
        }
        let mut users: BTreeMap<UserId, UserPolicies> = BTreeMap::new();
        for record in &self.policies {
            let label = format!("{} (user {})", record.key, record.user);
            if record.admins.is_empty() {
                return Err(SnapshotError::Invalid(format!("{label} has no admin values")));
            }
            if !record.mechanism.accepts_kind(record.value_kind) {
                return Err(SnapshotError::Invalid(format!(
                    "{label} mechanism cannot resolve {}",
                    record.value_kind
                )));
            }
            let mut values = BTreeMap::new();
            for entry in &record.admins {
                if entry.value.kind() != record.value_kind
                    || !record.mechanism.permits(&entry.value)
                {
                    return Err(SnapshotError::Invalid(format!("{label} has an invalid value")));
                }
                if entry.set_at > self.sequence {
                    return Err(SnapshotError::Invalid(format!(
                        "{label} entry is newer than the snapshot sequence"
                    )));
                }
                let previous = values.insert(
                    entry.admin.clone(),
                    AdminPolicy {
                        value: entry.value.clone(),
                        set_at: entry.set_at,
                    },
                );
                if previous.is_some() {
                    return Err(SnapshotError::Invalid(format!("{label} repeats an admin")));
                }
            }
            let state = PolicyState::from_parts(
                record.key.clone(),
                record.user,
                record.value_kind,
                record.mechanism.clone(),
                values,
            );
            if state.current_resolved_policy() != record.resolved.as_ref() {
                return Err(SnapshotError::ResolvedMismatch(label));
            }
            let bucket = users.entry(record.user).or_default();
            if bucket.insert(record.key.clone(), state).is_some() {
                return Err(SnapshotError::Invalid(format!("{label} appears twice")));
            }
        }
        Ok(users)
    }

    /// Returns the canonical JSON bytes of the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonicalization fails.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, HashError> {
        canonical_json_bytes(self)
    }

    /// Returns the canonical bytes along with their digest.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonicalization fails.
    pub fn canonical_bytes_with_digest(
        &self,
        algorithm: HashAlgorithm,
    ) -> Result<(Vec<u8>, HashDigest), HashError> {
        let bytes = self.canonical_bytes()?;
        let digest = hash_bytes(algorithm, &bytes);
        Ok((bytes, digest))
    }

    /// Returns a copy limited to one user bucket.
    #[must_use]
    pub fn filter_user(&self, user: UserId) -> Self {
        Self {
            format_version: self.format_version,
            sequence: self.sequence,
            policies: self.policies.iter().filter(|record| record.user == user).cloned().collect(),
        }
    }
}

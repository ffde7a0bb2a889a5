// device-policy-core/src/core/mod.rs
// ============================================================================
// Module: Device Policy Core Types
// Description: Keys, admins, values, mechanisms, states, and snapshots.
// Purpose: Provide the stable, serializable data model of the policy engine.
// Dependencies: serde, serde_json, serde_jcs, sha2, thiserror
// ============================================================================

//! ## Overview
//! Core types describe what is configured ([`PolicyKey`]), who configured it
//! ([`EnforcingAdmin`]), how competing values collapse
//! ([`ResolutionMechanism`]), and the aggregate the engine keeps per key and
//! user ([`PolicyState`]). None of these types perform I/O.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod catalog;
pub mod hashing;
pub mod identifiers;
pub mod key;
pub mod notification;
pub mod resolution;
pub mod snapshot;
pub mod state;
pub mod value;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use catalog::CatalogError;
pub use catalog::PolicyCatalog;
pub use catalog::PolicyDefinition;
pub use catalog::PolicyScope;
pub use catalog::ValueConstraint;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::HashError;
pub use identifiers::Authority;
pub use identifiers::EnforcingAdmin;
pub use identifiers::FINANCED_DEVICE_CONTROLLER_ROLE;
pub use identifiers::UserId;
pub use key::IntentFilter;
pub use key::KeyShape;
pub use key::PolicyKey;
pub use key::Qualifier;
pub use notification::PolicyUpdateNotification;
pub use notification::PolicyUpdateResult;
pub use notification::TargetUser;
pub use resolution::ResolutionMechanism;
pub use snapshot::DevicePolicySnapshot;
pub use snapshot::SnapshotError;
pub use state::AdminPolicy;
pub use state::DevicePolicyState;
pub use state::PolicyState;
pub use state::TypedPolicyState;
pub use state::UserPolicies;
pub use value::Bundle;
pub use value::ComponentName;
pub use value::KindMismatch;
pub use value::LockTaskPolicy;
pub use value::PolicyValue;
pub use value::PolicyValueType;
pub use value::ValueKind;

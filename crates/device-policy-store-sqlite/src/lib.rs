// device-policy-store-sqlite/src/lib.rs
// ============================================================================
// Module: Device Policy SQLite Store Library
// Description: SQLite-backed durable snapshot store for the policy engine.
// Purpose: Persist engine snapshots across restarts with integrity checks.
// Dependencies: device-policy-core, rusqlite
// ============================================================================

//! ## Overview
//! Provides [`SqlitePolicyStore`], a [`device_policy_core::PolicyStateStore`]
//! that appends every saved snapshot to a versioned table and verifies the
//! stored digest on every load.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::MAX_SNAPSHOT_BYTES;
pub use store::SnapshotVersionSummary;
pub use store::SqlitePolicyStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;

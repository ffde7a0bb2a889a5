// device-policy-core/src/runtime/store.rs
// ============================================================================
// Module: In-Memory Policy Store
// Description: Process-local snapshot store and a shared store wrapper.
// Purpose: Provide a deterministic store for tests and ephemeral engines.
// Dependencies: crate::core, crate::interfaces, serde_json
// ============================================================================

//! ## Overview
//! [`InMemoryPolicyStore`] keeps the canonical JSON bytes of each saved
//! snapshot, so a reload goes through the same decode path as a durable store.
//! It is not intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use crate::core::snapshot::DevicePolicySnapshot;
use crate::interfaces::PolicyStateStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// In-memory snapshot store for tests and ephemeral engines.
#[derive(Debug, Default, Clone)]
pub struct InMemoryPolicyStore {
    /// Canonical bytes of every saved snapshot, oldest first.
    versions: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl InMemoryPolicyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of snapshots saved so far.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Store`] when the store mutex is poisoned.
    pub fn version_count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.len())
    }

    /// Locks the version list.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Vec<u8>>>, StoreError> {
        self.versions
            .lock()
            .map_err(|_| StoreError::Store("policy state store mutex poisoned".to_string()))
    }
}

impl PolicyStateStore for InMemoryPolicyStore {
    fn load(&self) -> Result<Option<DevicePolicySnapshot>, StoreError> {
        let guard = self.lock()?;
        let Some(bytes) = guard.last() else {
            return Ok(None);
        };
        let snapshot = serde_json::from_slice(bytes)
            .map_err(|err| StoreError::Corrupt(format!("snapshot decode failed: {err}")))?;
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &DevicePolicySnapshot) -> Result<(), StoreError> {
        let bytes = snapshot.canonical_bytes().map_err(|err| StoreError::Invalid(err.to_string()))?;
        self.lock()?.push(bytes);
        Ok(())
    }
}

// ============================================================================
// SECTION: Shared Store
// ============================================================================

/// Type-erased store shared between engine instances.
#[derive(Clone)]
pub struct SharedPolicyStore {
    /// Wrapped store.
    inner: Arc<dyn PolicyStateStore + Send + Sync>,
}

impl SharedPolicyStore {
    /// Wraps a store instance.
    #[must_use]
    pub fn new(store: impl PolicyStateStore + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wraps an already shared store.
    #[must_use]
    pub fn from_shared(inner: Arc<dyn PolicyStateStore + Send + Sync>) -> Self {
        Self {
            inner,
        }
    }
}

impl PolicyStateStore for SharedPolicyStore {
    fn load(&self) -> Result<Option<DevicePolicySnapshot>, StoreError> {
        self.inner.load()
    }

    fn save(&self, snapshot: &DevicePolicySnapshot) -> Result<(), StoreError> {
        self.inner.save(snapshot)
    }
}

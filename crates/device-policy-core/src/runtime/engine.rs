// device-policy-core/src/runtime/engine.rs
// ============================================================================
// Module: Device Policy Engine
// Description: Registry of all policy states with set, clear, and sweep paths.
// Purpose: Resolve competing admin values, persist every mutation, and notify.
// Dependencies: crate::{core, interfaces, runtime::audit}, thiserror
// ============================================================================

//! ## Overview
//! [`PolicyEngine`] owns every [`PolicyState`] across all user buckets. Each
//! mutation runs under one write guard: validate, apply, persist, and roll back
//! the touched entries if persistence fails. Notifications go out after the
//! guard is released and their failures are swallowed into the audit log.
//!
//! Readers take the read guard and therefore see either the state before a
//! mutation or the state after it, never a partially applied sweep.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;

use thiserror::Error;

use crate::core::Authority;
use crate::core::CatalogError;
use crate::core::DevicePolicySnapshot;
use crate::core::DevicePolicyState;
use crate::core::EnforcingAdmin;
use crate::core::KindMismatch;
use crate::core::PolicyCatalog;
use crate::core::PolicyKey;
use crate::core::PolicyState;
use crate::core::PolicyUpdateNotification;
use crate::core::PolicyUpdateResult;
use crate::core::PolicyValue;
use crate::core::PolicyValueType;
use crate::core::SnapshotError;
use crate::core::TypedPolicyState;
use crate::core::UserId;
use crate::core::UserPolicies;
use crate::core::ValueKind;
use crate::interfaces::PolicyStateStore;
use crate::interfaces::PolicyUpdateNotifier;
use crate::interfaces::StoreError;
use crate::runtime::audit::EVENT_ADMIN_REMOVED;
use crate::runtime::audit::EVENT_NOTIFICATION_DROPPED;
use crate::runtime::audit::EVENT_PERSIST_FAILED;
use crate::runtime::audit::EVENT_POLICY_CLEARED;
use crate::runtime::audit::EVENT_POLICY_REJECTED;
use crate::runtime::audit::EVENT_POLICY_SET;
use crate::runtime::audit::EVENT_STATE_LOADED;
use crate::runtime::audit::EVENT_USER_REMOVED;
use crate::runtime::audit::NoopAuditSink;
use crate::runtime::audit::PolicyAuditEvent;
use crate::runtime::audit::PolicyAuditSink;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PolicyEngineConfig {
    /// Maximum number of policy entries one admin may hold across all buckets.
    pub max_entries_per_admin: Option<usize>,
}

// ============================================================================
// SECTION: Results
// ============================================================================

/// Outcome of [`PolicyEngine::set_policy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetResult {
    /// Outcome for the calling admin.
    pub outcome: PolicyUpdateResult,
    /// Whether the resolved value changed.
    pub resolved_changed: bool,
    /// Resolved value after the call.
    pub resolved: Option<PolicyValue>,
}

/// Outcome of [`PolicyEngine::clear_policy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearResult {
    /// Whether the admin held a value.
    pub removed: bool,
    /// Whether the resolved value changed.
    pub resolved_changed: bool,
    /// Resolved value after the call.
    pub resolved: Option<PolicyValue>,
}

/// Outcome of a sweep over many policy states.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepResult {
    /// Keys whose admin values changed, with their bucket.
    pub affected: Vec<(UserId, PolicyKey)>,
    /// Keys whose state was deleted because no admin value remained.
    pub deleted: Vec<(UserId, PolicyKey)>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Policy engine errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyEngineError {
    /// No declaration exists for the policy identifier.
    #[error("policy engine unknown policy: {0}")]
    UnknownPolicy(String),
    /// The key qualifier does not match the declaration.
    #[error("policy engine invalid key: {0}")]
    InvalidKey(String),
    /// The user bucket is outside the declared scope.
    #[error("policy engine scope mismatch: {0}")]
    ScopeMismatch(String),
    /// The value is not representable under the policy's mechanism.
    #[error("policy engine invalid value: {0}")]
    InvalidValue(String),
    /// The caller used the wrong value type.
    #[error("policy engine type mismatch for {identifier}: expected {expected}, found {actual}")]
    TypeMismatch {
        /// Policy identifier.
        identifier: String,
        /// Type requested or supplied by the caller.
        expected: ValueKind,
        /// Declared or stored type.
        actual: ValueKind,
    },
    /// The operation does not apply to the policy's mechanism.
    #[error("policy engine mechanism mismatch: {0}")]
    MechanismMismatch(String),
    /// The caller lacks authority for the policy.
    #[error("policy engine not permitted: {0}")]
    NotPermitted(String),
    /// Persistence failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Internal failure.
    #[error("policy engine internal error: {0}")]
    Internal(String),
}

impl PolicyEngineError {
    /// Returns a stable label for audit records.
    #[must_use]
    pub const fn kind_label(&self) -> &'static str {
        match self {
            Self::UnknownPolicy(_) => "unknown_policy",
            Self::InvalidKey(_) => "invalid_key",
            Self::ScopeMismatch(_) => "scope_mismatch",
            Self::InvalidValue(_) => "invalid_value",
            Self::TypeMismatch {
                ..
            } => "type_mismatch",
            Self::MechanismMismatch(_) => "mechanism_mismatch",
            Self::NotPermitted(_) => "not_permitted",
            Self::Store(_) => "store",
            Self::Internal(_) => "internal",
        }
    }

    /// Builds a type mismatch for a typed read.
    fn from_kind_mismatch(identifier: &str, mismatch: KindMismatch) -> Self {
        Self::TypeMismatch {
            identifier: identifier.to_string(),
            expected: mismatch.expected,
            actual: mismatch.actual,
        }
    }
}

impl From<CatalogError> for PolicyEngineError {
    fn from(error: CatalogError) -> Self {
        match error {
            CatalogError::UnknownPolicy(message) => Self::UnknownPolicy(message),
            CatalogError::InvalidKey(message) => Self::InvalidKey(message),
            CatalogError::ScopeMismatch(message) => Self::ScopeMismatch(message),
            CatalogError::InvalidValue(message) => Self::InvalidValue(message),
            CatalogError::KindMismatch {
                identifier,
                expected,
                actual,
            } => Self::TypeMismatch {
                identifier,
                expected: actual,
                actual: expected,
            },
            CatalogError::InvalidDefinition(message) => Self::Internal(message),
        }
    }
}

impl From<SnapshotError> for StoreError {
    fn from(error: SnapshotError) -> Self {
        match error {
            SnapshotError::Version(_) => Self::VersionMismatch(error.to_string()),
            SnapshotError::Invalid(_) | SnapshotError::ResolvedMismatch(_) => {
                Self::Corrupt(error.to_string())
            }
        }
    }
}

// ============================================================================
// SECTION: Engine State
// ============================================================================

/// State guarded by the engine lock.
#[derive(Debug, Default)]
struct EngineState {
    /// Buckets keyed by user; [`UserId::ALL`] holds global policies.
    users: BTreeMap<UserId, UserPolicies>,
    /// Last logical sequence number issued.
    sequence: u64,
}

impl EngineState {
    /// Returns the state for a key.
    fn get(&self, key: &PolicyKey, user: UserId) -> Option<&PolicyState> {
        self.users.get(&user).and_then(|bucket| bucket.get(key))
    }

    /// Replaces or removes the state for a key, dropping empty buckets.
    fn put(&mut self, user: UserId, key: &PolicyKey, state: Option<PolicyState>) {
        match state {
            Some(state) if !state.is_empty() => {
                self.users.entry(user).or_default().insert(key.clone(), state);
            }
            _ => {
                if let Some(bucket) = self.users.get_mut(&user) {
                    bucket.remove(key);
                    if bucket.is_empty() {
                        self.users.remove(&user);
                    }
                }
            }
        }
    }

    /// Counts entries held by `admin` across all buckets.
    fn entries_held_by(&self, admin: &EnforcingAdmin) -> usize {
        self.users
            .values()
            .flat_map(BTreeMap::values)
            .filter(|state| state.admin_value(admin).is_some())
            .count()
    }

    /// Builds the persisted form of the current state.
    fn snapshot(&self) -> DevicePolicySnapshot {
        DevicePolicySnapshot::from_buckets(self.sequence, &self.users)
    }
}

/// Entries touched by a mutation, kept for rollback.
struct Touched {
    /// Previous sequence number.
    sequence: u64,
    /// Previous state per touched key.
    entries: Vec<(UserId, PolicyKey, Option<PolicyState>)>,
}

impl Touched {
    /// Restores every touched entry.
    fn restore(self, state: &mut EngineState) {
        state.sequence = self.sequence;
        for (user, key, previous) in self.entries {
            state.put(user, &key, previous);
        }
    }
}

// ============================================================================
// SECTION: Policy Engine
// ============================================================================

/// Registry of every policy state on the device.
pub struct PolicyEngine<S, N> {
    /// Policy declarations.
    catalog: PolicyCatalog,
    /// Snapshot store.
    store: S,
    /// Notification delivery.
    notifier: N,
    /// Audit sink.
    audit: Arc<dyn PolicyAuditSink>,
    /// Engine configuration.
    config: PolicyEngineConfig,
    /// Guarded policy buckets.
    state: RwLock<EngineState>,
}

impl<S, N> PolicyEngine<S, N>
where
    S: PolicyStateStore,
    N: PolicyUpdateNotifier,
{
    /// Opens an engine, restoring the latest snapshot from `store`.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError::Store`] when loading fails or a restored
    /// resolved value differs from its recomputation.
    pub fn open(
        catalog: PolicyCatalog,
        store: S,
        notifier: N,
        config: PolicyEngineConfig,
    ) -> Result<Self, PolicyEngineError> {
        Self::open_with_audit(catalog, store, notifier, config, Arc::new(NoopAuditSink))
    }

    /// Opens an engine that records audit events to `audit`.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError::Store`] when loading fails or a restored
    /// resolved value differs from its recomputation.
    pub fn open_with_audit(
        catalog: PolicyCatalog,
        store: S,
        notifier: N,
        config: PolicyEngineConfig,
        audit: Arc<dyn PolicyAuditSink>,
    ) -> Result<Self, PolicyEngineError> {
        let mut state = EngineState::default();
        if let Some(snapshot) = store.load()? {
            state.users = snapshot.to_buckets().map_err(StoreError::from)?;
            state.sequence = snapshot.sequence;
        }
        let entry_count: usize = state.users.values().map(BTreeMap::len).sum();
        audit.record(
            &PolicyAuditEvent::new(EVENT_STATE_LOADED)
                .with_detail(format!("policies={entry_count} sequence={}", state.sequence)),
        );
        Ok(Self {
            catalog,
            store,
            notifier,
            audit,
            config,
            state: RwLock::new(state),
        })
    }

    /// Returns the policy catalog.
    #[must_use]
    pub const fn catalog(&self) -> &PolicyCatalog {
        &self.catalog
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Records `admin`'s value for `key` in `user`'s bucket.
    ///
    /// An identical repeat leaves the entry and its sequence untouched and
    /// skips the store write, but still notifies.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when validation or persistence fails; the
    /// state is unchanged in that case.
    pub fn set_policy(
        &self,
        key: &PolicyKey,
        user: UserId,
        admin: &EnforcingAdmin,
        value: PolicyValue,
    ) -> Result<SetResult, PolicyEngineError> {
        let result = self.apply_set(key, user, admin, value);
        match &result {
            Ok((set, _)) => self.audit.record(
                &PolicyAuditEvent::new(EVENT_POLICY_SET)
                    .with_key(key, user)
                    .with_admin(admin)
                    .with_outcome(set.outcome.as_str())
                    .with_resolved_changed(set.resolved_changed),
            ),
            Err(err) => self.record_rejection(key, user, admin, err),
        }
        let (set, notifications) = result?;
        self.deliver(notifications);
        Ok(set)
    }

    /// Applies a set under the write guard.
    fn apply_set(
        &self,
        key: &PolicyKey,
        user: UserId,
        admin: &EnforcingAdmin,
        value: PolicyValue,
    ) -> Result<(SetResult, Vec<PolicyUpdateNotification>), PolicyEngineError> {
        let definition = self.catalog.lookup(key, user)?;
        definition.validate_value(&value)?;
        let mut guard = self.write_state()?;
        let previous = guard.get(key, user).cloned();
        let mut state = match &previous {
            Some(existing) => {
                if existing.value_kind() != value.kind() {
                    return Err(PolicyEngineError::TypeMismatch {
                        identifier: key.identifier().to_string(),
                        expected: value.kind(),
                        actual: existing.value_kind(),
                    });
                }
                if !existing.mechanism().permits(&value) {
                    return Err(PolicyEngineError::InvalidValue(format!(
                        "{key} does not accept value under {}",
                        existing.mechanism().label()
                    )));
                }
                existing.clone()
            }
            None => PolicyState::new(
                key.clone(),
                user,
                definition.value_kind,
                definition.mechanism.clone(),
            ),
        };
        let resolved_before = state.current_resolved_policy().cloned();

        if state.admin_value(admin).is_none()
            && let Some(limit) = self.config.max_entries_per_admin
            && guard.entries_held_by(admin) >= limit
        {
            let notification = PolicyUpdateNotification::new(
                admin.clone(),
                key,
                user,
                PolicyUpdateResult::FailureStorageLimitReached,
            );
            return Ok((
                SetResult {
                    outcome: PolicyUpdateResult::FailureStorageLimitReached,
                    resolved_changed: false,
                    resolved: resolved_before,
                },
                vec![notification],
            ));
        }

        let next_sequence = guard.sequence.saturating_add(1);
        if state.record(admin.clone(), value, next_sequence) {
            let touched = Touched {
                sequence: guard.sequence,
                entries: vec![(user, key.clone(), previous)],
            };
            guard.sequence = next_sequence;
            guard.put(user, key, Some(state.clone()));
            self.persist(&mut guard, touched)?;
        }
        drop(guard);

        let outcome = outcome_for(&state, admin);
        let notifications = notifications_for(&state, Some((admin, outcome)));
        let resolved = state.current_resolved_policy().cloned();
        Ok((
            SetResult {
                outcome,
                resolved_changed: resolved != resolved_before,
                resolved,
            },
            notifications,
        ))
    }

    /// Removes `admin`'s value for `key` in `user`'s bucket.
    ///
    /// Clearing a value the admin never set succeeds and still notifies.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when the key is invalid or persistence
    /// fails; the state is unchanged in that case.
    pub fn clear_policy(
        &self,
        key: &PolicyKey,
        user: UserId,
        admin: &EnforcingAdmin,
    ) -> Result<ClearResult, PolicyEngineError> {
        let result = self.apply_clear(key, user, admin);
        match &result {
            Ok((clear, _)) => self.audit.record(
                &PolicyAuditEvent::new(EVENT_POLICY_CLEARED)
                    .with_key(key, user)
                    .with_admin(admin)
                    .with_outcome(if clear.removed { "removed" } else { "absent" })
                    .with_resolved_changed(clear.resolved_changed),
            ),
            Err(err) => self.record_rejection(key, user, admin, err),
        }
        let (clear, notifications) = result?;
        self.deliver(notifications);
        Ok(clear)
    }

    /// Applies a clear under the write guard.
    fn apply_clear(
        &self,
        key: &PolicyKey,
        user: UserId,
        admin: &EnforcingAdmin,
    ) -> Result<(ClearResult, Vec<PolicyUpdateNotification>), PolicyEngineError> {
        self.catalog.lookup(key, user)?;
        let mut guard = self.write_state()?;
        let previous = guard.get(key, user).cloned();
        let Some(mut state) = previous.clone().filter(|state| state.admin_value(admin).is_some())
        else {
            drop(guard);
            let resolved = previous.as_ref().and_then(|s| s.current_resolved_policy().cloned());
            let notification = PolicyUpdateNotification::new(
                admin.clone(),
                key,
                user,
                PolicyUpdateResult::PolicyCleared,
            );
            return Ok((
                ClearResult {
                    removed: false,
                    resolved_changed: false,
                    resolved,
                },
                vec![notification],
            ));
        };
        let resolved_before = state.current_resolved_policy().cloned();
        state.remove(admin);
        let touched = Touched {
            sequence: guard.sequence,
            entries: vec![(user, key.clone(), previous)],
        };
        guard.sequence = guard.sequence.saturating_add(1);
        guard.put(user, key, Some(state.clone()));
        self.persist(&mut guard, touched)?;
        drop(guard);

        let notifications =
            notifications_for(&state, Some((admin, PolicyUpdateResult::PolicyCleared)));
        let resolved = state.current_resolved_policy().cloned();
        Ok((
            ClearResult {
                removed: true,
                resolved_changed: resolved != resolved_before,
                resolved,
            },
            notifications,
        ))
    }

    /// Removes every value `admin` holds, in every bucket, as one batch.
    ///
    /// Remaining admins of each affected key are notified of their outcome.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError::Store`] when persistence fails; nothing is
    /// removed in that case.
    pub fn remove_admin(&self, admin: &EnforcingAdmin) -> Result<SweepResult, PolicyEngineError> {
        let result = self.sweep(|candidate| candidate == admin, None);
        let mut event = PolicyAuditEvent::new(EVENT_ADMIN_REMOVED).with_admin(admin);
        event = match &result {
            Ok((sweep, _)) => event
                .with_outcome("removed")
                .with_detail(format!(
                    "affected={} deleted={}",
                    sweep.affected.len(),
                    sweep.deleted.len()
                )),
            Err(err) => event.with_outcome(err.kind_label()).with_detail(err.to_string()),
        };
        self.audit.record(&event);
        let (sweep, notifications) = result?;
        self.deliver(notifications);
        Ok(sweep)
    }

    /// Drops a deleted user's bucket and every value set by admins running
    /// as that user.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError::Store`] when persistence fails; nothing is
    /// removed in that case.
    pub fn remove_user(&self, user: UserId) -> Result<SweepResult, PolicyEngineError> {
        let result = self.sweep(|candidate| candidate.user == user, Some(user));
        let mut event = PolicyAuditEvent::new(EVENT_USER_REMOVED).with_user(user);
        event = match &result {
            Ok((sweep, _)) => event
                .with_outcome("removed")
                .with_detail(format!(
                    "affected={} deleted={}",
                    sweep.affected.len(),
                    sweep.deleted.len()
                )),
            Err(err) => event.with_outcome(err.kind_label()).with_detail(err.to_string()),
        };
        self.audit.record(&event);
        let (sweep, notifications) = result?;
        self.deliver(notifications);
        Ok(sweep)
    }

    /// Removes matching admins everywhere and optionally drops one bucket.
    fn sweep<F>(
        &self,
        matches: F,
        drop_bucket: Option<UserId>,
    ) -> Result<(SweepResult, Vec<PolicyUpdateNotification>), PolicyEngineError>
    where
        F: Fn(&EnforcingAdmin) -> bool,
    {
        let mut guard = self.write_state()?;
        let mut touched = Touched {
            sequence: guard.sequence,
            entries: Vec::new(),
        };
        let mut result = SweepResult::default();
        let mut survivors = Vec::new();

        if let Some(user) = drop_bucket
            && let Some(bucket) = guard.users.remove(&user)
        {
            for (key, state) in bucket {
                result.deleted.push((user, key.clone()));
                touched.entries.push((user, key, Some(state)));
            }
        }

        let mut updates = Vec::new();
        for (user, bucket) in &guard.users {
            for (key, state) in bucket {
                let doomed: Vec<EnforcingAdmin> =
                    state.admin_entries().keys().filter(|admin| matches(admin)).cloned().collect();
                if doomed.is_empty() {
                    continue;
                }
                let mut next = state.clone();
                for admin in &doomed {
                    next.remove(admin);
                }
                updates.push((*user, key.clone(), state.clone(), next));
            }
        }
        for (user, key, previous, next) in updates {
            result.affected.push((user, key.clone()));
            if next.is_empty() {
                result.deleted.push((user, key.clone()));
            } else {
                survivors.push(next.clone());
            }
            guard.put(user, &key, Some(next));
            touched.entries.push((user, key, Some(previous)));
        }

        if touched.entries.is_empty() {
            return Ok((result, Vec::new()));
        }
        guard.sequence = guard.sequence.saturating_add(1);
        self.persist(&mut guard, touched)?;
        drop(guard);

        let notifications =
            survivors.iter().flat_map(|state| notifications_for(state, None)).collect();
        Ok((result, notifications))
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Returns a typed view of the state for `key`, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError::TypeMismatch`] when `T` differs from the
    /// stored kind.
    pub fn policy_state<T: PolicyValueType>(
        &self,
        key: &PolicyKey,
        user: UserId,
    ) -> Result<Option<TypedPolicyState<T>>, PolicyEngineError> {
        let guard = self.read_state()?;
        guard
            .get(key, user)
            .map(|state| {
                state
                    .to_typed::<T>()
                    .map_err(|err| PolicyEngineError::from_kind_mismatch(key.identifier(), err))
            })
            .transpose()
    }

    /// Returns the untyped state for `key`, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError::Internal`] when the engine lock is poisoned.
    pub fn raw_policy_state(
        &self,
        key: &PolicyKey,
        user: UserId,
    ) -> Result<Option<PolicyState>, PolicyEngineError> {
        Ok(self.read_state()?.get(key, user).cloned())
    }

    /// Returns the resolved value for `key` as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError::TypeMismatch`] when `T` differs from the
    /// stored kind.
    pub fn resolved_policy<T: PolicyValueType>(
        &self,
        key: &PolicyKey,
        user: UserId,
    ) -> Result<Option<T>, PolicyEngineError> {
        Ok(self.policy_state::<T>(key, user)?.and_then(|state| state.resolved))
    }

    /// Returns every policy of one user bucket.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError::Internal`] when the engine lock is poisoned.
    pub fn policies_for_user(&self, user: UserId) -> Result<UserPolicies, PolicyEngineError> {
        Ok(self.read_state()?.users.get(&user).cloned().unwrap_or_default())
    }

    /// Returns every user bucket.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError::Internal`] when the engine lock is poisoned.
    pub fn policies_for_all_users(
        &self,
    ) -> Result<BTreeMap<UserId, UserPolicies>, PolicyEngineError> {
        Ok(self.read_state()?.users.clone())
    }

    /// Returns an owned snapshot of every bucket.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError::Internal`] when the engine lock is poisoned.
    pub fn device_policy_state(&self) -> Result<DevicePolicyState, PolicyEngineError> {
        Ok(DevicePolicyState::new(self.read_state()?.users.clone()))
    }

    /// Returns the persisted form of the current state.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError::Internal`] when the engine lock is poisoned.
    pub fn snapshot(&self) -> Result<DevicePolicySnapshot, PolicyEngineError> {
        Ok(self.read_state()?.snapshot())
    }

    /// Returns the authorities holding a value for a top-priority key,
    /// highest priority first.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError::MechanismMismatch`] when the key is not
    /// resolved by priority, or a catalog error for an unknown key.
    pub fn most_important_authority_for(
        &self,
        key: &PolicyKey,
        user: UserId,
    ) -> Result<Vec<Authority>, PolicyEngineError> {
        let definition = self.catalog.definition_for(key)?;
        let guard = self.read_state()?;
        let mechanism = guard.get(key, user).map_or(&definition.mechanism, PolicyState::mechanism);
        if !mechanism.is_top_priority() {
            return Err(PolicyEngineError::MechanismMismatch(format!(
                "{key} is resolved by {}",
                mechanism.label()
            )));
        }
        let mut ranked: Vec<Authority> = Vec::new();
        if let Some(state) = guard.get(key, user) {
            for (admin, _) in mechanism.ranked_admins(state.admin_entries()) {
                if !ranked.contains(&admin.authority) {
                    ranked.push(admin.authority.clone());
                }
            }
        }
        Ok(ranked)
    }

    /// Returns the admins holding a value for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError::Internal`] when the engine lock is poisoned.
    pub fn enforcing_admins(
        &self,
        key: &PolicyKey,
        user: UserId,
    ) -> Result<Vec<EnforcingAdmin>, PolicyEngineError> {
        Ok(self
            .read_state()?
            .get(key, user)
            .map(|state| state.admin_entries().keys().cloned().collect())
            .unwrap_or_default())
    }

    /// Returns every admin identity of `package_name` holding any value.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError::Internal`] when the engine lock is poisoned.
    pub fn admins_for_package(
        &self,
        package_name: &str,
    ) -> Result<BTreeSet<EnforcingAdmin>, PolicyEngineError> {
        let guard = self.read_state()?;
        Ok(guard
            .users
            .values()
            .flat_map(BTreeMap::values)
            .flat_map(|state| state.admin_entries().keys())
            .filter(|admin| admin.package_name == package_name)
            .cloned()
            .collect())
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Acquires the read guard.
    fn read_state(&self) -> Result<RwLockReadGuard<'_, EngineState>, PolicyEngineError> {
        self.state
            .read()
            .map_err(|_| PolicyEngineError::Internal("policy engine lock poisoned".to_string()))
    }

    /// Acquires the write guard.
    fn write_state(&self) -> Result<RwLockWriteGuard<'_, EngineState>, PolicyEngineError> {
        self.state
            .write()
            .map_err(|_| PolicyEngineError::Internal("policy engine lock poisoned".to_string()))
    }

    /// Saves the current state, restoring `touched` on failure.
    fn persist(&self, state: &mut EngineState, touched: Touched) -> Result<(), PolicyEngineError> {
        match self.store.save(&state.snapshot()) {
            Ok(()) => Ok(()),
            Err(err) => {
                touched.restore(state);
                self.audit.record(
                    &PolicyAuditEvent::new(EVENT_PERSIST_FAILED)
                        .with_outcome("rolled_back")
                        .with_detail(err.to_string()),
                );
                Err(PolicyEngineError::Store(err))
            }
        }
    }

    /// Delivers notifications, auditing each failure.
    fn deliver(&self, notifications: Vec<PolicyUpdateNotification>) {
        for notification in notifications {
            if let Err(err) = self.notifier.notify(&notification) {
                let mut event = PolicyAuditEvent::new(EVENT_NOTIFICATION_DROPPED)
                    .with_admin(&notification.admin)
                    .with_outcome(notification.result.as_str())
                    .with_detail(err.to_string());
                event.policy_identifier = Some(notification.policy_identifier.clone());
                self.audit.record(&event);
            }
        }
    }

    /// Records a rejected mutation.
    fn record_rejection(
        &self,
        key: &PolicyKey,
        user: UserId,
        admin: &EnforcingAdmin,
        error: &PolicyEngineError,
    ) {
        if matches!(error, PolicyEngineError::Store(_)) {
            return;
        }
        self.audit.record(
            &PolicyAuditEvent::new(EVENT_POLICY_REJECTED)
                .with_key(key, user)
                .with_admin(admin)
                .with_outcome(error.kind_label())
                .with_detail(error.to_string()),
        );
    }
}

// ============================================================================
// SECTION: Notification Routing
// ============================================================================

/// Returns the current outcome for an admin holding a value.
fn outcome_for(state: &PolicyState, admin: &EnforcingAdmin) -> PolicyUpdateResult {
    if state.is_enforced_for(admin) {
        PolicyUpdateResult::PolicySet
    } else {
        PolicyUpdateResult::FailureConflictingAdminPolicy
    }
}

/// Builds notifications for every admin of `state`, plus the caller.
///
/// The caller's outcome, when given, replaces the computed one.
fn notifications_for(
    state: &PolicyState,
    caller: Option<(&EnforcingAdmin, PolicyUpdateResult)>,
) -> Vec<PolicyUpdateNotification> {
    let mut notifications = Vec::new();
    if let Some((admin, result)) = caller {
        notifications.push(PolicyUpdateNotification::new(
            admin.clone(),
            state.key(),
            state.user(),
            result,
        ));
    }
    for admin in state.admin_entries().keys() {
        if caller.is_some_and(|(caller, _)| caller == admin) {
            continue;
        }
        notifications.push(PolicyUpdateNotification::new(
            admin.clone(),
            state.key(),
            state.user(),
            outcome_for(state, admin),
        ));
    }
    notifications
}

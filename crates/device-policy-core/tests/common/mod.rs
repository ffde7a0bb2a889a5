// device-policy-core/tests/common/mod.rs
// ============================================================================
// Module: Policy Engine Test Helpers
// Description: Shared fixtures for engine, client, and persistence tests.
// ============================================================================

//! Shared fixtures for device policy core tests.

#![allow(dead_code, reason = "Helpers are shared across test binaries.")]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use device_policy_core::DevicePolicySnapshot;
use device_policy_core::EnforcingAdmin;
use device_policy_core::FINANCED_DEVICE_CONTROLLER_ROLE;
use device_policy_core::InMemoryPolicyStore;
use device_policy_core::NotifyError;
use device_policy_core::PolicyAuditEvent;
use device_policy_core::PolicyAuditSink;
use device_policy_core::PolicyCatalog;
use device_policy_core::PolicyEngine;
use device_policy_core::PolicyEngineConfig;
use device_policy_core::PolicyStateStore;
use device_policy_core::PolicyUpdateNotification;
use device_policy_core::PolicyUpdateNotifier;
use device_policy_core::PolicyUpdateResult;
use device_policy_core::StoreError;
use device_policy_core::UserId;

/// Local test user.
pub const USER: UserId = UserId::new(10);

/// Engine type used across tests.
pub type TestEngine = PolicyEngine<FlakyStore, RecordingNotifier>;

/// Notifier capturing every notification.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    /// Captured notifications.
    pub seen: Arc<Mutex<Vec<PolicyUpdateNotification>>>,
    /// When set, every delivery fails.
    pub fail: Arc<AtomicBool>,
}

impl RecordingNotifier {
    /// Returns and clears captured notifications.
    pub fn take(&self) -> Vec<PolicyUpdateNotification> {
        std::mem::take(&mut *self.seen.lock().unwrap())
    }

    /// Returns the results delivered to `package`.
    pub fn results_for(&self, package: &str) -> Vec<PolicyUpdateResult> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|notification| notification.admin.package_name == package)
            .map(|notification| notification.result)
            .collect()
    }
}

impl PolicyUpdateNotifier for RecordingNotifier {
    fn notify(&self, notification: &PolicyUpdateNotification) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Closed(notification.admin.package_name.clone()));
        }
        self.seen.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// In-memory store whose saves can be made to fail.
#[derive(Debug, Clone, Default)]
pub struct FlakyStore {
    /// Backing store.
    pub inner: InMemoryPolicyStore,
    /// When set, saves fail.
    pub fail_saves: Arc<AtomicBool>,
}

impl PolicyStateStore for FlakyStore {
    fn load(&self) -> Result<Option<DevicePolicySnapshot>, StoreError> {
        self.inner.load()
    }

    fn save(&self, snapshot: &DevicePolicySnapshot) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io("disk full".to_string()));
        }
        self.inner.save(snapshot)
    }
}

/// Audit sink capturing events.
#[derive(Debug, Default)]
pub struct RecordingAudit {
    /// Captured events.
    pub events: Mutex<Vec<PolicyAuditEvent>>,
}

impl RecordingAudit {
    /// Returns captured event names.
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|event| event.event).collect()
    }
}

impl PolicyAuditSink for RecordingAudit {
    fn record(&self, event: &PolicyAuditEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Opens an engine over the given store and notifier.
pub fn open_engine(store: FlakyStore, notifier: RecordingNotifier) -> TestEngine {
    PolicyEngine::open(PolicyCatalog::builtin(), store, notifier, PolicyEngineConfig::default())
        .unwrap()
}

/// Opens a fresh engine and returns its collaborators.
pub fn fresh_engine() -> (TestEngine, FlakyStore, RecordingNotifier) {
    let store = FlakyStore::default();
    let notifier = RecordingNotifier::default();
    let engine = open_engine(store.clone(), notifier.clone());
    (engine, store, notifier)
}

/// DPC admin on the test user.
pub fn dpc() -> EnforcingAdmin {
    EnforcingAdmin::dpc("com.example.dpc", USER)
}

/// Second DPC-like admin acting through a permission.
pub fn permission_admin() -> EnforcingAdmin {
    EnforcingAdmin::new("com.example.helper", device_policy_core::Authority::Permission, USER)
}

/// Financed-device controller role holder.
pub fn financed_controller() -> EnforcingAdmin {
    EnforcingAdmin::role_holder("com.example.financed", [FINANCED_DEVICE_CONTROLLER_ROLE], USER)
}

// device-policy-broker/tests/router.rs
// ============================================================================
// Module: Channel Router Tests
// Description: Per-admin routing and timed waits through a live engine.
// Purpose: Validate queue behavior and await semantics end to end.
// Dependencies: device-policy-broker, device-policy-core, tokio
// ============================================================================

//! ## Overview
//! Wires [`device_policy_broker::ChannelRouter`] into a policy engine and
//! checks what each registered admin receives.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::Arc;
use std::time::Duration;

use device_policy_broker::ChannelRouter;
use device_policy_broker::ReceiveError;
use device_policy_core::EnforcingAdmin;
use device_policy_core::FINANCED_DEVICE_CONTROLLER_ROLE;
use device_policy_core::InMemoryPolicyStore;
use device_policy_core::LockTaskPolicy;
use device_policy_core::NotifyError;
use device_policy_core::PolicyCatalog;
use device_policy_core::PolicyEngine;
use device_policy_core::PolicyEngineConfig;
use device_policy_core::PolicyKey;
use device_policy_core::PolicyUpdateNotifier;
use device_policy_core::PolicyUpdateResult;
use device_policy_core::PolicyValue;
use device_policy_core::UserId;
use device_policy_core::catalog::LOCK_TASK_POLICY;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Local test user.
const USER: UserId = UserId::new(10);

/// Opens an engine delivering through `router`.
fn engine_with(
    router: Arc<ChannelRouter>,
) -> PolicyEngine<InMemoryPolicyStore, Arc<ChannelRouter>> {
    PolicyEngine::open(
        PolicyCatalog::builtin(),
        InMemoryPolicyStore::default(),
        router,
        PolicyEngineConfig::default(),
    )
    .unwrap()
}

/// Builds a lock-task value with one package.
fn lock_task(package: &str) -> PolicyValue {
    PolicyValue::LockTask(LockTaskPolicy::new([package], 0))
}

// ============================================================================
// SECTION: Routing Tests
// ============================================================================

/// Tests each admin receives only its own notifications.
#[tokio::test]
async fn router_delivers_per_package() {
    let router = Arc::new(ChannelRouter::default());
    let mut dpc_rx = router.register("com.example.dpc");
    let mut controller_rx = router.register("com.example.financed");
    let engine = engine_with(Arc::clone(&router));
    let dpc = EnforcingAdmin::dpc("com.example.dpc", USER);
    let controller = EnforcingAdmin::role_holder(
        "com.example.financed",
        [FINANCED_DEVICE_CONTROLLER_ROLE],
        USER,
    );
    let key = PolicyKey::no_args(LOCK_TASK_POLICY);

    engine.set_policy(&key, USER, &dpc, lock_task("A")).unwrap();
    engine.set_policy(&key, USER, &controller, lock_task("B")).unwrap();

    let first = dpc_rx.recv().await.unwrap();
    assert_eq!(first.result, PolicyUpdateResult::PolicySet);
    let second = dpc_rx.recv().await.unwrap();
    assert_eq!(second.result, PolicyUpdateResult::FailureConflictingAdminPolicy);
    let controller_note = controller_rx.recv().await.unwrap();
    assert_eq!(controller_note.admin, controller);
    assert_eq!(controller_note.result, PolicyUpdateResult::PolicySet);
    assert!(controller_rx.try_recv().unwrap().is_none());
}

/// Tests unregistered packages are reported and do not fail the engine call.
#[tokio::test]
async fn unregistered_package_is_dropped() {
    let router = Arc::new(ChannelRouter::default());
    let engine = engine_with(Arc::clone(&router));
    let dpc = EnforcingAdmin::dpc("com.example.dpc", USER);
    let key = PolicyKey::no_args(LOCK_TASK_POLICY);
    assert!(engine.set_policy(&key, USER, &dpc, lock_task("A")).is_ok());

    let mut rx = router.register("com.example.dpc");
    assert!(rx.try_recv().unwrap().is_none());
}

/// Tests a full queue rejects further sends without blocking.
#[test]
fn full_queue_rejects_send() {
    let router = ChannelRouter::new(1);
    let mut rx = router.register("com.example.dpc");
    let note = device_policy_core::PolicyUpdateNotification::new(
        EnforcingAdmin::dpc("com.example.dpc", USER),
        &PolicyKey::no_args(LOCK_TASK_POLICY),
        USER,
        PolicyUpdateResult::PolicySet,
    );
    router.notify(&note).unwrap();
    assert_eq!(router.notify(&note), Err(NotifyError::QueueFull("com.example.dpc".to_string())));
    assert_eq!(rx.try_recv().unwrap(), Some(note.clone()));
    router.notify(&note).unwrap();
}

/// Tests re-registering closes the previous receiver.
#[test]
fn reregistering_replaces_receiver() {
    let router = ChannelRouter::default();
    let mut old = router.register("com.example.dpc");
    let _new = router.register("com.example.dpc");
    assert_eq!(old.try_recv(), Err(ReceiveError::Closed));
    assert!(router.unregister("com.example.dpc"));
    assert!(!router.unregister("com.example.dpc"));
}

// ============================================================================
// SECTION: Await Tests
// ============================================================================

/// Tests await_result skips non-matching notifications.
#[tokio::test]
async fn await_result_returns_first_match() {
    let router = Arc::new(ChannelRouter::default());
    let mut rx = router.register("com.example.dpc");
    let engine = engine_with(Arc::clone(&router));
    let dpc = EnforcingAdmin::dpc("com.example.dpc", USER);
    let key = PolicyKey::no_args(LOCK_TASK_POLICY);
    engine.set_policy(&key, USER, &dpc, lock_task("A")).unwrap();
    engine.clear_policy(&key, USER, &dpc).unwrap();

    let cleared = rx
        .await_result_within(
            |note| note.result == PolicyUpdateResult::PolicyCleared,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
    assert_eq!(cleared.policy_identifier, LOCK_TASK_POLICY);
    assert_eq!(rx.package_name(), "com.example.dpc");
}

/// Tests await_result times out when nothing matches.
#[tokio::test]
async fn await_result_times_out() {
    let router = ChannelRouter::default().with_delivery_timeout(Duration::from_millis(20));
    let mut rx = router.register("com.example.dpc");
    let err = rx.await_result(|_| true).await.unwrap_err();
    assert_eq!(err, ReceiveError::Timeout(20));
}

/// Tests await_result reports closure when the registration goes away.
#[tokio::test]
async fn await_result_reports_closed_queue() {
    let router = ChannelRouter::default();
    let mut rx = router.register("com.example.dpc");
    router.unregister("com.example.dpc");
    let err = rx.await_result_within(|_| true, Duration::from_secs(5)).await.unwrap_err();
    assert_eq!(err, ReceiveError::Closed);
}

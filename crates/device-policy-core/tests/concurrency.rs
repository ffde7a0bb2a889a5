// device-policy-core/tests/concurrency.rs
// ============================================================================
// Module: Policy Engine Concurrency Tests
// Description: Concurrent writers, sweeps, and readers on one shared engine.
// Purpose: Ensure readers only observe fully applied mutations.
// Dependencies: device-policy-core
// ============================================================================

//! ## Overview
//! Writer threads set and clear union policies while a sweeper repeatedly
//! installs and removes an admin across two buckets. Readers check that every
//! observed state is internally consistent and that no sweep is seen half
//! applied.

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
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;

use common::TestEngine;
use common::USER;
use common::fresh_engine;
use device_policy_core::Authority;
use device_policy_core::EnforcingAdmin;
use device_policy_core::PolicyKey;
use device_policy_core::PolicyState;
use device_policy_core::PolicyValue;
use device_policy_core::UserId;
use device_policy_core::catalog::KEYGUARD_DISABLED_FEATURES_POLICY;
use device_policy_core::catalog::USER_CONTROL_DISABLED_PACKAGES_POLICY;

const WRITERS: usize = 4;
const ROUNDS: usize = 50;

fn writer(index: usize) -> EnforcingAdmin {
    EnforcingAdmin::new(format!("com.writer{index}"), Authority::Permission, USER)
}

fn transient() -> EnforcingAdmin {
    EnforcingAdmin::new("com.transient", Authority::Permission, USER)
}

fn flags_key() -> PolicyKey {
    PolicyKey::no_args(KEYGUARD_DISABLED_FEATURES_POLICY)
}

fn packages_key() -> PolicyKey {
    PolicyKey::no_args(USER_CONTROL_DISABLED_PACKAGES_POLICY)
}

fn flag_for(index: usize) -> i32 {
    1 << (index + 1)
}

fn packages(names: &[&str]) -> PolicyValue {
    PolicyValue::StringSet(names.iter().map(|name| (*name).to_string()).collect())
}

fn assert_consistent(state: &PolicyState) {
    assert!(!state.is_empty());
    assert_eq!(
        state.current_resolved_policy().cloned(),
        state.mechanism().resolve(state.admin_entries())
    );
}

fn read_until(engine: &TestEngine, done: &AtomicBool) {
    while !done.load(Ordering::SeqCst) {
        for (key, user) in [(flags_key(), USER), (packages_key(), UserId::ALL)] {
            if let Some(state) = engine.raw_policy_state(&key, user).unwrap() {
                assert_consistent(&state);
            }
        }
        let device = engine.device_policy_state().unwrap();
        let holds = |key: &PolicyKey, user: UserId| {
            device
                .policies_for_user(user)
                .get(key)
                .is_some_and(|state| state.admin_value(&transient()).is_some())
        };
        if holds(&packages_key(), UserId::ALL) {
            assert!(holds(&flags_key(), USER), "sweep observed half applied");
        }
        for bucket in device.policies_for_all_users().values() {
            bucket.values().for_each(assert_consistent);
        }
    }
}

#[test]
fn concurrent_mutations_are_observed_whole() {
    let (engine, _, _) = fresh_engine();
    let engine = Arc::new(engine);
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        let readers: Vec<_> =
            (0 .. 2).map(|_| scope.spawn(|| read_until(&engine, &done))).collect();

        let writers: Vec<_> = (0 .. WRITERS)
            .map(|index| {
                let engine = Arc::clone(&engine);
                scope.spawn(move || {
                    let admin = writer(index);
                    let package = format!("com.pkg{index}");
                    for _ in 0 .. ROUNDS {
                        engine
                            .set_policy(
                                &flags_key(),
                                USER,
                                &admin,
                                PolicyValue::Integer(flag_for(index)),
                            )
                            .unwrap();
                        engine
                            .set_policy(&packages_key(), UserId::ALL, &admin, packages(&[&package]))
                            .unwrap();
                        engine.clear_policy(&flags_key(), USER, &admin).unwrap();
                        engine
                            .set_policy(
                                &flags_key(),
                                USER,
                                &admin,
                                PolicyValue::Integer(flag_for(index)),
                            )
                            .unwrap();
                    }
                })
            })
            .collect();

        let sweeper = scope.spawn(|| {
            for _ in 0 .. ROUNDS {
                engine
                    .set_policy(&flags_key(), USER, &transient(), PolicyValue::Integer(1))
                    .unwrap();
                engine
                    .set_policy(&packages_key(), UserId::ALL, &transient(), packages(&["com.gone"]))
                    .unwrap();
                let sweep = engine.remove_admin(&transient()).unwrap();
                assert_eq!(sweep.affected.len(), 2);
            }
        });

        for handle in writers {
            handle.join().unwrap();
        }
        sweeper.join().unwrap();
        done.store(true, Ordering::SeqCst);
        for handle in readers {
            handle.join().unwrap();
        }
    });

    let expected_flags = (0 .. WRITERS).fold(0, |acc, index| acc | flag_for(index));
    assert_eq!(engine.resolved_policy::<i32>(&flags_key(), USER).unwrap(), Some(expected_flags));
    let expected_packages: BTreeSet<String> =
        (0 .. WRITERS).map(|index| format!("com.pkg{index}")).collect();
    assert_eq!(
        engine.resolved_policy::<BTreeSet<String>>(&packages_key(), UserId::ALL).unwrap(),
        Some(expected_packages)
    );
    let state = engine.raw_policy_state(&flags_key(), USER).unwrap().unwrap();
    assert!(state.admin_value(&transient()).is_none());
    assert_eq!(state.admin_entries().len(), WRITERS);
}

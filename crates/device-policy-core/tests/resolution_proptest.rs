// device-policy-core/tests/resolution_proptest.rs
// ============================================================================
// Module: Resolution Property-Based Tests
// Description: Order independence and idempotence of policy resolution.
// Purpose: Detect call-order sensitivity across wide input ranges.
// ============================================================================

//! Property-based tests for resolution invariants.

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

use common::USER;
use common::fresh_engine;
use device_policy_core::Authority;
use device_policy_core::EnforcingAdmin;
use device_policy_core::FINANCED_DEVICE_CONTROLLER_ROLE;
use device_policy_core::LockTaskPolicy;
use device_policy_core::PolicyKey;
use device_policy_core::PolicyValue;
use device_policy_core::UserId;
use device_policy_core::catalog::KEYGUARD_DISABLED_FEATURES_POLICY;
use device_policy_core::catalog::LOCK_TASK_POLICY;
use device_policy_core::catalog::PERMISSION_GRANT_POLICY;
use device_policy_core::catalog::USER_CONTROL_DISABLED_PACKAGES_POLICY;
use proptest::prelude::*;

fn admin_for(index: usize) -> EnforcingAdmin {
    let package = format!("com.admin{index}");
    match index % 3 {
        0 => EnforcingAdmin::dpc(package, USER),
        1 => EnforcingAdmin::new(package, Authority::Permission, USER),
        _ => EnforcingAdmin::role_holder(package, [FINANCED_DEVICE_CONTROLLER_ROLE], USER),
    }
}

fn resolve_in_order(
    key: &PolicyKey,
    user: UserId,
    writes: &[(usize, PolicyValue)],
) -> Option<PolicyValue> {
    let (engine, _, _) = fresh_engine();
    for (index, value) in writes {
        engine.set_policy(key, user, &admin_for(*index), value.clone()).unwrap();
    }
    engine
        .raw_policy_state(key, user)
        .unwrap()
        .and_then(|state| state.current_resolved_policy().cloned())
}

fn distinct_writes<S>(
    values: S,
) -> impl Strategy<Value = (Vec<(usize, PolicyValue)>, Vec<(usize, PolicyValue)>)>
where
    S: Strategy<Value = PolicyValue> + Clone + 'static,
{
    prop::collection::vec(values, 1 .. 6).prop_flat_map(|values| {
        let writes: Vec<(usize, PolicyValue)> = values.into_iter().enumerate().collect();
        (Just(writes.clone()), Just(writes).prop_shuffle())
    })
}

fn grant_value() -> impl Strategy<Value = PolicyValue> + Clone {
    (0_i32 ..= 2).prop_map(PolicyValue::Integer)
}

fn flag_value() -> impl Strategy<Value = PolicyValue> + Clone {
    (0_i32 .. 64).prop_map(PolicyValue::Integer)
}

fn string_set_value() -> impl Strategy<Value = PolicyValue> + Clone {
    prop::collection::btree_set("[a-c]{1,2}", 0 .. 3).prop_map(PolicyValue::StringSet)
}

fn lock_task_value() -> impl Strategy<Value = PolicyValue> + Clone {
    prop::collection::btree_set("[a-c]", 1 .. 3)
        .prop_map(|packages| PolicyValue::LockTask(LockTaskPolicy::new(packages, 0)))
}

proptest! {
    #[test]
    fn most_restrictive_is_order_independent(
        (forward, shuffled) in distinct_writes(grant_value())
    ) {
        let key = PolicyKey::package_permission(PERMISSION_GRANT_POLICY, "com.target", "CAMERA");
        prop_assert_eq!(
            resolve_in_order(&key, USER, &forward),
            resolve_in_order(&key, USER, &shuffled)
        );
    }

    #[test]
    fn flag_union_is_order_independent((forward, shuffled) in distinct_writes(flag_value())) {
        let key = PolicyKey::no_args(KEYGUARD_DISABLED_FEATURES_POLICY);
        let resolved = resolve_in_order(&key, USER, &forward);
        let expected = forward.iter().fold(0, |bits, (_, value)| match value {
            PolicyValue::Integer(flags) => bits | flags,
            _ => bits,
        });
        prop_assert_eq!(resolved.clone(), Some(PolicyValue::Integer(expected)));
        prop_assert_eq!(resolved, resolve_in_order(&key, USER, &shuffled));
    }

    #[test]
    fn string_set_union_is_order_independent(
        (forward, shuffled) in distinct_writes(string_set_value())
    ) {
        let key = PolicyKey::no_args(USER_CONTROL_DISABLED_PACKAGES_POLICY);
        prop_assert_eq!(
            resolve_in_order(&key, UserId::ALL, &forward),
            resolve_in_order(&key, UserId::ALL, &shuffled)
        );
    }

    #[test]
    fn top_priority_is_order_independent(
        (forward, shuffled) in distinct_writes(lock_task_value())
    ) {
        let key = PolicyKey::no_args(LOCK_TASK_POLICY);
        prop_assert_eq!(
            resolve_in_order(&key, USER, &forward),
            resolve_in_order(&key, USER, &shuffled)
        );
    }

    #[test]
    fn repeated_sets_do_not_change_state((writes, _) in distinct_writes(grant_value())) {
        let key = PolicyKey::package_permission(PERMISSION_GRANT_POLICY, "com.target", "CAMERA");
        let (engine, _, _) = fresh_engine();
        for (index, value) in &writes {
            engine.set_policy(&key, USER, &admin_for(*index), value.clone()).unwrap();
        }
        let before = engine.device_policy_state().unwrap();
        for (index, value) in &writes {
            let result = engine.set_policy(&key, USER, &admin_for(*index), value.clone()).unwrap();
            prop_assert!(!result.resolved_changed);
        }
        prop_assert_eq!(engine.device_policy_state().unwrap(), before);
    }
}

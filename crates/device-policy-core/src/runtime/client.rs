// device-policy-core/src/runtime/client.rs
// ============================================================================
// Module: Device Policy Client
// Description: Typed per-admin facade over the policy engine.
// Purpose: Map setX/getX/clearX calls onto engine keys with authorization.
// Dependencies: crate::{core, interfaces, runtime::engine}
// ============================================================================

//! ## Overview
//! A [`DevicePolicyClient`] binds one [`EnforcingAdmin`] to an engine and an
//! [`AdminAuthorizer`]. Every call is authorized first, then mapped 1:1 onto
//! [`PolicyEngine::set_policy`], [`PolicyEngine::clear_policy`], or a resolved
//! read. Global policies are stored under [`UserId::ALL`]; everything else uses
//! the client's user.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use crate::core::Bundle;
use crate::core::ComponentName;
use crate::core::EnforcingAdmin;
use crate::core::IntentFilter;
use crate::core::LockTaskPolicy;
use crate::core::PolicyKey;
use crate::core::PolicyValueType;
use crate::core::UserId;
use crate::core::catalog::ACCOUNT_MANAGEMENT_DISABLED_POLICY;
use crate::core::catalog::APPLICATION_HIDDEN_POLICY;
use crate::core::catalog::APPLICATION_RESTRICTIONS_POLICY;
use crate::core::catalog::AUTO_TIMEZONE_POLICY;
use crate::core::catalog::KEYGUARD_DISABLE_FEATURES_NONE;
use crate::core::catalog::KEYGUARD_DISABLED_FEATURES_POLICY;
use crate::core::catalog::LOCK_TASK_POLICY;
use crate::core::catalog::PACKAGE_UNINSTALL_BLOCKED_POLICY;
use crate::core::catalog::PERMISSION_GRANT_POLICY;
use crate::core::catalog::PERMITTED_INPUT_METHODS_POLICY;
use crate::core::catalog::PERSISTENT_PREFERRED_ACTIVITY_POLICY;
use crate::core::catalog::PERSONAL_APPS_SUSPENDED_POLICY;
use crate::core::catalog::RESET_PASSWORD_TOKEN_POLICY;
use crate::core::catalog::SCREEN_CAPTURE_DISABLED_POLICY;
use crate::core::catalog::USER_CONTROL_DISABLED_PACKAGES_POLICY;
use crate::core::value::LOCK_TASK_FEATURE_NONE;
use crate::interfaces::AdminAuthorizer;
use crate::interfaces::AuthorizationDecision;
use crate::interfaces::PolicyAccess;
use crate::interfaces::PolicyStateStore;
use crate::interfaces::PolicyUpdateNotifier;
use crate::runtime::engine::ClearResult;
use crate::runtime::engine::PolicyEngine;
use crate::runtime::engine::PolicyEngineError;
use crate::runtime::engine::SetResult;

// ============================================================================
// SECTION: Results
// ============================================================================

/// Outcome of a facade write, which may set or clear depending on input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A value was recorded.
    Set(SetResult),
    /// The admin's value was cleared.
    Cleared(ClearResult),
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Typed admin API bound to one enforcing admin.
pub struct DevicePolicyClient<'a, S, N, A> {
    /// Engine receiving the calls.
    engine: &'a PolicyEngine<S, N>,
    /// Authorization layer.
    authorizer: &'a A,
    /// Calling admin.
    admin: EnforcingAdmin,
}

impl<'a, S, N, A> DevicePolicyClient<'a, S, N, A>
where
    S: PolicyStateStore,
    N: PolicyUpdateNotifier,
    A: AdminAuthorizer,
{
    /// Binds `admin` to an engine.
    #[must_use]
    pub const fn new(
        engine: &'a PolicyEngine<S, N>,
        authorizer: &'a A,
        admin: EnforcingAdmin,
    ) -> Self {
        Self {
            engine,
            authorizer,
            admin,
        }
    }

    /// Returns the bound admin.
    #[must_use]
    pub const fn admin(&self) -> &EnforcingAdmin {
        &self.admin
    }

    /// Returns the admin's own user bucket.
    const fn local(&self) -> UserId {
        self.admin.user
    }

    // ------------------------------------------------------------------------
    // Auto Timezone
    // ------------------------------------------------------------------------

    /// Sets whether automatic time zone is enabled device-wide.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization, validation, or
    /// persistence fails.
    pub fn set_auto_timezone_enabled(&self, enabled: bool) -> Result<SetResult, PolicyEngineError> {
        self.set(&PolicyKey::no_args(AUTO_TIMEZONE_POLICY), UserId::ALL, enabled)
    }

    /// Returns the resolved automatic time zone value.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization fails.
    pub fn auto_timezone_enabled(&self) -> Result<Option<bool>, PolicyEngineError> {
        self.resolved(&PolicyKey::no_args(AUTO_TIMEZONE_POLICY), UserId::ALL)
    }

    /// Clears this admin's automatic time zone value.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization or persistence fails.
    pub fn clear_auto_timezone(&self) -> Result<ClearResult, PolicyEngineError> {
        self.clear(&PolicyKey::no_args(AUTO_TIMEZONE_POLICY), UserId::ALL)
    }

    // ------------------------------------------------------------------------
    // Permission Grants
    // ------------------------------------------------------------------------

    /// Sets the grant state of one runtime permission of a package.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError::InvalidValue`] for an unknown grant state.
    pub fn set_permission_grant_state(
        &self,
        package_name: &str,
        permission_name: &str,
        grant_state: i32,
    ) -> Result<SetResult, PolicyEngineError> {
        let key =
            PolicyKey::package_permission(PERMISSION_GRANT_POLICY, package_name, permission_name);
        self.set(&key, self.local(), grant_state)
    }

    /// Returns the resolved grant state.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization fails.
    pub fn permission_grant_state(
        &self,
        package_name: &str,
        permission_name: &str,
    ) -> Result<Option<i32>, PolicyEngineError> {
        let key =
            PolicyKey::package_permission(PERMISSION_GRANT_POLICY, package_name, permission_name);
        self.resolved(&key, self.local())
    }

    /// Clears this admin's grant state.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization or persistence fails.
    pub fn clear_permission_grant_state(
        &self,
        package_name: &str,
        permission_name: &str,
    ) -> Result<ClearResult, PolicyEngineError> {
        let key =
            PolicyKey::package_permission(PERMISSION_GRANT_POLICY, package_name, permission_name);
        self.clear(&key, self.local())
    }

    // ------------------------------------------------------------------------
    // Lock Task
    // ------------------------------------------------------------------------

    /// Sets the lock-task allow-list, keeping this admin's feature flags.
    ///
    /// An empty list clears this admin's lock-task value.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization, validation, or
    /// persistence fails.
    pub fn set_lock_task_packages<I, P>(
        &self,
        packages: I,
    ) -> Result<WriteOutcome, PolicyEngineError>
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        let key = PolicyKey::no_args(LOCK_TASK_POLICY);
        let packages: BTreeSet<String> = packages.into_iter().map(Into::into).collect();
        if packages.is_empty() {
            return self.clear(&key, self.local()).map(WriteOutcome::Cleared);
        }
        let flags = self
            .own::<LockTaskPolicy>(&key, self.local())?
            .map_or(LOCK_TASK_FEATURE_NONE, |own| own.flags);
        self.set(
            &key,
            self.local(),
            LockTaskPolicy {
                packages,
                flags,
            },
        )
        .map(WriteOutcome::Set)
    }

    /// Sets the lock-task feature flags, keeping this admin's packages.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError::InvalidValue`] for invalid flag sets.
    pub fn set_lock_task_features(&self, flags: i32) -> Result<SetResult, PolicyEngineError> {
        let key = PolicyKey::no_args(LOCK_TASK_POLICY);
        let packages = self
            .own::<LockTaskPolicy>(&key, self.local())?
            .map(|own| own.packages)
            .unwrap_or_default();
        self.set(
            &key,
            self.local(),
            LockTaskPolicy {
                packages,
                flags,
            },
        )
    }

    /// Returns the resolved lock-task allow-list.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization fails.
    pub fn lock_task_packages(&self) -> Result<BTreeSet<String>, PolicyEngineError> {
        Ok(self
            .resolved::<LockTaskPolicy>(&PolicyKey::no_args(LOCK_TASK_POLICY), self.local())?
            .map(|policy| policy.packages)
            .unwrap_or_default())
    }

    /// Returns the resolved lock-task feature flags.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization fails.
    pub fn lock_task_features(&self) -> Result<i32, PolicyEngineError> {
        Ok(self
            .resolved::<LockTaskPolicy>(&PolicyKey::no_args(LOCK_TASK_POLICY), self.local())?
            .map_or(LOCK_TASK_FEATURE_NONE, |policy| policy.flags))
    }

    // ------------------------------------------------------------------------
    // User Control Disabled Packages
    // ------------------------------------------------------------------------

    /// Sets packages whose user control is disabled; empty clears.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization or persistence fails.
    pub fn set_user_control_disabled_packages<I, P>(
        &self,
        packages: I,
    ) -> Result<WriteOutcome, PolicyEngineError>
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        let key = PolicyKey::no_args(USER_CONTROL_DISABLED_PACKAGES_POLICY);
        let packages: BTreeSet<String> = packages.into_iter().map(Into::into).collect();
        if packages.is_empty() {
            return self.clear(&key, UserId::ALL).map(WriteOutcome::Cleared);
        }
        self.set(&key, UserId::ALL, packages).map(WriteOutcome::Set)
    }

    /// Returns the union of user-control-disabled packages.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization fails.
    pub fn user_control_disabled_packages(&self) -> Result<BTreeSet<String>, PolicyEngineError> {
        Ok(self
            .resolved(&PolicyKey::no_args(USER_CONTROL_DISABLED_PACKAGES_POLICY), UserId::ALL)?
            .unwrap_or_default())
    }

    // ------------------------------------------------------------------------
    // Package Policies
    // ------------------------------------------------------------------------

    /// Sets whether a package's uninstall is blocked.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization or persistence fails.
    pub fn set_uninstall_blocked(
        &self,
        package_name: &str,
        blocked: bool,
    ) -> Result<SetResult, PolicyEngineError> {
        let key = PolicyKey::package(PACKAGE_UNINSTALL_BLOCKED_POLICY, package_name);
        self.set(&key, self.local(), blocked)
    }

    /// Returns whether a package's uninstall is blocked.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization fails.
    pub fn is_uninstall_blocked(&self, package_name: &str) -> Result<bool, PolicyEngineError> {
        let key = PolicyKey::package(PACKAGE_UNINSTALL_BLOCKED_POLICY, package_name);
        Ok(self.resolved(&key, self.local())?.unwrap_or(false))
    }

    /// Sets whether a package is hidden.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization or persistence fails.
    pub fn set_application_hidden(
        &self,
        package_name: &str,
        hidden: bool,
    ) -> Result<SetResult, PolicyEngineError> {
        let key = PolicyKey::package(APPLICATION_HIDDEN_POLICY, package_name);
        self.set(&key, self.local(), hidden)
    }

    /// Returns whether a package is hidden.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization fails.
    pub fn is_application_hidden(&self, package_name: &str) -> Result<bool, PolicyEngineError> {
        let key = PolicyKey::package(APPLICATION_HIDDEN_POLICY, package_name);
        Ok(self.resolved(&key, self.local())?.unwrap_or(false))
    }

    /// Sets a package's restrictions bundle; an empty bundle clears.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization or persistence fails.
    pub fn set_application_restrictions(
        &self,
        package_name: &str,
        restrictions: Bundle,
    ) -> Result<WriteOutcome, PolicyEngineError> {
        let key = PolicyKey::package(APPLICATION_RESTRICTIONS_POLICY, package_name);
        if restrictions.is_empty() {
            return self.clear(&key, self.local()).map(WriteOutcome::Cleared);
        }
        self.set(&key, self.local(), restrictions).map(WriteOutcome::Set)
    }

    /// Returns this admin's own restrictions bundle for a package.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization fails.
    pub fn application_restrictions(
        &self,
        package_name: &str,
    ) -> Result<Bundle, PolicyEngineError> {
        let key = PolicyKey::package(APPLICATION_RESTRICTIONS_POLICY, package_name);
        Ok(self.own(&key, self.local())?.unwrap_or_default())
    }

    // ------------------------------------------------------------------------
    // User Restrictions
    // ------------------------------------------------------------------------

    /// Adds a user restriction for the admin's user.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization or persistence fails.
    pub fn add_user_restriction(&self, restriction: &str) -> Result<SetResult, PolicyEngineError> {
        self.set(&PolicyKey::user_restriction(restriction), self.local(), true)
    }

    /// Adds a user restriction device-wide.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization or persistence fails.
    pub fn add_user_restriction_globally(
        &self,
        restriction: &str,
    ) -> Result<SetResult, PolicyEngineError> {
        self.set(&PolicyKey::user_restriction(restriction), UserId::ALL, true)
    }

    /// Clears this admin's local user restriction.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization or persistence fails.
    pub fn clear_user_restriction(
        &self,
        restriction: &str,
    ) -> Result<ClearResult, PolicyEngineError> {
        self.clear(&PolicyKey::user_restriction(restriction), self.local())
    }

    /// Clears this admin's global user restriction.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization or persistence fails.
    pub fn clear_user_restriction_globally(
        &self,
        restriction: &str,
    ) -> Result<ClearResult, PolicyEngineError> {
        self.clear(&PolicyKey::user_restriction(restriction), UserId::ALL)
    }

    /// Returns whether a restriction applies to the admin's user, locally or
    /// globally.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization fails.
    pub fn has_user_restriction(&self, restriction: &str) -> Result<bool, PolicyEngineError> {
        let key = PolicyKey::user_restriction(restriction);
        let local = self.resolved::<bool>(&key, self.local())?.unwrap_or(false);
        let global = self.resolved::<bool>(&key, UserId::ALL)?.unwrap_or(false);
        Ok(local || global)
    }

    // ------------------------------------------------------------------------
    // Keyguard and Screen
    // ------------------------------------------------------------------------

    /// Sets disabled keyguard features; zero clears.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError::InvalidValue`] for negative flags.
    pub fn set_keyguard_disabled_features(
        &self,
        flags: i32,
    ) -> Result<WriteOutcome, PolicyEngineError> {
        let key = PolicyKey::no_args(KEYGUARD_DISABLED_FEATURES_POLICY);
        if flags == KEYGUARD_DISABLE_FEATURES_NONE {
            return self.clear(&key, self.local()).map(WriteOutcome::Cleared);
        }
        self.set(&key, self.local(), flags).map(WriteOutcome::Set)
    }

    /// Returns the union of disabled keyguard features.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization fails.
    pub fn keyguard_disabled_features(&self) -> Result<i32, PolicyEngineError> {
        Ok(self
            .resolved(&PolicyKey::no_args(KEYGUARD_DISABLED_FEATURES_POLICY), self.local())?
            .unwrap_or(KEYGUARD_DISABLE_FEATURES_NONE))
    }

    /// Sets whether screen capture is disabled.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization or persistence fails.
    pub fn set_screen_capture_disabled(
        &self,
        disabled: bool,
    ) -> Result<SetResult, PolicyEngineError> {
        self.set(&PolicyKey::no_args(SCREEN_CAPTURE_DISABLED_POLICY), self.local(), disabled)
    }

    /// Returns whether screen capture is disabled for the admin's user.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization fails.
    pub fn screen_capture_disabled(&self) -> Result<bool, PolicyEngineError> {
        let key = PolicyKey::no_args(SCREEN_CAPTURE_DISABLED_POLICY);
        let local = self.resolved::<bool>(&key, self.local())?.unwrap_or(false);
        let global = self.resolved::<bool>(&key, UserId::ALL)?.unwrap_or(false);
        Ok(local || global)
    }

    // ------------------------------------------------------------------------
    // Most Recent Policies
    // ------------------------------------------------------------------------

    /// Sets whether personal apps are suspended.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization or persistence fails.
    pub fn set_personal_apps_suspended(
        &self,
        suspended: bool,
    ) -> Result<SetResult, PolicyEngineError> {
        self.set(&PolicyKey::no_args(PERSONAL_APPS_SUSPENDED_POLICY), self.local(), suspended)
    }

    /// Returns whether personal apps are suspended.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization fails.
    pub fn personal_apps_suspended(&self) -> Result<bool, PolicyEngineError> {
        Ok(self
            .resolved(&PolicyKey::no_args(PERSONAL_APPS_SUSPENDED_POLICY), self.local())?
            .unwrap_or(false))
    }

    /// Sets the permitted input methods; `None` clears.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization or persistence fails.
    pub fn set_permitted_input_methods(
        &self,
        packages: Option<BTreeSet<String>>,
    ) -> Result<WriteOutcome, PolicyEngineError> {
        let key = PolicyKey::no_args(PERMITTED_INPUT_METHODS_POLICY);
        match packages {
            Some(packages) => self.set(&key, self.local(), packages).map(WriteOutcome::Set),
            None => self.clear(&key, self.local()).map(WriteOutcome::Cleared),
        }
    }

    /// Returns the permitted input methods; `None` means all are permitted.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization fails.
    pub fn permitted_input_methods(&self) -> Result<Option<BTreeSet<String>>, PolicyEngineError> {
        self.resolved(&PolicyKey::no_args(PERMITTED_INPUT_METHODS_POLICY), self.local())
    }

    // ------------------------------------------------------------------------
    // Account Management
    // ------------------------------------------------------------------------

    /// Sets whether account management is disabled for an account type.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization or persistence fails.
    pub fn set_account_management_disabled(
        &self,
        account_type: &str,
        disabled: bool,
    ) -> Result<SetResult, PolicyEngineError> {
        let key = PolicyKey::account_type(ACCOUNT_MANAGEMENT_DISABLED_POLICY, account_type);
        self.set(&key, self.local(), disabled)
    }

    /// Returns whether account management is disabled for an account type.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization fails.
    pub fn account_management_disabled(
        &self,
        account_type: &str,
    ) -> Result<bool, PolicyEngineError> {
        let key = PolicyKey::account_type(ACCOUNT_MANAGEMENT_DISABLED_POLICY, account_type);
        Ok(self.resolved(&key, self.local())?.unwrap_or(false))
    }

    // ------------------------------------------------------------------------
    // Preferred Activities
    // ------------------------------------------------------------------------

    /// Sets the preferred activity for an intent filter.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization or persistence fails.
    pub fn add_persistent_preferred_activity(
        &self,
        filter: IntentFilter,
        activity: ComponentName,
    ) -> Result<SetResult, PolicyEngineError> {
        let key = PolicyKey::intent_filter(PERSISTENT_PREFERRED_ACTIVITY_POLICY, filter);
        self.set(&key, self.local(), activity)
    }

    /// Clears this admin's preferred activity for an intent filter.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization or persistence fails.
    pub fn clear_persistent_preferred_activity(
        &self,
        filter: IntentFilter,
    ) -> Result<ClearResult, PolicyEngineError> {
        let key = PolicyKey::intent_filter(PERSISTENT_PREFERRED_ACTIVITY_POLICY, filter);
        self.clear(&key, self.local())
    }

    /// Returns the resolved preferred activity for an intent filter.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization fails.
    pub fn persistent_preferred_activity(
        &self,
        filter: IntentFilter,
    ) -> Result<Option<ComponentName>, PolicyEngineError> {
        let key = PolicyKey::intent_filter(PERSISTENT_PREFERRED_ACTIVITY_POLICY, filter);
        self.resolved(&key, self.local())
    }

    // ------------------------------------------------------------------------
    // Reset Password Token
    // ------------------------------------------------------------------------

    /// Records this admin's reset-password token handle.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization or persistence fails.
    pub fn set_reset_password_token(&self, token: i64) -> Result<SetResult, PolicyEngineError> {
        self.set(&PolicyKey::no_args(RESET_PASSWORD_TOKEN_POLICY), self.local(), token)
    }

    /// Returns this admin's own reset-password token handle.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization fails.
    pub fn reset_password_token(&self) -> Result<Option<i64>, PolicyEngineError> {
        self.own(&PolicyKey::no_args(RESET_PASSWORD_TOKEN_POLICY), self.local())
    }

    /// Clears this admin's reset-password token handle.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyEngineError`] when authorization or persistence fails.
    pub fn clear_reset_password_token(&self) -> Result<ClearResult, PolicyEngineError> {
        self.clear(&PolicyKey::no_args(RESET_PASSWORD_TOKEN_POLICY), self.local())
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Fails with `NotPermitted` unless the authorizer permits the access.
    fn authorize(&self, key: &PolicyKey, access: PolicyAccess) -> Result<(), PolicyEngineError> {
        let verb = match access {
            PolicyAccess::Read => "read",
            PolicyAccess::Write => "write",
        };
        match self.authorizer.authorize(&self.admin, key, access) {
            Ok(AuthorizationDecision::Permit) => Ok(()),
            Ok(AuthorizationDecision::Deny) => Err(PolicyEngineError::NotPermitted(format!(
                "{} may not {verb} {}",
                self.admin.package_name,
                key.identifier()
            ))),
            Err(err) => Err(PolicyEngineError::NotPermitted(err.to_string())),
        }
    }

    /// Authorizes and sets a typed value.
    fn set<T: PolicyValueType>(
        &self,
        key: &PolicyKey,
        user: UserId,
        value: T,
    ) -> Result<SetResult, PolicyEngineError> {
        self.authorize(key, PolicyAccess::Write)?;
        self.engine.set_policy(key, user, &self.admin, value.into_policy_value())
    }

    /// Authorizes and clears this admin's value.
    fn clear(&self, key: &PolicyKey, user: UserId) -> Result<ClearResult, PolicyEngineError> {
        self.authorize(key, PolicyAccess::Write)?;
        self.engine.clear_policy(key, user, &self.admin)
    }

    /// Authorizes and reads the resolved value.
    fn resolved<T: PolicyValueType>(
        &self,
        key: &PolicyKey,
        user: UserId,
    ) -> Result<Option<T>, PolicyEngineError> {
        self.authorize(key, PolicyAccess::Read)?;
        self.engine.resolved_policy::<T>(key, user)
    }

    /// Authorizes and reads this admin's own value.
    fn own<T: PolicyValueType>(
        &self,
        key: &PolicyKey,
        user: UserId,
    ) -> Result<Option<T>, PolicyEngineError> {
        self.authorize(key, PolicyAccess::Read)?;
        Ok(self
            .engine
            .policy_state::<T>(key, user)?
            .and_then(|mut state| state.values_by_admin.remove(&self.admin)))
    }
}

// device-policy-core/src/core/catalog.rs
// ============================================================================
// Module: Policy Catalog
// Description: Declared kinds, mechanisms, scopes, and key shapes per policy.
// Purpose: Validate keys and values before they reach a policy state.
// Dependencies: crate::core::{identifiers, key, resolution, value}, thiserror
// ============================================================================

//! ## Overview
//! The catalog maps policy identifiers to a [`PolicyDefinition`]. Lookups fail
//! closed: unknown identifiers, mismatched qualifiers, and out-of-scope users
//! are rejected with a [`CatalogError`]. User-restriction definitions are
//! synthesized for any key built with [`PolicyKey::user_restriction`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::identifiers::Authority;
use crate::core::identifiers::FINANCED_DEVICE_CONTROLLER_ROLE;
use crate::core::identifiers::UserId;
use crate::core::key::KeyShape;
use crate::core::key::PolicyKey;
use crate::core::resolution::ResolutionMechanism;
use crate::core::value::PolicyValue;
use crate::core::value::ValueKind;

// ============================================================================
// SECTION: Policy Identifiers
// ============================================================================

/// Device-wide automatic time zone.
pub const AUTO_TIMEZONE_POLICY: &str = "autoTimezone";
/// Runtime permission grant state per package and permission.
pub const PERMISSION_GRANT_POLICY: &str = "permissionGrant";
/// Lock-task packages and features.
pub const LOCK_TASK_POLICY: &str = "lockTask";
/// Packages whose user control is disabled.
pub const USER_CONTROL_DISABLED_PACKAGES_POLICY: &str = "userControlDisabledPackages";
/// Uninstall blocking per package.
pub const PACKAGE_UNINSTALL_BLOCKED_POLICY: &str = "packageUninstallBlocked";
/// Preferred activity per intent filter.
pub const PERSISTENT_PREFERRED_ACTIVITY_POLICY: &str = "persistentPreferredActivity";
/// Application restrictions bundle per package.
pub const APPLICATION_RESTRICTIONS_POLICY: &str = "applicationRestrictions";
/// Reset-password token handle.
pub const RESET_PASSWORD_TOKEN_POLICY: &str = "resetPasswordToken";
/// Account management disabled per account type.
pub const ACCOUNT_MANAGEMENT_DISABLED_POLICY: &str = "accountManagementDisabled";
/// Application hidden per package.
pub const APPLICATION_HIDDEN_POLICY: &str = "applicationHidden";
/// Keyguard features disabled.
pub const KEYGUARD_DISABLED_FEATURES_POLICY: &str = "keyguardDisabledFeatures";
/// Personal apps suspended.
pub const PERSONAL_APPS_SUSPENDED_POLICY: &str = "personalAppsSuspended";
/// Screen capture disabled.
pub const SCREEN_CAPTURE_DISABLED_POLICY: &str = "screenCaptureDisabled";
/// Permitted input methods.
pub const PERMITTED_INPUT_METHODS_POLICY: &str = "permittedInputMethods";

// ============================================================================
// SECTION: Value Constants
// ============================================================================

/// Permission grant state left to the user.
pub const PERMISSION_GRANT_STATE_DEFAULT: i32 = 0;
/// Permission granted by policy.
pub const PERMISSION_GRANT_STATE_GRANTED: i32 = 1;
/// Permission denied by policy.
pub const PERMISSION_GRANT_STATE_DENIED: i32 = 2;

/// No keyguard features disabled.
pub const KEYGUARD_DISABLE_FEATURES_NONE: i32 = 0;
/// All keyguard widgets disabled.
pub const KEYGUARD_DISABLE_WIDGETS_ALL: i32 = 1;
/// Secure keyguard camera disabled.
pub const KEYGUARD_DISABLE_SECURE_CAMERA: i32 = 1 << 1;
/// Notifications on secure keyguard disabled.
pub const KEYGUARD_DISABLE_SECURE_NOTIFICATIONS: i32 = 1 << 2;
/// Unredacted notifications on keyguard disabled.
pub const KEYGUARD_DISABLE_UNREDACTED_NOTIFICATIONS: i32 = 1 << 3;
/// Trust agents ignored on secure keyguard.
pub const KEYGUARD_DISABLE_TRUST_AGENTS: i32 = 1 << 4;
/// Fingerprint unlock disabled.
pub const KEYGUARD_DISABLE_FINGERPRINT: i32 = 1 << 5;

// ============================================================================
// SECTION: Definitions
// ============================================================================

/// Users a policy may be set for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyScope {
    /// Per-user buckets only.
    Local,
    /// The global bucket only.
    Global,
    /// Either bucket, resolved independently.
    LocalOrGlobal,
}

impl PolicyScope {
    /// Returns true when the scope permits the user bucket.
    #[must_use]
    pub const fn permits(self, user: UserId) -> bool {
        match self {
            Self::Local => !user.is_all(),
            Self::Global => user.is_all(),
            Self::LocalOrGlobal => true,
        }
    }
}

/// Extra value rules beyond kind and mechanism checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueConstraint {
    /// No extra rules.
    None,
    /// Lock-task feature flags must be valid.
    LockTaskFeatures,
    /// Bitmask must be non-negative.
    NonNegativeFlags,
}

/// Declaration of one policy identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDefinition {
    /// Policy identifier.
    pub identifier: String,
    /// Required qualifier shape.
    pub shape: KeyShape,
    /// Declared value kind.
    pub value_kind: ValueKind,
    /// Resolution mechanism.
    pub mechanism: ResolutionMechanism,
    /// Allowed user buckets.
    pub scope: PolicyScope,
    /// Extra value rules.
    pub constraint: ValueConstraint,
}

impl PolicyDefinition {
    /// Creates a definition without extra value rules.
    #[must_use]
    pub fn new(
        identifier: impl Into<String>,
        shape: KeyShape,
        value_kind: ValueKind,
        mechanism: ResolutionMechanism,
        scope: PolicyScope,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            shape,
            value_kind,
            mechanism,
            scope,
            constraint: ValueConstraint::None,
        }
    }

    /// Attaches an extra value rule.
    #[must_use]
    pub const fn with_constraint(mut self, constraint: ValueConstraint) -> Self {
        self.constraint = constraint;
        self
    }

    /// Validates a value against kind, mechanism, and extra rules.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidValue`] or [`CatalogError::KindMismatch`].
    pub fn validate_value(&self, value: &PolicyValue) -> Result<(), CatalogError> {
        if value.kind() != self.value_kind {
            return Err(CatalogError::KindMismatch {
                identifier: self.identifier.clone(),
                expected: self.value_kind,
                actual: value.kind(),
            });
        }
        if !self.mechanism.permits(value) {
            return Err(CatalogError::InvalidValue(format!(
                "{} does not accept value under {}",
                self.identifier,
                self.mechanism.label()
            )));
        }
        match (self.constraint, value) {
            (ValueConstraint::LockTaskFeatures, PolicyValue::LockTask(policy)) => policy
                .validate_flags()
                .map_err(|err| CatalogError::InvalidValue(format!("{}: {err}", self.identifier))),
            (ValueConstraint::NonNegativeFlags, PolicyValue::Integer(bits)) if *bits < 0 => Err(
                CatalogError::InvalidValue(format!("{}: negative flags {bits}", self.identifier)),
            ),
            _ => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Catalog lookup and registration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// No declaration exists for the identifier.
    #[error("policy catalog unknown policy: {0}")]
    UnknownPolicy(String),
    /// The key qualifier does not match the declared shape.
    #[error("policy catalog invalid key: {0}")]
    InvalidKey(String),
    /// The user bucket is outside the declared scope.
    #[error("policy catalog scope mismatch: {0}")]
    ScopeMismatch(String),
    /// The value is not acceptable for the policy.
    #[error("policy catalog invalid value: {0}")]
    InvalidValue(String),
    /// The value kind differs from the declared kind.
    #[error("policy catalog kind mismatch for {identifier}: expected {expected}, found {actual}")]
    KindMismatch {
        /// Policy identifier.
        identifier: String,
        /// Declared kind.
        expected: ValueKind,
        /// Supplied kind.
        actual: ValueKind,
    },
    /// The definition cannot be registered.
    #[error("policy catalog invalid definition: {0}")]
    InvalidDefinition(String),
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Registry of policy declarations.
#[derive(Debug, Clone, Default)]
pub struct PolicyCatalog {
    /// Declarations keyed by identifier.
    definitions: BTreeMap<String, PolicyDefinition>,
}

impl PolicyCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates the catalog of built-in policies.
    #[must_use]
    pub fn builtin() -> Self {
        let mut definitions = BTreeMap::new();
        for definition in builtin_definitions() {
            definitions.insert(definition.identifier.clone(), definition);
        }
        Self {
            definitions,
        }
    }

    /// Registers a declaration, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidDefinition`] when the mechanism cannot
    /// operate on the declared kind or is malformed.
    pub fn register(&mut self, definition: PolicyDefinition) -> Result<(), CatalogError> {
        if definition.identifier.trim().is_empty() {
            return Err(CatalogError::InvalidDefinition("empty policy identifier".to_string()));
        }
        definition.mechanism.validate().map_err(|err| {
            CatalogError::InvalidDefinition(format!("{}: {err}", definition.identifier))
        })?;
        if !definition.mechanism.accepts_kind(definition.value_kind) {
            return Err(CatalogError::InvalidDefinition(format!(
                "{}: {} cannot resolve {} values",
                definition.identifier,
                definition.mechanism.label(),
                definition.value_kind
            )));
        }
        self.definitions.insert(definition.identifier.clone(), definition);
        Ok(())
    }

    /// Returns the declaration for an identifier.
    #[must_use]
    pub fn get(&self, identifier: &str) -> Option<&PolicyDefinition> {
        self.definitions.get(identifier)
    }

    /// Returns every registered declaration.
    pub fn definitions(&self) -> impl Iterator<Item = &PolicyDefinition> {
        self.definitions.values()
    }

    /// Resolves the declaration governing `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownPolicy`] or [`CatalogError::InvalidKey`].
    pub fn definition_for(&self, key: &PolicyKey) -> Result<PolicyDefinition, CatalogError> {
        let definition = if let Some(definition) = self.definitions.get(key.identifier()) {
            definition.clone()
        } else if key.is_user_restriction() {
            user_restriction_definition(key.identifier())
        } else {
            return Err(CatalogError::UnknownPolicy(key.identifier().to_string()));
        };
        if key.qualifier().shape() != definition.shape {
            return Err(CatalogError::InvalidKey(format!(
                "{} requires {} qualifier",
                key.identifier(),
                definition.shape
            )));
        }
        Ok(definition)
    }

    /// Resolves the declaration for `key` and checks the user bucket.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the key is unknown, malformed, or out of scope.
    pub fn lookup(&self, key: &PolicyKey, user: UserId) -> Result<PolicyDefinition, CatalogError> {
        let definition = self.definition_for(key)?;
        if !definition.scope.permits(user) {
            return Err(CatalogError::ScopeMismatch(format!(
                "{} cannot be set for user {user}",
                key.identifier()
            )));
        }
        Ok(definition)
    }
}

// ============================================================================
// SECTION: Built-in Definitions
// ============================================================================

/// Ranking where `true` is more restrictive than `false`.
fn true_more_restrictive() -> ResolutionMechanism {
    ResolutionMechanism::most_restrictive([PolicyValue::Boolean(true), PolicyValue::Boolean(false)])
}

/// Priority where financed-device controllers outrank DPCs.
fn role_then_dpc() -> ResolutionMechanism {
    ResolutionMechanism::top_priority([
        Authority::role([FINANCED_DEVICE_CONTROLLER_ROLE]),
        Authority::Dpc,
    ])
}

/// Synthesized declaration for a user restriction.
fn user_restriction_definition(identifier: &str) -> PolicyDefinition {
    PolicyDefinition::new(
        identifier,
        KeyShape::UserRestriction,
        ValueKind::Boolean,
        true_more_restrictive(),
        PolicyScope::LocalOrGlobal,
    )
}

/// Returns the built-in policy declarations.
fn builtin_definitions() -> Vec<PolicyDefinition> {
    vec![
        PolicyDefinition::new(
            AUTO_TIMEZONE_POLICY,
            KeyShape::None,
            ValueKind::Boolean,
            true_more_restrictive(),
            PolicyScope::Global,
        ),
        PolicyDefinition::new(
            PERMISSION_GRANT_POLICY,
            KeyShape::PackagePermission,
            ValueKind::Integer,
            ResolutionMechanism::most_restrictive([
                PolicyValue::Integer(PERMISSION_GRANT_STATE_DENIED),
                PolicyValue::Integer(PERMISSION_GRANT_STATE_GRANTED),
                PolicyValue::Integer(PERMISSION_GRANT_STATE_DEFAULT),
            ]),
            PolicyScope::Local,
        ),
        PolicyDefinition::new(
            LOCK_TASK_POLICY,
            KeyShape::None,
            ValueKind::LockTask,
            role_then_dpc(),
            PolicyScope::Local,
        )
        .with_constraint(ValueConstraint::LockTaskFeatures),
        PolicyDefinition::new(
            USER_CONTROL_DISABLED_PACKAGES_POLICY,
            KeyShape::None,
            ValueKind::StringSet,
            ResolutionMechanism::StringSetUnion,
            PolicyScope::Global,
        ),
        PolicyDefinition::new(
            PACKAGE_UNINSTALL_BLOCKED_POLICY,
            KeyShape::Package,
            ValueKind::Boolean,
            true_more_restrictive(),
            PolicyScope::Local,
        ),
        PolicyDefinition::new(
            PERSISTENT_PREFERRED_ACTIVITY_POLICY,
            KeyShape::IntentFilter,
            ValueKind::Component,
            role_then_dpc(),
            PolicyScope::Local,
        ),
        PolicyDefinition::new(
            APPLICATION_RESTRICTIONS_POLICY,
            KeyShape::Package,
            ValueKind::Bundle,
            ResolutionMechanism::NonCoexistable,
            PolicyScope::Local,
        ),
        PolicyDefinition::new(
            RESET_PASSWORD_TOKEN_POLICY,
            KeyShape::None,
            ValueKind::Long,
            ResolutionMechanism::NonCoexistable,
            PolicyScope::Local,
        ),
        PolicyDefinition::new(
            ACCOUNT_MANAGEMENT_DISABLED_POLICY,
            KeyShape::AccountType,
            ValueKind::Boolean,
            true_more_restrictive(),
            PolicyScope::Local,
        ),
        PolicyDefinition::new(
            APPLICATION_HIDDEN_POLICY,
            KeyShape::Package,
            ValueKind::Boolean,
            true_more_restrictive(),
            PolicyScope::Local,
        ),
        PolicyDefinition::new(
            KEYGUARD_DISABLED_FEATURES_POLICY,
            KeyShape::None,
            ValueKind::Integer,
            ResolutionMechanism::FlagUnion,
            PolicyScope::Local,
        )
        .with_constraint(ValueConstraint::NonNegativeFlags),
        PolicyDefinition::new(
            PERSONAL_APPS_SUSPENDED_POLICY,
            KeyShape::None,
            ValueKind::Boolean,
            ResolutionMechanism::MostRecent,
            PolicyScope::Local,
        ),
        PolicyDefinition::new(
            SCREEN_CAPTURE_DISABLED_POLICY,
            KeyShape::None,
            ValueKind::Boolean,
            true_more_restrictive(),
            PolicyScope::LocalOrGlobal,
        ),
        PolicyDefinition::new(
            PERMITTED_INPUT_METHODS_POLICY,
            KeyShape::None,
            ValueKind::StringSet,
            ResolutionMechanism::MostRecent,
            PolicyScope::Local,
        ),
    ]
}

// device-policy-core/src/core/key.rs
// ============================================================================
// Module: Policy Keys
// Description: Structural identifiers naming what a policy configures.
// Purpose: Provide immutable, ordered policy keys with typed qualifiers.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`PolicyKey`] pairs a policy identifier with a [`Qualifier`] carrying the
//! optional parameters (package, permission, intent filter, account type, or
//! user restriction). Keys are immutable after construction and compare
//! structurally, so they double as map keys inside policy buckets.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Identifier prefix shared by all user-restriction policies.
pub const USER_RESTRICTION_PREFIX: &str = "userRestriction_";

// ============================================================================
// SECTION: Intent Filter
// ============================================================================

/// Intent filter used to qualify preferred-activity policies.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IntentFilter {
    /// Intent actions matched by the filter.
    #[serde(default)]
    pub actions: BTreeSet<String>,
    /// Intent categories matched by the filter.
    #[serde(default)]
    pub categories: BTreeSet<String>,
    /// Data schemes matched by the filter.
    #[serde(default)]
    pub data_schemes: BTreeSet<String>,
}

impl IntentFilter {
    /// Creates a filter matching a single action.
    #[must_use]
    pub fn for_action(action: impl Into<String>) -> Self {
        Self {
            actions: BTreeSet::from([action.into()]),
            ..Self::default()
        }
    }

    /// Adds a category to the filter.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.insert(category.into());
        self
    }

    /// Adds a data scheme to the filter.
    #[must_use]
    pub fn with_data_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.data_schemes.insert(scheme.into());
        self
    }
}

impl fmt::Display for IntentFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        /// Joins a set as a comma separated list.
        fn join(set: &BTreeSet<String>) -> String {
            set.iter().map(String::as_str).collect::<Vec<_>>().join(",")
        }
        write!(
            f,
            "actions=[{}];categories=[{}];schemes=[{}]",
            join(&self.actions),
            join(&self.categories),
            join(&self.data_schemes)
        )
    }
}

// ============================================================================
// SECTION: Qualifier
// ============================================================================

/// Optional parameters narrowing a policy identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Qualifier {
    /// No parameters.
    None,
    /// Policy scoped to one package.
    Package {
        /// Target package name.
        package_name: String,
    },
    /// Policy scoped to one permission of one package.
    PackagePermission {
        /// Target package name.
        package_name: String,
        /// Permission name.
        permission_name: String,
    },
    /// Policy scoped to an intent filter.
    IntentFilter {
        /// Matching intent filter.
        filter: IntentFilter,
    },
    /// Policy scoped to an account type.
    AccountType {
        /// Account type name.
        account_type: String,
    },
    /// Policy naming a user restriction.
    UserRestriction {
        /// Restriction name.
        restriction: String,
    },
}

impl Qualifier {
    /// Returns the shape of this qualifier.
    #[must_use]
    pub const fn shape(&self) -> KeyShape {
        match self {
            Self::None => KeyShape::None,
            Self::Package {
                ..
            } => KeyShape::Package,
            Self::PackagePermission {
                ..
            } => KeyShape::PackagePermission,
            Self::IntentFilter {
                ..
            } => KeyShape::IntentFilter,
            Self::AccountType {
                ..
            } => KeyShape::AccountType,
            Self::UserRestriction {
                ..
            } => KeyShape::UserRestriction,
        }
    }

    /// Returns the package name carried by the qualifier, if any.
    #[must_use]
    pub fn package_name(&self) -> Option<&str> {
        match self {
            Self::Package {
                package_name,
            }
            | Self::PackagePermission {
                package_name,
                ..
            } => Some(package_name),
            _ => None,
        }
    }
}

/// Shape of a qualifier, declared per policy in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyShape {
    /// No parameters.
    None,
    /// Package parameter.
    Package,
    /// Package and permission parameters.
    PackagePermission,
    /// Intent filter parameter.
    IntentFilter,
    /// Account type parameter.
    AccountType,
    /// User restriction parameter.
    UserRestriction,
}

impl KeyShape {
    /// Returns the stable label for the shape.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Package => "package",
            Self::PackagePermission => "package_permission",
            Self::IntentFilter => "intent_filter",
            Self::AccountType => "account_type",
            Self::UserRestriction => "user_restriction",
        }
    }
}

impl fmt::Display for KeyShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Policy Key
// ============================================================================

/// Immutable identifier for what is being configured.
///
/// # Invariants
/// - Equality, hashing, and ordering are structural over identifier and qualifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PolicyKey {
    /// Policy identifier string.
    identifier: String,
    /// Policy parameters.
    qualifier: Qualifier,
}

impl PolicyKey {
    /// Creates a key from an identifier and qualifier.
    #[must_use]
    pub fn new(identifier: impl Into<String>, qualifier: Qualifier) -> Self {
        Self {
            identifier: identifier.into(),
            qualifier,
        }
    }

    /// Creates a key without parameters.
    #[must_use]
    pub fn no_args(identifier: impl Into<String>) -> Self {
        Self::new(identifier, Qualifier::None)
    }

    /// Creates a package-scoped key.
    #[must_use]
    pub fn package(identifier: impl Into<String>, package_name: impl Into<String>) -> Self {
        Self::new(
            identifier,
            Qualifier::Package {
                package_name: package_name.into(),
            },
        )
    }

    /// Creates a key scoped to one permission of a package.
    #[must_use]
    pub fn package_permission(
        identifier: impl Into<String>,
        package_name: impl Into<String>,
        permission_name: impl Into<String>,
    ) -> Self {
        Self::new(
            identifier,
            Qualifier::PackagePermission {
                package_name: package_name.into(),
                permission_name: permission_name.into(),
            },
        )
    }

    /// Creates an intent-filter-scoped key.
    #[must_use]
    pub fn intent_filter(identifier: impl Into<String>, filter: IntentFilter) -> Self {
        Self::new(
            identifier,
            Qualifier::IntentFilter {
                filter,
            },
        )
    }

    /// Creates an account-type-scoped key.
    #[must_use]
    pub fn account_type(identifier: impl Into<String>, account_type: impl Into<String>) -> Self {
        Self::new(
            identifier,
            Qualifier::AccountType {
                account_type: account_type.into(),
            },
        )
    }

    /// Creates the key for a named user restriction.
    #[must_use]
    pub fn user_restriction(restriction: impl Into<String>) -> Self {
        let restriction = restriction.into();
        Self::new(
            format!("{USER_RESTRICTION_PREFIX}{restriction}"),
            Qualifier::UserRestriction {
                restriction,
            },
        )
    }

    /// Returns the policy identifier.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Returns the qualifier.
    #[must_use]
    pub const fn qualifier(&self) -> &Qualifier {
        &self.qualifier
    }

    /// Returns true when the key names a user restriction.
    #[must_use]
    pub fn is_user_restriction(&self) -> bool {
        matches!(self.qualifier, Qualifier::UserRestriction { .. })
            && self.identifier.starts_with(USER_RESTRICTION_PREFIX)
    }
}

impl fmt::Display for PolicyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Qualifier::None
            | Qualifier::UserRestriction {
                ..
            } => f.write_str(&self.identifier),
            Qualifier::Package {
                package_name,
            } => write!(f, "{}[{package_name}]", self.identifier),
            Qualifier::PackagePermission {
                package_name,
                permission_name,
            } => write!(f, "{}[{package_name}:{permission_name}]", self.identifier),
            Qualifier::IntentFilter {
                filter,
            } => write!(f, "{}[{filter}]", self.identifier),
            Qualifier::AccountType {
                account_type,
            } => write!(f, "{}[{account_type}]", self.identifier),
        }
    }
}

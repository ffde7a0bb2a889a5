// device-policy-core/src/core/identifiers.rs
// ============================================================================
// Module: Device Policy Identifiers
// Description: User handles, authorities, and enforcing admin identities.
// Purpose: Provide strongly typed, serializable identities for policy provenance.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines who sets a policy and for which user. An
//! [`EnforcingAdmin`] is the provenance record stored next to every value the
//! engine tracks; equality is structural over package, authority, and user so
//! it can serve as an ordered map key.

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

/// Role granted to financed-device controller apps.
pub const FINANCED_DEVICE_CONTROLLER_ROLE: &str =
    "android.app.role.SYSTEM_FINANCED_DEVICE_CONTROLLER";

/// Role granted to the device policy management role holder.
pub const DEVICE_POLICY_MANAGEMENT_ROLE: &str = "android.app.role.DEVICE_POLICY_MANAGEMENT";

// ============================================================================
// SECTION: User Identifier
// ============================================================================

/// User handle scoping a policy bucket.
///
/// # Invariants
/// - [`UserId::ALL`] is reserved for the device-wide bucket and never names a
///   real user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i32);

impl UserId {
    /// Sentinel for device-wide (global) policies.
    pub const ALL: Self = Self(-1);
    /// The system user.
    pub const SYSTEM: Self = Self(0);

    /// Creates a user identifier from its raw handle.
    #[must_use]
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// Returns the raw user handle.
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }

    /// Returns true when this identifier names the device-wide bucket.
    #[must_use]
    pub const fn is_all(self) -> bool {
        self.0 == Self::ALL.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all() { f.write_str("all") } else { self.0.fmt(f) }
    }
}

impl From<i32> for UserId {
    fn from(value: i32) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Authority
// ============================================================================

/// Kind of authority an admin holds when setting a policy.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Authority {
    /// Classic device-policy-controller app.
    Dpc,
    /// App holding one or more system roles.
    Role {
        /// Role names held by the admin.
        roles: BTreeSet<String>,
    },
    /// App acting through a granted permission.
    Permission,
}

impl Authority {
    /// Builds a role authority from role names.
    #[must_use]
    pub fn role<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Role {
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns a stable label for the authority kind.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Dpc => "dpc",
            Self::Role {
                ..
            } => "role",
            Self::Permission => "permission",
        }
    }

    /// Returns true when `self`, used as a priority entry, covers `other`.
    ///
    /// Role entries cover any role authority sharing at least one role name.
    #[must_use]
    pub fn covers(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Dpc, Self::Dpc) | (Self::Permission, Self::Permission) => true,
            (
                Self::Role {
                    roles: ours,
                },
                Self::Role {
                    roles: theirs,
                },
            ) => ours.intersection(theirs).next().is_some(),
            _ => false,
        }
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Role {
                roles,
            } => {
                let joined: Vec<&str> = roles.iter().map(String::as_str).collect();
                write!(f, "role[{}]", joined.join(","))
            }
            other => f.write_str(other.label()),
        }
    }
}

// ============================================================================
// SECTION: Enforcing Admin
// ============================================================================

/// Identity of an authority that set a policy value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EnforcingAdmin {
    /// Package name of the admin app.
    pub package_name: String,
    /// Authority the admin acted under.
    pub authority: Authority,
    /// User the admin runs as.
    pub user: UserId,
}

impl EnforcingAdmin {
    /// Creates a new enforcing admin identity.
    #[must_use]
    pub fn new(package_name: impl Into<String>, authority: Authority, user: UserId) -> Self {
        Self {
            package_name: package_name.into(),
            authority,
            user,
        }
    }

    /// Creates a DPC admin identity.
    #[must_use]
    pub fn dpc(package_name: impl Into<String>, user: UserId) -> Self {
        Self::new(package_name, Authority::Dpc, user)
    }

    /// Creates a role-holder admin identity.
    #[must_use]
    pub fn role_holder<I, S>(package_name: impl Into<String>, roles: I, user: UserId) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(package_name, Authority::role(roles), user)
    }
}

impl fmt::Display for EnforcingAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} ({})", self.package_name, self.user, self.authority)
    }
}

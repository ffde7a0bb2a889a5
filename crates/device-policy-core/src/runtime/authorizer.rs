// device-policy-core/src/runtime/authorizer.rs
// ============================================================================
// Module: Built-in Admin Authorizers
// Description: Permit-all and allow-list implementations of AdminAuthorizer.
// Purpose: Provide simple authorization layers for tests and fixed deployments.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! [`PermitAllAuthorizer`] allows everything. [`StaticAuthorizer`] allows an
//! admin package to touch only the policy identifiers it was granted and
//! denies everything else.

use std::collections::BTreeSet;

use crate::core::EnforcingAdmin;
use crate::core::PolicyKey;
use crate::interfaces::AdminAuthorizer;
use crate::interfaces::AuthorizationDecision;
use crate::interfaces::AuthorizationError;
use crate::interfaces::PolicyAccess;

/// Authorizer that permits every access.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermitAllAuthorizer;

impl AdminAuthorizer for PermitAllAuthorizer {
    fn authorize(
        &self,
        _admin: &EnforcingAdmin,
        _key: &PolicyKey,
        _access: PolicyAccess,
    ) -> Result<AuthorizationDecision, AuthorizationError> {
        Ok(AuthorizationDecision::Permit)
    }
}

/// Allow-list of `(package, policy identifier)` grants.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthorizer {
    /// Granted pairs.
    grants: BTreeSet<(String, String)>,
    /// Whether reads are allowed without a grant.
    open_reads: bool,
}

impl StaticAuthorizer {
    /// Creates an empty allow-list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `package_name` access to `identifier`.
    #[must_use]
    pub fn allow(mut self, package_name: impl Into<String>, identifier: impl Into<String>) -> Self {
        self.grants.insert((package_name.into(), identifier.into()));
        self
    }

    /// Allows reads of any policy without a grant.
    #[must_use]
    pub const fn with_open_reads(mut self) -> Self {
        self.open_reads = true;
        self
    }
}

impl AdminAuthorizer for StaticAuthorizer {
    fn authorize(
        &self,
        admin: &EnforcingAdmin,
        key: &PolicyKey,
        access: PolicyAccess,
    ) -> Result<AuthorizationDecision, AuthorizationError> {
        if access == PolicyAccess::Read && self.open_reads {
            return Ok(AuthorizationDecision::Permit);
        }
        let granted = self
            .grants
            .iter()
            .any(|(package, identifier)| {
                package == &admin.package_name && identifier == key.identifier()
            });
        Ok(if granted { AuthorizationDecision::Permit } else { AuthorizationDecision::Deny })
    }
}

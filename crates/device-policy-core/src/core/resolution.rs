// device-policy-core/src/core/resolution.rs
// ============================================================================
// Module: Resolution Mechanisms
// Description: Strategies collapsing competing admin values into one value.
// Purpose: Provide pure, deterministic resolution over per-admin values.
// Dependencies: crate::core::{identifiers, state, value}, serde
// ============================================================================

//! ## Overview
//! A [`ResolutionMechanism`] is a closed set of strategies. Each variant is a
//! pure function of the admin value map: the same map always yields the same
//! resolved value regardless of insertion order. Every ordering decision falls
//! back to [`EnforcingAdmin`] ordering, so no outcome depends on map history.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::Authority;
use crate::core::identifiers::EnforcingAdmin;
use crate::core::state::AdminPolicy;
use crate::core::value::PolicyValue;
use crate::core::value::ValueKind;

// ============================================================================
// SECTION: Resolution Mechanism
// ============================================================================

/// Strategy used to resolve a policy from competing admin values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolutionMechanism {
    /// Picks the most restrictive value present.
    MostRestrictive {
        /// Accepted values ordered from most to least restrictive.
        most_to_least_restrictive: Vec<PolicyValue>,
    },
    /// Picks the value of the highest-priority admin.
    TopPriority {
        /// Authorities ordered from highest to lowest priority.
        highest_to_lowest_priority: Vec<Authority>,
    },
    /// Bitwise OR of integer values.
    FlagUnion,
    /// Union of string sets.
    StringSetUnion,
    /// Value with the latest logical timestamp.
    MostRecent,
    /// Never resolves; only per-admin values are tracked.
    NonCoexistable,
}

impl ResolutionMechanism {
    /// Builds a most-restrictive mechanism from an ordered ranking.
    #[must_use]
    pub fn most_restrictive<I>(ranking: I) -> Self
    where
        I: IntoIterator<Item = PolicyValue>,
    {
        Self::MostRestrictive {
            most_to_least_restrictive: ranking.into_iter().collect(),
        }
    }

    /// Builds a top-priority mechanism from an ordered authority list.
    #[must_use]
    pub fn top_priority<I>(priority: I) -> Self
    where
        I: IntoIterator<Item = Authority>,
    {
        Self::TopPriority {
            highest_to_lowest_priority: priority.into_iter().collect(),
        }
    }

    /// Returns the stable label for the mechanism.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::MostRestrictive {
                ..
            } => "most_restrictive",
            Self::TopPriority {
                ..
            } => "top_priority",
            Self::FlagUnion => "flag_union",
            Self::StringSetUnion => "string_set_union",
            Self::MostRecent => "most_recent",
            Self::NonCoexistable => "non_coexistable",
        }
    }

    /// Returns true when the mechanism can operate on values of `kind`.
    #[must_use]
    pub fn accepts_kind(&self, kind: ValueKind) -> bool {
        match self {
            Self::MostRestrictive {
                most_to_least_restrictive,
            } => most_to_least_restrictive.iter().all(|value| value.kind() == kind),
            Self::FlagUnion => kind == ValueKind::Integer,
            Self::StringSetUnion => kind == ValueKind::StringSet,
            Self::TopPriority {
                ..
            }
            | Self::MostRecent
            | Self::NonCoexistable => true,
        }
    }

    /// Checks that the mechanism definition itself is well formed.
    ///
    /// # Errors
    ///
    /// Returns a description of the first structural problem found.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::MostRestrictive {
                most_to_least_restrictive,
            } => {
                if most_to_least_restrictive.is_empty() {
                    return Err("most restrictive ranking is empty".to_string());
                }
                for (index, value) in most_to_least_restrictive.iter().enumerate() {
                    if most_to_least_restrictive[.. index].contains(value) {
                        return Err("most restrictive ranking has duplicate values".to_string());
                    }
                }
                Ok(())
            }
            Self::TopPriority {
                highest_to_lowest_priority,
            } => {
                if highest_to_lowest_priority.is_empty() {
                    return Err("top priority list is empty".to_string());
                }
                Ok(())
            }
            Self::FlagUnion | Self::StringSetUnion | Self::MostRecent | Self::NonCoexistable => {
                Ok(())
            }
        }
    }

    /// Returns true when `value` is representable under this mechanism.
    #[must_use]
    pub fn permits(&self, value: &PolicyValue) -> bool {
        match self {
            Self::MostRestrictive {
                most_to_least_restrictive,
            } => most_to_least_restrictive.contains(value),
            Self::FlagUnion => matches!(value, PolicyValue::Integer(_)),
            Self::StringSetUnion => matches!(value, PolicyValue::StringSet(_)),
            Self::TopPriority {
                ..
            }
            | Self::MostRecent
            | Self::NonCoexistable => true,
        }
    }

    /// Resolves the admin value map into one value.
    ///
    /// Values the mechanism does not permit are skipped; callers validate
    /// values before recording them.
    #[must_use]
    pub fn resolve(&self, values: &BTreeMap<EnforcingAdmin, AdminPolicy>) -> Option<PolicyValue> {
        match self {
            Self::MostRestrictive {
                most_to_least_restrictive,
            } => values
                .values()
                .filter_map(|entry| {
                    most_to_least_restrictive.iter().position(|ranked| ranked == &entry.value)
                })
                .min()
                .and_then(|index| most_to_least_restrictive.get(index).cloned()),
            Self::TopPriority {
                ..
            } => self.ranked_admins(values).first().map(|(_, entry)| entry.value.clone()),
            Self::FlagUnion => {
                let mut flags = None;
                for entry in values.values() {
                    if let PolicyValue::Integer(bits) = entry.value {
                        flags = Some(flags.unwrap_or(0) | bits);
                    }
                }
                flags.map(PolicyValue::Integer)
            }
            Self::StringSetUnion => {
                let mut union: Option<BTreeSet<String>> = None;
                for entry in values.values() {
                    if let PolicyValue::StringSet(set) = &entry.value {
                        union.get_or_insert_with(BTreeSet::new).extend(set.iter().cloned());
                    }
                }
                union.map(PolicyValue::StringSet)
            }
            Self::MostRecent => values
                .iter()
                .max_by(|(left_admin, left), (right_admin, right)| {
                    left.set_at.cmp(&right.set_at).then_with(|| left_admin.cmp(right_admin))
                })
                .map(|(_, entry)| entry.value.clone()),
            Self::NonCoexistable => None,
        }
    }

    /// Returns true when `admin`'s value is part of the resolved outcome.
    #[must_use]
    pub fn is_enforced_for(
        &self,
        admin: &EnforcingAdmin,
        values: &BTreeMap<EnforcingAdmin, AdminPolicy>,
        resolved: Option<&PolicyValue>,
    ) -> bool {
        let Some(entry) = values.get(admin) else {
            return false;
        };
        match self {
            Self::FlagUnion | Self::StringSetUnion | Self::NonCoexistable => true,
            Self::MostRestrictive {
                ..
            }
            | Self::TopPriority {
                ..
            }
            | Self::MostRecent => resolved == Some(&entry.value),
        }
    }

    /// Returns the priority rank of an authority; lower ranks win.
    ///
    /// Role authorities not named in the list rank with the first role entry.
    /// Anything else unlisted ranks after every listed entry.
    #[must_use]
    pub fn priority_rank(&self, authority: &Authority) -> usize {
        let Self::TopPriority {
            highest_to_lowest_priority,
        } = self
        else {
            return 0;
        };
        if let Some(index) =
            highest_to_lowest_priority.iter().position(|entry| entry.covers(authority))
        {
            return index;
        }
        if matches!(authority, Authority::Role { .. })
            && let Some(index) = highest_to_lowest_priority
                .iter()
                .position(|entry| matches!(entry, Authority::Role { .. }))
        {
            return index;
        }
        highest_to_lowest_priority.len()
    }

    /// Returns admins ordered by priority, highest first.
    ///
    /// Equal ranks are ordered by admin identity.
    #[must_use]
    pub fn ranked_admins<'a>(
        &self,
        values: &'a BTreeMap<EnforcingAdmin, AdminPolicy>,
    ) -> Vec<(&'a EnforcingAdmin, &'a AdminPolicy)> {
        let mut ranked: Vec<(usize, &EnforcingAdmin, &AdminPolicy)> = values
            .iter()
            .map(|(admin, entry)| (self.priority_rank(&admin.authority), admin, entry))
            .collect();
        ranked.sort_by(|left, right| left.0.cmp(&right.0).then_with(|| left.1.cmp(right.1)));
        ranked.into_iter().map(|(_, admin, entry)| (admin, entry)).collect()
    }

    /// Returns true for the top-priority variant.
    #[must_use]
    pub const fn is_top_priority(&self) -> bool {
        matches!(self, Self::TopPriority { .. })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

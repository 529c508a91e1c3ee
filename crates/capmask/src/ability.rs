//! Ability decoding and compilation.
//!
//! Request-time path, in two steps:
//!
//! 1. [`AbilityDecoder`] turns a token's sparse map back into
//!    `{subject, actions}` grants. Subject indices the catalog can no longer
//!    resolve are skipped silently: a token may outlive the catalog that
//!    issued it, and decoding must tolerate that where encoding never does.
//! 2. [`CompiledAbility::compile`] flattens the grants into an
//!    `action → subjects` index answering `can(action, subject)`.
//!
//! A compiled ability belongs to one request. Build it, query it, drop it.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::PermissionCatalog;
use crate::codec;
use crate::compactor::SubjectPermissionMap;

/// Wildcard subject: a grant on it applies to every subject.
pub const ALL_SUBJECTS: &str = "all";

/// A decoded grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ability {
    pub subject: String,
    pub actions: Vec<String>,
}

impl Ability {
    pub fn new<A: Into<String>>(
        subject: impl Into<String>,
        actions: impl IntoIterator<Item = A>,
    ) -> Self {
        Self {
            subject: subject.into(),
            actions: actions.into_iter().map(Into::into).collect(),
        }
    }
}

// ============================================================================
// Decoder
// ============================================================================

/// Expands a [`SubjectPermissionMap`] into [`Ability`] grants.
pub struct AbilityDecoder<'a> {
    catalog: &'a PermissionCatalog,
}

impl<'a> AbilityDecoder<'a> {
    pub fn new(catalog: &'a PermissionCatalog) -> Self {
        Self { catalog }
    }

    /// Decodes every resolvable entry with at least one known action.
    pub fn decode(&self, map: &SubjectPermissionMap) -> Vec<Ability> {
        map.iter()
            .filter_map(|(index, mask)| {
                let Some(subject) = self.catalog.subject_at(*index) else {
                    debug!(index = %index, "token references subject index missing from catalog");
                    return None;
                };

                let actions = codec::bitmask_to_actions(self.catalog, *mask);
                (!actions.is_empty()).then(|| Ability::new(subject, actions))
            })
            .collect()
    }
}

// ============================================================================
// Compiled Ability
// ============================================================================

/// Request-scoped `(action, subject)` grant set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledAbility {
    grants: HashMap<String, HashSet<String>>,
}

impl CompiledAbility {
    /// Flattens `abilities` into a grant set.
    pub fn compile(abilities: &[Ability]) -> Self {
        let mut grants: HashMap<String, HashSet<String>> = HashMap::new();
        for ability in abilities {
            for action in &ability.actions {
                grants
                    .entry(action.clone())
                    .or_default()
                    .insert(ability.subject.clone());
            }
        }
        Self { grants }
    }

    /// Returns whether `action` is granted on `subject`, directly or through
    /// the [`ALL_SUBJECTS`] wildcard.
    ///
    /// # Examples
    ///
    /// ```
    /// use capmask::ability::{Ability, CompiledAbility};
    ///
    /// let ability = CompiledAbility::compile(&[
    ///     Ability::new("all", ["READ"]),
    ///     Ability::new("Order", ["UPDATE"]),
    /// ]);
    /// assert!(ability.can("READ", "Invoice"));
    /// assert!(ability.can("UPDATE", "Order"));
    /// assert!(!ability.can("UPDATE", "Invoice"));
    /// ```
    pub fn can(&self, action: &str, subject: &str) -> bool {
        self.grants
            .get(action)
            .is_some_and(|subjects| subjects.contains(subject) || subjects.contains(ALL_SUBJECTS))
    }

    pub fn cannot(&self, action: &str, subject: &str) -> bool {
        !self.can(action, subject)
    }

    /// Every `(action, subject)` pair, in no particular order.
    pub fn grants(&self) -> impl Iterator<Item = (&str, &str)> {
        self.grants.iter().flat_map(|(action, subjects)| {
            subjects
                .iter()
                .map(move |subject| (action.as_str(), subject.as_str()))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}

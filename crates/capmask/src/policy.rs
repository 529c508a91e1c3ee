//! Per-operation access declarations.
//!
//! Which abilities an operation needs is static configuration supplied by
//! the route/handler layer. The guard reads it through a direct table
//! lookup; nothing here inspects handlers at runtime.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One required group: every listed action on `subject`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityRequirement {
    pub subject: String,
    pub actions: Vec<String>,
}

impl AbilityRequirement {
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

/// Access declaration of one operation.
///
/// `abilities` distinguishes "declares nothing" (`None`, the ability check is
/// skipped) from "declares an empty list" (`Some(vec![])`, a misconfiguration
/// the guard rejects when authentication is required).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationPolicy {
    #[serde(default)]
    pub requires_auth: bool,

    #[serde(default)]
    pub abilities: Option<Vec<AbilityRequirement>>,
}

impl OperationPolicy {
    /// No authentication, no ability declaration.
    pub fn public() -> Self {
        Self::default()
    }

    /// Authentication required, no ability declaration yet.
    pub fn authenticated() -> Self {
        Self {
            requires_auth: true,
            abilities: None,
        }
    }

    /// Adds a requirement group.
    ///
    /// # Examples
    ///
    /// ```
    /// use capmask::policy::OperationPolicy;
    ///
    /// let policy = OperationPolicy::authenticated()
    ///     .require("Order", ["READ"])
    ///     .require("Invoice", ["READ", "EXPORT"]);
    /// assert_eq!(policy.requirement_groups(), 2);
    /// ```
    #[must_use]
    pub fn require<A: Into<String>>(
        mut self,
        subject: impl Into<String>,
        actions: impl IntoIterator<Item = A>,
    ) -> Self {
        self.abilities
            .get_or_insert_with(Vec::new)
            .push(AbilityRequirement::new(subject, actions));
        self
    }

    /// Declares an explicit, empty requirement list.
    #[must_use]
    pub fn with_empty_requirements(mut self) -> Self {
        self.abilities = Some(Vec::new());
        self
    }

    /// Number of declared requirement groups (0 when nothing is declared).
    pub fn requirement_groups(&self) -> usize {
        self.abilities.as_ref().map_or(0, Vec::len)
    }
}

/// Operation name → access declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationTable {
    operations: BTreeMap<String, OperationPolicy>,
}

impl OperationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the declaration for `operation`.
    pub fn insert(&mut self, operation: impl Into<String>, policy: OperationPolicy) {
        self.operations.insert(operation.into(), policy);
    }

    #[must_use]
    pub fn with(mut self, operation: impl Into<String>, policy: OperationPolicy) -> Self {
        self.insert(operation, policy);
        self
    }

    pub fn get(&self, operation: &str) -> Option<&OperationPolicy> {
        self.operations.get(operation)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OperationPolicy)> {
        self.operations.iter().map(|(name, policy)| (name.as_str(), policy))
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, OperationPolicy)> for OperationTable {
    fn from_iter<I: IntoIterator<Item = (S, OperationPolicy)>>(iter: I) -> Self {
        Self {
            operations: iter
                .into_iter()
                .map(|(name, policy)| (name.into(), policy))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration_states() {
        assert_eq!(OperationPolicy::public().abilities, None);
        assert!(!OperationPolicy::public().requires_auth);

        let empty = OperationPolicy::authenticated().with_empty_requirements();
        assert_eq!(empty.abilities, Some(Vec::new()));
        assert_eq!(empty.requirement_groups(), 0);
    }

    #[test]
    fn test_policy_deserialization() {
        let policy: OperationPolicy = serde_json::from_str(
            r#"{"requires_auth":true,"abilities":[{"subject":"Order","actions":["READ"]}]}"#,
        )
        .unwrap();
        assert_eq!(
            policy,
            OperationPolicy::authenticated().require("Order", ["READ"])
        );

        let undeclared: OperationPolicy = serde_json::from_str(r#"{"requires_auth":true}"#).unwrap();
        assert_eq!(undeclared.abilities, None);
    }

    #[test]
    fn test_table_lookup() {
        let table: OperationTable = [
            ("orders.list", OperationPolicy::authenticated().require("Order", ["READ"])),
            ("health", OperationPolicy::public()),
        ]
        .into_iter()
        .collect();

        assert_eq!(table.len(), 2);
        assert!(table.get("health").is_some());
        assert!(table.get("orders.delete").is_none());
        assert_eq!(table.get("orders.list").unwrap().requirement_groups(), 1);
    }
}

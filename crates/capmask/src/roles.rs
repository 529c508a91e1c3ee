//! Roles and role bindings.
//!
//! A role owns a list of bindings; each binding grants a (possibly narrower)
//! slice of one permission. The subset invariant
//! `binding.bitmask ⊆ permission.bitmask` is maintained by
//! [`RoleBindingCascade`](crate::cascade::RoleBindingCascade) and nothing else.

use capmask_types::{ActionMask, PermissionId, RoleBindingId, RoleId};
use serde::{Deserialize, Serialize};

use crate::permissions::Permission;

/// A role with its bindings joined to their permissions.
///
/// This is the shape the token compactor consumes at issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,

    /// Privilege level. Lower is more powerful.
    pub level: u32,

    pub bindings: Vec<RoleBinding>,
}

impl Role {
    pub fn new(id: RoleId, level: u32) -> Self {
        Self {
            id,
            level,
            bindings: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_binding(mut self, binding: RoleBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Returns whether this role is strictly more powerful than `other`.
    ///
    /// # Examples
    ///
    /// ```
    /// use capmask::roles::Role;
    /// use capmask_types::RoleId;
    ///
    /// let owner = Role::new(RoleId::new(1), 0);
    /// let clerk = Role::new(RoleId::new(2), 10);
    /// assert!(owner.outranks(&clerk));
    /// assert!(!clerk.outranks(&owner));
    /// assert!(!owner.outranks(&owner));
    /// ```
    pub fn outranks(&self, other: &Role) -> bool {
        self.level < other.level
    }
}

/// A binding joined to the permission it references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBinding {
    pub id: RoleBindingId,
    pub permission: Permission,
    pub bitmask: ActionMask,
}

impl RoleBinding {
    /// Returns whether the subset invariant holds for this binding.
    pub fn within_permission(&self) -> bool {
        self.bitmask.is_subset_of(self.permission.bitmask)
    }
}

/// A binding as stored: references its permission by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingRow {
    pub id: RoleBindingId,
    pub role_id: RoleId,
    pub permission_id: PermissionId,
    pub bitmask: ActionMask,
}

//! Persistence collaborator interfaces.
//!
//! The engine never talks to a database directly. Cascades run against a
//! [`Transaction`] handed out by a [`PermissionStore`]; the store commits if
//! the closure returns `Ok` and rolls everything back otherwise. Nothing in
//! the engine retries a failed transaction.
//!
//! Implementations must serialize concurrent transactions that touch the same
//! permission (row lock on [`Transaction::lock_permission`] or stronger).

use capmask_types::{ActionMask, IdentityId, PermissionId, RoleBindingId, Timestamp};

use crate::error::Result;
use crate::permissions::{Permission, PermissionDraft};
use crate::roles::{BindingRow, Role};

/// Operations available inside one atomic unit of work.
pub trait Transaction {
    /// Next write timestamp. Strictly increasing within a store.
    fn stamp(&mut self) -> Timestamp;

    /// Fetches a permission and locks it for the rest of the transaction.
    ///
    /// Fails with [`Error::PermissionNotFound`](crate::Error::PermissionNotFound).
    fn lock_permission(&mut self, id: PermissionId) -> Result<Permission>;

    /// Fetches and locks the permission for `subject`, if one exists.
    fn permission_by_subject(&mut self, subject: &str) -> Result<Option<Permission>>;

    fn insert_permission(&mut self, draft: &PermissionDraft) -> Result<PermissionId>;

    /// Writes every field of `permission` and restamps `updated_at`.
    fn save_permission(&mut self, permission: &Permission) -> Result<()>;

    fn update_permission_bitmask(&mut self, id: PermissionId, mask: ActionMask) -> Result<()>;

    fn delete_permission(&mut self, id: PermissionId) -> Result<()>;

    /// Permissions whose `updated_at` is strictly before `instant`.
    fn permissions_updated_before(&mut self, instant: Timestamp) -> Result<Vec<Permission>>;

    fn bindings_for_permission(&mut self, id: PermissionId) -> Result<Vec<BindingRow>>;

    fn update_binding(&mut self, id: RoleBindingId, mask: ActionMask) -> Result<()>;

    fn delete_binding(&mut self, id: RoleBindingId) -> Result<()>;
}

/// Source of atomic transactions over permissions and role bindings.
pub trait PermissionStore {
    /// Runs `work` atomically.
    ///
    /// Commits when `work` returns `Ok`; discards every change when it
    /// returns `Err` or when the commit itself fails.
    fn transaction<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T>;
}

/// Loads the roles held by an identity, bindings joined to permissions.
pub trait RoleSource {
    fn roles_for(&self, identity: IdentityId) -> Result<Vec<Role>>;
}

//! In-memory permission store.
//!
//! Every transaction takes the store-wide lock, works on a private copy of
//! the tables, and swaps the copy in on commit. Holding the lock for the
//! whole transaction serializes all writers, which subsumes the per-row
//! locking the cascade requires.
//!
//! Write-failure injection ([`MemoryStore::fail_after_writes`]) exists so
//! atomicity can be exercised without a real database.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use capmask_types::{ActionMask, IdentityId, PermissionId, RoleBindingId, RoleId, Timestamp};
use tracing::debug;

use crate::error::{Error, Result};
use crate::permissions::{Permission, PermissionDraft};
use crate::roles::{BindingRow, Role, RoleBinding};
use crate::store::{PermissionStore, RoleSource, Transaction};

#[derive(Debug, Clone, Default)]
struct Tables {
    permissions: BTreeMap<PermissionId, Permission>,
    bindings: BTreeMap<RoleBindingId, BindingRow>,
    role_levels: BTreeMap<RoleId, u32>,
    assignments: BTreeMap<IdentityId, Vec<RoleId>>,
    last_id: u64,
    last_stamp: Option<Timestamp>,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    fn stamp(&mut self) -> Timestamp {
        let stamp = Timestamp::now_monotonic(self.last_stamp);
        self.last_stamp = Some(stamp);
        stamp
    }
}

#[derive(Debug, Default)]
struct Inner {
    tables: Tables,
    /// Remaining writes before injected failure; `None` disables injection.
    write_budget: Option<usize>,
}

/// Mutex-guarded in-memory implementation of the store traits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| Error::Store("lock poisoned".to_string()))
    }

    /// Makes every transactional write after the next `writes` fail.
    pub fn fail_after_writes(&self, writes: usize) -> Result<()> {
        self.lock()?.write_budget = Some(writes);
        Ok(())
    }

    /// Disables write-failure injection.
    pub fn clear_fault(&self) -> Result<()> {
        self.lock()?.write_budget = None;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Administrative helpers
    // ------------------------------------------------------------------------

    pub fn insert_permission(&self, draft: &PermissionDraft) -> Result<PermissionId> {
        self.transaction(|tx| tx.insert_permission(draft))
    }

    pub fn insert_role(&self, level: u32) -> Result<RoleId> {
        let mut inner = self.lock()?;
        let id = RoleId::new(inner.tables.next_id());
        inner.tables.role_levels.insert(id, level);
        Ok(id)
    }

    /// Binds `role` to `permission` with `mask`.
    ///
    /// The mask is clamped to the permission's current bitmask so a binding
    /// can never start life outside its ceiling. A mask that clamps to zero is
    /// rejected with [`Error::EmptyBinding`]; no empty binding is ever stored.
    pub fn bind(
        &self,
        role: RoleId,
        permission: PermissionId,
        mask: ActionMask,
    ) -> Result<RoleBindingId> {
        let mut inner = self.lock()?;
        let tables = &mut inner.tables;

        if !tables.role_levels.contains_key(&role) {
            return Err(Error::Store(format!("role {role} not found")));
        }
        let ceiling = tables
            .permissions
            .get(&permission)
            .map(|p| p.bitmask)
            .ok_or(Error::PermissionNotFound(permission))?;

        let bitmask = mask & ceiling;
        if bitmask.is_empty() {
            return Err(Error::EmptyBinding { permission, mask });
        }

        let id = RoleBindingId::new(tables.next_id());
        tables.bindings.insert(
            id,
            BindingRow {
                id,
                role_id: role,
                permission_id: permission,
                bitmask,
            },
        );
        Ok(id)
    }

    pub fn assign_role(&self, identity: IdentityId, role: RoleId) -> Result<()> {
        let mut inner = self.lock()?;
        if !inner.tables.role_levels.contains_key(&role) {
            return Err(Error::Store(format!("role {role} not found")));
        }
        let roles = inner.tables.assignments.entry(identity).or_default();
        if !roles.contains(&role) {
            roles.push(role);
        }
        Ok(())
    }

    pub fn permission(&self, id: PermissionId) -> Result<Option<Permission>> {
        Ok(self.lock()?.tables.permissions.get(&id).cloned())
    }

    pub fn binding(&self, id: RoleBindingId) -> Result<Option<BindingRow>> {
        Ok(self.lock()?.tables.bindings.get(&id).copied())
    }

    pub fn bindings_for(&self, permission: PermissionId) -> Result<Vec<BindingRow>> {
        Ok(self
            .lock()?
            .tables
            .bindings
            .values()
            .filter(|b| b.permission_id == permission)
            .copied()
            .collect())
    }

    pub fn permission_count(&self) -> Result<usize> {
        Ok(self.lock()?.tables.permissions.len())
    }
}

impl PermissionStore for MemoryStore {
    fn transaction<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T>,
    {
        let mut guard = self.lock()?;
        let Inner {
            tables,
            write_budget,
        } = &mut *guard;

        let mut tx = MemoryTransaction {
            staged: tables.clone(),
            write_budget,
        };

        match work(&mut tx) {
            Ok(value) => {
                *tables = tx.staged;
                Ok(value)
            }
            Err(e) => {
                debug!(error = %e, "transaction rolled back");
                Err(e)
            }
        }
    }
}

impl RoleSource for MemoryStore {
    fn roles_for(&self, identity: IdentityId) -> Result<Vec<Role>> {
        let inner = self.lock()?;
        let tables = &inner.tables;

        let Some(role_ids) = tables.assignments.get(&identity) else {
            return Ok(Vec::new());
        };

        let roles = role_ids
            .iter()
            .filter_map(|role_id| {
                let level = *tables.role_levels.get(role_id)?;
                let bindings = tables
                    .bindings
                    .values()
                    .filter(|b| b.role_id == *role_id)
                    .filter_map(|b| {
                        let permission = tables.permissions.get(&b.permission_id)?;
                        Some(RoleBinding {
                            id: b.id,
                            permission: permission.clone(),
                            bitmask: b.bitmask,
                        })
                    })
                    .collect();
                Some(Role {
                    id: *role_id,
                    level,
                    bindings,
                })
            })
            .collect();

        Ok(roles)
    }
}

// ============================================================================
// Transaction
// ============================================================================

struct MemoryTransaction<'a> {
    staged: Tables,
    write_budget: &'a mut Option<usize>,
}

impl MemoryTransaction<'_> {
    fn charge_write(&mut self) -> Result<()> {
        match &mut *self.write_budget {
            Some(0) => Err(Error::Store("injected write failure".to_string())),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn stamp(&mut self) -> Timestamp {
        self.staged.stamp()
    }

    fn lock_permission(&mut self, id: PermissionId) -> Result<Permission> {
        self.staged
            .permissions
            .get(&id)
            .cloned()
            .ok_or(Error::PermissionNotFound(id))
    }

    fn permission_by_subject(&mut self, subject: &str) -> Result<Option<Permission>> {
        Ok(self
            .staged
            .permissions
            .values()
            .find(|p| p.subject == subject)
            .cloned())
    }

    fn insert_permission(&mut self, draft: &PermissionDraft) -> Result<PermissionId> {
        self.charge_write()?;
        let id = PermissionId::new(self.staged.next_id());
        let stamp = self.staged.stamp();
        self.staged
            .permissions
            .insert(id, Permission::from_draft(id, draft, stamp));
        Ok(id)
    }

    fn save_permission(&mut self, permission: &Permission) -> Result<()> {
        self.charge_write()?;
        if !self.staged.permissions.contains_key(&permission.id) {
            return Err(Error::PermissionNotFound(permission.id));
        }
        let mut row = permission.clone();
        row.updated_at = self.staged.stamp();
        self.staged.permissions.insert(row.id, row);
        Ok(())
    }

    fn update_permission_bitmask(&mut self, id: PermissionId, mask: ActionMask) -> Result<()> {
        self.charge_write()?;
        let stamp = self.staged.stamp();
        let row = self
            .staged
            .permissions
            .get_mut(&id)
            .ok_or(Error::PermissionNotFound(id))?;
        row.bitmask = mask;
        row.updated_at = stamp;
        Ok(())
    }

    fn delete_permission(&mut self, id: PermissionId) -> Result<()> {
        self.charge_write()?;
        if self.staged.bindings.values().any(|b| b.permission_id == id) {
            return Err(Error::Store(format!(
                "permission {id} is still referenced by role bindings"
            )));
        }
        self.staged
            .permissions
            .remove(&id)
            .map(|_| ())
            .ok_or(Error::PermissionNotFound(id))
    }

    fn permissions_updated_before(&mut self, instant: Timestamp) -> Result<Vec<Permission>> {
        Ok(self
            .staged
            .permissions
            .values()
            .filter(|p| p.updated_at < instant)
            .cloned()
            .collect())
    }

    fn bindings_for_permission(&mut self, id: PermissionId) -> Result<Vec<BindingRow>> {
        Ok(self
            .staged
            .bindings
            .values()
            .filter(|b| b.permission_id == id)
            .copied()
            .collect())
    }

    fn update_binding(&mut self, id: RoleBindingId, mask: ActionMask) -> Result<()> {
        self.charge_write()?;
        let row = self
            .staged
            .bindings
            .get_mut(&id)
            .ok_or_else(|| Error::Store(format!("role binding {id} not found")))?;
        row.bitmask = mask;
        Ok(())
    }

    fn delete_binding(&mut self, id: RoleBindingId) -> Result<()> {
        self.charge_write()?;
        self.staged
            .bindings
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::Store(format!("role binding {id} not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_draft() -> PermissionDraft {
        PermissionDraft::new("Order", ActionMask::new(0b0111))
    }

    #[test]
    fn test_commit_on_ok() {
        let store = MemoryStore::new();
        let id = store.insert_permission(&order_draft()).unwrap();

        store
            .transaction(|tx| tx.update_permission_bitmask(id, ActionMask::new(0b0001)))
            .unwrap();

        assert_eq!(
            store.permission(id).unwrap().unwrap().bitmask,
            ActionMask::new(0b0001)
        );
    }

    #[test]
    fn test_rollback_on_err() {
        let store = MemoryStore::new();
        let id = store.insert_permission(&order_draft()).unwrap();

        let result: Result<()> = store.transaction(|tx| {
            tx.update_permission_bitmask(id, ActionMask::new(0b0001))?;
            Err(Error::Store("boom".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(
            store.permission(id).unwrap().unwrap().bitmask,
            ActionMask::new(0b0111)
        );
    }

    #[test]
    fn test_injected_write_failure() {
        let store = MemoryStore::new();
        let id = store.insert_permission(&order_draft()).unwrap();
        store.fail_after_writes(0).unwrap();

        let result = store.transaction(|tx| tx.update_permission_bitmask(id, ActionMask::EMPTY));
        assert!(matches!(result, Err(Error::Store(msg)) if msg.contains("injected")));

        store.clear_fault().unwrap();
        assert!(
            store
                .transaction(|tx| tx.update_permission_bitmask(id, ActionMask::EMPTY))
                .is_ok()
        );
    }

    #[test]
    fn test_bind_clamps_to_permission() {
        let store = MemoryStore::new();
        let permission = store.insert_permission(&order_draft()).unwrap();
        let role = store.insert_role(10).unwrap();

        let binding = store
            .bind(role, permission, ActionMask::new(0b1101))
            .unwrap();

        assert_eq!(
            store.binding(binding).unwrap().unwrap().bitmask,
            ActionMask::new(0b0101)
        );
    }

    #[test]
    fn test_bind_rejects_mask_disjoint_from_permission() {
        let store = MemoryStore::new();
        let permission = store
            .insert_permission(&PermissionDraft::new("Order", ActionMask::new(0b0001)))
            .unwrap();
        let role = store.insert_role(10).unwrap();

        let result = store.bind(role, permission, ActionMask::new(0b0100));

        assert!(matches!(
            result,
            Err(Error::EmptyBinding { permission: p, .. }) if p == permission
        ));
        assert!(store.bindings_for(permission).unwrap().is_empty());
    }

    #[test]
    fn test_bind_rejects_zero_mask() {
        let store = MemoryStore::new();
        let permission = store.insert_permission(&order_draft()).unwrap();
        let role = store.insert_role(10).unwrap();

        let result = store.bind(role, permission, ActionMask::EMPTY);

        assert!(matches!(result, Err(Error::EmptyBinding { .. })));
        assert!(store.bindings_for(permission).unwrap().is_empty());
    }

    #[test]
    fn test_delete_permission_refuses_dangling_bindings() {
        let store = MemoryStore::new();
        let permission = store.insert_permission(&order_draft()).unwrap();
        let role = store.insert_role(10).unwrap();
        store.bind(role, permission, ActionMask::new(0b1)).unwrap();

        let result = store.transaction(|tx| tx.delete_permission(permission));
        assert!(matches!(result, Err(Error::Store(_))));
        assert_eq!(store.permission_count().unwrap(), 1);
    }

    #[test]
    fn test_stamps_strictly_increase() {
        let store = MemoryStore::new();
        let (a, b) = store
            .transaction(|tx| Ok((tx.stamp(), tx.stamp())))
            .unwrap();
        assert!(b > a);

        let c = store.transaction(|tx| Ok(tx.stamp())).unwrap();
        assert!(c > b);
    }

    #[test]
    fn test_roles_for_joins_bindings() {
        let store = MemoryStore::new();
        let permission = store.insert_permission(&order_draft()).unwrap();
        let role = store.insert_role(3).unwrap();
        store.bind(role, permission, ActionMask::new(0b0101)).unwrap();

        let identity = IdentityId::new(77);
        store.assign_role(identity, role).unwrap();

        let roles = store.roles_for(identity).unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].level, 3);
        assert_eq!(roles[0].bindings.len(), 1);
        assert_eq!(roles[0].bindings[0].permission.subject, "Order");
        assert_eq!(roles[0].bindings[0].bitmask, ActionMask::new(0b0101));

        assert!(store.roles_for(IdentityId::new(1)).unwrap().is_empty());
    }
}

//! Propagation of permission edits into role bindings.
//!
//! Narrowing a permission's bitmask must narrow every binding that references
//! it, in the same transaction as the permission write:
//!
//! ```text
//! for binding in bindings(permission):
//!     narrowed = binding.bitmask & new_mask
//!     narrowed == 0  → delete binding
//!     otherwise      → binding.bitmask = narrowed
//! permission.bitmask = new_mask
//! ```
//!
//! Widening a permission never widens a binding; grants are added explicitly.
//!
//! [`CatalogResync`] is the seed/migrate variant: it reconciles stored
//! permissions against the configured catalog entries and then sweeps every
//! permission the pass did not touch.

use std::collections::BTreeSet;

use capmask_types::{ActionMask, PermissionId, RoleBindingId, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::PermissionCatalog;
use crate::codec;
use crate::error::{Error, Result};
use crate::permissions::PermissionDraft;
use crate::store::{PermissionStore, Transaction};

// ============================================================================
// Role Binding Cascade
// ============================================================================

/// Outcome of one cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeReport {
    pub permission_id: PermissionId,
    pub previous_mask: ActionMask,
    pub new_mask: ActionMask,
    /// Bindings that lost bits but kept at least one.
    pub updated: Vec<RoleBindingId>,
    /// Bindings that lost every bit and were removed.
    pub deleted: Vec<RoleBindingId>,
}

/// Applies permission bitmask edits and narrows the affected bindings.
pub struct RoleBindingCascade<'a, S> {
    catalog: &'a PermissionCatalog,
    store: &'a S,
}

impl<'a, S: PermissionStore> RoleBindingCascade<'a, S> {
    pub fn new(catalog: &'a PermissionCatalog, store: &'a S) -> Self {
        Self { catalog, store }
    }

    /// Sets `permission_id`'s bitmask to `new_mask` and narrows its bindings.
    ///
    /// Runs in a single transaction. On any failure nothing is written and the
    /// error is returned as-is; there is no retry.
    ///
    /// # Errors
    ///
    /// - [`Error::MaskOutOfRange`] if `new_mask` has bits beyond the catalog
    /// - [`Error::PermissionNotFound`] if the permission does not exist
    /// - [`Error::Store`] for any collaborator failure
    pub fn apply(&self, permission_id: PermissionId, new_mask: ActionMask) -> Result<CascadeReport> {
        codec::validate_mask(self.catalog, new_mask)?;

        let report = self
            .store
            .transaction(|tx| cascade_in(tx, permission_id, new_mask))?;

        info!(
            permission = %report.permission_id,
            previous = %report.previous_mask,
            new = %report.new_mask,
            updated = report.updated.len(),
            deleted = report.deleted.len(),
            "permission bitmask cascaded"
        );

        Ok(report)
    }
}

/// Cascade body, for callers that already hold a transaction.
pub(crate) fn cascade_in(
    tx: &mut dyn Transaction,
    permission_id: PermissionId,
    new_mask: ActionMask,
) -> Result<CascadeReport> {
    let permission = tx.lock_permission(permission_id)?;

    let mut report = CascadeReport {
        permission_id,
        previous_mask: permission.bitmask,
        new_mask,
        updated: Vec::new(),
        deleted: Vec::new(),
    };

    for binding in tx.bindings_for_permission(permission_id)? {
        let narrowed = binding.bitmask & new_mask;

        if narrowed.is_empty() {
            tx.delete_binding(binding.id)?;
            debug!(binding = %binding.id, permission = %permission_id, "role binding emptied and deleted");
            report.deleted.push(binding.id);
        } else if narrowed != binding.bitmask {
            tx.update_binding(binding.id, narrowed)?;
            report.updated.push(binding.id);
        }
    }

    tx.update_permission_bitmask(permission_id, new_mask)?;

    Ok(report)
}

// ============================================================================
// Catalog Resync
// ============================================================================

/// Controls the destructive half of a resync pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResyncPolicy {
    /// Delete stale permissions (and their bindings). When false, stale rows
    /// are only reported.
    pub prune: bool,

    /// Subjects whose permissions are never pruned, stale or not.
    pub protected_subjects: BTreeSet<String>,
}

impl Default for ResyncPolicy {
    fn default() -> Self {
        Self {
            prune: true,
            protected_subjects: BTreeSet::new(),
        }
    }
}

/// Outcome of one resync pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResyncReport {
    /// Every row written by this pass is stamped at or after this instant.
    pub pass_start: Timestamp,
    pub created: Vec<PermissionId>,
    /// Cascades run for entries whose mask changed.
    pub cascades: Vec<CascadeReport>,
    pub pruned: Vec<PermissionId>,
    pub pruned_bindings: Vec<RoleBindingId>,
    /// Stale rows left in place by policy.
    pub retained: Vec<PermissionId>,
}

/// Reconciles stored permissions with the catalog entries.
///
/// Any permission whose `updated_at` predates the start of the pass is
/// treated as removed from the catalog. The whole pass (upserts, cascades,
/// and the sweep) is one transaction, so an interrupted pass leaves storage
/// exactly as it was instead of half-stamped.
pub struct CatalogResync<'a, S> {
    catalog: &'a PermissionCatalog,
    store: &'a S,
    policy: ResyncPolicy,
}

impl<'a, S: PermissionStore> CatalogResync<'a, S> {
    pub fn new(catalog: &'a PermissionCatalog, store: &'a S) -> Self {
        Self {
            catalog,
            store,
            policy: ResyncPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ResyncPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Runs one pass over `entries`.
    ///
    /// # Errors
    ///
    /// Entries naming unknown subjects ([`Error::InvalidSubject`]) or carrying
    /// out-of-range masks ([`Error::MaskOutOfRange`]) abort the pass before
    /// the transaction opens.
    pub fn run(&self, entries: &[PermissionDraft]) -> Result<ResyncReport> {
        for entry in entries {
            if !self.catalog.contains_subject(&entry.subject) {
                return Err(Error::InvalidSubject(entry.subject.clone()));
            }
            codec::validate_mask(self.catalog, entry.bitmask)?;
        }

        let report = self.store.transaction(|tx| self.pass(tx, entries))?;

        info!(
            created = report.created.len(),
            cascaded = report.cascades.len(),
            pruned = report.pruned.len(),
            retained = report.retained.len(),
            "catalog resync complete"
        );

        Ok(report)
    }

    fn pass(&self, tx: &mut dyn Transaction, entries: &[PermissionDraft]) -> Result<ResyncReport> {
        let pass_start = tx.stamp();
        let mut report = ResyncReport {
            pass_start,
            created: Vec::new(),
            cascades: Vec::new(),
            pruned: Vec::new(),
            pruned_bindings: Vec::new(),
            retained: Vec::new(),
        };

        for entry in entries {
            match tx.permission_by_subject(&entry.subject)? {
                Some(existing) => {
                    if existing.bitmask != entry.bitmask {
                        report
                            .cascades
                            .push(cascade_in(tx, existing.id, entry.bitmask)?);
                    }
                    // Re-read: the cascade may have rewritten the mask.
                    let mut row = tx.lock_permission(existing.id)?;
                    row.apply_draft(entry);
                    tx.save_permission(&row)?;
                }
                None => report.created.push(tx.insert_permission(entry)?),
            }
        }

        for stale in tx.permissions_updated_before(pass_start)? {
            if !self.policy.prune || self.policy.protected_subjects.contains(&stale.subject) {
                warn!(permission = %stale.id, subject = %stale.subject, "stale permission retained");
                report.retained.push(stale.id);
                continue;
            }

            for binding in tx.bindings_for_permission(stale.id)? {
                tx.delete_binding(binding.id)?;
                report.pruned_bindings.push(binding.id);
            }
            tx.delete_permission(stale.id)?;
            warn!(permission = %stale.id, subject = %stale.subject, "stale permission pruned");
            report.pruned.push(stale.id);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use proptest::prelude::*;

    fn catalog() -> PermissionCatalog {
        PermissionCatalog::from_names(
            ["all", "Order", "Invoice", "Cart"],
            ["CREATE", "READ", "UPDATE", "DELETE"],
        )
        .unwrap()
    }

    fn order_with_bindings(store: &MemoryStore, masks: &[u64]) -> (PermissionId, Vec<RoleBindingId>) {
        let permission = store
            .insert_permission(&PermissionDraft::new("Order", ActionMask::new(0b0111)))
            .unwrap();
        let bindings = masks
            .iter()
            .map(|mask| {
                let role = store.insert_role(10).unwrap();
                store.bind(role, permission, ActionMask::new(*mask)).unwrap()
            })
            .collect();
        (permission, bindings)
    }

    #[test]
    fn test_narrowing_updates_and_deletes() {
        let catalog = catalog();
        let store = MemoryStore::new();
        let (permission, bindings) = order_with_bindings(&store, &[0b0101, 0b0100]);

        let report = RoleBindingCascade::new(&catalog, &store)
            .apply(permission, ActionMask::new(0b0001))
            .unwrap();

        assert_eq!(report.previous_mask, ActionMask::new(0b0111));
        assert_eq!(report.updated, vec![bindings[0]]);
        assert_eq!(report.deleted, vec![bindings[1]]);

        assert_eq!(
            store.binding(bindings[0]).unwrap().unwrap().bitmask,
            ActionMask::new(0b0001)
        );
        assert!(store.binding(bindings[1]).unwrap().is_none());
        assert_eq!(
            store.permission(permission).unwrap().unwrap().bitmask,
            ActionMask::new(0b0001)
        );
    }

    #[test]
    fn test_widening_leaves_bindings_alone() {
        let catalog = catalog();
        let store = MemoryStore::new();
        let (permission, bindings) = order_with_bindings(&store, &[0b0101]);

        let report = RoleBindingCascade::new(&catalog, &store)
            .apply(permission, ActionMask::new(0b1111))
            .unwrap();

        assert!(report.updated.is_empty());
        assert!(report.deleted.is_empty());
        assert_eq!(
            store.binding(bindings[0]).unwrap().unwrap().bitmask,
            ActionMask::new(0b0101)
        );
    }

    #[test]
    fn test_out_of_range_mask_rejected_before_writing() {
        let catalog = catalog();
        let store = MemoryStore::new();
        let (permission, _) = order_with_bindings(&store, &[0b0101]);

        let result = RoleBindingCascade::new(&catalog, &store).apply(permission, ActionMask::new(0b1_0000));
        assert!(matches!(result, Err(Error::MaskOutOfRange { .. })));
        assert_eq!(
            store.permission(permission).unwrap().unwrap().bitmask,
            ActionMask::new(0b0111)
        );
    }

    #[test]
    fn test_missing_permission() {
        let catalog = catalog();
        let store = MemoryStore::new();
        let result = RoleBindingCascade::new(&catalog, &store).apply(PermissionId::new(404), ActionMask::EMPTY);
        assert!(matches!(result, Err(Error::PermissionNotFound(id)) if id == PermissionId::new(404)));
    }

    #[test]
    fn test_failure_mid_cascade_leaves_no_partial_state() {
        let catalog = catalog();
        let store = MemoryStore::new();
        let (permission, bindings) = order_with_bindings(&store, &[0b0101, 0b0100, 0b0110]);

        // First binding write succeeds, the second fails.
        store.fail_after_writes(1).unwrap();
        let result = RoleBindingCascade::new(&catalog, &store).apply(permission, ActionMask::new(0b0001));
        store.clear_fault().unwrap();

        assert!(matches!(result, Err(Error::Store(_))));
        assert_eq!(
            store.permission(permission).unwrap().unwrap().bitmask,
            ActionMask::new(0b0111)
        );
        let masks: Vec<u64> = bindings
            .iter()
            .map(|id| store.binding(*id).unwrap().unwrap().bitmask.bits())
            .collect();
        assert_eq!(masks, vec![0b0101, 0b0100, 0b0110]);
    }

    #[test]
    fn test_concurrent_cascades_on_one_permission_serialize() {
        let catalog = catalog();
        let masks = [0b0111u64, 0b0011, 0b0110, 0b0010];

        for _ in 0..16 {
            let store = MemoryStore::new();
            let (permission, bindings) =
                order_with_bindings(&store, &[0b0101, 0b0011, 0b0110, 0b0010]);

            std::thread::scope(|scope| {
                for mask in masks {
                    let cascade = RoleBindingCascade::new(&catalog, &store);
                    scope.spawn(move || {
                        cascade.apply(permission, ActionMask::new(mask)).unwrap();
                    });
                }
            });

            let final_mask = store.permission(permission).unwrap().unwrap().bitmask;
            assert!(masks.iter().any(|m| ActionMask::new(*m) == final_mask));

            // Every cascade narrowed in turn, so survivors sit inside the
            // intersection of all applied masks.
            let survivors = store.bindings_for(permission).unwrap();
            for binding in &survivors {
                assert!(!binding.bitmask.is_empty());
                assert!(binding.bitmask.is_subset_of(final_mask));
                assert_eq!(binding.bitmask, ActionMask::new(0b0010));
            }
            assert_eq!(survivors.len(), 3);
            assert!(store.binding(bindings[0]).unwrap().is_none());
        }
    }

    #[test]
    fn test_resync_creates_updates_and_prunes() {
        let catalog = catalog();
        let store = MemoryStore::new();
        let (order, order_bindings) = order_with_bindings(&store, &[0b0101]);
        let cart = store
            .insert_permission(&PermissionDraft::new("Cart", ActionMask::new(0b0011)))
            .unwrap();
        let role = store.insert_role(1).unwrap();
        let cart_binding = store.bind(role, cart, ActionMask::new(0b0001)).unwrap();

        let entries = vec![
            PermissionDraft::new("Order", ActionMask::new(0b0001)).with_context("sales"),
            PermissionDraft::new("Invoice", ActionMask::new(0b0011)),
        ];
        let report = CatalogResync::new(&catalog, &store).run(&entries).unwrap();

        assert_eq!(report.created.len(), 1);
        assert_eq!(report.cascades.len(), 1);
        assert_eq!(report.cascades[0].permission_id, order);
        assert_eq!(report.pruned, vec![cart]);
        assert_eq!(report.pruned_bindings, vec![cart_binding]);

        let order_row = store.permission(order).unwrap().unwrap();
        assert_eq!(order_row.bitmask, ActionMask::new(0b0001));
        assert_eq!(order_row.context.as_deref(), Some("sales"));
        assert!(order_row.updated_at >= report.pass_start);
        assert_eq!(
            store.binding(order_bindings[0]).unwrap().unwrap().bitmask,
            ActionMask::new(0b0001)
        );

        assert!(store.permission(cart).unwrap().is_none());
        assert!(store.binding(cart_binding).unwrap().is_none());
    }

    #[test]
    fn test_resync_unchanged_entry_is_touched_not_pruned() {
        let catalog = catalog();
        let store = MemoryStore::new();
        let (order, _) = order_with_bindings(&store, &[0b0101]);

        let entries = vec![PermissionDraft::new("Order", ActionMask::new(0b0111))];
        let report = CatalogResync::new(&catalog, &store).run(&entries).unwrap();

        assert!(report.cascades.is_empty());
        assert!(report.pruned.is_empty());
        assert!(store.permission(order).unwrap().is_some());
    }

    #[test]
    fn test_resync_respects_protected_subjects_and_dry_run() {
        let catalog = catalog();
        let store = MemoryStore::new();
        let cart = store
            .insert_permission(&PermissionDraft::new("Cart", ActionMask::new(0b0011)))
            .unwrap();
        let invoice = store
            .insert_permission(&PermissionDraft::new("Invoice", ActionMask::new(0b0011)))
            .unwrap();

        let protected = ResyncPolicy {
            prune: true,
            protected_subjects: BTreeSet::from(["Cart".to_string()]),
        };
        let report = CatalogResync::new(&catalog, &store)
            .with_policy(protected)
            .run(&[])
            .unwrap();
        assert_eq!(report.retained, vec![cart]);
        assert_eq!(report.pruned, vec![invoice]);

        let report = CatalogResync::new(&catalog, &store)
            .with_policy(ResyncPolicy {
                prune: false,
                protected_subjects: BTreeSet::new(),
            })
            .run(&[])
            .unwrap();
        assert_eq!(report.retained, vec![cart]);
        assert!(report.pruned.is_empty());
        assert!(store.permission(cart).unwrap().is_some());
    }

    #[test]
    fn test_resync_rejects_unknown_subject() {
        let catalog = catalog();
        let store = MemoryStore::new();
        let entries = vec![PermissionDraft::new("Tier", ActionMask::new(0b1))];

        let result = CatalogResync::new(&catalog, &store).run(&entries);
        assert!(matches!(result, Err(Error::InvalidSubject(name)) if name == "Tier"));
        assert_eq!(store.permission_count().unwrap(), 0);
    }

    #[test]
    fn test_interrupted_resync_prunes_nothing() {
        let catalog = catalog();
        let store = MemoryStore::new();
        let (order, _) = order_with_bindings(&store, &[0b0101]);
        let cart = store
            .insert_permission(&PermissionDraft::new("Cart", ActionMask::new(0b0011)))
            .unwrap();

        let entries = vec![
            PermissionDraft::new("Order", ActionMask::new(0b0111)),
            PermissionDraft::new("Invoice", ActionMask::new(0b0011)),
        ];
        store.fail_after_writes(1).unwrap();
        let result = CatalogResync::new(&catalog, &store).run(&entries);
        store.clear_fault().unwrap();

        assert!(result.is_err());
        assert!(store.permission(order).unwrap().is_some());
        assert!(store.permission(cart).unwrap().is_some());
        assert_eq!(store.permission_count().unwrap(), 2);
    }

    proptest! {
        /// After any cascade every surviving binding is inside the new mask
        /// and no binding is left empty.
        #[test]
        fn cascade_is_monotonic(
            initial in 0u64..16,
            binding_masks in proptest::collection::vec(1u64..16, 0..8),
            new_mask in 0u64..16,
        ) {
            let catalog = catalog();
            let store = MemoryStore::new();
            let permission = store
                .insert_permission(&PermissionDraft::new("Order", ActionMask::new(initial)))
                .unwrap();
            for mask in &binding_masks {
                if (ActionMask::new(*mask) & ActionMask::new(initial)).is_empty() {
                    continue;
                }
                let role = store.insert_role(5).unwrap();
                store.bind(role, permission, ActionMask::new(*mask)).unwrap();
            }

            RoleBindingCascade::new(&catalog, &store)
                .apply(permission, ActionMask::new(new_mask))
                .unwrap();

            for binding in store.bindings_for(permission).unwrap() {
                prop_assert!(binding.bitmask.is_subset_of(ActionMask::new(new_mask)));
                prop_assert!(!binding.bitmask.is_empty());
            }
        }
    }
}

//! # capmask: capability-based authorization
//!
//! Permissions are `(subject, action-set)` pairs. Action sets are stored as
//! bitmasks whose bit positions come from a fixed, ordered action catalog;
//! subjects are addressed by their position in an ordered subject catalog.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  PermissionCatalog (startup, immutable)      │
//! │  ├─ subjects: name ↔ index                   │
//! │  └─ actions:  name ↔ bit                     │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!     ┌─────────────┴──────────────┐
//!     ▼                            ▼
//! ┌──────────────────────┐  ┌──────────────────────────────┐
//! │  Administration       │  │  Token issuance               │
//! │  ├─ RoleBindingCascade│  │  └─ TokenPermissionCompactor  │
//! │  └─ CatalogResync     │  │     roles → {index: mask}     │
//! └──────────────────────┘  └──────────────┬───────────────┘
//!                                          │ AuthIdentity
//!                                          ▼
//!                           ┌──────────────────────────────┐
//!                           │  Request time                 │
//!                           │  ├─ AbilityDecoder            │
//!                           │  ├─ CompiledAbility           │
//!                           │  └─ AuthorizationGuard        │
//!                           └──────────────────────────────┘
//! ```
//!
//! ## Invariants
//!
//! - A binding's mask is always a subset of its permission's mask. Narrowing a
//!   permission narrows (or deletes) its bindings in the same transaction.
//! - Token contents are frozen at issuance. Edits become visible on reissue.
//! - Encoding unknown names fails; decoding unknown indices or bits skips them.
//!
//! ## Example
//!
//! ```
//! use capmask::{
//!     AuthorizationGuard, MemoryStore, OperationPolicy, PermissionCatalog, PermissionDraft,
//!     TokenPermissionCompactor, codec,
//! };
//! use capmask_types::IdentityId;
//!
//! let catalog = PermissionCatalog::from_names(
//!     ["all", "Order"],
//!     ["CREATE", "READ", "UPDATE", "DELETE"],
//! )?;
//! let store = MemoryStore::new();
//!
//! let order = store.insert_permission(&PermissionDraft::new(
//!     "Order",
//!     codec::actions_to_bitmask(&catalog, &["CREATE", "READ", "UPDATE"])?,
//! ))?;
//! let clerk = store.insert_role(10)?;
//! store.bind(clerk, order, codec::actions_to_bitmask(&catalog, &["CREATE", "UPDATE"])?)?;
//! store.assign_role(IdentityId::new(1), clerk)?;
//!
//! let identity = TokenPermissionCompactor::new(&catalog).issue(&store, IdentityId::new(1))?;
//! let guard = AuthorizationGuard::new(&catalog).without_audit();
//!
//! let create = OperationPolicy::authenticated().require("Order", ["CREATE"]);
//! assert!(guard.evaluate(Some(&identity), &create).is_allowed());
//!
//! let delete = OperationPolicy::authenticated().require("Order", ["DELETE"]);
//! assert!(!guard.evaluate(Some(&identity), &delete).is_allowed());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod ability;
pub mod cascade;
pub mod catalog;
pub mod codec;
pub mod compactor;
pub mod enforcement;
pub mod error;
pub mod memory;
pub mod permissions;
pub mod policy;
pub mod roles;
pub mod store;

// Re-export commonly used types
pub use ability::{ALL_SUBJECTS, Ability, AbilityDecoder, CompiledAbility};
pub use cascade::{CascadeReport, CatalogResync, ResyncPolicy, ResyncReport, RoleBindingCascade};
pub use catalog::{CatalogBuilder, CatalogSnapshot, PermissionCatalog};
pub use compactor::{AuthIdentity, SubjectPermissionMap, TokenPermissionCompactor};
pub use enforcement::{AuthorizationGuard, Decision, Denial, DenialKind, GuardState};
pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use permissions::{Permission, PermissionDraft};
pub use policy::{AbilityRequirement, OperationPolicy, OperationTable};
pub use roles::{BindingRow, Role, RoleBinding};
pub use store::{PermissionStore, RoleSource, Transaction};

// Kani proofs for bounded model checking
#[cfg(kani)]
mod kani_proofs;

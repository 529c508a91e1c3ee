//! Kani bounded model checking proofs for the mask algebra.
//!
//! - Codec round trip: decoding then encoding a catalog-range mask is lossless
//! - Cascade narrowing: a narrowed binding is a subset of both inputs
//! - Compaction: OR-combining bindings is order independent
//! - Guard: a missing identity on an authenticated operation is Unauthorized

use capmask_types::{ActionMask, IdentityId, Timestamp};

use crate::{
    catalog::PermissionCatalog,
    codec,
    compactor::{AuthIdentity, SubjectPermissionMap},
    enforcement::{AuthorizationGuard, DenialKind},
    policy::OperationPolicy,
};

fn crud() -> PermissionCatalog {
    // Fixed four-action catalog; registration cannot fail.
    match PermissionCatalog::from_names(["all", "Order"], ["CREATE", "READ", "UPDATE", "DELETE"]) {
        Ok(catalog) => catalog,
        Err(_) => unreachable!(),
    }
}

//=============================================================================
// Codec Round Trip
//=============================================================================

/// **Property**: `encode(decode(m)) == m` for every `m` within the catalog.
#[cfg(kani)]
#[kani::proof]
#[kani::unwind(6)]
fn verify_codec_round_trip() {
    let catalog = crud();
    let raw: u64 = kani::any();
    kani::assume(raw < 16);
    let mask = ActionMask::new(raw);

    let names = codec::bitmask_to_actions(&catalog, mask);
    let encoded = codec::actions_to_bitmask(&catalog, &names);

    assert!(encoded.is_ok());
    assert_eq!(encoded.ok(), Some(mask));
}

//=============================================================================
// Cascade Narrowing
//=============================================================================

/// **Property**: `binding & new_mask` never grants anything outside either
/// operand, and is empty exactly when the operands are disjoint.
#[cfg(kani)]
#[kani::proof]
fn verify_cascade_narrowing_is_subset() {
    let binding = ActionMask::new(kani::any());
    let new_mask = ActionMask::new(kani::any());

    let narrowed = binding & new_mask;

    assert!(narrowed.is_subset_of(binding));
    assert!(narrowed.is_subset_of(new_mask));
    assert_eq!(narrowed.is_empty(), (binding.bits() & new_mask.bits()) == 0);
}

//=============================================================================
// Compaction Order Independence
//=============================================================================

/// **Property**: folding two bindings in either order yields the same mask.
#[cfg(kani)]
#[kani::proof]
fn verify_compaction_commutes() {
    let a = ActionMask::new(kani::any());
    let b = ActionMask::new(kani::any());
    let c = ActionMask::new(kani::any());

    assert_eq!((a | b) | c, a | (b | c));
    assert_eq!(a | b, b | a);
}

//=============================================================================
// Guard
//=============================================================================

/// **Property**: no identity on an authenticated operation is Unauthorized,
/// whatever abilities it declares.
#[cfg(kani)]
#[kani::proof]
#[kani::unwind(4)]
fn verify_unauthenticated_is_unauthorized() {
    let catalog = crud();
    let guard = AuthorizationGuard::new(&catalog).without_audit();

    let declare: bool = kani::any();
    let policy = if declare {
        OperationPolicy::authenticated().require("Order", ["READ"])
    } else {
        OperationPolicy::authenticated()
    };

    assert_eq!(
        guard.evaluate(None, &policy).denial_kind(),
        Some(DenialKind::Unauthorized)
    );
}

/// **Property**: an identity with an empty map never passes a declared
/// requirement.
#[cfg(kani)]
#[kani::proof]
#[kani::unwind(4)]
fn verify_empty_identity_is_denied() {
    let catalog = crud();
    let guard = AuthorizationGuard::new(&catalog).without_audit();
    let identity = AuthIdentity {
        identity_id: IdentityId::new(kani::any()),
        subject_permission_map: SubjectPermissionMap::new(),
        issued_at: Timestamp::EPOCH,
    };

    let policy = OperationPolicy::authenticated().require("Order", ["READ"]);
    assert!(!guard.evaluate(Some(&identity), &policy).is_allowed());
}

//! Bitwise action codec.
//!
//! Encoding (names → mask) fails loud on any name the catalog does not know.
//! Decoding (mask → names) walks the catalog in canonical order and ignores
//! bits it has no action for, so a mask is always decodable even after the
//! catalog that produced it has moved on.
//!
//! Decoded output is in catalog order, not input order. Compare round trips
//! as sets.

use capmask_types::{ActionMask, MASK_WIDTH};

use crate::catalog::PermissionCatalog;
use crate::error::{Error, Result};

/// Packs action names into a mask.
///
/// # Errors
///
/// [`Error::InvalidAction`] for the first name the catalog cannot resolve.
///
/// # Examples
///
/// ```
/// use capmask::catalog::PermissionCatalog;
/// use capmask::codec;
///
/// let catalog = PermissionCatalog::from_names(["Order"], ["CREATE", "READ", "UPDATE", "DELETE"])?;
/// let mask = codec::actions_to_bitmask(&catalog, &["UPDATE", "CREATE"])?;
/// assert_eq!(mask.bits(), 0b0101);
/// assert_eq!(codec::bitmask_to_actions(&catalog, mask), ["CREATE", "UPDATE"]);
/// # Ok::<(), capmask::Error>(())
/// ```
pub fn actions_to_bitmask<S: AsRef<str>>(
    catalog: &PermissionCatalog,
    actions: &[S],
) -> Result<ActionMask> {
    actions.iter().try_fold(ActionMask::EMPTY, |mask, action| {
        Ok(mask | mask_for(catalog, action.as_ref())?)
    })
}

/// Unpacks a mask into action names, in catalog order.
pub fn bitmask_to_actions(catalog: &PermissionCatalog, mask: ActionMask) -> Vec<&str> {
    catalog
        .actions()
        .filter(|(bit, _)| mask.contains_bit(*bit))
        .map(|(_, name)| name)
        .collect()
}

/// Single-action mask.
pub fn mask_for(catalog: &PermissionCatalog, action: &str) -> Result<ActionMask> {
    catalog.action_bit(action).map(ActionMask::from_bit)
}

/// Rejects masks carrying bits beyond the catalog.
///
/// Every write path calls this before a mask reaches storage.
pub fn validate_mask(catalog: &PermissionCatalog, mask: ActionMask) -> Result<()> {
    debug_assert!(catalog.action_count() as u32 <= MASK_WIDTH);

    if mask.is_subset_of(catalog.full_mask()) {
        Ok(())
    } else {
        Err(Error::MaskOutOfRange {
            mask,
            action_count: catalog.action_count(),
        })
    }
}

//! Engine error types.
//!
//! Guard denials are not errors of the engine; they live in
//! [`crate::enforcement::Denial`].

use capmask_types::{ActionMask, PermissionId};
use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the catalog, the codec, and the store-facing cascades.
#[derive(Debug, Error)]
pub enum Error {
    /// Action name is not in the catalog (encode side only).
    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// Subject name is not in the catalog (encode side only).
    #[error("invalid subject: {0}")]
    InvalidSubject(String),

    /// Action registered twice at startup.
    #[error("action '{0}' is already registered")]
    DuplicateAction(String),

    /// Subject registered twice at startup.
    #[error("subject '{0}' is already registered")]
    DuplicateSubject(String),

    /// More actions than a mask can hold.
    #[error("action catalog is full: at most {width} actions fit in a mask")]
    CatalogOverflow { width: u32 },

    /// The catalog no longer extends a previously recorded snapshot.
    #[error("catalog drift: {0}")]
    CatalogDrift(String),

    /// A mask sets bits that no catalog action owns.
    #[error("mask {mask} sets bits beyond the {action_count}-action catalog")]
    MaskOutOfRange {
        mask: ActionMask,
        action_count: usize,
    },

    /// Permission row does not exist.
    #[error("permission {0} not found")]
    PermissionNotFound(PermissionId),

    /// A binding would grant nothing its permission allows.
    #[error("binding mask {mask} shares no action with permission {permission}")]
    EmptyBinding {
        permission: PermissionId,
        mask: ActionMask,
    },

    /// Token payload could not be encoded or decoded.
    #[error("invalid identity payload: {0}")]
    Payload(String),

    /// Persistence collaborator failure. The transaction has been rolled back.
    #[error("store error: {0}")]
    Store(String),
}

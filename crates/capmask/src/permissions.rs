//! Permission records.
//!
//! A permission is the catalog-facing ceiling for one subject: its `bitmask`
//! is the full set of actions the system currently allows on that subject.
//! Every role binding that references a permission must stay a subset of it.

use capmask_types::{ActionMask, PermissionId, Timestamp};
use serde::{Deserialize, Serialize};

/// Stored permission row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,

    /// Subject name, resolved against the catalog at use time.
    pub subject: String,

    /// Actions the system currently allows on this subject.
    ///
    /// Changing this value is what triggers
    /// [`RoleBindingCascade`](crate::cascade::RoleBindingCascade).
    pub bitmask: ActionMask,

    /// Free-form grouping label for administrative UIs.
    pub context: Option<String>,

    /// Inactive permissions contribute nothing to issued tokens.
    pub is_active: bool,

    pub is_visible: bool,

    pub sort_order: i32,

    /// Stamped by the store on every write.
    pub updated_at: Timestamp,
}

impl Permission {
    /// Materializes a draft into a row.
    pub fn from_draft(id: PermissionId, draft: &PermissionDraft, updated_at: Timestamp) -> Self {
        Self {
            id,
            subject: draft.subject.clone(),
            bitmask: draft.bitmask,
            context: draft.context.clone(),
            is_active: draft.is_active,
            is_visible: draft.is_visible,
            sort_order: draft.sort_order,
            updated_at,
        }
    }

    /// Copies the descriptive fields of `draft` onto this row.
    ///
    /// The mask is left alone: mask changes go through the cascade.
    pub fn apply_draft(&mut self, draft: &PermissionDraft) {
        self.context.clone_from(&draft.context);
        self.is_active = draft.is_active;
        self.is_visible = draft.is_visible;
        self.sort_order = draft.sort_order;
    }
}

/// A permission that has not been stored yet.
///
/// Used both for administrative inserts and as the catalog entries fed to
/// [`CatalogResync`](crate::cascade::CatalogResync).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDraft {
    pub subject: String,
    pub bitmask: ActionMask,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_true")]
    pub is_visible: bool,
    #[serde(default)]
    pub sort_order: i32,
}

fn default_true() -> bool {
    true
}

impl PermissionDraft {
    /// Active, visible draft with no context.
    pub fn new(subject: impl Into<String>, bitmask: ActionMask) -> Self {
        Self {
            subject: subject.into(),
            bitmask,
            context: None,
            is_active: true,
            is_visible: true,
            sort_order: 0,
        }
    }

    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    #[must_use]
    pub fn with_sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = sort_order;
        self
    }

    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.is_visible = false;
        self
    }
}

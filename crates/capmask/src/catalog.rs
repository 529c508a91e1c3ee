//! The permission catalog.
//!
//! Maps subject names to stable indices and action names to stable bit
//! positions. Both lists are append-only: the position of an entry is its
//! registration order, and every encoded mask in every issued token depends
//! on that order never changing.
//!
//! The catalog has a two-phase lifecycle. A [`CatalogBuilder`] is filled once
//! at startup from static configuration, then frozen into a
//! [`PermissionCatalog`] that is shared read-only (typically behind an `Arc`)
//! for the rest of the process. There is no way to mutate a built catalog.

use std::collections::HashMap;

use capmask_types::{ActionBit, ActionMask, MASK_WIDTH, SubjectIndex};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

// ============================================================================
// Builder
// ============================================================================

/// Startup-only registry used to assemble a [`PermissionCatalog`].
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    subjects: Vec<String>,
    actions: Vec<String>,
    subject_index: HashMap<String, SubjectIndex>,
    action_bits: HashMap<String, ActionBit>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subject and returns its stable index.
    pub fn register_subject(&mut self, name: impl Into<String>) -> Result<SubjectIndex> {
        let name = name.into();
        if self.subject_index.contains_key(&name) {
            return Err(Error::DuplicateSubject(name));
        }

        let index = SubjectIndex::new(self.subjects.len() as u32);
        debug!(subject = %name, index = %index, "registered subject");
        self.subject_index.insert(name.clone(), index);
        self.subjects.push(name);
        Ok(index)
    }

    /// Registers an action and returns its bit position.
    ///
    /// Fails with [`Error::CatalogOverflow`] once the mask width is exhausted.
    pub fn register_action(&mut self, name: impl Into<String>) -> Result<ActionBit> {
        let name = name.into();
        if self.action_bits.contains_key(&name) {
            return Err(Error::DuplicateAction(name));
        }
        if self.actions.len() as u32 >= MASK_WIDTH {
            return Err(Error::CatalogOverflow { width: MASK_WIDTH });
        }

        let bit = ActionBit::new(self.actions.len() as u8);
        debug!(action = %name, bit = %bit, "registered action");
        self.action_bits.insert(name.clone(), bit);
        self.actions.push(name);
        Ok(bit)
    }

    /// Freezes the registry.
    pub fn build(self) -> PermissionCatalog {
        PermissionCatalog {
            subjects: self.subjects,
            actions: self.actions,
            subject_index: self.subject_index,
            action_bits: self.action_bits,
        }
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Immutable subject/action registry.
#[derive(Debug, Clone)]
pub struct PermissionCatalog {
    subjects: Vec<String>,
    actions: Vec<String>,
    subject_index: HashMap<String, SubjectIndex>,
    action_bits: HashMap<String, ActionBit>,
}

impl PermissionCatalog {
    /// Builds a catalog from ordered name lists.
    ///
    /// # Examples
    ///
    /// ```
    /// use capmask::catalog::PermissionCatalog;
    /// use capmask_types::SubjectIndex;
    ///
    /// let catalog = PermissionCatalog::from_names(
    ///     ["Order", "Invoice"],
    ///     ["CREATE", "READ", "UPDATE", "DELETE"],
    /// )?;
    /// assert_eq!(catalog.action_bit("UPDATE")?.position(), 2);
    /// assert_eq!(catalog.subject_at(SubjectIndex::new(1)), Some("Invoice"));
    /// # Ok::<(), capmask::Error>(())
    /// ```
    pub fn from_names<S, A>(
        subjects: impl IntoIterator<Item = S>,
        actions: impl IntoIterator<Item = A>,
    ) -> Result<Self>
    where
        S: Into<String>,
        A: Into<String>,
    {
        let mut builder = CatalogBuilder::new();
        for subject in subjects {
            builder.register_subject(subject)?;
        }
        for action in actions {
            builder.register_action(action)?;
        }
        Ok(builder.build())
    }

    /// Looks up the index of a subject. Unknown names are an error.
    pub fn subject_index(&self, name: &str) -> Result<SubjectIndex> {
        self.subject_index
            .get(name)
            .copied()
            .ok_or_else(|| Error::InvalidSubject(name.to_string()))
    }

    /// Looks up the bit position of an action. Unknown names are an error.
    pub fn action_bit(&self, name: &str) -> Result<ActionBit> {
        self.action_bits
            .get(name)
            .copied()
            .ok_or_else(|| Error::InvalidAction(name.to_string()))
    }

    /// Resolves an index back to its subject name, if the catalog has it.
    pub fn subject_at(&self, index: SubjectIndex) -> Option<&str> {
        self.subjects.get(index.as_usize()).map(String::as_str)
    }

    /// Resolves a bit position back to its action name.
    pub fn action_at(&self, bit: ActionBit) -> Option<&str> {
        self.actions.get(usize::from(bit.position())).map(String::as_str)
    }

    pub fn contains_subject(&self, name: &str) -> bool {
        self.subject_index.contains_key(name)
    }

    /// Subjects in index order.
    pub fn subjects(&self) -> impl Iterator<Item = (SubjectIndex, &str)> {
        self.subjects
            .iter()
            .enumerate()
            .map(|(i, name)| (SubjectIndex::new(i as u32), name.as_str()))
    }

    /// Actions in canonical (bit) order.
    pub fn actions(&self) -> impl Iterator<Item = (ActionBit, &str)> {
        self.actions
            .iter()
            .enumerate()
            .map(|(i, name)| (ActionBit::new(i as u8), name.as_str()))
    }

    pub fn subject_count(&self) -> usize {
        self.subjects.len()
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Mask with every catalog action set.
    pub fn full_mask(&self) -> ActionMask {
        ActionMask::low_bits(self.actions.len() as u32)
    }

    /// Captures the current ordering for later drift checks.
    pub fn snapshot(&self) -> CatalogSnapshot {
        CatalogSnapshot {
            subjects: self.subjects.clone(),
            actions: self.actions.clone(),
        }
    }

    /// Verifies this catalog only appends to `previous`.
    ///
    /// Any reorder, rename, or removal would silently change the meaning of
    /// masks and indices already embedded in issued tokens.
    pub fn ensure_extends(&self, previous: &CatalogSnapshot) -> Result<()> {
        check_prefix("subject", &previous.subjects, &self.subjects)?;
        check_prefix("action", &previous.actions, &self.actions)
    }
}

/// Serializable record of catalog ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub subjects: Vec<String>,
    pub actions: Vec<String>,
}

fn check_prefix(kind: &str, previous: &[String], current: &[String]) -> Result<()> {
    if current.len() < previous.len() {
        return Err(Error::CatalogDrift(format!(
            "{kind} list shrank from {} to {} entries",
            previous.len(),
            current.len()
        )));
    }

    for (position, (old, new)) in previous.iter().zip(current).enumerate() {
        if old != new {
            return Err(Error::CatalogDrift(format!(
                "{kind} at position {position} changed from '{old}' to '{new}'"
            )));
        }
    }

    Ok(())
}

//! Token permission compaction.
//!
//! At issuance, a principal's roles are folded into a sparse
//! `subject index → combined mask` map that travels inside the token:
//!
//! ```text
//! for role in roles:
//!     for binding in role.bindings:
//!         if binding.permission.is_active and subject in catalog:
//!             map[index(subject)] |= binding.bitmask
//! ```
//!
//! OR is commutative and associative, so the result does not depend on the
//! order of roles or bindings.
//!
//! Bindings with an empty mask are skipped rather than written as
//! `map[index] = 0`. Such an entry grants nothing and the decoder drops it
//! anyway, so omitting it keeps tokens smaller without changing any
//! authorization outcome. Stored bindings are never empty in the first place;
//! the check only guards rows handed in by other [`RoleSource`]s.
//!
//! The map is frozen into the token. Permission edits made after issuance
//! do not reach it until the token is reissued; that staleness window is a
//! property of the design, not a defect.

use std::collections::BTreeMap;

use capmask_types::{ActionMask, IdentityId, SubjectIndex, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::PermissionCatalog;
use crate::error::{Error, Result};
use crate::roles::Role;
use crate::store::RoleSource;

/// Sparse subject → mask map embedded in tokens.
///
/// Ordered so the serialized form is deterministic.
pub type SubjectPermissionMap = BTreeMap<SubjectIndex, ActionMask>;

/// Verified token payload as attached to a request.
///
/// Serializes as
/// `{"identity_id":7,"subject_permission_map":{"1":5},"issued_at":...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthIdentity {
    pub identity_id: IdentityId,
    pub subject_permission_map: SubjectPermissionMap,
    pub issued_at: Timestamp,
}

impl AuthIdentity {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Payload(e.to_string()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::Payload(e.to_string()))
    }
}

/// Folds role bindings into a [`SubjectPermissionMap`].
pub struct TokenPermissionCompactor<'a> {
    catalog: &'a PermissionCatalog,
}

impl<'a> TokenPermissionCompactor<'a> {
    pub fn new(catalog: &'a PermissionCatalog) -> Self {
        Self { catalog }
    }

    /// Combines every active, catalog-known binding across `roles`.
    ///
    /// Bindings on inactive permissions, on subjects the catalog does not
    /// know, or with an empty mask contribute nothing.
    pub fn compact(&self, roles: &[Role]) -> SubjectPermissionMap {
        let mut map = SubjectPermissionMap::new();

        for binding in roles.iter().flat_map(|role| &role.bindings) {
            if !binding.permission.is_active || binding.bitmask.is_empty() {
                continue;
            }
            let Ok(index) = self.catalog.subject_index(&binding.permission.subject) else {
                debug!(
                    subject = %binding.permission.subject,
                    binding = %binding.id,
                    "binding skipped: subject not in catalog"
                );
                continue;
            };

            *map.entry(index).or_default() |= binding.bitmask;
        }

        map
    }

    /// Loads `identity`'s roles and builds its token payload.
    pub fn issue<R: RoleSource>(&self, source: &R, identity: IdentityId) -> Result<AuthIdentity> {
        let roles = source.roles_for(identity)?;
        let subject_permission_map = self.compact(&roles);

        debug!(
            identity = %identity,
            roles = roles.len(),
            subjects = subject_permission_map.len(),
            "token permissions compacted"
        );

        Ok(AuthIdentity {
            identity_id: identity,
            subject_permission_map,
            issued_at: Timestamp::now(),
        })
    }
}

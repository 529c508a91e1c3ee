//! Configuration management for capmask
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (CAPMASK_* prefix, highest precedence)
//! 2. capmask.local.toml (gitignored, local overrides)
//! 3. capmask.toml (git-tracked, project config)
//! 4. ~/.config/capmask/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)
//!
//! The catalog lists are order-sensitive: a subject's position is its token
//! index and an action's position is its bit. Append only.

use anyhow::Result;
use capmask::{
    AuthorizationGuard, OperationPolicy, OperationTable, PermissionCatalog, ResyncPolicy,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main capmask configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapmaskConfig {
    pub catalog: CatalogConfig,
    pub guard: GuardConfig,
    pub resync: ResyncConfig,
    pub operations: BTreeMap<String, OperationPolicy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub subjects: Vec<String>,
    pub actions: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            subjects: vec![capmask::ALL_SUBJECTS.to_string()],
            actions: ["CREATE", "READ", "UPDATE", "DELETE"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Log every guard decision.
    pub audit: bool,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self { audit: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResyncConfig {
    pub prune: bool,
    pub protected_subjects: BTreeSet<String>,
}

impl Default for ResyncConfig {
    fn default() -> Self {
        let policy = ResyncPolicy::default();
        Self {
            prune: policy.prune,
            protected_subjects: policy.protected_subjects,
        }
    }
}

impl CapmaskConfig {
    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Read a single TOML file, without merging any other source.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Builds the catalog in configured order.
    pub fn build_catalog(&self) -> Result<PermissionCatalog, ConfigError> {
        PermissionCatalog::from_names(&self.catalog.subjects, &self.catalog.actions)
            .map_err(|e| ConfigError::ValidationError(format!("catalog: {e}")))
    }

    /// Checks the catalog and that every operation names catalog entries only.
    pub fn validate(&self) -> Result<PermissionCatalog, ConfigError> {
        let catalog = self.build_catalog()?;

        for (operation, policy) in &self.operations {
            for requirement in policy.abilities.iter().flatten() {
                if !catalog.contains_subject(&requirement.subject) {
                    return Err(ConfigError::ValidationError(format!(
                        "operation '{operation}' requires unknown subject '{}'",
                        requirement.subject
                    )));
                }
                if let Some(action) = requirement
                    .actions
                    .iter()
                    .find(|action| catalog.action_bit(action).is_err())
                {
                    return Err(ConfigError::ValidationError(format!(
                        "operation '{operation}' requires unknown action '{action}'"
                    )));
                }
            }
        }

        Ok(catalog)
    }

    pub fn operation_table(&self) -> OperationTable {
        self.operations
            .iter()
            .map(|(name, policy)| (name.clone(), policy.clone()))
            .collect()
    }

    pub fn resync_policy(&self) -> ResyncPolicy {
        ResyncPolicy {
            prune: self.resync.prune,
            protected_subjects: self.resync.protected_subjects.clone(),
        }
    }

    /// Guard over `catalog` honoring `[guard] audit`.
    pub fn guard<'a>(&self, catalog: &'a PermissionCatalog) -> AuthorizationGuard<'a> {
        let guard = AuthorizationGuard::new(catalog);
        if self.guard.audit {
            guard
        } else {
            guard.without_audit()
        }
    }
}

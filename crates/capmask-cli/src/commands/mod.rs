//! CLI command implementations.

use anyhow::{Context, Result};
use capmask_config::{CapmaskConfig, Paths};
use std::path::Path;
use tracing::warn;

pub mod catalog;
pub mod check;
pub mod config;
pub mod decode;
pub mod encode;
pub mod version;

/// Where a command reads its configuration from.
pub struct ConfigSource<'a> {
    project: &'a str,
    file: Option<&'a str>,
}

impl<'a> ConfigSource<'a> {
    pub fn new(project: &'a str, file: Option<&'a str>) -> Self {
        Self { project, file }
    }

    /// Loads (and validates) the configuration.
    pub fn load(&self) -> Result<CapmaskConfig> {
        match self.file {
            Some(file) => {
                let config = CapmaskConfig::from_toml_file(file)?;
                config.validate()?;
                Ok(config)
            }
            None => {
                if !Paths::is_initialized(self.project) {
                    warn!(
                        project = %Path::new(self.project).display(),
                        "no capmask.toml in project, using defaults"
                    );
                }
                CapmaskConfig::load_from_dir(self.project).with_context(|| {
                    format!(
                        "Failed to load configuration from {}",
                        Path::new(self.project).display()
                    )
                })
            }
        }
    }

    /// Human-readable origin, for headers.
    pub fn describe(&self) -> String {
        match self.file {
            Some(file) => file.to_string(),
            None => Path::new(self.project).display().to_string(),
        }
    }
}

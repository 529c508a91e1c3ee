//! Dry-run of the authorization guard.

use anyhow::{Context, Result};
use capmask::{AuthIdentity, Decision};

use crate::commands::ConfigSource;
use crate::style::SemanticStyle;

/// Prints `ALLOW` or `DENY <kind>: <message>` and returns whether the
/// operation was allowed.
pub fn run(source: &ConfigSource<'_>, operation: &str, payload: Option<&str>) -> Result<bool> {
    let config = source.load()?;
    let catalog = config.build_catalog()?;
    let table = config.operation_table();

    let identity = payload.map(read_identity).transpose()?;

    let decision = config
        .guard(&catalog)
        .evaluate_operation(&table, operation, identity.as_ref());

    match decision {
        Decision::Allow => {
            println!("{}", "ALLOW".success());
            Ok(true)
        }
        Decision::Deny(denial) => {
            println!(
                "{} {}: {}",
                "DENY".error(),
                denial.kind,
                denial.message
            );
            Ok(false)
        }
    }
}

fn read_identity(path: &str) -> Result<AuthIdentity> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload file {path}"))?;
    AuthIdentity::from_json(&raw).with_context(|| format!("Invalid payload in {path}"))
}

//! Configuration management commands.

use anyhow::Result;

use crate::commands::ConfigSource;
use crate::style::{SemanticStyle, print_error, print_labeled, print_success};

/// Show current configuration.
pub fn show(source: &ConfigSource<'_>, format: &str) -> Result<()> {
    let config = source.load()?;

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{json}");
        }
        "toml" => {
            println!("{}", config.to_toml()?);
        }
        "text" => {
            println!("{}", "capmask Configuration".header());
            println!("=====================\n");

            println!("Catalog:");
            print_labeled("Subjects", &config.catalog.subjects.join(", "));
            print_labeled("Actions", &config.catalog.actions.join(", "));
            println!();

            println!("Guard:");
            print_labeled("Audit", &config.guard.audit.to_string());
            println!();

            println!("Resync:");
            print_labeled("Prune", &config.resync.prune.to_string());
            let protected: Vec<&str> = config
                .resync
                .protected_subjects
                .iter()
                .map(String::as_str)
                .collect();
            print_labeled("Protected subjects", &protected.join(", "));
            println!();

            println!("Operations:");
            for (name, policy) in &config.operations {
                let requirements = match &policy.abilities {
                    None => "no ability declaration".to_string(),
                    Some(groups) if groups.is_empty() => "empty ability list".to_string(),
                    Some(groups) => groups
                        .iter()
                        .map(|g| format!("{}[{}]", g.subject, g.actions.join("+")))
                        .collect::<Vec<_>>()
                        .join(", "),
                };
                let auth = if policy.requires_auth { "auth" } else { "public" };
                print_labeled(name, &format!("{auth}; {requirements}"));
            }
        }
        other => anyhow::bail!("Unknown format '{other}' (expected text, json or toml)"),
    }

    Ok(())
}

/// Validate configuration files.
pub fn validate(source: &ConfigSource<'_>) -> Result<()> {
    println!("Validating configuration in {}...", source.describe());

    match source.load() {
        Ok(config) => {
            print_success(&format!(
                "Configuration is valid ({} subjects, {} actions, {} operations)",
                config.catalog.subjects.len(),
                config.catalog.actions.len(),
                config.operations.len()
            ));
            Ok(())
        }
        Err(e) => {
            print_error(&format!("Configuration validation failed: {e:#}"));
            Err(e)
        }
    }
}

//! Catalog inspection command.

use anyhow::Result;

use crate::commands::ConfigSource;
use crate::style::{SemanticStyle, print_table};

pub fn run(source: &ConfigSource<'_>, format: &str) -> Result<()> {
    let catalog = source.load()?.build_catalog()?;

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&catalog.snapshot())?;
            println!("{json}");
        }
        "text" => {
            println!("{} ({})", "Subjects".header(), source.describe().muted());
            let rows: Vec<Vec<String>> = catalog
                .subjects()
                .map(|(index, name)| vec![index.to_string(), name.to_string()])
                .collect();
            print_table(&["Index", "Subject"], &rows);
            println!();

            println!("{}", "Actions".header());
            let rows: Vec<Vec<String>> = catalog
                .actions()
                .map(|(bit, name)| {
                    vec![
                        bit.position().to_string(),
                        name.to_string(),
                        capmask_types::ActionMask::from_bit(bit).to_string(),
                    ]
                })
                .collect();
            print_table(&["Bit", "Action", "Mask"], &rows);
        }
        other => anyhow::bail!("Unknown format '{other}' (expected text or json)"),
    }

    Ok(())
}

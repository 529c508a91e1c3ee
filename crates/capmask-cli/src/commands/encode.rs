//! Action name → mask.

use anyhow::{Context, Result};
use capmask::codec;

use crate::commands::ConfigSource;

/// Prints the mask as `<decimal> <binary>`.
pub fn run(source: &ConfigSource<'_>, actions: &[String]) -> Result<()> {
    let catalog = source.load()?.build_catalog()?;

    let mask = codec::actions_to_bitmask(&catalog, actions)
        .with_context(|| format!("Cannot encode {}", actions.join(", ")))?;

    println!("{} {mask}", mask.bits());
    Ok(())
}

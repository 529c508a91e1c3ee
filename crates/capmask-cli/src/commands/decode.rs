//! Mask → action names.

use anyhow::{Context, Result};
use capmask::codec;
use capmask_types::ActionMask;

use crate::commands::ConfigSource;
use crate::style::print_warn;

/// Prints one action per line, in catalog order.
pub fn run(source: &ConfigSource<'_>, raw: &str) -> Result<()> {
    let catalog = source.load()?.build_catalog()?;
    let mask = parse_mask(raw)?;

    // Decoding tolerates unknown bits; point them out anyway.
    if codec::validate_mask(&catalog, mask).is_err() {
        let unknown = mask & !catalog.full_mask();
        print_warn(&format!("ignoring bits {unknown} beyond the catalog"));
    }

    for action in codec::bitmask_to_actions(&catalog, mask) {
        println!("{action}");
    }
    Ok(())
}

/// Accepts decimal, `0b` binary or `0x` hexadecimal.
fn parse_mask(raw: &str) -> Result<ActionMask> {
    let trimmed = raw.trim();
    let parsed = if let Some(binary) = trimmed.strip_prefix("0b") {
        u64::from_str_radix(binary, 2)
    } else if let Some(hex) = trimmed.strip_prefix("0x") {
        u64::from_str_radix(hex, 16)
    } else {
        trimmed.parse::<u64>()
    };

    let bits = parsed.with_context(|| format!("Invalid mask '{raw}'"))?;
    Ok(ActionMask::new(bits))
}

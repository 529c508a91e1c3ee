//! Version command implementation.

/// Version information for the CLI.
const VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME: &str = env!("CARGO_BIN_NAME");

pub fn run() {
    println!("{NAME} {VERSION}");
    println!();
    println!("Capability-based authorization with bitmask action sets.");
    println!();
    println!("Build info:");
    println!("  Mask width:   {} actions", capmask_types::MASK_WIDTH);
    println!("  Target:       {}", std::env::consts::ARCH);
    println!("  OS:           {}", std::env::consts::OS);
}

//! capmask command-line tool.
//!
//! Inspects a capability catalog and dry-runs the authorization guard
//! against token payloads.
//!
//! # Quick Start
//!
//! ```bash
//! # Show the catalog from ./capmask.toml
//! capmask catalog
//!
//! # Encode and decode action masks
//! capmask encode CREATE UPDATE
//! capmask decode 0b0101
//!
//! # Would this token be allowed to call orders.create?
//! capmask check orders.create --payload token.json
//! ```

mod commands;
mod style;

use std::io::IsTerminal;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// capmask - capability-based authorization with bitmask action sets.
#[derive(Parser)]
#[command(name = "capmask")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory containing capmask.toml.
    #[arg(short, long, global = true, default_value = ".")]
    project: String,

    /// Read this TOML file only, ignoring every other configuration source.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// Show the subject and action catalog.
    Catalog {
        /// Output format (text, json).
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Encode action names into a mask.
    Encode {
        /// Action names, in any order.
        #[arg(required = true)]
        actions: Vec<String>,
    },

    /// Decode a mask (decimal, 0b or 0x) into action names.
    Decode {
        /// Mask to decode.
        mask: String,
    },

    /// Evaluate an operation against a token payload.
    Check {
        /// Operation name as declared under [operations].
        operation: String,

        /// JSON identity payload file; omit for an anonymous request.
        #[arg(long)]
        payload: Option<String>,
    },

    /// Configuration commands.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the merged configuration.
    Show {
        /// Output format (text, json, toml).
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Validate the configuration.
    Validate,
}

fn main() -> Result<ExitCode> {
    // Initialize logging; stdout is reserved for command output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    style::set_no_color(
        cli.no_color || std::env::var_os("NO_COLOR").is_some() || !std::io::stdout().is_terminal(),
    );

    let source = commands::ConfigSource::new(&cli.project, cli.config.as_deref());

    match cli.command {
        Commands::Version => {
            commands::version::run();
            Ok(ExitCode::SUCCESS)
        }
        Commands::Catalog { format } => commands::catalog::run(&source, &format).map(|()| ExitCode::SUCCESS),
        Commands::Encode { actions } => commands::encode::run(&source, &actions).map(|()| ExitCode::SUCCESS),
        Commands::Decode { mask } => commands::decode::run(&source, &mask).map(|()| ExitCode::SUCCESS),
        Commands::Check { operation, payload } => {
            let allowed = commands::check::run(&source, &operation, payload.as_deref())?;
            Ok(if allowed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show { format } => commands::config::show(&source, &format).map(|()| ExitCode::SUCCESS),
            ConfigCommands::Validate => commands::config::validate(&source).map(|()| ExitCode::SUCCESS),
        },
    }
}

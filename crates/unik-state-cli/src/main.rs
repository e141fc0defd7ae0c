//! unik-state - inspect and maintain a unik state file.
//!
//! Loads the persisted registry, prints it, and performs small repairs
//! (removing a stale entity) through the same store the daemon uses.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::Kind;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use unik_state::StateConfig;

#[derive(Parser, Debug)]
#[command(name = "unik-state")]
#[command(about = "Inspect and maintain a unik state file")]
struct Args {
    /// State file (defaults to $UNIK_STATE_FILE or ~/.unik/state.json)
    #[arg(short, long, global = true)]
    state_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print how many images, instances and volumes are stored
    Summary,
    /// Print one collection as JSON
    List {
        #[arg(value_enum)]
        kind: Kind,
    },
    /// Remove one entity and save the state file
    Remove {
        #[arg(value_enum)]
        kind: Kind,
        id: String,
    },
    /// Write an empty state file
    Init {
        /// Overwrite an existing state file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so command output stays machine-readable
    let default_level = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let path = match args.state_file {
        Some(path) => path,
        None => StateConfig::default_state_path()
            .context("No home directory found; pass --state-file or set UNIK_STATE_FILE")?,
    };
    debug!("Using state file {}", path.display());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match args.command {
        Command::Summary => commands::summary(&path, &mut out),
        Command::List { kind } => commands::list(&path, kind, &mut out),
        Command::Remove { kind, id } => commands::remove(&path, kind, &id),
        Command::Init { force } => commands::init(&path, force),
    }
}

mod cmd;
mod logging;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "mdf", version, about = "File-class schemas and derived fields for markdown vaults")]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    profile: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Validate configuration and print resolved paths
    Doctor,

    /// List templates with their parents and field counts
    Templates,

    /// Run a full pass and print a summary
    Index,

    /// Show the fields of a note with values and statuses
    Fields {
        /// Vault-relative note path (e.g. "Books/Dune.md")
        note: String,
    },

    /// Recompute a lookup or formula field and store the result
    Update {
        /// Vault-relative note path
        note: String,
        /// Field name or id
        field: String,
    },

    /// Check note values against their fields
    Validate {
        /// Only validate this note
        note: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    let config = cli.config.as_deref();
    let profile = cli.profile.as_deref();

    match cli.command {
        Commands::Doctor => cmd::doctor::run(config, profile).await,
        Commands::Templates => cmd::templates::run(config, profile).await,
        Commands::Index => cmd::index::run(config, profile).await,
        Commands::Fields { note } => cmd::fields::run(config, profile, &note).await,
        Commands::Update { note, field } => cmd::update::run(config, profile, &note, &field).await,
        Commands::Validate { note } => cmd::validate::run(config, profile, note.as_deref()).await,
    }
}

//! CLI argument parsing for the registry-importer binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::types::ImportKind;

#[derive(Parser)]
#[command(name = "registry-importer", about = "Community registry bulk CSV importer")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Normalize a CSV file and persist it in one batch
    Import {
        /// Record kind: people, events, attendance or admins
        #[arg(long)]
        kind: ImportKind,
        /// CSV file to import
        #[arg(long)]
        file: PathBuf,
        /// Update existing records instead of failing on conflicts
        #[arg(long)]
        allow_update: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Normalize a CSV file and print the records without persisting them
    Preview {
        #[arg(long)]
        kind: ImportKind,
        #[arg(long)]
        file: PathBuf,
    },
    /// Write the CSV template for a record kind
    Sample {
        #[arg(long)]
        kind: ImportKind,
        /// Output path, `-` for stdout (default: sample_<kind>.csv)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run database migrations and exit (postgres backend)
    Migrate,
}

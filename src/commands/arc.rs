use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Commands for flat .arc archives
#[derive(Subcommand, Debug)]
pub enum ArcCommands {
    Extract(ArcExtractCommand),
}

/// Unpacks every file of a flat .arc archive.
#[derive(Parser, Debug, Clone)]
pub struct ArcExtractCommand {
    /// Path to the .arc archive
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,

    /// Output directory, defaults to the archive's own directory
    #[arg(value_name = "OUTPUT")]
    pub output: Option<PathBuf>,
}

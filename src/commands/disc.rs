use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Commands for ISO9660 / CD-ROM XA disc images
#[derive(Subcommand, Debug)]
pub enum DiscCommands {
    Toc(TocCommand),
    Extract(ExtractCommand),
    ExtractAssets(ExtractAssetsCommand),
}

/// Lists every file resolvable through the ISO9660 directory tree.
#[derive(Parser, Debug, Clone)]
pub struct TocCommand {
    /// Path to the disc image
    #[arg(value_name = "IMAGE")]
    pub image: PathBuf,
}

/// Extracts a single file from the ISO9660 filesystem.
#[derive(Parser, Debug, Clone)]
pub struct ExtractCommand {
    /// Path to the disc image
    #[arg(value_name = "IMAGE")]
    pub image: PathBuf,

    /// Path inside the image, e.g. DATA/FILE.BIN (leading "/" or "./" accepted)
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Output file path, defaults to the file name in the current directory
    #[arg(value_name = "OUTPUT")]
    pub output: Option<PathBuf>,
}

/// Extracts every asset listed in the DATATBL.BIN asset table.
#[derive(Parser, Debug, Clone)]
pub struct ExtractAssetsCommand {
    /// Path to the disc image
    #[arg(value_name = "IMAGE")]
    pub image: PathBuf,

    /// Output directory, defaults to "<image> - extracted" next to the image
    #[arg(value_name = "OUTPUT")]
    pub output: Option<PathBuf>,
}

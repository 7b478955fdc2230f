use crate::commands::arc::ArcCommands;
use crate::commands::disc::DiscCommands;
use clap::{Parser, Subcommand};

pub mod arc;
pub mod disc;

/// CLI for exploring and extracting Graffiti Kingdom disc images and .arc archives.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(subcommand)]
    Disc(DiscCommands),

    #[command(subcommand)]
    Arc(ArcCommands),
}

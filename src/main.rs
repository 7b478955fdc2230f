use crate::commands::arc::ArcCommands;
use crate::commands::disc::DiscCommands;
use crate::commands::{Cli, Commands};
use crate::datatbl::extract_assets;
use crate::iso::IsoImage;
use anyhow::{Context, Result};
use clap::Parser;
use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;
use std::path::{Path, PathBuf};

mod arc;
mod commands;
mod datatbl;
mod iso;

#[tokio::main]
async fn main() -> Result<()> {
    let logger = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .build();

    let level = logger.filter();
    let pb = MultiProgress::new();

    LogWrapper::new(pb.clone(), logger).try_init()?;
    log::set_max_level(level);

    let cli = Cli::parse();

    match cli.command {
        Commands::Disc(inner) => match inner {
            DiscCommands::Toc(cmd) => {
                let image = IsoImage::open(&cmd.image).await?;
                let mut entries: Vec<_> = image.toc().iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                for (path, record) in entries {
                    println!("{:<48} lba {:>7} size {:>10}", path, record.lba, record.size);
                }
            }
            DiscCommands::Extract(cmd) => {
                let mut image = IsoImage::open(&cmd.image).await?;
                let output = match cmd.output {
                    Some(output) => output,
                    None => file_name_of(&cmd.path)?,
                };
                image.extract_path(&cmd.path, &output).await?;
                log::info!("Extracted {} to {}", cmd.path, output.display());
            }
            DiscCommands::ExtractAssets(cmd) => {
                let mut image = IsoImage::open(&cmd.image).await?;
                let output = cmd
                    .output
                    .unwrap_or_else(|| default_output_root(&cmd.image));
                extract_assets(pb.clone(), &mut image, &output).await?;
            }
        },
        Commands::Arc(inner) => match inner {
            ArcCommands::Extract(cmd) => {
                let output = match cmd.output {
                    Some(output) => output,
                    None => cmd
                        .archive
                        .parent()
                        .filter(|p| !p.as_os_str().is_empty())
                        .unwrap_or(Path::new("."))
                        .to_path_buf(),
                };
                arc::extract_archive(&cmd.archive, &output).await?;
            }
        },
    }

    Ok(())
}

/// Last component of a path inside the image, used as the default output
/// name for single-file extraction.
fn file_name_of(inner_path: &str) -> Result<PathBuf> {
    inner_path
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
        .map(PathBuf::from)
        .with_context(|| format!("\"{inner_path}\" has no file name"))
}

/// `<image stem> - extracted`, placed next to the image.
fn default_output_root(image: &Path) -> PathBuf {
    let stem = image.with_extension("");
    let mut name = stem
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "disc".into());
    name.push(" - extracted");
    stem.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_of_takes_last_component() {
        assert_eq!(file_name_of("DATA/FOO.TXT").unwrap(), PathBuf::from("FOO.TXT"));
        assert_eq!(file_name_of("/FOO.TXT").unwrap(), PathBuf::from("FOO.TXT"));
        assert_eq!(file_name_of("A\\B\\C.BIN").unwrap(), PathBuf::from("C.BIN"));
        assert!(file_name_of("DATA/").is_err());
    }

    #[test]
    fn default_output_root_uses_image_stem() {
        assert_eq!(
            default_output_root(Path::new("/tmp/GAME.ISO")),
            PathBuf::from("/tmp/GAME - extracted")
        );
    }
}

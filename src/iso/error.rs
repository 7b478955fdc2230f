use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IsoError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error("Unrecognized disc image format: {0}")]
    UnrecognizedImage(PathBuf),

    #[error("Disc image ends before physical byte {offset:#x}")]
    TruncatedImage { offset: u64 },

    #[error("Malformed directory record at buffer offset {0:#x}")]
    MalformedDirectory(u64),

    #[error("No such file in the disc image: {0}")]
    PathNotFound(String),
}

pub type IsoResult<T> = Result<T, IsoError>;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArcError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    BinRwError(#[from] binrw::Error),

    #[error("Not an .arc archive (expected 0x100 at offset 0, found {0:#x})")]
    BadMagic(u32),

    #[error("Archive record points outside the file (offset {offset:#x}, {len} bytes)")]
    TruncatedArchive { offset: u64, len: u64 },

    #[error("Non-ASCII file name at offset {0:#x}")]
    InvalidName(u64),
}

pub type ArcResult<T> = Result<T, ArcError>;

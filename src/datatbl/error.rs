use crate::iso::error::IsoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataTblError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    IsoError(#[from] IsoError),

    #[error(transparent)]
    BinRwError(#[from] binrw::Error),

    #[error("Required file {0} is not present on the disc")]
    MissingTableFile(&'static str),

    #[error("Unterminated or non-ASCII entry name at table offset {0:#x}")]
    InvalidEntryName(u64),
}

pub type DataTblResult<T> = Result<T, DataTblError>;

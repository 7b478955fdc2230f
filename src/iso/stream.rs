use crate::iso::error::{IsoError, IsoResult};
use crate::iso::sector::{DATA_SECTOR_SIZE, DiscGeometry, SectorLayout, XA_SUBMODE_OFFSET, XaForm};
use std::io::SeekFrom;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, BufReader};

/// Seek/read access to the user data of a disc image, hiding raw sector
/// headers and CD-ROM XA form switching from callers.
///
/// The stream owns a single physical byte cursor into the backing image.
/// For XA images the current sector's user-data window is derived from its
/// submode byte every time a sector boundary is crossed, so no form state
/// survives a seek.
#[derive(Debug)]
pub struct UserDataStream {
    reader: BufReader<File>,
    geometry: DiscGeometry,
    /// Physical byte position in the backing image.
    pos: u64,
}

impl UserDataStream {
    pub fn new(file: File, geometry: DiscGeometry) -> Self {
        Self {
            reader: BufReader::with_capacity(512 * 1024, file),
            geometry,
            pos: 0,
        }
    }

    pub fn geometry(&self) -> &DiscGeometry {
        &self.geometry
    }

    /// Positions the cursor `byte_offset` user-data bytes past the start of
    /// sector `lba`.
    ///
    /// For plain and fixed-window raw layouts this is pure arithmetic. For
    /// XA layouts the user-data size of every intervening sector depends on
    /// that sector's own form bit, so the subheaders are walked sequentially
    /// from `lba` until the offset is consumed.
    pub async fn seek_user(&mut self, lba: u64, byte_offset: u64) -> IsoResult<()> {
        let sector_size = self.geometry.sector_size;

        match self.geometry.layout {
            SectorLayout::RawXa => {
                self.pos = lba * sector_size;
                let mut remaining = byte_offset;
                while remaining > 0 {
                    let (user_start, user_end) = self.sector_window(self.pos).await?;
                    let user_size = user_end - user_start;
                    if remaining >= user_size {
                        self.pos += sector_size;
                        remaining -= user_size;
                    } else {
                        self.pos += user_start + remaining;
                        remaining = 0;
                    }
                }
            }
            _ => {
                // user_start is 0 for plain layouts, so one formula covers
                // both fixed-window cases.
                let user_size = self.geometry.fixed_user_size().unwrap_or(DATA_SECTOR_SIZE);
                let lba = lba + byte_offset / user_size;
                self.pos =
                    lba * sector_size + self.geometry.user_start() + byte_offset % user_size;
            }
        }

        Ok(())
    }

    /// Reads exactly `size` bytes of user data from the current position,
    /// skipping sector headers and trailing EDC/ECC regions as needed.
    pub async fn read_user(&mut self, size: u64) -> IsoResult<Vec<u8>> {
        let mut out = vec![0u8; size as usize];
        let mut filled = 0usize;
        let sector_size = self.geometry.sector_size;

        while filled < out.len() {
            let sector_base = self.pos - self.pos % sector_size;
            let (user_start, user_end) = self.sector_window(sector_base).await?;

            let offset = (self.pos - sector_base).max(user_start);
            if offset >= user_end {
                self.pos = sector_base + sector_size;
                continue;
            }

            let take = (user_end - offset).min((out.len() - filled) as u64) as usize;
            self.read_exact_at(sector_base + offset, &mut out[filled..filled + take])
                .await?;
            filled += take;
            self.pos = sector_base + offset + take as u64;
        }

        Ok(out)
    }

    /// User-data window (start..end offsets within the sector) of the sector
    /// starting at physical offset `sector_base`. For XA layouts this reads
    /// the sector's submode byte to pick Form 1 or Form 2.
    async fn sector_window(&mut self, sector_base: u64) -> IsoResult<(u64, u64)> {
        let user_start = self.geometry.user_start();
        match self.geometry.layout {
            SectorLayout::RawXa => {
                let mut submode = [0u8; 1];
                self.read_exact_at(sector_base + XA_SUBMODE_OFFSET, &mut submode)
                    .await?;
                let form = XaForm::from_submode(submode[0]);
                Ok((user_start, user_start + form.user_size()))
            }
            _ => {
                let user_size = self.geometry.fixed_user_size().unwrap_or(DATA_SECTOR_SIZE);
                Ok((user_start, user_start + user_size))
            }
        }
    }

    async fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> IsoResult<()> {
        self.reader.seek(SeekFrom::Start(offset)).await?;
        self.reader.read_exact(buf).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                IsoError::TruncatedImage { offset }
            } else {
                IsoError::IoError(e)
            }
        })?;
        Ok(())
    }
}

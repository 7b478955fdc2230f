use crate::iso::directory::{
    DirectoryRecord, ROOT_RECORD_OFFSET, ROOT_RECORD_SIZE, Toc, parse_directory_record,
};
use crate::iso::error::{IsoError, IsoResult};
use crate::iso::sector::{DATA_SECTOR_SIZE, DiscGeometry, PVD_LBA, RAW_SECTOR_SIZE, classify};
use crate::iso::stream::UserDataStream;
use async_recursion::async_recursion;
use log::{debug, warn};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt, BufWriter};

pub mod directory;
pub mod error;
pub mod sector;
pub mod stream;

/// An opened disc image: detected geometry, a user-data stream over the
/// backing file and the table of contents built from a full walk of the
/// ISO9660 directory tree.
#[derive(Debug)]
pub struct IsoImage {
    path: PathBuf,
    stream: UserDataStream,
    toc: Toc,
}

impl IsoImage {
    pub async fn open(path: impl AsRef<Path>) -> IsoResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path).await?;

        let pvd_raw =
            read_candidate(&mut file, PVD_LBA * RAW_SECTOR_SIZE, RAW_SECTOR_SIZE as usize)
                .await?;
        let pvd_user =
            read_candidate(&mut file, PVD_LBA * DATA_SECTOR_SIZE, DATA_SECTOR_SIZE as usize)
                .await?;

        let geometry = classify(&pvd_raw, &pvd_user)
            .ok_or_else(|| IsoError::UnrecognizedImage(path.clone()))?;
        debug!("Detected disc geometry: {:?}", geometry);

        let mut stream = UserDataStream::new(file, geometry);

        // Re-read the PVD through the stream so XA subheaders are honored.
        stream.seek_user(PVD_LBA, 0).await?;
        let pvd = stream.read_user(DATA_SECTOR_SIZE).await?;

        let root =
            parse_directory_record(&pvd[ROOT_RECORD_OFFSET..ROOT_RECORD_OFFSET + ROOT_RECORD_SIZE])?;
        debug!("Root directory at LBA {} ({} bytes)", root.lba, root.size);

        stream.seek_user(root.lba as u64, 0).await?;
        let root_buf = stream.read_user(root.size as u64).await?;

        let mut toc = Toc::default();
        walk_directory(&mut stream, &mut toc, &root_buf, "").await?;
        debug!("Table of contents holds {} files", toc.len());

        Ok(Self { path, stream, toc })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn geometry(&self) -> &DiscGeometry {
        self.stream.geometry()
    }

    pub fn toc(&self) -> &Toc {
        &self.toc
    }

    /// Looks up `path` in the table of contents and reads the whole file
    /// into memory.
    pub async fn read_file(&mut self, path: &str) -> IsoResult<Vec<u8>> {
        let record = self.lookup(path)?;
        self.stream.seek_user(record.lba as u64, 0).await?;
        self.stream.read_user(record.size as u64).await
    }

    /// Extracts the file at `path` (any of the three TOC spellings) to
    /// `output`.
    pub async fn extract_path(&mut self, path: &str, output: &Path) -> IsoResult<()> {
        let record = self.lookup(path)?;
        self.extract_to(record.lba as u64, record.size as u64, output)
            .await
    }

    /// Copies `size` user-data bytes starting at sector `lba` to `output`,
    /// creating parent directories as needed.
    pub async fn extract_to(&mut self, lba: u64, size: u64, output: &Path) -> IsoResult<()> {
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).await?;
        }
        let file = File::create(output).await?;
        let mut writer = BufWriter::new(file);
        self.extract_user(lba, size, &mut writer).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Streams `size` user-data bytes starting at sector `lba` into `sink`
    /// in chunks of at most one sector's worth of user data.
    pub async fn extract_user<W>(&mut self, lba: u64, size: u64, sink: &mut W) -> IsoResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        self.stream.seek_user(lba, 0).await?;
        let mut remaining = size;
        while remaining > 0 {
            let chunk = remaining.min(DATA_SECTOR_SIZE);
            let buf = self.stream.read_user(chunk).await?;
            sink.write_all(&buf).await?;
            remaining -= chunk;
        }
        Ok(())
    }

    fn lookup(&self, path: &str) -> IsoResult<DirectoryRecord> {
        self.toc
            .get(path)
            .cloned()
            .ok_or_else(|| IsoError::PathNotFound(path.to_string()))
    }
}

/// Scans one directory buffer, inserting file records into the TOC and
/// recursing into subdirectories afterwards. Directory buffers are padded
/// with zero bytes up to the sector boundary, so a zero length byte ends the
/// scan.
#[async_recursion]
async fn walk_directory(
    stream: &mut UserDataStream,
    toc: &mut Toc,
    dirbuf: &[u8],
    prefix: &str,
) -> IsoResult<()> {
    let mut subdirs = Vec::new();
    let mut offset = 0usize;

    while offset < dirbuf.len() && dirbuf[offset] > 0 {
        let record_len = dirbuf[offset] as usize;
        if offset + record_len > dirbuf.len() {
            warn!(
                "Directory record at offset {:#x} overruns its buffer, skipping the rest of \"{}\"",
                offset, prefix
            );
            break;
        }

        let record = match parse_directory_record(&dirbuf[offset..offset + record_len]) {
            Ok(record) => record,
            Err(e) => {
                warn!("{}, skipping the rest of \"{}\"", e, prefix);
                break;
            }
        };

        if record.is_directory {
            if record.name != "." && record.name != ".." {
                subdirs.push(record);
            }
        } else {
            toc.insert(join_path(prefix, &record.name), record);
        }

        offset += record_len;
    }

    for record in subdirs {
        stream.seek_user(record.lba as u64, 0).await?;
        let buf = stream.read_user(record.size as u64).await?;
        walk_directory(stream, toc, &buf, &join_path(prefix, &record.name)).await?;
    }

    Ok(())
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Reads up to `len` bytes at `offset`; returns fewer if the file ends
/// first. Detection candidates that fall outside a small image simply come
/// back short.
async fn read_candidate(file: &mut File, offset: u64, len: usize) -> IsoResult<Vec<u8>> {
    let mut buf = vec![0u8; len];
    file.seek(SeekFrom::Start(offset)).await?;

    let mut filled = 0usize;
    while filled < len {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    buf.truncate(filled);
    Ok(buf)
}

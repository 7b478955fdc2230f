//! Parser and bulk extractor for the game's `DATATBL.BIN` asset table.
//!
//! The table maps asset names to absolute sector ranges on the disc,
//! bypassing the ISO9660 directory tree. Sector offsets are relative to the
//! location of `CDVDMAP.BIN`, which is resolved through the regular table of
//! contents.

use crate::datatbl::error::{DataTblError, DataTblResult};
use crate::iso::IsoImage;
use crate::iso::error::IsoError;
use crate::iso::sector::DATA_SECTOR_SIZE;
use binrw::BinRead;
use indicatif::{MultiProgress, ProgressBar};
use log::{debug, error, info};
use std::collections::HashMap;
use std::io::{Cursor, Seek, SeekFrom};
use std::path::{Path, PathBuf};

pub mod error;

pub const DATA_TABLE_PATH: &str = "DATATBL.BIN";
pub const SECTOR_MAP_PATH: &str = "CDVDMAP.BIN";

/// Metadata stride of the first table. Its entries are never interpreted,
/// but their total size is needed to find the second table.
const TABLE1_ENTRY_SIZE: u64 = 24;

/// Common header of both tables. Six unknown bytes, two u16 entry counts,
/// two pad bytes, then the offset of the entry metadata relative to the
/// table's own base.
#[derive(Debug, BinRead)]
#[br(little)]
struct TableHeader {
    #[br(pad_before = 0x6)]
    entry_count_a: u16,
    entry_count_b: u16,
    #[br(pad_before = 0x2)]
    metadata_offset: u32,
}

impl TableHeader {
    fn entry_count(&self) -> u32 {
        self.entry_count_a as u32 + self.entry_count_b as u32
    }
}

/// One 32-byte metadata entry of the second table. Only the name offset
/// (+0x00), start sector (+0x08) and sector count (+0x18) matter.
#[derive(Debug, BinRead)]
#[br(little)]
struct RawAssetEntry {
    name_offset: u32,
    #[br(pad_before = 0x4)]
    start_sector: u32,
    #[br(pad_before = 0xC, pad_after = 0x4)]
    sector_count: u32,
}

/// A decoded asset table entry. `start_sector` is relative to the LBA of
/// `CDVDMAP.BIN`; `sector_count` counts whole 2048-byte units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetTableEntry {
    pub name: String,
    pub start_sector: u32,
    pub sector_count: u32,
}

/// Decodes the two-level `DATATBL.BIN` structure into a flat entry list.
///
/// The first table only serves to locate the second: its metadata region
/// ends at `metadata_offset + entry_count * 24`, and the second table starts
/// at the next 16-byte boundary plus a fixed 0x10 header skip. All asset
/// entries come from the second table.
pub fn parse_asset_table(datatbl: &[u8]) -> DataTblResult<Vec<AssetTableEntry>> {
    let mut cursor = Cursor::new(datatbl);

    let table1 = TableHeader::read(&mut cursor)?;
    let table2_base = align16(
        table1.metadata_offset as u64 + table1.entry_count() as u64 * TABLE1_ENTRY_SIZE,
    ) + 0x10;

    cursor.seek(SeekFrom::Start(table2_base))?;
    let table2 = TableHeader::read(&mut cursor)?;
    debug!(
        "Asset table at {:#x} holds {} entries",
        table2_base,
        table2.entry_count()
    );

    cursor.seek(SeekFrom::Start(table2_base + table2.metadata_offset as u64))?;

    let mut entries = Vec::with_capacity(table2.entry_count() as usize);
    for _ in 0..table2.entry_count() {
        let raw = RawAssetEntry::read(&mut cursor)?;
        let name_offset = table2_base + raw.name_offset as u64;
        let raw_name = read_c_string(datatbl, name_offset)?;
        let stem = raw_name.rsplit_once(';').map_or(raw_name, |(stem, _)| stem);
        entries.push(AssetTableEntry {
            name: stem.trim_start_matches(['\\', '/']).to_string(),
            start_sector: raw.start_sector,
            sector_count: raw.sector_count,
        });
    }

    Ok(entries)
}

/// Extracts every entry of the disc's asset table into `out_root`.
///
/// Duplicate names (they do occur) get a `[n]` suffix from the second
/// occurrence on. An entry whose sector range runs past the end of the image
/// is logged and skipped; any other failure aborts.
pub async fn extract_assets(
    progress: MultiProgress,
    image: &mut IsoImage,
    out_root: &Path,
) -> DataTblResult<()> {
    let map_record = image
        .toc()
        .get(SECTOR_MAP_PATH)
        .cloned()
        .ok_or(DataTblError::MissingTableFile(SECTOR_MAP_PATH))?;
    if image.toc().get(DATA_TABLE_PATH).is_none() {
        return Err(DataTblError::MissingTableFile(DATA_TABLE_PATH));
    }

    let datatbl = image.read_file(DATA_TABLE_PATH).await?;
    let entries = parse_asset_table(&datatbl)?;
    info!(
        "Extracting {} assets to {}",
        entries.len(),
        out_root.display()
    );

    let pb = progress.add(ProgressBar::new(entries.len() as u64));
    let mut dupes: HashMap<PathBuf, u32> = HashMap::new();

    for entry in &entries {
        let output = resolve_output_path(out_root.join(entry.name.replace('\\', "/")), &mut dupes);
        let lba = map_record.lba as u64 + entry.start_sector as u64;
        let size = entry.sector_count as u64 * DATA_SECTOR_SIZE;

        match image.extract_to(lba, size, &output).await {
            Ok(()) => debug!("{} -> {}", entry.name, output.display()),
            Err(e @ IsoError::TruncatedImage { .. }) => {
                error!("Skipping {}: {}", entry.name, e);
            }
            Err(e) => return Err(e.into()),
        }
        pb.inc(1);
    }

    pb.finish();
    Ok(())
}

/// Applies the duplicate-name policy: the first write to a path keeps the
/// plain name, every later write to the same path gets a `[n]` suffix with a
/// per-path counter.
fn resolve_output_path(path: PathBuf, dupes: &mut HashMap<PathBuf, u32>) -> PathBuf {
    if !path.exists() {
        return path;
    }

    let count = dupes.entry(path.clone()).or_insert(0);
    *count += 1;

    let mut name = path.into_os_string();
    name.push(format!("[{count}]"));
    PathBuf::from(name)
}

fn align16(value: u64) -> u64 {
    value.div_ceil(16) * 16
}

fn read_c_string(buf: &[u8], offset: u64) -> DataTblResult<&str> {
    let tail = buf
        .get(offset as usize..)
        .ok_or(DataTblError::InvalidEntryName(offset))?;
    let end = tail
        .iter()
        .position(|&b| b == 0)
        .ok_or(DataTblError::InvalidEntryName(offset))?;
    std::str::from_utf8(&tail[..end]).map_err(|_| DataTblError::InvalidEntryName(offset))
}

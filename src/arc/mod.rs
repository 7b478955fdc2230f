//! Extractor for the game's flat `.arc` archives.
//!
//! A single table of 24-byte records, no nesting and no sector addressing:
//! data offset, name length, a compression flag, stored/real sizes and a
//! name-table offset. Compressed members hold a zlib stream that inflates to
//! `real_size` bytes.

use crate::arc::error::{ArcError, ArcResult};
use binrw::BinRead;
use flate2::read::ZlibDecoder;
use log::{debug, info};
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use tokio::fs;

pub mod error;

const ARC_MAGIC: u32 = 0x100;

#[derive(Debug, BinRead)]
#[br(little)]
struct ArcHeader {
    magic: u32,
    file_count: u32,
    metadata_offset: u32,
}

/// One 24-byte archive record. `stored_size` and `real_size` only differ
/// when the compression flag is set.
#[derive(Debug, BinRead)]
#[br(little)]
struct ArcRecord {
    data_offset: u32,
    name_len: u16,
    compressed: u8,
    #[br(pad_before = 0x5)]
    stored_size: u32,
    real_size: u32,
    name_offset: u32,
}

/// Unpacks every member of `archive_path` into `out_dir`, creating
/// intermediate directories as needed.
pub async fn extract_archive(archive_path: &Path, out_dir: &Path) -> ArcResult<()> {
    let arcbuf = fs::read(archive_path).await?;
    let mut cursor = Cursor::new(arcbuf.as_slice());

    let header = ArcHeader::read(&mut cursor)?;
    if header.magic != ARC_MAGIC {
        return Err(ArcError::BadMagic(header.magic));
    }
    info!(
        "{} holds {} files",
        archive_path.display(),
        header.file_count
    );

    cursor.seek(SeekFrom::Start(header.metadata_offset as u64))?;
    for _ in 0..header.file_count {
        let record = ArcRecord::read(&mut cursor)?;
        let name = member_name(&arcbuf, &record)?;
        let data = member_data(&arcbuf, &record)?;

        let output = out_dir.join(&name);
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&output, &data).await?;
        debug!("{} ({} bytes)", name, data.len());
    }

    Ok(())
}

fn member_name(arcbuf: &[u8], record: &ArcRecord) -> ArcResult<String> {
    let offset = record.name_offset as u64;
    let raw = slice(arcbuf, offset, record.name_len as u64)?;
    let name = std::str::from_utf8(raw).map_err(|_| ArcError::InvalidName(offset))?;
    if !name.is_ascii() {
        return Err(ArcError::InvalidName(offset));
    }
    Ok(name.replace('\\', "/"))
}

fn member_data(arcbuf: &[u8], record: &ArcRecord) -> ArcResult<Vec<u8>> {
    let offset = record.data_offset as u64;
    if record.compressed != 0 {
        let stored = slice(arcbuf, offset, record.stored_size as u64)?;
        let mut data = Vec::with_capacity(record.real_size as usize);
        ZlibDecoder::new(stored).read_to_end(&mut data)?;
        Ok(data)
    } else {
        Ok(slice(arcbuf, offset, record.real_size as u64)?.to_vec())
    }
}

fn slice(arcbuf: &[u8], offset: u64, len: u64) -> ArcResult<&[u8]> {
    arcbuf
        .get(offset as usize..(offset + len) as usize)
        .ok_or(ArcError::TruncatedArchive { offset, len })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;
    use tempfile::tempdir;

    fn put_u32(buf: &mut Vec<u8>, offset: usize, value: u32) {
        buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn push_record(
        buf: &mut Vec<u8>,
        data_offset: u32,
        name: &str,
        name_offset: u32,
        compressed: bool,
        stored_size: u32,
        real_size: u32,
    ) {
        let mut record = [0u8; 24];
        record[0x00..0x04].copy_from_slice(&data_offset.to_le_bytes());
        record[0x04..0x06].copy_from_slice(&(name.len() as u16).to_le_bytes());
        record[0x06] = compressed as u8;
        record[0x0C..0x10].copy_from_slice(&stored_size.to_le_bytes());
        record[0x10..0x14].copy_from_slice(&real_size.to_le_bytes());
        record[0x14..0x18].copy_from_slice(&name_offset.to_le_bytes());
        buf.extend_from_slice(&record);
    }

    /// Archive with a stored member and a zlib-compressed member inside a
    /// subdirectory.
    fn synthetic_archive() -> Vec<u8> {
        let plain = b"plain contents".to_vec();
        let secret = b"zlib round trip payload".to_vec();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&secret).unwrap();
        let packed = encoder.finish().unwrap();

        let mut buf = vec![0u8; 12];
        put_u32(&mut buf, 0x00, ARC_MAGIC);
        put_u32(&mut buf, 0x04, 2);

        let name1 = "A.TXT";
        let name2 = "SUB\\B.BIN";
        let names_offset = buf.len() as u32;
        buf.extend_from_slice(name1.as_bytes());
        buf.extend_from_slice(name2.as_bytes());

        let data1_offset = buf.len() as u32;
        buf.extend_from_slice(&plain);
        let data2_offset = buf.len() as u32;
        buf.extend_from_slice(&packed);

        let metadata_offset = buf.len() as u32;
        put_u32(&mut buf, 0x08, metadata_offset);
        push_record(
            &mut buf,
            data1_offset,
            name1,
            names_offset,
            false,
            plain.len() as u32,
            plain.len() as u32,
        );
        push_record(
            &mut buf,
            data2_offset,
            name2,
            names_offset + name1.len() as u32,
            true,
            packed.len() as u32,
            secret.len() as u32,
        );
        buf
    }

    #[tokio::test]
    async fn extracts_stored_and_compressed_members() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("TEST.ARC");
        std::fs::write(&archive, synthetic_archive()).unwrap();

        extract_archive(&archive, dir.path()).await.unwrap();

        assert_eq!(
            std::fs::read(dir.path().join("A.TXT")).unwrap(),
            b"plain contents"
        );
        assert_eq!(
            std::fs::read(dir.path().join("SUB/B.BIN")).unwrap(),
            b"zlib round trip payload"
        );
    }

    #[tokio::test]
    async fn rejects_bad_magic() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("BAD.ARC");
        let mut buf = synthetic_archive();
        buf[0x00] = 0x42;
        std::fs::write(&archive, buf).unwrap();

        let err = extract_archive(&archive, dir.path()).await.unwrap_err();
        assert!(matches!(err, ArcError::BadMagic(_)));
    }

    #[tokio::test]
    async fn rejects_record_outside_file() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("SHORT.ARC");
        let mut buf = synthetic_archive();
        // Point the first record's data far past the end of the archive.
        let metadata_offset =
            u32::from_le_bytes(buf[0x08..0x0C].try_into().unwrap()) as usize;
        put_u32(&mut buf, metadata_offset, 0x0100_0000);
        std::fs::write(&archive, buf).unwrap();

        let err = extract_archive(&archive, dir.path()).await.unwrap_err();
        assert!(matches!(err, ArcError::TruncatedArchive { .. }));
    }
}

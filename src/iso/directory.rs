use crate::iso::error::{IsoError, IsoResult};
use byteorder::{ByteOrder, LittleEndian};
use std::collections::HashMap;

/// Offset of the root directory record within the Primary Volume Descriptor.
pub const ROOT_RECORD_OFFSET: usize = 0x9C;
pub const ROOT_RECORD_SIZE: usize = 34;

/// A directory record needs at least 33 bytes of fixed fields before the name.
const MIN_RECORD_SIZE: usize = 33;

const FLAG_DIRECTORY: u8 = 0b10;

/// One ISO9660 directory record, with the name already normalized: the
/// special bytes 0x00/0x01 become `.`/`..` and any `;version` suffix is
/// stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRecord {
    /// Bytes this record occupied in its directory buffer.
    pub record_len: u8,
    pub lba: u32,
    pub size: u32,
    pub is_directory: bool,
    pub name: String,
}

pub fn parse_directory_record(buf: &[u8]) -> IsoResult<DirectoryRecord> {
    if buf.len() < MIN_RECORD_SIZE {
        return Err(IsoError::MalformedDirectory(buf.len() as u64));
    }

    let record_len = buf[0x00];
    let lba = LittleEndian::read_u32(&buf[0x02..0x06]);
    let size = LittleEndian::read_u32(&buf[0x0A..0x0E]);
    let flags = buf[0x19];
    let name_len = buf[0x20] as usize;

    if buf.len() < 0x21 + name_len {
        return Err(IsoError::MalformedDirectory(0x21));
    }

    let raw_name = &buf[0x21..0x21 + name_len];
    let name = match raw_name {
        [0x00] => ".".to_string(),
        [0x01] => "..".to_string(),
        _ => {
            let name = std::str::from_utf8(raw_name)
                .map_err(|_| IsoError::MalformedDirectory(0x21))?;
            name.rsplit_once(';').map_or(name, |(stem, _)| stem).to_string()
        }
    };

    Ok(DirectoryRecord {
        record_len,
        lba,
        size,
        is_directory: flags & FLAG_DIRECTORY != 0,
        name,
    })
}

/// Table of contents of the ISO9660 filesystem: normalized path -> record.
///
/// Paths are stored once, in relative forward-slash form; lookups accept the
/// relative (`DIR/FILE.BIN`), absolute (`/DIR/FILE.BIN`) and dot-relative
/// (`./DIR/FILE.BIN`) spellings alike.
#[derive(Debug, Default)]
pub struct Toc {
    entries: HashMap<String, DirectoryRecord>,
}

impl Toc {
    pub fn insert(&mut self, path: String, record: DirectoryRecord) {
        self.entries.insert(path, record);
    }

    pub fn get(&self, path: &str) -> Option<&DirectoryRecord> {
        self.entries.get(normalize_path(path))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DirectoryRecord)> {
        self.entries.iter().map(|(path, record)| (path.as_str(), record))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize_path(path: &str) -> &str {
    let path = path.strip_prefix("./").unwrap_or(path);
    path.trim_start_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_bytes(lba: u32, size: u32, flags: u8, name: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; 0x21 + name.len()];
        buf[0x00] = buf.len() as u8;
        buf[0x02..0x06].copy_from_slice(&lba.to_le_bytes());
        buf[0x0A..0x0E].copy_from_slice(&size.to_le_bytes());
        buf[0x19] = flags;
        buf[0x20] = name.len() as u8;
        buf[0x21..].copy_from_slice(name);
        buf
    }

    #[test]
    fn parses_file_record_and_strips_version() {
        let buf = record_bytes(20, 5, 0, b"FOO.TXT;1");
        let record = parse_directory_record(&buf).unwrap();
        assert_eq!(record.lba, 20);
        assert_eq!(record.size, 5);
        assert!(!record.is_directory);
        assert_eq!(record.name, "FOO.TXT");
    }

    #[test]
    fn parses_special_names() {
        let this = parse_directory_record(&record_bytes(18, 2048, 0b10, &[0x00])).unwrap();
        assert_eq!(this.name, ".");
        assert!(this.is_directory);

        let parent = parse_directory_record(&record_bytes(18, 2048, 0b10, &[0x01])).unwrap();
        assert_eq!(parent.name, "..");
    }

    #[test]
    fn rejects_short_buffer() {
        let err = parse_directory_record(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, IsoError::MalformedDirectory(_)));
    }

    #[test]
    fn rejects_name_overrunning_buffer() {
        let mut buf = record_bytes(1, 1, 0, b"A");
        buf[0x20] = 40;
        let err = parse_directory_record(&buf).unwrap_err();
        assert!(matches!(err, IsoError::MalformedDirectory(_)));
    }

    #[test]
    fn toc_accepts_all_three_path_spellings() {
        let record = parse_directory_record(&record_bytes(20, 5, 0, b"FOO.TXT;1")).unwrap();
        let mut toc = Toc::default();
        toc.insert("DATA/FOO.TXT".to_string(), record.clone());

        for spelling in ["DATA/FOO.TXT", "/DATA/FOO.TXT", "./DATA/FOO.TXT"] {
            let found = toc.get(spelling).unwrap();
            assert_eq!(found.lba, 20);
            assert_eq!(found.size, 5);
        }
        assert!(toc.get("DATA/MISSING.TXT").is_none());
    }
}

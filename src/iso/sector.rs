//! Physical sector geometry and image format detection.
//!
//! A disc image may store 2352-byte raw sectors (plain CD-ROM or CD-ROM XA)
//! or just the 2048-byte user data of each sector. Detection inspects the
//! sector at LBA 16, which must hold the ISO9660 Primary Volume Descriptor.

pub const RAW_SECTOR_SIZE: u64 = 2352;
pub const DATA_SECTOR_SIZE: u64 = 2048;
pub const MODE2_USER_SIZE: u64 = 2336;
pub const XA_FORM2_USER_SIZE: u64 = 2324;

pub const PVD_LBA: u64 = 16;
const PVD_MAGIC: &[u8; 6] = b"\x01CD001";

const SYNC_PATTERN: [u8; 12] = [
    0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00,
];

const RAW_USER_START: u64 = 0x10;
const XA_USER_START: u64 = 0x18;

/// Offset of the XA submode byte within a raw sector (second byte of the
/// 8-byte subheader at 0x10).
pub const XA_SUBMODE_OFFSET: u64 = 0x12;
const XA_FORM2_BIT: u8 = 0x20;

/// How user data is laid out within each physical sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorLayout {
    /// 2048-byte sectors holding user data only (plain ISO, DVD-style dump).
    Plain,
    /// 2352-byte raw sectors with a fixed user-data window per sector
    /// (Mode 1 -> 2048 bytes, Mode 2 non-XA -> 2336 bytes).
    Raw { user_size: u64 },
    /// 2352-byte raw CD-ROM XA sectors. The user-data window is 2048 bytes
    /// (Form 1) or 2324 bytes (Form 2) and may change from sector to sector,
    /// so it has to be re-read from each sector's own subheader.
    RawXa,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscGeometry {
    pub sector_size: u64,
    pub layout: SectorLayout,
}

impl DiscGeometry {
    /// Offset of the user-data window within each physical sector.
    pub fn user_start(&self) -> u64 {
        match self.layout {
            SectorLayout::Plain => 0,
            SectorLayout::Raw { .. } => RAW_USER_START,
            SectorLayout::RawXa => XA_USER_START,
        }
    }

    /// User-data bytes per sector, unless the layout is XA where the size
    /// depends on each sector's form.
    pub fn fixed_user_size(&self) -> Option<u64> {
        match self.layout {
            SectorLayout::Plain => Some(DATA_SECTOR_SIZE),
            SectorLayout::Raw { user_size } => Some(user_size),
            SectorLayout::RawXa => None,
        }
    }

    pub fn is_raw(&self) -> bool {
        !matches!(self.layout, SectorLayout::Plain)
    }
}

/// CD-ROM XA sector form, derived from the submode byte of a sector's
/// subheader. Never cached across sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XaForm {
    Form1,
    Form2,
}

impl XaForm {
    pub fn from_submode(submode: u8) -> Self {
        if submode & XA_FORM2_BIT == 0 {
            XaForm::Form1
        } else {
            XaForm::Form2
        }
    }

    pub fn user_size(self) -> u64 {
        match self {
            XaForm::Form1 => DATA_SECTOR_SIZE,
            XaForm::Form2 => XA_FORM2_USER_SIZE,
        }
    }
}

/// Checks the 12-byte sync pattern, the BCD MM:SS:FF timecode and the mode
/// byte of a raw sector header.
pub fn is_raw_sector(buf: &[u8]) -> bool {
    if buf.len() < 0x10 || buf[0x00..0x0C] != SYNC_PATTERN {
        return false;
    }

    let mm = buf[0x0C];
    if (mm >> 4) & 0x0F > 9 || mm & 0x0F > 9 {
        return false;
    }

    let ss = buf[0x0D];
    if (ss >> 4) & 0x0F > 5 || ss & 0x0F > 9 {
        return false;
    }

    let ff = buf[0x0E];
    if (ff >> 4) & 0x0F > 7
        || ff & 0x0F > 9
        || ((ff >> 4) & 0x0F == 7 && ff & 0x0F > 4)
    {
        return false;
    }

    buf[0x0F] <= 2
}

/// Checks for the Primary Volume Descriptor signature at the start of a
/// 2048-byte user-data buffer.
pub fn is_pvd(buf: &[u8]) -> bool {
    buf.len() == DATA_SECTOR_SIZE as usize && buf[0x00..0x06] == PVD_MAGIC[..]
}

/// Classifies a disc image from the two PVD candidates: the 2352 bytes at
/// physical offset 16*2352 (`pvd_raw`) and the 2048 bytes at 16*2048
/// (`pvd_user`). Either slice may be short if the image is small; a short
/// candidate simply fails its check.
pub fn classify(pvd_raw: &[u8], pvd_user: &[u8]) -> Option<DiscGeometry> {
    if pvd_raw.len() >= RAW_SECTOR_SIZE as usize && is_raw_sector(pvd_raw) {
        if is_pvd(&pvd_raw[0x10..0x810]) {
            match pvd_raw[0x0F] {
                1 => {
                    return Some(DiscGeometry {
                        sector_size: RAW_SECTOR_SIZE,
                        layout: SectorLayout::Raw {
                            user_size: DATA_SECTOR_SIZE,
                        },
                    });
                }
                2 => {
                    return Some(DiscGeometry {
                        sector_size: RAW_SECTOR_SIZE,
                        layout: SectorLayout::Raw {
                            user_size: MODE2_USER_SIZE,
                        },
                    });
                }
                _ => {}
            }
        }

        if is_pvd(&pvd_raw[0x18..0x818]) {
            return Some(DiscGeometry {
                sector_size: RAW_SECTOR_SIZE,
                layout: SectorLayout::RawXa,
            });
        }
    }

    if pvd_user.len() >= DATA_SECTOR_SIZE as usize
        && is_pvd(&pvd_user[..DATA_SECTOR_SIZE as usize])
    {
        return Some(DiscGeometry {
            sector_size: DATA_SECTOR_SIZE,
            layout: SectorLayout::Plain,
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_sector(mode: u8, pvd_offset: usize) -> Vec<u8> {
        let mut buf = vec![0u8; RAW_SECTOR_SIZE as usize];
        buf[0x00..0x0C].copy_from_slice(&SYNC_PATTERN);
        buf[0x0C] = 0x00; // minutes
        buf[0x0D] = 0x02; // seconds
        buf[0x0E] = 0x16; // frames
        buf[0x0F] = mode;
        buf[pvd_offset..pvd_offset + 6].copy_from_slice(PVD_MAGIC);
        buf
    }

    fn user_pvd() -> Vec<u8> {
        let mut buf = vec![0u8; DATA_SECTOR_SIZE as usize];
        buf[0x00..0x06].copy_from_slice(PVD_MAGIC);
        buf
    }

    #[test]
    fn classifies_raw_mode1() {
        let geometry = classify(&raw_sector(1, 0x10), &[]).unwrap();
        assert_eq!(geometry.sector_size, RAW_SECTOR_SIZE);
        assert_eq!(geometry.layout, SectorLayout::Raw { user_size: 2048 });
        assert_eq!(geometry.user_start(), 0x10);
    }

    #[test]
    fn classifies_raw_mode2_non_xa() {
        let geometry = classify(&raw_sector(2, 0x10), &[]).unwrap();
        assert_eq!(geometry.layout, SectorLayout::Raw { user_size: 2336 });
    }

    #[test]
    fn classifies_raw_xa() {
        let geometry = classify(&raw_sector(2, 0x18), &[]).unwrap();
        assert_eq!(geometry.layout, SectorLayout::RawXa);
        assert_eq!(geometry.user_start(), 0x18);
        assert_eq!(geometry.fixed_user_size(), None);
    }

    #[test]
    fn classifies_user_data_only() {
        let geometry = classify(&[], &user_pvd()).unwrap();
        assert_eq!(geometry.sector_size, DATA_SECTOR_SIZE);
        assert_eq!(geometry.layout, SectorLayout::Plain);
        assert!(!geometry.is_raw());
    }

    #[test]
    fn rejects_missing_sync_pattern() {
        // PVD signature in the right place, but no sync pattern: must not be
        // treated as a raw image.
        let mut buf = vec![0u8; RAW_SECTOR_SIZE as usize];
        buf[0x10..0x16].copy_from_slice(PVD_MAGIC);
        assert!(!is_raw_sector(&buf));
        assert_eq!(classify(&buf, &[]), None);
    }

    #[test]
    fn rejects_invalid_bcd_timecode() {
        let mut buf = raw_sector(1, 0x10);
        buf[0x0C] = 0x0A; // minutes low nibble > 9
        assert!(!is_raw_sector(&buf));

        let mut buf = raw_sector(1, 0x10);
        buf[0x0E] = 0x75; // frame 75, past the 0..=74 range
        assert!(!is_raw_sector(&buf));
    }

    #[test]
    fn rejects_mode_above_two() {
        let buf = raw_sector(3, 0x10);
        assert!(!is_raw_sector(&buf));
        assert_eq!(classify(&buf, &[]), None);
    }

    #[test]
    fn xa_form_from_submode() {
        assert_eq!(XaForm::from_submode(0x00), XaForm::Form1);
        assert_eq!(XaForm::from_submode(0x08), XaForm::Form1);
        assert_eq!(XaForm::from_submode(0x20), XaForm::Form2);
        assert_eq!(XaForm::Form1.user_size(), 2048);
        assert_eq!(XaForm::Form2.user_size(), 2324);
    }
}

//! Dense-indexed databases (V5)
//!
//! A fixed 96-byte header followed by one u32 offset per identifier. The
//! identifier is the array index; a stored 0 means "no mapping", which makes
//! a genuine zero offset unrepresentable. The file is mapped in place.

use std::path::Path;

use addrlib_common::{FormatTag, NAME_FIELD_LEN, V5_HEADER_SIZE};
use log::info;

use super::{header_count, name_from_bytes, ByteReader};
use crate::domain::{AddrLibError, Result, Version};
use crate::mapping::{MappingStore, SharedRegion};

/// Header of a dense-indexed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenseHeader {
    pub version: Version,
    pub name: String,
    pub pointer_size: u32,
    pub data_format: i32,
    pub offset_count: usize,
}

impl DenseHeader {
    /// Parse the full header, format tag included.
    ///
    /// # Errors
    /// Returns an error if the header is truncated, the tag is not 5, or a
    /// size field is negative
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(data);
        let tag = r.u32("format tag")?;
        if FormatTag::from_raw(tag) != Some(FormatTag::V5) {
            return Err(AddrLibError::UnsupportedFormat(tag));
        }

        let version = Version::from_words(r.version_words()?);
        let name = name_from_bytes(r.bytes(NAME_FIELD_LEN, "name")?);
        let pointer_size = header_count(r.i32("pointer size")?, "pointer size")? as u32;
        let data_format = r.i32("data format")?;
        let offset_count = header_count(r.i32("offset count")?, "offset count")?;
        debug_assert_eq!(r.position(), V5_HEADER_SIZE);

        Ok(Self { version, name, pointer_size, data_format, offset_count })
    }

    /// Produce a complete V5 image with `offsets` as the slot array.
    ///
    /// # Panics
    /// Panics if the name does not fit the name field or there are more than
    /// `i32::MAX` slots
    #[must_use]
    pub fn encode_file(&self, offsets: &[u32]) -> Vec<u8> {
        assert!(self.name.len() < NAME_FIELD_LEN, "name too long for header");

        let mut out = Vec::with_capacity(V5_HEADER_SIZE + offsets.len() * 4);
        out.extend_from_slice(&5i32.to_le_bytes());
        for component in self.version.0 {
            out.extend_from_slice(&u32::from(component).to_le_bytes());
        }
        let mut name = [0u8; NAME_FIELD_LEN];
        name[..self.name.len()].copy_from_slice(self.name.as_bytes());
        out.extend_from_slice(&name);
        out.extend_from_slice(&(self.pointer_size as i32).to_le_bytes());
        out.extend_from_slice(&self.data_format.to_le_bytes());
        let count = i32::try_from(offsets.len()).expect("slot count fits i32");
        out.extend_from_slice(&count.to_le_bytes());
        for offset in offsets {
            out.extend_from_slice(&offset.to_le_bytes());
        }
        out
    }
}

/// Map a dense-indexed file whose header names exactly `running`.
///
/// # Errors
/// Returns an error if the file cannot be mapped, its header is malformed or
/// names another version, or it holds fewer slots than the header claims
pub fn load(path: &Path, running: Version) -> Result<(MappingStore, DenseHeader)> {
    from_region(SharedRegion::map_file(path)?, running)
}

/// Use an already-mapped dense-indexed file as the store.
///
/// # Errors
/// Same as [`load`], minus the mapping itself
pub fn from_region(region: SharedRegion, running: Version) -> Result<(MappingStore, DenseHeader)> {
    let header = DenseHeader::parse(region.bytes())?;

    if header.version != running {
        return Err(AddrLibError::VersionMismatch { expected: running, actual: header.version });
    }

    info!(
        "Dense table '{}' mapped: {} slots, pointer size {}",
        header.name, header.offset_count, header.pointer_size
    );

    let store = MappingStore::dense(region, V5_HEADER_SIZE, header.offset_count)?;
    Ok((store, header))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> DenseHeader {
        DenseHeader {
            version: Version::new(1, 6, 1170, 0),
            name: "SkyrimSE.exe".to_string(),
            pointer_size: 8,
            data_format: 0,
            offset_count: 0,
        }
    }

    fn write(dir: &tempfile::TempDir, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join("versionlib-1-6-1170-0.bin");
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_header_layout() {
        let bytes = header().encode_file(&[1, 2, 3]);
        assert_eq!(bytes.len(), V5_HEADER_SIZE + 12);
        let parsed = DenseHeader::parse(&bytes).unwrap();
        assert_eq!(parsed.offset_count, 3);
        assert_eq!(parsed.name, "SkyrimSE.exe");
        assert_eq!(parsed.version, Version::new(1, 6, 1170, 0));
    }

    #[test]
    fn test_load_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, &header().encode_file(&[0, 0x1000, 0, 0x3000]));

        let (store, h) = load(&path, Version::new(1, 6, 1170, 0)).unwrap();
        assert_eq!(h.offset_count, 4);
        assert_eq!(store.find(1), Some(0x1000));
        assert_eq!(store.find(3), Some(0x3000));
        // A stored zero is a miss, not a zero offset
        assert_eq!(store.find(0), None);
        assert_eq!(store.find(2), None);
        // Past the end
        assert_eq!(store.find(4), None);
    }

    #[test]
    fn test_version_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, &header().encode_file(&[1]));

        let err = load(&path, Version::new(1, 6, 640, 0)).unwrap_err();
        assert!(matches!(err, AddrLibError::VersionMismatch { .. }));
    }

    #[test]
    fn test_slot_array_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = header().encode_file(&[1, 2]);
        bytes.truncate(bytes.len() - 2);
        let path = write(&dir, &bytes);

        let err = load(&path, Version::new(1, 6, 1170, 0)).unwrap_err();
        assert!(matches!(err, AddrLibError::Truncated { .. }));
    }

    #[test]
    fn test_wrong_tag() {
        let mut bytes = header().encode_file(&[]);
        bytes[0] = 2;
        assert!(matches!(DenseHeader::parse(&bytes), Err(AddrLibError::UnsupportedFormat(2))));
    }
}

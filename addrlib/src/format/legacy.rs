//! Legacy-packed databases (V0)
//!
//! The file is already the lookup table: an 8-byte entry count followed by
//! that many [`MappingEntry`] records sorted by identifier. It is mapped
//! read-only and used as is.

use std::path::Path;

use addrlib_common::{MappingEntry, LEGACY_COUNT_SIZE};

use super::ByteReader;
use crate::domain::{AddrLibError, Result};
use crate::mapping::{MappingStore, SharedRegion};

/// Map a legacy-packed file as an ordered store.
///
/// # Errors
/// Returns an error if the file cannot be mapped or is shorter than its
/// entry count claims
pub fn load(path: &Path) -> Result<MappingStore> {
    let region = SharedRegion::map_file(path)?;
    let count = ByteReader::new(region.bytes()).u64("entry count")?;
    let count = usize::try_from(count)
        .map_err(|_| AddrLibError::MalformedHeader(format!("entry count {count} is too large")))?;

    MappingStore::ordered(region, LEGACY_COUNT_SIZE, count)
}

/// Produce a legacy-packed image. Entries are written in the given order.
#[must_use]
pub fn encode(entries: &[MappingEntry]) -> Vec<u8> {
    let mut out = Vec::with_capacity(LEGACY_COUNT_SIZE + entries.len() * MappingEntry::SIZE);
    out.extend_from_slice(&(entries.len() as u64).to_le_bytes());
    for entry in entries {
        out.extend_from_slice(&entry.to_le_bytes());
    }
    out
}

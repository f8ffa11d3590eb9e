//! Identifier → offset lookup over a mapped region
//!
//! The store never copies the region: ordered entries and dense slots are
//! decoded from little-endian bytes on each access, so lookups allocate
//! nothing and work for both in-place file maps and populated regions.

use addrlib_common::{MappingEntry, V5_SLOT_SIZE};

use super::region::SharedRegion;
use crate::domain::{AddrLibError, Result};

/// Entries sorted ascending by identifier, searched by bisection
#[derive(Debug)]
pub struct OrderedTable {
    region: SharedRegion,
    start: usize,
    len: usize,
}

impl OrderedTable {
    /// Wrap `len` entries starting `start` bytes into `region`.
    ///
    /// # Errors
    /// Returns an error if the region is too short to hold them
    pub fn new(region: SharedRegion, start: usize, len: usize) -> Result<Self> {
        let needed = table_end(start, len, MappingEntry::SIZE)?;
        if region.len() < needed {
            return Err(AddrLibError::Truncated {
                what: "mapping entries",
                needed,
                available: region.len(),
            });
        }
        Ok(Self { region, start, len })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Entry at `index`, which must be below `len()`.
    #[must_use]
    pub fn entry(&self, index: usize) -> MappingEntry {
        let at = self.start + index * MappingEntry::SIZE;
        let mut raw = [0u8; MappingEntry::SIZE];
        raw.copy_from_slice(&self.region.bytes()[at..at + MappingEntry::SIZE]);
        MappingEntry::from_le_bytes(raw)
    }

    /// Exact-match search. With repeated identifiers the one stored last wins.
    #[must_use]
    pub fn find(&self, id: u64) -> Option<u64> {
        // Number of entries with entry.id <= id
        let (mut lo, mut hi) = (0, self.len);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.entry(mid).id <= id {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }

        if lo == 0 {
            return None;
        }
        let candidate = self.entry(lo - 1);
        (candidate.id == id).then_some(candidate.offset)
    }

    pub fn iter(&self) -> impl Iterator<Item = MappingEntry> + '_ {
        (0..self.len).map(move |i| self.entry(i))
    }
}

/// Offsets indexed directly by identifier; a stored 0 means unmapped
#[derive(Debug)]
pub struct DenseTable {
    region: SharedRegion,
    start: usize,
    len: usize,
}

impl DenseTable {
    /// Wrap `len` u32 slots starting `start` bytes into `region`.
    ///
    /// # Errors
    /// Returns an error if the region is too short to hold them
    pub fn new(region: SharedRegion, start: usize, len: usize) -> Result<Self> {
        let needed = table_end(start, len, V5_SLOT_SIZE)?;
        if region.len() < needed {
            return Err(AddrLibError::Truncated {
                what: "offset slots",
                needed,
                available: region.len(),
            });
        }
        Ok(Self { region, start, len })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Raw slot value, 0 when out of range.
    #[must_use]
    pub fn slot(&self, index: usize) -> u32 {
        if index >= self.len {
            return 0;
        }
        let at = self.start + index * V5_SLOT_SIZE;
        let mut raw = [0u8; V5_SLOT_SIZE];
        raw.copy_from_slice(&self.region.bytes()[at..at + V5_SLOT_SIZE]);
        u32::from_le_bytes(raw)
    }

    /// Offset for `id`; out-of-range identifiers and zero slots are misses.
    #[must_use]
    pub fn find(&self, id: u64) -> Option<u64> {
        let index = usize::try_from(id).ok()?;
        match self.slot(index) {
            0 => None,
            offset => Some(u64::from(offset)),
        }
    }

    /// Every mapped slot as an entry, in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = MappingEntry> + '_ {
        (0..self.len).filter_map(move |i| match self.slot(i) {
            0 => None,
            offset => Some(MappingEntry::new(i as u64, u64::from(offset))),
        })
    }
}

/// The one lookup structure a loaded database owns
#[derive(Debug)]
pub enum MappingStore {
    Ordered(OrderedTable),
    Dense(DenseTable),
}

impl MappingStore {
    /// # Errors
    /// Returns an error if the region is too short for `len` entries
    pub fn ordered(region: SharedRegion, start: usize, len: usize) -> Result<Self> {
        OrderedTable::new(region, start, len).map(Self::Ordered)
    }

    /// # Errors
    /// Returns an error if the region is too short for `len` slots
    pub fn dense(region: SharedRegion, start: usize, len: usize) -> Result<Self> {
        DenseTable::new(region, start, len).map(Self::Dense)
    }

    #[must_use]
    pub fn find(&self, id: u64) -> Option<u64> {
        match self {
            Self::Ordered(table) => table.find(id),
            Self::Dense(table) => table.find(id),
        }
    }

    /// Entries for ordered tables, slots for dense ones.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Ordered(table) => table.len(),
            Self::Dense(table) => table.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn region(&self) -> &SharedRegion {
        match self {
            Self::Ordered(table) => &table.region,
            Self::Dense(table) => &table.region,
        }
    }

    /// All mapped (identifier, offset) pairs in identifier order.
    #[must_use]
    pub fn entries(&self) -> Box<dyn Iterator<Item = MappingEntry> + '_> {
        match self {
            Self::Ordered(table) => Box::new(table.iter()),
            Self::Dense(table) => Box::new(table.iter()),
        }
    }
}

fn table_end(start: usize, len: usize, item: usize) -> Result<usize> {
    len.checked_mul(item)
        .and_then(|bytes| bytes.checked_add(start))
        .ok_or_else(|| AddrLibError::MalformedHeader(format!("entry count {len} is too large")))
}

/// Serialize entries into a region-sized buffer.
pub(crate) fn write_entries(out: &mut [u8], entries: &[MappingEntry]) {
    for (chunk, entry) in out.chunks_exact_mut(MappingEntry::SIZE).zip(entries) {
        chunk.copy_from_slice(&entry.to_le_bytes());
    }
}

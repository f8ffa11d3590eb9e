//! Offset → identifier lookup
//!
//! The forward store is keyed by identifier, so reverse queries need their
//! own copy sorted by offset. Built on demand; the forward store is untouched.

use addrlib_common::MappingEntry;

use super::store::MappingStore;

/// Loaded mappings sorted by (offset, identifier)
#[derive(Debug, Clone)]
pub struct OffsetIndex {
    by_offset: Vec<MappingEntry>,
}

impl OffsetIndex {
    /// Index the entries forward lookup can return.
    #[must_use]
    pub fn build(store: &MappingStore) -> Self {
        let mut by_offset: Vec<MappingEntry> = Vec::with_capacity(store.len());
        for entry in store.entries() {
            // Repeated identifiers: only the one stored last is reachable
            match by_offset.last_mut() {
                Some(last) if last.id == entry.id => *last = entry,
                _ => by_offset.push(entry),
            }
        }
        by_offset.sort_unstable_by_key(|e| (e.offset, e.id));
        Self { by_offset }
    }

    /// Identifier mapped to exactly `offset`; the smallest one if several are.
    #[must_use]
    pub fn id_for(&self, offset: u64) -> Option<u64> {
        let at = self.by_offset.partition_point(|e| e.offset < offset);
        self.by_offset.get(at).filter(|e| e.offset == offset).map(|e| e.id)
    }

    /// Identifier whose offset is the closest one at or below `offset`,
    /// with the distance past it.
    #[must_use]
    pub fn containing(&self, offset: u64) -> Option<(u64, u64)> {
        let at = self.by_offset.partition_point(|e| e.offset <= offset);
        let entry = self.by_offset.get(at.checked_sub(1)?)?;
        let base = entry.offset;
        let first = self.by_offset.partition_point(|e| e.offset < base);
        let id = self.by_offset[first].id;
        Some((id, offset - base))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_offset.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_offset.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::region::{RegionLocation, SharedRegion};
    use crate::mapping::store::write_entries;

    fn index(entries: &[MappingEntry]) -> OffsetIndex {
        let region = SharedRegion::create_or_attach(
            &RegionLocation::Private,
            "test",
            entries.len() * MappingEntry::SIZE,
            |bytes| {
                write_entries(bytes, entries);
                Ok(())
            },
        )
        .unwrap();
        OffsetIndex::build(&MappingStore::ordered(region, 0, entries.len()).unwrap())
    }

    #[test]
    fn test_exact_reverse_lookup() {
        let idx = index(&[
            MappingEntry::new(1, 0x3000),
            MappingEntry::new(2, 0x1000),
            MappingEntry::new(3, 0x2000),
        ]);
        assert_eq!(idx.id_for(0x1000), Some(2));
        assert_eq!(idx.id_for(0x2000), Some(3));
        assert_eq!(idx.id_for(0x2001), None);
        assert_eq!(idx.len(), 3);
    }

    #[test]
    fn test_shared_offset_prefers_smallest_id() {
        let idx = index(&[MappingEntry::new(5, 0x40), MappingEntry::new(9, 0x40)]);
        assert_eq!(idx.id_for(0x40), Some(5));
    }

    #[test]
    fn test_overwritten_entries_not_indexed() {
        let idx = index(&[
            MappingEntry::new(1, 0x10),
            MappingEntry::new(2, 0x20),
            MappingEntry::new(2, 0x21),
            MappingEntry::new(3, 0x30),
        ]);
        assert_eq!(idx.len(), 3);
        assert_eq!(idx.id_for(0x20), None);
        assert_eq!(idx.id_for(0x21), Some(2));
        assert_eq!(idx.containing(0x20), Some((1, 0x10)));
    }

    #[test]
    fn test_containing_offset() {
        let idx = index(&[MappingEntry::new(1, 0x1000), MappingEntry::new(2, 0x2000)]);
        assert_eq!(idx.containing(0x1010), Some((1, 0x10)));
        assert_eq!(idx.containing(0x2000), Some((2, 0)));
        assert_eq!(idx.containing(0x0fff), None);
    }
}

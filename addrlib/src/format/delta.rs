//! Delta-encoded databases (V1 / V2)
//!
//! ## Layout (after the 4-byte tag)
//!
//! ```text
//! game_version  : u32 × 4
//! name_len      : u32          (≤ 63)
//! name          : u8 × name_len
//! pointer_size  : i32
//! address_count : i32
//! records       : address_count × { control: u8, id payload, offset payload }
//! ```
//!
//! The control byte's low nibble selects how the identifier is decoded and
//! the high nibble how the offset is decoded, both relative to the previous
//! record (starting from 0):
//!
//! ```text
//! 0: u64 literal   1: prev + 1       2: prev + u8    3: prev - u8
//! 4: prev + u16    5: prev - u16     6: u16 literal  7: u32 literal
//! ```
//!
//! Bit 3 of the high nibble marks a pointer-scaled offset: the previous
//! offset is divided by the pointer size before the delta is applied, and
//! the result is multiplied by it afterwards.
//!
//! Decoding happens only in the process that owns the shared region; the
//! decoded table is sorted by identifier before anyone can attach to it.

use addrlib_common::{
    MappingEntry, DELTA_ADD_U16, DELTA_ADD_U8, DELTA_INCREMENT, DELTA_LITERAL_U16,
    DELTA_LITERAL_U32, DELTA_LITERAL_U64, DELTA_POINTER_SCALED, DELTA_SUB_U16, DELTA_SUB_U8,
    MAX_NAME_LEN,
};
use log::info;

use super::{header_count, name_from_bytes, ByteReader};
use crate::domain::{AddrLibError, Result, Version};
use crate::mapping::store::write_entries;
use crate::mapping::{region_name, MappingStore, RegionLocation, SharedRegion};

/// Header of a delta-encoded file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaHeader {
    pub version: Version,
    pub name: String,
    pub pointer_size: u64,
    pub address_count: usize,
}

impl DeltaHeader {
    /// Parse the header that follows the format tag.
    ///
    /// # Errors
    /// Returns an error if the header is truncated, the name is longer than
    /// the name field allows, or a size field is negative
    pub fn read(r: &mut ByteReader<'_>) -> Result<Self> {
        let version = Version::from_words(r.version_words()?);

        let name_len = r.u32("name length")? as usize;
        if name_len > MAX_NAME_LEN {
            return Err(AddrLibError::MalformedHeader(format!(
                "name length {name_len} exceeds {MAX_NAME_LEN}"
            )));
        }
        let name = name_from_bytes(r.bytes(name_len, "name")?);

        let pointer_size = header_count(r.i32("pointer size")?, "pointer size")? as u64;
        let address_count = header_count(r.i32("address count")?, "address count")?;

        Ok(Self { version, name, pointer_size, address_count })
    }

    /// Append the header (without tag) to `out`.
    ///
    /// # Panics
    /// Panics if the name is longer than 63 bytes or a count exceeds `i32::MAX`
    pub fn write(&self, out: &mut Vec<u8>) {
        assert!(self.name.len() <= MAX_NAME_LEN, "name too long for header");
        for component in self.version.0 {
            out.extend_from_slice(&u32::from(component).to_le_bytes());
        }
        out.extend_from_slice(&(self.name.len() as u32).to_le_bytes());
        out.extend_from_slice(self.name.as_bytes());
        let pointer_size = i32::try_from(self.pointer_size).expect("pointer size fits i32");
        let address_count = i32::try_from(self.address_count).expect("address count fits i32");
        out.extend_from_slice(&pointer_size.to_le_bytes());
        out.extend_from_slice(&address_count.to_le_bytes());
    }
}

fn decode_value(
    r: &mut ByteReader<'_>,
    mode: u8,
    prev: u64,
    control: u8,
    record: usize,
) -> Result<u64> {
    let value = match mode {
        DELTA_LITERAL_U64 => r.u64("u64 literal")?,
        DELTA_INCREMENT => prev.wrapping_add(1),
        DELTA_ADD_U8 => prev.wrapping_add(u64::from(r.u8("u8 delta")?)),
        DELTA_SUB_U8 => prev.wrapping_sub(u64::from(r.u8("u8 delta")?)),
        DELTA_ADD_U16 => prev.wrapping_add(u64::from(r.u16("u16 delta")?)),
        DELTA_SUB_U16 => prev.wrapping_sub(u64::from(r.u16("u16 delta")?)),
        DELTA_LITERAL_U16 => u64::from(r.u16("u16 literal")?),
        DELTA_LITERAL_U32 => u64::from(r.u32("u32 literal")?),
        _ => return Err(AddrLibError::UnhandledType { control, record }),
    };
    Ok(value)
}

/// Decode `header.address_count` records in file order.
///
/// # Errors
/// Returns an error on an unknown identifier mode, a truncated record, or a
/// pointer-scaled record when the header's pointer size is 0
pub fn decode_records(r: &mut ByteReader<'_>, header: &DeltaHeader) -> Result<Vec<MappingEntry>> {
    // Every record takes at least its control byte
    let mut entries = Vec::with_capacity(header.address_count.min(r.remaining()));

    let mut prev_id = 0u64;
    let mut prev_offset = 0u64;
    for record in 0..header.address_count {
        let control = r.u8("control byte")?;
        let lo = control & 0x0F;
        let hi = control >> 4;

        let id = decode_value(r, lo, prev_id, control, record)?;

        let scaled = hi & DELTA_POINTER_SCALED != 0;
        if scaled && header.pointer_size == 0 {
            return Err(AddrLibError::MalformedHeader(format!(
                "record {record} is pointer-scaled but the pointer size is 0"
            )));
        }
        let base = if scaled { prev_offset / header.pointer_size } else { prev_offset };
        let mut offset = decode_value(r, hi & 0x07, base, control, record)?;
        if scaled {
            offset = offset.wrapping_mul(header.pointer_size);
        }

        entries.push(MappingEntry::new(id, offset));
        prev_id = id;
        prev_offset = offset;
    }

    Ok(entries)
}

#[derive(Debug, Clone, Copy)]
enum Payload {
    None,
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
}

impl Payload {
    fn len(self) -> usize {
        match self {
            Self::None => 0,
            Self::U8(_) => 1,
            Self::U16(_) => 2,
            Self::U32(_) => 4,
            Self::U64(_) => 8,
        }
    }

    fn write(self, out: &mut Vec<u8>) {
        match self {
            Self::None => {}
            Self::U8(v) => out.push(v),
            Self::U16(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::U32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::U64(v) => out.extend_from_slice(&v.to_le_bytes()),
        }
    }
}

/// Shortest mode that reproduces `value` from `prev`.
fn choose_mode(value: u64, prev: u64) -> (u8, Payload) {
    if value == prev.wrapping_add(1) {
        return (DELTA_INCREMENT, Payload::None);
    }
    if let Some(up) = value.checked_sub(prev) {
        if let Ok(d) = u8::try_from(up) {
            return (DELTA_ADD_U8, Payload::U8(d));
        }
        if let Ok(d) = u16::try_from(up) {
            return (DELTA_ADD_U16, Payload::U16(d));
        }
    } else {
        let down = prev - value;
        if let Ok(d) = u8::try_from(down) {
            return (DELTA_SUB_U8, Payload::U8(d));
        }
        if let Ok(d) = u16::try_from(down) {
            return (DELTA_SUB_U16, Payload::U16(d));
        }
    }
    if let Ok(v) = u16::try_from(value) {
        return (DELTA_LITERAL_U16, Payload::U16(v));
    }
    if let Ok(v) = u32::try_from(value) {
        return (DELTA_LITERAL_U32, Payload::U32(v));
    }
    (DELTA_LITERAL_U64, Payload::U64(value))
}

/// Encode entries in the given order, the inverse of [`decode_records`].
///
/// Offsets that are multiples of `pointer_size` are stored pointer-scaled
/// whenever that is shorter.
#[must_use]
pub fn encode_records(entries: &[MappingEntry], pointer_size: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(entries.len() * 3);

    let mut prev_id = 0u64;
    let mut prev_offset = 0u64;
    for entry in entries {
        let (id_mode, id_payload) = choose_mode(entry.id, prev_id);

        let (mut offset_mode, mut offset_payload) = choose_mode(entry.offset, prev_offset);
        if pointer_size > 0 && entry.offset % pointer_size == 0 {
            let (mode, payload) =
                choose_mode(entry.offset / pointer_size, prev_offset / pointer_size);
            if payload.len() < offset_payload.len() {
                offset_mode = mode | DELTA_POINTER_SCALED;
                offset_payload = payload;
            }
        }

        out.push((offset_mode << 4) | id_mode);
        id_payload.write(&mut out);
        offset_payload.write(&mut out);

        prev_id = entry.id;
        prev_offset = entry.offset;
    }

    out
}

/// Produce a complete V2 file image.
///
/// # Panics
/// Panics if the header cannot be represented (see [`DeltaHeader::write`])
#[must_use]
pub fn encode_file(header: &DeltaHeader, entries: &[MappingEntry]) -> Vec<u8> {
    let header = DeltaHeader { address_count: entries.len(), ..header.clone() };
    let mut out = Vec::new();
    out.extend_from_slice(&2u32.to_le_bytes());
    header.write(&mut out);
    out.extend_from_slice(&encode_records(entries, header.pointer_size));
    out
}

/// Decode a delta-encoded file into the shared region for `running` and
/// these bytes.
///
/// `data` starts right after the format tag. The header must name exactly
/// the running version. Only the region owner decodes; attachers reuse the
/// owner's sorted table.
///
/// # Errors
/// Returns an error on a header problem, a version mismatch, a region
/// failure, or (owner only) a decoding failure
pub fn load(
    data: &[u8],
    running: Version,
    location: &RegionLocation,
) -> Result<(MappingStore, DeltaHeader)> {
    let mut reader = ByteReader::new(data);
    let header = DeltaHeader::read(&mut reader)?;

    if header.version != running {
        return Err(AddrLibError::VersionMismatch { expected: running, actual: header.version });
    }

    let size = header.address_count.checked_mul(MappingEntry::SIZE).ok_or_else(|| {
        AddrLibError::MalformedHeader(format!("address count {} is too large", header.address_count))
    })?;

    let name = region_name(running, data);
    let region = SharedRegion::create_or_attach(location, &name, size, |bytes| {
        let mut entries = decode_records(&mut reader, &header)?;
        entries.sort_by_key(|e| e.id);
        write_entries(bytes, &entries);
        Ok(())
    })?;

    info!(
        "Delta-encoded table '{}' ready: {} entries, pointer size {}, region {:?}",
        header.name,
        header.address_count,
        header.pointer_size,
        region.role()
    );

    let store = MappingStore::ordered(region, 0, header.address_count)?;
    Ok((store, header))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn header(count: usize) -> DeltaHeader {
        DeltaHeader {
            version: Version::new(1, 10, 163, 0),
            name: "Fallout4.exe".to_string(),
            pointer_size: 8,
            address_count: count,
        }
    }

    fn decode(entries_bytes: &[u8], count: usize) -> Result<Vec<MappingEntry>> {
        decode_records(&mut ByteReader::new(entries_bytes), &header(count))
    }

    #[test]
    fn test_every_mode_decodes() {
        let mut b = Vec::new();
        // 0x00: u64 literals
        b.push(0x00);
        b.extend_from_slice(&100u64.to_le_bytes());
        b.extend_from_slice(&0x1000u64.to_le_bytes());
        // 0x11: increments
        b.push(0x11);
        // 0x22: +u8
        b.extend_from_slice(&[0x22, 5, 0x10]);
        // 0x33: -u8
        b.extend_from_slice(&[0x33, 1, 0x11]);
        // 0x44: +u16
        b.push(0x44);
        b.extend_from_slice(&1000u16.to_le_bytes());
        b.extend_from_slice(&0x100u16.to_le_bytes());
        // 0x55: -u16
        b.push(0x55);
        b.extend_from_slice(&5u16.to_le_bytes());
        b.extend_from_slice(&0x100u16.to_le_bytes());
        // 0x66: u16 literals
        b.push(0x66);
        b.extend_from_slice(&7u16.to_le_bytes());
        b.extend_from_slice(&0x2000u16.to_le_bytes());
        // 0x77: u32 literals
        b.push(0x77);
        b.extend_from_slice(&70_000u32.to_le_bytes());
        b.extend_from_slice(&0x12345u32.to_le_bytes());
        // 0x91: id + 1, scaled offset (0x12345 / 8 + 1) * 8
        b.push(0x91);
        // 0xA2: id + u8, scaled offset + u8
        b.extend_from_slice(&[0xA2, 3, 2]);

        let entries = decode(&b, 10).unwrap();
        let got: Vec<(u64, u64)> = entries.iter().map(|e| (e.id, e.offset)).collect();
        assert_eq!(
            got,
            vec![
                (100, 0x1000),
                (101, 0x1001),
                (106, 0x1011),
                (105, 0x1000),
                (1105, 0x1100),
                (1100, 0x1000),
                (7, 0x2000),
                (70_000, 0x12345),
                (70_001, 0x12348),
                (70_004, 0x12358),
            ]
        );
    }

    #[test]
    fn test_unhandled_identifier_mode() {
        let err = decode(&[0x11, 0x08], 2).unwrap_err();
        assert!(matches!(err, AddrLibError::UnhandledType { control: 0x08, record: 1 }));
        assert!(err.to_string().contains("Unhandled type"));
    }

    #[test]
    fn test_truncated_record() {
        let err = decode(&[0x00, 1, 2, 3], 1).unwrap_err();
        assert!(matches!(err, AddrLibError::Truncated { .. }));
    }

    #[test]
    fn test_scaled_with_zero_pointer_size() {
        let mut r = ByteReader::new(&[0x81]);
        let h = DeltaHeader { pointer_size: 0, ..header(1) };
        assert!(matches!(decode_records(&mut r, &h), Err(AddrLibError::MalformedHeader(_))));
    }

    #[test]
    fn test_header_round_trip() {
        let h = header(0);
        let mut bytes = Vec::new();
        h.write(&mut bytes);
        assert_eq!(bytes.len(), 16 + 4 + h.name.len() + 4 + 4);
        assert_eq!(DeltaHeader::read(&mut ByteReader::new(&bytes)).unwrap(), h);
    }

    #[test]
    fn test_header_name_too_long() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&[0u8; 16]);
        bytes.extend_from_slice(&64u32.to_le_bytes());
        bytes.extend_from_slice(&[b'x'; 64]);
        let err = DeltaHeader::read(&mut ByteReader::new(&bytes)).unwrap_err();
        assert!(matches!(err, AddrLibError::MalformedHeader(_)));
    }

    #[test]
    fn test_encoder_prefers_scaled_offsets() {
        // 0x10000 from 0: unscaled needs a u32 literal, scaled (0x2000) a u16 delta
        let bytes = encode_records(&[MappingEntry::new(1, 0x10000)], 8);
        assert_eq!(bytes[0], ((DELTA_ADD_U16 | DELTA_POINTER_SCALED) << 4) | DELTA_INCREMENT);
        assert_eq!(bytes.len(), 3);
    }

    #[test]
    fn test_load_rejects_other_version() {
        let file = encode_file(&header(0), &[MappingEntry::new(1, 8)]);
        let err = load(&file[4..], Version::new(1, 10, 984, 0), &RegionLocation::Private)
            .unwrap_err();
        assert!(matches!(
            err,
            AddrLibError::VersionMismatch { expected, actual }
                if expected == Version::new(1, 10, 984, 0) && actual == Version::new(1, 10, 163, 0)
        ));
    }

    #[test]
    fn test_load_sorts_table() {
        let entries =
            [MappingEntry::new(30, 0x300), MappingEntry::new(10, 0x100), MappingEntry::new(20, 0x200)];
        let file = encode_file(&header(0), &entries);
        let (store, h) =
            load(&file[4..], Version::new(1, 10, 163, 0), &RegionLocation::Private).unwrap();

        assert_eq!(h.address_count, 3);
        let ids: Vec<u64> = store.entries().map(|e| e.id).collect();
        assert_eq!(ids, vec![10, 20, 30]);
        assert_eq!(store.find(20), Some(0x200));
    }

    fn arb_value() -> impl Strategy<Value = u64> {
        prop_oneof![
            0u64..300,
            0u64..70_000,
            (0u64..100_000).prop_map(|v| v * 8),
            (0u64..100_000).prop_map(|v| v * 4 + 1),
            any::<u32>().prop_map(u64::from),
            any::<u64>(),
        ]
    }

    fn arb_entries() -> impl Strategy<Value = Vec<MappingEntry>> {
        proptest::collection::btree_map(arb_value(), arb_value(), 0..128)
            .prop_map(|m| m.into_iter().map(|(id, offset)| MappingEntry::new(id, offset)).collect())
            .prop_shuffle()
    }

    proptest! {
        #[test]
        fn prop_encode_decode_round_trip(
            entries in arb_entries(),
            pointer_size in prop_oneof![Just(4u64), Just(8u64)],
        ) {
            let bytes = encode_records(&entries, pointer_size);
            let h = DeltaHeader { pointer_size, ..header(entries.len()) };
            let mut reader = ByteReader::new(&bytes);
            let decoded = decode_records(&mut reader, &h).unwrap();

            prop_assert_eq!(&decoded, &entries);
            prop_assert_eq!(reader.remaining(), 0);
        }

        #[test]
        fn prop_decoded_table_sorted_and_complete(entries in arb_entries()) {
            let file = encode_file(&header(0), &entries);
            let (store, _) =
                load(&file[4..], Version::new(1, 10, 163, 0), &RegionLocation::Private).unwrap();

            let ids: Vec<u64> = store.entries().map(|e| e.id).collect();
            prop_assert!(ids.windows(2).all(|w| w[0] < w[1]));
            for entry in &entries {
                prop_assert_eq!(store.find(entry.id), Some(entry.offset));
            }
        }

        #[test]
        fn prop_arbitrary_bytes_never_panic(
            bytes in proptest::collection::vec(any::<u8>(), 0..256),
            count in 0usize..64,
        ) {
            let _ = decode_records(&mut ByteReader::new(&bytes), &header(count));
        }
    }
}

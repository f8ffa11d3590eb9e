//! # Shared On-Disk Layouts (Database Files ↔ Runtime)
//!
//! Defines the bit-exact records and constants shared between the code that
//! reads address databases and the code that produces them. All record types
//! use `#[repr(C)]` and little-endian byte order so that a mapped file or a
//! shared region can be read in place.
//!
//! ## Key Types
//!
//! - [`MappingEntry`] - One identifier → offset fact (16 bytes)
//! - [`FormatTag`] - Leading 4-byte tag of the binary formats
//!
//! ## File Layouts
//!
//! ```text
//! legacy-packed  : count: u64 | MappingEntry × count
//! delta-encoded  : tag: u32 (1|2) | version: u32×4 | name_len: u32 | name
//!                  | pointer_size: i32 | address_count: i32 | records...
//! dense-indexed  : tag: i32 (5) | version: u32×4 | name: [u8; 64]
//!                  | pointer_size: i32 | data_format: i32 | offset_count: i32
//!                  | u32 × offset_count
//! ```

#![no_std]

// ============================================================================
// Format Tags
// ============================================================================

/// Leading tag of a binary database file.
///
/// Negative values are reserved for text formats that carry no tag on disk.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatTag {
    /// Comma-separated text (never written as a tag)
    Csv = -100,
    /// Raw packed table, selected by file discovery rather than by tag
    V0 = 0,
    /// Delta-encoded table, first revision
    V1 = 1,
    /// Delta-encoded table
    V2 = 2,
    /// Dense u32 array indexed by identifier
    V5 = 5,
}

impl FormatTag {
    /// Map a raw on-disk tag to a binary format.
    ///
    /// Only the tags that may legally appear at the start of a file are
    /// accepted; `V0` and `Csv` never do.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Self::V1),
            2 => Some(Self::V2),
            5 => Some(Self::V5),
            _ => None,
        }
    }

    /// Whether lookups for this format use the ordered (binary search) table.
    #[must_use]
    pub const fn is_ordered(self) -> bool {
        !matches!(self, Self::V5)
    }
}

// ============================================================================
// Header Sizes
// ============================================================================

/// Size of the leading format tag.
pub const TAG_SIZE: usize = 4;

/// Size of the entry count that starts a legacy-packed file.
pub const LEGACY_COUNT_SIZE: usize = 8;

/// Width of the fixed name field in the dense header, including the NUL.
pub const NAME_FIELD_LEN: usize = 64;

/// Longest name a length-prefixed delta header may carry.
pub const MAX_NAME_LEN: usize = NAME_FIELD_LEN - 1;

/// Total size of the dense header, tag included. The offset array starts here.
pub const V5_HEADER_SIZE: usize = TAG_SIZE + 16 + NAME_FIELD_LEN + 4 + 4 + 4;

/// Size of one dense offset slot.
pub const V5_SLOT_SIZE: usize = 4;

// ============================================================================
// Delta Control Byte
// ============================================================================
//
// Each delta-encoded record starts with one control byte. The low nibble
// selects how the identifier is decoded, the high nibble how the offset is
// decoded. Bit 3 of the high nibble marks a pointer-scaled offset.

/// Full u64 literal follows
pub const DELTA_LITERAL_U64: u8 = 0;
/// Previous value + 1, nothing follows
pub const DELTA_INCREMENT: u8 = 1;
/// Previous value + u8
pub const DELTA_ADD_U8: u8 = 2;
/// Previous value - u8
pub const DELTA_SUB_U8: u8 = 3;
/// Previous value + u16
pub const DELTA_ADD_U16: u8 = 4;
/// Previous value - u16
pub const DELTA_SUB_U16: u8 = 5;
/// u16 literal follows
pub const DELTA_LITERAL_U16: u8 = 6;
/// u32 literal follows
pub const DELTA_LITERAL_U32: u8 = 7;
/// High-nibble flag: offset is stored divided by the pointer size
pub const DELTA_POINTER_SCALED: u8 = 8;

// ============================================================================
// Shared Regions
// ============================================================================

/// Name prefix of shared offset regions. The full name appends the four
/// version components joined by `_`.
pub const REGION_PREFIX: &str = "ADDRLIB_IDDB_OFFSETS";

// ============================================================================
// Records
// ============================================================================

/// One identifier → offset fact as stored in ordered tables
///
/// **Memory Layout**: `#[repr(C)]`, 16 bytes, little-endian fields
/// **Ordering**: tables are sorted ascending by `id`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MappingEntry {
    /// Stable identifier
    pub id: u64,
    /// Byte offset from the module base
    pub offset: u64,
}

impl MappingEntry {
    /// Encoded size in bytes
    pub const SIZE: usize = 16;

    #[must_use]
    pub const fn new(id: u64, offset: u64) -> Self {
        Self { id, offset }
    }

    /// Encode as 16 little-endian bytes.
    #[must_use]
    pub fn to_le_bytes(self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[..8].copy_from_slice(&self.id.to_le_bytes());
        out[8..].copy_from_slice(&self.offset.to_le_bytes());
        out
    }

    /// Decode from 16 little-endian bytes.
    #[must_use]
    pub fn from_le_bytes(bytes: [u8; Self::SIZE]) -> Self {
        let mut id = [0u8; 8];
        let mut offset = [0u8; 8];
        id.copy_from_slice(&bytes[..8]);
        offset.copy_from_slice(&bytes[8..]);
        Self { id: u64::from_le_bytes(id), offset: u64::from_le_bytes(offset) }
    }
}

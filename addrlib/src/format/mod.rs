//! # Database File Formats
//!
//! Four independent decoders, each producing a [`MappingStore`] from one
//! on-disk representation:
//!
//! | Module   | Revision | Tag  | Store   | Transform                      |
//! |----------|----------|------|---------|--------------------------------|
//! | `legacy` | V0       | none | ordered | none, file mapped in place     |
//! | `delta`  | V1 / V2  | 1, 2 | ordered | delta decode + sort into region|
//! | `dense`  | V5       | 5    | dense   | none, file mapped in place     |
//! | `csv`    | CSV      | none | ordered | parse + dedup + sort into region|
//!
//! All multi-byte values are little-endian.
//!
//! [`MappingStore`]: crate::mapping::MappingStore

pub mod csv;
pub mod delta;
pub mod dense;
pub mod legacy;

use crate::domain::{AddrLibError, Result};

/// Bounds-checked little-endian cursor over a byte slice
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Take the next `len` bytes.
    ///
    /// # Errors
    /// Returns [`AddrLibError::Truncated`] naming `what` if fewer remain
    pub fn bytes(&mut self, len: usize, what: &'static str) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(AddrLibError::Truncated { what, needed: len, available: self.remaining() });
        }
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    fn array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N, what)?);
        Ok(out)
    }

    /// # Errors
    /// Returns an error if the input is exhausted
    pub fn u8(&mut self, what: &'static str) -> Result<u8> {
        Ok(self.array::<1>(what)?[0])
    }

    /// # Errors
    /// Returns an error if the input is exhausted
    pub fn u16(&mut self, what: &'static str) -> Result<u16> {
        self.array(what).map(u16::from_le_bytes)
    }

    /// # Errors
    /// Returns an error if the input is exhausted
    pub fn u32(&mut self, what: &'static str) -> Result<u32> {
        self.array(what).map(u32::from_le_bytes)
    }

    /// # Errors
    /// Returns an error if the input is exhausted
    pub fn i32(&mut self, what: &'static str) -> Result<i32> {
        self.array(what).map(i32::from_le_bytes)
    }

    /// # Errors
    /// Returns an error if the input is exhausted
    pub fn u64(&mut self, what: &'static str) -> Result<u64> {
        self.array(what).map(u64::from_le_bytes)
    }

    /// Four version words.
    ///
    /// # Errors
    /// Returns an error if the input is exhausted
    pub fn version_words(&mut self) -> Result<[u32; 4]> {
        let mut words = [0u32; 4];
        for word in &mut words {
            *word = self.u32("game version")?;
        }
        Ok(words)
    }
}

/// Text up to the first NUL, lossily decoded.
pub(crate) fn name_from_bytes(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

/// Non-negative i32 header count as usize.
pub(crate) fn header_count(raw: i32, what: &str) -> Result<usize> {
    usize::try_from(raw).map_err(|_| AddrLibError::MalformedHeader(format!("negative {what}: {raw}")))
}

//! Symbolic identifiers and their per-runtime fallback
//!
//! An identifier names one location independently of the module build. When
//! the same caller code supports several runtime variants of a module, it
//! carries one identifier per variant, with 0 meaning "none given for this
//! variant". Resolution picks, in order:
//!
//! 1. the identifier for the requested variant, if non-zero
//! 2. the primary (slot 0) identifier, if non-zero
//! 3. the first non-zero identifier in any slot
//! 4. 0
//!
//! An index past the last slot skips straight to step 3.

use crate::domain::{AddrLibError, Result};
use crate::runtime::AddressContext;

/// Pick the identifier for `runtime_index` from per-variant `slots`.
#[must_use]
pub const fn resolve_slots(slots: &[u64], runtime_index: usize) -> u64 {
    if runtime_index < slots.len() {
        let candidate = slots[runtime_index];
        if candidate != 0 {
            return candidate;
        }
        if runtime_index > 0 && slots[0] != 0 {
            return slots[0];
        }
    }

    let mut i = 0;
    while i < slots.len() {
        if slots[i] != 0 {
            return slots[i];
        }
        i += 1;
    }
    0
}

/// Something that names a location in the running module
pub trait Identifier {
    /// Numeric identifier for a runtime variant.
    fn resolve(&self, runtime_index: usize) -> u64;

    /// Offset from the module base for the context's active runtime.
    ///
    /// # Errors
    /// Returns the database's lookup error for the resolved identifier
    fn offset(&self, ctx: &AddressContext<'_>) -> Result<u64> {
        ctx.database.offset(self.resolve(ctx.runtime_index()))
    }

    /// Absolute address: module base plus [`Identifier::offset`].
    ///
    /// # Errors
    /// [`AddrLibError::VersionMismatch`] if the module is not the build the
    /// database describes; otherwise the database's lookup error for the
    /// resolved identifier
    #[allow(clippy::cast_possible_truncation)]
    fn address(&self, ctx: &AddressContext<'_>) -> Result<usize> {
        let (running, loaded) = (ctx.module.version(), ctx.database.version());
        if running != loaded {
            return Err(AddrLibError::VersionMismatch { expected: running, actual: loaded });
        }
        let offset = self.offset(ctx)?;
        Ok(ctx.module.base().wrapping_add(offset as usize))
    }
}

/// One identifier shared by every runtime variant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SimpleId(pub u64);

impl SimpleId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl Identifier for SimpleId {
    fn resolve(&self, _runtime_index: usize) -> u64 {
        self.0
    }
}

/// One identifier per runtime variant, `N` variants
///
/// ```
/// use addrlib::id::RuntimeId3;
///
/// // Slot 2 left empty falls back to the primary identifier
/// let id = RuntimeId3::primary_pair(11, 22);
/// assert_eq!(id.resolve(0), 11);
/// assert_eq!(id.resolve(1), 22);
/// assert_eq!(id.resolve(2), 11);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuntimeId<const N: usize> {
    raw: [u64; N],
}

pub type RuntimeId1 = RuntimeId<1>;
pub type RuntimeId2 = RuntimeId<2>;
pub type RuntimeId3 = RuntimeId<3>;
pub type RuntimeId4 = RuntimeId<4>;

impl<const N: usize> RuntimeId<N> {
    #[must_use]
    pub const fn new(raw: [u64; N]) -> Self {
        Self { raw }
    }

    /// Fill slots in order from `ids`.
    ///
    /// Surplus identifiers are dropped and missing slots stay 0, so a
    /// single-runtime build accepts multi-runtime call sites unchanged.
    #[must_use]
    pub const fn from_slice(ids: &[u64]) -> Self {
        let mut raw = [0u64; N];
        let mut i = 0;
        while i < N && i < ids.len() {
            raw[i] = ids[i];
            i += 1;
        }
        Self { raw }
    }

    /// Primary and secondary identifiers; any further slots fall back.
    #[must_use]
    pub const fn primary_pair(primary: u64, secondary: u64) -> Self {
        Self::from_slice(&[primary, secondary])
    }

    /// Raw identifier stored for `index`, 0 when out of range.
    #[must_use]
    pub const fn raw(&self, index: usize) -> u64 {
        if index < N {
            self.raw[index]
        } else {
            0
        }
    }

    /// Whether `index` carries its own identifier rather than falling back.
    #[must_use]
    pub const fn has_explicit(&self, index: usize) -> bool {
        self.raw(index) != 0
    }

    #[must_use]
    pub const fn resolve(&self, runtime_index: usize) -> u64 {
        resolve_slots(&self.raw, runtime_index)
    }

    #[must_use]
    pub const fn slots(&self) -> &[u64; N] {
        &self.raw
    }
}

impl<const N: usize> Default for RuntimeId<N> {
    fn default() -> Self {
        Self { raw: [0; N] }
    }
}

impl<const N: usize> From<[u64; N]> for RuntimeId<N> {
    fn from(raw: [u64; N]) -> Self {
        Self::new(raw)
    }
}

impl<const N: usize> Identifier for RuntimeId<N> {
    fn resolve(&self, runtime_index: usize) -> u64 {
        RuntimeId::resolve(self, runtime_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const A: u64 = 1001;
    const B: u64 = 2002;

    #[test]
    fn test_pair_for_three_runtimes() {
        let id = RuntimeId3::primary_pair(A, B);
        assert_eq!(id.resolve(0), A);
        assert_eq!(id.resolve(1), B);
        assert_eq!(id.resolve(2), A);
        assert!(id.has_explicit(1));
        assert!(!id.has_explicit(2));
    }

    #[test]
    fn test_primary_only() {
        let id = RuntimeId3::new([A, 0, 0]);
        for index in 0..6 {
            assert_eq!(id.resolve(index), A);
        }
    }

    #[test]
    fn test_all_zero() {
        let id = RuntimeId4::default();
        for index in 0..8 {
            assert_eq!(id.resolve(index), 0);
        }
    }

    #[test]
    fn test_empty_primary_falls_back_to_first_nonzero() {
        let id = RuntimeId4::new([0, 0, B, A]);
        assert_eq!(id.resolve(0), B);
        assert_eq!(id.resolve(1), B);
        assert_eq!(id.resolve(2), B);
        assert_eq!(id.resolve(3), A);
        assert_eq!(id.resolve(9), B);
    }

    #[test]
    fn test_out_of_range_uses_first_nonzero() {
        let id = RuntimeId2::new([A, B]);
        assert_eq!(id.resolve(2), A);
        assert_eq!(id.raw(2), 0);
    }

    #[test]
    fn test_single_runtime_ignores_extra_ids() {
        let id = RuntimeId1::from_slice(&[A, B, 7]);
        assert_eq!(id.slots(), &[A]);
        assert_eq!(id.resolve(1), A);

        let id = RuntimeId1::primary_pair(A, B);
        assert_eq!(id.raw(0), A);
        assert_eq!(id.raw(1), 0);
    }

    #[test]
    fn test_four_runtime_pair() {
        let id = RuntimeId4::primary_pair(A, B);
        assert_eq!(id.slots(), &[A, B, 0, 0]);
        assert_eq!(id.resolve(3), A);
    }

    #[test]
    fn test_simple_id_ignores_runtime() {
        let id = SimpleId::new(42);
        assert_eq!(Identifier::resolve(&id, 0), 42);
        assert_eq!(Identifier::resolve(&id, 5), 42);
    }

    #[test]
    fn test_resolution_is_const() {
        const ID: RuntimeId3 = RuntimeId3::primary_pair(A, B);
        const RESOLVED: u64 = ID.resolve(2);
        assert_eq!(RESOLVED, A);
    }

    proptest! {
        #[test]
        fn prop_explicit_slot_wins(slots in prop::array::uniform4(0u64..4), index in 0usize..4) {
            let id = RuntimeId4::new(slots);
            if slots[index] != 0 {
                prop_assert_eq!(id.resolve(index), slots[index]);
            }
        }

        #[test]
        fn prop_out_of_range_is_first_nonzero(slots in prop::array::uniform4(0u64..4), index in 4usize..64) {
            let expected = slots.iter().copied().find(|&s| s != 0).unwrap_or(0);
            prop_assert_eq!(RuntimeId4::new(slots).resolve(index), expected);
        }

        #[test]
        fn prop_zero_only_when_all_zero(slots in prop::array::uniform3(0u64..3), index in 0usize..8) {
            let resolved = RuntimeId3::new(slots).resolve(index);
            prop_assert_eq!(resolved == 0, slots.iter().all(|&s| s == 0));
        }
    }
}

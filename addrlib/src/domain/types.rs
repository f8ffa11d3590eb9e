//! Domain types providing compile-time safety and self-documentation
//!
//! These wrappers keep versions, loader conventions and format revisions
//! from being passed around as bare integers and strings.

use std::fmt;
use std::str::FromStr;

use addrlib_common::FormatTag;
use serde::{Serialize, Serializer};

use super::errors::AddrLibError;

pub use addrlib_common::MappingEntry;

/// Four-component module version (major, minor, patch, build)
///
/// Used both to pick the database file on disk and to check that a loaded
/// file belongs to the running module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version(pub [u16; 4]);

impl Version {
    #[must_use]
    pub const fn new(major: u16, minor: u16, patch: u16, build: u16) -> Self {
        Self([major, minor, patch, build])
    }

    #[must_use]
    pub const fn major(self) -> u16 {
        self.0[0]
    }

    #[must_use]
    pub const fn minor(self) -> u16 {
        self.0[1]
    }

    #[must_use]
    pub const fn patch(self) -> u16 {
        self.0[2]
    }

    #[must_use]
    pub const fn build(self) -> u16 {
        self.0[3]
    }

    /// Join all four components with `separator`.
    ///
    /// `Version::new(1, 10, 980, 0).string("-")` is `"1-10-980-0"`.
    #[must_use]
    pub fn string(self, separator: &str) -> String {
        self.0.iter().map(u16::to_string).collect::<Vec<_>>().join(separator)
    }

    /// Build a version from header words, truncating each to 16 bits.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_words(words: [u32; 4]) -> Self {
        Self(words.map(|w| w as u16))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.string("."))
    }
}

impl FromStr for Version {
    type Err = AddrLibError;

    /// Parse `"1.10.163"` or `"1.10.163.0"`; a missing build component is 0.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AddrLibError::InvalidVersion(s.to_string());

        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() < 3 || parts.len() > 4 {
            return Err(invalid());
        }

        let mut version = [0u16; 4];
        for (slot, part) in version.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            *slot = part.parse().map_err(|_| invalid())?;
        }

        Ok(Self(version))
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Host loading convention in effect
///
/// Only affects where database files are searched for and which file-name
/// roots are searched; resolution itself never looks at it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum LoaderKind {
    #[default]
    None,
    Skse,
    F4se,
    Sfse,
    Obse,
}

impl LoaderKind {
    /// Loaders that can be detected from a plugin location.
    pub const KNOWN: [LoaderKind; 4] = [Self::Skse, Self::F4se, Self::Sfse, Self::Obse];

    /// Upper-case name as it appears in directory names and messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Skse => "SKSE",
            Self::F4se => "F4SE",
            Self::Sfse => "SFSE",
            Self::Obse => "OBSE",
        }
    }

    /// File-name roots searched for this loader, in order.
    #[must_use]
    pub const fn roots(self) -> &'static [&'static str] {
        match self {
            Self::None => &[],
            Self::Skse => &["versionlib", "version"],
            Self::F4se => &["version"],
            Self::Sfse | Self::Obse => &["versionlib"],
        }
    }

    /// Match a directory name (case-insensitive) against the known loaders.
    #[must_use]
    pub fn from_dir_name(name: &str) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        Self::KNOWN.into_iter().find(|loader| loader.name() == upper)
    }
}

impl fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LoaderKind {
    type Err = AddrLibError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("none") {
            return Ok(Self::None);
        }
        Self::from_dir_name(s).ok_or_else(|| AddrLibError::UnknownLoader(s.to_string()))
    }
}

/// On-disk layout that produced a mapping store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FormatRevision {
    /// Raw packed table mapped in place
    LegacyPacked,
    /// Delta-encoded table (revision 1 or 2)
    DeltaEncoded(u32),
    /// Dense offset array indexed by identifier
    DenseIndexed,
    /// Comma-separated text
    Csv,
}

impl FormatRevision {
    /// The tag value this revision is known by.
    #[must_use]
    pub const fn tag(self) -> FormatTag {
        match self {
            Self::LegacyPacked => FormatTag::V0,
            Self::DeltaEncoded(1) => FormatTag::V1,
            Self::DeltaEncoded(_) => FormatTag::V2,
            Self::DenseIndexed => FormatTag::V5,
            Self::Csv => FormatTag::Csv,
        }
    }

    /// Whether lookups use the ordered table rather than the dense array.
    #[must_use]
    pub const fn is_ordered(self) -> bool {
        self.tag().is_ordered()
    }
}

impl From<FormatTag> for FormatRevision {
    fn from(tag: FormatTag) -> Self {
        match tag {
            FormatTag::Csv => Self::Csv,
            FormatTag::V0 => Self::LegacyPacked,
            FormatTag::V1 => Self::DeltaEncoded(1),
            FormatTag::V2 => Self::DeltaEncoded(2),
            FormatTag::V5 => Self::DenseIndexed,
        }
    }
}

impl fmt::Display for FormatRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LegacyPacked => write!(f, "V0 (legacy packed)"),
            Self::DeltaEncoded(rev) => write!(f, "V{rev} (delta encoded)"),
            Self::DenseIndexed => write!(f, "V5 (dense indexed)"),
            Self::Csv => write!(f, "CSV"),
        }
    }
}

//! Structured error types for addrlib
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Nothing in the library aborts; callers decide which kinds are fatal.

use std::path::PathBuf;

use thiserror::Error;

use super::types::{LoaderKind, Version};

pub type Result<T, E = AddrLibError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum AddrLibError {
    #[error("Failed to determine Address Library loader!\nPlugin: {}", plugin.display())]
    LoaderUndetermined { plugin: PathBuf },

    #[error("Failed to determine Address Library path!\nLoader: {loader}")]
    DatabaseNotFound { loader: LoaderKind, searched: Vec<PathBuf> },

    #[error("Unsupported Address Library format: {0}")]
    UnsupportedFormat(u32),

    #[error("Address Library version mismatch!\nExpected Version: {expected}\nActual Version: {actual}")]
    VersionMismatch { expected: Version, actual: Version },

    #[error(
        "Invalid Address Library loaded!\n\n\
         Redownload Address Library for your game version.\nGame Version: {version}"
    )]
    IntegrityViolation { version: Version },

    #[error("Failed to hash Address Library file!\nPath: {}", path.display())]
    HashUnavailable { path: PathBuf },

    #[error("No Address Library has been loaded!")]
    NotLoaded,

    #[error("Failed to find offset for Address Library ID!\nInvalid ID: {id}\nGame Version: {version}")]
    IdNotFound { id: u64, version: Version },

    #[error("Unhandled type while loading Address Library! (control byte 0x{control:02X} at record {record})")]
    UnhandledType { control: u8, record: usize },

    #[error("Malformed Address Library header: {0}")]
    MalformedHeader(String),

    #[error("Address Library file truncated while reading {what}: needed {needed} bytes, {available} available")]
    Truncated { what: &'static str, needed: usize, available: usize },

    #[error("No valid mappings found in CSV Address Library file!\nPath: {}", path.display())]
    EmptyCsv { path: PathBuf },

    #[error("Shared region {name} has size {actual}, expected {expected}")]
    RegionSizeMismatch { name: String, expected: usize, actual: usize },

    #[error("Failed to open Address Library file!\nPath: {}\n{source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid version string: {0}")]
    InvalidVersion(String),

    #[error("Unknown loader: {0}")]
    UnknownLoader(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Coarse classification of [`AddrLibError`] values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Loader undetermined or no candidate file found
    Discovery,
    /// Format tag outside the accepted set
    UnsupportedFormat,
    /// Header version differs from the running module
    VersionMismatch,
    /// Region matches a denylisted digest, or could not be hashed
    Integrity,
    /// Identifier absent, out of range, or nothing loaded
    LookupMiss,
    /// Structurally invalid file contents or arguments
    Malformed,
    /// Operating system I/O failure
    Io,
}

impl AddrLibError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::LoaderUndetermined { .. } | Self::DatabaseNotFound { .. } => ErrorKind::Discovery,
            Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Self::VersionMismatch { .. } => ErrorKind::VersionMismatch,
            Self::IntegrityViolation { .. } | Self::HashUnavailable { .. } => ErrorKind::Integrity,
            Self::NotLoaded | Self::IdNotFound { .. } => ErrorKind::LookupMiss,
            Self::UnhandledType { .. }
            | Self::MalformedHeader(_)
            | Self::Truncated { .. }
            | Self::EmptyCsv { .. }
            | Self::RegionSizeMismatch { .. }
            | Self::InvalidVersion(_)
            | Self::UnknownLoader(_) => ErrorKind::Malformed,
            Self::Open { .. } | Self::Io(_) => ErrorKind::Io,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_mismatch_display() {
        let err = AddrLibError::VersionMismatch {
            expected: Version::new(1, 10, 984, 0),
            actual: Version::new(1, 10, 980, 0),
        };
        let msg = err.to_string();
        assert!(msg.contains("Expected Version: 1.10.984.0"));
        assert!(msg.contains("Actual Version: 1.10.980.0"));
        assert_eq!(err.kind(), ErrorKind::VersionMismatch);
    }

    #[test]
    fn test_lookup_miss_display() {
        let err = AddrLibError::IdNotFound { id: 4242, version: Version::new(1, 6, 1170, 0) };
        assert!(err.to_string().contains("Invalid ID: 4242"));
        assert!(err.to_string().contains("1.6.1170.0"));
        assert_eq!(err.kind(), ErrorKind::LookupMiss);
    }

    #[test]
    fn test_unsupported_format_reports_tag() {
        let err = AddrLibError::UnsupportedFormat(3);
        assert_eq!(err.to_string(), "Unsupported Address Library format: 3");
    }

    #[test]
    fn test_discovery_names_loader() {
        let err = AddrLibError::DatabaseNotFound { loader: LoaderKind::Sfse, searched: Vec::new() };
        assert!(err.to_string().contains("SFSE"));
        assert_eq!(err.kind(), ErrorKind::Discovery);
    }
}

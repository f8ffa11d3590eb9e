//! Known-bad database detection
//!
//! Some published databases shipped with wrong offsets. Each is identified by
//! the loader, the module version it claims, and the SHA-512 of the populated
//! region. A region is hashed only when a denylist entry exists for its
//! loader and version, so ordinary loads never pay for the digest.

use std::path::Path;

use log::{debug, error};
use sha2::{Digest, Sha512};

use crate::domain::{AddrLibError, LoaderKind, Result, Version};
use crate::mapping::SharedRegion;

/// One denylisted database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenylistEntry {
    pub loader: LoaderKind,
    pub version: Version,
    /// Upper-case hex SHA-512 of the region contents
    pub sha512: String,
}

/// Set of known-bad `(loader, version, digest)` triples
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Denylist {
    entries: Vec<DenylistEntry>,
}

impl Denylist {
    /// Empty list; every database passes.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Databases known to be bad in the wild.
    #[must_use]
    pub fn builtin() -> Self {
        Self::empty()
            .with_entry(
                LoaderKind::F4se,
                Version::new(1, 10, 980, 0),
                "2AD60B95388F1B6E77A6F86F17BEB51D043CF95A341E91ECB2E911A393E45FE8\
                 156D585D2562F7B14434483D6E6652E2373B91589013507CABAE596C26A343F1",
            )
            .with_entry(
                LoaderKind::F4se,
                Version::new(1, 11, 159, 0),
                "686D40387F638ED75AD43BB76CA14170576F1A30E91144F280987D13A3012B1C\
                 A6A4E04E6BE7A5B99E46C50332C49BE40C3D9448038E17D3D31C40E72A90AE26",
            )
    }

    #[must_use]
    pub fn with_entry(mut self, loader: LoaderKind, version: Version, sha512: &str) -> Self {
        self.entries.push(DenylistEntry { loader, version, sha512: sha512.to_ascii_uppercase() });
        self
    }

    /// Entries that apply to a loader and version.
    pub fn matching(
        &self,
        loader: LoaderKind,
        version: Version,
    ) -> impl Iterator<Item = &DenylistEntry> + '_ {
        self.entries.iter().filter(move |e| e.loader == loader && e.version == version)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Upper-case hex SHA-512 of `bytes`.
#[must_use]
pub fn sha512_hex(bytes: &[u8]) -> String {
    hex::encode_upper(Sha512::digest(bytes))
}

/// Reject a populated region that matches a denylisted digest.
///
/// `path` only appears in error messages.
///
/// # Errors
/// [`AddrLibError::IntegrityViolation`] if the digest is denylisted for this
/// loader and version; [`AddrLibError::HashUnavailable`] if an entry applies
/// but the region holds no bytes to hash
pub fn validate(
    denylist: &Denylist,
    loader: LoaderKind,
    version: Version,
    region: &SharedRegion,
    path: &Path,
) -> Result<()> {
    let mut digest: Option<String> = None;

    for entry in denylist.matching(loader, version) {
        if digest.is_none() {
            if region.is_empty() {
                return Err(AddrLibError::HashUnavailable { path: path.to_path_buf() });
            }
            digest = Some(sha512_hex(region.bytes()));
        }

        if digest.as_deref() == Some(entry.sha512.as_str()) {
            error!("Denylisted Address Library for {loader} {version}: {}", path.display());
            return Err(AddrLibError::IntegrityViolation { version });
        }
    }

    if let Some(digest) = digest {
        debug!("Address Library digest {digest} is not denylisted");
    }
    Ok(())
}

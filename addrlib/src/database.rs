//! # Address Database
//!
//! Owns the one mapping store of a process and answers `offset(id)`.
//!
//! ## Load Pipeline
//!
//! ```text
//! loader ──▶ locate file ──▶ decode (legacy | delta | dense | csv) ──▶ validate
//!                                  │
//!                                  └─ owner populates region, attachers reuse it
//! ```
//!
//! Every step either succeeds or returns an [`AddrLibError`]; nothing here
//! terminates the process. The embedding code decides which failures are
//! fatal.
//!
//! ## Process-Wide Instance
//!
//! [`AddressDatabase::get_or_open`] builds the database at most once per
//! process, and [`AddressDatabase::global`] hands out the installed instance.
//! Both return `&'static` references, so lookups need no locking after
//! initialization.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};

use addrlib_common::{FormatTag, TAG_SIZE};
use log::{debug, info};
use serde::Serialize;

use crate::config::DatabaseConfig;
use crate::discovery::{self, Discovered, SourceKind};
use crate::domain::{AddrLibError, FormatRevision, LoaderKind, Result, Version};
use crate::format::csv::CsvReport;
use crate::format::{csv, delta, dense, legacy, ByteReader};
use crate::integrity;
use crate::mapping::{MappingStore, OffsetIndex, RegionRole, SharedRegion};

static GLOBAL: OnceLock<AddressDatabase> = OnceLock::new();
static INIT: Mutex<()> = Mutex::new(());

/// A loaded, validated address database
#[derive(Debug)]
pub struct AddressDatabase {
    path: PathBuf,
    loader: LoaderKind,
    format: FormatRevision,
    version: Version,
    /// Module name from the file header, when the format has one
    name: Option<String>,
    store: MappingStore,
    csv_report: Option<CsvReport>,
    reverse: OnceLock<OffsetIndex>,
}

/// Summary of a loaded database
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseInfo {
    pub path: PathBuf,
    pub loader: LoaderKind,
    pub format: String,
    pub version: Version,
    pub name: Option<String>,
    pub entries: usize,
    pub region: String,
    pub role: RegionRole,
    pub bytes: usize,
    /// Upper-case hex SHA-512 of the region
    pub sha512: String,
    pub csv: Option<CsvReport>,
}

impl AddressDatabase {
    /// Find and load the database for `version` as `config` describes.
    ///
    /// # Errors
    /// Returns an error if the loader cannot be determined, no file exists,
    /// or loading fails (see [`AddressDatabase::load`])
    pub fn open(config: &DatabaseConfig, version: Version) -> Result<Self> {
        let loader = config.resolve_loader()?;
        let dir = config.resolve_search_dir();
        debug!("Searching {} for {loader} Address Library {version}", dir.display());

        let found = discovery::locate(loader, &dir, version)?;
        Self::load(&found, version, config)
    }

    /// Decode a specific file, then run integrity validation on the result.
    ///
    /// # Errors
    /// Returns an error on an unsupported tag, a version mismatch, a decoding
    /// or region failure, or a denylisted digest
    pub fn load(found: &Discovered, version: Version, config: &DatabaseConfig) -> Result<Self> {
        let path = found.path.as_path();

        let (format, store, name, csv_report) = match found.kind {
            SourceKind::Legacy => (FormatRevision::LegacyPacked, legacy::load(path)?, None, None),
            SourceKind::Csv => {
                let (store, report) = csv::load(path, version, &config.region)?;
                (FormatRevision::Csv, store, None, Some(report))
            }
            SourceKind::Tagged => {
                let (format, store, name) = load_tagged(path, version, config)?;
                (format, store, Some(name), None)
            }
        };

        integrity::validate(&config.denylist, found.loader, version, store.region(), path)?;

        info!(
            "Loaded Address Library {} ({format}, {} entries, {:?})",
            path.display(),
            store.len(),
            store.region().role()
        );

        Ok(Self {
            path: found.path.clone(),
            loader: found.loader,
            format,
            version,
            name,
            store,
            csv_report,
            reverse: OnceLock::new(),
        })
    }

    /// Offset of `id` from the module base.
    ///
    /// # Errors
    /// [`AddrLibError::NotLoaded`] if the table is empty;
    /// [`AddrLibError::IdNotFound`] if `id` has no mapping
    pub fn offset(&self, id: u64) -> Result<u64> {
        if self.store.is_empty() {
            return Err(AddrLibError::NotLoaded);
        }
        self.store.find(id).ok_or(AddrLibError::IdNotFound { id, version: self.version })
    }

    /// Offset → identifier index, built on first use.
    pub fn offset_index(&self) -> &OffsetIndex {
        self.reverse.get_or_init(|| OffsetIndex::build(&self.store))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn loader(&self) -> LoaderKind {
        self.loader
    }

    #[must_use]
    pub fn format(&self) -> FormatRevision {
        self.format
    }

    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }

    #[must_use]
    pub fn store(&self) -> &MappingStore {
        &self.store
    }

    #[must_use]
    pub fn csv_report(&self) -> Option<&CsvReport> {
        self.csv_report.as_ref()
    }

    #[must_use]
    pub fn info(&self) -> DatabaseInfo {
        let region = self.store.region();
        DatabaseInfo {
            path: self.path.clone(),
            loader: self.loader,
            format: self.format.to_string(),
            version: self.version,
            name: self.name.clone(),
            entries: self.store.len(),
            region: region.name().to_string(),
            role: region.role(),
            bytes: region.len(),
            sha512: integrity::sha512_hex(region.bytes()),
            csv: self.csv_report.clone(),
        }
    }

    /// The process-wide database, if one has been installed.
    ///
    /// # Errors
    /// Returns [`AddrLibError::NotLoaded`] before initialization
    pub fn global() -> Result<&'static Self> {
        GLOBAL.get().ok_or(AddrLibError::NotLoaded)
    }

    /// Make `db` the process-wide database.
    ///
    /// # Errors
    /// Gives `db` back if a database is already installed
    pub fn install(db: Self) -> std::result::Result<&'static Self, Self> {
        let _guard = INIT.lock().unwrap_or_else(PoisonError::into_inner);
        match GLOBAL.get() {
            Some(_) => Err(db),
            None => Ok(GLOBAL.get_or_init(|| db)),
        }
    }

    /// The process-wide database, opening it on first call.
    ///
    /// Concurrent first calls open the database once; the others wait and
    /// receive the same instance. A failed open leaves nothing installed so
    /// the next call tries again.
    ///
    /// # Errors
    /// Returns the error from [`AddressDatabase::open`]
    pub fn get_or_open(config: &DatabaseConfig, version: Version) -> Result<&'static Self> {
        if let Some(db) = GLOBAL.get() {
            return Ok(db);
        }

        let _guard = INIT.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(db) = GLOBAL.get() {
            return Ok(db);
        }

        let db = Self::open(config, version)?;
        Ok(GLOBAL.get_or_init(|| db))
    }
}

/// Dispatch a tagged binary file on its leading format tag.
fn load_tagged(
    path: &Path,
    version: Version,
    config: &DatabaseConfig,
) -> Result<(FormatRevision, MappingStore, String)> {
    let file = SharedRegion::map_file(path)?;
    let raw = ByteReader::new(file.bytes()).u32("format tag")?;

    match FormatTag::from_raw(raw) {
        Some(tag @ (FormatTag::V1 | FormatTag::V2)) => {
            let (store, header) = delta::load(&file.bytes()[TAG_SIZE..], version, &config.region)?;
            Ok((FormatRevision::from(tag), store, header.name))
        }
        Some(FormatTag::V5) => {
            let (store, header) = dense::from_region(file, version)?;
            Ok((FormatRevision::DenseIndexed, store, header.name))
        }
        _ => Err(AddrLibError::UnsupportedFormat(raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::delta::DeltaHeader;
    use crate::format::dense::DenseHeader;
    use crate::integrity::{sha512_hex, Denylist};
    use crate::mapping::RegionLocation;
    use addrlib_common::MappingEntry;

    const V: Version = Version::new(1, 6, 1170, 0);

    fn config(dir: &Path) -> DatabaseConfig {
        DatabaseConfig::new()
            .loader(LoaderKind::Skse)
            .search_dir(dir)
            .region(RegionLocation::Private)
            .denylist(Denylist::empty())
    }

    fn delta_file(entries: &[MappingEntry]) -> Vec<u8> {
        let header =
            DeltaHeader { version: V, name: "SkyrimSE.exe".into(), pointer_size: 8, address_count: 0 };
        delta::encode_file(&header, entries)
    }

    #[test]
    fn test_open_delta_file() {
        let dir = tempfile::tempdir().unwrap();
        let entries = [MappingEntry::new(5, 0x50), MappingEntry::new(1, 0x10)];
        std::fs::write(dir.path().join("versionlib-1-6-1170-0.bin"), delta_file(&entries)).unwrap();

        let db = AddressDatabase::open(&config(dir.path()), V).unwrap();
        assert_eq!(db.format(), FormatRevision::DeltaEncoded(2));
        assert_eq!(db.offset(1).unwrap(), 0x10);
        assert_eq!(db.offset(5).unwrap(), 0x50);
        assert!(matches!(db.offset(2), Err(AddrLibError::IdNotFound { id: 2, .. })));
        assert_eq!(db.info().name.as_deref(), Some("SkyrimSE.exe"));
    }

    #[test]
    fn test_open_dense_file() {
        let dir = tempfile::tempdir().unwrap();
        let header = DenseHeader {
            version: V,
            name: "SkyrimSE.exe".into(),
            pointer_size: 8,
            data_format: 0,
            offset_count: 0,
        };
        std::fs::write(dir.path().join("versionlib-1-6-1170-0.bin"), header.encode_file(&[0, 0x20]))
            .unwrap();

        let db = AddressDatabase::open(&config(dir.path()), V).unwrap();
        assert_eq!(db.format(), FormatRevision::DenseIndexed);
        assert_eq!(db.offset(1).unwrap(), 0x20);
        assert!(matches!(db.offset(0), Err(AddrLibError::IdNotFound { .. })));
    }

    #[test]
    fn test_unsupported_tag() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("versionlib-1-6-1170-0.bin"), 3u32.to_le_bytes()).unwrap();

        let err = AddressDatabase::open(&config(dir.path()), V).unwrap_err();
        assert!(matches!(err, AddrLibError::UnsupportedFormat(3)));
        assert!(err.to_string().contains("Unsupported Address Library format: 3"));
    }

    #[test]
    fn test_legacy_file_for_f4se() {
        let dir = tempfile::tempdir().unwrap();
        let v = Version::new(1, 10, 163, 0);
        let entries = [MappingEntry::new(1, 0x100), MappingEntry::new(2, 0x200)];
        std::fs::write(dir.path().join("version-1-10-163-0.bin"), legacy::encode(&entries)).unwrap();

        let cfg = config(dir.path()).loader(LoaderKind::F4se);
        let db = AddressDatabase::open(&cfg, v).unwrap();
        assert_eq!(db.format(), FormatRevision::LegacyPacked);
        assert_eq!(db.offset(2).unwrap(), 0x200);
        assert_eq!(db.store().region().role(), RegionRole::Attached);
    }

    #[test]
    fn test_empty_table_is_not_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let v = Version::new(1, 10, 163, 0);
        std::fs::write(dir.path().join("version-1-10-163-0.bin"), legacy::encode(&[])).unwrap();

        let db = AddressDatabase::open(&config(dir.path()).loader(LoaderKind::F4se), v).unwrap();
        assert!(matches!(db.offset(0), Err(AddrLibError::NotLoaded)));
    }

    #[test]
    fn test_denylisted_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let entries = [MappingEntry::new(1, 0x10)];
        std::fs::write(dir.path().join("versionlib-1-6-1170-0.bin"), delta_file(&entries)).unwrap();

        // The digest covers the decoded region, not the file
        let region: Vec<u8> = entries.iter().flat_map(|e| e.to_le_bytes()).collect();
        let denylist = Denylist::empty().with_entry(LoaderKind::Skse, V, &sha512_hex(&region));

        let err = AddressDatabase::open(&config(dir.path()).denylist(denylist), V).unwrap_err();
        assert!(matches!(err, AddrLibError::IntegrityViolation { .. }));
    }

    #[test]
    fn test_csv_info() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("versionlib-1-6-1170-0.csv"),
            "id,offset\n1,1.6.1170.0\n9,900\n",
        )
        .unwrap();

        let db = AddressDatabase::open(&config(dir.path()), V).unwrap();
        let info = db.info();
        assert_eq!(info.format, "CSV");
        assert_eq!(info.entries, 1);
        assert_eq!(info.csv.map(|r| r.unique), Some(1));
        assert_eq!(info.sha512, sha512_hex(&MappingEntry::new(9, 900).to_le_bytes()));
        assert_eq!(db.offset_index().id_for(900), Some(9));
    }
}

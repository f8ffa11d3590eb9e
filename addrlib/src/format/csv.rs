//! Comma-separated text databases
//!
//! ```text
//! id,offset              <- column header, ignored
//! 2,1.10.980.0           <- metadata: expected entry count, version string
//! 1,4096                 <- data rows
//! # comment
//! ```
//!
//! Bad rows are logged and skipped, including rows that are not UTF-8. A
//! repeated identifier replaces the earlier offset. Only a file with no
//! usable rows at all fails the load.

use std::collections::HashMap;
use std::path::Path;

use addrlib_common::MappingEntry;
use log::{info, warn};
use serde::Serialize;

use crate::domain::{AddrLibError, Result, Version};
use crate::mapping::store::write_entries;
use crate::mapping::{region_name, MappingStore, RegionLocation, SharedRegion};

/// Row accounting for one parsed file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CsvReport {
    /// Rows that introduced a new identifier
    pub valid: usize,
    /// Rows skipped as unparseable
    pub invalid: usize,
    /// Rows that overwrote an earlier identifier
    pub duplicates: usize,
    /// Distinct identifiers in the result
    pub unique: usize,
    /// Entry count declared by the metadata row
    pub expected: Option<usize>,
    /// Version string declared by the metadata row
    pub version_string: Option<String>,
}

impl CsvReport {
    /// Declared count differs from what was actually parsed
    #[must_use]
    pub fn count_mismatch(&self) -> bool {
        matches!(self.expected, Some(n) if n > 0 && n != self.unique)
    }
}

/// Parse CSV bytes into entries sorted by identifier.
///
/// Lines are decoded one at a time, so a stray non-UTF-8 byte costs only the
/// row it is in. Never fails; callers decide what an empty result means.
#[must_use]
pub fn parse(data: &[u8]) -> (Vec<MappingEntry>, CsvReport) {
    let mut report = CsvReport::default();
    let mut lines = data.split(|&b| b == b'\n').enumerate().map(|(i, line)| (i + 1, line));

    // Column header
    lines.next();

    if let Some((number, raw)) = lines.next() {
        match std::str::from_utf8(raw) {
            Ok(line) => parse_metadata(number, line, &mut report),
            Err(_) => warn!("CSV metadata line {number}: Not valid UTF-8"),
        }
    }

    let mut order: Vec<u64> = Vec::new();
    let mut offsets: HashMap<u64, u64> = HashMap::new();

    for (number, raw) in lines {
        if raw.starts_with(b"#") {
            continue;
        }
        let Ok(line) = std::str::from_utf8(raw) else {
            warn!("CSV line {number}: Not valid UTF-8. Line: '{}'", String::from_utf8_lossy(raw));
            report.invalid += 1;
            continue;
        };
        if line.trim().is_empty() {
            continue;
        }

        let Some((id, offset)) = parse_row(number, line) else {
            report.invalid += 1;
            continue;
        };

        match offsets.insert(id, offset) {
            Some(previous) => {
                warn!(
                    "CSV line {number}: Duplicate ID {id} (previous offset: 0x{previous:X}, new offset: 0x{offset:X})"
                );
                report.duplicates += 1;
            }
            None => {
                order.push(id);
                report.valid += 1;
            }
        }
    }

    let mut entries: Vec<MappingEntry> =
        order.into_iter().map(|id| MappingEntry::new(id, offsets[&id])).collect();
    entries.sort_unstable_by_key(|e| e.id);
    report.unique = entries.len();

    (entries, report)
}

fn parse_metadata(number: usize, line: &str, report: &mut CsvReport) {
    let Some((count, version)) = line.split_once(',') else {
        warn!("CSV metadata line {number}: Invalid format (missing comma). Line: '{line}'");
        return;
    };

    match count.trim().parse::<usize>() {
        Ok(expected) => {
            let version = version.trim().to_string();
            info!("CSV Address Library metadata: expected entries = {expected}, version = {version}");
            report.expected = Some(expected);
            report.version_string = Some(version);
        }
        Err(_) => {
            warn!("CSV metadata line {number}: Could not parse entry count or version string. Line: '{line}'");
        }
    }
}

fn parse_row(number: usize, line: &str) -> Option<(u64, u64)> {
    let Some((id, offset)) = line.split_once(',') else {
        warn!("CSV line {number}: Invalid format (missing comma). Line: '{line}'");
        return None;
    };

    let (id, offset) = (id.trim(), offset.trim());
    if id.is_empty() || offset.is_empty() {
        warn!("CSV line {number}: Empty ID or offset value. Line: '{line}'");
        return None;
    }

    match (id.parse::<u64>(), offset.parse::<u64>()) {
        (Ok(id), Ok(offset)) => Some((id, offset)),
        _ => {
            warn!("CSV line {number}: Invalid number format. Line: '{line}'");
            None
        }
    }
}

/// Parse a CSV file and place its entries in the region for `running`.
///
/// The file is parsed before the region is created so that a file with no
/// usable rows never leaves an empty region behind.
///
/// # Errors
/// Returns an error if the file cannot be read, yields no entries, or the
/// region cannot be created or attached
pub fn load(
    path: &Path,
    running: Version,
    location: &RegionLocation,
) -> Result<(MappingStore, CsvReport)> {
    let data = std::fs::read(path)
        .map_err(|source| AddrLibError::Open { path: path.to_path_buf(), source })?;

    let (entries, report) = parse(&data);
    if entries.is_empty() {
        return Err(AddrLibError::EmptyCsv { path: path.to_path_buf() });
    }

    if let Some(declared) = report.version_string.as_deref() {
        match declared.parse::<Version>() {
            Ok(v) if v != running => {
                warn!("CSV metadata version {v} differs from running version {running}");
            }
            Ok(_) => {}
            Err(_) => warn!("CSV metadata version '{declared}' is not a version number"),
        }
    }

    let size = entries.len() * MappingEntry::SIZE;
    let name = region_name(running, &data);
    let region = SharedRegion::create_or_attach(location, &name, size, |bytes| {
        write_entries(bytes, &entries);
        Ok(())
    })?;

    info!("CSV Address Library loaded successfully:");
    info!("  - Valid entries: {}", report.valid);
    if report.invalid > 0 {
        warn!("  - Invalid entries: {}", report.invalid);
    }
    if report.duplicates > 0 {
        warn!("  - Duplicate entries: {} (latest values used)", report.duplicates);
    }
    info!("  - Total unique entries: {}", report.unique);
    if report.count_mismatch() {
        warn!(
            "CSV entry count mismatch: metadata = {}, actual = {}",
            report.expected.unwrap_or_default(),
            report.unique
        );
    }

    let store = MappingStore::ordered(region, 0, entries.len())?;
    Ok((store, report))
}

//! Producing binary databases from parsed entries

use std::path::Path;

use addrlib_common::{MappingEntry, MAX_NAME_LEN};
use log::info;

use super::PackFormat;
use crate::domain::{AddrLibError, Result, Version};
use crate::format::delta::{self, DeltaHeader};
use crate::format::dense::DenseHeader;
use crate::format::{csv, legacy};

/// Header fields written by [`pack`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackOptions {
    pub format: PackFormat,
    pub version: Version,
    pub name: String,
    pub pointer_size: u32,
}

/// Encode sorted, de-duplicated `entries` in the requested layout.
///
/// # Errors
/// Returns an error if the name does not fit the header, or (dense layout)
/// an identifier is too large to index or an offset does not fit 32 bits
pub fn pack(entries: &[MappingEntry], options: &PackOptions) -> Result<Vec<u8>> {
    if options.name.len() > MAX_NAME_LEN {
        return Err(AddrLibError::MalformedHeader(format!(
            "name '{}' is longer than {MAX_NAME_LEN} bytes",
            options.name
        )));
    }
    if i32::try_from(options.pointer_size).is_err() {
        return Err(AddrLibError::MalformedHeader(format!(
            "pointer size {} does not fit the header",
            options.pointer_size
        )));
    }

    let bytes = match options.format {
        PackFormat::Legacy => legacy::encode(entries),
        PackFormat::Delta => {
            if i32::try_from(entries.len()).is_err() {
                return Err(AddrLibError::MalformedHeader(format!(
                    "{} entries do not fit the header",
                    entries.len()
                )));
            }
            let header = DeltaHeader {
                version: options.version,
                name: options.name.clone(),
                pointer_size: u64::from(options.pointer_size),
                address_count: entries.len(),
            };
            delta::encode_file(&header, entries)
        }
        PackFormat::Dense => {
            let slots = dense_slots(entries)?;
            let header = DenseHeader {
                version: options.version,
                name: options.name.clone(),
                pointer_size: options.pointer_size,
                data_format: 0,
                offset_count: slots.len(),
            };
            header.encode_file(&slots)
        }
    };
    Ok(bytes)
}

/// Parse `input` as CSV and write it to `output` in the requested layout.
///
/// Returns the number of entries written.
///
/// # Errors
/// Returns an error if the input cannot be read or has no usable rows, the
/// entries cannot be packed, or the output cannot be written
pub fn pack_csv(input: &Path, output: &Path, options: &PackOptions) -> Result<usize> {
    let data = std::fs::read(input)
        .map_err(|source| AddrLibError::Open { path: input.to_path_buf(), source })?;
    let (entries, report) = csv::parse(&data);
    if entries.is_empty() {
        return Err(AddrLibError::EmptyCsv { path: input.to_path_buf() });
    }

    let bytes = pack(&entries, options)?;
    std::fs::write(output, &bytes)?;

    info!(
        "Packed {} entries ({} invalid, {} duplicate rows) into {} ({:?}, {} bytes)",
        entries.len(),
        report.invalid,
        report.duplicates,
        output.display(),
        options.format,
        bytes.len()
    );
    Ok(entries.len())
}

fn dense_slots(entries: &[MappingEntry]) -> Result<Vec<u32>> {
    let Some(last) = entries.iter().map(|e| e.id).max() else {
        return Ok(Vec::new());
    };
    let len = usize::try_from(last)
        .ok()
        .and_then(|last| last.checked_add(1))
        .filter(|&len| i32::try_from(len).is_ok())
        .ok_or_else(|| {
            AddrLibError::MalformedHeader(format!("identifier {last} is too large for a dense table"))
        })?;

    let mut slots = vec![0u32; len];
    for entry in entries {
        let offset = u32::try_from(entry.offset)
            .ok()
            .filter(|&offset| offset != 0)
            .ok_or_else(|| {
                AddrLibError::MalformedHeader(format!(
                    "offset 0x{:X} of identifier {} cannot be stored in a dense table",
                    entry.offset, entry.id
                ))
            })?;
        // Identifiers were bounded by `last` above
        #[allow(clippy::cast_possible_truncation)]
        let index = entry.id as usize;
        slots[index] = offset;
    }
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::dense;
    use crate::mapping::RegionLocation;

    const V: Version = Version::new(1, 6, 1170, 0);

    fn options(format: PackFormat) -> PackOptions {
        PackOptions { format, version: V, name: "SkyrimSE.exe".into(), pointer_size: 8 }
    }

    fn entries() -> Vec<MappingEntry> {
        vec![MappingEntry::new(1, 0x1000), MappingEntry::new(4, 0x2008), MappingEntry::new(9, 0x2010)]
    }

    #[test]
    fn test_pack_delta_loads_back() {
        let bytes = pack(&entries(), &options(PackFormat::Delta)).unwrap();
        assert_eq!(&bytes[..4], &2u32.to_le_bytes());

        let (store, header) = delta::load(&bytes[4..], V, &RegionLocation::Private).unwrap();
        assert_eq!(header.name, "SkyrimSE.exe");
        assert_eq!(store.entries().collect::<Vec<_>>(), entries());
    }

    #[test]
    fn test_pack_dense_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("versionlib-1-6-1170-0.bin");
        std::fs::write(&path, pack(&entries(), &options(PackFormat::Dense)).unwrap()).unwrap();

        let (store, header) = dense::load(&path, V).unwrap();
        assert_eq!(header.offset_count, 10);
        assert_eq!(store.entries().collect::<Vec<_>>(), entries());
    }

    #[test]
    fn test_dense_rejects_unrepresentable_offsets() {
        let zero = [MappingEntry::new(1, 0)];
        assert!(pack(&zero, &options(PackFormat::Dense)).is_err());

        let wide = [MappingEntry::new(1, 1 << 40)];
        assert!(pack(&wide, &options(PackFormat::Dense)).is_err());

        let huge_id = [MappingEntry::new(u64::MAX, 1)];
        assert!(pack(&huge_id, &options(PackFormat::Dense)).is_err());
    }

    #[test]
    fn test_name_too_long() {
        let mut opts = options(PackFormat::Delta);
        opts.name = "x".repeat(64);
        assert!(matches!(pack(&entries(), &opts), Err(AddrLibError::MalformedHeader(_))));
    }

    #[test]
    fn test_pack_csv() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        let output = dir.path().join("out.bin");
        std::fs::write(&input, b"id,offset\n3,1.6.1170.0\n9,8208\n1,4096\n# \xFF\n4,8200\n").unwrap();

        let written = pack_csv(&input, &output, &options(PackFormat::Legacy)).unwrap();
        assert_eq!(written, 3);

        let store = legacy::load(&output).unwrap();
        assert_eq!(store.entries().collect::<Vec<_>>(), entries());
    }
}

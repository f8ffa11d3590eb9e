//! Locating the database file for a loader and module version
//!
//! Plugins live in `<game>/Data/<LOADER>/Plugins/`; the loader is named by
//! the directory two levels above the plugin file and the database sits
//! next to the plugin as `{root}-{major}-{minor}-{patch}-{build}.bin`, with a
//! `.csv` fallback per root.

use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Serialize;

use crate::domain::{AddrLibError, LoaderKind, Result, Version};

/// How a discovered file must be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceKind {
    /// Binary file starting with a format tag
    Tagged,
    /// Untagged legacy-packed binary
    Legacy,
    /// Comma-separated text
    Csv,
}

/// A database file chosen for loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    pub path: PathBuf,
    pub loader: LoaderKind,
    pub kind: SourceKind,
}

/// Loader named by the directory two levels above `plugin`.
///
/// # Errors
/// Returns [`AddrLibError::LoaderUndetermined`] if that directory is missing
/// or is not a known loader
pub fn detect_loader(plugin: &Path) -> Result<LoaderKind> {
    plugin
        .parent()
        .and_then(Path::parent)
        .and_then(Path::file_name)
        .and_then(|name| LoaderKind::from_dir_name(&name.to_string_lossy()))
        .ok_or_else(|| AddrLibError::LoaderUndetermined { plugin: plugin.to_path_buf() })
}

/// `{root}-{v-v-v-v}.{ext}`
#[must_use]
pub fn file_name(root: &str, version: Version, extension: &str) -> String {
    format!("{root}-{}.{extension}", version.string("-"))
}

/// Search `dir` for the database of `loader` at `version`.
///
/// Roots are tried in the loader's order; within a root the binary file wins
/// over the CSV one. The F4SE `version` root holds legacy-packed files.
///
/// # Errors
/// Returns [`AddrLibError::DatabaseNotFound`] listing every path tried if
/// nothing exists
pub fn locate(loader: LoaderKind, dir: &Path, version: Version) -> Result<Discovered> {
    let mut searched = Vec::new();

    for &root in loader.roots() {
        let bin = dir.join(file_name(root, version, "bin"));
        debug!("Probing {}", bin.display());
        if bin.is_file() {
            let kind = if is_legacy_root(loader, root) { SourceKind::Legacy } else { SourceKind::Tagged };
            info!("Found Address Library {} ({kind:?})", bin.display());
            return Ok(Discovered { path: bin, loader, kind });
        }
        searched.push(bin);

        let csv = dir.join(file_name(root, version, "csv"));
        debug!("Probing {}", csv.display());
        if csv.is_file() {
            info!("Found CSV Address Library {}", csv.display());
            return Ok(Discovered { path: csv, loader, kind: SourceKind::Csv });
        }
        searched.push(csv);
    }

    Err(AddrLibError::DatabaseNotFound { loader, searched })
}

fn is_legacy_root(loader: LoaderKind, root: &str) -> bool {
    loader == LoaderKind::F4se && root == "version"
}

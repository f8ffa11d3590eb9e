//! Settings for opening an address database
//!
//! Built once by the embedding plugin (or the CLI) and passed to
//! [`AddressDatabase::open`](crate::database::AddressDatabase::open).

use std::path::{Path, PathBuf};

use crate::discovery;
use crate::domain::{LoaderKind, Result};
use crate::integrity::Denylist;
use crate::mapping::RegionLocation;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Path of the plugin file; used for loader detection and as the
    /// default search directory
    pub plugin_path: Option<PathBuf>,
    /// Loader convention; detected from `plugin_path` when unset
    pub loader: Option<LoaderKind>,
    /// Directory holding the database files; the plugin's directory when unset
    pub search_dir: Option<PathBuf>,
    /// Where decoded tables are shared between processes
    pub region: RegionLocation,
    pub denylist: Denylist,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            plugin_path: None,
            loader: None,
            search_dir: None,
            region: RegionLocation::default_shared(),
            denylist: Denylist::builtin(),
        }
    }
}

impl DatabaseConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn plugin_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.plugin_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn loader(mut self, loader: LoaderKind) -> Self {
        self.loader = Some(loader);
        self
    }

    #[must_use]
    pub fn search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn region(mut self, region: RegionLocation) -> Self {
        self.region = region;
        self
    }

    #[must_use]
    pub fn denylist(mut self, denylist: Denylist) -> Self {
        self.denylist = denylist;
        self
    }

    /// Explicit loader, else the one detected from the plugin path.
    ///
    /// # Errors
    /// Returns an error if no loader was given and none can be detected
    pub fn resolve_loader(&self) -> Result<LoaderKind> {
        if let Some(loader) = self.loader {
            return Ok(loader);
        }
        discovery::detect_loader(self.plugin_path.as_deref().unwrap_or(Path::new("")))
    }

    /// Explicit search directory, else the plugin's directory, else `.`
    #[must_use]
    pub fn resolve_search_dir(&self) -> PathBuf {
        self.search_dir
            .clone()
            .or_else(|| self.plugin_path.as_deref().and_then(Path::parent).map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

//! Opening the database named on the command line

use std::path::Path;

use super::SourceArgs;
use crate::config::DatabaseConfig;
use crate::database::AddressDatabase;
use crate::discovery::{Discovered, SourceKind};
use crate::domain::Result;
use crate::integrity::Denylist;
use crate::mapping::RegionLocation;

/// Region placement from the global flags.
#[must_use]
pub fn region_location(region_dir: Option<&Path>, private: bool) -> RegionLocation {
    match (private, region_dir) {
        (true, _) => RegionLocation::Private,
        (false, Some(dir)) => RegionLocation::Shared(dir.to_path_buf()),
        (false, None) => RegionLocation::default_shared(),
    }
}

impl SourceArgs {
    /// Database settings for these arguments.
    #[must_use]
    pub fn config(&self, region: RegionLocation, denylist: Denylist) -> DatabaseConfig {
        let mut config = DatabaseConfig::new().region(region).denylist(denylist);
        if let Some(plugin) = &self.plugin {
            config = config.plugin_path(plugin);
        }
        if let Some(loader) = self.loader {
            config = config.loader(loader);
        }
        if let Some(dir) = &self.dir {
            config = config.search_dir(dir);
        }
        config
    }

    /// Load `--file` directly, or search as the config describes.
    ///
    /// # Errors
    /// Returns any discovery or load error
    pub fn open(&self, config: &DatabaseConfig) -> Result<AddressDatabase> {
        match &self.file {
            Some(path) => {
                let found = Discovered {
                    path: path.clone(),
                    loader: config.loader.unwrap_or_default(),
                    kind: self.file_kind(path),
                };
                AddressDatabase::load(&found, self.game_version, config)
            }
            None => AddressDatabase::open(config, self.game_version),
        }
    }

    fn file_kind(&self, path: &Path) -> SourceKind {
        if self.legacy {
            SourceKind::Legacy
        } else if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")) {
            SourceKind::Csv
        } else {
            SourceKind::Tagged
        }
    }
}

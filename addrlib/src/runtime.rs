//! Host module and runtime-variant inputs to address resolution
//!
//! The running module is described by whoever embeds this crate: its load
//! base and version come in through [`ModuleDescriptor`], and the index of
//! the active runtime variant through [`RuntimeSource`]. Nothing here
//! inspects the process.

use crate::database::AddressDatabase;
use crate::domain::{Result, Version};

/// The loaded module addresses are relative to
pub trait ModuleDescriptor: Send + Sync {
    /// Load address of the module image
    fn base(&self) -> usize;

    /// Version of the running module
    fn version(&self) -> Version;
}

/// A module description with fixed values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticModule {
    pub base: usize,
    pub version: Version,
}

impl StaticModule {
    #[must_use]
    pub const fn new(base: usize, version: Version) -> Self {
        Self { base, version }
    }
}

impl ModuleDescriptor for StaticModule {
    fn base(&self) -> usize {
        self.base
    }

    fn version(&self) -> Version {
        self.version
    }
}

/// Where the active runtime-variant index comes from
#[derive(Debug, Clone, Copy)]
pub enum RuntimeSource {
    /// Always this index
    Fixed(usize),
    /// Ask the embedding code each time
    Detect(fn() -> usize),
}

impl RuntimeSource {
    /// Source for a build supporting `variants` runtimes.
    ///
    /// Single-runtime builds never call `detect`.
    #[must_use]
    pub fn for_count(variants: usize, detect: fn() -> usize) -> Self {
        if variants <= 1 {
            Self::Fixed(0)
        } else {
            Self::Detect(detect)
        }
    }

    #[must_use]
    pub fn current(&self) -> usize {
        match self {
            Self::Fixed(index) => *index,
            Self::Detect(detect) => detect(),
        }
    }
}

impl Default for RuntimeSource {
    fn default() -> Self {
        Self::Fixed(0)
    }
}

/// Everything an identifier needs to become an address
#[derive(Clone, Copy)]
pub struct AddressContext<'a> {
    pub database: &'a AddressDatabase,
    pub module: &'a dyn ModuleDescriptor,
    pub runtime: RuntimeSource,
}

impl<'a> AddressContext<'a> {
    #[must_use]
    pub fn new(database: &'a AddressDatabase, module: &'a dyn ModuleDescriptor) -> Self {
        Self { database, module, runtime: RuntimeSource::default() }
    }

    /// Context over the process-wide database.
    ///
    /// # Errors
    /// Returns [`AddrLibError::NotLoaded`](crate::domain::AddrLibError::NotLoaded)
    /// if no database has been installed
    pub fn global(module: &'a dyn ModuleDescriptor) -> Result<Self> {
        Ok(Self::new(AddressDatabase::global()?, module))
    }

    #[must_use]
    pub fn with_runtime(mut self, runtime: RuntimeSource) -> Self {
        self.runtime = runtime;
        self
    }

    #[must_use]
    pub fn runtime_index(&self) -> usize {
        self.runtime.current()
    }
}

impl std::fmt::Debug for AddressContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressContext")
            .field("database", &self.database.path())
            .field("base", &format_args!("0x{:X}", self.module.base()))
            .field("runtime", &self.runtime)
            .finish()
    }
}

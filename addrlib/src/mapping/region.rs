//! Named memory regions shared between processes
//!
//! A region is either a read-only mapping of a database file, or a named
//! block of memory that one process populates and every process running at
//! the same time attaches to. Named regions live as files in a region
//! directory (`/dev/shm` on Linux by default); creation and attachment are
//! serialized with an advisory lock on `<name>.lock`, so an attacher never
//! observes a region the owner has not finished populating.
//!
//! ## Lifetime
//!
//! Every process using a region keeps a shared `flock` on its file. When a
//! process lets go it takes the creation lock and tries to upgrade; if that
//! succeeds nobody else holds the region and the file is deleted. A region
//! left behind by a crashed process is still safe to attach to, because
//! the name carries a digest of the source bytes: whatever an owner writes
//! is a deterministic function of those bytes alone, and a replaced source
//! file gets a region of its own.

#![allow(unsafe_code)] // memory mapping and flock() require unsafe

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use addrlib_common::REGION_PREFIX;
use log::debug;
use memmap2::{Mmap, MmapMut};
use serde::Serialize;
use sha2::{Digest, Sha512};

use crate::domain::{AddrLibError, Result, Version};

/// Environment variable overriding the default region directory
pub const REGION_DIR_ENV: &str = "ADDRLIB_REGION_DIR";

/// How this process came to hold a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RegionRole {
    /// Created the region and populated it
    Owner,
    /// Found the region already populated (or mapped a file in place)
    Attached,
}

/// Where populated regions are kept
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionLocation {
    /// Files in this directory, visible to every process using it
    Shared(PathBuf),
    /// Anonymous memory private to this process
    Private,
}

impl RegionLocation {
    /// `$ADDRLIB_REGION_DIR`, else `/dev/shm` when present, else the temp dir.
    #[must_use]
    pub fn default_shared() -> Self {
        if let Some(dir) = std::env::var_os(REGION_DIR_ENV) {
            return Self::Shared(PathBuf::from(dir));
        }
        let shm = Path::new("/dev/shm");
        if shm.is_dir() {
            Self::Shared(shm.to_path_buf())
        } else {
            Self::Shared(std::env::temp_dir())
        }
    }
}

impl Default for RegionLocation {
    fn default() -> Self {
        Self::default_shared()
    }
}

enum Backing {
    ReadOnly(Mmap),
    Writable(MmapMut),
    // memmap2 refuses zero-length maps
    Empty,
}

/// A mapped byte region and how it was obtained
pub struct SharedRegion {
    backing: Backing,
    role: RegionRole,
    name: String,
    path: Option<PathBuf>,
    // Released on drop; see `RegionHold`
    _hold: Option<RegionHold>,
}

impl std::fmt::Debug for SharedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRegion")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("len", &self.len())
            .field("path", &self.path)
            .finish()
    }
}

/// Hex digits of the source digest carried in a region name
pub const SOURCE_TAG_LEN: usize = 16;

/// Region name for a module version and the bytes it is decoded from:
/// `<PREFIX>_<major>_<minor>_<patch>_<build>_<digest>`
///
/// `<digest>` is the first [`SOURCE_TAG_LEN`] upper-case hex digits of the
/// SHA-512 of `source`.
#[must_use]
pub fn region_name(version: Version, source: &[u8]) -> String {
    let digest = hex::encode_upper(Sha512::digest(source));
    format!("{REGION_PREFIX}_{}_{}", version.string("_"), &digest[..SOURCE_TAG_LEN])
}

impl SharedRegion {
    /// Map a database file read-only, in place.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or mapped
    pub fn map_file(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|source| AddrLibError::Open { path: path.to_path_buf(), source })?;
        let len = file.metadata()?.len();

        let backing = if len == 0 {
            Backing::Empty
        } else {
            // SAFETY: the mapping is read-only; database files are not
            // modified while a process has them loaded.
            Backing::ReadOnly(unsafe { Mmap::map(&file)? })
        };

        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        Ok(Self {
            backing,
            role: RegionRole::Attached,
            name,
            path: Some(path.to_path_buf()),
            _hold: None,
        })
    }

    /// Create the named region and populate it, or attach to it if another
    /// process already did.
    ///
    /// `populate` runs only in the owner, with the region zero-filled and
    /// exactly `size` bytes long. If it fails the half-written region is
    /// removed so that nobody attaches to it.
    ///
    /// # Errors
    /// Returns an error if the region cannot be created or mapped, if an
    /// existing region has a different size, or if `populate` fails
    pub fn create_or_attach<F>(
        location: &RegionLocation,
        name: &str,
        size: usize,
        populate: F,
    ) -> Result<Self>
    where
        F: FnOnce(&mut [u8]) -> Result<()>,
    {
        match location {
            RegionLocation::Private => Self::create_private(name, size, populate),
            RegionLocation::Shared(dir) => Self::create_or_attach_shared(dir, name, size, populate),
        }
    }

    fn create_private<F>(name: &str, size: usize, populate: F) -> Result<Self>
    where
        F: FnOnce(&mut [u8]) -> Result<()>,
    {
        let backing = if size == 0 {
            populate(&mut [])?;
            Backing::Empty
        } else {
            let mut map = MmapMut::map_anon(size)?;
            populate(&mut map[..])?;
            Backing::Writable(map)
        };

        debug!("Created private region {name} ({size} bytes)");
        Ok(Self {
            backing,
            role: RegionRole::Owner,
            name: name.to_string(),
            path: None,
            _hold: None,
        })
    }

    fn create_or_attach_shared<F>(dir: &Path, name: &str, size: usize, populate: F) -> Result<Self>
    where
        F: FnOnce(&mut [u8]) -> Result<()>,
    {
        fs::create_dir_all(dir)?;
        let path = dir.join(name);
        let lock_path = dir.join(format!("{name}.lock"));
        let _lock = RegionLock::acquire(&lock_path)?;

        // Holds are taken last: dropping one needs the lock held above
        match OpenOptions::new().read(true).write(true).create_new(true).open(&path) {
            Ok(file) => {
                let backing = match Self::populate_new(&file, size, populate) {
                    Ok(backing) => backing,
                    Err(e) => {
                        drop(file);
                        let _ = fs::remove_file(&path);
                        return Err(e);
                    }
                };

                debug!("Created shared region {} ({size} bytes)", path.display());
                let hold = RegionHold::share(file, path.clone(), lock_path)?;
                Ok(Self {
                    backing,
                    role: RegionRole::Owner,
                    name: name.to_string(),
                    path: Some(path),
                    _hold: Some(hold),
                })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                let file = File::open(&path)
                    .map_err(|source| AddrLibError::Open { path: path.clone(), source })?;
                let actual = usize::try_from(file.metadata()?.len()).unwrap_or(usize::MAX);
                if actual != size {
                    return Err(AddrLibError::RegionSizeMismatch {
                        name: name.to_string(),
                        expected: size,
                        actual,
                    });
                }

                let backing = if size == 0 {
                    Backing::Empty
                } else {
                    // SAFETY: owners only write while holding the region lock,
                    // which we held when checking the size above.
                    Backing::ReadOnly(unsafe { Mmap::map(&file)? })
                };

                debug!("Attached to shared region {} ({size} bytes)", path.display());
                let hold = RegionHold::share(file, path.clone(), lock_path)?;
                Ok(Self {
                    backing,
                    role: RegionRole::Attached,
                    name: name.to_string(),
                    path: Some(path),
                    _hold: Some(hold),
                })
            }
            Err(source) => Err(AddrLibError::Open { path, source }),
        }
    }

    fn populate_new<F>(file: &File, size: usize, populate: F) -> Result<Backing>
    where
        F: FnOnce(&mut [u8]) -> Result<()>,
    {
        file.set_len(size as u64)?;
        if size == 0 {
            populate(&mut [])?;
            return Ok(Backing::Empty);
        }

        // SAFETY: the file was just created by us and is only reachable by
        // other processes after they take the region lock we hold.
        let mut map = unsafe { MmapMut::map_mut(file)? };
        populate(&mut map[..])?;
        map.flush()?;
        Ok(Backing::Writable(map))
    }

    /// Delete a named region and its lock file from a region directory.
    ///
    /// Processes that still have the region mapped keep their view. Regions
    /// normally go away with their last holder; this is for cleaning up
    /// after processes that never dropped theirs.
    ///
    /// # Errors
    /// Returns an error if the region exists but cannot be removed
    pub fn remove(dir: &Path, name: &str) -> Result<bool> {
        let removed = match fs::remove_file(dir.join(name)) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        let _ = fs::remove_file(dir.join(format!("{name}.lock")));
        Ok(removed)
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        match &self.backing {
            Backing::ReadOnly(map) => &map[..],
            Backing::Writable(map) => &map[..],
            Backing::Empty => &[],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn role(&self) -> RegionRole {
        self.role
    }

    #[must_use]
    pub fn is_owner(&self) -> bool {
        self.role == RegionRole::Owner
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing file, if the region is file-based
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// `flock()` on `file`, retried when interrupted.
#[cfg(unix)]
fn flock(file: &File, operation: libc::c_int) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;
    loop {
        if unsafe { libc::flock(file.as_raw_fd(), operation) } == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// Exclusive advisory lock held for the lifetime of the guard
struct RegionLock {
    #[cfg_attr(not(unix), allow(dead_code))]
    file: File,
}

impl RegionLock {
    fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|source| AddrLibError::Open { path: path.to_path_buf(), source })?;

        #[cfg(unix)]
        flock(&file, libc::LOCK_EX)?;

        Ok(Self { file })
    }
}

impl Drop for RegionLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        let _ = flock(&self.file, libc::LOCK_UN);
    }
}

/// Shared lock on a region file for as long as this process uses it
///
/// The last hold to be dropped deletes the region file.
struct RegionHold {
    #[cfg_attr(not(unix), allow(dead_code))]
    file: File,
    path: PathBuf,
    lock_path: PathBuf,
}

impl RegionHold {
    fn share(file: File, path: PathBuf, lock_path: PathBuf) -> Result<Self> {
        #[cfg(unix)]
        flock(&file, libc::LOCK_SH)?;

        Ok(Self { file, path, lock_path })
    }

    /// Nobody else holds the region. Caller holds the creation lock.
    #[cfg(unix)]
    fn is_last(&self) -> bool {
        use std::os::unix::fs::MetadataExt;

        // The name may already point at a newer region after a `remove`
        let same_file = match (fs::metadata(&self.path), self.file.metadata()) {
            (Ok(named), Ok(held)) => named.dev() == held.dev() && named.ino() == held.ino(),
            _ => false,
        };
        same_file && flock(&self.file, libc::LOCK_EX | libc::LOCK_NB).is_ok()
    }

    #[cfg(not(unix))]
    fn is_last(&self) -> bool {
        false
    }
}

impl Drop for RegionHold {
    fn drop(&mut self) {
        let Ok(_lock) = RegionLock::acquire(&self.lock_path) else {
            return;
        };
        if self.is_last() {
            match fs::remove_file(&self.path) {
                Ok(()) => debug!("Removed shared region {} (last holder)", self.path.display()),
                Err(e) => debug!("Could not remove shared region {}: {e}", self.path.display()),
            }
        }
    }
}

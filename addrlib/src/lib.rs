//! # addrlib - Address Library Resolution Engine
//!
//! Turns stable, caller-chosen identifiers into byte offsets inside one
//! specific build of a host module, using an on-disk address database that
//! matches that build exactly.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Caller (plugin code)                        │
//! │        SimpleId(17) / RuntimeId3::primary_pair(17, 9042)        │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ resolve(runtime index)
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      AddressDatabase                            │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │  Discovery   │──▶│   Decoders   │──▶│  Integrity   │         │
//! │  │ (loader dir) │   │ V0/V2/V5/CSV │   │  (SHA-512)   │         │
//! │  └──────────────┘   └──────┬───────┘   └──────────────┘         │
//! │                            │                                    │
//! │                            ▼                                    │
//! │                     ┌──────────────┐                            │
//! │                     │ MappingStore │  ordered table or dense    │
//! │                     │ SharedRegion │  array, shared by name     │
//! │                     └──────────────┘                            │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ offset
//!                         ▼
//!                module base + offset = address
//! ```
//!
//! ## Module Structure
//!
//! ### Loading
//!
//! - [`discovery`]: loader detection and the `{root}-{version}.bin|csv` search
//! - [`format`]: one decoder per on-disk layout
//!   - `legacy`: untagged packed table, mapped in place
//!   - `delta`: variable-width delta records, decoded into a shared region
//!   - `dense`: u32 array indexed by identifier, mapped in place
//!   - `csv`: text fallback with per-row recovery
//! - [`integrity`]: denylist of known-bad databases
//! - [`database`]: the orchestrator and the process-wide instance
//! - [`config`]: [`DatabaseConfig`](config::DatabaseConfig) builder
//!
//! ### Lookup
//!
//! - [`mapping`]: regions, ordered/dense tables, reverse index
//! - [`id`]: identifier types and the per-runtime fallback rule
//! - [`runtime`]: module descriptor and runtime-index source
//!
//! ### Shared
//!
//! - [`domain`]: versions, loader kinds, format revisions, errors
//! - [`cli`]: argument definitions and helpers for the `addrlib` binary
//!
//! ## Shared Regions
//!
//! Decoded tables are placed in named regions
//! (`ADDRLIB_IDDB_OFFSETS_<v>_<digest>`, the digest taken over the source
//! bytes). The first process to create a region decodes into it; every
//! process attaching while it exists skips decoding. The last process to let
//! go deletes it. Decoders are therefore pure functions of the input file:
//! attachers trust the owner's bytes and only re-run the integrity check.
//!
//! ## Typical Usage
//!
//! ```no_run
//! use addrlib::config::DatabaseConfig;
//! use addrlib::database::AddressDatabase;
//! use addrlib::domain::Version;
//! use addrlib::id::{Identifier, RuntimeId3};
//! use addrlib::runtime::{AddressContext, StaticModule};
//!
//! # fn main() -> addrlib::domain::Result<()> {
//! let version = Version::new(1, 6, 1170, 0);
//! let config = DatabaseConfig::new().plugin_path("Data/SKSE/Plugins/my_plugin.dll");
//! let db = AddressDatabase::get_or_open(&config, version)?;
//!
//! let module = StaticModule::new(0x1_4000_0000, version);
//! let ctx = AddressContext::new(db, &module);
//! let address = RuntimeId3::primary_pair(11045, 12042).address(&ctx)?;
//! # let _ = address;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod database;
pub mod discovery;
pub mod domain;
pub mod format;
pub mod id;
pub mod integrity;
pub mod mapping;
pub mod runtime;

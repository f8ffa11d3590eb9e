//! # Mapping Storage
//!
//! Holds the one lookup structure a loaded database owns and the memory
//! region backing it.
//!
//! ## Representations
//!
//! ```text
//! Ordered: [ id | offset ][ id | offset ] ...   sorted by id, bisected
//! Dense:   [ off(0) ][ off(1) ][ off(2) ] ...   indexed by id, 0 = unmapped
//! ```
//!
//! Which representation is active is decided by the file format; exactly one
//! exists per loaded database.
//!
//! ## Module Structure
//!
//! - **`region`**: file maps and named regions shared between processes
//!   (owner populates, attachers reuse)
//! - **`store`**: ordered and dense tables over a region
//! - **`reverse`**: offset → identifier index built from a store

pub mod region;
pub mod reverse;
pub mod store;

pub use region::{region_name, RegionLocation, RegionRole, SharedRegion};
pub use reverse::OffsetIndex;
pub use store::{DenseTable, MappingStore, OrderedTable};

//! Command-line surface of the `addrlib` binary
//!
//! Argument definitions live in `args`; `source` turns them into a
//! [`DatabaseConfig`](crate::config::DatabaseConfig) and an open database;
//! `pack` produces binary databases from CSV input.

mod args;
pub mod pack;
pub mod source;

pub use args::{parse_id_set, parse_number, Args, Command, IdSet, PackFormat, SourceArgs};

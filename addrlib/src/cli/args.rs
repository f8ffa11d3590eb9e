//! CLI argument definitions

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::domain::{LoaderKind, Version};

#[derive(Parser)]
#[command(
    name = "addrlib",
    version,
    about = "Inspect and produce Address Library databases",
    after_help = "\
EXAMPLES:
    addrlib lookup --plugin Data/SKSE/Plugins/x.dll --game-version 1.6.1170 11045
    addrlib info --file versionlib-1-6-1170-0.bin --loader skse --game-version 1.6.1170 --json
    addrlib pack offsets.csv -o versionlib-1-6-1170-0.bin --game-version 1.6.1170"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Directory for shared regions (default: $ADDRLIB_REGION_DIR, /dev/shm or temp)
    #[arg(long, global = true, value_name = "DIR", conflicts_with = "private")]
    pub region_dir: Option<PathBuf>,

    /// Decode into process-private memory instead of a shared region
    #[arg(long, global = true)]
    pub private: bool,

    /// Skip the built-in denylist of known-bad databases
    #[arg(long, global = true)]
    pub no_denylist: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the offset of each identifier
    Lookup {
        #[command(flatten)]
        source: SourceArgs,

        /// Identifiers (decimal or 0x-prefixed hex)
        #[arg(required = true, value_parser = parse_number)]
        ids: Vec<u64>,
    },

    /// Resolve per-runtime identifier sets to absolute addresses
    Resolve {
        #[command(flatten)]
        source: SourceArgs,

        /// Module base address
        #[arg(long, default_value = "0", value_parser = parse_number)]
        base: u64,

        /// Active runtime-variant index
        #[arg(long, default_value = "0")]
        runtime: usize,

        /// Comma-separated identifiers, one per runtime variant (0 = fall back)
        #[arg(required = true, value_parser = parse_id_set)]
        ids: Vec<IdSet>,
    },

    /// Print the identifier whose entry covers each offset
    Reverse {
        #[command(flatten)]
        source: SourceArgs,

        /// Offsets (decimal or 0x-prefixed hex)
        #[arg(required = true, value_parser = parse_number)]
        offsets: Vec<u64>,
    },

    /// Summarize a database
    Info {
        #[command(flatten)]
        source: SourceArgs,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Convert a CSV database to a binary one
    Pack {
        /// Input CSV file
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Module version written into the header
        #[arg(long, value_name = "VERSION")]
        game_version: Version,

        /// Output layout
        #[arg(long, value_enum, default_value_t = PackFormat::Delta)]
        format: PackFormat,

        /// Module name written into the header
        #[arg(long, default_value = "")]
        name: String,

        /// Pointer size written into the header
        #[arg(long, default_value = "8")]
        pointer_size: u32,
    },
}

/// Which database file to open
#[derive(ClapArgs, Debug, Clone)]
pub struct SourceArgs {
    /// Module version the database must match
    #[arg(long, value_name = "VERSION")]
    pub game_version: Version,

    /// Plugin path; the loader and search directory are derived from it
    #[arg(long, conflicts_with = "file")]
    pub plugin: Option<PathBuf>,

    /// Loader convention (skse, f4se, sfse, obse)
    #[arg(long)]
    pub loader: Option<LoaderKind>,

    /// Directory searched for database files
    #[arg(long, conflicts_with = "file")]
    pub dir: Option<PathBuf>,

    /// Load this file directly instead of searching
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Treat `--file` as an untagged legacy-packed table
    #[arg(long, requires = "file")]
    pub legacy: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackFormat {
    /// Untagged packed table
    Legacy,
    /// Delta-encoded records (tag 2)
    Delta,
    /// Dense offset array (tag 5)
    Dense,
}

/// Decimal or `0x`-prefixed hexadecimal.
///
/// # Errors
/// Returns a message if `s` is neither
pub fn parse_number(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid number '{s}': {e}"))
}

/// Per-runtime identifiers given as `A,B,0,...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdSet(pub Vec<u64>);

/// Parse an [`IdSet`].
///
/// # Errors
/// Returns a message if any element is not a number
pub fn parse_id_set(s: &str) -> Result<IdSet, String> {
    s.split(',').map(parse_number).collect::<Result<_, _>>().map(IdSet)
}

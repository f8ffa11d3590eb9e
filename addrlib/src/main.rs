//! # addrlib - Main Entry Point
//!
//! Subcommands:
//! - **lookup** / **resolve** / **reverse**: query a database the way a plugin would
//! - **info**: summarize a database (`--json` for machine-readable output)
//! - **pack**: convert CSV into a legacy, delta-encoded or dense binary database

use anyhow::{Context, Result};
use clap::Parser;
use log::debug;

use addrlib::cli::pack::{pack_csv, PackOptions};
use addrlib::cli::source::region_location;
use addrlib::cli::{Args, Command, IdSet};
use addrlib::database::AddressDatabase;
use addrlib::domain::{AddrLibError, ErrorKind};
use addrlib::id::{resolve_slots, Identifier, SimpleId};
use addrlib::integrity::Denylist;
use addrlib::runtime::{AddressContext, RuntimeSource, StaticModule};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_DATAERR: i32 = 65;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<AddrLibError>().map(AddrLibError::kind) {
        Some(
            ErrorKind::Malformed
            | ErrorKind::VersionMismatch
            | ErrorKind::UnsupportedFormat
            | ErrorKind::Integrity,
        ) => EXIT_DATAERR,
        _ => EXIT_ERROR,
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    let region = region_location(args.region_dir.as_deref(), args.private);
    let denylist = if args.no_denylist { Denylist::empty() } else { Denylist::builtin() };
    debug!("Region location: {region:?}, {} denylist entries", denylist.len());

    match args.command {
        Command::Lookup { source, ids } => {
            let db = source.open(&source.config(region, denylist))?;
            for id in ids {
                let offset = db.offset(id)?;
                println!("{id}\t0x{offset:X}");
            }
        }

        Command::Resolve { source, base, runtime, ids } => {
            let db = source.open(&source.config(region, denylist))?;
            let base = usize::try_from(base).context("base address does not fit this platform")?;
            let module = StaticModule::new(base, source.game_version);
            let ctx = AddressContext::new(&db, &module).with_runtime(RuntimeSource::Fixed(runtime));

            for IdSet(slots) in ids {
                let id = SimpleId::new(resolve_slots(&slots, runtime));
                let address = id.address(&ctx)?;
                if args.quiet {
                    println!("0x{address:X}");
                } else {
                    println!("{slots:?}[{runtime}] -> {} -> 0x{address:X}", id.id());
                }
            }
        }

        Command::Reverse { source, offsets } => {
            let db = source.open(&source.config(region, denylist))?;
            let index = db.offset_index();
            for offset in offsets {
                match index.containing(offset) {
                    Some((id, 0)) => println!("0x{offset:X}\t{id}"),
                    Some((id, delta)) => println!("0x{offset:X}\t{id}+0x{delta:X}"),
                    None => println!("0x{offset:X}\t-"),
                }
            }
        }

        Command::Info { source, json } => {
            let db = source.open(&source.config(region, denylist))?;
            print_info(&db, json)?;
        }

        Command::Pack { input, output, game_version, format, name, pointer_size } => {
            let options = PackOptions { format, version: game_version, name, pointer_size };
            let written = pack_csv(&input, &output, &options)
                .with_context(|| format!("Failed to pack {}", input.display()))?;
            if !args.quiet {
                println!("{written} entries written to {}", output.display());
            }
        }
    }

    Ok(())
}

fn print_info(db: &AddressDatabase, json: bool) -> Result<()> {
    let info = db.info();
    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("Path:     {}", info.path.display());
    println!("Loader:   {}", info.loader);
    println!("Format:   {}", info.format);
    println!("Version:  {}", info.version);
    if let Some(name) = &info.name {
        println!("Module:   {name}");
    }
    println!("Entries:  {}", info.entries);
    println!("Region:   {} ({:?}, {} bytes)", info.region, info.role, info.bytes);
    println!("SHA-512:  {}", info.sha512);
    if let Some(report) = &info.csv {
        println!(
            "CSV rows: {} valid, {} invalid, {} duplicate",
            report.valid, report.invalid, report.duplicates
        );
    }
    Ok(())
}

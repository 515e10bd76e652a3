//! CLI smoke and inspection entry point.
//!
//! # Responsibility
//! - Verify `pagebook_core` linkage with deterministic output.
//! - Print the records stored in a preference database:
//!   `pagebook_cli inspect <db_path> [store_key]`.

use clap::{Parser, Subcommand};
use pagebook_core::db::open_db;
use pagebook_core::{Diagnostics, PersistenceStore, RecordFormat, SqliteKvStore};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Pagebook smoke checks and store inspection.
#[derive(Parser)]
#[command(name = "pagebook_cli", about = "Pagebook smoke checks and store inspection")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the records stored in a preference database.
    Inspect {
        /// Path to the preference database file.
        db_path: PathBuf,

        /// Preference key holding the record collection.
        #[arg(default_value = pagebook_core::config::DEFAULT_STORE_KEY)]
        store_key: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Inspect { db_path, store_key }) => inspect(&db_path, &store_key),
        None => {
            println!("pagebook_core ping={}", pagebook_core::ping());
            println!("pagebook_core version={}", pagebook_core::core_version());
            ExitCode::SUCCESS
        }
    }
}

fn inspect(path: &Path, key: &str) -> ExitCode {
    let conn = match open_db(path) {
        Ok(conn) => conn,
        Err(err) => {
            eprintln!("failed to open `{}`: {err}", path.display());
            return ExitCode::FAILURE;
        }
    };
    let store = match SqliteKvStore::try_new(&conn) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("preference store unavailable: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut persist = PersistenceStore::new(store, key, RecordFormat::Structured);
    let mut diagnostics = Diagnostics::new();
    let records = persist.load(&mut diagnostics);

    println!("key={key} records={} next_id={}", records.len(), persist.next_id());
    for record in records.values() {
        let position = record.transform.position;
        println!(
            "id={} kind={} page={} path={} position=({}, {}, {})",
            record.id,
            record.kind,
            record
                .page
                .map_or_else(|| "-".to_string(), |page| page.to_string()),
            record.container_path,
            position.x,
            position.y,
            position.z
        );
    }
    for diagnostic in diagnostics.entries() {
        eprintln!("{diagnostic}");
    }
    ExitCode::SUCCESS
}

#![allow(dead_code)]
#[macro_use]
mod errors;
mod cmdproc;
mod console;
mod database;
mod repl;
mod sql;
mod storage;

use clap::Parser;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(
    name = "minisql",
    version = VERSION,
    about = "Tiny disk-backed SQL database."
)]
struct Cli {
    /// Directory holding the metadata file and per-table data and index files.
    #[arg(long, env = "MINISQL_DATA_DIR", default_value = "db_data")]
    data_dir: PathBuf,
}

fn main() {
    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open("minisql.log")
        .expect("Failed to open log file");

    tracing_subscriber::fmt()
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut db = match database::Database::open(&cli.data_dir) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    match repl::start(&mut db) {
        Ok(_) => (),
        Err(errors::Error::Io(_, e)) if e.kind() == io::ErrorKind::Interrupted => (), // Silence Ctrl+C
        Err(e) => println!("\nError: {}", e),
    }
    db.close();
}

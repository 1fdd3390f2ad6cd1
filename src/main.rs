mod catalog;
mod cli;
mod config;
mod identity;
mod ledger;
mod model;
mod report;
mod storage;
mod tracker;
mod workflow;

use std::process;

use catalog::Catalog;
use config::Config;
use storage::Storage;

fn main() {
    let Some(config_path) = Config::path() else {
        eprintln!("Could not determine home directory.");
        process::exit(1);
    };
    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    let catalog_path = Catalog::path().unwrap_or_default();
    let catalog = match Catalog::load(&catalog_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load catalog: {e}");
            process::exit(1);
        }
    };

    let Some(db_path) = Storage::default_path() else {
        eprintln!("Could not determine home directory.");
        process::exit(1);
    };
    let mut storage = match Storage::open(&db_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to initialize storage: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = cli::run(&config, &catalog, &mut storage) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

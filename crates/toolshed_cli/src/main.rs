//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `toolshed_core` linkage.
//! - Report the resolved configuration and whether the database opens.

use toolshed_core::db::migrations::latest_version;
use toolshed_core::db::open_db;
use toolshed_core::{init_logging_from_config, CoreConfig};

fn main() {
    let config = CoreConfig::from_env();
    if let Err(err) = init_logging_from_config(&config) {
        eprintln!("toolshed_core logging disabled: {err}");
    }

    println!("toolshed_core ping={}", toolshed_core::ping());
    println!("toolshed_core version={}", toolshed_core::core_version());
    println!("toolshed_core db_path={}", config.db_path.display());

    match open_db(&config.db_path) {
        Ok(_) => println!("toolshed_core schema_version={}", latest_version()),
        Err(err) => {
            eprintln!("toolshed_core db_open failed: {err}");
            std::process::exit(1);
        }
    }
}

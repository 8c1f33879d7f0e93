// Reclaims unused space and refreshes query-planner statistics. Intended to
// run monthly via cron, e.g. `0 4 1 * * vacuum-db`.

use std::path::Path;

use tps_core::config::Config;
use tps_core::store::Store;

fn format_size(mut bytes: f64) -> String {
    for unit in ["B", "KB", "MB", "GB"] {
        if bytes < 1024.0 {
            return format!("{bytes:.2} {unit}");
        }
        bytes /= 1024.0;
    }
    format!("{bytes:.2} TB")
}

fn main() {
    env_logger::init();
    let config = Config::from_env();

    println!("TPS Database Vacuum");
    println!("Database: {}", config.sqlite_db_path);
    println!("{}", "-".repeat(40));

    let path = Path::new(&config.sqlite_db_path);
    if !path.exists() {
        println!("Database file does not exist yet.");
        return;
    }

    let size_before = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);

    let store = match Store::open(&config.sqlite_db_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open database: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = store.vacuum() {
        eprintln!("Vacuum failed: {e}");
        std::process::exit(1);
    }

    let size_after = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let saved = size_before.saturating_sub(size_after);

    println!("Size before: {}", format_size(size_before as f64));
    println!("Size after:  {}", format_size(size_after as f64));
    println!("Space saved: {}", format_size(saved as f64));
}

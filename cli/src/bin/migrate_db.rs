// Applies additive schema migrations. Safe to rerun: duplicate-column
// errors from an already-applied migration are swallowed, not fatal.

use tps_core::config::Config;
use tps_core::store::Store;

fn main() {
    env_logger::init();
    let config = Config::from_env();

    println!("Migrating database at {}...", config.sqlite_db_path);

    match Store::open(&config.sqlite_db_path) {
        Ok(_) => println!("Schema is up to date."),
        Err(e) => {
            eprintln!("Migration failed: {e}");
            std::process::exit(1);
        }
    }
}

// Deletes translation cache entries older than N days. Intended to run
// weekly via cron, e.g. `0 3 * * 0 cleanup-cache`.

use clap::Parser;
use tps_core::config::Config;
use tps_core::store::cache_repo::CacheRepo;
use tps_core::store::Store;

#[derive(Parser)]
#[command(about = "Clean up old translation cache entries")]
struct Args {
    /// Delete entries older than N days
    #[arg(long)]
    days: Option<u32>,

    /// Only report what would be deleted, don't actually delete
    #[arg(long)]
    dry_run: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    let config = Config::from_env();
    let days = args.days.unwrap_or(config.cache_expire_days.max(0) as u32);

    println!("TPS Cache Cleanup");
    println!("Database: {}", config.sqlite_db_path);
    println!("Threshold: {days} days");
    println!("Mode: {}", if args.dry_run { "Dry run" } else { "Live" });
    println!("{}", "-".repeat(40));

    let store = match Store::open(&config.sqlite_db_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open database: {e}");
            std::process::exit(1);
        }
    };
    let repo = CacheRepo::new(&store);

    let count = if args.dry_run {
        repo.count_expired(days)
    } else {
        repo.delete_expired(days)
    };

    match count {
        Ok(n) if args.dry_run => println!("Would delete {n} entries"),
        Ok(n) => println!("Deleted {n} entries"),
        Err(e) => {
            eprintln!("Cleanup failed: {e}");
            std::process::exit(1);
        }
    }
}

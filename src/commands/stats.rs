use anyhow::Result;

use crate::cli::StatsArgs;
use crate::config::EngineConfig;
use crate::district::postal_for_fips;
use crate::engine::LookupEngine;

/// Print store and engine statistics for a built store.
pub fn stats(args: &StatsArgs) -> Result<()> {
    let config = EngineConfig::new(&args.store);
    let engine = LookupEngine::open(&config)?;

    let stats = engine.stats();
    println!("districts:   {}", stats.total_districts);
    println!("school year: {}", stats.school_year);
    println!("tolerance:   {} deg", stats.tolerance);
    println!("lru:         {}/{}", stats.lru_size, stats.lru_capacity);
    println!("rss:         {} MiB", stats.memory_rss_bytes / (1024 * 1024));

    if args.states {
        println!();
        for (fips, count) in engine.store().state_counts() {
            let postal = postal_for_fips(&fips).unwrap_or("??");
            println!("{fips} {postal}  {count}");
        }
    }

    Ok(())
}

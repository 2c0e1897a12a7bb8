use anyhow::Result;

use crate::cli::LookupArgs;
use crate::config::EngineConfig;
use crate::engine::{LookupEngine, LookupResult};

/// Resolve one coordinate against a built store and print the result
/// as JSON.
pub fn lookup(args: &LookupArgs) -> Result<()> {
    let config = EngineConfig::new(&args.store);
    let engine = LookupEngine::open(&config)?;

    match engine.lookup(args.lat, args.lng) {
        Ok(LookupResult::NotFound) => println!("no district found (empty store)"),
        Ok(result) => println!("{}", serde_json::to_string_pretty(&result)?),
        Err(e) => {
            eprintln!("lookup failed: {e}");
            std::process::exit(1);
        }
    }

    Ok(())
}

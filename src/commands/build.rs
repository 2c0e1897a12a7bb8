use anyhow::{Context, Result};

use crate::cli::BuildArgs;
use crate::common::require_file_exists;
use crate::store::StoreBuilder;

/// Run the offline build: ingest the source shapefile, normalize every
/// district, and write the store.
pub fn build(args: &BuildArgs) -> Result<()> {
    require_file_exists(&args.shp)?;
    require_file_exists(&args.dbf)?;

    let summary = StoreBuilder::new(args.tolerance)
        .build_from_source(&args.shp, &args.dbf, &args.out)
        .with_context(|| format!("building store from {}", args.shp.display()))?;

    println!("districts written:      {}", summary.districts);
    println!("skipped non-polygonal:  {}", summary.skipped_non_polygonal);
    println!("skipped missing GEOID:  {}", summary.skipped_missing_geoid);
    println!("rejected invalid rings: {}", summary.rejected_invalid);
    println!("rejected degenerate:    {}", summary.rejected_degenerate);

    Ok(())
}

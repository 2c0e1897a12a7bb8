//! Offline store construction.
//!
//! The builder streams raw features through the normalizer, encodes
//! geometry blobs as it goes, and assembles the store file in one
//! transaction: everything is written to a temp file in the output
//! directory and renamed over the destination only once the digest is
//! in place, so a failed build leaves no partial output.

use std::collections::HashSet;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use crate::district::{DistrictId, DistrictRow};
use crate::geom::{normalize_geometry, GeometryRejection};
use crate::ingest::{RawDistrict, ShapefileReader};
use crate::store::codec;
use crate::store::format::{StoreMeta, BUILDER_VERSION, GEOMETRY_ENCODING, HEADER_LEN, MAGIC};
use crate::store::read::DistrictStore;

/// Counters reported after a build.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildSummary {
    /// Districts written to the store.
    pub districts: u64,
    /// Source records skipped for a non-polygonal shape.
    pub skipped_non_polygonal: u64,
    /// Source records skipped for a missing GEOID.
    pub skipped_missing_geoid: u64,
    /// Features rejected for self-intersecting rings.
    pub rejected_invalid: u64,
    /// Features rejected as degenerate (no area, envelope, or centroid).
    pub rejected_degenerate: u64,
}

/// Writes the persistent, read-optimized district store.
pub struct StoreBuilder {
    tolerance: f64,
}

impl StoreBuilder {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Full offline pipeline: stream the NCES source, normalize every
    /// feature, write the store, and verify it reads back.
    pub fn build_from_source(&self, shp: &Path, dbf: &Path, out: &Path) -> Result<BuildSummary> {
        let source_name = shp
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        let mut pending = Vec::new();
        let mut summary = BuildSummary::default();
        let mut school_year = String::new();

        let reader = ShapefileReader::open(shp, dbf)?;
        let read_summary = reader.for_each_district(|raw| {
            if school_year.is_empty() && !raw.school_year.is_empty() {
                school_year = raw.school_year.clone();
            }
            ingest_one(raw, self.tolerance, &mut pending, &mut summary);
        })?;
        summary.skipped_non_polygonal = read_summary.skipped_non_polygonal;
        summary.skipped_missing_geoid = read_summary.skipped_missing_geoid;

        self.write_store(out, &source_name, &school_year, pending, &mut summary)?;
        Ok(summary)
    }

    /// Build a store from already-loaded features. The test suites and
    /// fixture tooling come through here.
    pub fn build_from_records(
        &self,
        records: Vec<RawDistrict>,
        source_name: &str,
        out: &Path,
    ) -> Result<BuildSummary> {
        let mut pending = Vec::new();
        let mut summary = BuildSummary::default();
        let mut school_year = String::new();

        for raw in records {
            if school_year.is_empty() && !raw.school_year.is_empty() {
                school_year = raw.school_year.clone();
            }
            ingest_one(raw, self.tolerance, &mut pending, &mut summary);
        }

        self.write_store(out, source_name, &school_year, pending, &mut summary)?;
        Ok(summary)
    }

    /// Assemble and atomically write the store file, then reopen it to
    /// confirm the digest and row count before declaring success.
    fn write_store(
        &self,
        out: &Path,
        source_name: &str,
        school_year: &str,
        pending: Vec<PendingRow>,
        summary: &mut BuildSummary,
    ) -> Result<()> {
        let mut seen = HashSet::new();
        for row in &pending {
            if !seen.insert(row.row.id.clone()) {
                bail!("duplicate GEOID in source: {}", row.row.id);
            }
        }

        let meta = StoreMeta {
            school_year: school_year.to_string(),
            tolerance: self.tolerance,
            district_count: pending.len() as u64,
            source: source_name.to_string(),
            geometry_encoding: GEOMETRY_ENCODING.to_string(),
        };

        let meta_section = serde_json::to_vec(&meta).context("serializing store meta")?;

        let mut row_section = Vec::new();
        row_section.extend_from_slice(&(pending.len() as u64).to_le_bytes());
        for p in &pending {
            codec::encode_row(&mut row_section, &p.row);
        }

        let mut bbox_section = Vec::new();
        bbox_section.extend_from_slice(&(pending.len() as u64).to_le_bytes());
        for (i, p) in pending.iter().enumerate() {
            bbox_section.extend_from_slice(&p.row.bbox.min().x.to_le_bytes());
            bbox_section.extend_from_slice(&p.row.bbox.max().x.to_le_bytes());
            bbox_section.extend_from_slice(&p.row.bbox.min().y.to_le_bytes());
            bbox_section.extend_from_slice(&p.row.bbox.max().y.to_le_bytes());
            bbox_section.extend_from_slice(&(i as u32).to_le_bytes());
        }

        let mut state_entries: Vec<(&str, u32)> = pending
            .iter()
            .enumerate()
            .map(|(i, p)| (p.row.state_fips.as_str(), i as u32))
            .collect();
        state_entries.sort();
        let mut state_section = Vec::new();
        state_section.extend_from_slice(&(state_entries.len() as u64).to_le_bytes());
        for (code, row) in state_entries {
            codec::write_str(&mut state_section, code);
            state_section.extend_from_slice(&row.to_le_bytes());
        }

        let geom_region_len: u64 = pending.iter().map(|p| p.blob.len() as u64).sum();

        let dir = out
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("creating temp store in {}", dir.display()))?;

        {
            let file = tmp.as_file_mut();
            file.write_all(MAGIC)?;
            file.write_all(&BUILDER_VERSION.to_le_bytes())?;
            file.write_all(&[0u8; 32])?; // digest placeholder

            write_section(file, &meta_section)?;
            write_section(file, &row_section)?;
            write_section(file, &bbox_section)?;
            write_section(file, &state_section)?;

            file.write_all(&geom_region_len.to_le_bytes())?;
            for p in &pending {
                file.write_all(&p.blob)?;
            }

            // hash everything after the header, then fill the digest in
            file.seek(SeekFrom::Start(HEADER_LEN))?;
            let digest = crate::common::sha256_remainder(file)?;
            file.seek(SeekFrom::Start(8))?;
            file.write_all(&digest)?;
            file.flush()?;
        }

        tmp.persist(out)
            .with_context(|| format!("renaming temp store over {}", out.display()))?;

        summary.districts = pending.len() as u64;

        // verification pass: the store must read back whole
        let store = DistrictStore::open(out)
            .with_context(|| format!("verifying written store {}", out.display()))?;
        if store.len() as u64 != summary.districts {
            bail!(
                "store verification failed: wrote {} districts, read {}",
                summary.districts,
                store.len()
            );
        }

        info!(
            districts = summary.districts,
            school_year = %meta.school_year,
            tolerance = meta.tolerance,
            out = %out.display(),
            "district store written"
        );

        Ok(())
    }
}

struct PendingRow {
    row: DistrictRow,
    blob: Vec<u8>,
}

/// Normalize one raw feature and queue its row + geometry blob.
fn ingest_one(
    raw: RawDistrict,
    tolerance: f64,
    pending: &mut Vec<PendingRow>,
    summary: &mut BuildSummary,
) {
    let normalized = match normalize_geometry(&raw.geometry, tolerance) {
        Ok(n) => n,
        Err(GeometryRejection::SelfIntersecting) => {
            summary.rejected_invalid += 1;
            warn!(geoid = %raw.geoid, "rejecting district with self-intersecting ring");
            return;
        }
        Err(GeometryRejection::Degenerate) => {
            summary.rejected_degenerate += 1;
            warn!(geoid = %raw.geoid, "rejecting district with degenerate geometry");
            return;
        }
    };

    let blob = match codec::encode_geometry(&normalized.geometry) {
        Ok(b) => b,
        Err(e) => {
            summary.rejected_degenerate += 1;
            warn!(geoid = %raw.geoid, error = %e, "rejecting district that failed to encode");
            return;
        }
    };

    let geom_offset = pending
        .last()
        .map(|p| p.row.geom_offset + p.row.geom_len)
        .unwrap_or(0);
    debug!(geoid = %raw.geoid, bytes = blob.len(), "normalized district geometry");

    pending.push(PendingRow {
        row: DistrictRow {
            id: DistrictId::new(&raw.geoid),
            name: raw.name,
            state_fips: raw.state_fips,
            grade_lowest: raw.grade_lowest,
            grade_highest: raw.grade_highest,
            land_area_m2: raw.land_area_m2.max(0.0),
            water_area_m2: raw.water_area_m2.max(0.0),
            bbox: normalized.bbox,
            centroid: normalized.centroid,
            geom_offset,
            geom_len: blob.len() as u64,
        },
        blob,
    });
}

fn write_section(file: &mut std::fs::File, section: &[u8]) -> Result<()> {
    file.write_all(&(section.len() as u64).to_le_bytes())?;
    file.write_all(section)?;
    Ok(())
}

//! Streaming reader for the NCES EDGE shapefile + attribute table.
//!
//! One forward pass over the `.shp` and `.dbf` pair; not restartable.
//! Records with a non-polygonal shape or a missing GEOID are skipped
//! with a counted warning, everything else aborts the build.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use geo::MultiPolygon;
use shapefile::dbase::{FieldValue, Record};
use shapefile::{dbase, Shape, ShapeReader};
use tracing::warn;

use crate::common::polygon::shape_to_multipolygon;
use crate::error::IngestError;

/// One raw feature as it appears in the source, before normalization.
#[derive(Debug, Clone)]
pub struct RawDistrict {
    pub geoid: String,
    pub name: String,
    pub state_fips: String,
    pub grade_lowest: String,
    pub grade_highest: String,
    pub land_area_m2: f64,
    pub water_area_m2: f64,
    pub school_year: String,
    pub geometry: MultiPolygon<f64>,
}

/// Outcome of a full source pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadSummary {
    /// Features handed to the caller.
    pub yielded: u64,
    /// Features skipped because the shape was not a polygon.
    pub skipped_non_polygonal: u64,
    /// Features skipped because GEOID was absent or empty.
    pub skipped_missing_geoid: u64,
}

/// Forward-only reader over a `.shp`/`.dbf` pair.
pub struct ShapefileReader {
    shapes: ShapeReader<BufReader<File>>,
    attrs: dbase::Reader<BufReader<File>>,
}

impl ShapefileReader {
    /// Open both source files. Malformed headers fail here.
    pub fn open(shp_path: &Path, dbf_path: &Path) -> Result<Self, IngestError> {
        let shapes = ShapeReader::from_path(shp_path).map_err(|e| IngestError::SourceFormat {
            detail: format!("cannot open shapefile {}: {e}", shp_path.display()),
        })?;
        let attrs = dbase::Reader::from_path(dbf_path).map_err(|e| IngestError::SourceFormat {
            detail: format!("cannot open attribute table {}: {e}", dbf_path.display()),
        })?;
        Ok(Self { shapes, attrs })
    }

    /// Drive a single pass over the source, invoking `f` for every
    /// usable feature. Fails if the geometry and attribute streams end
    /// at different lengths.
    pub fn for_each_district<F>(self, mut f: F) -> Result<ReadSummary, IngestError>
    where
        F: FnMut(RawDistrict),
    {
        let Self { mut shapes, mut attrs } = self;

        let mut summary = ReadSummary::default();
        let mut shape_iter = shapes.iter_shapes();
        let mut record_iter = attrs.iter_records();

        loop {
            match (shape_iter.next(), record_iter.next()) {
                (None, None) => break,
                (Some(shape), Some(record)) => {
                    let shape = shape.map_err(|e| IngestError::SourceFormat {
                        detail: format!("malformed shape record: {e}"),
                    })?;
                    let record = record.map_err(|e| IngestError::SourceFormat {
                        detail: format!("malformed attribute record: {e}"),
                    })?;
                    if let Some(raw) = classify(shape, &record, &mut summary) {
                        summary.yielded += 1;
                        f(raw);
                    }
                }
                _ => {
                    return Err(IngestError::SourceFormat {
                        detail: "attribute table length disagrees with geometry count".into(),
                    })
                }
            }
        }

        Ok(summary)
    }
}

/// Turn one (shape, record) pair into a raw feature, or count the skip.
fn classify(shape: Shape, record: &Record, summary: &mut ReadSummary) -> Option<RawDistrict> {
    /// Get the trimmed value of a character field, empty if absent.
    fn character_field(record: &Record, field: &str) -> String {
        match record.get(field) {
            Some(FieldValue::Character(Some(s))) => s.trim().to_string(),
            _ => String::new(),
        }
    }

    /// Get the value of a numeric field, zero if absent.
    fn numeric_field(record: &Record, field: &str) -> f64 {
        match record.get(field) {
            Some(FieldValue::Numeric(Some(n))) => *n,
            _ => 0.0,
        }
    }

    let geometry = match shape {
        Shape::Polygon(p) => shape_to_multipolygon(&p),
        other => {
            summary.skipped_non_polygonal += 1;
            warn!(
                shape_type = %other.shapetype(),
                geoid = %character_field(record, "GEOID"),
                "skipping non-polygonal source record"
            );
            return None;
        }
    };

    let geoid = character_field(record, "GEOID");
    if geoid.is_empty() {
        summary.skipped_missing_geoid += 1;
        warn!(name = %character_field(record, "NAME"), "skipping source record without GEOID");
        return None;
    }

    Some(RawDistrict {
        geoid,
        name: character_field(record, "NAME"),
        state_fips: character_field(record, "STATEFP"),
        grade_lowest: character_field(record, "LOGRADE"),
        grade_highest: character_field(record, "HIGRADE"),
        land_area_m2: numeric_field(record, "ALAND"),
        water_area_m2: numeric_field(record, "AWATER"),
        school_year: character_field(record, "SCHOOLYEAR"),
        geometry,
    })
}

//! On-disk layout of the district store.
//!
//! A store is a single file:
//!
//! ```text
//! magic "DATL" (4) | builder version u32 LE | sha256 of remainder (32)
//! meta section    (u64 length + JSON)
//! row section     (u64 length + row count + encoded rows)
//! bbox section    (u64 length + entry count + (min_lng, max_lng, min_lat, max_lat, row))
//! state section   (u64 length + entry count + (state code, row))
//! geometry region (u64 length + concatenated per-district blobs)
//! ```
//!
//! Rows reference their geometry blob by offset within the geometry
//! region, so everything before the region is resident after open while
//! geometry bytes stay on disk. The digest covers every byte after the
//! header. Geometry blobs are gzip-compressed little-endian WKB-style
//! multipolygons (see `codec`).

use serde::{Deserialize, Serialize};

/// Magic bytes identifying a district store file.
pub const MAGIC: &[u8; 4] = b"DATL";

/// Version of the store layout this builder writes. Readers refuse
/// anything newer.
pub const BUILDER_VERSION: u32 = 1;

/// Byte length of the fixed header: magic + version + digest.
pub const HEADER_LEN: u64 = 4 + 4 + 32;

/// Identifier of the geometry blob encoding this builder writes.
pub const GEOMETRY_ENCODING: &str = "gzip-wkb-le-v1";

/// Store metadata, serialized as JSON in the meta section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMeta {
    /// Source schema identifier, e.g. "2023-2024".
    pub school_year: String,
    /// Simplification tolerance the geometries were built with, degrees.
    pub tolerance: f64,
    /// Number of district rows in the store.
    pub district_count: u64,
    /// Name of the source shapefile the store was built from.
    pub source: String,
    /// How the per-row geometry blobs are encoded.
    pub geometry_encoding: String,
}

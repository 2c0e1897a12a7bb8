//! Error types for the district lookup engine.
//!
//! The offline build pipeline reports failures through `anyhow` with
//! context strings; this module defines the typed errors the online
//! engine exposes across its public boundary.

use thiserror::Error;

/// Latitude bounds accepted for lookup queries (covers AK, HI and territories).
pub const LAT_RANGE: (f64, f64) = (18.0, 72.0);
/// Longitude bounds accepted for lookup queries.
pub const LNG_RANGE: (f64, f64) = (-180.0, -65.0);

/// Errors raised while opening or reading the persistent district store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store file does not exist at the configured path.
    #[error("store file missing: {path}")]
    Missing { path: String },

    /// The store file exists but its contents are unusable.
    #[error("store corrupt: {detail}")]
    Corrupt { detail: String },

    /// The store was written by a newer builder than this reader supports.
    #[error("store version {found} is newer than supported version {supported}")]
    VersionMismatch { found: u32, supported: u32 },

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-query errors surfaced by [`crate::engine::LookupEngine`].
#[derive(Error, Debug)]
pub enum LookupError {
    /// Coordinates are finite but outside the accepted US envelope.
    #[error("coordinate out of range: lat={lat}, lng={lng} (accepted lat {:?}, lng {:?})", LAT_RANGE, LNG_RANGE)]
    CoordinateOutOfRange { lat: f64, lng: f64 },

    /// One or both coordinates are NaN or infinite.
    #[error("coordinate not finite: lat={lat}, lng={lng}")]
    CoordinateNotFinite { lat: f64, lng: f64 },

    /// A stored geometry blob failed to decode. Carries the owning
    /// district so the bad row can be traced back to the build.
    #[error("geometry decode failed for district {district_id}: {detail}")]
    GeometryDecode { district_id: String, detail: String },

    /// The query was cancelled between phases.
    #[error("query cancelled")]
    Cancelled,

    /// Batch length exceeded the configured maximum.
    #[error("batch of {len} points exceeds limit of {max}")]
    BatchLimitExceeded { len: usize, max: usize },

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Unexpected condition; surfaced opaquely, logged with detail.
    #[error("internal error: {detail}")]
    Internal { detail: String },
}

/// Errors raised by the offline shapefile ingest.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Shapefile headers are malformed or the attribute table length
    /// disagrees with the geometry count. Aborts the build.
    #[error("source format error: {detail}")]
    SourceFormat { detail: String },

    #[error("ingest I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LookupError {
    /// Whether this error is an input-validation rejection that should be
    /// surfaced to the caller without logging.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LookupError::CoordinateOutOfRange { .. } | LookupError::CoordinateNotFinite { .. }
        )
    }
}

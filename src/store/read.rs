//! Read-only handle over a built district store.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use geo::MultiPolygon;
use rstar::RTree;
use tracing::debug;

use crate::common::sha256_remainder;
use crate::district::DistrictRow;
use crate::error::{LookupError, StoreError};
use crate::geom::BboxEntry;
use crate::store::codec::{self, Cursor};
use crate::store::format::{StoreMeta, BUILDER_VERSION, GEOMETRY_ENCODING, HEADER_LEN, MAGIC};

/// Store-level figures reported through `stats()`.
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub total_districts: u64,
    pub school_year: String,
    pub tolerance: f64,
}

/// Read-only district store. Rows, bounding boxes, and the state index
/// are resident; geometry blobs are read from the file on demand.
#[derive(Debug)]
pub struct DistrictStore {
    meta: StoreMeta,
    rows: Vec<DistrictRow>,
    rtree: RTree<BboxEntry>,
    state_index: BTreeMap<String, Vec<u32>>,
    /// Absolute file offset of the geometry region payload.
    geom_region_start: u64,
    file: Mutex<File>,
}

impl DistrictStore {
    /// Open a store in shared-read mode, verifying magic, builder
    /// version, and body digest before trusting any of it.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let mut file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::Missing { path: path.display().to_string() }
            } else {
                StoreError::Io(e)
            }
        })?;

        let mut magic = [0u8; 4];
        read_header_bytes(&mut file, &mut magic)?;
        if &magic != MAGIC {
            return Err(StoreError::Corrupt { detail: "bad magic bytes".into() });
        }

        let mut version_bytes = [0u8; 4];
        read_header_bytes(&mut file, &mut version_bytes)?;
        let version = u32::from_le_bytes(version_bytes);
        if version > BUILDER_VERSION {
            return Err(StoreError::VersionMismatch { found: version, supported: BUILDER_VERSION });
        }

        let mut digest = [0u8; 32];
        read_header_bytes(&mut file, &mut digest)?;

        let actual = sha256_remainder(&mut file)
            .map_err(|e| StoreError::Corrupt { detail: format!("hashing store body: {e}") })?;
        if actual != digest {
            return Err(StoreError::Corrupt { detail: "body digest mismatch".into() });
        }

        file.seek(SeekFrom::Start(HEADER_LEN))?;
        let mut offset = HEADER_LEN;

        let meta_buf = read_section(&mut file, &mut offset)?;
        let meta: StoreMeta = serde_json::from_slice(&meta_buf)
            .map_err(|e| StoreError::Corrupt { detail: format!("meta section: {e}") })?;
        if meta.geometry_encoding != GEOMETRY_ENCODING {
            return Err(StoreError::Corrupt {
                detail: format!("unknown geometry encoding {:?}", meta.geometry_encoding),
            });
        }

        let row_buf = read_section(&mut file, &mut offset)?;
        let rows = decode_rows(&row_buf)?;
        if rows.len() as u64 != meta.district_count {
            return Err(StoreError::Corrupt {
                detail: format!(
                    "row count {} disagrees with header count {}",
                    rows.len(),
                    meta.district_count
                ),
            });
        }

        let bbox_buf = read_section(&mut file, &mut offset)?;
        let entries = decode_bbox_entries(&bbox_buf, rows.len())?;

        let state_buf = read_section(&mut file, &mut offset)?;
        let state_index = decode_state_index(&state_buf, rows.len())?;

        // the geometry region length prefix sits at the current offset
        let mut len_bytes = [0u8; 8];
        file.read_exact(&mut len_bytes)
            .map_err(|_| StoreError::Corrupt { detail: "missing geometry region".into() })?;
        let geom_region_len = u64::from_le_bytes(len_bytes);
        let geom_region_start = offset + 8;

        for row in &rows {
            if row.geom_offset + row.geom_len > geom_region_len {
                return Err(StoreError::Corrupt {
                    detail: format!("geometry blob for {} outside region", row.id),
                });
            }
        }

        debug!(
            districts = rows.len(),
            school_year = %meta.school_year,
            tolerance = meta.tolerance,
            "opened district store"
        );

        Ok(Self {
            meta,
            rtree: RTree::bulk_load(entries),
            rows,
            state_index,
            geom_region_start,
            file: Mutex::new(file),
        })
    }

    pub fn meta(&self) -> &StoreMeta {
        &self.meta
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All district rows, in store order.
    pub fn rows(&self) -> impl Iterator<Item = &DistrictRow> {
        self.rows.iter()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            total_districts: self.rows.len() as u64,
            school_year: self.meta.school_year.clone(),
            tolerance: self.meta.tolerance,
        }
    }

    /// Rows whose bounding box covers `(lng, lat)`, in row order.
    pub fn candidates_covering(&self, lng: f64, lat: f64) -> Vec<&DistrictRow> {
        let mut hits: Vec<u32> = self
            .rtree
            .locate_all_at_point(&[lng, lat])
            .map(|entry| entry.row())
            .collect();
        hits.sort_unstable();
        hits.into_iter().map(|i| &self.rows[i as usize]).collect()
    }

    /// The `k` rows whose centroids are nearest to `(lng, lat)` by
    /// planar squared distance, nearest first; row order breaks ties.
    pub fn nearest_by_centroid(&self, lng: f64, lat: f64, k: usize) -> Vec<&DistrictRow> {
        let mut scored: Vec<(f64, u32)> = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| (row.centroid_dist2(lng, lat), i as u32))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        scored
            .into_iter()
            .take(k)
            .map(|(_, i)| &self.rows[i as usize])
            .collect()
    }

    /// Number of districts per state FIPS code, sorted by code.
    pub fn state_counts(&self) -> Vec<(String, usize)> {
        self.state_index
            .iter()
            .map(|(code, rows)| (code.clone(), rows.len()))
            .collect()
    }

    /// Read and decode the geometry blob for one row. Blocking read
    /// against the store file; failures are per-candidate errors.
    pub fn read_geometry(&self, row: &DistrictRow) -> Result<MultiPolygon<f64>, LookupError> {
        let mut blob = vec![0u8; row.geom_len as usize];
        {
            let mut file = self.file.lock().expect("store file poisoned");
            file.seek(SeekFrom::Start(self.geom_region_start + row.geom_offset))
                .and_then(|_| file.read_exact(&mut blob))
                .map_err(|e| LookupError::GeometryDecode {
                    district_id: row.id.as_str().to_string(),
                    detail: format!("reading blob: {e}"),
                })?;
        }
        codec::decode_geometry(&blob).map_err(|e| LookupError::GeometryDecode {
            district_id: row.id.as_str().to_string(),
            detail: e.to_string(),
        })
    }
}

fn read_header_bytes(file: &mut File, buf: &mut [u8]) -> Result<(), StoreError> {
    file.read_exact(buf)
        .map_err(|_| StoreError::Corrupt { detail: "header truncated".into() })
}

/// Read one length-prefixed section into memory, advancing `offset`
/// past the prefix and payload.
fn read_section(file: &mut File, offset: &mut u64) -> Result<Vec<u8>, StoreError> {
    let mut len_bytes = [0u8; 8];
    file.read_exact(&mut len_bytes)
        .map_err(|_| StoreError::Corrupt { detail: "section prefix truncated".into() })?;
    let len = u64::from_le_bytes(len_bytes);
    let mut buf = vec![0u8; len as usize];
    file.read_exact(&mut buf)
        .map_err(|_| StoreError::Corrupt { detail: "section payload truncated".into() })?;
    *offset += 8 + len;
    Ok(buf)
}

fn decode_rows(buf: &[u8]) -> Result<Vec<DistrictRow>, StoreError> {
    let mut cursor = Cursor::new(buf);
    let count = cursor.read_u64()? as usize;
    let mut rows = Vec::with_capacity(count);
    for _ in 0..count {
        rows.push(codec::decode_row(&mut cursor)?);
    }
    if !cursor.is_empty() {
        return Err(StoreError::Corrupt { detail: "trailing bytes in row section".into() });
    }
    Ok(rows)
}

fn decode_bbox_entries(buf: &[u8], row_count: usize) -> Result<Vec<BboxEntry>, StoreError> {
    use geo::{Coord, Rect};

    let mut cursor = Cursor::new(buf);
    let count = cursor.read_u64()? as usize;
    if count != row_count {
        return Err(StoreError::Corrupt {
            detail: format!("bbox index has {count} entries for {row_count} rows"),
        });
    }
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let min_lng = cursor.read_f64()?;
        let max_lng = cursor.read_f64()?;
        let min_lat = cursor.read_f64()?;
        let max_lat = cursor.read_f64()?;
        let row = cursor.read_u32()?;
        if row as usize >= row_count {
            return Err(StoreError::Corrupt { detail: "bbox entry references missing row".into() });
        }
        entries.push(BboxEntry::new(
            row,
            Rect::new(Coord { x: min_lng, y: min_lat }, Coord { x: max_lng, y: max_lat }),
        ));
    }
    if !cursor.is_empty() {
        return Err(StoreError::Corrupt { detail: "trailing bytes in bbox section".into() });
    }
    Ok(entries)
}

fn decode_state_index(
    buf: &[u8],
    row_count: usize,
) -> Result<BTreeMap<String, Vec<u32>>, StoreError> {
    let mut cursor = Cursor::new(buf);
    let count = cursor.read_u64()? as usize;
    let mut index: BTreeMap<String, Vec<u32>> = BTreeMap::new();
    for _ in 0..count {
        let code = cursor.read_str()?;
        let row = cursor.read_u32()?;
        if row as usize >= row_count {
            return Err(StoreError::Corrupt {
                detail: "state index entry references missing row".into(),
            });
        }
        index.entry(code).or_default().push(row);
    }
    if !cursor.is_empty() {
        return Err(StoreError::Corrupt { detail: "trailing bytes in state section".into() });
    }
    Ok(index)
}

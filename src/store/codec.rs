//! Binary encoding of district rows and geometry blobs.
//!
//! All integers are little-endian. Geometry blobs are a WKB-style
//! multipolygon encoding wrapped in gzip; rows are a flat field list.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use geo::{Coord, LineString, MultiPolygon, Polygon, Rect};

use crate::district::{DistrictId, DistrictRow};
use crate::error::StoreError;

/// WKB byte order marker: little endian.
const WKB_LE: u8 = 1;
/// WKB geometry type for MultiPolygon.
const WKB_MULTIPOLYGON: u32 = 6;

fn corrupt(detail: impl Into<String>) -> StoreError {
    StoreError::Corrupt { detail: detail.into() }
}

/// Forward-only reader over a byte slice.
pub(super) struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(super) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(super) fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], StoreError> {
        let end = self.pos.checked_add(n).ok_or_else(|| corrupt("length overflow"))?;
        if end > self.buf.len() {
            return Err(corrupt("section truncated"));
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub(super) fn read_u8(&mut self) -> Result<u8, StoreError> {
        Ok(self.take(1)?[0])
    }

    pub(super) fn read_u16(&mut self) -> Result<u16, StoreError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub(super) fn read_u32(&mut self) -> Result<u32, StoreError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub(super) fn read_u64(&mut self) -> Result<u64, StoreError> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub(super) fn read_f64(&mut self) -> Result<f64, StoreError> {
        Ok(f64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub(super) fn read_str(&mut self) -> Result<String, StoreError> {
        let len = self.read_u16()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| corrupt("invalid utf-8 in string field"))
    }
}

pub(super) fn write_str(out: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    out.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
    out.extend_from_slice(bytes);
}

/// Append one district row to `out`.
pub(super) fn encode_row(out: &mut Vec<u8>, row: &DistrictRow) {
    write_str(out, row.id.as_str());
    write_str(out, &row.name);
    write_str(out, &row.state_fips);
    write_str(out, &row.grade_lowest);
    write_str(out, &row.grade_highest);
    out.extend_from_slice(&row.land_area_m2.to_le_bytes());
    out.extend_from_slice(&row.water_area_m2.to_le_bytes());
    out.extend_from_slice(&row.bbox.min().x.to_le_bytes());
    out.extend_from_slice(&row.bbox.min().y.to_le_bytes());
    out.extend_from_slice(&row.bbox.max().x.to_le_bytes());
    out.extend_from_slice(&row.bbox.max().y.to_le_bytes());
    out.extend_from_slice(&row.centroid.0.to_le_bytes());
    out.extend_from_slice(&row.centroid.1.to_le_bytes());
    out.extend_from_slice(&row.geom_offset.to_le_bytes());
    out.extend_from_slice(&row.geom_len.to_le_bytes());
}

/// Read one district row.
pub(super) fn decode_row(cursor: &mut Cursor<'_>) -> Result<DistrictRow, StoreError> {
    let id = DistrictId::new(&cursor.read_str()?);
    let name = cursor.read_str()?;
    let state_fips = cursor.read_str()?;
    let grade_lowest = cursor.read_str()?;
    let grade_highest = cursor.read_str()?;
    let land_area_m2 = cursor.read_f64()?;
    let water_area_m2 = cursor.read_f64()?;
    let min_x = cursor.read_f64()?;
    let min_y = cursor.read_f64()?;
    let max_x = cursor.read_f64()?;
    let max_y = cursor.read_f64()?;
    let centroid = (cursor.read_f64()?, cursor.read_f64()?);
    let geom_offset = cursor.read_u64()?;
    let geom_len = cursor.read_u64()?;

    Ok(DistrictRow {
        id,
        name,
        state_fips,
        grade_lowest,
        grade_highest,
        land_area_m2,
        water_area_m2,
        bbox: Rect::new(Coord { x: min_x, y: min_y }, Coord { x: max_x, y: max_y }),
        centroid,
        geom_offset,
        geom_len,
    })
}

/// Encode a multipolygon as a gzip-compressed WKB-style blob.
pub fn encode_geometry(mp: &MultiPolygon<f64>) -> Result<Vec<u8>, StoreError> {
    let mut raw = Vec::new();
    raw.push(WKB_LE);
    raw.extend_from_slice(&WKB_MULTIPOLYGON.to_le_bytes());
    raw.extend_from_slice(&(mp.0.len() as u32).to_le_bytes());
    for poly in &mp.0 {
        let num_rings = 1 + poly.interiors().len() as u32;
        raw.extend_from_slice(&num_rings.to_le_bytes());
        for ring in std::iter::once(poly.exterior()).chain(poly.interiors().iter()) {
            raw.extend_from_slice(&(ring.0.len() as u32).to_le_bytes());
            for coord in &ring.0 {
                raw.extend_from_slice(&coord.x.to_le_bytes());
                raw.extend_from_slice(&coord.y.to_le_bytes());
            }
        }
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&raw)
        .map_err(|e| corrupt(format!("compressing geometry: {e}")))?;
    encoder
        .finish()
        .map_err(|e| corrupt(format!("finishing geometry compression: {e}")))
}

/// Decode a geometry blob written by [`encode_geometry`].
pub fn decode_geometry(blob: &[u8]) -> Result<MultiPolygon<f64>, StoreError> {
    let mut decoder = GzDecoder::new(blob);
    let mut raw = Vec::new();
    decoder
        .read_to_end(&mut raw)
        .map_err(|e| corrupt(format!("decompressing geometry: {e}")))?;

    let mut cursor = Cursor::new(&raw);
    if cursor.read_u8()? != WKB_LE {
        return Err(corrupt("unexpected geometry byte order"));
    }
    let geom_type = cursor.read_u32()?;
    if geom_type != WKB_MULTIPOLYGON {
        return Err(corrupt(format!("unexpected geometry type {geom_type}")));
    }

    let num_polys = cursor.read_u32()? as usize;
    let mut polys = Vec::with_capacity(num_polys);
    for _ in 0..num_polys {
        let num_rings = cursor.read_u32()? as usize;
        if num_rings == 0 {
            return Err(corrupt("polygon without rings"));
        }
        let mut rings = Vec::with_capacity(num_rings);
        for _ in 0..num_rings {
            let num_points = cursor.read_u32()? as usize;
            let mut coords = Vec::with_capacity(num_points);
            for _ in 0..num_points {
                let x = cursor.read_f64()?;
                let y = cursor.read_f64()?;
                coords.push(Coord { x, y });
            }
            rings.push(LineString(coords));
        }
        let exterior = rings.remove(0);
        polys.push(Polygon::new(exterior, rings));
    }

    if !cursor.is_empty() {
        return Err(corrupt("trailing bytes after geometry"));
    }

    Ok(MultiPolygon(polys))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn geometry_blob_round_trips() {
        let mp = MultiPolygon(vec![
            polygon![
                (x: -71.2, y: 42.2),
                (x: -70.8, y: 42.2),
                (x: -70.8, y: 42.5),
                (x: -71.2, y: 42.5),
                (x: -71.2, y: 42.2),
            ],
            polygon![
                (x: -73.0, y: 41.0),
                (x: -72.5, y: 41.0),
                (x: -72.5, y: 41.4),
                (x: -73.0, y: 41.0),
            ],
        ]);
        let blob = encode_geometry(&mp).unwrap();
        let decoded = decode_geometry(&blob).unwrap();
        assert_eq!(decoded, mp);
    }

    #[test]
    fn garbage_blob_is_rejected() {
        assert!(decode_geometry(b"not a geometry").is_err());
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let mp = MultiPolygon(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]]);
        let blob = encode_geometry(&mp).unwrap();
        // valid gzip stream over truncated payload
        let mut raw = Vec::new();
        GzDecoder::new(&blob[..]).read_to_end(&mut raw).unwrap();
        raw.truncate(raw.len() - 4);
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&raw).unwrap();
        let reblob = enc.finish().unwrap();
        assert!(decode_geometry(&reblob).is_err());
    }

    #[test]
    fn row_encoding_round_trips() {
        use geo::Coord;
        let row = DistrictRow {
            id: DistrictId::new("2502790"),
            name: "Boston".into(),
            state_fips: "25".into(),
            grade_lowest: "PK".into(),
            grade_highest: "12".into(),
            land_area_m2: 1.25e8,
            water_area_m2: 3.1e7,
            bbox: Rect::new(Coord { x: -71.2, y: 42.2 }, Coord { x: -70.9, y: 42.4 }),
            centroid: (-71.05, 42.31),
            geom_offset: 1024,
            geom_len: 512,
        };
        let mut buf = Vec::new();
        encode_row(&mut buf, &row);
        let mut cursor = Cursor::new(&buf);
        let decoded = decode_row(&mut cursor).unwrap();
        assert!(cursor.is_empty());
        assert_eq!(decoded.id, row.id);
        assert_eq!(decoded.name, row.name);
        assert_eq!(decoded.bbox, row.bbox);
        assert_eq!(decoded.centroid, row.centroid);
        assert_eq!(decoded.geom_offset, row.geom_offset);
        assert_eq!(decoded.geom_len, row.geom_len);
    }
}

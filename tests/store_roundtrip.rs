// Integration tests for the store build/read cycle:
//   invariants after build, reopen round-trip, corruption and version
//   refusal, and the no-partial-output guarantee.

use std::fs;
use std::io::{Read, Write};

use geo::{polygon, BoundingRect, MultiPolygon};
use tempfile::TempDir;

use district_atlas::{DistrictStore, RawDistrict, StoreBuilder, StoreError};

fn square_district(geoid: &str, state: &str, x0: f64, y0: f64, size: f64) -> RawDistrict {
    RawDistrict {
        geoid: geoid.to_string(),
        name: format!("District {geoid}"),
        state_fips: state.to_string(),
        grade_lowest: "PK".to_string(),
        grade_highest: "12".to_string(),
        land_area_m2: 2.0e8,
        water_area_m2: 1.0e7,
        school_year: "2023-2024".to_string(),
        geometry: MultiPolygon(vec![polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ]]),
    }
}

fn fixture_records() -> Vec<RawDistrict> {
    vec![
        square_district("2502790", "25", -72.0, 42.0, 1.0),
        square_district("2502791", "25", -71.0, 42.0, 1.0),
        square_district("3600001", "36", -75.0, 40.5, 1.0),
    ]
}

#[test]
fn built_store_reopens_with_same_counts_and_meta() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fixture.atlas");

    let summary = StoreBuilder::new(1e-4)
        .build_from_records(fixture_records(), "fixture.shp", &path)
        .unwrap();
    assert_eq!(summary.districts, 3);

    let store = DistrictStore::open(&path).unwrap();
    assert_eq!(store.len(), 3);
    assert_eq!(store.meta().school_year, "2023-2024");
    assert_eq!(store.meta().district_count, 3);
    assert!((store.meta().tolerance - 1e-4).abs() < 1e-12);
    assert_eq!(store.meta().source, "fixture.shp");

    // reopening again yields the same answers
    let store2 = DistrictStore::open(&path).unwrap();
    assert_eq!(store2.len(), store.len());
    let ids1: Vec<_> = store.rows().map(|r| r.id.clone()).collect();
    let ids2: Vec<_> = store2.rows().map(|r| r.id.clone()).collect();
    assert_eq!(ids1, ids2);
}

#[test]
fn stored_bbox_is_tight_envelope_and_contains_centroid() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fixture.atlas");
    let tolerance = 1e-4;

    StoreBuilder::new(tolerance)
        .build_from_records(fixture_records(), "fixture.shp", &path)
        .unwrap();
    let store = DistrictStore::open(&path).unwrap();

    for row in store.rows() {
        let geometry = store.read_geometry(row).unwrap();
        let envelope = geometry.bounding_rect().unwrap();

        // simplified envelope stays inside the stored bbox, within tolerance
        assert!(envelope.min().x >= row.bbox.min().x - tolerance, "{}", row.id);
        assert!(envelope.min().y >= row.bbox.min().y - tolerance, "{}", row.id);
        assert!(envelope.max().x <= row.bbox.max().x + tolerance, "{}", row.id);
        assert!(envelope.max().y <= row.bbox.max().y + tolerance, "{}", row.id);

        // and the bbox is tight, not padded
        assert!((envelope.min().x - row.bbox.min().x).abs() <= tolerance);
        assert!((envelope.max().x - row.bbox.max().x).abs() <= tolerance);

        let (cx, cy) = row.centroid;
        assert!(cx >= row.bbox.min().x && cx <= row.bbox.max().x);
        assert!(cy >= row.bbox.min().y && cy <= row.bbox.max().y);

        assert!(row.land_area_m2 >= 0.0);
        assert!(row.water_area_m2 >= 0.0);
    }
}

#[test]
fn district_ids_are_unique_and_non_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fixture.atlas");

    StoreBuilder::new(1e-4)
        .build_from_records(fixture_records(), "fixture.shp", &path)
        .unwrap();
    let store = DistrictStore::open(&path).unwrap();

    let mut ids: Vec<_> = store.rows().map(|r| r.id.as_str().to_string()).collect();
    assert!(ids.iter().all(|id| !id.is_empty()));
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), store.len());
}

#[test]
fn candidates_covering_probes_the_bbox_index() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fixture.atlas");

    StoreBuilder::new(1e-4)
        .build_from_records(fixture_records(), "fixture.shp", &path)
        .unwrap();
    let store = DistrictStore::open(&path).unwrap();

    let hits = store.candidates_covering(-71.5, 42.5);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id.as_str(), "2502790");

    // point on the shared edge of the two Massachusetts squares
    let hits = store.candidates_covering(-71.0, 42.5);
    assert_eq!(hits.len(), 2);

    assert!(store.candidates_covering(-100.0, 45.0).is_empty());
}

#[test]
fn nearest_by_centroid_orders_by_planar_distance() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fixture.atlas");

    StoreBuilder::new(1e-4)
        .build_from_records(fixture_records(), "fixture.shp", &path)
        .unwrap();
    let store = DistrictStore::open(&path).unwrap();

    let nearest = store.nearest_by_centroid(-70.0, 42.5, 5);
    assert_eq!(nearest.len(), 3);
    assert_eq!(nearest[0].id.as_str(), "2502791");
    assert_eq!(nearest[1].id.as_str(), "2502790");
    assert_eq!(nearest[2].id.as_str(), "3600001");

    let nearest = store.nearest_by_centroid(-70.0, 42.5, 2);
    assert_eq!(nearest.len(), 2);
}

#[test]
fn state_counts_come_from_the_state_index() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fixture.atlas");

    StoreBuilder::new(1e-4)
        .build_from_records(fixture_records(), "fixture.shp", &path)
        .unwrap();
    let store = DistrictStore::open(&path).unwrap();

    assert_eq!(
        store.state_counts(),
        vec![("25".to_string(), 2), ("36".to_string(), 1)]
    );
}

#[test]
fn missing_store_is_reported_as_missing() {
    let dir = TempDir::new().unwrap();
    let err = DistrictStore::open(&dir.path().join("absent.atlas")).unwrap_err();
    assert!(matches!(err, StoreError::Missing { .. }));
}

#[test]
fn flipped_body_byte_is_reported_as_corrupt() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fixture.atlas");

    StoreBuilder::new(1e-4)
        .build_from_records(fixture_records(), "fixture.shp", &path)
        .unwrap();

    let mut bytes = Vec::new();
    fs::File::open(&path).unwrap().read_to_end(&mut bytes).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0xff;
    fs::File::create(&path).unwrap().write_all(&bytes).unwrap();

    let err = DistrictStore::open(&path).unwrap_err();
    assert!(matches!(err, StoreError::Corrupt { .. }));
}

#[test]
fn newer_builder_version_is_refused() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fixture.atlas");

    StoreBuilder::new(1e-4)
        .build_from_records(fixture_records(), "fixture.shp", &path)
        .unwrap();

    let mut bytes = Vec::new();
    fs::File::open(&path).unwrap().read_to_end(&mut bytes).unwrap();
    // the digest only covers the body, so bumping the header version
    // leaves an otherwise intact file
    bytes[4..8].copy_from_slice(&99u32.to_le_bytes());
    fs::File::create(&path).unwrap().write_all(&bytes).unwrap();

    let err = DistrictStore::open(&path).unwrap_err();
    assert!(matches!(err, StoreError::VersionMismatch { found: 99, .. }));
}

#[test]
fn failed_build_leaves_no_output() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fixture.atlas");

    let mut records = fixture_records();
    records.push(square_district("2502790", "25", -60.0, 10.0, 1.0)); // duplicate GEOID

    assert!(StoreBuilder::new(1e-4)
        .build_from_records(records, "fixture.shp", &path)
        .is_err());
    assert!(!path.exists());
}

#[test]
fn invalid_and_degenerate_features_are_counted_not_fatal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fixture.atlas");

    let mut records = fixture_records();
    // bowtie ring crosses itself
    records.push(RawDistrict {
        geometry: MultiPolygon(vec![polygon![
            (x: -80.0, y: 40.0),
            (x: -79.0, y: 41.0),
            (x: -79.0, y: 40.0),
            (x: -80.0, y: 41.0),
            (x: -80.0, y: 40.0),
        ]]),
        ..square_district("9999901", "42", 0.0, 0.0, 0.0)
    });
    // no geometry at all
    records.push(RawDistrict {
        geometry: MultiPolygon(vec![]),
        ..square_district("9999902", "42", 0.0, 0.0, 0.0)
    });

    let summary = StoreBuilder::new(1e-4)
        .build_from_records(records, "fixture.shp", &path)
        .unwrap();
    assert_eq!(summary.districts, 3);
    assert_eq!(summary.rejected_invalid, 1);
    assert_eq!(summary.rejected_degenerate, 1);

    let store = DistrictStore::open(&path).unwrap();
    assert_eq!(store.len(), 3);
}

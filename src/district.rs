//! District records and attribute presentation.

use std::sync::Arc;

use geo::Rect;
use serde::{Deserialize, Serialize};

/// Square meters per square mile.
pub const SQ_METERS_PER_SQ_MILE: f64 = 2_589_988.11;

/// Stable NCES GEOID for a district. Keeps the original text (with
/// leading zeros) but avoids repeated owned Strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DistrictId(pub Arc<str>);

impl DistrictId {
    pub fn new(id: &str) -> Self {
        Self(Arc::from(id))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DistrictId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One resident row of the district store. Geometry stays on disk; the
/// row carries only its blob location.
#[derive(Debug, Clone)]
pub struct DistrictRow {
    pub id: DistrictId,
    pub name: String,
    /// Two-character state FIPS code.
    pub state_fips: String,
    /// Raw grade-range codes from the source, e.g. "PK", "KG", "09".
    pub grade_lowest: String,
    pub grade_highest: String,
    pub land_area_m2: f64,
    pub water_area_m2: f64,
    /// Tight axis-aligned envelope of the stored geometry.
    pub bbox: Rect<f64>,
    /// Area-weighted centroid, (lng, lat).
    pub centroid: (f64, f64),
    /// Geometry blob location within the store file.
    pub geom_offset: u64,
    pub geom_len: u64,
}

impl DistrictRow {
    /// Planar squared distance from the row centroid to `(lng, lat)`.
    #[inline]
    pub fn centroid_dist2(&self, lng: f64, lat: f64) -> f64 {
        let dx = self.centroid.0 - lng;
        let dy = self.centroid.1 - lat;
        dx * dx + dy * dy
    }
}

/// District attributes as presented to callers, with grade codes
/// normalized and areas converted to square miles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictSummary {
    pub district_id: String,
    pub name: String,
    pub state_code: String,
    /// Normalized "lowest-highest" grade range, e.g. "Pre-K-12".
    pub grade_range: String,
    /// Land area in square miles.
    pub area_sq_miles: f64,
    /// Water area in square miles.
    pub water_area_sq_miles: f64,
    pub school_year: String,
}

impl DistrictSummary {
    pub fn from_row(row: &DistrictRow, school_year: &str) -> Self {
        Self {
            district_id: row.id.as_str().to_string(),
            name: row.name.clone(),
            state_code: row.state_fips.clone(),
            grade_range: format!(
                "{}-{}",
                normalize_grade(&row.grade_lowest),
                normalize_grade(&row.grade_highest)
            ),
            area_sq_miles: row.land_area_m2 / SQ_METERS_PER_SQ_MILE,
            water_area_sq_miles: row.water_area_m2 / SQ_METERS_PER_SQ_MILE,
            school_year: school_year.to_string(),
        }
    }
}

/// Map an NCES grade code to its presentation form.
///
/// `PK` is Pre-Kindergarten, `KG` is Kindergarten, `UG` is ungraded;
/// numeric codes lose their leading zeros. Unknown codes pass through.
pub fn normalize_grade(code: &str) -> String {
    match code {
        "PK" => "Pre-K".to_string(),
        "KG" => "K".to_string(),
        "UG" => "Ungraded".to_string(),
        other => {
            let stripped = other.trim_start_matches('0');
            if stripped.is_empty() && !other.is_empty() {
                // all zeros, keep one
                "0".to_string()
            } else if stripped.chars().all(|c| c.is_ascii_digit()) && !stripped.is_empty() {
                stripped.to_string()
            } else {
                other.to_string()
            }
        }
    }
}

/// Return the USPS postal code for a two-digit state FIPS code.
/// Covers the 50 states, DC, and the island territories NCES publishes.
pub fn postal_for_fips(fips: &str) -> Option<&'static str> {
    match fips {
        "01" => Some("AL"),
        "02" => Some("AK"),
        "04" => Some("AZ"),
        "05" => Some("AR"),
        "06" => Some("CA"),
        "08" => Some("CO"),
        "09" => Some("CT"),
        "10" => Some("DE"),
        "11" => Some("DC"),
        "12" => Some("FL"),
        "13" => Some("GA"),
        "15" => Some("HI"),
        "16" => Some("ID"),
        "17" => Some("IL"),
        "18" => Some("IN"),
        "19" => Some("IA"),
        "20" => Some("KS"),
        "21" => Some("KY"),
        "22" => Some("LA"),
        "23" => Some("ME"),
        "24" => Some("MD"),
        "25" => Some("MA"),
        "26" => Some("MI"),
        "27" => Some("MN"),
        "28" => Some("MS"),
        "29" => Some("MO"),
        "30" => Some("MT"),
        "31" => Some("NE"),
        "32" => Some("NV"),
        "33" => Some("NH"),
        "34" => Some("NJ"),
        "35" => Some("NM"),
        "36" => Some("NY"),
        "37" => Some("NC"),
        "38" => Some("ND"),
        "39" => Some("OH"),
        "40" => Some("OK"),
        "41" => Some("OR"),
        "42" => Some("PA"),
        "44" => Some("RI"),
        "45" => Some("SC"),
        "46" => Some("SD"),
        "47" => Some("TN"),
        "48" => Some("TX"),
        "49" => Some("UT"),
        "50" => Some("VT"),
        "51" => Some("VA"),
        "53" => Some("WA"),
        "54" => Some("WV"),
        "55" => Some("WI"),
        "56" => Some("WY"),
        "60" => Some("AS"),
        "66" => Some("GU"),
        "69" => Some("MP"),
        "72" => Some("PR"),
        "78" => Some("VI"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Coord;

    #[test]
    fn grade_codes_normalize_for_presentation() {
        assert_eq!(normalize_grade("PK"), "Pre-K");
        assert_eq!(normalize_grade("KG"), "K");
        assert_eq!(normalize_grade("UG"), "Ungraded");
        assert_eq!(normalize_grade("09"), "9");
        assert_eq!(normalize_grade("12"), "12");
        assert_eq!(normalize_grade("00"), "0");
        assert_eq!(normalize_grade("M"), "M"); // unknown passes through
    }

    #[test]
    fn summary_converts_areas_and_grades() {
        let row = DistrictRow {
            id: DistrictId::new("2502790"),
            name: "Boston".into(),
            state_fips: "25".into(),
            grade_lowest: "PK".into(),
            grade_highest: "12".into(),
            land_area_m2: SQ_METERS_PER_SQ_MILE * 2.0,
            water_area_m2: SQ_METERS_PER_SQ_MILE,
            bbox: Rect::new(Coord { x: -71.2, y: 42.2 }, Coord { x: -70.9, y: 42.4 }),
            centroid: (-71.05, 42.31),
            geom_offset: 0,
            geom_len: 0,
        };
        let summary = DistrictSummary::from_row(&row, "2023-2024");
        assert_eq!(summary.grade_range, "Pre-K-12");
        assert!((summary.area_sq_miles - 2.0).abs() < 1e-9);
        assert!((summary.water_area_sq_miles - 1.0).abs() < 1e-9);
        assert_eq!(summary.school_year, "2023-2024");
    }

    #[test]
    fn centroid_distance_is_planar_squared() {
        let row = DistrictRow {
            id: DistrictId::new("x"),
            name: String::new(),
            state_fips: String::new(),
            grade_lowest: String::new(),
            grade_highest: String::new(),
            land_area_m2: 0.0,
            water_area_m2: 0.0,
            bbox: Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 }),
            centroid: (-71.0, 42.0),
            geom_offset: 0,
            geom_len: 0,
        };
        assert!((row.centroid_dist2(-70.0, 41.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn territory_fips_codes_resolve() {
        assert_eq!(postal_for_fips("25"), Some("MA"));
        assert_eq!(postal_for_fips("72"), Some("PR"));
        assert_eq!(postal_for_fips("78"), Some("VI"));
        assert_eq!(postal_for_fips("99"), None);
    }
}

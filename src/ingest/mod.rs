mod reader;

pub use reader::{RawDistrict, ReadSummary, ShapefileReader};

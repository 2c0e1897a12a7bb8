mod cache;
mod codec;
mod format;
mod read;
mod write;

pub use cache::GeometryCache;
pub use format::{StoreMeta, BUILDER_VERSION, MAGIC};
pub use read::{DistrictStore, StoreStats};
pub use write::{BuildSummary, StoreBuilder};

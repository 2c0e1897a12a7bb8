mod lookup;
mod result;

pub use lookup::{CancelToken, LookupEngine};
pub use result::{EngineStats, LookupOutcome, LookupResult};

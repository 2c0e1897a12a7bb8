mod build;
mod lookup;
mod stats;

pub use build::build;
pub use lookup::lookup;
pub use stats::stats;

mod liveness_counters;
mod reporter;

pub use liveness_counters::*;
pub use reporter::*;

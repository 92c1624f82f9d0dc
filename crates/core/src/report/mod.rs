pub mod aggregate;
pub mod types;

pub use aggregate::{aggregate, deduplicate, merge, RiskSummary, SeverityCounts};
pub use types::*;

pub mod extract;
pub mod lines;
pub mod topology;

pub use extract::{parse, parse_scanned, UNKNOWN_CONTRACT};
pub use lines::{scan, ScannedSource, SourceLine};
pub use topology::*;

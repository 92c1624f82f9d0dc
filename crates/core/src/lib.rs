pub mod analyzer;
pub mod config;
pub mod external;
pub mod finding;
pub mod parser;
pub mod report;
pub mod rule;
pub mod source;

pub use analyzer::Analyzer;

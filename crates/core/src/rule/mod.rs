pub mod context;
pub mod engine;
pub mod registry;
pub mod traits;

pub use context::RuleContext;
pub use engine::{DetectionOutcome, RuleEngine, RuleFailure};
pub use registry::RuleRegistry;
pub use traits::{Rule, RuleError};

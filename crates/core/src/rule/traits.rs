use thiserror::Error;

use super::context::RuleContext;
use crate::finding::{Category, Finding, Severity};

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Core trait for all vulnerability rules.
/// Implementors scan one contract's lines and topology and return findings.
pub trait Rule: Send + Sync {
    /// Unique identifier for this rule (e.g., "reentrancy")
    fn name(&self) -> &str;

    /// Human-readable description of what this rule checks
    fn description(&self) -> &str;

    /// Category every finding from this rule is filed under
    fn category(&self) -> Category;

    /// Base severity of findings from this rule
    fn severity(&self) -> Severity;

    /// Run detection on the given context, return findings
    fn detect(&self, ctx: &RuleContext) -> Result<Vec<Finding>, RuleError>;
}

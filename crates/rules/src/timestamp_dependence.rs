use once_cell::sync::Lazy;
use regex::Regex;
use solguard::finding::*;
use solguard::rule::{Rule, RuleContext, RuleError};

/// Detects control flow that depends on the block timestamp, which miners
/// can shift by several seconds.
pub struct TimestampDependence;

static TIMESTAMP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bblock\.timestamp\b|\bnow\b").unwrap());

static CONDITION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:if|require|while|assert)\s*\(|[<>]=?|[!=]=|\?").unwrap()
});

impl Rule for TimestampDependence {
    fn name(&self) -> &str {
        "timestamp-dependence"
    }

    fn description(&self) -> &str {
        "Detects block.timestamp or now used in conditions"
    }

    fn category(&self) -> Category {
        Category::TimestampDependence
    }

    fn severity(&self) -> Severity {
        Severity::Low
    }

    fn detect(&self, ctx: &RuleContext) -> Result<Vec<Finding>, RuleError> {
        let mut findings = Vec::new();

        for line in ctx.lines() {
            let code = line.code.replace("=>", "  ");
            if !TIMESTAMP_RE.is_match(&code) || !CONDITION_RE.is_match(&code) {
                continue;
            }

            findings.push(
                Finding::new(
                    self.name(),
                    self.category(),
                    self.severity(),
                    "Block timestamp used in a condition",
                    ctx.location(line.number),
                    DetectionMethod::PatternMatching,
                )
                .with_description(
                    "A branch or requirement depends on the block timestamp. Block \
                     producers can adjust it within a small window.",
                )
                .with_impact("Outcomes near a time boundary can be influenced")
                .with_likelihood("Low")
                .with_recommendation(
                    "Avoid relying on exact timestamps for critical logic; tolerate a \
                     drift of at least 15 seconds or use block numbers.",
                )
                .with_reference("SWC-116"),
            );
        }

        Ok(findings)
    }
}

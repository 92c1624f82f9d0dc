use once_cell::sync::Lazy;
use regex::Regex;
use solguard::finding::*;
use solguard::rule::{Rule, RuleContext, RuleError};

/// Detects value-carrying low-level calls that are not guarded on the same line.
/// A call that forwards ether hands control to the recipient, which can call
/// back before the caller's state is updated.
pub struct Reentrancy;

static VALUE_CALL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\.call\s*\{[^}]*\bvalue\s*:|\.call\.value\s*\(").unwrap()
});

impl Rule for Reentrancy {
    fn name(&self) -> &str {
        "reentrancy"
    }

    fn description(&self) -> &str {
        "Detects external calls that forward ether without a guard on the same line"
    }

    fn category(&self) -> Category {
        Category::Reentrancy
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }

    fn detect(&self, ctx: &RuleContext) -> Result<Vec<Finding>, RuleError> {
        let mut findings = Vec::new();

        for line in ctx.lines() {
            if !VALUE_CALL_RE.is_match(&line.code) || line.code.contains("require(") {
                continue;
            }

            let location = ctx.location(line.number);
            let subject = match &location.function {
                Some(name) => format!("`{}`", name),
                None => "contract".to_string(),
            };

            findings.push(
                Finding::new(
                    self.name(),
                    self.category(),
                    self.severity(),
                    format!("Reentrancy vulnerability in {}", subject),
                    location,
                    DetectionMethod::PatternMatching,
                )
                .with_description(
                    "External call forwards ether to an address that can execute code. \
                     If contract state is updated after this call, the recipient can \
                     re-enter and repeat the operation before the update takes effect.",
                )
                .with_impact("Attacker can drain contract funds through recursive calls")
                .with_likelihood("High")
                .with_recommendation(
                    "Apply the checks-effects-interactions pattern: update balances \
                     before the external call, or protect the function with a reentrancy \
                     guard such as OpenZeppelin's `nonReentrant`.",
                )
                .with_potential_loss("All ether held by the contract")
                .with_reference("SWC-107"),
            );
        }

        Ok(findings)
    }
}

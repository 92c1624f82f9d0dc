use once_cell::sync::Lazy;
use regex::Regex;
use solguard::finding::*;
use solguard::rule::{Rule, RuleContext, RuleError};

use crate::patterns::is_owner_restricted;

/// Detects `selfdestruct` reachable from a function anyone can call.
pub struct UnprotectedSelfdestruct;

static SELFDESTRUCT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(selfdestruct|suicide)\s*\(").unwrap());

impl Rule for UnprotectedSelfdestruct {
    fn name(&self) -> &str {
        "unprotected-selfdestruct"
    }

    fn description(&self) -> &str {
        "Detects selfdestruct in functions without owner restriction"
    }

    fn category(&self) -> Category {
        Category::AccessControl
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn detect(&self, ctx: &RuleContext) -> Result<Vec<Finding>, RuleError> {
        let mut findings = Vec::new();

        for line in ctx.lines() {
            let Some(caps) = SELFDESTRUCT_RE.captures(&line.code) else {
                continue;
            };

            if let Some(function) = ctx.enclosing_function(line.number) {
                // Internal helpers are only reachable through other functions.
                if !function.is_entry_point()
                    || is_owner_restricted(function, ctx.function_lines(function))
                {
                    continue;
                }
            }

            findings.push(
                Finding::new(
                    self.name(),
                    self.category(),
                    self.severity(),
                    format!("Unprotected `{}`", &caps[1]),
                    ctx.location(line.number),
                    DetectionMethod::PatternMatching,
                )
                .with_description(
                    "The contract can be destroyed by any caller, removing its code and \
                     sending its ether balance to an arbitrary address.",
                )
                .with_impact("Permanent loss of contract functionality and funds")
                .with_likelihood("High")
                .with_recommendation(
                    "Restrict the function to the owner (e.g. `onlyOwner`) or remove \
                     the self-destruct capability.",
                )
                .with_potential_loss("Entire contract balance")
                .with_reference("SWC-106"),
            );
        }

        Ok(findings)
    }
}

use solguard::finding::*;
use solguard::parser::FunctionSignature;
use solguard::rule::{Rule, RuleContext, RuleError};

use crate::patterns::is_owner_restricted;

/// Detects externally callable, state-changing functions that move or create
/// value without restricting who may call them.
pub struct MissingAccessControl;

/// Vocabulary of operations that move or create value.
const SENSITIVE_WORDS: &[&str] = &["transfer", "withdraw", "mint", "burn"];

fn mentions_sensitive(text: &str) -> bool {
    let lower = text.to_lowercase();
    SENSITIVE_WORDS.iter().any(|w| lower.contains(w))
}

fn is_candidate(function: &FunctionSignature) -> bool {
    function.is_entry_point() && !function.is_read_only()
}

impl Rule for MissingAccessControl {
    fn name(&self) -> &str {
        "missing-access-control"
    }

    fn description(&self) -> &str {
        "Detects public value-moving functions without an owner check"
    }

    fn category(&self) -> Category {
        Category::AccessControl
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn detect(&self, ctx: &RuleContext) -> Result<Vec<Finding>, RuleError> {
        let mut findings = Vec::new();

        for function in ctx.topology.functions.iter().filter(|f| is_candidate(f)) {
            let body = ctx.function_lines(function);

            let declared_with_require = ctx
                .line(function.line)
                .is_some_and(|l| l.code.contains("require("));
            if declared_with_require || is_owner_restricted(function, body) {
                continue;
            }

            let sensitive = mentions_sensitive(&function.name)
                || body.iter().any(|l| mentions_sensitive(&l.code));
            if !sensitive {
                continue;
            }

            findings.push(
                Finding::new(
                    self.name(),
                    self.category(),
                    self.severity(),
                    format!("Missing access control on `{}`", function.name),
                    ctx.location(function.line),
                    DetectionMethod::PatternMatching,
                )
                .with_description(format!(
                    "Function `{}` is callable by any account and moves or creates value, \
                     but has no owner-restriction modifier and no sender check.",
                    function.name
                ))
                .with_impact("Unauthorized accounts may transfer, mint or burn assets")
                .with_likelihood("Medium")
                .with_recommendation(
                    "Restrict the function with a modifier such as `onlyOwner` or \
                     `onlyRole(...)`, or check `msg.sender` explicitly.",
                )
                .with_reference("SWC-105"),
            );
        }

        Ok(findings)
    }
}

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, warn};

use super::context::RuleContext;
use super::engine::{DetectionOutcome, RuleFailure};
use super::traits::Rule;

/// Registry that holds all rules and runs them against one contract.
pub struct RuleRegistry {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Register a rule
    pub fn register(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    /// Register multiple rules at once
    pub fn register_all(&mut self, rules: Vec<Box<dyn Rule>>) {
        self.rules.extend(rules);
    }

    /// Keep only the rules the predicate accepts
    pub fn retain(&mut self, mut keep: impl FnMut(&dyn Rule) -> bool) {
        self.rules.retain(|r| keep(r.as_ref()));
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run all registered rules in registration order. A rule that errors or
    /// panics is skipped and recorded; the others still run.
    pub fn run_all(&self, ctx: &RuleContext) -> DetectionOutcome {
        let mut outcome = DetectionOutcome::default();

        for rule in &self.rules {
            let result = catch_unwind(AssertUnwindSafe(|| rule.detect(ctx)));
            match result {
                Ok(Ok(findings)) => {
                    debug!(rule = rule.name(), count = findings.len(), "rule finished");
                    outcome.findings.extend(findings);
                }
                Ok(Err(e)) => {
                    warn!(rule = rule.name(), error = %e, "rule failed, skipping");
                    outcome.skipped.push(RuleFailure {
                        rule: rule.name().to_string(),
                        message: e.to_string(),
                    });
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    warn!(rule = rule.name(), %message, "rule panicked, skipping");
                    outcome.skipped.push(RuleFailure {
                        rule: rule.name().to_string(),
                        message,
                    });
                }
            }
        }

        outcome
    }

    /// List all registered rule names
    pub fn list_rules(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::*;
    use crate::parser::{parse_scanned, scan};
    use crate::rule::RuleError;

    struct MockRule;

    impl Rule for MockRule {
        fn name(&self) -> &str {
            "mock-rule"
        }
        fn description(&self) -> &str {
            "A mock rule for testing"
        }
        fn category(&self) -> Category {
            Category::LogicError
        }
        fn severity(&self) -> Severity {
            Severity::Medium
        }
        fn detect(&self, ctx: &RuleContext) -> Result<Vec<Finding>, RuleError> {
            Ok(vec![Finding::new(
                self.name(),
                self.category(),
                self.severity(),
                "Mock Finding",
                ctx.location(1),
                DetectionMethod::PatternMatching,
            )])
        }
    }

    struct PanickingRule;

    impl Rule for PanickingRule {
        fn name(&self) -> &str {
            "panicking-rule"
        }
        fn description(&self) -> &str {
            "Always panics"
        }
        fn category(&self) -> Category {
            Category::Other
        }
        fn severity(&self) -> Severity {
            Severity::High
        }
        fn detect(&self, _ctx: &RuleContext) -> Result<Vec<Finding>, RuleError> {
            panic!("boom")
        }
    }

    struct FailingRule;

    impl Rule for FailingRule {
        fn name(&self) -> &str {
            "failing-rule"
        }
        fn description(&self) -> &str {
            "Always errors"
        }
        fn category(&self) -> Category {
            Category::Other
        }
        fn severity(&self) -> Severity {
            Severity::Low
        }
        fn detect(&self, _ctx: &RuleContext) -> Result<Vec<Finding>, RuleError> {
            let pattern = format!("({}", "unclosed");
            regex::Regex::new(&pattern)?;
            Ok(Vec::new())
        }
    }

    const SOURCE: &str = "contract A {\n}\n";

    #[test]
    fn test_register_and_run() {
        let mut registry = RuleRegistry::new();
        registry.register(Box::new(MockRule));

        let scanned = scan(SOURCE);
        let topology = parse_scanned(&scanned, "A.sol").topology;
        let ctx = RuleContext::new(&scanned, &topology);
        let outcome = registry.run_all(&ctx);

        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].rule_name, "mock-rule");
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn test_list_rules() {
        let mut registry = RuleRegistry::new();
        registry.register(Box::new(MockRule));
        assert_eq!(registry.list_rules(), vec!["mock-rule"]);
    }

    #[test]
    fn test_failing_rules_are_isolated() {
        let mut registry = RuleRegistry::new();
        registry.register_all(vec![
            Box::new(PanickingRule),
            Box::new(FailingRule),
            Box::new(MockRule),
        ]);

        let scanned = scan(SOURCE);
        let topology = parse_scanned(&scanned, "A.sol").topology;
        let ctx = RuleContext::new(&scanned, &topology);
        let outcome = registry.run_all(&ctx);

        assert_eq!(outcome.findings.len(), 1);
        let skipped: Vec<&str> = outcome.skipped.iter().map(|s| s.rule.as_str()).collect();
        assert_eq!(skipped, vec!["panicking-rule", "failing-rule"]);
        assert!(outcome.skipped[0].message.contains("boom"));
        assert!(outcome.skipped[1].message.starts_with("invalid pattern"));
    }

    #[test]
    fn test_retain() {
        let mut registry = RuleRegistry::new();
        registry.register_all(vec![Box::new(MockRule), Box::new(FailingRule)]);
        registry.retain(|r| r.severity() <= Severity::Medium);
        assert_eq!(registry.list_rules(), vec!["mock-rule"]);
    }
}

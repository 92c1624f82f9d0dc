use serde::Serialize;

use super::context::RuleContext;
use super::registry::RuleRegistry;
use crate::finding::Finding;
use crate::parser::{scan, ContractTopology, ScannedSource};

/// A rule that could not complete on one input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleFailure {
    pub rule: String,
    pub message: String,
}

/// Findings in detection order plus the rules that were skipped.
#[derive(Debug, Clone, Default)]
pub struct DetectionOutcome {
    pub findings: Vec<Finding>,
    pub skipped: Vec<RuleFailure>,
}

/// Runs an injected rule set over a contract.
pub struct RuleEngine {
    registry: RuleRegistry,
}

impl RuleEngine {
    pub fn new(registry: RuleRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Scan the source and run every registered rule against it.
    pub fn detect(&self, source: &str, topology: &ContractTopology) -> DetectionOutcome {
        let scanned = scan(source);
        self.detect_scanned(&scanned, topology)
    }

    /// Same as [`detect`](Self::detect) for callers that already hold the line scan.
    pub fn detect_scanned(
        &self,
        scanned: &ScannedSource<'_>,
        topology: &ContractTopology,
    ) -> DetectionOutcome {
        let ctx = RuleContext::new(scanned, topology);
        self.registry.run_all(&ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::*;
    use crate::parser::parse;
    use crate::rule::{Rule, RuleError};

    /// Flags every line containing `.call{value:`
    struct ValueCallRule;

    impl Rule for ValueCallRule {
        fn name(&self) -> &str {
            "value-call"
        }
        fn description(&self) -> &str {
            "Flags value-carrying calls"
        }
        fn category(&self) -> Category {
            Category::Reentrancy
        }
        fn severity(&self) -> Severity {
            Severity::Critical
        }
        fn detect(&self, ctx: &RuleContext) -> Result<Vec<Finding>, RuleError> {
            Ok(ctx
                .lines()
                .iter()
                .filter(|l| l.code.contains(".call{value:"))
                .map(|l| {
                    Finding::new(
                        self.name(),
                        self.category(),
                        self.severity(),
                        "Value call",
                        ctx.location(l.number),
                        DetectionMethod::PatternMatching,
                    )
                })
                .collect())
        }
    }

    const SOURCE: &str = r#"contract Bank {
    function withdraw(uint256 amount) public {
        msg.sender.call{value: amount}("");
    }
}
"#;

    fn engine() -> RuleEngine {
        let mut registry = RuleRegistry::new();
        registry.register(Box::new(ValueCallRule));
        RuleEngine::new(registry)
    }

    #[test]
    fn test_detect_attaches_enclosing_function() {
        let topology = parse(SOURCE, "Bank.sol").topology;
        let outcome = engine().detect(SOURCE, &topology);

        assert_eq!(outcome.findings.len(), 1);
        let finding = &outcome.findings[0];
        assert_eq!(finding.location.start_line, 3);
        assert_eq!(finding.location.function.as_deref(), Some("withdraw"));
        assert_eq!(finding.risk_score(), 9.0);
    }

    #[test]
    fn test_detect_is_deterministic() {
        let topology = parse(SOURCE, "Bank.sol").topology;
        let engine = engine();
        let a = engine.detect(SOURCE, &topology);
        let b = engine.detect(SOURCE, &topology);
        let ids_a: Vec<_> = a.findings.iter().map(|f| f.id.clone()).collect();
        let ids_b: Vec<_> = b.findings.iter().map(|f| f.id.clone()).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn test_empty_registry_finds_nothing() {
        let topology = parse(SOURCE, "Bank.sol").topology;
        let outcome = RuleEngine::new(RuleRegistry::new()).detect(SOURCE, &topology);
        assert!(outcome.findings.is_empty());
        assert!(outcome.skipped.is_empty());
    }
}

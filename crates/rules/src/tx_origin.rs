use once_cell::sync::Lazy;
use regex::Regex;
use solguard::finding::*;
use solguard::rule::{Rule, RuleContext, RuleError};

/// Detects authorization decisions based on `tx.origin`.
pub struct TxOrigin;

static TX_ORIGIN_COMPARISON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\btx\.origin\s*[!=]=|[!=]=\s*tx\.origin\b").unwrap());

/// `msg.sender == tx.origin` only asserts the caller is an EOA.
static EOA_CHECK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"msg\.sender\s*[!=]=\s*tx\.origin|tx\.origin\s*[!=]=\s*msg\.sender").unwrap()
});

impl Rule for TxOrigin {
    fn name(&self) -> &str {
        "tx-origin"
    }

    fn description(&self) -> &str {
        "Detects tx.origin used for authorization"
    }

    fn category(&self) -> Category {
        Category::Authorization
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn detect(&self, ctx: &RuleContext) -> Result<Vec<Finding>, RuleError> {
        let mut findings = Vec::new();

        for line in ctx.lines() {
            if !TX_ORIGIN_COMPARISON_RE.is_match(&line.code) || EOA_CHECK_RE.is_match(&line.code) {
                continue;
            }

            let location = ctx.location(line.number);
            let fix = CodeFix {
                description: "Authorize the immediate caller".to_string(),
                original_code: line.raw.trim().to_string(),
                fixed_code: line.raw.trim().replace("tx.origin", "msg.sender"),
                explanation: "`tx.origin` is the account that started the transaction, so a \
                              malicious contract the owner interacts with passes the check. \
                              `msg.sender` is the direct caller."
                    .to_string(),
                risk_reduction: "High".to_string(),
            };

            findings.push(
                Finding::new(
                    self.name(),
                    self.category(),
                    self.severity(),
                    "Authorization through tx.origin",
                    location,
                    DetectionMethod::PatternMatching,
                )
                .with_description(
                    "Access is granted by comparing `tx.origin`. Any contract the authorized \
                     account calls can forward a call that passes this check.",
                )
                .with_impact("Phishing contracts can act with the owner's privileges")
                .with_likelihood("Medium")
                .with_recommendation("Use `msg.sender` for authorization checks.")
                .with_fix(fix)
                .with_reference("SWC-115"),
            );
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solguard::parser::{parse_scanned, scan};

    fn analyze(source: &str) -> Vec<Finding> {
        let scanned = scan(source);
        let topology = parse_scanned(&scanned, "Test.sol").topology;
        let ctx = RuleContext::new(&scanned, &topology);
        TxOrigin.detect(&ctx).unwrap()
    }

    #[test]
    fn test_detects_tx_origin_auth() {
        let source = r#"
contract Wallet {
    address owner;
    function transferTo(address payable to, uint amount) public {
        require(tx.origin == owner);
        to.transfer(amount);
    }
}
"#;
        let findings = analyze(source);
        assert_eq!(findings.len(), 1);
        let f = &findings[0];
        assert_eq!(f.severity(), Severity::High);
        assert_eq!(f.category, Category::Authorization);
        assert_eq!(f.location.start_line, 5);
        assert!(f.references.contains(&"CWE-285".to_string()));
        let fix = f.suggested_fix.as_ref().unwrap();
        assert_eq!(fix.fixed_code, "require(msg.sender == owner);");
    }

    #[test]
    fn test_no_finding_for_eoa_check_or_plain_use() {
        let source = r#"
contract Game {
    address lastPlayer;
    function play() public {
        require(msg.sender == tx.origin, "no contracts");
        lastPlayer = tx.origin;
    }
}
"#;
        assert!(analyze(source).is_empty());
    }
}

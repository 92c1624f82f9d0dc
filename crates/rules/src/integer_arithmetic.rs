use once_cell::sync::Lazy;
use regex::Regex;
use solguard::finding::*;
use solguard::rule::{Rule, RuleContext, RuleError};

use crate::patterns::{unchecked_lines, StateWriteMatcher};

/// Detects arithmetic on integer state variables that the compiler does not
/// check for overflow: any arithmetic before Solidity 0.8 (unless SafeMath is
/// used), and arithmetic inside `unchecked` blocks from 0.8 on.
pub struct IntegerArithmetic;

const SAFE_MATH_CALLS: &[&str] = &[".add(", ".sub(", ".mul("];

/// Binary `+`, `-` or `*` between two operands.
static BINARY_ARITH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\w)\]]\s*[-+*]\s*[\w(]").unwrap());

fn is_overflowing_operator(op: &str, rhs: &str) -> bool {
    match op {
        "+=" | "-=" | "*=" | "++" | "--" => true,
        "=" => BINARY_ARITH_RE.is_match(rhs),
        _ => false,
    }
}

impl Rule for IntegerArithmetic {
    fn name(&self) -> &str {
        "integer-arithmetic"
    }

    fn description(&self) -> &str {
        "Detects unchecked arithmetic on integer state variables"
    }

    fn category(&self) -> Category {
        Category::IntegerOverflow
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn detect(&self, ctx: &RuleContext) -> Result<Vec<Finding>, RuleError> {
        let topology = ctx.topology;
        let matcher = StateWriteMatcher::new(topology)?;
        let checked_compiler = topology.has_checked_arithmetic();
        let unchecked = if checked_compiler {
            unchecked_lines(ctx.lines())
        } else {
            Vec::new()
        };
        let uses_safe_math = ctx
            .lines()
            .iter()
            .any(|l| l.code.contains("using SafeMath"));

        if !checked_compiler && uses_safe_math {
            return Ok(Vec::new());
        }

        let mut findings = Vec::new();

        for line in ctx.lines() {
            if checked_compiler && !unchecked.contains(&line.number) {
                continue;
            }
            // Declarations at contract level are initializers, not arithmetic at runtime.
            if ctx.enclosing_function(line.number).is_none() {
                continue;
            }
            if SAFE_MATH_CALLS.iter().any(|c| line.code.contains(c)) {
                continue;
            }

            let Some(write) = matcher.first_write(&line.code) else {
                continue;
            };
            if !write.variable.is_integer()
                || !is_overflowing_operator(&write.operator, &write.rhs)
            {
                continue;
            }

            let description = if checked_compiler {
                format!(
                    "`{}` is modified inside an `unchecked` block, where overflow and \
                     underflow wrap silently.",
                    write.variable.name
                )
            } else {
                format!(
                    "`{}` is modified with `{}` under a compiler version without built-in \
                     overflow checks, and no SafeMath library is used.",
                    write.variable.name, write.operator
                )
            };

            findings.push(
                Finding::new(
                    self.name(),
                    self.category(),
                    self.severity(),
                    format!("Integer overflow/underflow on `{}`", write.variable.name),
                    ctx.location(line.number),
                    DetectionMethod::PatternMatching,
                )
                .with_description(description)
                .with_impact("Balances or counters can wrap around to unexpected values")
                .with_likelihood("Medium")
                .with_recommendation(
                    "Compile with Solidity 0.8 or later and avoid `unchecked` around \
                     user-controlled values, or use SafeMath for older compilers.",
                )
                .with_reference("SWC-101"),
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
        IntegerArithmetic.detect(&ctx).unwrap()
    }

    #[test]
    fn test_detects_pre_08_compound_assignment() {
        let source = r#"pragma solidity ^0.7.6;
contract Bank {
    mapping(address => uint256) balances;
    uint256 total;
    function deposit() public payable {
        balances[msg.sender] += msg.value;
        total = total + msg.value;
    }
}
"#;
        let findings = analyze(source);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].rule_name, "integer-arithmetic");
        assert_eq!(findings[0].category, Category::IntegerOverflow);
        assert_eq!(findings[0].location.start_line, 6);
        assert_eq!(findings[1].location.start_line, 7);
    }

    #[test]
    fn test_missing_pragma_counts_as_unchecked() {
        let source = r#"
contract Counter {
    uint count;
    function bump() public {
        count++;
    }
}
"#;
        assert_eq!(analyze(source).len(), 1);
    }

    #[test]
    fn test_no_finding_with_safe_math() {
        let source = r#"pragma solidity ^0.6.0;
contract Bank {
    using SafeMath for uint256;
    uint256 total;
    function deposit() public payable {
        total += msg.value;
    }
}
"#;
        assert!(analyze(source).is_empty());

        let source = r#"pragma solidity ^0.6.0;
contract Bank {
    uint256 total;
    function deposit() public payable {
        total = total.add(msg.value);
    }
}
"#;
        assert!(analyze(source).is_empty());
    }

    #[test]
    fn test_08_only_flags_unchecked_blocks() {
        let source = r#"pragma solidity ^0.8.19;
contract Counter {
    uint256 count;
    function bump() public {
        count += 1;
        unchecked {
            count -= 1;
        }
    }
}
"#;
        let findings = analyze(source);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].location.start_line, 7);
        assert!(findings[0].description.contains("unchecked"));
    }

    #[test]
    fn test_no_finding_for_non_integer_or_plain_assignment() {
        let source = r#"pragma solidity ^0.7.0;
contract Registry {
    address owner;
    uint256 fee;
    bool paused;
    function configure(uint256 newFee) public {
        owner = msg.sender;
        fee = newFee;
        paused = !paused;
        fee /= 2;
    }
}
"#;
        assert!(analyze(source).is_empty());
    }

    #[test]
    fn test_no_finding_for_contract_level_initializer() {
        let source = r#"pragma solidity ^0.7.0;
contract Config {
    uint256 limit = 10 * 2;
}
"#;
        assert!(analyze(source).is_empty());
    }
}

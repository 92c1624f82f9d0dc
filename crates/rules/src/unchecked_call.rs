use once_cell::sync::Lazy;
use regex::Regex;
use solguard::finding::*;
use solguard::parser::SourceLine;
use solguard::rule::{Rule, RuleContext, RuleError};

/// Detects low-level calls whose boolean success flag is ignored.
/// `call`, `delegatecall`, `staticcall` and `send` report failure through
/// their return value instead of reverting.
pub struct UncheckedCall;

static LOW_LEVEL_CALL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\.(call|delegatecall|staticcall|send)\s*(?:\{[^}]*\}|\.value\s*\([^)]*\))?\s*\(",
    )
    .unwrap()
});

/// Result consumed on the same line.
static INLINE_CHECK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:require|assert|if)\s*\(|\breturn\b").unwrap());

/// `(bool ok, ) = ...`, `bool ok = ...` or `ok = ...`
static CAPTURE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\(?\s*(?:bool\s+)?([A-Za-z_$][\w$]*)\s*(?:,[^)=]*)?\)?\s*=[^=]").unwrap()
});

enum CallUse {
    Checked,
    Discarded,
    CapturedUnchecked(String),
}

/// Statements split across lines are joined back to their start.
const MAX_STATEMENT_LINES: usize = 8;

/// Code of the statement containing `lines[idx]`, from its first line up to
/// and including the call line.
fn statement_text(lines: &[SourceLine<'_>], idx: usize) -> String {
    let mut start = idx;
    while start > 0 && idx - start < MAX_STATEMENT_LINES {
        let prev = lines[start - 1].trimmed();
        if prev.is_empty() || prev.ends_with(';') || prev.ends_with('{') || prev.ends_with('}') {
            break;
        }
        start -= 1;
    }
    lines[start..=idx]
        .iter()
        .map(|l| l.trimmed())
        .collect::<Vec<_>>()
        .join(" ")
}

fn classify(statement: &str, following: &[SourceLine<'_>]) -> Result<CallUse, RuleError> {
    if INLINE_CHECK_RE.is_match(statement) {
        return Ok(CallUse::Checked);
    }

    let Some(caps) = CAPTURE_RE.captures(statement) else {
        return Ok(CallUse::Discarded);
    };
    let var = caps[1].to_string();

    let name = regex::escape(&var);
    let tested = Regex::new(&format!(
        r"\b(?:require|assert|if)\s*\([^;]*\b{name}\b|\breturn\b[^;]*\b{name}\b"
    ))?;
    if following.iter().any(|l| tested.is_match(&l.code)) {
        Ok(CallUse::Checked)
    } else {
        Ok(CallUse::CapturedUnchecked(var))
    }
}

impl Rule for UncheckedCall {
    fn name(&self) -> &str {
        "unchecked-call"
    }

    fn description(&self) -> &str {
        "Detects low-level calls whose success value is never checked"
    }

    fn category(&self) -> Category {
        Category::UncheckedCall
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn detect(&self, ctx: &RuleContext) -> Result<Vec<Finding>, RuleError> {
        let mut findings = Vec::new();
        let lines = ctx.lines();

        for (idx, line) in lines.iter().enumerate() {
            let Some(caps) = LOW_LEVEL_CALL_RE.captures(&line.code) else {
                continue;
            };
            let method = caps[1].to_string();

            // The success flag must be tested before the enclosing function ends.
            let scope_end = ctx
                .enclosing_function(line.number)
                .map(|f| f.end_line)
                .unwrap_or(lines.len())
                .min(lines.len());
            let following = &lines[(idx + 1).min(scope_end)..scope_end];

            let statement = statement_text(lines, idx);
            let description = match classify(&statement, following)? {
                CallUse::Checked => continue,
                CallUse::Discarded => format!(
                    "The boolean returned by `.{}()` is discarded. A failed call does \
                     not revert, so execution continues as if it succeeded.",
                    method
                ),
                CallUse::CapturedUnchecked(var) => format!(
                    "The result of `.{}()` is stored in `{}` but never checked before \
                     the function returns.",
                    method, var
                ),
            };

            findings.push(
                Finding::new(
                    self.name(),
                    self.category(),
                    self.severity(),
                    format!("Unchecked return value of low-level `{}`", method),
                    ctx.location(line.number),
                    DetectionMethod::PatternMatching,
                )
                .with_description(description)
                .with_impact(
                    "Failed transfers or calls go unnoticed and state becomes inconsistent",
                )
                .with_likelihood("Medium")
                .with_recommendation(
                    "Check the returned success flag, e.g. \
                     `(bool ok, ) = to.call{value: amount}(\"\"); require(ok, \"call failed\");`",
                )
                .with_reference("SWC-104"),
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
        UncheckedCall.detect(&ctx).unwrap()
    }

    #[test]
    fn test_detects_discarded_call() {
        let source = r#"
contract Bank {
    function withdraw(uint256 amount) public {
        msg.sender.call{value: amount}("");
    }
}
"#;
        let findings = analyze(source);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_name, "unchecked-call");
        assert_eq!(findings[0].category, Category::UncheckedCall);
        assert_eq!(findings[0].location.start_line, 4);
        assert!(findings[0].description.contains("discarded"));
    }

    #[test]
    fn test_detects_discarded_send() {
        let source = r#"
contract Pay {
    function pay(address payable to) public {
        to.send(1 ether);
    }
}
"#;
        assert_eq!(analyze(source).len(), 1);
    }

    #[test]
    fn test_detects_captured_but_unchecked() {
        let source = r#"
contract Bank {
    function withdraw(uint256 amount) public {
        (bool success, ) = msg.sender.call{value: amount}("");
        emit Withdrawn(amount);
    }
    function other() public {
        require(success);
    }
}
"#;
        let findings = analyze(source);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].description.contains("`success`"));
    }

    #[test]
    fn test_no_finding_when_checked_later() {
        let source = r#"
contract Bank {
    function withdraw(uint256 amount) public {
        (bool success, ) = msg.sender.call{value: amount}("");
        require(success, "Transfer failed");
    }
}
"#;
        assert!(analyze(source).is_empty());
    }

    #[test]
    fn test_multiline_statement_is_joined() {
        let source = r#"
contract Bank {
    function withdraw(address to, uint256 amount) public {
        (bool ok, ) = payable(to)
            .call{value: amount}("");
        require(ok);
    }
    function pay(address payable to) public {
        require(
            to.send(1)
        );
    }
    function drop(address to) public {
        uint256 fee = 1;
        payable(to)
            .call{value: fee}("");
    }
}
"#;
        let findings = analyze(source);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].location.start_line, 16);
        assert!(findings[0].description.contains("discarded"));
    }

    #[test]
    fn test_no_finding_when_checked_inline() {
        let source = r#"
contract Bank {
    function a(address payable to) public {
        require(to.send(1));
    }
    function b(address payable to) public {
        if (!to.send(1)) { revert(); }
    }
    function c(address target) public returns (bool) {
        return target.delegatecall(abi.encode(1));
    }
}
"#;
        assert!(analyze(source).is_empty());
    }

    #[test]
    fn test_no_finding_for_transfer() {
        let source = r#"
contract Bank {
    function withdraw(uint256 amount) public {
        payable(msg.sender).transfer(amount);
    }
}
"#;
        assert!(analyze(source).is_empty());
    }
}

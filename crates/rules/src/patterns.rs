//! Lexical helpers shared by several rules.

use once_cell::sync::Lazy;
use regex::Regex;
use solguard::parser::{ContractTopology, FunctionSignature, SourceLine, StateVariable};
use solguard::rule::RuleError;

/// Type name ending right before an identifier: the identifier is being declared.
static DECLARED_TYPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:u?int\d*|bool|address(?:\s+payable)?|bytes\d*|string|[A-Z][\w$]*)(?:\s*\[[^\]]*\])*(?:\s+(?:memory|storage|calldata))?\s+$",
    )
    .unwrap()
});

/// Modifier names that conventionally restrict a function to its owner or an admin role.
const OWNER_MODIFIERS: &[&str] = &["auth", "requiresAuth", "whenOwner"];

/// Sender comparisons and ownership helpers that gate a function body.
static OWNERSHIP_CHECK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"msg\.sender\s*[!=]=|[!=]=\s*msg\.sender|\bhasRole\s*\(|\b_check(?:Owner|Role)\s*\(|(?i:\b(?:require|if)\s*\(.*(?:owner|admin))",
    )
    .unwrap()
});

/// Owner-restriction modifier on the signature (`onlyOwner`, `onlyRole`, `auth`, ...).
pub(crate) fn has_owner_modifier(function: &FunctionSignature) -> bool {
    function
        .modifiers
        .iter()
        .any(|m| m.starts_with("only") || OWNER_MODIFIERS.contains(&m.as_str()))
}

/// Sender or role check anywhere in the given lines. A balance lookup keyed
/// by `msg.sender` does not count.
pub(crate) fn has_ownership_check(lines: &[SourceLine<'_>]) -> bool {
    lines.iter().any(|l| OWNERSHIP_CHECK_RE.is_match(&l.code))
}

/// Function is restricted either by modifier or by an explicit check in its body.
pub(crate) fn is_owner_restricted(function: &FunctionSignature, body: &[SourceLine<'_>]) -> bool {
    has_owner_modifier(function) || has_ownership_check(body)
}

/// A write to a state variable found on one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StateWrite<'t> {
    pub variable: &'t StateVariable,
    /// `=`, `+=`, `-=`, `*=`, `/=`, `%=`, `++` or `--`
    pub operator: String,
    /// Code following the operator
    pub rhs: String,
}

/// Finds assignments, compound assignments and increments of state variables.
pub(crate) struct StateWriteMatcher<'t> {
    topology: &'t ContractTopology,
    postfix: Option<Regex>,
    prefix: Option<Regex>,
}

impl<'t> StateWriteMatcher<'t> {
    pub fn new(topology: &'t ContractTopology) -> Result<Self, RuleError> {
        let names: Vec<String> = topology
            .state_variables
            .iter()
            .filter(|v| !v.constant)
            .map(|v| regex::escape(&v.name))
            .collect();
        if names.is_empty() {
            return Ok(Self {
                topology,
                postfix: None,
                prefix: None,
            });
        }

        let alternation = names.join("|");
        let postfix = Regex::new(&format!(
            r"(?:^|[^\w$.])({})\b(?:\s*\[(?:[^\[\]]|\[[^\[\]]*\])*\])*\s*(\+\+|--|[-+*/%]?=)",
            alternation
        ))?;
        let prefix = Regex::new(&format!(r"(\+\+|--)\s*({})\b", alternation))?;

        Ok(Self {
            topology,
            postfix: Some(postfix),
            prefix: Some(prefix),
        })
    }

    /// First state write on the line, if any. Comparisons (`==`) and local
    /// declarations that shadow a state variable are not writes.
    pub fn first_write(&self, code: &str) -> Option<StateWrite<'t>> {
        let (postfix, prefix) = match (&self.postfix, &self.prefix) {
            (Some(a), Some(b)) => (a, b),
            _ => return None,
        };

        for caps in postfix.captures_iter(code) {
            let op = &caps[2];
            let end = caps.get(2).map(|m| m.end()).unwrap_or(code.len());
            if op == "=" && code[end..].starts_with('=') {
                continue;
            }
            let start = caps.get(1).map_or(0, |m| m.start());
            if DECLARED_TYPE_RE.is_match(&code[..start]) {
                continue;
            }
            if let Some(variable) = self.topology.state_variable(&caps[1]) {
                return Some(StateWrite {
                    variable,
                    operator: op.to_string(),
                    rhs: code[end..].trim().to_string(),
                });
            }
        }

        let caps = prefix.captures(code)?;
        let variable = self.topology.state_variable(&caps[2])?;
        Some(StateWrite {
            variable,
            operator: caps[1].to_string(),
            rhs: String::new(),
        })
    }
}

/// Line numbers covered by `unchecked { ... }` blocks.
pub(crate) fn unchecked_lines(lines: &[SourceLine<'_>]) -> Vec<usize> {
    static UNCHECKED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bunchecked\s*\{").unwrap());

    let mut covered = Vec::new();
    let mut idx = 0;
    while idx < lines.len() {
        let line = &lines[idx];
        if !UNCHECKED_RE.is_match(&line.code) {
            idx += 1;
            continue;
        }
        let outer = line.depth_before;
        let mut end = idx;
        while end < lines.len() {
            covered.push(lines[end].number);
            if lines[end].depth_after <= outer {
                break;
            }
            end += 1;
        }
        idx = end + 1;
    }
    covered
}

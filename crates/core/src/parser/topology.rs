use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

static VERSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\.(\d+)").unwrap());

/// Function visibility. Treated as internal when unspecified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    External,
    #[default]
    Internal,
    Private,
}

impl Visibility {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "public" => Some(Visibility::Public),
            "external" => Some(Visibility::External),
            "internal" => Some(Visibility::Internal),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

/// State mutability. `None` means the function may modify state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mutability {
    #[default]
    None,
    View,
    Pure,
    Payable,
}

impl Mutability {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "view" | "constant" => Some(Mutability::View),
            "pure" => Some(Mutability::Pure),
            "payable" => Some(Mutability::Payable),
            _ => None,
        }
    }
}

/// Parameter of a function signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parameter {
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSignature {
    pub name: String,
    pub visibility: Visibility,
    pub mutability: Mutability,
    pub parameters: Vec<Parameter>,
    pub returns: Vec<String>,
    pub modifiers: Vec<String>,
    /// 1-based line holding the `function` keyword
    pub line: usize,
    /// 1-based line where the body closes
    pub end_line: usize,
}

impl FunctionSignature {
    /// Callable from outside the contract.
    pub fn is_entry_point(&self) -> bool {
        matches!(self.visibility, Visibility::Public | Visibility::External)
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self.mutability, Mutability::View | Mutability::Pure)
    }

    pub fn contains_line(&self, line: usize) -> bool {
        self.line <= line && line <= self.end_line
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateVariable {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    pub constant: bool,
    pub line: usize,
}

impl StateVariable {
    /// Integer-typed value: `uintN`/`intN`, arrays of them, or mappings
    /// whose final value type is one.
    pub fn is_integer(&self) -> bool {
        let value_type = self
            .type_name
            .rsplit("=>")
            .next()
            .unwrap_or(&self.type_name)
            .trim()
            .trim_end_matches(')')
            .trim();
        let base = value_type.split('[').next().unwrap_or(value_type).trim();
        let digits = base
            .strip_prefix("uint")
            .or_else(|| base.strip_prefix("int"));
        matches!(digits, Some(d) if d.chars().all(|c| c.is_ascii_digit()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Complexity {
    Unknown,
    Low,
    Medium,
    High,
}

impl Complexity {
    /// The higher of the function-count level and the nesting-depth level,
    /// so more functions or deeper nesting never lowers the result.
    pub fn classify(function_count: usize, max_depth: usize) -> Self {
        let by_functions = match function_count {
            0..=5 => Complexity::Low,
            6..=15 => Complexity::Medium,
            _ => Complexity::High,
        };
        let by_depth = match max_depth {
            0..=3 => Complexity::Low,
            4..=5 => Complexity::Medium,
            _ => Complexity::High,
        };
        by_functions.max(by_depth)
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Complexity::Unknown => write!(f, "Unknown"),
            Complexity::Low => write!(f, "Low"),
            Complexity::Medium => write!(f, "Medium"),
            Complexity::High => write!(f, "High"),
        }
    }
}

/// Something the parser could not fully recognize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ParseAnomaly {
    #[error("no contract declaration found")]
    NoContractDeclaration,
    #[error("no contract structure recognized")]
    NoRecognizableStructure,
    #[error("closing brace without matching opening brace at line {line}")]
    UnbalancedBraces { line: usize },
    #[error("{depth} block(s) still open at end of input")]
    UnterminatedBlock { depth: usize },
    #[error("block comment opened at line {line} is never closed")]
    UnterminatedComment { line: usize },
    #[error("malformed parameter `{text}` at line {line}")]
    MalformedParameter { line: usize, text: String },
}

impl ParseAnomaly {
    /// Anomalies that make the extracted structure untrustworthy; the parser
    /// falls back to a minimal topology when any of these occur.
    pub fn is_degrading(&self) -> bool {
        matches!(
            self,
            ParseAnomaly::NoRecognizableStructure | ParseAnomaly::UnbalancedBraces { .. }
        )
    }
}

/// Structural summary of one contract source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractTopology {
    pub name: String,
    pub file_name: String,
    pub functions: Vec<FunctionSignature>,
    pub state_variables: Vec<StateVariable>,
    pub events: Vec<String>,
    pub modifiers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pragma: Option<String>,
    pub lines_of_code: usize,
    pub max_depth: usize,
    pub complexity: Complexity,
}

impl ContractTopology {
    /// Topology used when recognition fails: nothing extracted, every raw
    /// line counted, complexity unknown.
    pub fn minimal(name: String, file_name: String, raw_line_count: usize) -> Self {
        Self {
            name,
            file_name,
            functions: Vec::new(),
            state_variables: Vec::new(),
            events: Vec::new(),
            modifiers: Vec::new(),
            pragma: None,
            lines_of_code: raw_line_count,
            max_depth: 0,
            complexity: Complexity::Unknown,
        }
    }

    /// Innermost function whose span contains the line.
    pub fn function_at(&self, line: usize) -> Option<&FunctionSignature> {
        self.functions
            .iter()
            .filter(|f| f.contains_line(line))
            .max_by_key(|f| f.line)
    }

    pub fn state_variable(&self, name: &str) -> Option<&StateVariable> {
        self.state_variables.iter().find(|v| v.name == name)
    }

    /// `(major, minor)` of the lowest version the pragma admits.
    pub fn compiler_version(&self) -> Option<(u32, u32)> {
        let pragma = self.pragma.as_deref()?;
        let caps = VERSION_RE.captures(pragma)?;
        Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
    }

    /// Solidity 0.8+ reverts on overflow unless code opts out with `unchecked`.
    pub fn has_checked_arithmetic(&self) -> bool {
        matches!(self.compiler_version(), Some((major, minor)) if major > 0 || minor >= 8)
    }
}

/// Parser output: the topology plus everything that could not be recognized.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub topology: ContractTopology,
    pub anomalies: Vec<ParseAnomaly>,
}

impl ParseOutcome {
    /// True when the topology is the minimal fallback rather than a partial parse.
    pub fn is_degraded(&self) -> bool {
        self.anomalies.iter().any(ParseAnomaly::is_degrading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(type_name: &str) -> StateVariable {
        StateVariable {
            name: "v".to_string(),
            type_name: type_name.to_string(),
            visibility: None,
            constant: false,
            line: 1,
        }
    }

    #[test]
    fn test_integer_types() {
        assert!(var("uint256").is_integer());
        assert!(var("uint").is_integer());
        assert!(var("int8").is_integer());
        assert!(var("uint256[]").is_integer());
        assert!(var("mapping(address => uint256)").is_integer());
        assert!(var("mapping(address => mapping(address => uint))").is_integer());
        assert!(!var("address").is_integer());
        assert!(!var("mapping(uint256 => address)").is_integer());
        assert!(!var("bool").is_integer());
        assert!(!var("uintx").is_integer());
    }

    #[test]
    fn test_complexity_monotonic_in_functions() {
        let mut previous = Complexity::classify(0, 2);
        for count in 1..40 {
            let current = Complexity::classify(count, 2);
            assert!(current >= previous, "dropped at {} functions", count);
            previous = current;
        }
        assert_eq!(previous, Complexity::High);
    }

    #[test]
    fn test_complexity_depth() {
        assert_eq!(Complexity::classify(1, 2), Complexity::Low);
        assert_eq!(Complexity::classify(1, 4), Complexity::Medium);
        assert_eq!(Complexity::classify(1, 7), Complexity::High);
        assert_eq!(Complexity::classify(20, 1), Complexity::High);
    }

    #[test]
    fn test_compiler_version() {
        let mut topology =
            ContractTopology::minimal("A".to_string(), "A.sol".to_string(), 0);
        assert!(!topology.has_checked_arithmetic());

        topology.pragma = Some("^0.8.19".to_string());
        assert_eq!(topology.compiler_version(), Some((0, 8)));
        assert!(topology.has_checked_arithmetic());

        topology.pragma = Some(">=0.6.0 <0.9.0".to_string());
        assert!(!topology.has_checked_arithmetic());
    }

    #[test]
    fn test_degrading_anomalies() {
        assert!(!ParseAnomaly::NoContractDeclaration.is_degrading());
        assert!(ParseAnomaly::NoRecognizableStructure.is_degrading());
        assert!(ParseAnomaly::UnbalancedBraces { line: 3 }.is_degrading());
        assert!(!ParseAnomaly::UnterminatedBlock { depth: 1 }.is_degrading());
    }
}

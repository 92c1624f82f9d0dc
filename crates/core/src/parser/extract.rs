use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use super::lines::{scan, ScannedSource};
use super::topology::*;

pub const UNKNOWN_CONTRACT: &str = "UnknownContract";

/// Declarations whose `{` sits further down are joined with at most this many lines.
const MAX_SIGNATURE_LINES: usize = 8;

static CONTRACT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bcontract\s+([A-Za-z_$][\w$]*)").unwrap());
static FUNCTION_START_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bfunction\s+[A-Za-z_$][\w$]*\s*\(").unwrap());
static FUNCTION_DECL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bfunction\s+([A-Za-z_$][\w$]*)\s*\(([^)]*)\)\s*([^{;]*?)\s*\{").unwrap()
});
static RETURNS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\breturns\s*\(([^)]*)\)").unwrap());
static TRAILER_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z_$][\w$]*)\s*(\([^)]*\))?").unwrap());
static EVENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bevent\s+([A-Za-z_$][\w$]*)").unwrap());
static MODIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bmodifier\s+([A-Za-z_$][\w$]*)").unwrap());
static PRAGMA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bpragma\s+solidity\s+([^;]+);").unwrap());
static STATE_VAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(mapping\s*\(.*\)|[A-Za-z_$][\w$.]*(?:\s*\[[^\]]*\])*)((?:\s+[A-Za-z_$][\w$]*)*)\s+([A-Za-z_$][\w$]*)$",
    )
    .unwrap()
});
static IDENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_$][\w$]*$").unwrap());

const DATA_LOCATIONS: &[&str] = &["memory", "storage", "calldata"];

/// Trailer keywords that are neither visibility, mutability, nor custom modifiers.
const TRAILER_KEYWORDS: &[&str] = &["returns", "virtual", "override"];

/// First words that rule a body-level line out as a state variable declaration.
const NON_VARIABLE_KEYWORDS: &[&str] = &[
    "function",
    "modifier",
    "event",
    "error",
    "struct",
    "enum",
    "using",
    "constructor",
    "fallback",
    "receive",
    "return",
    "emit",
    "require",
    "revert",
    "assert",
    "if",
    "else",
    "for",
    "while",
    "do",
    "delete",
    "pragma",
    "import",
    "contract",
    "interface",
    "library",
    "abstract",
    "type",
];

/// Parse contract source into a topology. Never fails: unrecognizable input
/// yields the minimal topology with the reason recorded as an anomaly.
pub fn parse(source: &str, file_name: &str) -> ParseOutcome {
    let scanned = scan(source);
    parse_scanned(&scanned, file_name)
}

/// Parse from an existing line scan, so callers can share one pass with the rule engine.
pub fn parse_scanned(scanned: &ScannedSource<'_>, file_name: &str) -> ParseOutcome {
    let mut anomalies = scanned.anomalies.clone();

    let name = extract_contract_name(scanned);
    if anomalies.iter().any(ParseAnomaly::is_degrading) {
        return minimal_outcome(scanned, file_name, name, anomalies);
    }

    let functions = extract_functions(scanned, &mut anomalies);
    let state_variables = extract_state_variables(scanned);
    let events = collect_names(scanned, &EVENT_RE);
    let modifiers = collect_names(scanned, &MODIFIER_RE);
    let pragma = scanned
        .lines
        .iter()
        .find_map(|l| PRAGMA_RE.captures(&l.code))
        .map(|caps| caps[1].trim().to_string());
    if name.is_none() {
        // Libraries and interfaces keep their structure under the fallback name.
        anomalies.push(ParseAnomaly::NoContractDeclaration);
        if functions.is_empty()
            && state_variables.is_empty()
            && events.is_empty()
            && modifiers.is_empty()
        {
            anomalies.push(ParseAnomaly::NoRecognizableStructure);
            return minimal_outcome(scanned, file_name, None, anomalies);
        }
    }
    let lines_of_code = scanned.lines.iter().filter(|l| !l.is_code_empty()).count();
    let complexity = Complexity::classify(functions.len(), scanned.max_depth);

    debug!(
        file = file_name,
        functions = functions.len(),
        state_variables = state_variables.len(),
        %complexity,
        "parsed contract topology"
    );

    ParseOutcome {
        topology: ContractTopology {
            name: name.unwrap_or_else(|| UNKNOWN_CONTRACT.to_string()),
            file_name: file_name.to_string(),
            functions,
            state_variables,
            events,
            modifiers,
            pragma,
            lines_of_code,
            max_depth: scanned.max_depth,
            complexity,
        },
        anomalies,
    }
}

fn minimal_outcome(
    scanned: &ScannedSource<'_>,
    file_name: &str,
    name: Option<String>,
    anomalies: Vec<ParseAnomaly>,
) -> ParseOutcome {
    warn!(
        file = file_name,
        anomalies = anomalies.len(),
        "contract structure not recognized, using minimal topology"
    );
    let topology = ContractTopology::minimal(
        name.unwrap_or_else(|| UNKNOWN_CONTRACT.to_string()),
        file_name.to_string(),
        scanned.lines.len(),
    );
    ParseOutcome {
        topology,
        anomalies,
    }
}

fn extract_contract_name(scanned: &ScannedSource<'_>) -> Option<String> {
    scanned
        .lines
        .iter()
        .find_map(|l| CONTRACT_RE.captures(&l.code))
        .map(|caps| caps[1].to_string())
}

fn collect_names(scanned: &ScannedSource<'_>, re: &Regex) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for line in &scanned.lines {
        for caps in re.captures_iter(&line.code) {
            let name = &caps[1];
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}

fn extract_functions(
    scanned: &ScannedSource<'_>,
    anomalies: &mut Vec<ParseAnomaly>,
) -> Vec<FunctionSignature> {
    let mut functions = Vec::new();

    for (idx, line) in scanned.lines.iter().enumerate() {
        if !FUNCTION_START_RE.is_match(&line.code) {
            continue;
        }

        // Join continuation lines until the body opens or the declaration ends.
        let mut declaration = String::new();
        let mut open_idx = None;
        for (offset, next) in scanned.lines[idx..]
            .iter()
            .take(MAX_SIGNATURE_LINES)
            .enumerate()
        {
            if !declaration.is_empty() {
                declaration.push(' ');
            }
            declaration.push_str(next.trimmed());
            if next.code.contains('{') {
                open_idx = Some(idx + offset);
                break;
            }
            if next.code.contains(';') {
                break;
            }
        }

        let Some(open_idx) = open_idx else { continue };
        let Some(caps) = FUNCTION_DECL_RE.captures(&declaration) else {
            continue;
        };

        let parameters = parse_parameters(&caps[2], line.number, anomalies);
        let trailer = caps[3].to_string();
        let returns = RETURNS_RE
            .captures(&trailer)
            .map(|r| parse_return_types(&r[1]))
            .unwrap_or_default();
        let (visibility, mutability, modifiers) = parse_trailer(&RETURNS_RE.replace(&trailer, " "));

        functions.push(FunctionSignature {
            name: caps[1].to_string(),
            visibility,
            mutability,
            parameters,
            returns,
            modifiers,
            line: line.number,
            end_line: body_end_line(scanned, idx, open_idx),
        });
    }

    functions
}

/// Line on which the body opened at `open_idx` closes again.
fn body_end_line(scanned: &ScannedSource<'_>, decl_idx: usize, open_idx: usize) -> usize {
    let base_depth = scanned.lines[decl_idx].depth_before;
    scanned.lines[open_idx..]
        .iter()
        .find(|l| l.depth_after <= base_depth)
        .or_else(|| scanned.lines.last())
        .map_or(scanned.lines[decl_idx].number, |l| l.number)
}

fn parse_parameters(text: &str, line: usize, anomalies: &mut Vec<ParseAnomaly>) -> Vec<Parameter> {
    let mut parameters = Vec::new();

    for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let tokens: Vec<&str> = part
            .split_whitespace()
            .filter(|t| !DATA_LOCATIONS.contains(t) && *t != "indexed")
            .collect();

        let parsed = match tokens.split_last() {
            Some((name, type_tokens)) if !type_tokens.is_empty() && IDENT_RE.is_match(name) => {
                Some(Parameter {
                    type_name: type_tokens.join(" "),
                    name: name.to_string(),
                })
            }
            _ => None,
        };

        match parsed {
            Some(p) => parameters.push(p),
            None => anomalies.push(ParseAnomaly::MalformedParameter {
                line,
                text: part.to_string(),
            }),
        }
    }

    parameters
}

fn parse_return_types(text: &str) -> Vec<String> {
    text.split(',')
        .filter_map(|part| {
            let tokens: Vec<&str> = part
                .split_whitespace()
                .filter(|t| !DATA_LOCATIONS.contains(t))
                .collect();
            match tokens.as_slice() {
                [] => None,
                [single] => Some(single.to_string()),
                [init @ .., last] if *last != "payable" => Some(init.join(" ")),
                all => Some(all.join(" ")),
            }
        })
        .collect()
}

fn parse_trailer(trailer: &str) -> (Visibility, Mutability, Vec<String>) {
    let mut visibility = Visibility::default();
    let mut mutability = Mutability::default();
    let mut modifiers: Vec<String> = Vec::new();

    for caps in TRAILER_TOKEN_RE.captures_iter(trailer) {
        let word = &caps[1];
        if let Some(v) = Visibility::from_keyword(word) {
            visibility = v;
        } else if let Some(m) = Mutability::from_keyword(word) {
            mutability = m;
        } else if !TRAILER_KEYWORDS.contains(&word) && !modifiers.iter().any(|m| m == word) {
            modifiers.push(word.to_string());
        }
    }

    (visibility, mutability, modifiers)
}

/// State variables are declarations at the top level of a contract body:
/// depth exactly one, inside a `contract` block.
fn extract_state_variables(scanned: &ScannedSource<'_>) -> Vec<StateVariable> {
    let mut variables: Vec<StateVariable> = Vec::new();
    let mut in_contract = false;
    // `contract A is B` with the `{` on a following line
    let mut pending_contract = false;

    for line in &scanned.lines {
        if line.depth_before == 0 {
            let declares = CONTRACT_RE.is_match(&line.code);
            if line.depth_after > 0 {
                in_contract = declares || pending_contract;
                pending_contract = false;
            } else {
                in_contract = false;
                pending_contract = (declares && !line.code.contains('{'))
                    || (pending_contract && !line.code.contains('{'));
            }
            continue;
        }
        if !in_contract || line.depth_before != 1 || line.is_code_empty() {
            continue;
        }

        if let Some(var) = parse_state_variable(line.trimmed(), line.number) {
            if !variables.iter().any(|v| v.name == var.name) {
                variables.push(var);
            }
        }
    }

    variables
}

fn parse_state_variable(code: &str, line: usize) -> Option<StateVariable> {
    let statement = code.strip_suffix(';')?.trim();
    let first_word = statement
        .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
        .next()
        .unwrap_or("");
    if NON_VARIABLE_KEYWORDS.contains(&first_word) {
        return None;
    }

    let declaration = split_initializer(statement).trim();
    let caps = STATE_VAR_RE.captures(declaration)?;

    let mut type_name = caps[1].trim().to_string();
    let mut visibility = None;
    let mut constant = false;
    for word in caps[2].split_whitespace() {
        match word {
            "constant" | "immutable" => constant = true,
            "payable" => type_name.push_str(" payable"),
            other => {
                if let Some(v) = Visibility::from_keyword(other) {
                    visibility = Some(v);
                }
            }
        }
    }

    Some(StateVariable {
        name: caps[3].to_string(),
        type_name,
        visibility,
        constant,
        line,
    })
}

/// Text before the first plain `=` (not part of `=>`, `==`, `<=`, `>=`, `!=`).
fn split_initializer(statement: &str) -> &str {
    let bytes = statement.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'=' {
            continue;
        }
        let next = bytes.get(i + 1).copied();
        let prev = i.checked_sub(1).map(|p| bytes[p]);
        if matches!(next, Some(b'>') | Some(b'='))
            || matches!(prev, Some(b'=') | Some(b'!') | Some(b'<') | Some(b'>'))
        {
            continue;
        }
        return &statement[..i];
    }
    statement
}

#[cfg(test)]
mod tests {
    use super::*;

    const BANK: &str = r#"// SPDX-License-Identifier: MIT
pragma solidity ^0.7.6;

contract VulnerableBank {
    mapping(address => uint256) public balances;
    address public owner;
    uint256 totalDeposits = 0;
    string constant NAME = "bank; v1";

    event Deposit(address indexed user, uint256 amount);
    event Withdrawal(address indexed user, uint256 amount);

    modifier onlyOwner() {
        require(msg.sender == owner, "not owner");
        _;
    }

    constructor() {
        owner = msg.sender;
    }

    function deposit() public payable {
        uint256 shadow = msg.value;
        balances[msg.sender] += shadow;
    }

    function withdraw(uint256 amount) public {
        require(balances[msg.sender] >= amount);
        (bool ok, ) = msg.sender.call{value: amount}("");
        balances[msg.sender] -= amount;
    }

    function balanceOf(address who) external view returns (uint256 balance) {
        return balances[who];
    }

    function sweep(address payable to, bytes memory data)
        external
        onlyOwner
        returns (bool, bytes memory)
    {
        return to.call(data);
    }
}
"#;

    #[test]
    fn test_parse_bank() {
        let outcome = parse(BANK, "VulnerableBank.sol");
        assert!(!outcome.is_degraded(), "{:?}", outcome.anomalies);
        let t = &outcome.topology;

        assert_eq!(t.name, "VulnerableBank");
        assert_eq!(t.file_name, "VulnerableBank.sol");
        assert_eq!(t.pragma.as_deref(), Some("^0.7.6"));
        assert_eq!(t.events, vec!["Deposit", "Withdrawal"]);
        assert_eq!(t.modifiers, vec!["onlyOwner"]);
        assert_eq!(t.complexity, Complexity::Low);

        let names: Vec<&str> = t.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["deposit", "withdraw", "balanceOf", "sweep"]);

        let vars: Vec<&str> = t.state_variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(vars, vec!["balances", "owner", "totalDeposits", "NAME"]);
        assert!(t.state_variable("NAME").unwrap().constant);
        assert_eq!(
            t.state_variable("balances").unwrap().visibility,
            Some(Visibility::Public)
        );
    }

    #[test]
    fn test_function_signature_details() {
        let t = parse(BANK, "VulnerableBank.sol").topology;

        let deposit = &t.functions[0];
        assert_eq!(deposit.visibility, Visibility::Public);
        assert_eq!(deposit.mutability, Mutability::Payable);
        assert_eq!(deposit.line, 22);
        assert_eq!(deposit.end_line, 25);

        let withdraw = &t.functions[1];
        assert_eq!(withdraw.line, 27);
        assert_eq!(withdraw.mutability, Mutability::None);
        assert_eq!(
            withdraw.parameters,
            vec![Parameter {
                type_name: "uint256".to_string(),
                name: "amount".to_string()
            }]
        );

        let balance_of = &t.functions[2];
        assert_eq!(balance_of.visibility, Visibility::External);
        assert_eq!(balance_of.mutability, Mutability::View);
        assert_eq!(balance_of.returns, vec!["uint256"]);
        assert!(balance_of.modifiers.is_empty());

        let sweep = &t.functions[3];
        assert_eq!(sweep.line, 37);
        assert_eq!(sweep.modifiers, vec!["onlyOwner"]);
        assert_eq!(sweep.returns, vec!["bool", "bytes"]);
        assert_eq!(sweep.parameters[0].type_name, "address payable");
        assert_eq!(sweep.parameters[1].name, "data");
        assert_eq!(sweep.end_line, 43);
    }

    #[test]
    fn test_locals_are_not_state_variables() {
        let t = parse(BANK, "VulnerableBank.sol").topology;
        assert!(t.state_variable("shadow").is_none());
        assert!(t.state_variable("ok").is_none());
    }

    #[test]
    fn test_default_visibility_and_custom_modifiers() {
        let source = "contract A {\n    function f(uint a) whenNotPaused onlyRole(ADMIN) override {\n    }\n}\n";
        let t = parse(source, "A.sol").topology;
        let f = &t.functions[0];
        assert_eq!(f.visibility, Visibility::Internal);
        assert_eq!(f.mutability, Mutability::None);
        assert_eq!(f.modifiers, vec!["whenNotPaused", "onlyRole"]);
    }

    #[test]
    fn test_malformed_parameter_dropped() {
        let source = "contract A {\n    function f(uint256, address to) external {\n    }\n}\n";
        let outcome = parse(source, "A.sol");
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.topology.functions[0].parameters.len(), 1);
        assert!(outcome.anomalies.contains(&ParseAnomaly::MalformedParameter {
            line: 2,
            text: "uint256".to_string()
        }));
    }

    #[test]
    fn test_interface_declarations_without_body_skipped() {
        let source = "contract A {\n    function f() external;\n    function g() external {}\n}\n";
        let t = parse(source, "A.sol").topology;
        assert_eq!(t.functions.len(), 1);
        assert_eq!(t.functions[0].name, "g");
        assert_eq!(t.functions[0].end_line, 3);
    }

    #[test]
    fn test_lines_of_code_skip_comments() {
        let source = "// header\n\ncontract A {\n    /* block\n       comment */\n    uint x; // trailing\n}\n";
        let t = parse(source, "A.sol").topology;
        assert_eq!(t.lines_of_code, 3);
    }

    #[test]
    fn test_first_contract_wins() {
        let source = "contract First {}\ncontract Second {}\n";
        assert_eq!(parse(source, "x.sol").topology.name, "First");
    }

    #[test]
    fn test_degrades_on_garbage() {
        for source in ["", "   \n\n", "}}} not solidity {{", "\u{0}\u{1}binary"] {
            let outcome = parse(source, "junk.sol");
            assert!(outcome.is_degraded(), "input {:?}", source);
            let t = &outcome.topology;
            assert_eq!(t.complexity, Complexity::Unknown);
            assert!(t.functions.is_empty());
            assert!(t.state_variables.is_empty());
            assert!(t.events.is_empty());
            assert!(t.modifiers.is_empty());
            assert_eq!(t.lines_of_code, source.lines().count());
            assert_eq!(t.name, UNKNOWN_CONTRACT);
        }
    }

    #[test]
    fn test_library_file_keeps_functions() {
        let source = r#"
library Payouts {
    function withdraw(uint256 amount) public {
        payable(msg.sender).transfer(amount);
    }
}
"#;
        let outcome = parse(source, "Payouts.sol");
        assert!(!outcome.is_degraded());
        assert!(outcome.anomalies.contains(&ParseAnomaly::NoContractDeclaration));
        let t = &outcome.topology;
        assert_eq!(t.name, UNKNOWN_CONTRACT);
        assert_eq!(t.functions.len(), 1);
        assert_eq!(t.functions[0].name, "withdraw");
        assert_ne!(t.complexity, Complexity::Unknown);
    }

    #[test]
    fn test_unbalanced_braces_degrade_but_keep_name() {
        let outcome = parse("contract A {\n}\n}\n", "A.sol");
        assert!(outcome.is_degraded());
        assert_eq!(outcome.topology.name, "A");
        assert_eq!(outcome.topology.complexity, Complexity::Unknown);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let a = parse(BANK, "VulnerableBank.sol");
        let b = parse(BANK, "VulnerableBank.sol");
        assert_eq!(a.topology, b.topology);
        assert_eq!(a.anomalies, b.anomalies);
    }

    #[test]
    fn test_more_functions_never_lower_complexity() {
        let mut source = String::from("contract Grow {\n");
        let mut previous = Complexity::Unknown;
        for i in 0..25 {
            source.push_str(&format!("    function f{}() public {{\n    }}\n", i));
            let mut closed = source.clone();
            closed.push_str("}\n");
            let current = parse(&closed, "Grow.sol").topology.complexity;
            assert!(current >= previous);
            previous = current;
        }
        assert_eq!(previous, Complexity::High);
    }
}

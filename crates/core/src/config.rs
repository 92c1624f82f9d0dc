use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::finding::{Finding, Severity};
use crate::source::DEFAULT_MAX_FILE_SIZE;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".solguard.toml";

const IGNORE_MARKER: &str = "solguard-ignore";

/// Project-level configuration loaded from `.solguard.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub global: GlobalConfig,
    #[serde(default)]
    pub rules: HashMap<String, RuleConfig>,
    #[serde(default)]
    pub suppressions: SuppressionConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub external: ExternalConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub severity_threshold: String,
    pub output_format: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            severity_threshold: "info".to_string(),
            output_format: "text".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    pub enabled: Option<bool>,
    pub severity: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SuppressionConfig {
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Bytes
    pub max_file_size: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// Settings for the hosted analyzer used by `--external`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExternalConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 30,
            max_tokens: 4000,
            temperature: 0.1,
        }
    }
}

impl Config {
    /// Load config from a TOML file path. Returns default config if file doesn't exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Check if a rule is enabled according to config.
    pub fn is_rule_enabled(&self, name: &str) -> bool {
        self.rules.get(name).and_then(|r| r.enabled).unwrap_or(true)
    }

    /// Severity a rule's findings should be re-scored to, if overridden.
    pub fn severity_override(&self, name: &str) -> Option<Severity> {
        self.rules
            .get(name)
            .and_then(|r| r.severity.as_deref())
            .and_then(Severity::parse)
    }

    /// Parse the global severity threshold into a Severity value.
    pub fn severity_threshold(&self) -> Severity {
        Severity::parse(&self.global.severity_threshold).unwrap_or(Severity::Info)
    }

    /// Check if a file path should be excluded based on suppression glob patterns.
    pub fn is_file_excluded(&self, file_path: &Path) -> bool {
        let path_str = file_path.to_string_lossy();
        self.suppressions
            .files
            .iter()
            .any(|pattern| glob::Pattern::new(pattern).is_ok_and(|p| p.matches(&path_str)))
    }

    /// Generate default config file content.
    pub fn default_toml() -> &'static str {
        r#"# solguard configuration

[global]
# Minimum severity to report: "critical", "high", "medium", "low", "info"
severity_threshold = "info"
# Output format: "text", "json", "sarif"
output_format = "text"

# Per-rule overrides
# [rules.timestamp-dependence]
# enabled = false

# [rules.missing-access-control]
# severity = "high"

[suppressions]
# Glob patterns for files to skip entirely
files = ["node_modules/**", "lib/**"]

[limits]
# Largest contract file accepted, in bytes
max_file_size = 52428800

[external]
# Ask a hosted model for additional findings (also: --external)
enabled = false
endpoint = "https://api.openai.com/v1/chat/completions"
model = "gpt-4"
api_key_env = "OPENAI_API_KEY"
timeout_secs = 30
max_tokens = 4000
temperature = 0.1
"#
    }
}

/// Inline suppressions for one source: 1-based line → suppressed rule names.
/// A bare `// solguard-ignore` (no colon) suppresses all rules for the next line.
pub fn parse_inline_suppressions(source: &str) -> HashMap<usize, Vec<String>> {
    let mut suppressions = HashMap::new();

    for (idx, line) in source.lines().enumerate() {
        if let Some(rest) = extract_suppression_comment(line.trim()) {
            // idx is 0-based; the suppression targets the following line
            let target_line = idx + 2;
            let rules = if rest.is_empty() {
                vec!["*".to_string()]
            } else {
                rest.split(',').map(|s| s.trim().to_string()).collect()
            };
            suppressions.insert(target_line, rules);
        }
    }

    suppressions
}

/// Returns Some("") for a bare ignore, Some("a, b") for specific rules,
/// None if the line is not a suppression comment.
fn extract_suppression_comment(line: &str) -> Option<&str> {
    let comment = line.strip_prefix("//")?.trim();
    let rest = comment.strip_prefix(IGNORE_MARKER)?.trim();
    if rest.is_empty() {
        Some("")
    } else {
        Some(rest.strip_prefix(':')?.trim())
    }
}

/// Filter findings based on config and inline suppressions for one file.
pub fn apply_suppressions(
    findings: Vec<Finding>,
    config: &Config,
    inline_suppressions: &HashMap<usize, Vec<String>>,
) -> Vec<Finding> {
    findings
        .into_iter()
        .filter(|f| {
            if !config.is_rule_enabled(&f.rule_name) {
                return false;
            }
            if config.is_file_excluded(Path::new(&f.location.file)) {
                return false;
            }
            match inline_suppressions.get(&f.location.start_line) {
                Some(suppressed) => !suppressed.iter().any(|s| s == "*" || *s == f.rule_name),
                None => true,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{Category, DetectionMethod, Location};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.severity_threshold(), Severity::Info);
        assert!(config.is_rule_enabled("any-rule"));
        assert_eq!(config.limits.max_file_size, 50 * 1024 * 1024);
        assert!(!config.external.enabled);
        assert_eq!(config.external.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn test_default_toml_parses() {
        let config: Config = toml::from_str(Config::default_toml()).unwrap();
        assert_eq!(config.severity_threshold(), Severity::Info);
        assert_eq!(config.external.timeout_secs, 30);
        assert_eq!(config.limits.max_file_size, DEFAULT_MAX_FILE_SIZE);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[global]
severity_threshold = "medium"

[rules.timestamp-dependence]
enabled = false

[rules.missing-access-control]
severity = "high"

[suppressions]
files = ["test/**"]

[external]
enabled = true
timeout_secs = 5
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.severity_threshold(), Severity::Medium);
        assert!(!config.is_rule_enabled("timestamp-dependence"));
        assert!(config.is_rule_enabled("reentrancy"));
        assert_eq!(
            config.severity_override("missing-access-control"),
            Some(Severity::High)
        );
        assert_eq!(config.severity_override("reentrancy"), None);
        assert!(config.is_file_excluded(Path::new("test/Mock.sol")));
        assert!(!config.is_file_excluded(Path::new("contracts/Vault.sol")));
        assert!(config.external.enabled);
        assert_eq!(config.external.timeout_secs, 5);
        assert_eq!(config.external.model, "gpt-4");
    }

    #[test]
    fn test_informational_alias() {
        let config: Config =
            toml::from_str("[global]\nseverity_threshold = \"informational\"\n").unwrap();
        assert_eq!(config.severity_threshold(), Severity::Info);
    }

    #[test]
    fn test_inline_suppression_parsing() {
        let source = "// solguard-ignore: reentrancy\nmsg.sender.call{value: a}(\"\");\n// solguard-ignore\nx += 1;\n";

        let suppressions = parse_inline_suppressions(source);
        assert_eq!(suppressions[&2], vec!["reentrancy"]);
        assert_eq!(suppressions[&4], vec!["*"]);
        assert!(!suppressions.contains_key(&1));
    }

    #[test]
    fn test_apply_suppressions() {
        let config = Config::default();
        let mut inline = HashMap::new();
        inline.insert(5, vec!["reentrancy".to_string()]);

        let findings = vec![
            Finding::new(
                "reentrancy",
                Category::Reentrancy,
                Severity::Critical,
                "test",
                Location::line("Bank.sol", 5),
                DetectionMethod::PatternMatching,
            ),
            Finding::new(
                "unchecked-call",
                Category::UncheckedCall,
                Severity::Medium,
                "test2",
                Location::line("Bank.sol", 5),
                DetectionMethod::PatternMatching,
            ),
        ];

        let filtered = apply_suppressions(findings, &config, &inline);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].rule_name, "unchecked-call");
    }
}

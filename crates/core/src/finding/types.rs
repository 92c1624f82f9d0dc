use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Severity levels ordered from most to least severe.
/// IMPORTANT: Variant order matters: derived Ord puts Critical < High < Medium < Low < Info,
/// which is used for threshold filtering (retain findings where severity <= threshold).
/// Do NOT reorder these variants.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    /// Aggregation weight used by the risk aggregator.
    pub fn weight(self) -> f64 {
        match self {
            Severity::Critical => 10.0,
            Severity::High => 7.0,
            Severity::Medium => 4.0,
            Severity::Low => 1.0,
            Severity::Info => 0.5,
        }
    }

    /// Inclusive risk-score band a finding of this severity must stay in.
    pub fn score_band(self) -> (f64, f64) {
        match self {
            Severity::Critical => (8.0, 10.0),
            Severity::High => (6.0, 8.0),
            Severity::Medium => (4.0, 6.0),
            Severity::Low => (2.0, 4.0),
            Severity::Info => (0.0, 2.0),
        }
    }

    /// Default per-finding score: the midpoint of the severity band.
    pub fn midpoint_score(self) -> f64 {
        let (low, high) = self.score_band();
        (low + high) / 2.0
    }

    /// Higher rank means more severe.
    pub fn rank(self) -> u8 {
        match self {
            Severity::Critical => 5,
            Severity::High => 4,
            Severity::Medium => 3,
            Severity::Low => 2,
            Severity::Info => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::Info => "INFO",
        }
    }

    /// Parse a severity name, case-insensitively.
    pub fn parse(s: &str) -> Option<Severity> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Some(Severity::Critical),
            "high" => Some(Severity::High),
            "medium" => Some(Severity::Medium),
            "low" => Some(Severity::Low),
            "info" | "informational" => Some(Severity::Info),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Vulnerability category. Serialized through the human-readable label.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Category {
    #[serde(rename = "Reentrancy")]
    Reentrancy,
    #[serde(rename = "Access Control")]
    AccessControl,
    #[serde(rename = "Authorization")]
    Authorization,
    #[serde(rename = "Integer Overflow")]
    IntegerOverflow,
    #[serde(rename = "Unchecked External Call")]
    UncheckedCall,
    #[serde(rename = "Timestamp Dependence")]
    TimestampDependence,
    #[serde(rename = "Price Manipulation")]
    PriceManipulation,
    #[serde(rename = "Logic Error")]
    LogicError,
    #[serde(rename = "Gas Issues")]
    GasIssues,
    #[serde(rename = "Other")]
    Other,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::Reentrancy => "Reentrancy",
            Category::AccessControl => "Access Control",
            Category::Authorization => "Authorization",
            Category::IntegerOverflow => "Integer Overflow",
            Category::UncheckedCall => "Unchecked External Call",
            Category::TimestampDependence => "Timestamp Dependence",
            Category::PriceManipulation => "Price Manipulation",
            Category::LogicError => "Logic Error",
            Category::GasIssues => "Gas Issues",
            Category::Other => "Other",
        }
    }

    /// Common Weakness Enumeration identifier for the category, if one applies.
    pub fn cwe(self) -> Option<&'static str> {
        match self {
            Category::Reentrancy => Some("CWE-841"),
            Category::AccessControl => Some("CWE-284"),
            Category::Authorization => Some("CWE-285"),
            Category::IntegerOverflow => Some("CWE-190"),
            Category::UncheckedCall => Some("CWE-252"),
            Category::TimestampDependence => Some("CWE-829"),
            Category::LogicError => Some("CWE-480"),
            Category::GasIssues => Some("CWE-400"),
            Category::PriceManipulation | Category::Other => None,
        }
    }

    /// Map a free-form category name (as produced by an external analyzer)
    /// onto the closed set. Unrecognized names land in `Other`.
    pub fn from_label(s: &str) -> Category {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();

        if key.contains("reentran") {
            Category::Reentrancy
        } else if key.contains("overflow")
            || key.contains("underflow")
            || key.contains("arithmetic")
            || key.contains("integer")
        {
            Category::IntegerOverflow
        } else if key.contains("accesscontrol") || key.contains("selfdestruct") {
            Category::AccessControl
        } else if key.contains("authoriz") || key.contains("txorigin") {
            Category::Authorization
        } else if key.contains("unchecked") || key.contains("externalcall") {
            Category::UncheckedCall
        } else if key.contains("timestamp") || key.contains("blocktime") {
            Category::TimestampDependence
        } else if key.contains("oracle") || key.contains("price") || key.contains("flashloan") {
            Category::PriceManipulation
        } else if key.contains("logic") {
            Category::LogicError
        } else if key.contains("gas") || key.contains("dos") || key.contains("denial") {
            Category::GasIssues
        } else {
            Category::Other
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Provenance of a finding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DetectionMethod {
    #[serde(rename = "Pattern Matching")]
    PatternMatching,
    #[serde(rename = "AI Analysis")]
    AiAnalysis,
    #[serde(rename = "Fallback")]
    Fallback,
}

impl DetectionMethod {
    pub fn label(self) -> &'static str {
        match self {
            DetectionMethod::PatternMatching => "Pattern Matching",
            DetectionMethod::AiAnalysis => "AI Analysis",
            DetectionMethod::Fallback => "Fallback",
        }
    }
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub file: String,
    pub start_line: usize,
    pub end_line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl Location {
    /// Single-line location (1-based line).
    pub fn line(file: impl Into<String>, line: usize) -> Self {
        Self::span(file, line, line)
    }

    pub fn span(file: impl Into<String>, start_line: usize, end_line: usize) -> Self {
        Self {
            file: file.into(),
            start_line,
            end_line: end_line.max(start_line),
            function: None,
            snippet: None,
        }
    }

    /// Same file and intersecting inclusive line ranges.
    pub fn overlaps(&self, other: &Location) -> bool {
        self.file == other.file
            && self.start_line <= other.end_line
            && other.start_line <= self.end_line
    }
}

/// A concrete code change that addresses a finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeFix {
    pub description: String,
    pub original_code: String,
    pub fixed_code: String,
    pub explanation: String,
    pub risk_reduction: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub id: String,
    pub rule_name: String,
    pub title: String,
    severity: Severity,
    pub category: Category,
    pub description: String,
    pub impact: String,
    pub likelihood: String,
    pub location: Location,
    risk_score: f64,
    pub detection_method: DetectionMethod,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secondary_methods: Vec<DetectionMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub potential_loss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<CodeFix>,
    pub references: Vec<String>,
}

impl Finding {
    /// Create a finding scored at the midpoint of its severity band, with the
    /// category's CWE as the initial reference.
    pub fn new(
        rule_name: impl Into<String>,
        category: Category,
        severity: Severity,
        title: impl Into<String>,
        location: Location,
        detection_method: DetectionMethod,
    ) -> Self {
        Self {
            id: finding_id(category, &location),
            rule_name: rule_name.into(),
            title: title.into(),
            severity,
            category,
            description: String::new(),
            impact: String::new(),
            likelihood: String::new(),
            location,
            risk_score: severity.midpoint_score(),
            detection_method,
            secondary_methods: Vec::new(),
            recommendation: None,
            potential_loss: None,
            suggested_fix: None,
            references: category.cwe().map(|c| vec![c.to_string()]).unwrap_or_default(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn risk_score(&self) -> f64 {
        self.risk_score
    }

    /// Change severity and reset the score to the new band's midpoint.
    pub fn rescore(&mut self, severity: Severity) {
        self.severity = severity;
        self.risk_score = severity.midpoint_score();
    }

    /// Override the score with a computed value, clamped into the severity band.
    pub fn with_score(mut self, score: f64) -> Self {
        let (low, high) = self.severity.score_band();
        self.risk_score = if score.is_finite() {
            score.clamp(low, high)
        } else {
            self.severity.midpoint_score()
        };
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_impact(mut self, impact: impl Into<String>) -> Self {
        self.impact = impact.into();
        self
    }

    pub fn with_likelihood(mut self, likelihood: impl Into<String>) -> Self {
        self.likelihood = likelihood.into();
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }

    pub fn with_potential_loss(mut self, loss: impl Into<String>) -> Self {
        self.potential_loss = Some(loss.into());
        self
    }

    pub fn with_fix(mut self, fix: CodeFix) -> Self {
        self.suggested_fix = Some(fix);
        self
    }

    /// Add a reference identifier unless already present.
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        let reference = reference.into();
        if !self.references.contains(&reference) {
            self.references.push(reference);
        }
        self
    }

    /// Record a secondary provenance tag (deduplication keeps both sources).
    pub fn add_secondary_method(&mut self, method: DetectionMethod) {
        if method != self.detection_method && !self.secondary_methods.contains(&method) {
            self.secondary_methods.push(method);
        }
    }
}

/// Stable identifier derived from category and location only.
pub fn finding_id(category: Category, location: &Location) -> String {
    let mut hasher = Sha256::new();
    hasher.update(
        format!(
            "{}|{}|{}|{}",
            category.label(),
            location.file,
            location.start_line,
            location.end_line
        )
        .as_bytes(),
    );
    let digest = format!("{:x}", hasher.finalize());
    format!("VULN_{}", digest[..8].to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: Severity) -> Finding {
        Finding::new(
            "test-rule",
            Category::Reentrancy,
            severity,
            "title",
            Location::line("Bank.sol", 12),
            DetectionMethod::PatternMatching,
        )
    }

    #[test]
    fn test_ids_are_stable_and_location_sensitive() {
        let a = finding(Severity::Critical);
        let b = finding(Severity::Low);
        assert_eq!(a.id, b.id);
        assert!(a.id.starts_with("VULN_"));
        assert_eq!(a.id.len(), "VULN_".len() + 8);

        let other = Finding::new(
            "test-rule",
            Category::Reentrancy,
            Severity::Critical,
            "title",
            Location::line("Bank.sol", 13),
            DetectionMethod::PatternMatching,
        );
        assert_ne!(a.id, other.id);
    }

    #[test]
    fn test_score_follows_severity() {
        let mut f = finding(Severity::Critical);
        assert_eq!(f.risk_score(), 9.0);
        f.rescore(Severity::Medium);
        assert_eq!(f.severity(), Severity::Medium);
        assert_eq!(f.risk_score(), 5.0);
    }

    #[test]
    fn test_score_override_stays_in_band() {
        let f = finding(Severity::High).with_score(9.7);
        assert_eq!(f.risk_score(), 8.0);
        let f = finding(Severity::High).with_score(f64::NAN);
        assert_eq!(f.risk_score(), 7.0);
        let f = finding(Severity::Critical).with_score(8.5);
        assert_eq!(f.risk_score(), 8.5);
    }

    #[test]
    fn test_serialized_score_matches_severity() {
        let f = finding(Severity::Critical).with_score(1.0);
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["severity"], "CRITICAL");
        assert_eq!(json["riskScore"], 8.0);
    }

    #[test]
    fn test_critical_band_exceeds_medium_band() {
        let (critical_low, _) = Severity::Critical.score_band();
        let (_, medium_high) = Severity::Medium.score_band();
        assert!(critical_low > medium_high);
    }

    #[test]
    fn test_category_from_label() {
        assert_eq!(Category::from_label("Reentrancy"), Category::Reentrancy);
        assert_eq!(Category::from_label("access_control"), Category::AccessControl);
        assert_eq!(Category::from_label("Integer Overflow"), Category::IntegerOverflow);
        assert_eq!(Category::from_label("Unchecked Calls"), Category::UncheckedCall);
        assert_eq!(Category::from_label("tx.origin usage"), Category::Authorization);
        assert_eq!(Category::from_label("Flash Loan"), Category::PriceManipulation);
        assert_eq!(Category::from_label("something new"), Category::Other);
    }

    #[test]
    fn test_serialized_vocabulary() {
        let f = finding(Severity::Critical);
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["severity"], "CRITICAL");
        assert_eq!(json["category"], "Reentrancy");
        assert_eq!(json["detectionMethod"], "Pattern Matching");
        assert_eq!(json["location"]["startLine"], 12);
        assert_eq!(json["riskScore"], 9.0);
        assert_eq!(json["references"][0], "CWE-841");
    }

    #[test]
    fn test_location_overlap() {
        let a = Location::span("A.sol", 10, 20);
        assert!(a.overlaps(&Location::line("A.sol", 20)));
        assert!(a.overlaps(&Location::span("A.sol", 5, 10)));
        assert!(!a.overlaps(&Location::line("A.sol", 21)));
        assert!(!a.overlaps(&Location::line("B.sol", 15)));
    }
}

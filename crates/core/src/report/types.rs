use chrono::{DateTime, Utc};
use serde::Serialize;

use super::aggregate::{aggregate, SeverityCounts};
use crate::external::{ExternalStatus, Insight};
use crate::finding::{CodeFix, Finding, Severity};
use crate::parser::{ContractTopology, ParseAnomaly};
use crate::rule::RuleFailure;

/// Schema version of the serialized report.
pub const REPORT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Minimal,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 8.0 {
            RiskLevel::Critical
        } else if score >= 6.0 {
            RiskLevel::High
        } else if score >= 4.0 {
            RiskLevel::Medium
        } else if score >= 2.0 {
            RiskLevel::Low
        } else {
            RiskLevel::Minimal
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskLevel::Critical => "CRITICAL",
            RiskLevel::High => "HIGH",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::Low => "LOW",
            RiskLevel::Minimal => "MINIMAL",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Complete analysis result for one contract file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub contract_name: String,
    pub file_name: String,
    pub contract_info: ContractTopology,
    pub vulnerabilities: Vec<Finding>,
    pub total_vulnerabilities: usize,
    pub overall_risk_score: f64,
    pub risk_level: RiskLevel,
    #[serde(flatten)]
    pub counts: ReportCounts,
    pub analysis_timestamp: DateTime<Utc>,
    pub analysis_time_ms: u64,
    pub engine_version: String,
    pub version: String,
    pub parse_anomalies: Vec<ParseAnomaly>,
    pub skipped_rules: Vec<RuleFailure>,
    pub external: ExternalStatus,
    pub ai_insights: Vec<Insight>,
    pub recommended_fixes: Vec<CodeFix>,
}

/// Per-severity counts under their flat report field names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCounts {
    pub critical_count: usize,
    pub high_count: usize,
    pub medium_count: usize,
    pub low_count: usize,
    pub info_count: usize,
}

impl From<SeverityCounts> for ReportCounts {
    fn from(c: SeverityCounts) -> Self {
        Self {
            critical_count: c.critical,
            high_count: c.high,
            medium_count: c.medium,
            low_count: c.low,
            info_count: c.info,
        }
    }
}

impl Report {
    /// Build a report, computing score, level and counts from the findings.
    pub fn new(topology: ContractTopology, findings: Vec<Finding>) -> Self {
        let mut report = Self {
            contract_name: topology.name.clone(),
            file_name: topology.file_name.clone(),
            contract_info: topology,
            vulnerabilities: Vec::new(),
            total_vulnerabilities: 0,
            overall_risk_score: 0.0,
            risk_level: RiskLevel::Minimal,
            counts: ReportCounts::default(),
            analysis_timestamp: Utc::now(),
            analysis_time_ms: 0,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            version: REPORT_VERSION.to_string(),
            parse_anomalies: Vec::new(),
            skipped_rules: Vec::new(),
            external: ExternalStatus::NotRequested,
            ai_insights: Vec::new(),
            recommended_fixes: Vec::new(),
        };
        report.set_findings(findings);
        report
    }

    fn set_findings(&mut self, findings: Vec<Finding>) {
        let summary = aggregate(&findings);
        self.total_vulnerabilities = findings.len();
        self.overall_risk_score = summary.score;
        self.risk_level = RiskLevel::from_score(summary.score);
        self.counts = summary.counts.into();
        self.vulnerabilities = findings;
    }

    /// Drop findings less severe than `min` and recompute the summary.
    pub fn retain_min_severity(&mut self, min: Severity) {
        let findings = std::mem::take(&mut self.vulnerabilities)
            .into_iter()
            .filter(|f| f.severity() <= min)
            .collect();
        self.set_findings(findings);
    }

    pub fn count(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.counts.critical_count,
            Severity::High => self.counts.high_count,
            Severity::Medium => self.counts.medium_count,
            Severity::Low => self.counts.low_count,
            Severity::Info => self.counts.info_count,
        }
    }

    /// True when the parser fell back to the minimal topology.
    pub fn is_degraded(&self) -> bool {
        self.parse_anomalies.iter().any(ParseAnomaly::is_degrading)
    }
}

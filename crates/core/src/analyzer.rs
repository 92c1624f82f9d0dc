use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::{apply_suppressions, parse_inline_suppressions, Config};
use crate::external::{
    ExternalAnalysis, ExternalAnalyzer, ExternalError, ExternalRequest, ExternalStatus,
};
use crate::finding::Finding;
use crate::parser::{parse_scanned, scan, ContractTopology, ParseAnomaly};
use crate::report::{merge, Report};
use crate::rule::{RuleEngine, RuleFailure, RuleRegistry};

/// End-to-end pipeline for one contract: scan, parse, detect, merge, score.
pub struct Analyzer {
    engine: RuleEngine,
    config: Config,
}

/// Output of the synchronous local stage.
struct LocalAnalysis {
    topology: ContractTopology,
    anomalies: Vec<ParseAnomaly>,
    findings: Vec<Finding>,
    skipped: Vec<RuleFailure>,
}

impl Analyzer {
    pub fn new(registry: RuleRegistry) -> Self {
        Self::with_config(registry, Config::default())
    }

    /// Disabled rules are dropped from the registry up front; severity
    /// overrides, suppressions and the threshold apply to every report.
    pub fn with_config(mut registry: RuleRegistry, config: Config) -> Self {
        registry.retain(|r| config.is_rule_enabled(r.name()));
        Self {
            engine: RuleEngine::new(registry),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    /// Local analysis only. Pure apart from the report timestamp.
    pub fn analyze(&self, source: &str, file_name: &str) -> Report {
        self.analyze_with(source, file_name, None)
    }

    /// Local analysis merged with an already obtained external analysis.
    pub fn analyze_with(
        &self,
        source: &str,
        file_name: &str,
        external: Option<ExternalAnalysis>,
    ) -> Report {
        let started = Instant::now();
        let local = self.analyze_local(source, file_name);
        let status = match &external {
            Some(analysis) => ExternalStatus::Completed {
                model: analysis.model.clone(),
            },
            None => ExternalStatus::NotRequested,
        };
        self.finish(source, local, external, status, started)
    }

    /// Local analysis first, then the collaborator bounded by `timeout`.
    /// Any collaborator failure leaves the local result intact and is
    /// recorded in the report's `external` status.
    pub async fn analyze_with_collaborator(
        &self,
        source: &str,
        file_name: &str,
        collaborator: &dyn ExternalAnalyzer,
        timeout: Duration,
    ) -> Report {
        let started = Instant::now();
        let local = self.analyze_local(source, file_name);

        let request = ExternalRequest {
            source: source.to_string(),
            file_name: file_name.to_string(),
            topology: local.topology.clone(),
        };

        debug!(
            collaborator = collaborator.name(),
            file = file_name,
            "requesting external analysis"
        );
        let result = match tokio::time::timeout(timeout, collaborator.analyze(&request)).await {
            Ok(result) => result,
            Err(_) => Err(ExternalError::Timeout(timeout.as_millis() as u64)),
        };

        let (external, status) = match result {
            Ok(analysis) => {
                info!(
                    collaborator = collaborator.name(),
                    findings = analysis.findings.len(),
                    "external analysis completed"
                );
                let status = ExternalStatus::Completed {
                    model: analysis.model.clone(),
                };
                (Some(analysis), status)
            }
            Err(e) => {
                warn!(
                    collaborator = collaborator.name(),
                    error = %e,
                    "external analysis unavailable, using local findings"
                );
                (None, ExternalStatus::from(&e))
            }
        };

        self.finish(source, local, external, status, started)
    }

    fn analyze_local(&self, source: &str, file_name: &str) -> LocalAnalysis {
        let scanned = scan(source);
        let outcome = parse_scanned(&scanned, file_name);
        let detection = self.engine.detect_scanned(&scanned, &outcome.topology);

        let findings = detection
            .findings
            .into_iter()
            .map(|mut f| {
                if let Some(severity) = self.config.severity_override(&f.rule_name) {
                    f.rescore(severity);
                }
                f
            })
            .collect();

        LocalAnalysis {
            topology: outcome.topology,
            anomalies: outcome.anomalies,
            findings,
            skipped: detection.skipped,
        }
    }

    fn finish(
        &self,
        source: &str,
        local: LocalAnalysis,
        external: Option<ExternalAnalysis>,
        status: ExternalStatus,
        started: Instant,
    ) -> Report {
        let (external_findings, insights, fixes) = match external {
            Some(a) => (a.findings, a.insights, a.fixes),
            None => (Vec::new(), Vec::new(), Vec::new()),
        };

        let merged = merge(local.findings, external_findings);
        let inline = parse_inline_suppressions(source);
        let findings = apply_suppressions(merged, &self.config, &inline);

        let mut report = Report::new(local.topology, findings);
        report.retain_min_severity(self.config.severity_threshold());
        report.parse_anomalies = local.anomalies;
        report.skipped_rules = local.skipped;
        report.external = status;
        report.ai_insights = insights;
        report.recommended_fixes = fixes;
        report.analysis_time_ms = started.elapsed().as_millis() as u64;

        debug!(
            file = %report.file_name,
            findings = report.total_vulnerabilities,
            score = report.overall_risk_score,
            "analysis finished"
        );
        report
    }
}

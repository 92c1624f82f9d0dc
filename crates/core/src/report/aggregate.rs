use serde::Serialize;

use crate::finding::{Finding, Severity};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl SeverityCounts {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut counts = Self::default();
        for f in findings {
            match f.severity() {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
                Severity::Info => counts.info += 1,
            }
        }
        counts
    }

    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
            Severity::Info => self.info,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.info
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskSummary {
    /// 0.0 to 10.0, one decimal
    pub score: f64,
    pub counts: SeverityCounts,
}

/// Weighted average of severity weights on a 0–10 scale, rounded to one
/// decimal with ties to even. No findings scores 0.
pub fn aggregate(findings: &[Finding]) -> RiskSummary {
    let counts = SeverityCounts::from_findings(findings);
    if findings.is_empty() {
        return RiskSummary { score: 0.0, counts };
    }

    let total_weight: f64 = findings.iter().map(|f| f.severity().weight()).sum();
    let max_possible = findings.len() as f64 * Severity::Critical.weight();
    let raw = (total_weight / max_possible * 10.0).min(10.0);

    RiskSummary {
        score: (raw * 10.0).round_ties_even() / 10.0,
        counts,
    }
}

/// Collapse findings that share a category and file and whose line ranges
/// overlap. The survivor is the more severe one (then the higher scored,
/// then the earlier); it occupies the earlier of the two positions and
/// remembers the other's detection methods.
pub fn deduplicate(findings: Vec<Finding>) -> Vec<Finding> {
    let mut kept: Vec<Finding> = Vec::with_capacity(findings.len());

    for candidate in findings {
        let existing = kept.iter().position(|k| {
            k.category == candidate.category && k.location.overlaps(&candidate.location)
        });

        match existing {
            None => kept.push(candidate),
            Some(idx) => {
                let (mut winner, loser) = if outranks(&candidate, &kept[idx]) {
                    (candidate, kept[idx].clone())
                } else {
                    (kept[idx].clone(), candidate)
                };
                winner.add_secondary_method(loser.detection_method);
                for method in &loser.secondary_methods {
                    winner.add_secondary_method(*method);
                }
                kept[idx] = winner;
            }
        }
    }

    kept
}

/// Strictly better: an earlier finding wins every tie.
fn outranks(candidate: &Finding, incumbent: &Finding) -> bool {
    let by_rank = candidate.severity().rank().cmp(&incumbent.severity().rank());
    match by_rank {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => candidate.risk_score() > incumbent.risk_score(),
    }
}

/// Local findings first, then external ones, deduplicated.
pub fn merge(local: Vec<Finding>, external: Vec<Finding>) -> Vec<Finding> {
    let mut all = local;
    all.extend(external);
    deduplicate(all)
}

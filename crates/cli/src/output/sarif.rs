use std::collections::BTreeMap;

use anyhow::Result;
use serde_json::json;
use solguard::finding::{Finding, Severity};
use solguard::report::Report;

/// Print SARIF 2.1.0 output for GitHub Code Scanning integration
pub fn print(reports: &[Report]) -> Result<()> {
    let sarif = build(reports);
    let json = serde_json::to_string_pretty(&sarif)?;
    println!("{json}");
    Ok(())
}

fn build(reports: &[Report]) -> serde_json::Value {
    let findings: Vec<&Finding> = reports.iter().flat_map(|r| &r.vulnerabilities).collect();

    // Stable rule descriptions from rule metadata, not per-finding titles
    let all_rules = solguard_rules::all_rules();
    let mut seen: BTreeMap<&str, &Finding> = BTreeMap::new();
    for f in findings.iter().copied() {
        seen.entry(f.rule_name.as_str()).or_insert(f);
    }
    let rules: Vec<serde_json::Value> = seen
        .into_iter()
        .map(|(name, finding)| {
            let rule = all_rules.iter().find(|r| r.name() == name);
            let text = rule.map_or_else(|| finding.title.clone(), |r| r.description().to_string());
            let severity = rule.map_or(finding.severity(), |r| r.severity());
            json!({
                "id": name,
                "shortDescription": { "text": text },
                "defaultConfiguration": { "level": severity_to_sarif_level(severity) }
            })
        })
        .collect();

    let results: Vec<serde_json::Value> = findings
        .iter()
        .map(|f| {
            let loc = &f.location;
            let mut result = json!({
                "ruleId": f.rule_name,
                "level": severity_to_sarif_level(f.severity()),
                "message": {
                    "text": format!("{}: {}", f.title, f.description)
                },
                "locations": [{
                    "physicalLocation": {
                        "artifactLocation": { "uri": loc.file },
                        "region": {
                            "startLine": loc.start_line.max(1),
                            "endLine": loc.end_line.max(1)
                        }
                    }
                }],
                "partialFingerprints": { "solguardId": f.id },
                "properties": {
                    "category": f.category.label(),
                    "riskScore": f.risk_score(),
                    "detectionMethod": f.detection_method.label()
                }
            });

            if let Some(fix) = &f.suggested_fix {
                result["fixes"] = json!([{
                    "description": { "text": fix.description },
                    "artifactChanges": [{
                        "artifactLocation": { "uri": loc.file },
                        "replacements": [{
                            "deletedRegion": {
                                "startLine": loc.start_line.max(1),
                                "endLine": loc.end_line.max(1)
                            },
                            "insertedContent": { "text": fix.fixed_code }
                        }]
                    }]
                }]);
            }

            result
        })
        .collect();

    json!({
        "$schema": "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/main/sarif-2.1/schema/sarif-schema-2.1.0.json",
        "version": "2.1.0",
        "runs": [{
            "tool": {
                "driver": {
                    "name": "solguard",
                    "version": env!("CARGO_PKG_VERSION"),
                    "rules": rules
                }
            },
            "results": results
        }]
    })
}

fn severity_to_sarif_level(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical | Severity::High => "error",
        Severity::Medium => "warning",
        Severity::Low | Severity::Info => "note",
    }
}

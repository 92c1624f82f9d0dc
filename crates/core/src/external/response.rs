use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{ExternalAnalysis, ExternalError, Insight};
use crate::finding::{Category, CodeFix, DetectionMethod, Finding, Location, Severity};

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    vulnerabilities: Vec<RawVulnerability>,
    #[serde(default)]
    insights: Vec<RawInsight>,
    #[serde(default)]
    fixes: Vec<RawFix>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawVulnerability {
    title: Option<String>,
    severity: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    description: Option<String>,
    location: RawLocation,
    impact: Option<String>,
    likelihood: Option<String>,
    risk_score: Option<Value>,
    recommendation: Option<String>,
    potential_loss: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawLocation {
    start_line: Option<Value>,
    end_line: Option<Value>,
    function: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawInsight {
    category: Option<String>,
    insight: Option<String>,
    confidence: Option<Value>,
    actionable: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawFix {
    description: Option<String>,
    original_code: Option<String>,
    fixed_code: Option<String>,
    explanation: Option<String>,
    risk_reduction: Option<String>,
}

/// Parse a collaborator's free-text reply into findings, insights and fixes.
///
/// The JSON object is taken from a ```` ```json ```` fence when present,
/// otherwise from the first balanced `{ ... }` in the text. Missing fields get
/// neutral defaults; a missing severity is `MEDIUM` and an unrecognized one
/// `LOW`. Scores are clamped into the finding's severity band.
pub fn parse_response(
    text: &str,
    file_name: &str,
    model: &str,
) -> Result<ExternalAnalysis, ExternalError> {
    let json = extract_json(text).ok_or_else(|| {
        ExternalError::InvalidResponse("no JSON object in response".to_string())
    })?;
    let raw: RawAnalysis = serde_json::from_str(json)
        .map_err(|e| ExternalError::InvalidResponse(e.to_string()))?;

    let findings: Vec<Finding> = raw
        .vulnerabilities
        .into_iter()
        .map(|v| to_finding(v, file_name))
        .collect();
    debug!(count = findings.len(), model, "parsed collaborator findings");

    Ok(ExternalAnalysis {
        findings,
        insights: raw.insights.into_iter().map(to_insight).collect(),
        fixes: raw.fixes.into_iter().map(to_fix).collect(),
        model: model.to_string(),
    })
}

fn extract_json(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let body = &text[start + 7..];
        if let Some(end) = body.find("```") {
            return Some(body[..end].trim());
        }
    }

    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, byte) in text.as_bytes()[start..].iter().enumerate() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escape_next = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    warn!("unbalanced JSON object in collaborator response");
    None
}

fn to_finding(raw: RawVulnerability, file_name: &str) -> Finding {
    let severity = match raw.severity.as_deref() {
        None => Severity::Medium,
        Some(s) => Severity::parse(s).unwrap_or(Severity::Low),
    };
    let category = raw
        .kind
        .as_deref()
        .map(Category::from_label)
        .unwrap_or(Category::Other);

    let start = raw.location.start_line.as_ref().and_then(as_line).unwrap_or(1);
    let end = raw.location.end_line.as_ref().and_then(as_line).unwrap_or(start);
    let mut location = Location::span(file_name, start, end);
    location.function = raw.location.function.filter(|f| !f.trim().is_empty());

    let title = raw
        .title
        .unwrap_or_else(|| "Unknown Vulnerability".to_string());
    let mut finding = Finding::new(
        "external",
        category,
        severity,
        title,
        location,
        DetectionMethod::AiAnalysis,
    )
    .with_description(raw.description.unwrap_or_default())
    .with_impact(raw.impact.unwrap_or_else(|| "Unknown impact".to_string()))
    .with_likelihood(
        raw.likelihood
            .unwrap_or_else(|| "Unknown likelihood".to_string()),
    );

    if let Some(score) = raw.risk_score.as_ref().and_then(as_number) {
        finding = finding.with_score(score.clamp(0.0, 10.0));
    }
    if let Some(rec) = raw.recommendation {
        finding = finding.with_recommendation(rec);
    }
    if let Some(loss) = raw.potential_loss {
        finding = finding.with_potential_loss(loss);
    }
    finding
}

fn to_insight(raw: RawInsight) -> Insight {
    Insight {
        category: raw.category.unwrap_or_else(|| "Security".to_string()),
        insight: raw.insight.unwrap_or_default(),
        confidence: raw
            .confidence
            .as_ref()
            .and_then(as_number)
            .unwrap_or(0.7)
            .clamp(0.0, 1.0),
        actionable: raw.actionable.unwrap_or(true),
    }
}

fn to_fix(raw: RawFix) -> CodeFix {
    CodeFix {
        description: raw.description.unwrap_or_default(),
        original_code: raw
            .original_code
            .unwrap_or_else(|| "Code snippet not available".to_string()),
        fixed_code: raw
            .fixed_code
            .unwrap_or_else(|| "Fix not available".to_string()),
        explanation: raw.explanation.unwrap_or_default(),
        risk_reduction: raw.risk_reduction.unwrap_or_else(|| "Unknown".to_string()),
    }
}

/// Numbers may arrive as JSON numbers or numeric strings.
fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    n.filter(|n: &f64| n.is_finite())
}

fn as_line(value: &Value) -> Option<usize> {
    let n = as_number(value)?;
    if n >= 1.0 {
        Some(n as usize)
    } else {
        None
    }
}

//! Boundary to an out-of-process analyzer (typically a hosted language model)
//! that contributes probabilistic findings, insights and suggested fixes.

pub mod response;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::finding::{CodeFix, Finding};
use crate::parser::ContractTopology;

pub use response::parse_response;

#[derive(Debug, Error)]
pub enum ExternalError {
    #[error("timed out after {0} ms")]
    Timeout(u64),

    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("request failed: {0}")]
    Http(String),
}

/// Everything a collaborator gets to see about one contract.
#[derive(Debug, Clone)]
pub struct ExternalRequest {
    pub source: String,
    pub file_name: String,
    pub topology: ContractTopology,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    pub category: String,
    pub insight: String,
    /// 0.0 to 1.0
    pub confidence: f64,
    pub actionable: bool,
}

/// Parsed collaborator output. Findings are tagged `AI Analysis`.
#[derive(Debug, Clone, Default)]
pub struct ExternalAnalysis {
    pub findings: Vec<Finding>,
    pub insights: Vec<Insight>,
    pub fixes: Vec<CodeFix>,
    pub model: String,
}

/// What happened to the collaborator call, recorded in report metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ExternalStatus {
    NotRequested,
    Completed { model: String },
    Failed { reason: String },
    #[serde(rename_all = "camelCase")]
    TimedOut { after_ms: u64 },
}

impl ExternalStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, ExternalStatus::Completed { .. })
    }
}

impl From<&ExternalError> for ExternalStatus {
    fn from(err: &ExternalError) -> Self {
        match err {
            ExternalError::Timeout(ms) => ExternalStatus::TimedOut { after_ms: *ms },
            other => ExternalStatus::Failed {
                reason: other.to_string(),
            },
        }
    }
}

#[async_trait]
pub trait ExternalAnalyzer: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    async fn analyze(&self, request: &ExternalRequest) -> Result<ExternalAnalysis, ExternalError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_error() {
        assert_eq!(
            ExternalStatus::from(&ExternalError::Timeout(250)),
            ExternalStatus::TimedOut { after_ms: 250 }
        );
        let status = ExternalStatus::from(&ExternalError::Unavailable("no key".to_string()));
        assert!(matches!(status, ExternalStatus::Failed { reason } if reason.contains("no key")));
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(ExternalStatus::TimedOut { after_ms: 30000 }).unwrap();
        assert_eq!(json["status"], "timedOut");
        assert_eq!(json["afterMs"], 30000);

        let json = serde_json::to_value(ExternalStatus::NotRequested).unwrap();
        assert_eq!(json["status"], "notRequested");
    }
}

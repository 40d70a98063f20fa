//! Quality Assurance phase output types.

use serde::{Deserialize, Serialize};

use crate::provenance::Sourced;

/// Minimum overall score for a build to be considered deployment ready.
pub const DEPLOYMENT_READY_THRESHOLD: u8 = 70;

/// A single finding from the quality audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityIssue {
    /// Free-form severity label ("low", "high", "critical", ...).
    pub severity: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Quality Auditor agent output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
    #[serde(deserialize_with = "crate::score::deserialize")]
    pub overall_score: u8,
    #[serde(
        default,
        deserialize_with = "crate::score::deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub security_score: Option<u8>,
    #[serde(
        default,
        deserialize_with = "crate::score::deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub performance_score: Option<u8>,
    #[serde(
        default,
        deserialize_with = "crate::score::deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub maintainability_score: Option<u8>,
    #[serde(default)]
    pub issues: Vec<QualityIssue>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Accumulated Quality Assurance phase output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityOutput {
    pub overall_score: u8,
    /// `overall_score >= DEPLOYMENT_READY_THRESHOLD`.
    pub deployment_ready: bool,
    pub files_audited: usize,
    pub report: Sourced<QualityReport>,
}

impl QualityOutput {
    pub fn from_report(report: Sourced<QualityReport>, files_audited: usize) -> Self {
        let overall_score = report.overall_score;
        Self {
            overall_score,
            deployment_ready: overall_score >= DEPLOYMENT_READY_THRESHOLD,
            files_audited,
            report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(score: u8) -> QualityReport {
        QualityReport {
            overall_score: score,
            security_score: None,
            performance_score: None,
            maintainability_score: None,
            issues: vec![],
            recommendations: vec![],
        }
    }

    #[test]
    fn deployment_ready_at_threshold() {
        let q = QualityOutput::from_report(Sourced::generated(report(70), 1), 4);
        assert!(q.deployment_ready);
        assert_eq!(q.overall_score, 70);
    }

    #[test]
    fn not_ready_below_threshold() {
        let q = QualityOutput::from_report(Sourced::generated(report(69), 1), 4);
        assert!(!q.deployment_ready);
    }

    #[test]
    fn report_parses_float_scores() {
        let r: QualityReport = serde_json::from_str(
            r#"{"overall_score": 82.4, "security_score": "90", "issues": []}"#,
        )
        .unwrap();
        assert_eq!(r.overall_score, 82);
        assert_eq!(r.security_score, Some(90));
        assert_eq!(r.performance_score, None);
    }
}

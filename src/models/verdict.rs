use serde::{Deserialize, Serialize};
use strum::Display;

/// Final three-way authenticity classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Classification {
    Genuine,
    Suspicious,
    Synthetic,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

/// How strongly the evidence behind a finding supports it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

/// One human-readable analysis finding. Findings are emitted in fixed rule
/// order so a verdict is reproducible from the same score snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub message: String,
    pub tier: ConfidenceTier,
    pub detail: String,
}

impl Finding {
    pub fn new(
        severity: Severity,
        message: impl Into<String>,
        tier: ConfidenceTier,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            message: message.into(),
            tier,
            detail: detail.into(),
        }
    }
}

/// Final output of the cognitive stage, attached to a completed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub classification: Classification,
    pub confidence: f64,
    pub risk_score: f64,
    pub uncertainty: f64,
    pub findings: Vec<Finding>,
}

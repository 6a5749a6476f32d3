use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::models::features::{FeatureBundle, MediaKind};
use crate::models::scores::{AdjustedScores, RawScores};
use crate::models::verdict::Verdict;

/// Status of an analysis job. Transitions are monotonic: once a job reaches
/// `Complete` or `Failed` it never changes again.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }
}

/// Pipeline stage names, used to attribute a failure to its origin.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Stage {
    Extract,
    Detect,
    Adjust,
    Judge,
}

/// Failure record attached to a job that reached `Failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFailure {
    pub stage: Stage,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid job status transition: {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// A media authenticity analysis job.
///
/// Stage outputs (`feature_bundle`, `raw_scores`, `adjusted_scores`) are
/// immutable snapshots retained for audit even after later stages run.
/// A failed job is never restarted in place; a retry is a new job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub id: Uuid,
    pub status: JobStatus,
    pub media_kind: MediaKind,
    pub source_path: PathBuf,
    pub feature_bundle: Option<FeatureBundle>,
    pub raw_scores: Option<RawScores>,
    pub adjusted_scores: Option<AdjustedScores>,
    pub verdict: Option<Verdict>,
    pub failure: Option<JobFailure>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnalysisJob {
    pub fn new(source_path: &Path) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            media_kind: MediaKind::Unknown,
            source_path: source_path.to_path_buf(),
            feature_bundle: None,
            raw_scores: None,
            adjusted_scores: None,
            verdict: None,
            failure: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move the job to a new status, enforcing the monotonic state machine.
    pub fn transition(&mut self, to: JobStatus) -> Result<(), InvalidTransition> {
        let valid = matches!(
            (self.status, to),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Complete)
                | (JobStatus::Running, JobStatus::Failed)
        );
        if !valid {
            return Err(InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Attach a verdict and mark the job complete.
    pub fn complete(&mut self, verdict: Verdict) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Complete)?;
        self.verdict = Some(verdict);
        Ok(())
    }

    /// Record a stage failure and mark the job failed. Outputs of earlier
    /// stages stay attached for diagnostics.
    pub fn fail(&mut self, stage: Stage, message: String) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Failed)?;
        self.failure = Some(JobFailure { stage, message });
        Ok(())
    }
}

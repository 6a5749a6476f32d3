//! Pipeline orchestration.
//!
//! Sequences the four analysis stages for one job, persisting each stage's
//! output before the next stage starts. A stage error moves the job to
//! `Failed` with the originating stage recorded; earlier outputs stay
//! attached for diagnostics and no further stages run. The orchestrator
//! never retries a failed job — a retry is a new job.

use garde::Validate;
use metrics::{counter, histogram};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::models::job::{AnalysisJob, JobStatus, Stage};
use crate::services::cognitive;
use crate::services::detection::DetectionStage;
use crate::services::extractor::FeatureExtractor;
use crate::services::quality;
use crate::store::{JobStore, StoreError};

/// One stage's failure, attributed to its origin.
struct StageFailure {
    stage: Stage,
    message: String,
}

impl StageFailure {
    fn new(stage: Stage, error: impl std::fmt::Display) -> Self {
        Self {
            stage,
            message: error.to_string(),
        }
    }
}

/// Orchestrates extraction, detection, quality adjustment, and judgement
/// for independent, concurrently running jobs.
pub struct AnalysisPipeline {
    store: Arc<dyn JobStore>,
    extractor: FeatureExtractor,
    detector: DetectionStage,
}

impl AnalysisPipeline {
    pub fn new(
        store: Arc<dyn JobStore>,
        extractor: FeatureExtractor,
        detector: DetectionStage,
    ) -> Self {
        Self {
            store,
            extractor,
            detector,
        }
    }

    /// Run one media file through the full pipeline.
    ///
    /// Returns the terminal job record (`Complete` or `Failed`); only
    /// storage errors surface as `Err`.
    pub async fn analyze(&self, path: &Path) -> Result<AnalysisJob, StoreError> {
        let mut job = AnalysisJob::new(path);
        self.store.insert(job.clone()).await?;
        counter!("analysis_jobs_total").increment(1);

        info!(job_id = %job.id, path = %path.display(), "Analysis job created");

        match self.run_stages(&mut job).await {
            Ok(()) => {
                counter!("analysis_jobs_completed").increment(1);
                let verdict = job.verdict.as_ref();
                info!(
                    job_id = %job.id,
                    classification = verdict.map(|v| v.classification.to_string()).unwrap_or_default(),
                    risk = verdict.map(|v| v.risk_score).unwrap_or_default(),
                    "Analysis job complete"
                );
            }
            Err(failure) => {
                counter!("analysis_jobs_failed").increment(1);
                error!(
                    job_id = %job.id,
                    stage = %failure.stage,
                    error = %failure.message,
                    "Analysis job failed"
                );
                // A failing stage always leaves the job non-terminal.
                let _ = job.fail(failure.stage, failure.message);
            }
        }

        self.store.update(&job).await?;
        Ok(job)
    }

    async fn run_stages(&self, job: &mut AnalysisJob) -> Result<(), StageFailure> {
        // ── Stage 1: feature extraction ──────────────────────────────────
        let started = Instant::now();
        let bundle = self
            .extractor
            .extract(&job.source_path)
            .await
            .map_err(|e| StageFailure::new(Stage::Extract, e))?;
        histogram!("analysis_stage_seconds", "stage" => "extract")
            .record(started.elapsed().as_secs_f64());

        job.media_kind = bundle.kind;
        job.feature_bundle = Some(bundle.clone());
        job.transition(JobStatus::Running)
            .map_err(|e| StageFailure::new(Stage::Extract, e))?;
        self.persist(job, Stage::Extract).await?;

        // ── Stage 2: detection ───────────────────────────────────────────
        let started = Instant::now();
        let raw = self
            .detector
            .detect(&bundle)
            .await
            .map_err(|e| StageFailure::new(Stage::Detect, e))?;
        histogram!("analysis_stage_seconds", "stage" => "detect")
            .record(started.elapsed().as_secs_f64());

        job.raw_scores = Some(raw.clone());
        self.persist(job, Stage::Detect).await?;

        // ── Stage 3: quality adjustment ──────────────────────────────────
        let started = Instant::now();
        let (adjusted, report) = quality::adjust_for_quality(&bundle, &raw);
        adjusted
            .validate()
            .map_err(|e| StageFailure::new(Stage::Adjust, format!("malformed adjusted scores: {e}")))?;
        histogram!("analysis_stage_seconds", "stage" => "adjust")
            .record(started.elapsed().as_secs_f64());

        job.adjusted_scores = Some(adjusted.clone());
        self.persist(job, Stage::Adjust).await?;

        // ── Stage 4: cognitive judgement ─────────────────────────────────
        let started = Instant::now();
        let verdict = cognitive::judge(&adjusted, &bundle, &report.findings);
        histogram!("analysis_stage_seconds", "stage" => "judge")
            .record(started.elapsed().as_secs_f64());

        job.complete(verdict)
            .map_err(|e| StageFailure::new(Stage::Judge, e))?;
        Ok(())
    }

    /// Durably attach the current job state before the next stage starts.
    async fn persist(&self, job: &AnalysisJob, stage: Stage) -> Result<(), StageFailure> {
        self.store
            .update(job)
            .await
            .map_err(|e| StageFailure::new(stage, format!("persistence failed: {e}")))
    }
}

//! Job persistence seam.
//!
//! The pipeline treats storage as an external collaborator offering atomic
//! read/insert/update by id. `MemoryJobStore` is the in-process
//! implementation used by the worker binary and tests; a database-backed
//! store plugs in behind the same trait.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::job::AnalysisJob;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error("job {0} already exists")]
    Duplicate(Uuid),
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job record. Fails if the id is already present.
    async fn insert(&self, job: AnalysisJob) -> Result<(), StoreError>;

    /// Fetch a job snapshot by id.
    async fn get(&self, id: Uuid) -> Result<Option<AnalysisJob>, StoreError>;

    /// Replace the record for `job.id` atomically.
    async fn update(&self, job: &AnalysisJob) -> Result<(), StoreError>;
}

/// In-memory job store backed by an async `RwLock`.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<Uuid, AnalysisJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: AnalysisJob) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::Duplicate(job.id));
        }
        jobs.insert(job.id, job);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<AnalysisJob>, StoreError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn update(&self, job: &AnalysisJob) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job.id) {
            Some(slot) => {
                *slot = job.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(job.id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::JobStatus;
    use std::path::Path;

    #[test]
    fn test_insert_and_get() {
        tokio_test::block_on(async {
            let store = MemoryJobStore::new();
            let job = AnalysisJob::new(Path::new("/tmp/a.mp4"));
            let id = job.id;

            store.insert(job).await.unwrap();
            let fetched = store.get(id).await.unwrap().unwrap();
            assert_eq!(fetched.id, id);
            assert_eq!(fetched.status, JobStatus::Pending);
        });
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        tokio_test::block_on(async {
            let store = MemoryJobStore::new();
            let job = AnalysisJob::new(Path::new("/tmp/a.mp4"));

            store.insert(job.clone()).await.unwrap();
            assert!(matches!(
                store.insert(job).await,
                Err(StoreError::Duplicate(_))
            ));
        });
    }

    #[test]
    fn test_update_replaces_record() {
        tokio_test::block_on(async {
            let store = MemoryJobStore::new();
            let mut job = AnalysisJob::new(Path::new("/tmp/a.mp4"));
            store.insert(job.clone()).await.unwrap();

            job.transition(JobStatus::Running).unwrap();
            store.update(&job).await.unwrap();

            let fetched = store.get(job.id).await.unwrap().unwrap();
            assert_eq!(fetched.status, JobStatus::Running);
        });
    }

    #[test]
    fn test_update_unknown_job_is_not_found() {
        tokio_test::block_on(async {
            let store = MemoryJobStore::new();
            let job = AnalysisJob::new(Path::new("/tmp/a.mp4"));
            assert!(matches!(
                store.update(&job).await,
                Err(StoreError::NotFound(_))
            ));
        });
    }
}

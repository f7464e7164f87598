//! Job persistence.
//!
//! The orchestrator relies on the store for single-record update atomicity
//! and does no locking of its own. Both implementations here serialise
//! writers internally and apply [`JobUpdate`]s field by field, so a reader
//! polling mid-run sees either the record before a stage or after it.
//!
//! * [`MemoryJobStore`] — process-local, for tests and embedding.
//! * [`FileJobStore`]  — one JSON document per job, written atomically
//!   (temp file + rename) so a crash never leaves a half-written record.

use crate::error::Video2DeckError;
use crate::job::{Job, JobUpdate};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Persistence contract consumed by the orchestrator and submission handler.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new record and return it.
    async fn create(&self, job: Job) -> Result<Job, Video2DeckError>;

    /// Look up a record; `Ok(None)` when it does not exist.
    async fn find(&self, id: &str) -> Result<Option<Job>, Video2DeckError>;

    /// Apply a partial update and return the updated record.
    async fn update(&self, id: &str, update: JobUpdate) -> Result<Job, Video2DeckError>;
}

// ── In-memory store ──────────────────────────────────────────────────────

/// A `HashMap` behind an async `RwLock`.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record, in no particular order.
    pub async fn all(&self) -> Vec<Job> {
        self.jobs.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: Job) -> Result<Job, Video2DeckError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(Video2DeckError::Store {
                detail: format!("job '{}' already exists", job.id),
            });
        }
        jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    async fn find(&self, id: &str) -> Result<Option<Job>, Video2DeckError> {
        Ok(self.jobs.read().await.get(id).cloned())
    }

    async fn update(&self, id: &str, update: JobUpdate) -> Result<Job, Video2DeckError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| Video2DeckError::JobNotFound { id: id.to_string() })?;
        job.apply(update);
        Ok(job.clone())
    }
}

// ── File-backed store ────────────────────────────────────────────────────

/// Stores each job as `<dir>/<id>.json`.
#[derive(Debug)]
pub struct FileJobStore {
    dir: PathBuf,
    /// Serialises read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileJobStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, Video2DeckError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| store_err(&dir, e))?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, Video2DeckError> {
        // Identifiers become file names; refuse anything that could escape the directory.
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            return Err(Video2DeckError::InvalidInput {
                input: id.to_string(),
            });
        }
        Ok(self.dir.join(format!("{id}.json")))
    }

    async fn read(&self, path: &Path) -> Result<Option<Job>, Video2DeckError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| store_err(path, e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(store_err(path, e)),
        }
    }

    /// Atomic write: write to temp, then rename.
    async fn write(&self, path: &Path, job: &Job) -> Result<(), Video2DeckError> {
        let json = serde_json::to_vec_pretty(job).map_err(|e| store_err(path, e))?;
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &json)
            .await
            .map_err(|e| store_err(&tmp_path, e))?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|e| store_err(path, e))?;
        debug!("Persisted job {} ({}%)", job.id, job.progress);
        Ok(())
    }
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn create(&self, job: Job) -> Result<Job, Video2DeckError> {
        let path = self.path_for(&job.id)?;
        let _guard = self.write_lock.lock().await;
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(Video2DeckError::Store {
                detail: format!("job '{}' already exists", job.id),
            });
        }
        self.write(&path, &job).await?;
        Ok(job)
    }

    async fn find(&self, id: &str) -> Result<Option<Job>, Video2DeckError> {
        let path = self.path_for(id)?;
        self.read(&path).await
    }

    async fn update(&self, id: &str, update: JobUpdate) -> Result<Job, Video2DeckError> {
        let path = self.path_for(id)?;
        let _guard = self.write_lock.lock().await;
        let mut job = self
            .read(&path)
            .await?
            .ok_or_else(|| Video2DeckError::JobNotFound { id: id.to_string() })?;
        job.apply(update);
        self.write(&path, &job).await?;
        Ok(job)
    }
}

fn store_err(path: &Path, e: impl std::fmt::Display) -> Video2DeckError {
    Video2DeckError::Store {
        detail: format!("{}: {e}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;
    use tokio_test::assert_err;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryJobStore::new();
        let job = store
            .create(Job::new(JobStatus::Queued, Some("/v.mp4".into())))
            .await
            .unwrap();

        store.update(&job.id, JobUpdate::started()).await.unwrap();
        let updated = store
            .update(&job.id, JobUpdate::path_resolved())
            .await
            .unwrap();
        assert_eq!(updated.status, JobStatus::Processing);
        assert_eq!(updated.progress, 5);

        let found = store.find(&job.id).await.unwrap().unwrap();
        assert_eq!(found, updated);
    }

    #[tokio::test]
    async fn memory_store_update_missing_is_not_found() {
        let store = MemoryJobStore::new();
        let err = store.update("nope", JobUpdate::done()).await.unwrap_err();
        assert!(matches!(err, Video2DeckError::JobNotFound { .. }));
    }

    #[tokio::test]
    async fn memory_store_rejects_duplicate_ids() {
        let store = MemoryJobStore::new();
        let job = Job::with_id("same", JobStatus::Queued, None);
        store.create(job.clone()).await.unwrap();
        assert_err!(store.create(job).await);
    }

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let store = FileJobStore::open(dir.path()).await.unwrap();
            let job = store
                .create(Job::new(JobStatus::Queued, Some("/v.mp4".into())))
                .await
                .unwrap();
            store
                .update(&job.id, JobUpdate::notes_synthesized("## Key Points"))
                .await
                .unwrap();
            job.id
        };

        let reopened = FileJobStore::open(dir.path()).await.unwrap();
        let job = reopened.find(&id).await.unwrap().unwrap();
        assert_eq!(job.final_notes, "## Key Points");
        assert_eq!(job.progress, 80);
        assert!(!dir.path().join(format!("{id}.json.tmp")).exists());
    }

    #[tokio::test]
    async fn file_store_find_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::open(dir.path()).await.unwrap();
        assert!(store.find("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_store_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::open(dir.path()).await.unwrap();
        assert_err!(store.find("../etc/passwd").await);
    }
}

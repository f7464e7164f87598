//! Job submission: local files and remote URLs.
//!
//! A file submission becomes a `queued` job immediately. A URL submission
//! becomes a `downloading` job with no source; the download runs in the
//! background and the job is queued once the video is on disk, or marked
//! `failed` with the fetch error. Either way the caller gets the job id back
//! straight away and polls the store for the rest.
//!
//! ## Why stream to disk?
//!
//! Lecture recordings run to hundreds of megabytes. The body is written
//! chunk by chunk to a `NamedTempFile` inside the upload root and persisted
//! as `<id>.<ext>` only when complete. Memory stays flat, and a failed
//! download is deleted when the temp file drops instead of being mistaken
//! for a video.

use crate::config::PipelineConfig;
use crate::error::Video2DeckError;
use crate::job::{Job, JobStatus, JobUpdate};
use crate::pipeline::resolve::{absolutize, normalize, to_slash};
use crate::queue::JobQueue;
use crate::store::JobStore;
use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

/// Extension used when the URL does not name one.
const DEFAULT_VIDEO_EXT: &str = "mp4";

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Fetches a remote video to local storage.
#[async_trait]
pub trait VideoFetcher: Send + Sync {
    /// Download `url` for `job_id` and return the local path.
    async fn fetch(&self, url: &str, job_id: &str) -> Result<PathBuf, Video2DeckError>;
}

/// Plain HTTP(S) download into the upload root.
#[derive(Debug, Clone)]
pub struct HttpVideoFetcher {
    upload_root: PathBuf,
    timeout_secs: u64,
}

impl HttpVideoFetcher {
    pub fn new(upload_root: impl Into<PathBuf>, timeout_secs: u64) -> Self {
        Self {
            upload_root: upload_root.into(),
            timeout_secs,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.upload_root.clone(), config.download_timeout_secs)
    }

    /// `<upload_root>/<job_id>.<ext>`, with the extension taken from the URL path.
    pub fn target_path(&self, url: &str, job_id: &str) -> PathBuf {
        self.upload_root
            .join(format!("{job_id}.{}", extension_from_url(url)))
    }
}

fn extension_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            let last = parsed.path_segments()?.next_back()?.to_string();
            let ext = Path::new(&last).extension()?.to_str()?.to_ascii_lowercase();
            let plausible = !ext.is_empty()
                && ext.len() <= 5
                && ext.chars().all(|c| c.is_ascii_alphanumeric());
            plausible.then_some(ext)
        })
        .unwrap_or_else(|| DEFAULT_VIDEO_EXT.to_string())
}

#[async_trait]
impl VideoFetcher for HttpVideoFetcher {
    async fn fetch(&self, url: &str, job_id: &str) -> Result<PathBuf, Video2DeckError> {
        info!("Downloading video from: {}", url);
        let failed = |reason: String| Video2DeckError::DownloadFailed {
            url: url.to_string(),
            reason,
        };
        let classify = |e: reqwest::Error| {
            if e.is_timeout() {
                Video2DeckError::DownloadTimeout {
                    url: url.to_string(),
                    secs: self.timeout_secs,
                }
            } else {
                failed(e.to_string())
            }
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| failed(e.to_string()))?;

        let response = client.get(url).send().await.map_err(classify)?;
        if !response.status().is_success() {
            return Err(failed(format!("HTTP {}", response.status())));
        }

        tokio::fs::create_dir_all(&self.upload_root)
            .await
            .map_err(|e| failed(format!("cannot create {}: {e}", self.upload_root.display())))?;
        let target = self.target_path(url, job_id);
        let tmp = tempfile::Builder::new()
            .prefix(&format!(".{job_id}-"))
            .suffix(".part")
            .tempfile_in(&self.upload_root)
            .map_err(|e| failed(format!("cannot create temp file: {e}")))?;
        let handle = tmp
            .reopen()
            .map_err(|e| failed(format!("cannot open temp file: {e}")))?;

        let mut file = tokio::fs::File::from_std(handle);
        let mut body = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(classify)?;
            file.write_all(&chunk)
                .await
                .map_err(|e| failed(format!("write failed: {e}")))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| failed(format!("write failed: {e}")))?;
        drop(file);

        if written == 0 {
            return Err(failed("empty response body".into()));
        }
        tmp.persist(&target)
            .map_err(|e| failed(format!("cannot move download into place: {e}")))?;

        info!("Downloaded {} bytes to: {}", written, target.display());
        Ok(target)
    }
}

/// Creates jobs and hands them to the [`JobQueue`].
#[derive(Clone)]
pub struct Submitter {
    store: Arc<dyn JobStore>,
    queue: Arc<JobQueue>,
    fetcher: Arc<dyn VideoFetcher>,
}

impl std::fmt::Debug for Submitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Submitter")
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl Submitter {
    pub fn new(
        store: Arc<dyn JobStore>,
        queue: Arc<JobQueue>,
        fetcher: Arc<dyn VideoFetcher>,
    ) -> Self {
        Self {
            store,
            queue,
            fetcher,
        }
    }

    /// Submit either a local path or an HTTP(S) URL.
    pub async fn submit(&self, input: &str) -> Result<Job, Video2DeckError> {
        if is_url(input) {
            self.submit_url(input).await
        } else {
            self.submit_file(input).await
        }
    }

    /// Queue a job for a video already on disk.
    ///
    /// The stored reference is absolute and uses `/` separators.
    pub async fn submit_file(&self, path: impl AsRef<Path>) -> Result<Job, Video2DeckError> {
        let path = path.as_ref();
        let cwd = std::env::current_dir().map_err(|e| Video2DeckError::Internal(e.to_string()))?;
        let abs = normalize(&absolutize(&cwd, path.to_path_buf()));
        if !tokio::fs::try_exists(&abs).await.unwrap_or(false) {
            return Err(Video2DeckError::SourceNotFound { path: abs });
        }

        let source = to_slash(&abs.to_string_lossy());
        let job = self
            .store
            .create(Job::new(JobStatus::Queued, Some(source)))
            .await?;
        self.queue.enqueue(job.id.clone())?;
        info!("Submitted job {} for {}", job.id, abs.display());
        Ok(job)
    }

    /// Create a `downloading` job and fetch `url` in the background.
    pub async fn submit_url(&self, url: &str) -> Result<Job, Video2DeckError> {
        let valid = reqwest::Url::parse(url)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !valid {
            return Err(Video2DeckError::InvalidInput {
                input: url.to_string(),
            });
        }

        let job = self
            .store
            .create(Job::new(JobStatus::Downloading, None))
            .await?;
        info!("Submitted job {} for {}", job.id, url);

        let store = Arc::clone(&self.store);
        let queue = Arc::clone(&self.queue);
        let fetcher = Arc::clone(&self.fetcher);
        let id = job.id.clone();
        let url = url.to_string();
        tokio::spawn(async move {
            if let Err(e) = fetch_and_enqueue(store.as_ref(), &queue, fetcher.as_ref(), &url, &id).await {
                error!("Job {}: {}", id, e);
                if let Err(store_err) = store.update(&id, JobUpdate::failed(e.to_string())).await {
                    error!("Job {}: could not record failure: {}", id, store_err);
                }
            }
        });

        Ok(job)
    }
}

async fn fetch_and_enqueue(
    store: &dyn JobStore,
    queue: &JobQueue,
    fetcher: &dyn VideoFetcher,
    url: &str,
    id: &str,
) -> Result<(), Video2DeckError> {
    let path = fetcher.fetch(url, id).await?;
    let cwd = std::env::current_dir().map_err(|e| Video2DeckError::Internal(e.to_string()))?;
    let source = to_slash(&normalize(&absolutize(&cwd, path)).to_string_lossy());
    debug!("Job {}: source ready at {}", id, source);
    store.update(id, JobUpdate::source_ready(source)).await?;
    queue.enqueue(id)
}

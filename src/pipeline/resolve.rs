//! Source path resolution and public path mapping.
//!
//! Job records store the source video as whatever string the submitting
//! code path produced: an absolute path, a path relative to the project, a
//! path relative to the upload directory, or any of those written with `\`
//! separators. [`PathResolver::resolve`] turns all of them into one
//! absolute, `/`-separated path and checks that the file exists.
//!
//! [`PathResolver::public_path`] goes the other way for generated
//! artefacts: it strips the public root so the result can be served as
//! `/frames/<job>/fps/frame-0001.jpg`.

use crate::config::PipelineConfig;
use crate::error::Video2DeckError;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Maps stored references to filesystem paths and filesystem paths to public ones.
#[derive(Debug, Clone)]
pub struct PathResolver {
    project_root: PathBuf,
    upload_root: PathBuf,
    public_root: PathBuf,
}

impl PathResolver {
    /// A relative `project_root` is taken against the current directory;
    /// the other roots are taken against `project_root`.
    pub fn new(
        project_root: impl Into<PathBuf>,
        upload_root: impl Into<PathBuf>,
        public_root: impl Into<PathBuf>,
    ) -> Self {
        let project_root = project_root.into();
        let project_root = match std::env::current_dir() {
            Ok(cwd) => normalize(&absolutize(&cwd, project_root)),
            Err(e) => {
                warn!(
                    "Cannot read current directory ({}); project root stays {}",
                    e,
                    project_root.display()
                );
                normalize(&project_root)
            }
        };
        let upload_root = absolutize(&project_root, upload_root.into());
        let public_root = absolutize(&project_root, public_root.into());
        Self {
            project_root,
            upload_root,
            public_root,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.project_root.clone(),
            config.upload_root.clone(),
            config.public_root.clone(),
        )
    }

    /// Candidate filesystem locations for a stored reference, most likely first.
    pub fn candidates(&self, stored: &str) -> Vec<PathBuf> {
        let slashed = to_slash(stored);
        let path = Path::new(&slashed);
        if path.is_absolute() {
            return vec![normalize(path)];
        }

        let relative = slashed.trim_start_matches("./");
        let mut out = vec![normalize(&self.project_root.join(relative))];
        let under_uploads = normalize(&self.upload_root.join(relative));
        if !out.contains(&under_uploads) {
            out.push(under_uploads);
        }
        out
    }

    /// Resolve `stored` to an existing absolute path.
    ///
    /// Relative references are tried against the project root first and the
    /// upload root second. When neither exists the error names the first
    /// candidate.
    pub async fn resolve(&self, stored: &str) -> Result<PathBuf, Video2DeckError> {
        let candidates = self.candidates(stored);
        for candidate in &candidates {
            if tokio::fs::try_exists(candidate).await.unwrap_or(false) {
                debug!("Resolved '{}' → {}", stored, candidate.display());
                return Ok(candidate.clone());
            }
        }
        Err(Video2DeckError::SourceNotFound {
            path: candidates
                .into_iter()
                .next()
                .unwrap_or_else(|| PathBuf::from(stored)),
        })
    }

    /// Web-addressable form of a generated file: the public root is stripped
    /// and separators become `/`. Paths outside the public root are returned
    /// slash-normalised but otherwise unchanged.
    pub fn public_path(&self, fs_path: &Path) -> String {
        let abs = normalize(&absolutize(&self.project_root, fs_path.to_path_buf()));
        match abs.strip_prefix(&self.public_root) {
            Ok(rest) => format!("/{}", to_slash(&rest.to_string_lossy())),
            Err(_) => to_slash(&fs_path.to_string_lossy()),
        }
    }
}

/// Replace every `\` with `/`.
pub fn to_slash(s: &str) -> String {
    s.replace('\\', "/")
}

pub(crate) fn absolutize(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Lexically remove `.` and `..` components without touching the filesystem.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

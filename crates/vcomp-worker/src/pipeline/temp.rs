//! Scratch directory layout and intermediate cleanup.
//!
//! Every intermediate lives under `{work_dir}/{job_id}/`. Clip files are
//! named `clip-{index:03}-{step}.mp4` so concurrent clips and concurrent jobs
//! never collide and a leftover file tells which clip and step wrote it.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use vcomp_media::fs_utils::remove_file_if_exists;
use vcomp_models::JobId;

use crate::error::{CleanupError, Stage};
use crate::metrics;

/// A file written under the job's scratch directory.
#[derive(Debug, Clone, PartialEq)]
pub struct TempArtifact {
    pub path: PathBuf,
    /// Stage that wrote the file
    pub stage: Stage,
    pub sequence_index: Option<u32>,
}

/// Owns the scratch directory of one job.
#[derive(Debug, Clone)]
pub struct TempLifecycle {
    scratch_dir: PathBuf,
}

impl TempLifecycle {
    pub fn new(work_dir: impl AsRef<Path>, job_id: &JobId) -> Self {
        Self {
            scratch_dir: work_dir.as_ref().join(job_id.as_str()),
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Create the scratch directory.
    pub async fn prepare(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.scratch_dir).await
    }

    /// Output path for one step of one clip.
    pub fn clip_path(&self, sequence_index: u32, step: &str) -> PathBuf {
        self.scratch_dir
            .join(format!("clip-{:03}-{}.mp4", sequence_index, step))
    }

    /// Output path for a job-level intermediate.
    pub fn job_path(&self, file_name: &str) -> PathBuf {
        self.scratch_dir.join(file_name)
    }

    /// Whether `path` is an intermediate owned by this job.
    ///
    /// Caller-supplied sources never are, so they are never deleted.
    pub fn is_temp(&self, path: &Path) -> bool {
        path.starts_with(&self.scratch_dir)
    }

    /// Wrap `path` as an artifact, or `None` when it is not ours to delete.
    pub fn artifact(
        &self,
        path: &Path,
        stage: Stage,
        sequence_index: Option<u32>,
    ) -> Option<TempArtifact> {
        self.is_temp(path).then(|| TempArtifact {
            path: path.to_path_buf(),
            stage,
            sequence_index,
        })
    }

    /// Delete consumed artifacts. Never fails; problems are logged.
    pub async fn cleanup(&self, artifacts: &[TempArtifact]) {
        for artifact in artifacts {
            if !self.is_temp(&artifact.path) {
                warn!(path = %artifact.path.display(), "Refusing to delete file outside scratch directory");
                continue;
            }

            match remove_file_if_exists(&artifact.path).await {
                Ok(removed) => debug!(
                    path = %artifact.path.display(),
                    stage = %artifact.stage,
                    sequence_index = ?artifact.sequence_index,
                    removed,
                    "Cleaned up intermediate"
                ),
                Err(source) => {
                    let err = CleanupError {
                        path: artifact.path.clone(),
                        source,
                    };
                    metrics::record_cleanup_failure();
                    warn!(stage = %artifact.stage, "{}", err);
                }
            }
        }
    }

    /// Remove the scratch directory once the job has delivered its output.
    pub async fn remove_scratch(&self) {
        match tokio::fs::remove_dir_all(&self.scratch_dir).await {
            Ok(()) => debug!(path = %self.scratch_dir.display(), "Removed scratch directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                metrics::record_cleanup_failure();
                warn!(
                    path = %self.scratch_dir.display(),
                    error = %e,
                    "Failed to remove scratch directory"
                );
            }
        }
    }
}

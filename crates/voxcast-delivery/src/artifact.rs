//! Persistence of delivered utterances as audio files on disk.

use std::path::{Path, PathBuf};
use uuid::Uuid;
use voxcast_speech::{AudioFormat, TtsResult};

/// Writes delivered audio under `output_dir/<session-id>.<extension>`.
/// Eviction beyond the delete-after-delivery policy is left to the
/// deployment.
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    output_dir: PathBuf,
    delete_after_delivery: bool,
}

impl ArtifactStore {
    pub fn new(output_dir: impl Into<PathBuf>, delete_after_delivery: bool) -> Self {
        Self {
            output_dir: output_dir.into(),
            delete_after_delivery,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn delete_after_delivery(&self) -> bool {
        self.delete_after_delivery
    }

    pub async fn persist(
        &self,
        session_id: Uuid,
        format: &AudioFormat,
        bytes: &[u8],
    ) -> TtsResult<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self
            .output_dir
            .join(format!("{session_id}.{}", format.extension()));
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Apply the post-delivery policy to a persisted artifact.
    pub async fn finish(&self, path: &Path) {
        if !self.delete_after_delivery {
            return;
        }
        if let Err(e) = tokio::fs::remove_file(path).await {
            log::warn!("failed to remove artifact {}: {e}", path.display());
        }
    }
}

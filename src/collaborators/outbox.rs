//! Filesystem outbox publisher
//!
//! Drops finished clips into a per-platform outbox directory alongside a
//! JSON sidecar with caption and hashtags. Real platform uploaders slot
//! in behind the same [`Publisher`] trait.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use super::{Publisher, PublishMetadata};
use crate::errors::CollaboratorError;

pub struct OutboxPublisher {
    outbox_dir: PathBuf,
}

impl OutboxPublisher {
    pub fn new(outbox_dir: PathBuf) -> Self {
        Self { outbox_dir }
    }
}

#[async_trait]
impl Publisher for OutboxPublisher {
    async fn publish(
        &self,
        platform: &str,
        file: &Path,
        metadata: &PublishMetadata,
    ) -> Result<String, CollaboratorError> {
        let platform_dir = self.outbox_dir.join(platform);
        tokio::fs::create_dir_all(&platform_dir).await?;

        let remote_id = Uuid::new_v4().to_string();
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("{remote_id}.mp4"));

        let target = platform_dir.join(&file_name);
        tokio::fs::copy(file, &target).await?;

        let sidecar = platform_dir.join(format!("{remote_id}.json"));
        let payload = serde_json::json!({
            "caption": metadata.caption,
            "hashtags": metadata.hashtags,
            "score": metadata.score,
            "file": file_name,
        });
        tokio::fs::write(&sidecar, serde_json::to_vec_pretty(&payload).unwrap_or_default())
            .await?;

        info!(platform = %platform, path = %target.display(), "queued clip in outbox");
        Ok(remote_id)
    }
}

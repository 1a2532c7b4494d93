//! Publish queue stage
//!
//! Drains posts in `ready_for_upload` by fanning each rendered segment out
//! to every configured target platform. A platform failure leaves the post
//! queued for the next pass; any success marks it posted.

use serde_json::json;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::collaborators::PublishMetadata;
use crate::errors::StageError;
use crate::models::PostStatus;
use crate::scheduling::JobContext;

pub async fn run(ctx: JobContext) -> anyhow::Result<()> {
    let queued = ctx.database.list_posts_with_status("ready_for_upload").await?;

    let mut published = 0usize;
    for post in queued {
        match publish_post(&ctx, &post).await {
            Ok(true) => published += 1,
            Ok(false) => {}
            Err(e) => {
                warn!(
                    post_id = post.id,
                    external_id = ?post.external_id,
                    error = %e,
                    "publishing failed, post stays queued"
                );
            }
        }
    }

    info!(published, "publish pass complete");
    Ok(())
}

/// Publish one queued segment; returns whether any platform accepted it
async fn publish_post(ctx: &JobContext, post: &PostStatus) -> anyhow::Result<bool> {
    let Some(external_id) = post.external_id.as_deref() else {
        debug!(post_id = post.id, "queued post without external id, skipping");
        return Ok(false);
    };

    let file = match resolve_artifact(external_id, post) {
        Ok(path) => path,
        Err(e) => {
            warn!(external_id, error = %e, "queued post has no usable artifact, skipping");
            return Ok(false);
        }
    };

    // Caption and hashtags come from the owning content record
    let record_id = external_id
        .rsplit_once("_seg")
        .map(|(id, _)| id)
        .unwrap_or(external_id);
    let record = ctx.database.load_content_record(record_id).await?;
    let metadata = PublishMetadata {
        caption: record.as_ref().and_then(|r| r.caption.clone()),
        hashtags: record.as_ref().map(|r| r.hashtags.clone()).unwrap_or_default(),
        score: post.performance_score,
    };

    let mut any_success = false;
    for target in &ctx.config.publish.platforms {
        match ctx
            .collaborators
            .publisher
            .publish(target, &file, &metadata)
            .await
        {
            Ok(remote_id) => {
                any_success = true;
                ctx.database
                    .update_post_status(
                        target,
                        "posted",
                        Some(external_id),
                        Some(post.performance_score),
                        Some(&json!({ "remote_id": remote_id }).to_string()),
                    )
                    .await?;
                ctx.database
                    .record_metric(target, "clips_published", 1.0, Some(external_id))
                    .await?;
                info!(external_id, platform = %target, remote_id = %remote_id, "published clip");
            }
            Err(e) => {
                warn!(external_id, platform = %target, error = %e, "platform publish failed");
            }
        }
    }

    if any_success {
        ctx.database
            .update_post_status(&post.platform, "posted", Some(external_id), None, None)
            .await?;
    }
    Ok(any_success)
}

/// Locate the rendered file a queued post points at
fn resolve_artifact(external_id: &str, post: &PostStatus) -> Result<PathBuf, StageError> {
    let raw = post.metadata.as_deref().unwrap_or("{}");
    let value: serde_json::Value = serde_json::from_str(raw)?;
    let Some(final_path) = value["final_path"].as_str() else {
        return Err(StageError::MissingArtifact {
            record_id: external_id.to_string(),
            path: "<no final_path recorded>".to_string(),
        });
    };

    let path = PathBuf::from(final_path);
    if !path.exists() {
        return Err(StageError::MissingArtifact {
            record_id: external_id.to_string(),
            path: final_path.to_string(),
        });
    }
    Ok(path)
}

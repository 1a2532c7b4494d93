//! Highlight rendering stage
//!
//! For every record still pending, detects high-motion segments in the
//! downloaded clip, then exports, transcribes and overlays each segment.
//! A segment failure never aborts the record; a record failure never
//! aborts the pass.

use serde_json::json;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::errors::StageError;
use crate::models::{ContentRecord, HighlightEntry, HighlightStatus};
use crate::pipeline::highlights::{HighlightBounds, HighlightSegment};
use crate::scheduling::JobContext;

pub async fn run(ctx: JobContext) -> anyhow::Result<()> {
    ctx.config.storage.ensure_directories()?;

    let pending = ctx.database.list_pending_content_records().await?;
    let mut rendered = 0usize;
    for id in pending {
        let Some(record) = ctx.database.load_content_record(&id).await? else {
            continue;
        };
        match process_record(&ctx, record).await {
            Ok(count) => rendered += count,
            Err(e) => {
                warn!(
                    record_id = %id,
                    error = %e,
                    "highlight processing failed, continuing with remaining records"
                );
            }
        }
    }

    info!(rendered, "highlight pass complete");
    Ok(())
}

/// Render highlights for one record; returns the number of finished segments
async fn process_record(ctx: &JobContext, mut record: ContentRecord) -> anyhow::Result<usize> {
    let Some(download_path) = record.download_path.clone() else {
        debug!(record_id = %record.id, "no download yet, leaving pending");
        return Ok(0);
    };
    let source = Path::new(&download_path);
    if !source.exists() {
        debug!(record_id = %record.id, path = %download_path, "download missing on disk, leaving pending");
        return Ok(0);
    }

    let bounds = HighlightBounds::from(&ctx.config.highlights);
    let segments = ctx
        .collaborators
        .detector
        .detect_segments(source, &bounds)
        .await?;
    if segments.is_empty() {
        debug!(record_id = %record.id, "no segments detected, leaving pending");
        return Ok(0);
    }

    let render_dir = ctx.config.storage.render_dir.join(&record.id);
    let platform = record.platform.clone().unwrap_or_default();

    let mut entries: Vec<HighlightEntry> = Vec::new();
    for (index, segment) in segments.iter().enumerate() {
        let index = index + 1;
        let entry = match render_segment(ctx, &record, source, segment, &render_dir, index).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!(record_id = %record.id, segment = index, "transcription unavailable, skipping segment");
                continue;
            }
            Err(e) => {
                warn!(record_id = %record.id, segment = index, error = %e, "segment render failed");
                continue;
            }
        };

        let external_id = format!("{}_seg{index}", record.id);
        ctx.database
            .update_post_status(
                &platform,
                "ready_for_upload",
                Some(&external_id),
                Some(entry.score),
                Some(
                    &json!({
                        "final_path": entry.final_path,
                        "start": entry.start,
                        "end": entry.end,
                        "score": entry.score,
                    })
                    .to_string(),
                ),
            )
            .await?;
        ctx.database
            .record_metric(&platform, "highlights_rendered", 1.0, Some(&record.id))
            .await?;

        entries.push(entry);
    }

    let finished = entries.len();
    if finished > 0 {
        record.set_highlight_status(HighlightStatus::Complete);
        record
            .metadata
            .insert("highlight_count".to_string(), json!(finished));
        record.metadata.insert(
            "last_highlight_at".to_string(),
            json!(chrono::Utc::now().to_rfc3339()),
        );
        record.render_path = entries.first().map(|e| e.final_path.clone());
        record.highlights = entries;
        info!(record_id = %record.id, segments = finished, "record highlight-complete");
    } else {
        record.set_highlight_status(HighlightStatus::Failed);
        warn!(record_id = %record.id, "all segments failed, marking record failed");
    }
    ctx.database.save_content_record(&record).await?;

    Ok(finished)
}

/// Export, transcribe and overlay one detected segment
///
/// `Ok(None)` means transcription is unavailable and the segment is skipped
/// without counting as a failure.
async fn render_segment(
    ctx: &JobContext,
    record: &ContentRecord,
    source: &Path,
    segment: &HighlightSegment,
    render_dir: &Path,
    index: usize,
) -> Result<Option<HighlightEntry>, StageError> {
    let raw_dest = render_dir.join(format!("seg{index}_raw.mp4"));
    let raw_path = ctx
        .collaborators
        .exporter
        .export(source, segment, &raw_dest)
        .await?;

    let Some(subtitle_path) = ctx
        .collaborators
        .transcriber
        .transcribe(&raw_path, render_dir)
        .await?
    else {
        return Ok(None);
    };

    // Caption defaults to crediting the source account when none was set
    let caption = record
        .caption
        .clone()
        .or_else(|| record.account.as_ref().map(|account| format!("@{account}")));

    let final_dest = render_dir.join(format!("seg{index}_final.mp4"));
    let final_path = ctx
        .collaborators
        .overlay
        .render(&raw_path, &subtitle_path, caption.as_deref(), &final_dest)
        .await?;

    Ok(Some(HighlightEntry {
        index,
        start: segment.start,
        end: segment.end,
        score: segment.score,
        raw_path: raw_path.to_string_lossy().into_owned(),
        subtitle_path: subtitle_path.to_string_lossy().into_owned(),
        final_path: final_path.to_string_lossy().into_owned(),
    }))
}

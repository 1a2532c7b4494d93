use anyhow::Result;
use sqlx::Row;
use tracing::{debug, warn};

use super::Database;
use crate::models::ContentRecord;

impl Database {
    /// Load one content record by its deterministic id
    ///
    /// A row whose payload cannot be parsed is treated as absent: the caller
    /// proceeds as if no prior record existed, at the cost of possible
    /// duplicate work on that single id.
    pub async fn load_content_record(&self, id: &str) -> Result<Option<ContentRecord>> {
        let row = sqlx::query("SELECT payload FROM content_records WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let payload: String = row.get("payload");
        Ok(parse_payload(id, &payload))
    }

    /// Persist a content record, structurally merging with any stored state
    ///
    /// The read-merge-write happens inside one transaction. Merge rules:
    /// metadata maps merge key-by-key with incoming winning on conflict, and
    /// `highlights` is replaced only when the incoming list is non-empty.
    pub async fn save_content_record(&self, record: &ContentRecord) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<String> =
            sqlx::query_scalar("SELECT payload FROM content_records WHERE id = ?")
                .bind(&record.id)
                .fetch_optional(&mut *tx)
                .await?;

        let merged = match existing.and_then(|payload| parse_payload(&record.id, &payload)) {
            Some(prior) => merge_records(prior, record.clone()),
            None => record.clone(),
        };

        let payload = serde_json::to_string(&merged)?;
        sqlx::query(
            "INSERT INTO content_records (id, platform, highlight_status, payload)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 platform = excluded.platform,
                 highlight_status = excluded.highlight_status,
                 payload = excluded.payload,
                 updated_at = datetime('now')",
        )
        .bind(&merged.id)
        .bind(&merged.platform)
        .bind(merged.highlight_status().as_str())
        .bind(&payload)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(record_id = %record.id, "stored content record");
        Ok(())
    }

    /// Ids of records whose highlight stage has not completed
    ///
    /// No ordering guarantee; callers must not assume freshness beyond the
    /// last completed save.
    pub async fn list_pending_content_records(&self) -> Result<Vec<String>> {
        let rows =
            sqlx::query_scalar("SELECT id FROM content_records WHERE highlight_status != 'complete'")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }
}

fn parse_payload(id: &str, payload: &str) -> Option<ContentRecord> {
    match serde_json::from_str(payload) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(record_id = %id, error = %e, "corrupted content record payload, treating as absent");
            None
        }
    }
}

/// Merge an incoming record over the stored one
///
/// Incoming scalar fields win; the two exceptions preserve prior work.
fn merge_records(existing: ContentRecord, incoming: ContentRecord) -> ContentRecord {
    let mut merged = incoming;

    let mut metadata = existing.metadata;
    metadata.extend(merged.metadata);
    merged.metadata = metadata;

    if merged.highlights.is_empty() && !existing.highlights.is_empty() {
        merged.highlights = existing.highlights;
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_database;
    use crate::models::{HighlightEntry, HighlightStatus};

    fn record(id: &str) -> ContentRecord {
        let mut record = ContentRecord {
            id: id.to_string(),
            source: "account_ingest".to_string(),
            platform: Some("youtube".to_string()),
            account: Some("creator".to_string()),
            ..Default::default()
        };
        record.set_highlight_status(HighlightStatus::Pending);
        record
    }

    fn entry(index: usize) -> HighlightEntry {
        HighlightEntry {
            index,
            start: 1.0,
            end: 6.0,
            score: 0.9,
            raw_path: format!("/tmp/seg{index}.mp4"),
            subtitle_path: format!("/tmp/seg{index}.srt"),
            final_path: format!("/tmp/seg{index}_subtitled.mp4"),
        }
    }

    #[tokio::test]
    async fn test_load_absent_record() {
        let database = test_database().await;
        assert!(database.load_content_record("youtube_x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let database = test_database().await;
        let mut rec = record("youtube_x");
        rec.download_path = Some("/tmp/x.mp4".to_string());
        database.save_content_record(&rec).await.unwrap();

        let loaded = database
            .load_content_record("youtube_x")
            .await
            .unwrap()
            .expect("record stored");
        assert_eq!(loaded.download_path.as_deref(), Some("/tmp/x.mp4"));
        assert_eq!(loaded.highlight_status(), HighlightStatus::Pending);
    }

    #[tokio::test]
    async fn test_empty_highlights_never_clobber_existing() {
        let database = test_database().await;

        let mut first = record("youtube_x");
        first.highlights = vec![entry(1), entry(2)];
        first.set_highlight_status(HighlightStatus::Complete);
        database.save_content_record(&first).await.unwrap();

        // Re-ingestion writes the record again with no highlights
        let second = record("youtube_x");
        database.save_content_record(&second).await.unwrap();

        let loaded = database
            .load_content_record("youtube_x")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.highlights.len(), 2);
        // Incoming metadata won: status went back to pending for a re-run
        assert_eq!(loaded.highlight_status(), HighlightStatus::Pending);
    }

    #[tokio::test]
    async fn test_metadata_merges_key_by_key() {
        let database = test_database().await;

        let mut first = record("youtube_x");
        first
            .metadata
            .insert("published_at".to_string(), serde_json::json!("2026-08-01T00:00:00Z"));
        first
            .metadata
            .insert("source_url".to_string(), serde_json::json!("https://a"));
        database.save_content_record(&first).await.unwrap();

        let mut second = record("youtube_x");
        second
            .metadata
            .insert("source_url".to_string(), serde_json::json!("https://b"));
        database.save_content_record(&second).await.unwrap();

        let loaded = database
            .load_content_record("youtube_x")
            .await
            .unwrap()
            .unwrap();
        // Key only present in the prior record survives
        assert_eq!(
            loaded.metadata.get("published_at"),
            Some(&serde_json::json!("2026-08-01T00:00:00Z"))
        );
        // Incoming wins on conflict
        assert_eq!(loaded.metadata.get("source_url"), Some(&serde_json::json!("https://b")));
    }

    #[tokio::test]
    async fn test_corrupt_payload_treated_as_absent() {
        let database = test_database().await;
        sqlx::query(
            "INSERT INTO content_records (id, platform, highlight_status, payload)
             VALUES ('youtube_bad', 'youtube', 'pending', '{not json')",
        )
        .execute(&database.pool())
        .await
        .unwrap();

        assert!(database.load_content_record("youtube_bad").await.unwrap().is_none());

        // A save over the corrupt row replaces it cleanly
        database.save_content_record(&record("youtube_bad")).await.unwrap();
        assert!(database.load_content_record("youtube_bad").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_pending_excludes_complete() {
        let database = test_database().await;

        database.save_content_record(&record("youtube_a")).await.unwrap();

        let mut failed = record("youtube_b");
        failed.set_highlight_status(HighlightStatus::Failed);
        database.save_content_record(&failed).await.unwrap();

        let mut done = record("youtube_c");
        done.highlights = vec![entry(1)];
        done.set_highlight_status(HighlightStatus::Complete);
        database.save_content_record(&done).await.unwrap();

        let mut pending = database.list_pending_content_records().await.unwrap();
        pending.sort();
        assert_eq!(pending, vec!["youtube_a".to_string(), "youtube_b".to_string()]);
    }
}

use anyhow::Result;
use sqlx::Row;

use super::{Database, parse_datetime};
use crate::models::PostStatus;

impl Database {
    /// Upsert post state keyed on (platform, external_id)
    ///
    /// An UPDATE is attempted first; when no row matched (or no external id
    /// was supplied) a new row is inserted. `performance_score` and
    /// `metadata` keep their stored values when not supplied.
    pub async fn update_post_status(
        &self,
        platform: &str,
        status: &str,
        external_id: Option<&str>,
        performance_score: Option<f64>,
        metadata: Option<&str>,
    ) -> Result<()> {
        // Both statements run inside one transaction so concurrent jobs
        // upserting the same (platform, external_id) cannot both take the
        // INSERT branch.
        let mut tx = self.pool.begin().await?;

        if let Some(external_id) = external_id {
            let result = sqlx::query(
                "UPDATE posts
                 SET status = ?,
                     updated_at = datetime('now'),
                     performance_score = COALESCE(?, performance_score),
                     metadata = COALESCE(?, metadata)
                 WHERE platform = ? AND external_id = ?",
            )
            .bind(status)
            .bind(performance_score)
            .bind(metadata)
            .bind(platform)
            .bind(external_id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                tx.commit().await?;
                return Ok(());
            }
        }

        sqlx::query(
            "INSERT INTO posts (platform, external_id, status, created_at, updated_at,
                                performance_score, metadata)
             VALUES (?, ?, ?, datetime('now'), datetime('now'), COALESCE(?, 0), ?)",
        )
        .bind(platform)
        .bind(external_id)
        .bind(status)
        .bind(performance_score)
        .bind(metadata)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// All posts currently in the given status, oldest first
    pub async fn list_posts_with_status(&self, status: &str) -> Result<Vec<PostStatus>> {
        let rows = sqlx::query(
            "SELECT id, platform, external_id, status, created_at, updated_at,
                    performance_score, metadata
             FROM posts WHERE status = ? ORDER BY id",
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        let mut posts = Vec::with_capacity(rows.len());
        for row in rows {
            let created_at: String = row.get("created_at");
            let updated_at: String = row.get("updated_at");
            posts.push(PostStatus {
                id: row.get("id"),
                platform: row.get("platform"),
                external_id: row.get("external_id"),
                status: row.get("status"),
                created_at: parse_datetime(&created_at)?,
                updated_at: parse_datetime(&updated_at)?,
                performance_score: row.get("performance_score"),
                metadata: row.get("metadata"),
            });
        }
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_database;

    #[tokio::test]
    async fn test_upsert_inserts_then_updates() {
        let database = test_database().await;

        database
            .update_post_status(
                "youtube",
                "downloaded",
                Some("youtube_abc"),
                None,
                Some("{\"a\":1}"),
            )
            .await
            .unwrap();
        database
            .update_post_status("youtube", "ready_for_upload", Some("youtube_abc"), Some(0.7), None)
            .await
            .unwrap();

        let ready = database.list_posts_with_status("ready_for_upload").await.unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].external_id.as_deref(), Some("youtube_abc"));
        assert_eq!(ready[0].performance_score, 0.7);
        // metadata preserved by COALESCE
        assert_eq!(ready[0].metadata.as_deref(), Some("{\"a\":1}"));

        // The earlier status bucket is now empty
        assert!(database.list_posts_with_status("downloaded").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_same_external_id_on_other_platform_inserts() {
        let database = test_database().await;

        database
            .update_post_status("youtube", "posted", Some("x_1"), None, None)
            .await
            .unwrap();
        database
            .update_post_status("tiktok", "posted", Some("x_1"), None, None)
            .await
            .unwrap();

        let posted = database.list_posts_with_status("posted").await.unwrap();
        assert_eq!(posted.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_upserts_for_same_key_yield_one_row() {
        let database = test_database().await;
        database
            .update_post_status("youtube", "downloaded", Some("race_1"), None, None)
            .await
            .unwrap();

        let a = database.update_post_status("youtube", "ready_for_upload", Some("race_1"), Some(0.5), None);
        let b = database.update_post_status("youtube", "ready_for_upload", Some("race_1"), Some(0.6), None);
        let (a, b) = tokio::join!(a, b);
        a.unwrap();
        b.unwrap();

        let ready = database.list_posts_with_status("ready_for_upload").await.unwrap();
        assert_eq!(ready.len(), 1);
    }
}

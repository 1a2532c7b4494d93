use anyhow::Result;

use super::Database;

impl Database {
    /// Record a lightweight counter/gauge for dashboards; append-only
    pub async fn record_metric(
        &self,
        platform: &str,
        metric: &str,
        value: f64,
        context: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO metrics (timestamp, platform, metric, value, context)
             VALUES (datetime('now'), ?, ?, ?, ?)",
        )
        .bind(platform)
        .bind(metric)
        .bind(value)
        .bind(context)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

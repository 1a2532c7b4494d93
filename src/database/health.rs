use anyhow::Result;
use sqlx::Row;

use super::{Database, parse_datetime};
use crate::models::{HealthCheck, HealthStatus};

impl Database {
    /// Store a health observation; append-only
    pub async fn record_health(
        &self,
        component: &str,
        status: HealthStatus,
        detail: Option<&str>,
    ) -> Result<()> {
        sqlx::query("INSERT INTO health_checks (component, status, detail) VALUES (?, ?, ?)")
            .bind(component)
            .bind(status.as_str())
            .bind(detail)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Most recent health observation for a component, if any
    pub async fn latest_health(&self, component: &str) -> Result<Option<HealthCheck>> {
        let row = sqlx::query(
            "SELECT id, component, status, detail, observed_at
             FROM health_checks WHERE component = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(component)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let status_str: String = row.get("status");
        let status = HealthStatus::parse(&status_str)
            .ok_or_else(|| anyhow::anyhow!("Unknown health status: {}", status_str))?;
        let observed_at: String = row.get("observed_at");
        Ok(Some(HealthCheck {
            id: row.get("id"),
            component: row.get("component"),
            status,
            detail: row.get("detail"),
            observed_at: parse_datetime(&observed_at)?,
        }))
    }
}

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::{Database, parse_datetime};
use crate::models::{JobRun, JobRunStatus};

/// Per-job success/failure counts over a time window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRunCounts {
    pub job_id: String,
    pub successes: i64,
    pub failures: i64,
}

impl Database {
    /// Persist job execution metadata; append-only, never mutated
    pub async fn record_job_run(
        &self,
        job_id: &str,
        status: JobRunStatus,
        started_at: DateTime<Utc>,
        duration_ms: f64,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO job_runs (job_id, status, started_at, duration_ms, error)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(job_id)
        .bind(status.as_str())
        .bind(started_at.to_rfc3339())
        .bind(duration_ms)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recent runs for one job, newest first
    pub async fn list_job_runs(&self, job_id: &str, limit: i64) -> Result<Vec<JobRun>> {
        let rows = sqlx::query(
            "SELECT id, job_id, status, started_at, duration_ms, error, created_at
             FROM job_runs WHERE job_id = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(job_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut runs = Vec::with_capacity(rows.len());
        for row in rows {
            let status_str: String = row.get("status");
            let status = JobRunStatus::parse(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Unknown job run status: {}", status_str))?;
            let started_at: String = row.get("started_at");
            let created_at: String = row.get("created_at");
            runs.push(JobRun {
                id: row.get("id"),
                job_id: row.get("job_id"),
                status,
                started_at: parse_datetime(&started_at)?,
                duration_ms: row.get("duration_ms"),
                error: row.get("error"),
                created_at: parse_datetime(&created_at)?,
            });
        }
        Ok(runs)
    }

    /// Success/failure counts per job since the given instant
    pub async fn job_run_counts_since(&self, since: DateTime<Utc>) -> Result<Vec<JobRunCounts>> {
        let rows = sqlx::query(
            "SELECT job_id,
                    SUM(CASE WHEN status = 'success' THEN 1 ELSE 0 END) AS successes,
                    SUM(CASE WHEN status = 'failure' THEN 1 ELSE 0 END) AS failures
             FROM job_runs WHERE started_at >= ? GROUP BY job_id ORDER BY job_id",
        )
        .bind(since.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| JobRunCounts {
                job_id: row.get("job_id"),
                successes: row.get("successes"),
                failures: row.get("failures"),
            })
            .collect())
    }
}

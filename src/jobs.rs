//! Static job table
//!
//! Every job the flywheel runs is declared here: three interval pipeline
//! stages plus the daily health report. Registration order is what the
//! executor reports in its snapshot.

use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::errors::RegistrationError;
use crate::models::HealthStatus;
use crate::pipeline;
use crate::scheduling::{JobAction, JobContext, JobRegistry, JobSpec, TriggerKind};

fn action<F, Fut>(f: F) -> JobAction
where
    F: Fn(JobContext) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(f(ctx)))
}

/// Build the full job table from configured cadences
pub fn build_registry(config: &Config) -> Result<JobRegistry, RegistrationError> {
    let s = &config.scheduling;
    let mut registry = JobRegistry::new();

    registry.register(JobSpec::new(
        "source_ingest",
        TriggerKind::Interval {
            minutes: s.ingest_interval_minutes,
        },
        action(pipeline::ingest::run),
    ))?;
    registry.register(JobSpec::new(
        "highlight_pipeline",
        TriggerKind::Interval {
            minutes: s.highlight_interval_minutes,
        },
        action(pipeline::highlight::run),
    ))?;
    registry.register(JobSpec::new(
        "publish_queue",
        TriggerKind::Interval {
            minutes: s.publish_interval_minutes,
        },
        action(pipeline::publish::run),
    ))?;
    registry.register(JobSpec::new(
        "daily_report",
        TriggerKind::Cron {
            hour: s.report_hour,
            minute: s.report_minute,
        },
        action(daily_report),
    ))?;

    Ok(registry)
}

/// Summarize the last 24 hours of job executions into the health ledger
async fn daily_report(ctx: JobContext) -> anyhow::Result<()> {
    let since = Utc::now() - Duration::hours(24);
    let counts = ctx.database.job_run_counts_since(since).await?;

    let total_failures: i64 = counts.iter().map(|c| c.failures).sum();
    let status = if total_failures > 0 {
        HealthStatus::Warn
    } else {
        HealthStatus::Pass
    };

    let detail = json!({
        "since": since.to_rfc3339(),
        "jobs": counts
            .iter()
            .map(|c| json!({
                "job_id": c.job_id,
                "successes": c.successes,
                "failures": c.failures,
            }))
            .collect::<Vec<_>>(),
    });

    ctx.database
        .record_health("report", status, Some(&detail.to_string()))
        .await?;
    info!(jobs = counts.len(), failures = total_failures, "daily report recorded");
    Ok(())
}

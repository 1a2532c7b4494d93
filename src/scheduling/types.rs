//! Job scheduling type definitions

use chrono::{DateTime, Duration, Utc};
use cron::Schedule;
use futures::future::BoxFuture;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::collaborators::Collaborators;
use crate::config::{Config, MAX_INTERVAL_MINUTES};
use crate::database::Database;
use crate::errors::RegistrationError;

/// Everything a job body needs: configuration, store handle, collaborators
#[derive(Clone)]
pub struct JobContext {
    pub config: Arc<Config>,
    pub database: Database,
    pub collaborators: Arc<Collaborators>,
}

/// A job body: takes the shared context, returns success or a swallowed error
pub type JobAction = Arc<dyn Fn(JobContext) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Firing rule for a registered job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// Fixed period in minutes; first fire happens immediately at start
    Interval { minutes: u32 },
    /// Calendar-based daily firing at hour:minute (UTC)
    Cron { hour: u8, minute: u8 },
}

impl TriggerKind {
    /// Check schedule parameters; invalid parameters abort startup
    pub fn validate(&self, job_id: &str) -> Result<(), RegistrationError> {
        match *self {
            TriggerKind::Interval { minutes } => {
                if minutes == 0 || minutes > MAX_INTERVAL_MINUTES {
                    return Err(RegistrationError::InvalidInterval {
                        job_id: job_id.to_string(),
                        minutes,
                        max: MAX_INTERVAL_MINUTES,
                    });
                }
            }
            TriggerKind::Cron { hour, minute } => {
                if hour > 23 {
                    return Err(RegistrationError::InvalidCronHour {
                        job_id: job_id.to_string(),
                        hour,
                    });
                }
                if minute > 59 {
                    return Err(RegistrationError::InvalidCronMinute {
                        job_id: job_id.to_string(),
                        minute,
                    });
                }
                let expression = cron_expression(hour, minute);
                Schedule::from_str(&expression).map_err(|e| {
                    RegistrationError::InvalidCronExpression {
                        job_id: job_id.to_string(),
                        expression,
                        message: e.to_string(),
                    }
                })?;
            }
        }
        Ok(())
    }

    /// Fire time used when the executor starts
    pub fn first_fire(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match *self {
            TriggerKind::Interval { .. } => now,
            TriggerKind::Cron { .. } => self.next_fire(now),
        }
    }

    /// Next fire time strictly after the given instant
    pub fn next_fire(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        match *self {
            TriggerKind::Interval { minutes } => after + Duration::minutes(i64::from(minutes)),
            TriggerKind::Cron { hour, minute } => {
                let expression = cron_expression(hour, minute);
                match Schedule::from_str(&expression) {
                    Ok(schedule) => schedule
                        .after(&after)
                        .next()
                        .unwrap_or_else(|| after + Duration::days(1)),
                    // Validated at registration; unreachable in practice
                    Err(_) => after + Duration::days(1),
                }
            }
        }
    }
}

fn cron_expression(hour: u8, minute: u8) -> String {
    format!("0 {minute} {hour} * * * *")
}

/// An immutable job registration: identifier, firing rule, body
#[derive(Clone)]
pub struct JobSpec {
    pub job_id: String,
    pub trigger: TriggerKind,
    pub action: JobAction,
}

impl JobSpec {
    pub fn new(job_id: impl Into<String>, trigger: TriggerKind, action: JobAction) -> Self {
        Self {
            job_id: job_id.into(),
            trigger,
            action,
        }
    }
}

impl fmt::Debug for JobSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobSpec")
            .field("job_id", &self.job_id)
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

/// Snapshot of executor state for health checks; a pure read
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerSnapshot {
    pub total_jobs: usize,
    pub running: bool,
    pub next_runs: BTreeMap<String, Option<DateTime<Utc>>>,
}

/// Executor lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

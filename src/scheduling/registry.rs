//! Static job registry built at startup

use tracing::{debug, info};

use super::types::JobSpec;
use crate::errors::RegistrationError;

/// Registered jobs in declaration order
///
/// Registering a job id that already exists replaces the prior registration
/// in place (explicit replace semantics), keeping its position in the order.
#[derive(Default)]
pub struct JobRegistry {
    entries: Vec<JobSpec>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: JobSpec) -> Result<(), RegistrationError> {
        if spec.job_id.is_empty() {
            return Err(RegistrationError::EmptyJobId);
        }
        spec.trigger.validate(&spec.job_id)?;

        if let Some(pos) = self.entries.iter().position(|e| e.job_id == spec.job_id) {
            info!(job_id = %spec.job_id, "replacing existing job registration");
            self.entries[pos] = spec;
        } else {
            debug!(job_id = %spec.job_id, trigger = ?spec.trigger, "registered job");
            self.entries.push(spec);
        }
        Ok(())
    }

    pub fn jobs(&self) -> &[JobSpec] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

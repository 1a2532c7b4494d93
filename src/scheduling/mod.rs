//! Job scheduling subsystem for clip-flywheel
//!
//! Built around three components:
//! - `JobRegistry`: declaration-order job table with replace semantics
//! - `SchedulerExecutor`: background clock, coalescing, run ledger writes
//! - type definitions shared by both (`TriggerKind`, `JobSpec`, snapshots)

pub mod executor;
pub mod registry;
pub mod types;

pub use executor::{SchedulerExecutor, run_job_once};
pub use registry::JobRegistry;
pub use types::{ExecutorState, JobAction, JobContext, JobSpec, SchedulerSnapshot, TriggerKind};

//! clip-flywheel: an unattended short-form clip automation loop
//!
//! Ingests recent uploads from configured creator accounts, cuts
//! high-motion highlight segments with burned-in subtitles, and queues the
//! results for publishing. A background scheduler drives the three pipeline
//! stages plus a daily health report, recording every job execution in a
//! SQLite ledger.

pub mod app;
pub mod collaborators;
pub mod config;
pub mod database;
pub mod errors;
pub mod jobs;
pub mod models;
pub mod pipeline;
pub mod scheduling;

pub use app::LifecycleController;
pub use config::Config;
pub use database::Database;
pub use errors::AppError;

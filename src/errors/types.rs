//! Error type definitions for the clip-flywheel application
//!
//! This module defines all error types used throughout the application,
//! providing a hierarchical error system that makes debugging and error
//! handling more straightforward.

use thiserror::Error;

/// Top-level application error type
///
/// This enum represents all possible errors that can occur in the application.
/// It uses `thiserror` to provide automatic error trait implementations and
/// proper error chaining.
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Job registration errors (fatal at startup)
    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Lifecycle errors (scheduler start/shutdown plumbing)
    #[error("Lifecycle error: {message}")]
    Lifecycle { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Errors raised when a job cannot be registered
///
/// These are startup-only and always fatal: the process refuses to run with
/// a malformed job table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// Interval trigger with an out-of-bounds cadence
    #[error("job '{job_id}': interval must be 1..={max} minutes, got {minutes}")]
    InvalidInterval {
        job_id: String,
        minutes: u32,
        max: u32,
    },

    /// Cron trigger with an invalid hour field
    #[error("job '{job_id}': cron hour must be 0..=23, got {hour}")]
    InvalidCronHour { job_id: String, hour: u8 },

    /// Cron trigger with an invalid minute field
    #[error("job '{job_id}': cron minute must be 0..=59, got {minute}")]
    InvalidCronMinute { job_id: String, minute: u8 },

    /// Cron expression that failed to compile
    #[error("job '{job_id}': cron expression '{expression}' is invalid: {message}")]
    InvalidCronExpression {
        job_id: String,
        expression: String,
        message: String,
    },

    /// Job with an empty identifier
    #[error("job id must not be empty")]
    EmptyJobId,
}

/// Per-record/per-segment pipeline errors
///
/// Stage errors are always recovered at the batch level: the failing unit of
/// work is logged and skipped, the rest of the batch proceeds.
#[derive(Error, Debug)]
pub enum StageError {
    /// An external collaborator call failed
    #[error("Collaborator failure: {0}")]
    Collaborator(#[from] CollaboratorError),

    /// A previously recorded artifact is gone from disk
    #[error("Missing artifact for record '{record_id}': {path}")]
    MissingArtifact { record_id: String, path: String },

    /// Record payload could not be serialized
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from external collaborator calls (subprocesses, HTTP APIs)
///
/// Recovered at every call site as a stage failure for that single item.
#[derive(Error, Debug)]
pub enum CollaboratorError {
    /// A spawned command exited non-zero
    #[error("command '{command}' failed with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    /// A spawned command exceeded its timeout
    #[error("command '{command}' timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },

    /// A command produced output we could not interpret
    #[error("unexpected output from '{command}': {message}")]
    UnexpectedOutput { command: String, message: String },

    /// Filesystem errors while staging artifacts
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP errors from remote collaborator APIs
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

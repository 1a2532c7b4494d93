use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

/// Outcome of a single job execution
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobRunStatus {
    Success,
    Failure,
}

impl JobRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobRunStatus::Success => "success",
            JobRunStatus::Failure => "failure",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(JobRunStatus::Success),
            "failure" => Some(JobRunStatus::Failure),
            _ => None,
        }
    }
}

/// Health observation level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Pass,
    Warn,
    Fail,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Pass => "pass",
            HealthStatus::Warn => "warn",
            HealthStatus::Fail => "fail",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pass" => Some(HealthStatus::Pass),
            "warn" => Some(HealthStatus::Warn),
            "fail" => Some(HealthStatus::Fail),
            _ => None,
        }
    }
}

/// Highlight-stage progress for a content record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HighlightStatus {
    Pending,
    Complete,
    Failed,
}

impl HighlightStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HighlightStatus::Pending => "pending",
            HighlightStatus::Complete => "complete",
            HighlightStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(HighlightStatus::Pending),
            "complete" => Some(HighlightStatus::Complete),
            "failed" => Some(HighlightStatus::Failed),
            _ => None,
        }
    }
}

/// One row in the append-only job execution ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRun {
    pub id: i64,
    pub job_id: String,
    pub status: JobRunStatus,
    pub started_at: DateTime<Utc>,
    pub duration_ms: f64,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One row in the append-only health ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub id: i64,
    pub component: String,
    pub status: HealthStatus,
    pub detail: Option<String>,
    pub observed_at: DateTime<Utc>,
}

/// Per-platform post state, upserted on (platform, external_id)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostStatus {
    pub id: i64,
    pub platform: String,
    pub external_id: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub performance_score: f64,
    pub metadata: Option<String>,
}

/// One rendered highlight artifact belonging to a content record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HighlightEntry {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub score: f64,
    pub raw_path: String,
    pub subtitle_path: String,
    pub final_path: String,
}

/// The durable unit of pipeline state for one ingested media item
///
/// The id is deterministic for a given source item, so re-ingestion merges
/// into the stored record instead of duplicating it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: String,
    pub source: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub download_path: Option<String>,
    #[serde(default)]
    pub render_path: Option<String>,
    #[serde(default)]
    pub highlights: Vec<HighlightEntry>,
}

impl ContentRecord {
    pub fn highlight_status(&self) -> HighlightStatus {
        self.metadata
            .get("highlight_status")
            .and_then(|v| v.as_str())
            .and_then(HighlightStatus::parse)
            .unwrap_or(HighlightStatus::Pending)
    }

    pub fn set_highlight_status(&mut self, status: HighlightStatus) {
        self.metadata.insert(
            "highlight_status".to_string(),
            serde_json::Value::String(status.as_str().to_string()),
        );
    }
}

/// A normalized item returned by a source listing collaborator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceItem {
    pub platform: String,
    pub account: String,
    pub url: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
}

impl SourceItem {
    /// Derive the deterministic content record id for this item
    ///
    /// Stable for the same (platform, identifier) across runs: re-ingestion
    /// merges into the existing record instead of creating a new one.
    pub fn record_id(&self) -> String {
        let base = self
            .external_id
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| {
                Path::new(&self.url)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
            })
            .unwrap_or_default();

        let sanitized: String = base
            .chars()
            .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '-' || *ch == '_')
            .collect();

        if sanitized.is_empty() {
            // Fixed digest so ids survive toolchain upgrades
            let digest = Sha256::digest(self.url.as_bytes());
            let hex: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
            format!("{}_{hex}", self.platform)
        } else {
            format!("{}_{}", self.platform, sanitized.to_lowercase())
        }
    }
}

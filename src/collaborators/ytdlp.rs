//! yt-dlp backed source listing and asset downloads

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use super::process::run_checked;
use super::{AssetDownloader, SourceLister};
use crate::config::IngestSource;
use crate::errors::CollaboratorError;
use crate::models::SourceItem;

const LIST_TIMEOUT: Duration = Duration::from_secs(60);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

pub struct YtDlp {
    command: String,
}

impl YtDlp {
    pub fn new() -> Self {
        Self {
            command: "yt-dlp".to_string(),
        }
    }
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceLister for YtDlp {
    async fn list_items(
        &self,
        source: &IngestSource,
        max_items: u32,
    ) -> Result<Vec<SourceItem>, CollaboratorError> {
        let mut cmd = Command::new(&self.command);
        cmd.arg("--dump-json")
            .arg("--flat-playlist")
            .arg("--no-warnings")
            .arg("--playlist-end")
            .arg(max_items.to_string())
            .arg(&source.url);

        let output = run_checked(cmd, "yt-dlp --dump-json", LIST_TIMEOUT).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        let mut items = Vec::new();
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            let value: serde_json::Value =
                serde_json::from_str(line).map_err(|e| CollaboratorError::UnexpectedOutput {
                    command: "yt-dlp --dump-json".to_string(),
                    message: format!("invalid JSON line: {e}"),
                })?;

            let url = value["url"]
                .as_str()
                .or_else(|| value["webpage_url"].as_str())
                .map(str::to_string);
            let Some(url) = url else {
                debug!(account = %source.account, "listing entry without url, skipping");
                continue;
            };

            items.push(SourceItem {
                platform: source.platform.clone(),
                account: source.account.clone(),
                url,
                external_id: value["id"].as_str().map(str::to_string),
                title: value["title"].as_str().map(str::to_string),
                published_at: value["timestamp"]
                    .as_i64()
                    .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
                duration_seconds: value["duration"].as_f64(),
            });
        }
        debug!(
            platform = %source.platform,
            account = %source.account,
            count = items.len(),
            "listed source items"
        );
        Ok(items)
    }
}

#[async_trait]
impl AssetDownloader for YtDlp {
    async fn download(
        &self,
        item: &SourceItem,
        dest_dir: &Path,
    ) -> Result<PathBuf, CollaboratorError> {
        tokio::fs::create_dir_all(dest_dir).await?;
        let target = dest_dir.join(format!("{}.mp4", item.record_id()));

        let mut cmd = Command::new(&self.command);
        cmd.arg("--quiet")
            .arg("--no-playlist")
            .arg("--no-warnings")
            .arg("--no-overwrites")
            .arg("-f")
            .arg("mp4/best")
            .arg("--merge-output-format")
            .arg("mp4")
            .arg("-o")
            .arg(&target)
            .arg(&item.url);

        run_checked(cmd, "yt-dlp", DOWNLOAD_TIMEOUT).await?;

        if !target.exists() {
            return Err(CollaboratorError::UnexpectedOutput {
                command: "yt-dlp".to_string(),
                message: format!("expected output file missing: {}", target.display()),
            });
        }
        info!(
            platform = %item.platform,
            account = %item.account,
            path = %target.display(),
            "downloaded clip"
        );
        Ok(target)
    }
}

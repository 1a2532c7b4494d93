//! Whisper API transcription producing SRT subtitle files

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use super::Transcriber;
use crate::config::TranscriptionConfig;
use crate::errors::CollaboratorError;

pub struct WhisperTranscriber {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

impl WhisperTranscriber {
    pub fn new(config: &TranscriptionConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(
        &self,
        clip: &Path,
        dest_dir: &Path,
    ) -> Result<Option<PathBuf>, CollaboratorError> {
        let Some(api_key) = &self.api_key else {
            debug!("no transcription API key configured, skipping subtitles");
            return Ok(None);
        };

        let bytes = tokio::fs::read(clip).await?;
        let file_name = clip
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "clip.mp4".to_string());

        let form = reqwest::multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", "srt".to_string())
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str("video/mp4")
                    .map_err(|e| CollaboratorError::UnexpectedOutput {
                        command: "whisper".to_string(),
                        message: format!("invalid mime type: {e}"),
                    })?,
            );

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;

        let srt = response.text().await?;

        tokio::fs::create_dir_all(dest_dir).await?;
        let stem = clip
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "clip".to_string());
        let target = dest_dir.join(format!("{stem}.srt"));
        tokio::fs::write(&target, srt).await?;

        info!(path = %target.display(), "wrote subtitle track");
        Ok(Some(target))
    }
}

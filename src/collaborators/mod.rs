//! External collaborator interfaces consumed by the pipeline
//!
//! Everything behind these traits is outside the core's correctness
//! envelope: subprocess tools, remote APIs, platform uploaders. Each call
//! carries its own timeout; failures are recovered at the call site as a
//! stage failure for that single item.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{Config, IngestSource};
use crate::errors::CollaboratorError;
use crate::models::SourceItem;
use crate::pipeline::highlights::{HighlightBounds, HighlightSegment};

pub mod ffmpeg;
pub mod outbox;
pub(crate) mod process;
#[cfg(test)]
pub(crate) mod testing;
pub mod whisper;
pub mod ytdlp;

/// Metadata handed to the publishing collaborator
#[derive(Debug, Clone, Default)]
pub struct PublishMetadata {
    pub caption: Option<String>,
    pub hashtags: Vec<String>,
    pub score: f64,
}

#[async_trait]
pub trait SourceLister: Send + Sync {
    /// List recent items for one configured ingestion source
    async fn list_items(
        &self,
        source: &IngestSource,
        max_items: u32,
    ) -> Result<Vec<SourceItem>, CollaboratorError>;
}

#[async_trait]
pub trait AssetDownloader: Send + Sync {
    /// Fetch the item's media into `dest_dir`, returning the file path
    async fn download(
        &self,
        item: &SourceItem,
        dest_dir: &Path,
    ) -> Result<PathBuf, CollaboratorError>;
}

#[async_trait]
pub trait SegmentDetector: Send + Sync {
    /// Detect high-motion segments in a downloaded clip, ordered by
    /// start time
    async fn detect_segments(
        &self,
        path: &Path,
        bounds: &HighlightBounds,
    ) -> Result<Vec<HighlightSegment>, CollaboratorError>;
}

#[async_trait]
pub trait SegmentExporter: Send + Sync {
    /// Cut one segment out of the source clip into `dest`
    async fn export(
        &self,
        source: &Path,
        segment: &HighlightSegment,
        dest: &Path,
    ) -> Result<PathBuf, CollaboratorError>;
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Produce an SRT subtitle file for the clip; `None` when transcription
    /// is unavailable (the caller skips the segment)
    async fn transcribe(
        &self,
        clip: &Path,
        dest_dir: &Path,
    ) -> Result<Option<PathBuf>, CollaboratorError>;
}

#[async_trait]
pub trait OverlayRenderer: Send + Sync {
    /// Burn subtitles (and an optional caption) into the clip
    async fn render(
        &self,
        clip: &Path,
        subtitles: &Path,
        caption: Option<&str>,
        dest: &Path,
    ) -> Result<PathBuf, CollaboratorError>;
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish one rendered asset to a platform, returning its external id
    async fn publish(
        &self,
        platform: &str,
        file: &Path,
        metadata: &PublishMetadata,
    ) -> Result<String, CollaboratorError>;
}

/// The full collaborator set injected into every job context
#[derive(Clone)]
pub struct Collaborators {
    pub lister: Arc<dyn SourceLister>,
    pub downloader: Arc<dyn AssetDownloader>,
    pub detector: Arc<dyn SegmentDetector>,
    pub exporter: Arc<dyn SegmentExporter>,
    pub transcriber: Arc<dyn Transcriber>,
    pub overlay: Arc<dyn OverlayRenderer>,
    pub publisher: Arc<dyn Publisher>,
}

impl Collaborators {
    /// Wire the production set: yt-dlp listing/downloads, ffmpeg media
    /// work, Whisper transcription, outbox publishing
    pub fn production(config: &Config) -> Self {
        let ytdlp = Arc::new(ytdlp::YtDlp::new());
        let ffmpeg = Arc::new(ffmpeg::Ffmpeg::new(&config.highlights));
        Self {
            lister: ytdlp.clone(),
            downloader: ytdlp,
            detector: ffmpeg.clone(),
            exporter: ffmpeg.clone(),
            transcriber: Arc::new(whisper::WhisperTranscriber::new(&config.transcription)),
            overlay: ffmpeg,
            publisher: Arc::new(outbox::OutboxPublisher::new(config.storage.outbox_dir.clone())),
        }
    }
}

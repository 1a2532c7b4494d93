//! Shared collaborator doubles for stage tests

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{
    AssetDownloader, Collaborators, OverlayRenderer, Publisher, PublishMetadata, SegmentDetector,
    SegmentExporter, SourceLister, Transcriber,
};
use crate::config::IngestSource;
use crate::errors::CollaboratorError;
use crate::models::SourceItem;
use crate::pipeline::highlights::{HighlightBounds, HighlightSegment};

pub struct FixedLister {
    pub items: Vec<SourceItem>,
}

#[async_trait]
impl SourceLister for FixedLister {
    async fn list_items(
        &self,
        _source: &IngestSource,
        _max_items: u32,
    ) -> Result<Vec<SourceItem>, CollaboratorError> {
        Ok(self.items.clone())
    }
}

/// Writes a placeholder file per requested download and counts calls
pub struct CountingDownloader {
    pub calls: AtomicUsize,
}

impl CountingDownloader {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetDownloader for CountingDownloader {
    async fn download(
        &self,
        item: &SourceItem,
        dest_dir: &Path,
    ) -> Result<PathBuf, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::fs::create_dir_all(dest_dir).await?;
        let target = dest_dir.join(format!("{}.mp4", item.record_id()));
        tokio::fs::write(&target, b"fake-video").await?;
        Ok(target)
    }
}

pub struct FixedDetector {
    pub segments: Vec<HighlightSegment>,
}

#[async_trait]
impl SegmentDetector for FixedDetector {
    async fn detect_segments(
        &self,
        _path: &Path,
        _bounds: &HighlightBounds,
    ) -> Result<Vec<HighlightSegment>, CollaboratorError> {
        Ok(self.segments.clone())
    }
}

/// Writes a placeholder clip per export; fails for segments whose start
/// matches `fail_start`
pub struct FileExporter {
    pub fail_start: Option<f64>,
}

#[async_trait]
impl SegmentExporter for FileExporter {
    async fn export(
        &self,
        _source: &Path,
        segment: &HighlightSegment,
        dest: &Path,
    ) -> Result<PathBuf, CollaboratorError> {
        if self.fail_start.is_some_and(|s| (segment.start - s).abs() < 1e-9) {
            return Err(CollaboratorError::UnexpectedOutput {
                command: "mock export".to_string(),
                message: "forced failure".to_string(),
            });
        }
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, b"fake-clip").await?;
        Ok(dest.to_path_buf())
    }
}

/// Writes a placeholder subtitle file next to each clip
pub struct FileTranscriber;

#[async_trait]
impl Transcriber for FileTranscriber {
    async fn transcribe(
        &self,
        clip: &Path,
        dest_dir: &Path,
    ) -> Result<Option<PathBuf>, CollaboratorError> {
        tokio::fs::create_dir_all(dest_dir).await?;
        let stem = clip
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "clip".to_string());
        let target = dest_dir.join(format!("{stem}.srt"));
        tokio::fs::write(&target, b"1\n00:00:00,000 --> 00:00:01,000\nhi\n").await?;
        Ok(Some(target))
    }
}

pub struct FileOverlay;

#[async_trait]
impl OverlayRenderer for FileOverlay {
    async fn render(
        &self,
        _clip: &Path,
        _subtitles: &Path,
        _caption: Option<&str>,
        dest: &Path,
    ) -> Result<PathBuf, CollaboratorError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, b"fake-final").await?;
        Ok(dest.to_path_buf())
    }
}

/// Like [`FileOverlay`] but remembers every caption it was handed
#[derive(Default)]
pub struct CaptionRecordingOverlay {
    pub captions: std::sync::Mutex<Vec<Option<String>>>,
}

#[async_trait]
impl OverlayRenderer for CaptionRecordingOverlay {
    async fn render(
        &self,
        _clip: &Path,
        _subtitles: &Path,
        caption: Option<&str>,
        dest: &Path,
    ) -> Result<PathBuf, CollaboratorError> {
        self.captions
            .lock()
            .unwrap()
            .push(caption.map(str::to_string));
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, b"fake-final").await?;
        Ok(dest.to_path_buf())
    }
}

/// Succeeds with sequential remote ids; fails for the named platform
pub struct RecordingPublisher {
    pub fail_platform: Option<String>,
    pub calls: AtomicUsize,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self {
            fail_platform: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(
        &self,
        platform: &str,
        _file: &Path,
        _metadata: &PublishMetadata,
    ) -> Result<String, CollaboratorError> {
        if self.fail_platform.as_deref() == Some(platform) {
            return Err(CollaboratorError::UnexpectedOutput {
                command: "mock publish".to_string(),
                message: format!("forced failure for {platform}"),
            });
        }
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("remote-{n}"))
    }
}

/// A collaborator set wired entirely with in-memory doubles
pub fn test_collaborators() -> Arc<Collaborators> {
    Arc::new(Collaborators {
        lister: Arc::new(FixedLister { items: Vec::new() }),
        downloader: Arc::new(CountingDownloader::new()),
        detector: Arc::new(FixedDetector {
            segments: Vec::new(),
        }),
        exporter: Arc::new(FileExporter { fail_start: None }),
        transcriber: Arc::new(FileTranscriber),
        overlay: Arc::new(FileOverlay),
        publisher: Arc::new(RecordingPublisher::new()),
    })
}

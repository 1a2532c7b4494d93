//! ffmpeg/ffprobe wrappers for motion analysis, clip export and overlays
//!
//! Motion detection decodes a low-resolution grayscale stream and scores
//! each sampled frame by mean absolute luminance change against the
//! previous frame. The deltas feed the windowed segment selection in
//! [`crate::pipeline::highlights`].

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use super::process::run_checked;
use super::{OverlayRenderer, SegmentDetector, SegmentExporter};
use crate::config::HighlightConfig;
use crate::errors::CollaboratorError;
use crate::pipeline::highlights::{select_segments, HighlightBounds, HighlightSegment};

const PROBE_TIMEOUT: Duration = Duration::from_secs(60);
const ANALYZE_TIMEOUT: Duration = Duration::from_secs(600);
const EXPORT_TIMEOUT: Duration = Duration::from_secs(600);

// Analysis frame size. Small frames keep the raw stream cheap while
// preserving enough detail for motion scoring.
const FRAME_WIDTH: usize = 160;
const FRAME_HEIGHT: usize = 90;
const FRAME_BYTES: usize = FRAME_WIDTH * FRAME_HEIGHT;
const MAX_SAMPLE_FPS: f64 = 12.0;

pub struct Ffmpeg {
    ffmpeg: String,
    ffprobe: String,
    sample_fps: f64,
}

impl Ffmpeg {
    pub fn new(config: &HighlightConfig) -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            sample_fps: config.sample_fps.min(MAX_SAMPLE_FPS),
        }
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64, CollaboratorError> {
        let mut cmd = Command::new(&self.ffprobe);
        cmd.arg("-v")
            .arg("error")
            .arg("-show_entries")
            .arg("format=duration")
            .arg("-of")
            .arg("json")
            .arg(path);

        let output = run_checked(cmd, "ffprobe", PROBE_TIMEOUT).await?;
        let value: serde_json::Value = serde_json::from_slice(&output.stdout).map_err(|e| {
            CollaboratorError::UnexpectedOutput {
                command: "ffprobe".to_string(),
                message: format!("invalid JSON output: {e}"),
            }
        })?;

        value["format"]["duration"]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| CollaboratorError::UnexpectedOutput {
                command: "ffprobe".to_string(),
                message: "duration missing from probe output".to_string(),
            })
    }

    async fn luminance_deltas(&self, path: &Path) -> Result<Vec<f32>, CollaboratorError> {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.arg("-v")
            .arg("error")
            .arg("-i")
            .arg(path)
            .arg("-vf")
            .arg(format!(
                "fps={},scale={}:{}",
                self.sample_fps, FRAME_WIDTH, FRAME_HEIGHT
            ))
            .arg("-pix_fmt")
            .arg("gray")
            .arg("-f")
            .arg("rawvideo")
            .arg("-");

        let output = run_checked(cmd, "ffmpeg rawvideo", ANALYZE_TIMEOUT).await?;

        let mut deltas = Vec::new();
        let mut previous: Option<&[u8]> = None;
        for frame in output.stdout.chunks_exact(FRAME_BYTES) {
            let delta = match previous {
                None => 0.0,
                Some(prev) => {
                    let total: u64 = frame
                        .iter()
                        .zip(prev.iter())
                        .map(|(a, b)| a.abs_diff(*b) as u64)
                        .sum();
                    total as f32 / FRAME_BYTES as f32
                }
            };
            deltas.push(delta);
            previous = Some(frame);
        }
        Ok(deltas)
    }
}

#[async_trait]
impl SegmentDetector for Ffmpeg {
    async fn detect_segments(
        &self,
        path: &Path,
        bounds: &HighlightBounds,
    ) -> Result<Vec<HighlightSegment>, CollaboratorError> {
        if !path.exists() {
            warn!(path = %path.display(), "clip missing, nothing to analyze");
            return Ok(Vec::new());
        }

        let duration = self.probe_duration(path).await?;
        if duration <= 0.0 {
            warn!(path = %path.display(), "clip reports zero duration");
            return Ok(Vec::new());
        }

        let deltas = self.luminance_deltas(path).await?;
        let segments = select_segments(&deltas, self.sample_fps, duration, bounds);
        debug!(
            path = %path.display(),
            duration_s = duration,
            frames = deltas.len(),
            segments = segments.len(),
            "motion analysis complete"
        );
        Ok(segments)
    }
}

#[async_trait]
impl SegmentExporter for Ffmpeg {
    async fn export(
        &self,
        source: &Path,
        segment: &HighlightSegment,
        dest: &Path,
    ) -> Result<PathBuf, CollaboratorError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut cmd = Command::new(&self.ffmpeg);
        cmd.arg("-y")
            .arg("-v")
            .arg("error")
            .arg("-ss")
            .arg(format!("{:.3}", segment.start))
            .arg("-i")
            .arg(source)
            .arg("-t")
            .arg(format!("{:.3}", segment.end - segment.start))
            .arg("-c:v")
            .arg("libx264")
            .arg("-c:a")
            .arg("aac")
            .arg(dest);

        run_checked(cmd, "ffmpeg export", EXPORT_TIMEOUT).await?;

        if !dest.exists() {
            return Err(CollaboratorError::UnexpectedOutput {
                command: "ffmpeg export".to_string(),
                message: format!("expected output file missing: {}", dest.display()),
            });
        }
        Ok(dest.to_path_buf())
    }
}

#[async_trait]
impl OverlayRenderer for Ffmpeg {
    async fn render(
        &self,
        clip: &Path,
        subtitles: &Path,
        caption: Option<&str>,
        dest: &Path,
    ) -> Result<PathBuf, CollaboratorError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // subtitles= takes a filter-escaped path; drawtext stacks the
        // caption above the burned-in subtitle track when present.
        let mut filter = format!("subtitles={}", escape_filter_path(subtitles));
        if let Some(text) = caption {
            filter.push_str(&format!(
                ",drawtext=text='{}':fontcolor=white:fontsize=28:box=1:boxcolor=black@0.5:x=(w-text_w)/2:y=40",
                text.replace('\'', "\\'")
            ));
        }

        let mut cmd = Command::new(&self.ffmpeg);
        cmd.arg("-y")
            .arg("-v")
            .arg("error")
            .arg("-i")
            .arg(clip)
            .arg("-vf")
            .arg(filter)
            .arg("-c:a")
            .arg("copy")
            .arg(dest);

        run_checked(cmd, "ffmpeg overlay", EXPORT_TIMEOUT).await?;

        if !dest.exists() {
            return Err(CollaboratorError::UnexpectedOutput {
                command: "ffmpeg overlay".to_string(),
                message: format!("expected output file missing: {}", dest.display()),
            });
        }
        Ok(dest.to_path_buf())
    }
}

fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

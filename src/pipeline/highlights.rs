//! Highlight selection over per-frame luminance deltas
//!
//! The window mean of frame-to-frame luminance change approximates motion
//! energy; prefix sums keep the exhaustive window scan linear-amortized.

use serde::{Deserialize, Serialize};

use crate::config::HighlightConfig;

/// A time-bounded sub-clip picked by the selection algorithm
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HighlightSegment {
    pub start: f64,
    pub end: f64,
    pub score: f64,
}

/// Configured limits for segment selection
#[derive(Debug, Clone, Copy)]
pub struct HighlightBounds {
    pub min_duration: f64,
    pub max_duration: f64,
    pub max_segments: usize,
}

impl From<&HighlightConfig> for HighlightBounds {
    fn from(config: &HighlightConfig) -> Self {
        Self {
            min_duration: config.min_duration_seconds,
            max_duration: config.max_duration_seconds,
            max_segments: config.max_segments,
        }
    }
}

/// Maximum overlap (seconds) tolerated between two selected segments
const OVERLAP_TOLERANCE: f64 = 1.0;

/// Windows shorter than this fraction of `min_duration` after end-clamping
/// are discarded as degenerate
const MIN_SPAN_FRACTION: f64 = 0.8;

/// Select up to `max_segments` non-overlapping high-motion windows
///
/// `deltas` holds one mean absolute luminance delta per sampled frame
/// (first frame conventionally 0.0), sampled at `sample_fps` over
/// `clip_duration` seconds. Deterministic for identical input.
pub fn select_segments(
    deltas: &[f32],
    sample_fps: f64,
    clip_duration: f64,
    bounds: &HighlightBounds,
) -> Vec<HighlightSegment> {
    if clip_duration <= 0.0 {
        return Vec::new();
    }

    // Degenerate short clip: one segment, no windowing needed
    if clip_duration <= bounds.min_duration || deltas.len() <= 1 {
        return vec![whole_clip(clip_duration, bounds)];
    }

    let frame_step = 1.0 / sample_fps.max(1.0);
    let min_frames = ((bounds.min_duration * sample_fps) as usize).max(1);
    let max_frames = ((bounds.max_duration * sample_fps) as usize)
        .max(min_frames)
        .min(deltas.len());

    let mut cumulative = Vec::with_capacity(deltas.len() + 1);
    cumulative.push(0.0f64);
    for delta in deltas {
        let last = *cumulative.last().unwrap_or(&0.0);
        cumulative.push(last + f64::from(*delta));
    }

    let mut candidates: Vec<HighlightSegment> = Vec::new();
    for window in min_frames..=max_frames {
        for start_idx in 0..=(deltas.len() - window) {
            let score = (cumulative[start_idx + window] - cumulative[start_idx]) / window as f64;
            let start = start_idx as f64 * frame_step;
            let end = (start + window as f64 * frame_step).min(clip_duration);
            if end - start < bounds.min_duration * MIN_SPAN_FRACTION {
                continue;
            }
            candidates.push(HighlightSegment { start, end, score });
        }
    }

    if candidates.is_empty() {
        return vec![whole_clip(clip_duration, bounds)];
    }

    // Stable sort: ties keep earlier-computed candidate first
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut selected: Vec<HighlightSegment> = Vec::new();
    for candidate in candidates {
        if selected.len() >= bounds.max_segments {
            break;
        }
        let overlaps = selected.iter().any(|existing| {
            let overlap = existing.end.min(candidate.end) - existing.start.max(candidate.start);
            overlap > OVERLAP_TOLERANCE
        });
        if !overlaps {
            selected.push(candidate);
        }
    }

    selected.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal));
    selected
}

fn whole_clip(clip_duration: f64, bounds: &HighlightBounds) -> HighlightSegment {
    HighlightSegment {
        start: 0.0,
        end: clip_duration.min(bounds.max_duration),
        score: 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> HighlightBounds {
        HighlightBounds {
            min_duration: 3.0,
            max_duration: 10.0,
            max_segments: 3,
        }
    }

    #[test]
    fn test_short_clip_returns_single_full_segment() {
        let segments = select_segments(&[0.5, 0.9], 12.0, 2.0, &bounds());
        assert_eq!(segments, vec![HighlightSegment { start: 0.0, end: 2.0, score: 1.0 }]);
    }

    #[test]
    fn test_short_clip_is_capped_at_max_duration() {
        let tight = HighlightBounds {
            min_duration: 5.0,
            max_duration: 4.0,
            max_segments: 3,
        };
        // min > max is rejected by config validation, but the guard still
        // clamps to max_duration
        let segments = select_segments(&[0.1], 12.0, 4.5, &tight);
        assert_eq!(segments[0].end, 4.0);
    }

    #[test]
    fn test_single_delta_sample_degenerates() {
        let segments = select_segments(&[0.0], 12.0, 60.0, &bounds());
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].score, 1.0);
        assert_eq!(segments[0].end, 10.0);
    }

    #[test]
    fn test_dominant_motion_window_ranks_first() {
        // 60s clip at 2 fps: flat noise with one burst at 40..45s
        let fps = 2.0;
        let mut deltas = vec![0.1f32; 120];
        for value in deltas.iter_mut().take(90).skip(80) {
            *value = 50.0;
        }
        let segments = select_segments(&deltas, fps, 60.0, &bounds());
        assert!(!segments.is_empty());
        let top = segments
            .iter()
            .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap())
            .unwrap();
        // The top-scoring pick must cover the burst region
        assert!(top.start <= 40.0 && top.end >= 45.0, "top segment {top:?} misses burst");
    }

    #[test]
    fn test_never_exceeds_max_segments_or_overlap_tolerance() {
        let fps = 4.0;
        let deltas: Vec<f32> = (0..480).map(|i| ((i * 31) % 97) as f32 / 97.0).collect();
        let segments = select_segments(&deltas, fps, 120.0, &bounds());
        assert!(segments.len() <= 3);
        for (i, a) in segments.iter().enumerate() {
            for b in segments.iter().skip(i + 1) {
                let overlap = a.end.min(b.end) - a.start.max(b.start);
                assert!(overlap <= 1.0, "segments {a:?} and {b:?} overlap by {overlap}");
            }
        }
        // Output ordered by start time ascending
        for pair in segments.windows(2) {
            assert!(pair[0].start <= pair[1].start);
        }
    }

    #[test]
    fn test_deterministic_for_identical_input() {
        let deltas: Vec<f32> = (0..240).map(|i| (i % 13) as f32).collect();
        let a = select_segments(&deltas, 4.0, 60.0, &bounds());
        let b = select_segments(&deltas, 4.0, 60.0, &bounds());
        assert_eq!(a, b);
    }
}

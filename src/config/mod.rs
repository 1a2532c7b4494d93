use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub scheduling: SchedulingConfig,
    pub ingest: IngestConfig,
    pub highlights: HighlightConfig,
    pub publish: PublishConfig,
    pub transcription: TranscriptionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub download_dir: PathBuf,
    pub render_dir: PathBuf,
    pub outbox_dir: PathBuf,
}

impl StorageConfig {
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.download_dir)?;
        std::fs::create_dir_all(&self.render_dir)?;
        std::fs::create_dir_all(&self.outbox_dir)?;
        Ok(())
    }
}

/// Per-job cadences plus executor tuning
///
/// Interval cadences are minutes; the daily report uses a calendar trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    pub ingest_interval_minutes: u32,
    pub highlight_interval_minutes: u32,
    pub publish_interval_minutes: u32,
    pub report_hour: u8,
    pub report_minute: u8,
    pub misfire_grace_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestSource {
    pub platform: String,
    pub account: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub sources: Vec<IngestSource>,
    pub max_items: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighlightConfig {
    pub min_duration_seconds: f64,
    pub max_duration_seconds: f64,
    pub max_segments: usize,
    pub sample_fps: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    pub platforms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    pub api_url: String,
    pub model: String,
    /// Usually supplied via OPENAI_API_KEY rather than the config file
    pub api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://./clip-flywheel.db".to_string(),
                max_connections: Some(10),
            },
            storage: StorageConfig {
                download_dir: PathBuf::from("./data/downloads"),
                render_dir: PathBuf::from("./data/renders"),
                outbox_dir: PathBuf::from("./data/outbox"),
            },
            scheduling: SchedulingConfig {
                ingest_interval_minutes: 15,
                highlight_interval_minutes: 45,
                publish_interval_minutes: 15,
                report_hour: 22,
                report_minute: 0,
                misfire_grace_seconds: 90,
            },
            ingest: IngestConfig {
                sources: Vec::new(),
                max_items: 20,
            },
            highlights: HighlightConfig {
                min_duration_seconds: 3.0,
                max_duration_seconds: 10.0,
                max_segments: 3,
                sample_fps: 12.0,
            },
            publish: PublishConfig {
                platforms: vec!["youtube".to_string()],
            },
            transcription: TranscriptionConfig {
                api_url: "https://api.openai.com/v1/audio/transcriptions".to_string(),
                model: "whisper-1".to_string(),
                api_key: None,
            },
        }
    }
}

/// Upper bound for interval cadences: one week in minutes
pub const MAX_INTERVAL_MINUTES: u32 = 10_080;

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());

        let mut config = if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(&config_file)?;
            toml::from_str(&contents)?
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(&config_file, contents)?;
            default_config
        };

        if config.transcription.api_key.is_none() {
            config.transcription.api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
        }

        Ok(config)
    }

    /// Validate all cadence and bound values before any job is registered
    pub fn validate(&self) -> Result<(), AppError> {
        let s = &self.scheduling;
        for (name, minutes) in [
            ("ingest_interval_minutes", s.ingest_interval_minutes),
            ("highlight_interval_minutes", s.highlight_interval_minutes),
            ("publish_interval_minutes", s.publish_interval_minutes),
        ] {
            if minutes == 0 || minutes > MAX_INTERVAL_MINUTES {
                return Err(AppError::Configuration {
                    message: format!(
                        "{name} must be 1..={MAX_INTERVAL_MINUTES}, got {minutes}"
                    ),
                });
            }
        }
        if s.report_hour > 23 {
            return Err(AppError::Configuration {
                message: format!("report_hour must be 0..=23, got {}", s.report_hour),
            });
        }
        if s.report_minute > 59 {
            return Err(AppError::Configuration {
                message: format!("report_minute must be 0..=59, got {}", s.report_minute),
            });
        }

        let h = &self.highlights;
        if h.min_duration_seconds <= 0.0 {
            return Err(AppError::Configuration {
                message: "min_duration_seconds must be positive".to_string(),
            });
        }
        if h.max_duration_seconds < h.min_duration_seconds {
            return Err(AppError::Configuration {
                message: "max_duration_seconds must be >= min_duration_seconds".to_string(),
            });
        }
        if h.max_segments == 0 {
            return Err(AppError::Configuration {
                message: "max_segments must be at least 1".to_string(),
            });
        }
        if h.sample_fps <= 0.0 {
            return Err(AppError::Configuration {
                message: "sample_fps must be positive".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = Config::default();
        config.scheduling.ingest_interval_minutes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cron_bounds_rejected() {
        let mut config = Config::default();
        config.scheduling.report_hour = 24;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.scheduling.report_minute = 60;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_highlight_bounds_rejected() {
        let mut config = Config::default();
        config.highlights.max_duration_seconds = 1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.highlights.max_segments = 0;
        assert!(config.validate().is_err());
    }
}

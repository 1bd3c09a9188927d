//! Stamping configuration.
//!
//! Every literal the pipeline depends on (font, placement, naming convention, encoder settings,
//! worker budget) lives in [`StampConfig`]. The same value is handed to discovery, to every job,
//! and to the batch driver, so the components never disagree about a constant.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::Context as _;

use crate::foundation::error::{StampError, StampResult};

/// Configuration shared by the overlay function and the batch driver.
///
/// Deserializes from JSON; omitted fields take the defaults documented on each field.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StampConfig {
    /// Font file to rasterize with. A bare file name is also looked up among system fonts.
    /// Default: `DejaVuSansMono-Bold.ttf`.
    pub font_path: String,
    /// Font size in pixels per em. Default: `110`.
    pub font_size: f32,
    /// Inset of the text box from the right and bottom frame edges, in pixels. Default: `100`.
    pub margin: u32,
    /// Text color (RGB). Default: white.
    pub text_color: [u8; 3],
    /// `chrono` strftime pattern for the overlay text. Default: `%Y-%m-%d %H:%M:%S`.
    pub timestamp_format: String,

    /// Video file extensions, matched case-insensitively. Default: `["mp4"]`.
    pub video_extensions: Vec<String>,
    /// Appended to the video file stem to name the sidecar. Default: `M01.XML`.
    pub metadata_suffix: String,
    /// Appended to the video file stem to name the output. Default: `_timestamp`.
    pub output_suffix: String,
    /// Output file extension, used verbatim. Default: `MP4`.
    pub output_extension: String,

    /// ffmpeg video encoder. Default: `libx264`.
    pub video_codec: String,
    /// ffmpeg audio encoder for the passthrough audio track. Default: `aac`.
    pub audio_codec: String,
    /// Encoder preset. Default: `medium`.
    pub encoder_preset: String,
    /// Threads given to each job's encoder. Default: `4`.
    pub encoder_threads: usize,
    /// Concurrent jobs. `None` derives the count from the core budget.
    pub workers: Option<usize>,
}

impl Default for StampConfig {
    fn default() -> Self {
        Self {
            font_path: "DejaVuSansMono-Bold.ttf".to_string(),
            font_size: 110.0,
            margin: 100,
            text_color: [255, 255, 255],
            timestamp_format: "%Y-%m-%d %H:%M:%S".to_string(),
            video_extensions: vec!["mp4".to_string()],
            metadata_suffix: "M01.XML".to_string(),
            output_suffix: "_timestamp".to_string(),
            output_extension: "MP4".to_string(),
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            encoder_preset: "medium".to_string(),
            encoder_threads: 4,
            workers: None,
        }
    }
}

impl StampConfig {
    /// Load a JSON configuration file.
    pub fn from_path(path: &Path) -> StampResult<Self> {
        let f = File::open(path).with_context(|| format!("open config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parse config JSON '{}'", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> StampResult<()> {
        if !self.font_size.is_finite() || self.font_size <= 0.0 {
            return Err(StampError::validation("font_size must be a positive number"));
        }
        if self.timestamp_format.trim().is_empty() {
            return Err(StampError::validation("timestamp_format must not be empty"));
        }
        if self.video_extensions.is_empty()
            || self.video_extensions.iter().any(|e| e.trim().is_empty())
        {
            return Err(StampError::validation(
                "video_extensions must list at least one non-empty extension",
            ));
        }
        if self.metadata_suffix.is_empty() {
            return Err(StampError::validation("metadata_suffix must not be empty"));
        }
        if self.output_suffix.is_empty() && self.output_extension.is_empty() {
            return Err(StampError::validation(
                "output_suffix and output_extension cannot both be empty",
            ));
        }
        for (name, value) in [
            ("video_codec", &self.video_codec),
            ("audio_codec", &self.audio_codec),
            ("encoder_preset", &self.encoder_preset),
        ] {
            if value.trim().is_empty() {
                return Err(StampError::validation(format!("{name} must not be empty")));
            }
        }
        if self.encoder_threads == 0 {
            return Err(StampError::validation("encoder_threads must be >= 1"));
        }
        if self.workers == Some(0) {
            return Err(StampError::validation("workers must be >= 1 when set"));
        }
        Ok(())
    }

    /// Whether `ext` (without the dot) names a video file under this configuration.
    pub fn is_video_extension(&self, ext: &str) -> bool {
        self.video_extensions
            .iter()
            .any(|v| v.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

/// Resolved parallelism for one batch.
///
/// Total encoder parallelism is `workers * encoder_threads`; it stays within the core budget
/// except when a single worker already uses every core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceBudget {
    pub workers: usize,
    pub encoder_threads: usize,
}

impl ResourceBudget {
    pub fn resolve(cfg: &StampConfig, available_cores: usize) -> StampResult<Self> {
        cfg.validate()?;
        let cores = available_cores.max(1);

        match cfg.workers {
            Some(workers) => {
                let total = workers.saturating_mul(cfg.encoder_threads);
                if total > cores {
                    return Err(StampError::validation(format!(
                        "workers ({workers}) x encoder_threads ({}) = {total} exceeds the {cores} available cores",
                        cfg.encoder_threads
                    )));
                }
                Ok(Self {
                    workers,
                    encoder_threads: cfg.encoder_threads,
                })
            }
            None => {
                let encoder_threads = cfg.encoder_threads.min(cores);
                Ok(Self {
                    workers: (cores / encoder_threads).max(1),
                    encoder_threads,
                })
            }
        }
    }

    pub fn total_threads(self) -> usize {
        self.workers * self.encoder_threads
    }
}

/// Logical cores available to this process (at least 1).
pub fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1)
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;

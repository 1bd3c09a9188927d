use std::{
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use crate::foundation::{
    core::Fps,
    error::{StampError, StampResult},
};

/// Stream facts needed to decode and re-encode one clip.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoSourceInfo {
    pub source_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
    pub duration_sec: f64,
    pub has_audio: bool,
}

impl VideoSourceInfo {
    /// Bytes per decoded `rgb24` frame.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

pub fn is_tool_on_path(tool: &str) -> bool {
    Command::new(tool)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Fail unless both `ffmpeg` and `ffprobe` can be invoked from `PATH`.
pub fn ensure_ffmpeg_tools() -> StampResult<()> {
    for tool in ["ffmpeg", "ffprobe"] {
        if !is_tool_on_path(tool) {
            return Err(StampError::media(format!(
                "{tool} is required but was not found on PATH"
            )));
        }
    }
    Ok(())
}

pub fn probe_video(source_path: &Path) -> StampResult<VideoSourceInfo> {
    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(source_path)
        .output()
        .map_err(|e| StampError::media(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(StampError::media(format!(
            "ffprobe failed for '{}': {}",
            source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    parse_probe_json(source_path, &out.stdout)
}

/// Interpret `ffprobe -print_format json -show_streams -show_format` output.
pub fn parse_probe_json(source_path: &Path, json: &[u8]) -> StampResult<VideoSourceInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
        avg_frame_rate: Option<String>,
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        #[serde(default)]
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let parsed: ProbeOut = serde_json::from_slice(json)
        .map_err(|e| StampError::media(format!("ffprobe json parse failed: {e}")))?;
    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| {
            StampError::media(format!(
                "no video stream found in '{}'",
                source_path.display()
            ))
        })?;

    let width = video.width.unwrap_or(0);
    let height = video.height.unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(StampError::media(format!(
            "'{}' reports invalid video dimensions {width}x{height}",
            source_path.display()
        )));
    }

    // Decoding is passthrough, so the encoder must run at the average rate of the real frames.
    // `r_frame_rate` is only a fallback: it is the field rate for interlaced sources.
    let fps = [video.avg_frame_rate.as_deref(), video.r_frame_rate.as_deref()]
        .into_iter()
        .flatten()
        .find_map(|r| Fps::parse_ratio(r).ok())
        .ok_or_else(|| {
            StampError::media(format!(
                "'{}' has no usable video frame rate",
                source_path.display()
            ))
        })?;

    let duration_sec = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(video.duration.as_deref())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);
    let has_audio = parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(VideoSourceInfo {
        source_path: source_path.to_path_buf(),
        width,
        height,
        fps,
        duration_sec,
        has_audio,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/media/probe.rs"]
mod tests;

use std::{
    ffi::OsString,
    io::{Read, Write as _},
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
    thread::JoinHandle,
};

use image::RgbImage;

use crate::{
    config::StampConfig,
    foundation::{
        core::{Fps, FrameIndex},
        error::{StampError, StampResult},
    },
    media::decode::join_stderr,
};

/// Configuration provided to a [`FrameSink`] before the first frame.
#[derive(Clone, Debug, PartialEq)]
pub struct SinkConfig {
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
}

/// Consumer of stamped frames.
///
/// Ordering contract: `push_frame` is called in strictly increasing [`FrameIndex`] order,
/// between one `begin` and one `end`.
pub trait FrameSink {
    fn begin(&mut self, cfg: SinkConfig) -> StampResult<()>;
    fn push_frame(&mut self, idx: FrameIndex, frame: &RgbImage) -> StampResult<()>;
    fn end(&mut self) -> StampResult<()>;
}

/// Encoder parameters for one output file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodeSettings {
    pub video_codec: String,
    pub audio_codec: String,
    pub preset: String,
    pub threads: usize,
    /// File whose audio track (if any) is re-encoded into the output.
    pub audio_source: Option<PathBuf>,
}

impl EncodeSettings {
    pub fn from_config(cfg: &StampConfig, threads: usize, audio_source: Option<PathBuf>) -> Self {
        Self {
            video_codec: cfg.video_codec.clone(),
            audio_codec: cfg.audio_codec.clone(),
            preset: cfg.encoder_preset.clone(),
            threads: threads.max(1),
            audio_source,
        }
    }
}

/// Command-line arguments (after the program name) for encoding raw `rgb24` frames from stdin.
pub fn encoder_args(cfg: &SinkConfig, settings: &EncodeSettings, out_path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-y",
        "-loglevel",
        "error",
        "-nostdin",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgb24",
        "-s",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push(format!("{}x{}", cfg.width, cfg.height).into());
    // For rawvideo input, `-r` before `-i` sets the input frame rate.
    args.push("-r".into());
    args.push(cfg.fps.to_string().into());
    args.push("-i".into());
    args.push("pipe:0".into());

    if let Some(audio) = settings.audio_source.as_ref() {
        args.push("-i".into());
        args.push(audio.as_os_str().to_owned());
        for a in ["-map", "0:v:0", "-map", "1:a?", "-c:a"] {
            args.push(a.into());
        }
        args.push(settings.audio_codec.clone().into());
    } else {
        args.push("-an".into());
    }

    args.push("-c:v".into());
    args.push(settings.video_codec.clone().into());
    args.push("-preset".into());
    args.push(settings.preset.clone().into());
    args.push("-threads".into());
    args.push(settings.threads.to_string().into());
    // Output: yuv420p for broad player compatibility; explicit muxer since the temp path has
    // no `.mp4` extension.
    for a in ["-pix_fmt", "yuv420p", "-movflags", "+faststart", "-f", "mp4"] {
        args.push(a.into());
    }
    args.push(out_path.as_os_str().to_owned());
    args
}

/// Sink that spawns the system `ffmpeg` and streams raw frames to its stdin.
///
/// Dropping an unfinished sink kills the encoder; the caller owns cleanup of the partial file.
pub struct FfmpegSink {
    out_path: PathBuf,
    settings: EncodeSettings,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,

    cfg: Option<SinkConfig>,
    last_idx: Option<FrameIndex>,
    frames_written: u64,
}

impl FfmpegSink {
    pub fn new(out_path: impl Into<PathBuf>, settings: EncodeSettings) -> Self {
        Self {
            out_path: out_path.into(),
            settings,
            child: None,
            stdin: None,
            stderr_drain: None,
            cfg: None,
            last_idx: None,
            frames_written: 0,
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: SinkConfig) -> StampResult<()> {
        if cfg.width == 0 || cfg.height == 0 {
            return Err(StampError::validation(
                "encoder width/height must be non-zero",
            ));
        }
        if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
            return Err(StampError::validation(format!(
                "encoder width/height must be even for yuv420p output (got {}x{})",
                cfg.width, cfg.height
            )));
        }
        if self.child.is_some() {
            return Err(StampError::media("ffmpeg encoder already started"));
        }
        ensure_parent_dir(&self.out_path)?;

        let mut cmd = Command::new("ffmpeg");
        cmd.args(encoder_args(&cfg, &self.settings, &self.out_path))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        tracing::debug!(?cmd, "spawning ffmpeg encoder");

        let mut child = cmd.spawn().map_err(|e| {
            StampError::media(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| StampError::media("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| StampError::media("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.cfg = Some(cfg);
        self.last_idx = None;
        self.frames_written = 0;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &RgbImage) -> StampResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| StampError::media("ffmpeg encoder not started"))?;
        if let Some(last) = self.last_idx
            && idx <= last
        {
            return Err(StampError::media(
                "ffmpeg encoder received out-of-order frame index",
            ));
        }
        if frame.width() != cfg.width || frame.height() != cfg.height {
            return Err(StampError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width(),
                frame.height(),
                cfg.width,
                cfg.height
            )));
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(StampError::media("ffmpeg encoder is already finalized"));
        };
        if let Err(e) = stdin.write_all(frame.as_raw()) {
            // A broken pipe means ffmpeg died; its stderr carries the reason.
            drop(self.stdin.take());
            if let Some(mut child) = self.child.take() {
                let _ = child.wait();
            }
            let stderr = join_stderr(self.stderr_drain.take()).unwrap_or_default();
            return Err(StampError::media(format!(
                "failed to write frame to ffmpeg stdin: {e}: {}",
                String::from_utf8_lossy(&stderr).trim()
            )));
        }

        self.last_idx = Some(idx);
        self.frames_written += 1;
        Ok(())
    }

    fn end(&mut self) -> StampResult<()> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| StampError::media("ffmpeg encoder not started"))?;

        let status = child.wait().map_err(|e| {
            StampError::media(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        let stderr = join_stderr(self.stderr_drain.take())?;

        if !status.success() {
            return Err(StampError::media(format!(
                "ffmpeg exited with status {status}: {}",
                String::from_utf8_lossy(&stderr).trim()
            )));
        }

        self.cfg = None;
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(handle) = self.stderr_drain.take() {
            let _ = handle.join();
        }
    }
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<(FrameIndex, RgbImage)>,
    ended: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> Option<&SinkConfig> {
        self.cfg.as_ref()
    }

    pub fn frames(&self) -> &[(FrameIndex, RgbImage)] {
        &self.frames
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> StampResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        self.ended = false;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &RgbImage) -> StampResult<()> {
        if self.cfg.is_none() {
            return Err(StampError::media("in-memory sink not started"));
        }
        self.frames.push((idx, frame.clone()));
        Ok(())
    }

    fn end(&mut self) -> StampResult<()> {
        self.ended = true;
        Ok(())
    }
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> StampResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/media/encode.rs"]
mod tests;

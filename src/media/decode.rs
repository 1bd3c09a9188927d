use std::{
    collections::VecDeque,
    io::Read,
    process::{Child, ChildStdout, Command, Stdio},
    thread::JoinHandle,
};

use image::RgbImage;

use crate::{
    foundation::error::{StampError, StampResult},
    media::probe::VideoSourceInfo,
};

/// Pull-based producer of decoded frames in presentation order.
pub trait FrameSource {
    /// Next frame, or `None` once the stream is exhausted.
    fn next_frame(&mut self) -> StampResult<Option<RgbImage>>;
}

/// Decodes a clip's first video stream to `rgb24` through a streaming `ffmpeg` child.
///
/// Every decoded frame is emitted once (`-fps_mode passthrough`), so the frame count matches
/// the source. Dropping the source before [`FfmpegSource::finish`] kills the child.
pub struct FfmpegSource {
    width: u32,
    height: u32,
    frame_len: usize,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    stderr_drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    source_label: String,
}

impl FfmpegSource {
    pub fn open(info: &VideoSourceInfo) -> StampResult<Self> {
        if info.frame_len() == 0 {
            return Err(StampError::media(
                "decoded video frame size is zero (invalid source dimensions)",
            ));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-v", "error", "-nostdin", "-i"])
            .arg(&info.source_path)
            .args([
                "-map",
                "0:v:0",
                "-fps_mode",
                "passthrough",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        tracing::debug!(?cmd, "spawning ffmpeg decoder");

        let mut child = cmd.spawn().map_err(|e| {
            StampError::media(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| StampError::media("failed to open ffmpeg stdout (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| StampError::media("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        Ok(Self {
            width: info.width,
            height: info.height,
            frame_len: info.frame_len(),
            child: Some(child),
            stdout: Some(stdout),
            stderr_drain: Some(stderr_drain),
            source_label: info.source_path.display().to_string(),
        })
    }

    /// Wait for the decoder to exit and surface its stderr on failure.
    pub fn finish(mut self) -> StampResult<()> {
        drop(self.stdout.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| StampError::media("ffmpeg decoder already finished"))?;
        let status = child.wait().map_err(|e| {
            StampError::media(format!("failed to wait for ffmpeg decoder: {e}"))
        })?;
        let stderr = join_stderr(self.stderr_drain.take())?;
        if !status.success() {
            return Err(StampError::media(format!(
                "ffmpeg decode of '{}' exited with status {status}: {}",
                self.source_label,
                String::from_utf8_lossy(&stderr).trim()
            )));
        }
        Ok(())
    }
}

impl FrameSource for FfmpegSource {
    fn next_frame(&mut self) -> StampResult<Option<RgbImage>> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let mut buf = vec![0u8; self.frame_len];
        let mut filled = 0usize;
        while filled < buf.len() {
            match stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(StampError::media(format!(
                        "failed to read decoded frame from ffmpeg: {e}"
                    )));
                }
            }
        }

        if filled == 0 {
            self.stdout = None;
            return Ok(None);
        }
        if filled < buf.len() {
            return Err(StampError::media(format!(
                "truncated frame from ffmpeg decoder: got {filled} of {} bytes",
                buf.len()
            )));
        }

        RgbImage::from_raw(self.width, self.height, buf)
            .map(Some)
            .ok_or_else(|| StampError::media("decoded frame buffer has the wrong size"))
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        drop(self.stdout.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(handle) = self.stderr_drain.take() {
            let _ = handle.join();
        }
    }
}

pub(crate) fn join_stderr(
    handle: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
) -> StampResult<Vec<u8>> {
    match handle {
        Some(handle) => Ok(handle
            .join()
            .map_err(|_| StampError::media("ffmpeg stderr drain thread panicked"))?
            .map_err(|e| StampError::media(format!("ffmpeg stderr read failed: {e}")))?),
        None => Ok(Vec::new()),
    }
}

/// Decode the single frame displayed at `time_sec`.
pub fn decode_frame_at(info: &VideoSourceInfo, time_sec: f64) -> StampResult<RgbImage> {
    if !time_sec.is_finite() || time_sec < 0.0 {
        return Err(StampError::validation(format!(
            "seek time must be a finite, non-negative number of seconds (got {time_sec})"
        )));
    }

    let out = Command::new("ffmpeg")
        .args(["-v", "error", "-nostdin", "-ss", &format!("{time_sec:.6}")])
        .arg("-i")
        .arg(&info.source_path)
        .args([
            "-frames:v",
            "1",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "pipe:1",
        ])
        .output()
        .map_err(|e| StampError::media(format!("failed to run ffmpeg for frame decode: {e}")))?;

    if !out.status.success() {
        return Err(StampError::media(format!(
            "ffmpeg frame decode failed for '{}': {}",
            info.source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let expected = info.frame_len();
    if out.stdout.len() < expected {
        return Err(StampError::media(format!(
            "no frame at {time_sec}s in '{}' (got {} bytes, expected {expected})",
            info.source_path.display(),
            out.stdout.len()
        )));
    }

    let mut data = out.stdout;
    data.truncate(expected);
    RgbImage::from_raw(info.width, info.height, data)
        .ok_or_else(|| StampError::media("decoded frame buffer has the wrong size"))
}

/// Frames held in memory, for tests and previews.
#[derive(Debug, Default)]
pub struct InMemorySource {
    frames: VecDeque<RgbImage>,
}

impl InMemorySource {
    pub fn new(frames: impl IntoIterator<Item = RgbImage>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for InMemorySource {
    fn next_frame(&mut self) -> StampResult<Option<RgbImage>> {
        Ok(self.frames.pop_front())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/decode.rs"]
mod tests;

//! One unit of batch work: a video, its sidecar, and where the stamped copy goes.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Context as _;

use crate::{
    config::StampConfig,
    foundation::{
        core::{Fps, FrameIndex},
        error::{StampError, StampResult},
    },
    media::{
        decode::{FfmpegSource, FrameSource},
        encode::{EncodeSettings, FfmpegSink, FrameSink, SinkConfig, ensure_parent_dir},
        probe::probe_video,
    },
    metadata::parse_metadata_file,
    overlay::{
        stamp::{FrameTransform, Stamper},
        text::FontHandle,
    },
};

/// Input/output triple for one stamping run.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Job {
    pub video_path: PathBuf,
    pub metadata_path: PathBuf,
    pub output_path: PathBuf,
}

/// What a successful job produced.
#[derive(Clone, Debug, PartialEq)]
pub struct JobReport {
    pub job: Job,
    pub frames: u64,
    pub fps: Fps,
    pub elapsed: Duration,
}

impl JobReport {
    /// Duration of the encoded stream implied by its frame count.
    pub fn duration_sec(&self) -> f64 {
        self.frames as f64 * self.fps.frame_interval_sec()
    }
}

/// Terminal state of one discovered video.
#[derive(Clone, Debug, PartialEq)]
pub enum JobOutcome {
    Success(JobReport),
    SkippedNoMetadata {
        video_path: PathBuf,
        expected_metadata: PathBuf,
    },
    Failed {
        job: Job,
        reason: String,
    },
}

impl JobOutcome {
    pub fn video_path(&self) -> &Path {
        match self {
            JobOutcome::Success(report) => &report.job.video_path,
            JobOutcome::SkippedNoMetadata { video_path, .. } => video_path,
            JobOutcome::Failed { job, .. } => &job.video_path,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, JobOutcome::Failed { .. })
    }
}

/// Pull every frame from `source`, apply `transform` at its presentation time, and push it to
/// `sink`. Returns the number of frames written; it always equals the number decoded.
pub fn stamp_frames(
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    transform: &dyn FrameTransform,
    cfg: SinkConfig,
) -> StampResult<u64> {
    let fps = cfg.fps;
    let (width, height) = (cfg.width, cfg.height);
    sink.begin(cfg)?;

    let mut idx = FrameIndex(0);
    while let Some(mut frame) = source.next_frame()? {
        if frame.width() != width || frame.height() != height {
            return Err(StampError::media(format!(
                "decoded frame {} is {}x{}, expected {width}x{height}",
                idx.0,
                frame.width(),
                frame.height()
            )));
        }
        transform.apply(&mut frame, fps.frame_time_sec(idx))?;
        sink.push_frame(idx, &frame)?;
        idx = FrameIndex(idx.0 + 1);
    }

    sink.end()?;
    Ok(idx.0)
}

/// Hidden sibling of `output` that the encoder writes into before the final rename.
pub fn temp_output_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output.with_file_name(format!(".{name}.partial"))
}

/// Stamp one video: parse the sidecar, decode, overlay, encode to a temp file, then rename it
/// over `job.output_path`. On failure no file is left at either path.
#[tracing::instrument(skip_all, fields(video = %job.video_path.display()))]
pub fn stamp_video(
    job: &Job,
    cfg: &StampConfig,
    font: Arc<FontHandle>,
    encoder_threads: usize,
) -> StampResult<JobReport> {
    let started = Instant::now();

    let creation = parse_metadata_file(&job.metadata_path)?;
    let info = probe_video(&job.video_path)?;
    tracing::info!(
        creation = %creation,
        width = info.width,
        height = info.height,
        fps = %info.fps,
        duration_sec = info.duration_sec,
        "stamping"
    );

    ensure_parent_dir(&job.output_path)?;
    let tmp_path = temp_output_path(&job.output_path);
    let mut tmp_guard = TempFileGuard(Some(tmp_path.clone()));

    let stamper = Stamper::new(creation, font, cfg);
    let settings = EncodeSettings::from_config(
        cfg,
        encoder_threads,
        info.has_audio.then(|| job.video_path.clone()),
    );

    let mut source = FfmpegSource::open(&info)?;
    let mut sink = FfmpegSink::new(&tmp_path, settings);
    let frames = stamp_frames(
        &mut source,
        &mut sink,
        &stamper,
        SinkConfig {
            width: info.width,
            height: info.height,
            fps: info.fps,
        },
    )?;
    source.finish()?;

    if frames == 0 {
        return Err(StampError::media(format!(
            "'{}' decoded to zero frames",
            job.video_path.display()
        )));
    }

    std::fs::rename(&tmp_path, &job.output_path).with_context(|| {
        format!(
            "move '{}' into place at '{}'",
            tmp_path.display(),
            job.output_path.display()
        )
    })?;
    tmp_guard.disarm();

    let report = JobReport {
        job: job.clone(),
        frames,
        fps: info.fps,
        elapsed: started.elapsed(),
    };
    tracing::info!(
        frames,
        output = %job.output_path.display(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "stamped"
    );
    Ok(report)
}

/// Removes the wrapped path on drop unless disarmed.
struct TempFileGuard(Option<PathBuf>);

impl TempFileGuard {
    fn disarm(&mut self) {
        self.0 = None;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/job.rs"]
mod tests;

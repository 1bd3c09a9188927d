use std::{
    fmt,
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};

use rayon::prelude::*;

use crate::{
    config::{ResourceBudget, StampConfig, available_cores},
    foundation::error::{StampError, StampResult},
    job::{Job, JobOutcome, JobReport, stamp_video},
    media::probe::ensure_ffmpeg_tools,
    overlay::text::FontHandle,
    progress::{BatchProgress, ProgressMode},
};

use super::discover::discover_jobs;

/// Aggregate of one batch run.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Skips first, then executed jobs in discovery order.
    pub outcomes: Vec<JobOutcome>,
    pub elapsed: Duration,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: Vec<JobOutcome>, elapsed: Duration) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        let failed = outcomes.iter().filter(|o| o.is_failed()).count();
        Self {
            succeeded,
            skipped: outcomes.len() - succeeded - failed,
            failed,
            outcomes,
            elapsed,
        }
    }

    /// Process exit status: 0 when nothing failed, 1 otherwise. Skips are not failures.
    pub fn exit_code(&self) -> u8 {
        u8::from(self.failed > 0)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.outcomes.iter().filter_map(|o| match o {
            JobOutcome::Failed { job, reason } => Some((job.video_path.as_path(), reason.as_str())),
            _ => None,
        })
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} stamped, {} skipped (no metadata), {} failed in {:.1}s",
            self.succeeded,
            self.skipped,
            self.failed,
            self.elapsed.as_secs_f64()
        )?;
        for (video, reason) in self.failures() {
            write!(f, "\n  failed: {}: {reason}", video.display())?;
        }
        Ok(())
    }
}

/// Run every job through `run_one`, `workers` at a time.
///
/// Errors never escape: each one is logged and recorded as [`JobOutcome::Failed`], and the
/// remaining jobs carry on. Outcomes come back in the order of `jobs`.
pub fn execute_jobs<F>(
    jobs: &[Job],
    workers: usize,
    progress: &BatchProgress,
    run_one: F,
) -> StampResult<Vec<JobOutcome>>
where
    F: Fn(&Job) -> StampResult<JobReport> + Sync,
{
    let run = |job: &Job| {
        let outcome = match run_one(job) {
            Ok(report) => JobOutcome::Success(report),
            Err(err) => {
                tracing::error!(video = %job.video_path.display(), error = %err, "job failed");
                JobOutcome::Failed {
                    job: job.clone(),
                    reason: err.to_string(),
                }
            }
        };
        progress.job_finished(&outcome);
        outcome
    };

    if workers <= 1 || jobs.len() <= 1 {
        return Ok(jobs.iter().map(run).collect());
    }

    let pool = build_thread_pool(workers.min(jobs.len()))?;
    Ok(pool.install(|| jobs.par_iter().map(run).collect()))
}

/// Discover, then stamp, everything under `input_root` into `output_root`.
pub fn run_batch(
    input_root: &Path,
    output_root: &Path,
    cfg: &StampConfig,
    progress_mode: ProgressMode,
) -> StampResult<BatchSummary> {
    let started = Instant::now();
    cfg.validate()?;
    let budget = ResourceBudget::resolve(cfg, available_cores())?;

    let discovery = discover_jobs(input_root, output_root, cfg)?;
    tracing::info!(
        jobs = discovery.jobs.len(),
        skipped = discovery.skipped.len(),
        workers = budget.workers,
        encoder_threads = budget.encoder_threads,
        "batch discovered"
    );

    let progress = BatchProgress::new(discovery.total(), progress_mode);
    for skip in &discovery.skipped {
        progress.job_finished(skip);
    }

    let mut outcomes = discovery.skipped;
    if !discovery.jobs.is_empty() {
        ensure_ffmpeg_tools()?;
        let font = Arc::new(FontHandle::load(Path::new(&cfg.font_path), cfg.font_size)?);
        tracing::info!(font = %font.source(), size = font.size(), "font loaded");

        let executed = execute_jobs(&discovery.jobs, budget.workers, &progress, |job| {
            stamp_video(job, cfg, Arc::clone(&font), budget.encoder_threads)
        })?;
        outcomes.extend(executed);
    }
    progress.finish();

    Ok(BatchSummary::from_outcomes(outcomes, started.elapsed()))
}

fn build_thread_pool(threads: usize) -> StampResult<rayon::ThreadPool> {
    if threads == 0 {
        return Err(StampError::validation("worker count must be >= 1"));
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("vidstamp-worker-{i}"))
        .build()
        .map_err(|e| StampError::validation(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/batch/run.rs"]
mod tests;

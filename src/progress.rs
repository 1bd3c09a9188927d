//! Batch progress reporting. Every method takes `&self` so workers can report completions
//! concurrently.

use std::{
    io::{IsTerminal, Write},
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::fmt::MakeWriter;

use crate::job::JobOutcome;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lower")]
pub enum ProgressMode {
    /// Bar on a terminal, log lines otherwise.
    #[default]
    Auto,
    Rich,
    Plain,
    Quiet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedProgressMode {
    Rich,
    Plain,
    Quiet,
}

impl ProgressMode {
    pub fn resolve(self, stderr_is_tty: bool) -> ResolvedProgressMode {
        match self {
            ProgressMode::Auto if stderr_is_tty => ResolvedProgressMode::Rich,
            ProgressMode::Auto => ResolvedProgressMode::Plain,
            ProgressMode::Rich => ResolvedProgressMode::Rich,
            ProgressMode::Plain => ResolvedProgressMode::Plain,
            ProgressMode::Quiet => ResolvedProgressMode::Quiet,
        }
    }
}

/// Counts finished jobs against a known total.
pub struct BatchProgress {
    total: u64,
    done: AtomicU64,
    failed: AtomicU64,
    mode: ResolvedProgressMode,
    bar: Option<ProgressBar>,
}

impl BatchProgress {
    pub fn new(total: usize, mode: ProgressMode) -> Self {
        Self::with_resolved(total, mode.resolve(std::io::stderr().is_terminal()))
    }

    pub fn with_resolved(total: usize, mode: ResolvedProgressMode) -> Self {
        let total = total as u64;
        let bar = (mode == ResolvedProgressMode::Rich).then(|| {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{elapsed_precise}] {wide_bar:.cyan/blue} {pos}/{len} ETA {eta} | {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar.enable_steady_tick(Duration::from_millis(120));
            *ACTIVE_BAR.lock().unwrap_or_else(PoisonError::into_inner) = Some(bar.clone());
            bar
        });
        Self {
            total,
            done: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            mode,
            bar,
        }
    }

    pub fn mode(&self) -> ResolvedProgressMode {
        self.mode
    }

    /// Jobs reported so far.
    pub fn completed(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn job_finished(&self, outcome: &JobOutcome) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if outcome.is_failed() {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        let name = outcome
            .video_path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match self.mode {
            ResolvedProgressMode::Rich => {
                if let Some(bar) = &self.bar {
                    bar.inc(1);
                    bar.set_message(name);
                }
            }
            ResolvedProgressMode::Plain => {
                tracing::info!(
                    done,
                    total = self.total,
                    video = %name,
                    ok = !outcome.is_failed(),
                    "job finished"
                );
            }
            ResolvedProgressMode::Quiet => {}
        }
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_with_message(format!(
                "{} done, {} failed",
                self.completed(),
                self.failed()
            ));
        }
        self.release();
    }

    fn release(&self) {
        if self.bar.is_some() {
            ACTIVE_BAR
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
        }
    }
}

impl Drop for BatchProgress {
    fn drop(&mut self) {
        self.release();
    }
}

/// Bar currently drawn on stderr, if any. Log lines are printed above it.
static ACTIVE_BAR: Mutex<Option<ProgressBar>> = Mutex::new(None);

fn active_bar() -> Option<ProgressBar> {
    ACTIVE_BAR
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// `tracing-subscriber` writer for stderr that suspends a live progress bar while a log line
/// is printed, so the two never interleave.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogWriter;

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogLine;

    fn make_writer(&'a self) -> Self::Writer {
        LogLine(Vec::new())
    }
}

/// One buffered log event; emitted on drop.
pub struct LogLine(Vec<u8>);

impl Write for LogLine {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Drop for LogLine {
    fn drop(&mut self) {
        if self.0.is_empty() {
            return;
        }
        let line = std::mem::take(&mut self.0);
        let emit = || {
            let _ = std::io::stderr().lock().write_all(&line);
        };
        match active_bar() {
            Some(bar) => bar.suspend(emit),
            None => emit(),
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/progress.rs"]
mod tests;

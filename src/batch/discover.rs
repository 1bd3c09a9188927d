use std::path::{Path, PathBuf};

use anyhow::Context as _;
use walkdir::WalkDir;

use crate::{
    config::StampConfig,
    foundation::error::{StampError, StampResult},
    job::{Job, JobOutcome},
};

/// Result of walking an input tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Discovery {
    /// Videos with a sidecar, in traversal order.
    pub jobs: Vec<Job>,
    /// Videos whose sidecar is missing; always [`JobOutcome::SkippedNoMetadata`].
    pub skipped: Vec<JobOutcome>,
}

impl Discovery {
    pub fn total(&self) -> usize {
        self.jobs.len() + self.skipped.len()
    }
}

/// Walk `input_root` recursively and pair every video with its metadata sidecar.
///
/// Entries are visited sorted by file name so repeated runs produce the same job order.
/// Anything under `output_root` is ignored, which keeps a nested output tree from being
/// stamped again on the next run.
pub fn discover_jobs(
    input_root: &Path,
    output_root: &Path,
    cfg: &StampConfig,
) -> StampResult<Discovery> {
    if !input_root.is_dir() {
        return Err(StampError::validation(format!(
            "input directory '{}' does not exist or is not a directory",
            input_root.display()
        )));
    }
    let input_root = input_root
        .canonicalize()
        .with_context(|| format!("resolve input directory '{}'", input_root.display()))?;
    // Only an output tree strictly inside the input tree is skipped; an output root that
    // equals or contains the input root must not hide the inputs.
    let excluded = output_root
        .canonicalize()
        .ok()
        .filter(|ex| *ex != input_root && ex.starts_with(&input_root));

    let mut out = Discovery::default();
    let walker = WalkDir::new(&input_root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| excluded.as_deref().is_none_or(|ex| !e.path().starts_with(ex)));

    for entry in walker {
        let entry = entry.with_context(|| format!("walk '{}'", input_root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let is_video = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| cfg.is_video_extension(e));
        if !is_video {
            continue;
        }

        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        let dir = path.parent().unwrap_or(&input_root);
        let metadata_path = dir.join(format!("{stem}{}", cfg.metadata_suffix));

        if !metadata_path.is_file() {
            tracing::warn!(
                video = %path.display(),
                expected = %metadata_path.display(),
                "metadata sidecar not found, skipping"
            );
            out.skipped.push(JobOutcome::SkippedNoMetadata {
                video_path: path.to_path_buf(),
                expected_metadata: metadata_path,
            });
            continue;
        }

        let rel_dir = dir.strip_prefix(&input_root).unwrap_or(Path::new(""));
        out.jobs.push(Job {
            video_path: path.to_path_buf(),
            metadata_path,
            output_path: output_path_for(output_root, rel_dir, &stem, cfg),
        });
    }

    tracing::debug!(
        jobs = out.jobs.len(),
        skipped = out.skipped.len(),
        root = %input_root.display(),
        "discovery finished"
    );
    Ok(out)
}

/// `output_root/<rel_dir>/<stem><output_suffix>.<output_extension>`.
pub fn output_path_for(output_root: &Path, rel_dir: &Path, stem: &str, cfg: &StampConfig) -> PathBuf {
    let ext = cfg.output_extension.trim_start_matches('.');
    output_root
        .join(rel_dir)
        .join(format!("{stem}{}.{ext}", cfg.output_suffix))
}

#[cfg(test)]
#[path = "../../tests/unit/batch/discover.rs"]
mod tests;

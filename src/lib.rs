#![forbid(unsafe_code)]

pub mod batch;
pub mod config;
pub mod foundation;
pub mod job;
pub mod media;
pub mod metadata;
pub mod overlay;
pub mod progress;

pub use batch::{BatchSummary, Discovery, discover_jobs, execute_jobs, run_batch};
pub use config::{ResourceBudget, StampConfig};
pub use foundation::core::{Fps, FrameIndex};
pub use foundation::error::{StampError, StampResult};
pub use job::{Job, JobOutcome, JobReport, stamp_frames, stamp_video};
pub use media::probe::{VideoSourceInfo, probe_video};
pub use metadata::{CreationTime, parse_creation_time_str, parse_metadata_file};
pub use overlay::stamp::{FrameTransform, Stamper, format_overlay_text};
pub use overlay::text::FontHandle;
pub use progress::ProgressMode;

//! Directory-tree batch driver: discover video/sidecar pairs, then stamp them on a worker pool.

pub mod discover;
pub mod run;

pub use discover::{Discovery, discover_jobs};
pub use run::{BatchSummary, execute_jobs, run_batch};

//! Per-frame timestamp overlay: font handling and the frame transform.

pub mod stamp;
pub mod text;

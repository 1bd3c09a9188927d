//! `ffmpeg`/`ffprobe` process plumbing.
//!
//! We drive the system binaries rather than linking FFmpeg, so the crate builds without native
//! FFmpeg headers. Every child process is owned by a guard that kills and reaps it when the
//! owner is dropped early.

pub mod decode;
pub mod encode;
pub mod probe;

use std::sync::Arc;

use image::{Rgb, RgbImage};

use crate::{
    config::StampConfig,
    foundation::error::{StampError, StampResult},
    metadata::CreationTime,
    overlay::text::FontHandle,
};

/// Per-frame transform invoked with the frame's presentation time `t` in seconds.
///
/// Implementations must be pure in `(frame, t)`: the pipeline may call them from any thread
/// and in any order.
pub trait FrameTransform: Send + Sync {
    fn apply(&self, frame: &mut RgbImage, t: f64) -> StampResult<()>;
}

impl<F> FrameTransform for F
where
    F: Fn(&mut RgbImage, f64) -> StampResult<()> + Send + Sync,
{
    fn apply(&self, frame: &mut RgbImage, t: f64) -> StampResult<()> {
        self(frame, t)
    }
}

/// Overlay text for presentation time `t`: `creation + t`, formatted with `format`.
///
/// Sub-second precision is kept in the arithmetic and dropped by the format, so frames within
/// the same wall-clock second share a string.
pub fn format_overlay_text(creation: &CreationTime, t: f64, format: &str) -> StampResult<String> {
    use std::fmt::Write as _;

    let at = creation.after_secs(t)?;
    let mut out = String::new();
    write!(out, "{}", at.format(format))
        .map_err(|_| StampError::validation(format!("invalid timestamp format '{format}'")))?;
    Ok(out)
}

/// Top-left draw position that insets a `text_w x text_h` box by `margin` from the bottom-right
/// corner of a `frame_w x frame_h` frame. Negative when the frame is too small.
pub fn bottom_right_origin(
    frame_w: u32,
    frame_h: u32,
    text_w: u32,
    text_h: u32,
    margin: u32,
) -> (i64, i64) {
    (
        i64::from(frame_w) - i64::from(text_w) - i64::from(margin),
        i64::from(frame_h) - i64::from(text_h) - i64::from(margin),
    )
}

/// Burns a running timestamp into the bottom-right corner of each frame.
#[derive(Clone, Debug)]
pub struct Stamper {
    creation: CreationTime,
    font: Arc<FontHandle>,
    margin: u32,
    color: Rgb<u8>,
    format: String,
}

impl Stamper {
    pub fn new(creation: CreationTime, font: Arc<FontHandle>, cfg: &StampConfig) -> Self {
        Self {
            creation,
            font,
            margin: cfg.margin,
            color: Rgb(cfg.text_color),
            format: cfg.timestamp_format.clone(),
        }
    }

    pub fn creation(&self) -> &CreationTime {
        &self.creation
    }

    pub fn text_at(&self, t: f64) -> StampResult<String> {
        format_overlay_text(&self.creation, t, &self.format)
    }
}

impl FrameTransform for Stamper {
    fn apply(&self, frame: &mut RgbImage, t: f64) -> StampResult<()> {
        let text = self.text_at(t)?;
        let bounds = self.font.measure(&text);
        let (x, y) = bottom_right_origin(
            frame.width(),
            frame.height(),
            bounds.width,
            bounds.height,
            self.margin,
        );
        self.font.draw(frame, &text, x, y, self.color);
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/overlay/stamp.rs"]
mod tests;

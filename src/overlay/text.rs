use std::path::{Path, PathBuf};

use ab_glyph::{Font as _, FontVec, GlyphId, OutlinedGlyph, PxScale, ScaleFont as _, point};
use anyhow::Context as _;
use image::{Rgb, RgbImage};
use usvg::fontdb;

use crate::foundation::error::{StampError, StampResult};

/// Last-resort face (DejaVu Sans Mono Bold, see `assets/fonts/DejaVu-LICENSE`).
const BUNDLED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSansMono-Bold.ttf");
const BUNDLED_FONT_NAME: &str = "DejaVuSansMono-Bold.ttf";

/// Where a [`FontHandle`]'s face data came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FontSource {
    /// The configured font file.
    File(PathBuf),
    /// A system face whose file name matched the configured one.
    System { family: String, path: Option<PathBuf> },
    /// The font compiled into the binary.
    Bundled,
}

impl std::fmt::Display for FontSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FontSource::File(p) => write!(f, "{}", p.display()),
            FontSource::System {
                family,
                path: Some(p),
            } => write!(f, "{family} ({})", p.display()),
            FontSource::System { family, path: None } => write!(f, "{family}"),
            FontSource::Bundled => write!(f, "bundled {BUNDLED_FONT_NAME}"),
        }
    }
}

/// Pixel bounding box of rendered text, relative to the layout origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct TextBounds {
    pub min_x: i32,
    pub min_y: i32,
    pub width: u32,
    pub height: u32,
}

impl TextBounds {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Immutable font + size pair able to measure and draw single-line text.
///
/// Safe to share across worker threads; nothing is cached or mutated after load.
pub struct FontHandle {
    font: FontVec,
    scale: PxScale,
    size: f32,
    source: FontSource,
}

impl std::fmt::Debug for FontHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontHandle")
            .field("size", &self.size)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl FontHandle {
    /// Load `path` at `size` pixels per em.
    ///
    /// Resolution order: the file itself, then a system face with that file name, then the
    /// bundled DejaVu Sans Mono Bold, which also replaces an unreadable file. Only a bad size is
    /// an error.
    pub fn load(path: &Path, size: f32) -> StampResult<Self> {
        if !size.is_finite() || size <= 0.0 {
            return Err(StampError::validation("font size must be a positive number"));
        }

        if path.is_file() {
            let loaded = std::fs::read(path)
                .with_context(|| format!("read font '{}'", path.display()))
                .map_err(StampError::from)
                .and_then(|bytes| {
                    Self::from_bytes(bytes, 0, size, FontSource::File(path.to_path_buf()))
                });
            match loaded {
                Ok(handle) => return Ok(handle),
                Err(err) => {
                    tracing::warn!(
                        requested = %path.display(),
                        error = %err,
                        "font unusable; falling back to the bundled font"
                    );
                    return Self::bundled(size);
                }
            }
        }

        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        tracing::debug!(faces = db.len(), "loaded system font database");

        if let Some(id) = find_face_by_file_name(&db, path) {
            return Self::from_db(&db, id, size);
        }

        let requested_bundled = path
            .file_name()
            .is_some_and(|n| n.eq_ignore_ascii_case(BUNDLED_FONT_NAME));
        if requested_bundled {
            tracing::debug!("using bundled {BUNDLED_FONT_NAME}");
        } else {
            tracing::warn!(
                requested = %path.display(),
                using = BUNDLED_FONT_NAME,
                "font not found; falling back to the bundled font"
            );
        }
        Self::bundled(size)
    }

    /// The font compiled into the binary.
    pub fn bundled(size: f32) -> StampResult<Self> {
        Self::from_bytes(BUNDLED_FONT.to_vec(), 0, size, FontSource::Bundled)
    }

    /// Build a handle from raw TrueType/OpenType bytes.
    pub fn from_bytes(bytes: Vec<u8>, index: u32, size: f32, source: FontSource) -> StampResult<Self> {
        let font = FontVec::try_from_vec_and_index(bytes, index)
            .map_err(|e| StampError::font(format!("invalid font data in {source}: {e}")))?;

        // ab_glyph scales by ascent-descent height; convert so the em box is `size` pixels.
        let scale = match font.units_per_em() {
            Some(upem) if upem > 0.0 => PxScale::from(size * font.height_unscaled() / upem),
            _ => PxScale::from(size),
        };

        Ok(Self {
            font,
            scale,
            size,
            source,
        })
    }

    fn from_db(db: &fontdb::Database, id: fontdb::ID, size: f32) -> StampResult<Self> {
        let face = db
            .face(id)
            .ok_or_else(|| StampError::font("font face vanished from database"))?;
        let source = FontSource::System {
            family: face
                .families
                .first()
                .map(|(name, _)| name.clone())
                .unwrap_or_else(|| face.post_script_name.clone()),
            path: face_path(&face.source),
        };
        let (bytes, index) = db
            .with_face_data(id, |data, index| (data.to_vec(), index))
            .ok_or_else(|| StampError::font(format!("failed to read font data for {source}")))?;
        Self::from_bytes(bytes, index, size, source)
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn source(&self) -> &FontSource {
        &self.source
    }

    /// Exact pixel box covered by `text`'s glyph outlines.
    pub fn measure(&self, text: &str) -> TextBounds {
        let mut bounds: Option<(f32, f32, f32, f32)> = None;
        self.layout(text, |glyph| {
            let bb = glyph.px_bounds();
            bounds = Some(match bounds {
                None => (bb.min.x, bb.min.y, bb.max.x, bb.max.y),
                Some((x0, y0, x1, y1)) => (
                    x0.min(bb.min.x),
                    y0.min(bb.min.y),
                    x1.max(bb.max.x),
                    y1.max(bb.max.y),
                ),
            });
        });

        match bounds {
            None => TextBounds::default(),
            Some((x0, y0, x1, y1)) => {
                let min_x = x0.floor() as i32;
                let min_y = y0.floor() as i32;
                TextBounds {
                    min_x,
                    min_y,
                    width: (x1.ceil() as i32 - min_x).max(0) as u32,
                    height: (y1.ceil() as i32 - min_y).max(0) as u32,
                }
            }
        }
    }

    /// Draw `text` so the top-left corner of its measured box lands on `(x, y)`.
    ///
    /// Coverage is blended over the existing pixels; anything outside the frame is clipped.
    pub fn draw(&self, frame: &mut RgbImage, text: &str, x: i64, y: i64, color: Rgb<u8>) {
        let bounds = self.measure(text);
        if bounds.is_empty() {
            return;
        }
        let origin_x = x - i64::from(bounds.min_x);
        let origin_y = y - i64::from(bounds.min_y);
        let (fw, fh) = (i64::from(frame.width()), i64::from(frame.height()));

        self.layout(text, |glyph| {
            let bb = glyph.px_bounds();
            let gx = origin_x + bb.min.x as i64;
            let gy = origin_y + bb.min.y as i64;
            glyph.draw(|px, py, coverage| {
                let fx = gx + i64::from(px);
                let fy = gy + i64::from(py);
                if fx < 0 || fy < 0 || fx >= fw || fy >= fh {
                    return;
                }
                let coverage = coverage.clamp(0.0, 1.0);
                if coverage <= 0.0 {
                    return;
                }
                let dst = frame.get_pixel_mut(fx as u32, fy as u32);
                for (d, s) in dst.0.iter_mut().zip(color.0) {
                    let blended = f32::from(s) * coverage + f32::from(*d) * (1.0 - coverage);
                    *d = blended.round().clamp(0.0, 255.0) as u8;
                }
            });
        });
    }

    /// Lay `text` out on one line with the baseline at the font ascent, visiting each glyph
    /// that has an outline.
    fn layout(&self, text: &str, mut visit: impl FnMut(&OutlinedGlyph)) {
        let scaled = self.font.as_scaled(self.scale);
        let mut caret = 0.0f32;
        let mut prev: Option<GlyphId> = None;

        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(p) = prev {
                caret += scaled.kern(p, id);
            }
            let glyph = id.with_scale_and_position(self.scale, point(caret, scaled.ascent()));
            caret += scaled.h_advance(id);
            prev = Some(id);

            if let Some(outlined) = self.font.outline_glyph(glyph) {
                visit(&outlined);
            }
        }
    }
}

fn find_face_by_file_name(db: &fontdb::Database, path: &Path) -> Option<fontdb::ID> {
    let wanted = path.file_name()?.to_str()?;
    db.faces()
        .find(|face| {
            face_path(&face.source)
                .as_deref()
                .and_then(Path::file_name)
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.eq_ignore_ascii_case(wanted))
        })
        .map(|face| face.id)
}

fn face_path(source: &fontdb::Source) -> Option<PathBuf> {
    match source {
        fontdb::Source::File(p) => Some(p.clone()),
        fontdb::Source::SharedFile(p, _) => Some(p.clone()),
        fontdb::Source::Binary(_) => None,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/overlay/text.rs"]
mod tests;

//! XML sidecar parsing.
//!
//! Professional-disc cameras write a `<base>M01.XML` file next to each clip. The only value we
//! need from it is the `value` attribute of the `CreationDate` element in the
//! `nonRealTimeMeta` namespace:
//!
//! ```xml
//! <NonRealTimeMeta xmlns="urn:schemas-professionalDisc:nonRealTimeMeta:ver.2.00">
//!   <CreationDate value="2024-03-01T10:00:00+09:00"/>
//! </NonRealTimeMeta>
//! ```

use std::path::Path;

use anyhow::Context as _;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeDelta};

use crate::foundation::error::{StampError, StampResult};

/// Namespace of the `CreationDate` element.
pub const NRT_META_NAMESPACE: &str = "urn:schemas-professionalDisc:nonRealTimeMeta:ver.2.00";
/// Local name of the element carrying the creation timestamp.
pub const CREATION_DATE_ELEMENT: &str = "CreationDate";
/// Attribute holding the ISO-8601 timestamp.
pub const CREATION_DATE_ATTRIBUTE: &str = "value";

/// Absolute recording start time of one clip.
///
/// `wall` is the clock time exactly as written in the sidecar; `offset` is the UTC offset that
/// accompanied it, if any. Overlay arithmetic runs on the wall clock, so the burned-in text
/// shows the camera's local time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CreationTime {
    pub wall: NaiveDateTime,
    pub offset: Option<FixedOffset>,
}

impl CreationTime {
    /// Wall-clock time `t` seconds after the creation time.
    ///
    /// `t` is rounded to whole microseconds.
    pub fn after_secs(&self, t: f64) -> StampResult<NaiveDateTime> {
        if !t.is_finite() || t < 0.0 {
            return Err(StampError::validation(format!(
                "presentation time must be a finite, non-negative number of seconds (got {t})"
            )));
        }
        let micros = (t * 1_000_000.0).round();
        if micros > i64::MAX as f64 {
            return Err(StampError::validation(format!(
                "presentation time {t}s is out of range"
            )));
        }
        self.wall
            .checked_add_signed(TimeDelta::microseconds(micros as i64))
            .ok_or_else(|| StampError::validation(format!("creation time + {t}s overflows")))
    }
}

impl std::fmt::Display for CreationTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.offset {
            Some(offset) => write!(f, "{}{}", self.wall.format("%Y-%m-%dT%H:%M:%S%.f"), offset),
            None => write!(f, "{}", self.wall.format("%Y-%m-%dT%H:%M:%S%.f")),
        }
    }
}

/// Parse an ISO-8601 timestamp: optional fractional seconds, optional `Z`/`+HH:MM`/`+HHMM`
/// offset, `T` or space separator. A bare date means midnight.
pub fn parse_creation_time_str(s: &str) -> StampResult<CreationTime> {
    let trimmed = s.trim();
    let mut normalized = trimmed.to_string();
    if normalized.len() > 10 && normalized.as_bytes()[10] == b' ' {
        normalized.replace_range(10..11, "T");
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Ok(with_offset(dt));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M%z"] {
        if let Ok(dt) = DateTime::parse_from_str(&normalized, fmt) {
            return Ok(with_offset(dt));
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(wall) = NaiveDateTime::parse_from_str(&normalized, fmt) {
            return Ok(CreationTime { wall, offset: None });
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(&normalized, "%Y-%m-%d") {
        return Ok(CreationTime {
            wall: date.and_time(chrono::NaiveTime::MIN),
            offset: None,
        });
    }

    Err(StampError::metadata(format!(
        "'{trimmed}' is not an ISO-8601 timestamp"
    )))
}

fn with_offset(dt: DateTime<FixedOffset>) -> CreationTime {
    CreationTime {
        wall: dt.naive_local(),
        offset: Some(*dt.offset()),
    }
}

/// Extract and parse the creation date from sidecar XML text.
pub fn parse_metadata_str(xml: &str) -> StampResult<CreationTime> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| StampError::metadata(format!("malformed XML: {e}")))?;

    let mut matches = doc.descendants().filter(|n| {
        n.is_element()
            && n.tag_name().name() == CREATION_DATE_ELEMENT
            && n.tag_name().namespace() == Some(NRT_META_NAMESPACE)
    });
    let node = matches.next().ok_or_else(|| {
        StampError::metadata(format!(
            "no {CREATION_DATE_ELEMENT} element in namespace {NRT_META_NAMESPACE}"
        ))
    })?;
    if matches.next().is_some() {
        return Err(StampError::metadata(format!(
            "more than one {CREATION_DATE_ELEMENT} element"
        )));
    }

    let value = node.attribute(CREATION_DATE_ATTRIBUTE).ok_or_else(|| {
        StampError::metadata(format!(
            "{CREATION_DATE_ELEMENT} element has no '{CREATION_DATE_ATTRIBUTE}' attribute"
        ))
    })?;
    parse_creation_time_str(value)
}

/// Read a sidecar file and extract its creation date.
pub fn parse_metadata_file(path: &Path) -> StampResult<CreationTime> {
    let xml = std::fs::read_to_string(path)
        .with_context(|| format!("read metadata '{}'", path.display()))?;
    parse_metadata_str(&xml).map_err(|e| match e {
        StampError::Metadata(msg) => {
            StampError::metadata(format!("{}: {msg}", path.display()))
        }
        other => other,
    })
}

#[cfg(test)]
#[path = "../tests/unit/metadata.rs"]
mod tests;

use crate::foundation::error::{StampError, StampResult};

/// Zero-based index of a frame within one video.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameIndex(pub u64);

/// Rational frame rate (`num / den` frames per second).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fps {
    pub num: u32,
    pub den: u32, // must be > 0
}

impl Fps {
    pub fn new(num: u32, den: u32) -> StampResult<Self> {
        if den == 0 {
            return Err(StampError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(StampError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Parse an ffmpeg-style ratio such as `30000/1001` or a bare integer rate.
    pub fn parse_ratio(s: &str) -> StampResult<Self> {
        let s = s.trim();
        let (num, den) = match s.split_once('/') {
            Some((a, b)) => (a.trim(), b.trim()),
            None => (s, "1"),
        };
        let num = num
            .parse::<u32>()
            .map_err(|_| StampError::validation(format!("invalid frame rate '{s}'")))?;
        let den = den
            .parse::<u32>()
            .map_err(|_| StampError::validation(format!("invalid frame rate '{s}'")))?;
        Self::new(num, den)
    }

    /// Presentation time in seconds of `frame`, measured from the start of the clip.
    pub fn frame_time_sec(self, frame: FrameIndex) -> f64 {
        (frame.0 as f64) * f64::from(self.den) / f64::from(self.num)
    }

    /// Duration of one frame in seconds.
    pub fn frame_interval_sec(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }
}

impl std::fmt::Display for Fps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;

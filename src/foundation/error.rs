/// Convenience alias for `Result<T, StampError>`.
pub type StampResult<T> = Result<T, StampError>;

/// Error type shared by every stage of the stamping pipeline.
///
/// A batch never propagates these past a job boundary: each one is turned into a
/// [`JobOutcome::Failed`](crate::JobOutcome::Failed) by the batch driver.
#[derive(thiserror::Error, Debug)]
pub enum StampError {
    /// Invalid configuration or caller input.
    #[error("validation error: {0}")]
    Validation(String),

    /// The XML sidecar could not be read or did not carry a usable creation date.
    #[error("metadata error: {0}")]
    Metadata(String),

    /// Probing, decoding, or encoding through `ffmpeg` failed.
    #[error("media error: {0}")]
    Media(String),

    /// No usable font could be loaded.
    #[error("font error: {0}")]
    Font(String),

    /// Wrapped lower-level error (IO, parsing, ...).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StampError {
    /// Build a [`StampError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`StampError::Metadata`] value.
    pub fn metadata(msg: impl Into<String>) -> Self {
        Self::Metadata(msg.into())
    }

    /// Build a [`StampError::Media`] value.
    pub fn media(msg: impl Into<String>) -> Self {
        Self::Media(msg.into())
    }

    /// Build a [`StampError::Font`] value.
    pub fn font(msg: impl Into<String>) -> Self {
        Self::Font(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;

use thiserror::Error;

/// Failures that reach the outer boundary and end up in a failed [`Response`](crate::Response).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("could not determine image dimensions")]
    UnreadableImage,
    #[error("invalid image dimensions width={width} height={height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("{0}")]
    UnexpectedEngineFailure(String),
}

impl NormalizeError {
    pub(crate) fn engine(err: impl std::fmt::Display) -> Self {
        Self::UnexpectedEngineFailure(err.to_string())
    }
}

impl From<serde_json::Error> for NormalizeError {
    fn from(err: serde_json::Error) -> Self {
        Self::UnexpectedEngineFailure(format!("failed to parse engine output: {err}"))
    }
}

/// Why a single detection entry was dropped. Never surfaced as a failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedEntry {
    #[error("entry is not a [polygon, [text, score]] pair")]
    NotAPair,
    #[error("entry is not a mapping")]
    NotAMapping,
    #[error("entry is missing the `{0}` field")]
    MissingField(&'static str),
    #[error("no polygon at detection index")]
    MissingPolygon,
    #[error("polygon has no points")]
    EmptyPolygon,
    #[error("polygon point {0} is not a finite coordinate pair")]
    InvalidPoint(usize),
    #[error("score is not a finite number")]
    InvalidScore,
    #[error("text is not a string")]
    InvalidText,
    #[error("text is empty")]
    EmptyText,
}

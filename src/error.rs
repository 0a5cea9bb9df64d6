use crate::transcript::SentenceId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutocutError {
    #[error("sentence {id} has inverted bounds: start {start} > end {end}")]
    InvalidBounds { id: SentenceId, start: f64, end: f64 },

    #[error("no keep/remove decision for sentence {0}")]
    MissingDecision(SentenceId),

    #[error("sentence {0} has a zero-length adjusted window and cannot be placed on the timeline")]
    DegenerateSegment(SentenceId),

    #[error("image '{image}' references sentence {id}, which is not on the compiled timeline")]
    UnknownSentenceReference { image: String, id: SentenceId },

    #[error("render failed: {0}")]
    RenderFailed(String),

    #[error("audio analysis failed: {0}")]
    AudioAnalysis(String),

    #[error("media processing failed: {0}")]
    Media(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AutocutError>;

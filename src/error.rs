use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdeptError {
    #[error("Malformed {item}: {reason}")]
    MalformedInput { item: String, reason: String },

    #[error("Invalid review quality {0}, expected 0-5")]
    InvalidQuality(u8),

    #[error("Invalid score: {correct} correct out of {total}")]
    InvalidScore { correct: u32, total: u32 },

    #[error("Cannot {action} while diagnostic is {state}")]
    InvalidTransition { state: &'static str, action: &'static str },

    #[error("Unknown question: {0}")]
    UnknownQuestion(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AdeptError>;

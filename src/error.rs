use thiserror::Error;

use ffindex_lib::IndexError;

/// Errors reported by the command line tool
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Index(#[from] IndexError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Index file {0} already exists, use -f to overwrite")]
    OutputExists(String),

    #[error("Track {track} does not exist (index has {count} tracks)")]
    NoSuchTrack { track: usize, count: usize },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// One-line explanation printed after the error itself.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            AppError::Index(e) => Some(e.category().message()),
            _ => None,
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

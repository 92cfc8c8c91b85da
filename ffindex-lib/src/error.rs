//! Error types for the indexing library
//!
//! Every failure maps onto one [`ErrorCategory`]; callers that only need to
//! decide between "re-index", "report decode trouble" and "user aborted"
//! match on the category instead of the individual variants.

use thiserror::Error;

/// Main error type for indexing and index loading
#[derive(Error, Debug)]
pub enum IndexError {
    /// Source file missing, unreadable or not a parsable container
    #[error("Can't open '{path}': {reason}")]
    Open { path: String, reason: String },

    /// Stored index rejected on load
    #[error("Index file is invalid: {0}")]
    Format(String),

    /// Audio decoding failed during a scan
    #[error("Audio decoding error on track {track}: {reason}")]
    Decode { track: usize, reason: String },

    /// Progress callback requested cancellation
    #[error("Cancelled by user")]
    Cancelled,

    /// Caller passed an argument outside the valid range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Feature recognised but not implemented (e.g. encrypted tracks)
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Native Matroska parser failure
    #[error("Matroska error: {0}")]
    Matroska(#[from] MatroskaError),

    /// FFmpeg failures
    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] FfmpegError),

    /// Plain IO failures
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse failure category, one user-facing message each
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Open,
    Format,
    Decode,
    Cancelled,
    Io,
    Usage,
}

impl ErrorCategory {
    /// Human readable summary for the category.
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCategory::Open => "the source file could not be opened or parsed",
            ErrorCategory::Format => "the index file is invalid and must be rebuilt",
            ErrorCategory::Decode => "audio decoding failed",
            ErrorCategory::Cancelled => "indexing was cancelled",
            ErrorCategory::Io => "a file could not be read or written",
            ErrorCategory::Usage => "invalid request",
        }
    }
}

impl IndexError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            IndexError::Open { .. } | IndexError::Matroska(_) => ErrorCategory::Open,
            IndexError::Format(_) => ErrorCategory::Format,
            IndexError::Decode { .. } => ErrorCategory::Decode,
            IndexError::Cancelled => ErrorCategory::Cancelled,
            IndexError::Io(_) => ErrorCategory::Io,
            IndexError::InvalidArgument(_) | IndexError::Unsupported(_) => ErrorCategory::Usage,
            IndexError::Ffmpeg(FfmpegError::OpenInput(_)) => ErrorCategory::Open,
            IndexError::Ffmpeg(FfmpegError::DecodePacket(_)) => ErrorCategory::Decode,
            IndexError::Ffmpeg(_) => ErrorCategory::Io,
        }
    }

    pub(crate) fn open(path: impl AsRef<std::path::Path>, reason: impl ToString) -> Self {
        IndexError::Open {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn decode(track: usize, reason: impl ToString) -> Self {
        IndexError::Decode {
            track,
            reason: reason.to_string(),
        }
    }

    /// True for failures that the per-track error policy may absorb.
    pub fn is_decode(&self) -> bool {
        matches!(self, IndexError::Decode { .. })
    }
}

/// FFmpeg-specific errors
#[derive(Error, Debug)]
pub enum FfmpegError {
    #[error("FFmpeg initialization failed: {0}")]
    InitFailed(String),

    #[error("Failed to open input file: {0}")]
    OpenInput(String),

    #[error("Failed to find decoder: codec_id={0}")]
    DecoderNotFound(String),

    #[error("Failed to create decoder: {0}")]
    DecoderCreate(String),

    #[error("Failed to decode packet: {0}")]
    DecodePacket(String),

    #[error("Failed to read frame: {0}")]
    ReadFrame(String),
}

/// Errors raised while walking EBML structures
#[derive(Error, Debug)]
pub enum MatroskaError {
    #[error("not an EBML file")]
    NotEbml,

    #[error("unsupported DocType '{0}'")]
    DocType(String),

    #[error("no Segment element found")]
    NoSegment,

    #[error("no Tracks element found")]
    NoTracks,

    #[error("invalid variable-length integer at offset {0}")]
    InvalidVint(u64),

    #[error("element 0x{id:X} at offset {pos} is malformed: {reason}")]
    Malformed { id: u32, pos: u64, reason: String },

    #[error("decompression failed: {0}")]
    Decompress(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, IndexError>;

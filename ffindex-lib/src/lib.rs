pub mod audio;
pub mod error;
pub(crate) mod ffmpeg_utils;
pub mod index;
pub mod indexer;
pub mod matroska;
pub mod types;

#[cfg(test)]
pub(crate) mod tests;

pub use error::{ErrorCategory, FfmpegError, IndexError, MatroskaError, Result};
pub use ffmpeg_utils::version_info as ffmpeg_version_info;
pub use ffmpeg_utils::{init, install_log_filter};
pub use index::{FrameRecord, Index, IndexSummary, IndexValidator, SourceSignature, TrackIndex};
pub use indexer::{
    Capabilities, ErrorHandling, IndexBackend, Indexer, IndexerConfig, ProgressCallback,
    TrackInfo, TrackMask,
};
pub use types::{AudioProperties, SampleFormat, SourceId, SourceSet, TrackType};

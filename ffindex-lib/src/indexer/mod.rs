//! Indexer selection and track enumeration
//!
//! [`Indexer::create`] sniffs the container once and picks a backend:
//! - native Matroska parsing for `matroska`/`webm`
//! - an embedder-supplied [`PlatformParser`] for MPEG-PS/TS and Ogg, when
//!   one is registered in [`Capabilities`] and claims the format
//! - FFmpeg's generic demuxer (lavf) for everything else
//!
//! All backends feed the same scan in [`scan`].

pub mod config;
pub mod lavf;
pub mod matroska;
pub mod platform;
pub mod scan;

pub use config::{ErrorHandling, IndexerConfig, ProgressCallback, TrackMask};
pub use lavf::LavfIndexer;
pub use matroska::MatroskaIndexer;
pub use platform::{
    Capabilities, ContainerStream, PlatformFrame, PlatformIndexer, PlatformParser, PlatformTrack,
};

use std::path::Path;

use ffmpeg_next as ffmpeg;

use crate::error::{IndexError, Result};
use crate::ffmpeg_utils::utils;
use crate::index::{Index, TrackIndex};
use crate::types::{SourceId, TrackType};

/// What every backend knows about a track before scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackInfo {
    pub track_type: TrackType,
    pub codec_id: ffmpeg::codec::Id,
    pub timebase_num: i64,
    pub timebase_den: i64,
}

impl TrackInfo {
    /// Empty seek table for this track.
    pub fn track_index(&self) -> TrackIndex {
        TrackIndex::new(self.track_type, self.timebase_num, self.timebase_den)
    }
}

/// Capability set shared by all backends.
pub trait IndexBackend {
    fn source_path(&self) -> &Path;

    fn source_id(&self) -> SourceId;

    fn tracks(&self) -> &[TrackInfo];

    /// Read the whole file once and build its index. Consumes the backend;
    /// every decoder and file handle is released when this returns.
    fn do_indexing(self, config: IndexerConfig) -> Result<Index>
    where
        Self: Sized;
}

/// An opened source, ready to be scanned.
pub enum Indexer {
    Lavf(LavfIndexer),
    Matroska(MatroskaIndexer),
    Platform(PlatformIndexer),
}

impl Indexer {
    /// Open `path` with the backend best suited to its container.
    pub fn create<P: AsRef<Path>>(path: P, capabilities: &Capabilities) -> Result<Self> {
        let path = path.as_ref();
        let input = ffmpeg::format::input(&path).map_err(|e| IndexError::open(path, e))?;
        let format_name = input.format().name().to_string();
        tracing::debug!("Probed {:?} as '{}'", path, format_name);

        if format_name.starts_with("matroska") {
            drop(input);
            return Ok(Indexer::Matroska(MatroskaIndexer::open(path)?));
        }

        if let Some(parser) = capabilities.platform_parser() {
            let source = match format_name.as_str() {
                "mpeg" | "mpegts" => Some(SourceId::HaaliMpeg),
                "ogg" => Some(SourceId::HaaliOgg),
                _ => None,
            };
            if let Some(source) = source.filter(|s| parser.supported_sources().contains(*s)) {
                drop(input);
                return Ok(Indexer::Platform(PlatformIndexer::open(path, source, parser)?));
            }
        }

        Ok(Indexer::Lavf(LavfIndexer::from_input(path, input)))
    }

    pub fn source_path(&self) -> &Path {
        match self {
            Indexer::Lavf(b) => b.source_path(),
            Indexer::Matroska(b) => b.source_path(),
            Indexer::Platform(b) => b.source_path(),
        }
    }

    pub fn source_id(&self) -> SourceId {
        match self {
            Indexer::Lavf(b) => b.source_id(),
            Indexer::Matroska(b) => b.source_id(),
            Indexer::Platform(b) => b.source_id(),
        }
    }

    pub fn tracks(&self) -> &[TrackInfo] {
        match self {
            Indexer::Lavf(b) => b.tracks(),
            Indexer::Matroska(b) => b.tracks(),
            Indexer::Platform(b) => b.tracks(),
        }
    }

    pub fn number_of_tracks(&self) -> usize {
        self.tracks().len()
    }

    fn track(&self, track: usize) -> Result<&TrackInfo> {
        self.tracks().get(track).ok_or_else(|| {
            IndexError::InvalidArgument(format!(
                "track {} out of range ({} tracks)",
                track,
                self.number_of_tracks()
            ))
        })
    }

    pub fn track_type(&self, track: usize) -> Result<TrackType> {
        Ok(self.track(track)?.track_type)
    }

    /// Long name of the decoder for `track`.
    pub fn track_codec_name(&self, track: usize) -> Result<String> {
        Ok(utils::codec_name(self.track(track)?.codec_id))
    }

    pub fn do_indexing(self, config: IndexerConfig) -> Result<Index> {
        tracing::debug!("Indexing {:?} with {:?}", self.source_path(), config);
        match self {
            Indexer::Lavf(b) => b.do_indexing(config),
            Indexer::Matroska(b) => b.do_indexing(config),
            Indexer::Platform(b) => b.do_indexing(config),
        }
    }
}

//! Optional platform container parsers.
//!
//! The crate ships no parser of its own. An embedder that has one (for
//! MPEG program/transport streams or Ogg) implements [`PlatformParser`] and
//! registers it in [`Capabilities`]; indexes produced through it are tagged
//! with the matching [`SourceId`] and can only be loaded where the same
//! capability is present.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ffmpeg_next as ffmpeg;

use crate::audio::{AudioDecode, FfmpegAudioDecoder};
use crate::error::{IndexError, Result};
use crate::ffmpeg_utils::helpers;
use crate::index::{Index, LibraryVersions, SourceSignature};
use crate::types::{SourceId, SourceSet, TrackType};

use super::config::IndexerConfig;
use super::scan::{open_audio_contexts, run_scan, PacketInfo, PacketSource, ScanSetup};
use super::{IndexBackend, TrackInfo};

/// Track description reported by a platform parser.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformTrack {
    pub track_type: TrackType,
    pub codec_id: ffmpeg::codec::Id,
    pub timebase_num: i64,
    pub timebase_den: i64,
    pub codec_private: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u32,
    pub bits_per_sample: u32,
}

/// One demuxed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformFrame {
    pub track: usize,
    pub pts: i64,
    pub keyframe: bool,
    pub file_pos: u64,
    pub data: Vec<u8>,
}

/// An opened file, read front to back.
pub trait ContainerStream {
    fn tracks(&self) -> &[PlatformTrack];

    /// Next frame in container order, `None` at end of file.
    fn read_frame(&mut self) -> Result<Option<PlatformFrame>>;

    /// Bytes consumed so far.
    fn position(&self) -> u64;

    /// Decoder supplied by the platform itself. FFmpeg is used when this
    /// returns `None`.
    fn audio_decoder(&mut self, _track: usize) -> Option<Box<dyn AudioDecode>> {
        None
    }
}

pub trait PlatformParser: Send + Sync {
    /// Containers this parser handles; only `HaaliMpeg` and `HaaliOgg` are
    /// ever asked for.
    fn supported_sources(&self) -> SourceSet;

    fn open(&self, path: &Path, source: SourceId) -> Result<Box<dyn ContainerStream>>;
}

/// Backends available to this process.
#[derive(Clone, Default)]
pub struct Capabilities {
    platform: Option<Arc<dyn PlatformParser>>,
}

impl Capabilities {
    /// Lavf and native Matroska only.
    pub fn builtin() -> Self {
        Self::default()
    }

    pub fn with_platform_parser(mut self, parser: Arc<dyn PlatformParser>) -> Self {
        self.platform = Some(parser);
        self
    }

    pub fn platform_parser(&self) -> Option<&Arc<dyn PlatformParser>> {
        self.platform.as_ref()
    }

    /// Backends whose indexes may be loaded.
    pub fn sources(&self) -> SourceSet {
        let builtin = SourceSet::builtin();
        match &self.platform {
            Some(parser) => {
                let extra = parser.supported_sources();
                [SourceId::HaaliMpeg, SourceId::HaaliOgg]
                    .into_iter()
                    .filter(|s| extra.contains(*s))
                    .fold(builtin, SourceSet::with)
            }
            None => builtin,
        }
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("sources", &self.sources())
            .finish()
    }
}

pub struct PlatformIndexer {
    path: PathBuf,
    source: SourceId,
    stream: Box<dyn ContainerStream>,
    tracks: Vec<TrackInfo>,
}

impl PlatformIndexer {
    pub fn open<P: AsRef<Path>>(path: P, source: SourceId, parser: &dyn PlatformParser) -> Result<Self> {
        let path = path.as_ref();
        if !parser.supported_sources().contains(source) {
            return Err(IndexError::Unsupported(format!(
                "platform parser does not handle {}",
                source.name()
            )));
        }
        let stream = parser.open(path, source)?;
        let tracks = stream
            .tracks()
            .iter()
            .map(|t| TrackInfo {
                track_type: t.track_type,
                codec_id: t.codec_id,
                timebase_num: t.timebase_num,
                timebase_den: t.timebase_den,
            })
            .collect();
        tracing::debug!("Opened {:?} with the platform parser ({})", path, source.name());

        Ok(Self {
            path: path.to_path_buf(),
            source,
            stream,
            tracks,
        })
    }
}

impl IndexBackend for PlatformIndexer {
    fn source_path(&self) -> &Path {
        &self.path
    }

    fn source_id(&self) -> SourceId {
        self.source
    }

    fn tracks(&self) -> &[TrackInfo] {
        &self.tracks
    }

    fn do_indexing(self, mut config: IndexerConfig) -> Result<Index> {
        let PlatformIndexer {
            path,
            source,
            mut stream,
            tracks,
        } = self;
        let signature = SourceSignature::compute(&path)?;
        let total = signature.file_size;

        let described = stream.tracks().to_vec();
        let types: Vec<TrackType> = tracks.iter().map(|t| t.track_type).collect();
        let audio = open_audio_contexts(&types, &config, |t| {
            if let Some(decoder) = stream.audio_decoder(t) {
                return Ok(decoder);
            }
            let track = &described[t];
            let params = helpers::audio_parameters(
                track.codec_id,
                track.sample_rate,
                track.channels,
                track.bits_per_sample,
                0,
                &track.codec_private,
            );
            let decoder: Box<dyn AudioDecode> = Box::new(FfmpegAudioDecoder::from_parameters(params, t)?);
            Ok(decoder)
        })?;

        let setup = ScanSetup {
            source_path: path,
            decoder: source,
            signature,
            versions: LibraryVersions::current(),
            tracks: tracks.iter().map(TrackInfo::track_index).collect(),
            audio,
        };
        let mut packets = PlatformPackets {
            stream,
            frame: None,
            total,
        };
        run_scan(&mut packets, setup, &mut config)
    }
}

struct PlatformPackets {
    stream: Box<dyn ContainerStream>,
    frame: Option<PlatformFrame>,
    total: u64,
}

impl PacketSource for PlatformPackets {
    fn next_packet(&mut self) -> Result<Option<PacketInfo>> {
        self.frame = self.stream.read_frame()?;
        Ok(self.frame.as_ref().map(|frame| PacketInfo {
            track: frame.track,
            pts: frame.pts,
            keyframe: frame.keyframe,
            file_pos: frame.file_pos,
            size: frame.data.len() as u32,
        }))
    }

    fn payload(&mut self) -> Result<&[u8]> {
        Ok(self.frame.as_ref().map_or(&[][..], |f| f.data.as_slice()))
    }

    fn position(&mut self) -> u64 {
        self.stream.position()
    }

    fn total_size(&self) -> u64 {
        self.total
    }
}

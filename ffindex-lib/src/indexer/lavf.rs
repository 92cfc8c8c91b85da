//! Generic backend on top of FFmpeg's demuxers.

use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;

use crate::audio::{AudioDecode, FfmpegAudioDecoder};
use crate::error::{IndexError, Result};
use crate::ffmpeg_utils::{helpers, utils};
use crate::index::{Index, LibraryVersions, SourceSignature};
use crate::types::{SourceId, TrackType};

use super::config::IndexerConfig;
use super::scan::{open_audio_contexts, run_scan, PacketInfo, PacketSource, ScanSetup};
use super::{IndexBackend, TrackInfo};

pub struct LavfIndexer {
    path: PathBuf,
    input: ffmpeg::format::context::Input,
    tracks: Vec<TrackInfo>,
}

impl LavfIndexer {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let input = ffmpeg::format::input(&path).map_err(|e| IndexError::open(path, e))?;
        Ok(Self::from_input(path, input))
    }

    /// Reuse an input that was already opened for probing.
    pub(crate) fn from_input(path: &Path, input: ffmpeg::format::context::Input) -> Self {
        let tracks = input
            .streams()
            .map(|stream| {
                let params = stream.parameters();
                let time_base = stream.time_base();
                TrackInfo {
                    track_type: utils::track_type_from_medium(params.medium()),
                    codec_id: params.id(),
                    // pts_to_ms() yields milliseconds with this scaling
                    timebase_num: time_base.numerator() as i64 * 1000,
                    timebase_den: time_base.denominator() as i64,
                }
            })
            .collect();

        Self {
            path: path.to_path_buf(),
            input,
            tracks,
        }
    }
}

impl IndexBackend for LavfIndexer {
    fn source_path(&self) -> &Path {
        &self.path
    }

    fn source_id(&self) -> SourceId {
        SourceId::Lavf
    }

    fn tracks(&self) -> &[TrackInfo] {
        &self.tracks
    }

    fn do_indexing(self, mut config: IndexerConfig) -> Result<Index> {
        let LavfIndexer { path, input, tracks } = self;
        let signature = SourceSignature::compute(&path)?;
        let total = signature.file_size;

        let types: Vec<TrackType> = tracks.iter().map(|t| t.track_type).collect();
        let audio = open_audio_contexts(&types, &config, |t| {
            let stream = input.stream(t).ok_or_else(|| {
                IndexError::InvalidArgument(format!("stream {} disappeared", t))
            })?;
            let decoder: Box<dyn AudioDecode> = Box::new(FfmpegAudioDecoder::from_stream(&stream)?);
            Ok(decoder)
        })?;

        let setup = ScanSetup {
            source_path: path,
            decoder: SourceId::Lavf,
            signature,
            versions: LibraryVersions::current(),
            tracks: tracks.iter().map(TrackInfo::track_index).collect(),
            audio,
        };
        let mut packets = LavfPackets {
            input,
            packet: ffmpeg::Packet::empty(),
            total,
        };
        run_scan(&mut packets, setup, &mut config)
    }
}

struct LavfPackets {
    input: ffmpeg::format::context::Input,
    packet: ffmpeg::Packet,
    total: u64,
}

impl PacketSource for LavfPackets {
    fn next_packet(&mut self) -> Result<Option<PacketInfo>> {
        let mut packet = ffmpeg::Packet::empty();
        match packet.read(&mut self.input) {
            Ok(()) => {}
            Err(ffmpeg::Error::Eof) => return Ok(None),
            Err(e) => {
                // demuxers report trailing garbage as read errors; treat as end
                tracing::warn!("Stopping at read error: {}", e);
                return Ok(None);
            }
        }

        let info = PacketInfo {
            track: packet.stream(),
            pts: packet.pts().or(packet.dts()).unwrap_or(0),
            keyframe: packet.is_key(),
            file_pos: packet.position().max(0) as u64,
            size: packet.size() as u32,
        };
        self.packet = packet;
        Ok(Some(info))
    }

    fn payload(&mut self) -> Result<&[u8]> {
        Ok(self.packet.data().unwrap_or(&[]))
    }

    fn position(&mut self) -> u64 {
        helpers::input_position(&self.input)
    }

    fn total_size(&self) -> u64 {
        self.total
    }
}

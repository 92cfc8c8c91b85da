//! Native Matroska backend.
//!
//! Frames come straight from [`MatroskaFile`]; audio payloads are
//! decompressed per track before they reach the decoder, and decoders are
//! configured from the track's CodecID and CodecPrivate.

use std::path::{Path, PathBuf};

use crate::audio::{AudioDecode, FfmpegAudioDecoder};
use crate::error::{IndexError, MatroskaError, Result};
use crate::ffmpeg_utils::helpers;
use crate::index::{Index, LibraryVersions, SourceSignature};
use crate::matroska::codec::map_codec;
use crate::matroska::compression::{Decompressor, SCOPE_FRAMES};
use crate::matroska::{MatroskaFile, MatroskaTrack};
use crate::types::{SourceId, TrackType};

use super::config::IndexerConfig;
use super::scan::{open_audio_contexts, run_scan, PacketInfo, PacketSource, ScanSetup};
use super::{IndexBackend, TrackInfo};

/// Matroska ticks are TimecodeScale nanoseconds; pts_to_ms() divides by this.
const NANOS_PER_MS: i64 = 1_000_000;

pub struct MatroskaIndexer {
    path: PathBuf,
    file: MatroskaFile,
    tracks: Vec<TrackInfo>,
}

impl MatroskaIndexer {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = MatroskaFile::open(path)?;
        let timebase_num = i64::try_from(file.timecode_scale()).map_err(|_| MatroskaError::Malformed {
            id: crate::matroska::elements::TIMECODE_SCALE,
            pos: 0,
            reason: "TimecodeScale out of range".to_string(),
        })?;
        let tracks = file
            .tracks()
            .iter()
            .map(|track| TrackInfo {
                track_type: track.track_type,
                codec_id: codec_setup(track).codec_id,
                timebase_num,
                timebase_den: NANOS_PER_MS,
            })
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            tracks,
        })
    }
}

fn codec_setup(track: &MatroskaTrack) -> crate::matroska::codec::CodecSetup {
    map_codec(
        &track.codec_id,
        &track.codec_private,
        track.bit_depth,
        track.sample_rate as u32,
        track.channels,
    )
}

fn open_decoder(track: &MatroskaTrack, t: usize) -> Result<Box<dyn AudioDecode>> {
    let setup = codec_setup(track);
    let params = helpers::audio_parameters(
        setup.codec_id,
        setup.sample_rate.unwrap_or(track.sample_rate as u32),
        setup.channels.unwrap_or(track.channels),
        setup.bits_per_coded_sample,
        setup.block_align,
        &setup.extradata,
    );
    Ok(Box::new(FfmpegAudioDecoder::from_parameters(params, t)?))
}

impl IndexBackend for MatroskaIndexer {
    fn source_path(&self) -> &Path {
        &self.path
    }

    fn source_id(&self) -> SourceId {
        SourceId::Matroska
    }

    fn tracks(&self) -> &[TrackInfo] {
        &self.tracks
    }

    fn do_indexing(self, mut config: IndexerConfig) -> Result<Index> {
        let MatroskaIndexer { path, file, tracks } = self;
        let signature = SourceSignature::compute(&path)?;

        let mut decompressors: Vec<Option<Decompressor>> = vec![None; tracks.len()];
        let types: Vec<TrackType> = tracks.iter().map(|t| t.track_type).collect();
        let audio = open_audio_contexts(&types, &config, |t| {
            let track = &file.tracks()[t];
            decompressors[t] = Decompressor::for_scope(&track.encodings, SCOPE_FRAMES)?;
            open_decoder(track, t)
        })?;

        let setup = ScanSetup {
            source_path: path,
            decoder: SourceId::Matroska,
            signature,
            versions: LibraryVersions::current(),
            tracks: tracks.iter().map(TrackInfo::track_index).collect(),
            audio,
        };
        let mut packets = MatroskaPackets {
            file,
            decompressors,
            buffer: Vec::new(),
            track: 0,
        };
        run_scan(&mut packets, setup, &mut config)
    }
}

struct MatroskaPackets {
    file: MatroskaFile,
    decompressors: Vec<Option<Decompressor>>,
    buffer: Vec<u8>,
    track: usize,
}

impl PacketSource for MatroskaPackets {
    fn next_packet(&mut self) -> Result<Option<PacketInfo>> {
        Ok(self.file.next_frame()?.map(|frame| {
            self.track = frame.track;
            PacketInfo {
                track: frame.track,
                pts: frame.timecode,
                keyframe: frame.keyframe,
                file_pos: frame.file_pos,
                size: frame.size,
            }
        }))
    }

    fn payload(&mut self) -> Result<&[u8]> {
        match self.decompressors.get(self.track) {
            Some(Some(decompressor)) => {
                decompressor
                    .decompress(self.file.frame_data(), &mut self.buffer)
                    .map_err(|e| IndexError::decode(self.track, e))?;
                Ok(&self.buffer)
            }
            _ => Ok(self.file.frame_data()),
        }
    }

    fn position(&mut self) -> u64 {
        self.file.position()
    }

    fn total_size(&self) -> u64 {
        self.file.file_size()
    }
}

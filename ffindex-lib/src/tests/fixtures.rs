//! Test fixtures

use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;

use crate::audio::AudioDecode;
use crate::error::{IndexError, Result};
use crate::index::{LibraryVersions, SourceSignature, TrackIndex, DIGEST_LEN};
use crate::indexer::scan::{open_audio_contexts, PacketInfo, PacketSource, ScanSetup};
use crate::indexer::{ContainerStream, IndexerConfig, PlatformFrame, PlatformParser, PlatformTrack};
use crate::types::{PcmFormat, SampleFormat, SourceId, SourceSet, TrackType};

// ── Synthetic Matroska files ────────────────────────────────────────────────

/// EBML element with an 8-byte size field.
pub fn element(id: u32, body: &[u8]) -> Vec<u8> {
    let mut out: Vec<u8> = id.to_be_bytes().into_iter().skip_while(|b| *b == 0).collect();
    out.push(0x01);
    out.extend_from_slice(&(body.len() as u64).to_be_bytes()[1..]);
    out.extend_from_slice(body);
    out
}

pub fn uint_element(id: u32, value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(7);
    element(id, &bytes[start..])
}

fn block_body(track: u64, timecode: i16, flags: u8, data: &[u8]) -> Vec<u8> {
    let mut body = vec![0x80 | track as u8];
    body.extend_from_slice(&timecode.to_be_bytes());
    body.push(flags);
    body.extend_from_slice(data);
    body
}

/// `(track number, timecode relative to the cluster, keyframe, data)`
pub type TestBlock = (u64, i16, bool, Vec<u8>);

/// Master element whose size is the unknown-size marker.
fn unknown_size_element(id: u32, body: &[u8]) -> Vec<u8> {
    let mut out: Vec<u8> = id.to_be_bytes().into_iter().skip_while(|b| *b == 0).collect();
    out.extend_from_slice(&[0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
    out.extend_from_slice(body);
    out
}

fn content_encodings(algo: u64, settings: &[u8]) -> Vec<u8> {
    let mut compression = uint_element(0x4254, algo);
    if !settings.is_empty() {
        compression.extend(element(0x4255, settings));
    }
    let mut encoding = uint_element(0x5031, 0);
    encoding.extend(uint_element(0x5032, 1));
    encoding.extend(uint_element(0x5033, 0));
    encoding.extend(element(0x5034, &compression));
    element(0x6D80, &element(0x6240, &encoding))
}

/// Builds small but complete Matroska files.
pub struct MkvBuilder {
    timecode_scale: Option<u64>,
    tracks: Vec<Vec<u8>>,
    /// Cluster bodies; wrapped when the file is built
    clusters: Vec<Vec<u8>>,
    unknown_sizes: bool,
}

impl MkvBuilder {
    pub fn new() -> Self {
        Self {
            timecode_scale: None,
            tracks: Vec::new(),
            clusters: Vec::new(),
            unknown_sizes: false,
        }
    }

    /// Write Segment and Clusters with unknown sizes, as live muxers do.
    pub fn unknown_sizes(mut self) -> Self {
        self.unknown_sizes = true;
        self
    }

    pub fn timecode_scale(mut self, scale: u64) -> Self {
        self.timecode_scale = Some(scale);
        self
    }

    pub fn video_track(mut self, number: u64, codec: &str) -> Self {
        let mut entry = uint_element(0xD7, number);
        entry.extend(uint_element(0x73C5, number));
        entry.extend(uint_element(0x83, 1));
        entry.extend(element(0x86, codec.as_bytes()));
        let mut video = uint_element(0xB0, 16);
        video.extend(uint_element(0xBA, 16));
        entry.extend(element(0xE0, &video));
        self.tracks.push(element(0xAE, &entry));
        self
    }

    pub fn audio_track(self, number: u64, codec: &str, rate: f64, channels: u64, bits: u64) -> Self {
        self.audio_track_with(number, codec, rate, channels, bits, &[])
    }

    /// Audio track whose frames are stored without `prefix`.
    pub fn header_stripped_audio_track(
        self,
        number: u64,
        codec: &str,
        rate: f64,
        channels: u64,
        bits: u64,
        prefix: &[u8],
    ) -> Self {
        let encodings = content_encodings(3, prefix);
        self.audio_track_with(number, codec, rate, channels, bits, &encodings)
    }

    /// Mono 16-bit PCM track whose frames are stored with compression
    /// algorithm `algo` (0 zlib, 2 LZO).
    pub fn compressed_pcm_track(self, number: u64, algo: u64) -> Self {
        let encodings = content_encodings(algo, &[]);
        self.audio_track_with(number, "A_PCM/INT/LIT", 8000.0, 1, 16, &encodings)
    }

    /// Mono 16-bit PCM track with a DefaultDuration, for laced blocks.
    pub fn pcm_track_with_duration(self, number: u64, default_duration: u64) -> Self {
        let duration = uint_element(0x23_E383, default_duration);
        self.audio_track_with(number, "A_PCM/INT/LIT", 8000.0, 1, 16, &duration)
    }

    fn audio_track_with(
        mut self,
        number: u64,
        codec: &str,
        rate: f64,
        channels: u64,
        bits: u64,
        extra: &[u8],
    ) -> Self {
        let mut entry = uint_element(0xD7, number);
        entry.extend(uint_element(0x73C5, number));
        entry.extend(uint_element(0x83, 2));
        entry.extend(element(0x86, codec.as_bytes()));
        let mut audio = element(0xB5, &rate.to_be_bytes());
        audio.extend(uint_element(0x9F, channels));
        audio.extend(uint_element(0x6264, bits));
        entry.extend(element(0xE1, &audio));
        entry.extend_from_slice(extra);
        self.tracks.push(element(0xAE, &entry));
        self
    }

    pub fn subtitle_track(mut self, number: u64) -> Self {
        let mut entry = uint_element(0xD7, number);
        entry.extend(uint_element(0x73C5, number));
        entry.extend(uint_element(0x83, 0x11));
        entry.extend(element(0x86, b"S_TEXT/UTF8"));
        self.tracks.push(element(0xAE, &entry));
        self
    }

    /// Cluster of SimpleBlocks.
    pub fn cluster(mut self, timecode: u64, blocks: &[TestBlock]) -> Self {
        let mut body = uint_element(0xE7, timecode);
        for (track, tc, keyframe, data) in blocks {
            let flags = if *keyframe { 0x80 } else { 0x00 };
            body.extend(element(0xA3, &block_body(*track, *tc, flags, data)));
        }
        self.clusters.push(body);
        self
    }

    /// Cluster holding one SimpleBlock with fixed-size lacing. All frames
    /// must have the same length.
    pub fn laced_cluster(mut self, timecode: u64, track: u64, frames: &[Vec<u8>]) -> Self {
        let mut laced = vec![(frames.len() - 1) as u8];
        laced.extend(frames.concat());
        let mut body = uint_element(0xE7, timecode);
        body.extend(element(0xA3, &block_body(track, 0, 0x80 | 0x04, &laced)));
        self.clusters.push(body);
        self
    }

    /// Cluster of BlockGroups; non-keyframes carry a ReferenceBlock.
    pub fn block_group_cluster(mut self, timecode: u64, blocks: &[TestBlock]) -> Self {
        let mut body = uint_element(0xE7, timecode);
        for (track, tc, keyframe, data) in blocks {
            let mut group = element(0xA1, &block_body(*track, *tc, 0, data));
            if !*keyframe {
                group.extend(element(0xFB, &[0xD8]));
            }
            body.extend(element(0xA0, &group));
        }
        self.clusters.push(body);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut header = uint_element(0x4286, 1);
        header.extend(uint_element(0x42F7, 1));
        header.extend(uint_element(0x42F2, 4));
        header.extend(uint_element(0x42F3, 8));
        header.extend(element(0x4282, b"matroska"));
        header.extend(uint_element(0x4287, 4));
        header.extend(uint_element(0x4285, 2));
        let mut out = element(0x1A45_DFA3, &header);

        let mut info = uint_element(0x2A_D7B1, self.timecode_scale.unwrap_or(1_000_000));
        info.extend(element(0x4D80, b"ffindex-tests"));
        info.extend(element(0x5741, b"ffindex-tests"));
        let mut segment = element(0x1549_A966, &info);
        if !self.tracks.is_empty() {
            segment.extend(element(0x1654_AE6B, &self.tracks.concat()));
        }
        let wrap = if self.unknown_sizes {
            unknown_size_element
        } else {
            element
        };
        for cluster in &self.clusters {
            segment.extend(wrap(0x1F43_B675, cluster));
        }
        out.extend(wrap(0x1853_8067, &segment));
        out
    }

    pub fn write(&self, path: &Path) -> PathBuf {
        std::fs::write(path, self.build()).unwrap();
        path.to_path_buf()
    }
}

/// PCM audio track 1 (mono s16, 8 kHz) with three 8-sample blocks 10 ms
/// apart, plus a subtitle track 2.
pub fn pcm_mkv() -> MkvBuilder {
    let block = |n: u8| -> Vec<u8> { (0..16).map(|i| i * n).collect() };
    MkvBuilder::new()
        .audio_track(1, "A_PCM/INT/LIT", 8000.0, 1, 16)
        .subtitle_track(2)
        .cluster(
            0,
            &[
                (1, 0, true, block(1)),
                (2, 5, true, b"hello".to_vec()),
                (1, 10, true, block(2)),
            ],
        )
        .cluster(20, &[(1, 0, true, block(3))])
}

// ── Scripted scans ──────────────────────────────────────────────────────────

/// Payloads starting with this byte fail to decode.
pub const FAIL_BYTE: u8 = 0xFF;

const MONO_S16: PcmFormat = PcmFormat {
    sample_format: SampleFormat::S16,
    bits_per_sample: 16,
    channels: 1,
    channel_layout: 0,
    sample_rate: 8000,
};

/// Mono s16 decoder: every two input bytes become one sample.
pub struct ScriptedDecoder {
    track: usize,
    format: Option<PcmFormat>,
}

impl ScriptedDecoder {
    pub fn new(track: usize) -> Self {
        Self { track, format: None }
    }
}

impl AudioDecode for ScriptedDecoder {
    fn decode(&mut self, data: &[u8], out: &mut Vec<u8>) -> Result<usize> {
        if data.first() == Some(&FAIL_BYTE) {
            return Err(IndexError::decode(self.track, "scripted failure"));
        }
        self.format = Some(MONO_S16);
        out.extend(std::iter::repeat(0u8).take(data.len() / 2 * 2));
        Ok(data.len())
    }

    fn format(&self) -> Option<PcmFormat> {
        self.format
    }
}

/// Packet source replaying a fixed list.
pub struct ScriptedPackets {
    packets: Vec<(PacketInfo, Vec<u8>)>,
    next: usize,
}

impl ScriptedPackets {
    pub fn new() -> Self {
        Self {
            packets: Vec::new(),
            next: 0,
        }
    }

    fn push(mut self, track: usize, pts: i64, keyframe: bool, data: Vec<u8>) -> Self {
        let file_pos = self.packets.iter().map(|(_, d)| d.len().max(1) as u64).sum();
        let info = PacketInfo {
            track,
            pts,
            keyframe,
            file_pos,
            size: data.len().max(1) as u32,
        };
        self.packets.push((info, data));
        self
    }

    pub fn video(self, track: usize, pts: i64, keyframe: bool) -> Self {
        self.push(track, pts, keyframe, vec![0])
    }

    pub fn audio(self, track: usize, pts: i64, data: &[u8]) -> Self {
        self.push(track, pts, true, data.to_vec())
    }
}

impl PacketSource for ScriptedPackets {
    fn next_packet(&mut self) -> Result<Option<PacketInfo>> {
        let packet = self.packets.get(self.next).map(|(info, _)| *info);
        if packet.is_some() {
            self.next += 1;
        }
        Ok(packet)
    }

    fn payload(&mut self) -> Result<&[u8]> {
        Ok(self
            .next
            .checked_sub(1)
            .and_then(|i| self.packets.get(i))
            .map_or(&[][..], |(_, data)| data.as_slice()))
    }

    fn position(&mut self) -> u64 {
        self.packets[..self.next].iter().map(|(info, _)| info.size as u64).sum()
    }

    fn total_size(&self) -> u64 {
        self.packets.iter().map(|(info, _)| info.size as u64).sum()
    }
}

/// Track 0 video, track 1 audio decoded by [`ScriptedDecoder`].
pub fn scripted_setup(config: &IndexerConfig) -> ScanSetup {
    let types = [TrackType::Video, TrackType::Audio];
    let audio = open_audio_contexts(&types, config, |t| {
        let decoder: Box<dyn AudioDecode> = Box::new(ScriptedDecoder::new(t));
        Ok(decoder)
    })
    .unwrap();

    ScanSetup {
        source_path: PathBuf::from("/scripted/input.mkv"),
        decoder: SourceId::Lavf,
        signature: SourceSignature {
            file_size: 0,
            digest: [0; DIGEST_LEN],
        },
        versions: LibraryVersions::default(),
        tracks: vec![
            TrackIndex::new(TrackType::Video, 1000, 1000),
            TrackIndex::new(TrackType::Audio, 1000, 1000),
        ],
        audio,
    }
}

// ── Fake platform parser ────────────────────────────────────────────────────

pub struct FakeParser {
    sources: SourceSet,
}

impl FakeParser {
    pub fn ogg() -> Self {
        Self {
            sources: SourceSet::empty().with(SourceId::HaaliOgg),
        }
    }
}

impl PlatformParser for FakeParser {
    fn supported_sources(&self) -> SourceSet {
        self.sources
    }

    fn open(&self, _path: &Path, _source: SourceId) -> Result<Box<dyn ContainerStream>> {
        Ok(Box::new(FakeStream::new()))
    }
}

/// Video track 0 with three frames, audio track 1 with two packets.
pub struct FakeStream {
    tracks: Vec<PlatformTrack>,
    frames: Vec<PlatformFrame>,
    next: usize,
}

impl FakeStream {
    fn new() -> Self {
        let track = |track_type, codec_id| PlatformTrack {
            track_type,
            codec_id,
            timebase_num: 1,
            timebase_den: 1000,
            codec_private: Vec::new(),
            sample_rate: 8000,
            channels: 1,
            bits_per_sample: 16,
        };
        let frame = |track, pts, keyframe, data: Vec<u8>| PlatformFrame {
            track,
            pts,
            keyframe,
            file_pos: pts as u64 * 10,
            data,
        };
        Self {
            tracks: vec![
                track(TrackType::Video, ffmpeg::codec::Id::THEORA),
                track(TrackType::Audio, ffmpeg::codec::Id::VORBIS),
            ],
            frames: vec![
                frame(0, 0, true, vec![0; 8]),
                frame(1, 0, true, vec![1; 4]),
                frame(0, 80, false, vec![0; 8]),
                frame(0, 40, false, vec![0; 8]),
                frame(1, 50, true, vec![2; 2]),
            ],
            next: 0,
        }
    }
}

impl ContainerStream for FakeStream {
    fn tracks(&self) -> &[PlatformTrack] {
        &self.tracks
    }

    fn read_frame(&mut self) -> Result<Option<PlatformFrame>> {
        let frame = self.frames.get(self.next).cloned();
        self.next += 1;
        Ok(frame)
    }

    fn position(&self) -> u64 {
        self.next as u64 * 100
    }

    fn audio_decoder(&mut self, track: usize) -> Option<Box<dyn AudioDecode>> {
        Some(Box::new(ScriptedDecoder::new(track)))
    }
}

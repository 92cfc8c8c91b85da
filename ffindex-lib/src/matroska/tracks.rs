//! Tracks element parsing.

use super::compression::{ContentEncoding, Decompressor, SCOPE_PRIVATE};
use super::ebml::{float, string, uint, Children};
use super::elements as el;
use crate::error::{MatroskaError, Result};
use crate::types::TrackType;

/// One TrackEntry.
#[derive(Debug, Clone, PartialEq)]
pub struct MatroskaTrack {
    pub number: u64,
    pub track_type: TrackType,
    pub codec_id: String,
    pub codec_private: Vec<u8>,
    /// Nanoseconds per frame, 0 when not given
    pub default_duration: u64,
    pub width: u32,
    pub height: u32,
    pub sample_rate: f64,
    pub channels: u32,
    pub bit_depth: u32,
    pub encodings: Vec<ContentEncoding>,
}

impl Default for MatroskaTrack {
    fn default() -> Self {
        Self {
            number: 0,
            track_type: TrackType::Unknown,
            codec_id: String::new(),
            codec_private: Vec::new(),
            default_duration: 0,
            width: 0,
            height: 0,
            sample_rate: 8000.0,
            channels: 1,
            bit_depth: 0,
            encodings: Vec::new(),
        }
    }
}

fn track_type(value: u64) -> TrackType {
    match value {
        el::TRACK_TYPE_VIDEO => TrackType::Video,
        el::TRACK_TYPE_AUDIO => TrackType::Audio,
        el::TRACK_TYPE_SUBTITLE => TrackType::Subtitle,
        _ => TrackType::Unknown,
    }
}

/// Parse the body of a Tracks element. `base` is its file offset.
pub fn parse_tracks(body: &[u8], base: u64) -> Result<Vec<MatroskaTrack>> {
    let mut tracks = Vec::new();
    for child in Children::new(body, base) {
        let (id, data, pos) = child?;
        if id == el::TRACK_ENTRY {
            let track = parse_track_entry(data, pos)?;
            if track.number == 0 {
                return Err(MatroskaError::Malformed {
                    id,
                    pos,
                    reason: "track without a track number".into(),
                }
                .into());
            }
            tracks.push(track);
        }
    }
    Ok(tracks)
}

fn parse_track_entry(body: &[u8], base: u64) -> Result<MatroskaTrack> {
    let mut track = MatroskaTrack::default();
    for child in Children::new(body, base) {
        let (id, data, pos) = child?;
        match id {
            el::TRACK_NUMBER => track.number = uint(data),
            el::TRACK_TYPE => track.track_type = track_type(uint(data)),
            el::CODEC_ID => track.codec_id = string(data),
            el::CODEC_PRIVATE => track.codec_private = data.to_vec(),
            el::DEFAULT_DURATION => track.default_duration = uint(data),
            el::VIDEO => {
                for child in Children::new(data, pos) {
                    let (id, data, _) = child?;
                    match id {
                        el::PIXEL_WIDTH => track.width = uint(data) as u32,
                        el::PIXEL_HEIGHT => track.height = uint(data) as u32,
                        _ => {}
                    }
                }
            }
            el::AUDIO => {
                for child in Children::new(data, pos) {
                    let (id, data, pos) = child?;
                    match id {
                        el::SAMPLING_FREQUENCY => {
                            track.sample_rate =
                                float(data).ok_or_else(|| MatroskaError::Malformed {
                                    id,
                                    pos,
                                    reason: "bad float".into(),
                                })?
                        }
                        el::CHANNELS => track.channels = uint(data) as u32,
                        el::BIT_DEPTH => track.bit_depth = uint(data) as u32,
                        _ => {}
                    }
                }
            }
            el::CONTENT_ENCODINGS => track.encodings = parse_encodings(data, pos)?,
            _ => {}
        }
    }

    track.encodings.sort_by_key(|e| e.order);

    // private data may itself be stored compressed
    if !track.codec_private.is_empty() {
        if let Ok(Some(decompressor)) = Decompressor::for_scope(&track.encodings, SCOPE_PRIVATE) {
            let mut restored = Vec::new();
            decompressor.decompress(&track.codec_private, &mut restored)?;
            track.codec_private = restored;
        }
    }

    Ok(track)
}

fn parse_encodings(body: &[u8], base: u64) -> Result<Vec<ContentEncoding>> {
    let mut encodings = Vec::new();
    for child in Children::new(body, base) {
        let (id, data, pos) = child?;
        if id != el::CONTENT_ENCODING {
            continue;
        }
        let mut encoding = ContentEncoding::default();
        for child in Children::new(data, pos) {
            let (id, data, pos) = child?;
            match id {
                el::CONTENT_ENCODING_ORDER => encoding.order = uint(data),
                el::CONTENT_ENCODING_SCOPE => encoding.scope = uint(data),
                el::CONTENT_ENCODING_TYPE => encoding.encoding_type = uint(data),
                el::CONTENT_ENCRYPTION => encoding.encoding_type = 1,
                el::CONTENT_COMPRESSION => {
                    for child in Children::new(data, pos) {
                        let (id, data, _) = child?;
                        match id {
                            el::CONTENT_COMP_ALGO => encoding.comp_algo = uint(data),
                            el::CONTENT_COMP_SETTINGS => encoding.comp_settings = data.to_vec(),
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }
        encodings.push(encoding);
    }
    Ok(encodings)
}

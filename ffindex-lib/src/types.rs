//! Shared value types used across the indexer, the index model and the
//! audio sink.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of elementary stream a track carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackType {
    Unknown,
    Video,
    Audio,
    Subtitle,
}

impl TrackType {
    /// Stable on-disk code.
    pub fn code(self) -> u32 {
        match self {
            TrackType::Unknown => 0,
            TrackType::Video => 1,
            TrackType::Audio => 2,
            TrackType::Subtitle => 3,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(TrackType::Unknown),
            1 => Some(TrackType::Video),
            2 => Some(TrackType::Audio),
            3 => Some(TrackType::Subtitle),
            _ => None,
        }
    }
}

impl fmt::Display for TrackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrackType::Unknown => "unknown",
            TrackType::Video => "video",
            TrackType::Audio => "audio",
            TrackType::Subtitle => "subtitle",
        };
        f.write_str(name)
    }
}

/// Demuxing backend that produced an index.
///
/// The numeric values are bit flags so that a set of available backends
/// fits in a single `u32` ([`SourceSet`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceId {
    Lavf,
    Matroska,
    HaaliMpeg,
    HaaliOgg,
}

impl SourceId {
    pub fn code(self) -> u32 {
        match self {
            SourceId::Lavf => 1,
            SourceId::Matroska => 2,
            SourceId::HaaliMpeg => 4,
            SourceId::HaaliOgg => 8,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(SourceId::Lavf),
            2 => Some(SourceId::Matroska),
            4 => Some(SourceId::HaaliMpeg),
            8 => Some(SourceId::HaaliOgg),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SourceId::Lavf => "lavf",
            SourceId::Matroska => "matroska",
            SourceId::HaaliMpeg => "haali-mpeg",
            SourceId::HaaliOgg => "haali-ogg",
        }
    }
}

/// Set of backends usable in the running process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceSet(u32);

impl SourceSet {
    pub const fn empty() -> Self {
        SourceSet(0)
    }

    /// Backends implemented by this crate without outside help.
    pub fn builtin() -> Self {
        SourceSet::empty().with(SourceId::Lavf).with(SourceId::Matroska)
    }

    pub fn with(self, source: SourceId) -> Self {
        SourceSet(self.0 | source.code())
    }

    pub fn contains(&self, source: SourceId) -> bool {
        self.0 & source.code() != 0
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

/// Interleaved PCM sample layout produced by an audio decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleFormat {
    U8,
    S16,
    S32,
    S64,
    Float,
    Double,
}

impl SampleFormat {
    /// Container width of one sample in bytes.
    pub fn bytes(self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S32 | SampleFormat::Float => 4,
            SampleFormat::S64 | SampleFormat::Double => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, SampleFormat::Float | SampleFormat::Double)
    }
}

/// Format of the decoded PCM stream for one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_format: SampleFormat,
    /// Significant bits per sample, may be lower than the container width
    pub bits_per_sample: u32,
    pub channels: u32,
    /// WAVE speaker mask, 0 when unknown
    pub channel_layout: u64,
    pub sample_rate: u32,
}

impl PcmFormat {
    /// Bytes occupied by one sample across all channels.
    pub fn block_align(&self) -> usize {
        self.sample_format.bytes() * self.channels as usize
    }
}

/// Description of an audio track handed to the naming callback when its
/// PCM side file is about to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioProperties {
    pub sample_format: SampleFormat,
    pub bits_per_sample: u32,
    pub channels: u32,
    pub channel_layout: u64,
    pub sample_rate: u32,
    /// Samples decoded so far, including the buffer that triggered creation
    pub num_samples: u64,
    /// Presentation time of the first record, in seconds
    pub first_time: f64,
    /// Time of the packet whose decoding produced the first samples, in
    /// seconds. Differs from `first_time` for decoders with a start delay.
    pub delay_time: f64,
    /// Presentation time of the latest record, in seconds
    pub last_time: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_codes_are_bits() {
        for id in [
            SourceId::Lavf,
            SourceId::Matroska,
            SourceId::HaaliMpeg,
            SourceId::HaaliOgg,
        ] {
            assert!(id.code().is_power_of_two());
            assert_eq!(SourceId::from_code(id.code()), Some(id));
        }
        assert_eq!(SourceId::from_code(3), None);
    }

    #[test]
    fn test_source_set() {
        let set = SourceSet::builtin();
        assert!(set.contains(SourceId::Lavf));
        assert!(set.contains(SourceId::Matroska));
        assert!(!set.contains(SourceId::HaaliOgg));
        assert_eq!(set.with(SourceId::HaaliOgg).bits(), 11);
    }

    #[test]
    fn test_track_type_codes() {
        assert_eq!(TrackType::from_code(TrackType::Audio.code()), Some(TrackType::Audio));
        assert_eq!(TrackType::from_code(9), None);
        assert_eq!(TrackType::Subtitle.to_string(), "subtitle");
    }

    #[test]
    fn test_block_align() {
        let fmt = PcmFormat {
            sample_format: SampleFormat::S32,
            bits_per_sample: 24,
            channels: 6,
            channel_layout: 0x3F,
            sample_rate: 48000,
        };
        assert_eq!(fmt.block_align(), 24);
        assert!(!fmt.sample_format.is_float());
        assert!(SampleFormat::Double.is_float());
    }
}

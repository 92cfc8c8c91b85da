//! Small conversions between FFmpeg types and ours.

use ffmpeg_next as ffmpeg;

use crate::types::{SampleFormat, TrackType};

/// Track type for an FFmpeg media type.
pub fn track_type_from_medium(medium: ffmpeg::media::Type) -> TrackType {
    match medium {
        ffmpeg::media::Type::Video => TrackType::Video,
        ffmpeg::media::Type::Audio => TrackType::Audio,
        ffmpeg::media::Type::Subtitle => TrackType::Subtitle,
        _ => TrackType::Unknown,
    }
}

/// Interleaved equivalent of an FFmpeg sample format.
pub fn sample_format(format: ffmpeg::format::Sample) -> Option<SampleFormat> {
    use ffmpeg::format::Sample;
    match format {
        Sample::U8(_) => Some(SampleFormat::U8),
        Sample::I16(_) => Some(SampleFormat::S16),
        Sample::I32(_) => Some(SampleFormat::S32),
        Sample::I64(_) => Some(SampleFormat::S64),
        Sample::F32(_) => Some(SampleFormat::Float),
        Sample::F64(_) => Some(SampleFormat::Double),
        Sample::None => None,
    }
}

/// Name reported for tracks whose codec has no decoder.
pub const UNKNOWN_CODEC: &str = "Unsupported codec/Unknown codec name";

/// Long name of the decoder for `codec_id`, or [`UNKNOWN_CODEC`].
pub fn codec_name(codec_id: ffmpeg::codec::Id) -> String {
    if codec_id == ffmpeg::codec::Id::None {
        return UNKNOWN_CODEC.to_string();
    }
    match ffmpeg::codec::decoder::find(codec_id) {
        Some(codec) => codec.description().to_string(),
        None => UNKNOWN_CODEC.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_type_from_medium() {
        assert_eq!(track_type_from_medium(ffmpeg::media::Type::Video), TrackType::Video);
        assert_eq!(track_type_from_medium(ffmpeg::media::Type::Audio), TrackType::Audio);
        assert_eq!(track_type_from_medium(ffmpeg::media::Type::Data), TrackType::Unknown);
    }

    #[test]
    fn test_sample_format_mapping() {
        use ffmpeg::format::sample::Type;
        use ffmpeg::format::Sample;
        assert_eq!(sample_format(Sample::F32(Type::Planar)), Some(SampleFormat::Float));
        assert_eq!(sample_format(Sample::I16(Type::Packed)), Some(SampleFormat::S16));
        assert_eq!(sample_format(Sample::None), None);
    }

    #[test]
    fn test_codec_name_unknown() {
        assert_eq!(codec_name(ffmpeg::codec::Id::None), UNKNOWN_CODEC);
    }
}

//! Matroska CodecID to FFmpeg decoder mapping, including the private-data
//! fixups some codec ids need before FFmpeg can decode them.

use ffmpeg_next::codec::Id;

/// Prefix table: a CodecID maps to the first entry it starts with.
const CODEC_TAGS: &[(&str, Id)] = &[
    ("V_MPEG4/ISO/AVC", Id::H264),
    ("V_MPEGH/ISO/HEVC", Id::HEVC),
    ("V_MPEG4/ISO/", Id::MPEG4),
    ("V_MPEG4/MS/V3", Id::MSMPEG4V3),
    ("V_MPEG1", Id::MPEG1VIDEO),
    ("V_MPEG2", Id::MPEG2VIDEO),
    ("V_AV1", Id::AV1),
    ("V_VP8", Id::VP8),
    ("V_VP9", Id::VP9),
    ("V_THEORA", Id::THEORA),
    ("V_DIRAC", Id::DIRAC),
    ("V_PRORES", Id::PRORES),
    ("V_SNOW", Id::SNOW),
    ("V_MJPEG", Id::MJPEG),
    ("V_REAL/RV10", Id::RV10),
    ("V_REAL/RV20", Id::RV20),
    ("V_REAL/RV30", Id::RV30),
    ("V_REAL/RV40", Id::RV40),
    ("V_UNCOMPRESSED", Id::RAWVIDEO),
    ("V_FFV1", Id::FFV1),
    ("A_AAC", Id::AAC),
    ("A_AC3", Id::AC3),
    ("A_EAC3", Id::EAC3),
    ("A_DTS", Id::DTS),
    ("A_TRUEHD", Id::TRUEHD),
    ("A_MLP", Id::MLP),
    ("A_MPEG/L3", Id::MP3),
    ("A_MPEG/L2", Id::MP2),
    ("A_MPEG/L1", Id::MP1),
    ("A_VORBIS", Id::VORBIS),
    ("A_OPUS", Id::OPUS),
    ("A_FLAC", Id::FLAC),
    ("A_ALAC", Id::ALAC),
    ("A_TTA1", Id::TTA),
    ("A_WAVPACK4", Id::WAVPACK),
    ("A_PCM/INT/LIT", Id::PCM_S16LE),
    ("A_PCM/INT/BIG", Id::PCM_S16BE),
    ("A_PCM/FLOAT/IEEE", Id::PCM_F32LE),
    ("A_REAL/14_4", Id::RA_144),
    ("A_REAL/28_8", Id::RA_288),
    ("A_REAL/COOK", Id::COOK),
    ("A_REAL/SIPR", Id::SIPR),
    ("A_REAL/ATRC", Id::ATRAC3),
    ("A_QUICKTIME/QDM2", Id::QDM2),
    ("S_TEXT/UTF8", Id::SUBRIP),
    ("S_TEXT/ASCII", Id::TEXT),
    ("S_TEXT/ASS", Id::ASS),
    ("S_TEXT/SSA", Id::ASS),
    ("S_ASS", Id::ASS),
    ("S_SSA", Id::ASS),
    ("S_VOBSUB", Id::DVD_SUBTITLE),
    ("S_HDMV/PGS", Id::HDMV_PGS_SUBTITLE),
    ("S_DVBSUB", Id::DVB_SUBTITLE),
];

/// Everything needed to open a decoder for a Matroska track.
#[derive(Debug, Clone, PartialEq)]
pub struct CodecSetup {
    pub codec_id: Id,
    pub extradata: Vec<u8>,
    pub bits_per_coded_sample: u32,
    pub block_align: u32,
    /// Overrides the track values when the private data carries them
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
}

fn lookup(codec_id: &str) -> Id {
    CODEC_TAGS
        .iter()
        .find(|(tag, _)| codec_id.starts_with(tag))
        .map(|(_, id)| *id)
        .unwrap_or(Id::None)
}

/// Map a track's CodecID, CodecPrivate and BitDepth to a decoder setup.
pub fn map_codec(codec_id: &str, private: &[u8], bit_depth: u32, sample_rate: u32, channels: u32) -> CodecSetup {
    let mut setup = CodecSetup {
        codec_id: lookup(codec_id),
        extradata: private.to_vec(),
        bits_per_coded_sample: bit_depth,
        block_align: 0,
        sample_rate: None,
        channels: None,
    };

    if codec_id == "V_MS/VFW/FOURCC" {
        map_vfw(private, &mut setup);
    } else if codec_id == "A_MS/ACM" {
        map_acm(private, &mut setup);
    } else if codec_id.starts_with("A_PCM/INT/LIT") {
        setup.codec_id = match bit_depth {
            8 => Id::PCM_U8,
            24 => Id::PCM_S24LE,
            32 => Id::PCM_S32LE,
            _ => Id::PCM_S16LE,
        };
    } else if codec_id.starts_with("A_PCM/INT/BIG") {
        setup.codec_id = match bit_depth {
            8 => Id::PCM_U8,
            24 => Id::PCM_S24BE,
            32 => Id::PCM_S32BE,
            _ => Id::PCM_S16BE,
        };
    } else if codec_id.starts_with("A_PCM/FLOAT/IEEE") && bit_depth == 64 {
        setup.codec_id = Id::PCM_F64LE;
    } else if setup.codec_id == Id::AAC && private.is_empty() {
        setup.extradata = synthesize_aac_config(codec_id, sample_rate, channels);
    }

    let channels = setup.channels.unwrap_or(channels);
    if setup.bits_per_coded_sample > 0 && channels > 0 && is_pcm(setup.codec_id) {
        setup.block_align = setup.bits_per_coded_sample.div_ceil(8) * channels;
    }
    setup
}

fn is_pcm(id: Id) -> bool {
    matches!(
        id,
        Id::PCM_U8
            | Id::PCM_S16LE
            | Id::PCM_S16BE
            | Id::PCM_S24LE
            | Id::PCM_S24BE
            | Id::PCM_S32LE
            | Id::PCM_S32BE
            | Id::PCM_F32LE
            | Id::PCM_F64LE
    )
}

/// `V_MS/VFW/FOURCC`: CodecPrivate is a BITMAPINFOHEADER. The codec is
/// named by biCompression (offset 16); anything past the 40-byte header is
/// codec extradata.
fn map_vfw(private: &[u8], setup: &mut CodecSetup) {
    const HEADER: usize = 40;
    if private.len() < HEADER {
        setup.codec_id = Id::None;
        return;
    }
    let fourcc = [private[16], private[17], private[18], private[19]];
    setup.codec_id = fourcc_codec(&fourcc);
    setup.bits_per_coded_sample = u16::from_le_bytes([private[14], private[15]]) as u32;
    setup.extradata = private[HEADER..].to_vec();
}

fn fourcc_codec(fourcc: &[u8; 4]) -> Id {
    let upper: Vec<u8> = fourcc.iter().map(|c| c.to_ascii_uppercase()).collect();
    match upper.as_slice() {
        b"H264" | b"X264" | b"AVC1" | b"DAVC" => Id::H264,
        b"HEVC" | b"H265" | b"HVC1" => Id::HEVC,
        b"XVID" | b"DIVX" | b"DX50" | b"FMP4" | b"MP4V" | b"3IV2" => Id::MPEG4,
        b"DIV3" | b"MP43" => Id::MSMPEG4V3,
        b"MP42" => Id::MSMPEG4V2,
        b"MJPG" => Id::MJPEG,
        b"WMV1" => Id::WMV1,
        b"WMV2" => Id::WMV2,
        b"WMV3" => Id::WMV3,
        b"WVC1" => Id::VC1,
        b"VP80" => Id::VP8,
        b"VP90" => Id::VP9,
        b"MPG2" => Id::MPEG2VIDEO,
        b"HFYU" => Id::HUFFYUV,
        b"FFV1" => Id::FFV1,
        _ => Id::None,
    }
}

/// `A_MS/ACM`: CodecPrivate is a WAVEFORMATEX. Codec from wFormatTag,
/// extradata after the 18-byte header.
fn map_acm(private: &[u8], setup: &mut CodecSetup) {
    const HEADER: usize = 18;
    if private.len() < 16 {
        setup.codec_id = Id::None;
        return;
    }
    let word = |at: usize| u16::from_le_bytes([private[at], private[at + 1]]) as u32;
    let tag = word(0);
    setup.channels = Some(word(2));
    setup.sample_rate = Some(u32::from_le_bytes([private[4], private[5], private[6], private[7]]));
    setup.block_align = word(12);
    let bits = word(14);
    setup.bits_per_coded_sample = bits;

    setup.codec_id = match tag {
        0x0001 | 0xFFFE => match bits {
            8 => Id::PCM_U8,
            24 => Id::PCM_S24LE,
            32 => Id::PCM_S32LE,
            _ => Id::PCM_S16LE,
        },
        0x0003 => {
            if bits == 64 {
                Id::PCM_F64LE
            } else {
                Id::PCM_F32LE
            }
        }
        0x0050 => Id::MP2,
        0x0055 => Id::MP3,
        0x00FF | 0x1610 => Id::AAC,
        0x0160 => Id::WMAV1,
        0x0161 => Id::WMAV2,
        0x2000 => Id::AC3,
        0x2001 => Id::DTS,
        _ => Id::None,
    };
    setup.extradata = private.get(HEADER..).map(|e| e.to_vec()).unwrap_or_default();
}

const AAC_SAMPLE_RATES: [u32; 12] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000,
];

/// AudioSpecificConfig for legacy `A_AAC/MPEG2/...`, `A_AAC/MPEG4/...` ids
/// that carry the profile in the CodecID instead of CodecPrivate.
fn synthesize_aac_config(codec_id: &str, sample_rate: u32, channels: u32) -> Vec<u8> {
    let profile: u16 = if codec_id.ends_with("/MAIN") {
        1
    } else if codec_id.ends_with("/SSR") {
        3
    } else if codec_id.ends_with("/LTP") {
        4
    } else {
        2
    };
    let rate_index = AAC_SAMPLE_RATES
        .iter()
        .position(|&r| r <= sample_rate)
        .unwrap_or(AAC_SAMPLE_RATES.len() - 1) as u16;
    let config = (profile << 11) | (rate_index << 7) | ((channels.min(7) as u16) << 3);
    config.to_be_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_lookup() {
        assert_eq!(map_codec("V_MPEG4/ISO/AVC", &[1], 0, 0, 0).codec_id, Id::H264);
        assert_eq!(map_codec("V_MPEG4/ISO/ASP", &[], 0, 0, 0).codec_id, Id::MPEG4);
        assert_eq!(map_codec("A_VORBIS", &[2], 0, 44100, 2).codec_id, Id::VORBIS);
        assert_eq!(map_codec("S_TEXT/UTF8", &[], 0, 0, 0).codec_id, Id::SUBRIP);
        assert_eq!(map_codec("X_NOTHING", &[], 0, 0, 0).codec_id, Id::None);
    }

    #[test]
    fn test_pcm_bit_depth_fixups() {
        let little = |bits| map_codec("A_PCM/INT/LIT", &[], bits, 48000, 2).codec_id;
        assert_eq!(little(8), Id::PCM_U8);
        assert_eq!(little(16), Id::PCM_S16LE);
        assert_eq!(little(24), Id::PCM_S24LE);
        assert_eq!(little(32), Id::PCM_S32LE);

        let big = |bits| map_codec("A_PCM/INT/BIG", &[], bits, 48000, 2).codec_id;
        assert_eq!(big(16), Id::PCM_S16BE);
        assert_eq!(big(24), Id::PCM_S24BE);
        assert_eq!(big(32), Id::PCM_S32BE);

        assert_eq!(map_codec("A_PCM/FLOAT/IEEE", &[], 64, 48000, 2).codec_id, Id::PCM_F64LE);

        let setup = map_codec("A_PCM/INT/LIT", &[], 24, 48000, 6);
        assert_eq!(setup.block_align, 18);
        assert_eq!(setup.bits_per_coded_sample, 24);
    }

    #[test]
    fn test_vfw_fourcc() {
        let mut header = vec![0u8; 40];
        header[14] = 24;
        header[16..20].copy_from_slice(b"XVID");
        header.extend_from_slice(&[0xAA, 0xBB]);
        let setup = map_codec("V_MS/VFW/FOURCC", &header, 0, 0, 0);
        assert_eq!(setup.codec_id, Id::MPEG4);
        assert_eq!(setup.extradata, vec![0xAA, 0xBB]);
        assert_eq!(setup.bits_per_coded_sample, 24);

        assert_eq!(map_codec("V_MS/VFW/FOURCC", &[0; 10], 0, 0, 0).codec_id, Id::None);
    }

    #[test]
    fn test_acm_wave_format() {
        let mut wfx = Vec::new();
        wfx.extend_from_slice(&0x2000u16.to_le_bytes());
        wfx.extend_from_slice(&6u16.to_le_bytes());
        wfx.extend_from_slice(&48000u32.to_le_bytes());
        wfx.extend_from_slice(&56000u32.to_le_bytes());
        wfx.extend_from_slice(&1792u16.to_le_bytes());
        wfx.extend_from_slice(&0u16.to_le_bytes());
        wfx.extend_from_slice(&0u16.to_le_bytes());
        let setup = map_codec("A_MS/ACM", &wfx, 0, 0, 0);
        assert_eq!(setup.codec_id, Id::AC3);
        assert_eq!(setup.channels, Some(6));
        assert_eq!(setup.sample_rate, Some(48000));
        assert!(setup.extradata.is_empty());
    }

    #[test]
    fn test_acm_pcm_uses_wave_format_channels() {
        // WAVEFORMATEX says stereo 16-bit PCM, the TrackEntry claims 6 channels
        let mut wfx = Vec::new();
        wfx.extend_from_slice(&0x0001u16.to_le_bytes());
        wfx.extend_from_slice(&2u16.to_le_bytes());
        wfx.extend_from_slice(&44100u32.to_le_bytes());
        wfx.extend_from_slice(&176400u32.to_le_bytes());
        wfx.extend_from_slice(&4u16.to_le_bytes());
        wfx.extend_from_slice(&16u16.to_le_bytes());
        wfx.extend_from_slice(&0u16.to_le_bytes());
        let setup = map_codec("A_MS/ACM", &wfx, 0, 44100, 6);
        assert_eq!(setup.codec_id, Id::PCM_S16LE);
        assert_eq!(setup.channels, Some(2));
        assert_eq!(setup.block_align, 4);
    }

    #[test]
    fn test_legacy_aac_config() {
        let setup = map_codec("A_AAC/MPEG4/LC", &[], 0, 48000, 2);
        assert_eq!(setup.codec_id, Id::AAC);
        // LC, 48 kHz (index 3), stereo
        assert_eq!(setup.extradata, vec![0x11, 0x90]);

        let with_private = map_codec("A_AAC", &[0x12, 0x10], 0, 44100, 2);
        assert_eq!(with_private.extradata, vec![0x12, 0x10]);
    }
}

//! Safe wrappers around FFmpeg FFI calls.
//!
//! All `unsafe` blocks live here with their safety arguments. Callers outside
//! this module never need `unsafe` for routine FFmpeg access.

use ffmpeg_next as ffmpeg;

// ── Demuxer state ───────────────────────────────────────────────────────────

/// Current byte position of the demuxer's IO context.
pub fn input_position(input: &ffmpeg::format::context::Input) -> u64 {
    // SAFETY: `input.as_ptr()` is valid for the lifetime of `input`. `pb` may
    // be null for formats without file IO, which we check.
    unsafe {
        let ctx = input.as_ptr();
        if ctx.is_null() || (*ctx).pb.is_null() {
            return 0;
        }
        (*(*ctx).pb).pos.max(0) as u64
    }
}

// ── Codec parameters ────────────────────────────────────────────────────────

/// Build audio codec parameters for a stream that FFmpeg did not demux
/// itself (native Matroska, platform parsers).
///
/// `extradata` is copied into an `av_malloc`ed buffer with the padding
/// FFmpeg's bitstream readers require; the parameters own it afterwards.
pub fn audio_parameters(
    codec_id: ffmpeg::codec::Id,
    sample_rate: u32,
    channels: u32,
    bits_per_coded_sample: u32,
    block_align: u32,
    extradata: &[u8],
) -> ffmpeg::codec::Parameters {
    let mut params = ffmpeg::codec::Parameters::new();
    // SAFETY: `params.as_mut_ptr()` is a freshly allocated AVCodecParameters
    // that we exclusively own. The extradata buffer is allocated with
    // `av_mallocz` so `avcodec_parameters_free` releases it correctly.
    unsafe {
        let p = params.as_mut_ptr();
        (*p).codec_type = ffmpeg::ffi::AVMediaType::AVMEDIA_TYPE_AUDIO;
        (*p).codec_id = codec_id.into();
        (*p).sample_rate = sample_rate as i32;
        (*p).bits_per_coded_sample = bits_per_coded_sample as i32;
        (*p).block_align = block_align as i32;
        if channels > 0 {
            ffmpeg::ffi::av_channel_layout_default(&mut (*p).ch_layout, channels as i32);
        }
        if !extradata.is_empty() {
            let padded = extradata.len() + ffmpeg::ffi::AV_INPUT_BUFFER_PADDING_SIZE as usize;
            let buf = ffmpeg::ffi::av_mallocz(padded) as *mut u8;
            if !buf.is_null() {
                std::ptr::copy_nonoverlapping(extradata.as_ptr(), buf, extradata.len());
                (*p).extradata = buf;
                (*p).extradata_size = extradata.len() as i32;
            }
        }
    }
    params
}

/// Read `bits_per_raw_sample` from an opened decoder, 0 when unset.
pub fn decoder_bits_per_raw_sample(decoder: &ffmpeg::decoder::Audio) -> u32 {
    // SAFETY: the decoder context pointer is valid while `decoder` lives;
    // the field is a plain int.
    unsafe { (*decoder.as_ptr()).bits_per_raw_sample.max(0) as u32 }
}

/// Returns `true` if a decoder is registered for `codec_id`.
pub fn decoder_exists(codec_id: ffmpeg::codec::Id) -> bool {
    // SAFETY: `avcodec_find_decoder` reads a global read-only registry. The
    // pointer is only compared against null.
    let ptr = unsafe { ffmpeg::ffi::avcodec_find_decoder(codec_id.into()) };
    !ptr.is_null()
}

// ── Decoded audio frames ────────────────────────────────────────────────────

/// Channel count of a decoded frame.
pub fn frame_channels(frame: &ffmpeg::util::frame::Audio) -> usize {
    // SAFETY: `frame.as_ptr()` is valid for the lifetime of `frame`.
    unsafe { (*frame.as_ptr()).ch_layout.nb_channels.max(0) as usize }
}

/// WAVE speaker mask of a decoded frame, 0 for non-native channel orders.
pub fn frame_channel_mask(frame: &ffmpeg::util::frame::Audio) -> u64 {
    // SAFETY: reading the union is only done when `order` says the `mask`
    // member is the active one.
    unsafe {
        let layout = &(*frame.as_ptr()).ch_layout;
        if layout.order == ffmpeg::ffi::AVChannelOrder::AV_CHANNEL_ORDER_NATIVE {
            layout.u.mask
        } else {
            0
        }
    }
}

/// Extract an audio plane slice from an `AVFrame`.
///
/// Works around `ffmpeg-next`'s `Audio::data(index)`, which stops counting
/// planes if `linesize[1] == 0`. Planar frames usually only populate
/// `linesize[0]` for every plane.
pub fn audio_plane_data(frame: &ffmpeg::util::frame::Audio, index: usize) -> &[u8] {
    // SAFETY: plane pointers come from `extended_data`, which holds one entry
    // per channel for planar formats and one for packed formats. Each plane
    // is at least `linesize[0]` bytes long.
    unsafe {
        let f = frame.as_ptr();
        let planes = if frame.format().is_planar() {
            (*f).ch_layout.nb_channels.max(0) as usize
        } else {
            1
        };
        if index >= planes {
            return &[];
        }

        let ptrs = (*f).extended_data;
        if ptrs.is_null() {
            return &[];
        }
        let plane_ptr = *ptrs.add(index);
        if plane_ptr.is_null() {
            return &[];
        }

        let size = (*f).linesize[0].max(0) as usize;
        std::slice::from_raw_parts(plane_ptr, size)
    }
}

/// Append the samples of `frame` to `out` in interleaved order.
///
/// Returns the number of bytes appended.
pub fn interleave_frame(frame: &ffmpeg::util::frame::Audio, out: &mut Vec<u8>) -> usize {
    let samples = frame.samples();
    let channels = frame_channels(frame);
    let width = frame.format().bytes();
    let before = out.len();

    if !frame.format().is_planar() {
        let plane = audio_plane_data(frame, 0);
        let wanted = (samples * channels * width).min(plane.len());
        out.extend_from_slice(&plane[..wanted]);
    } else {
        let planes: Vec<&[u8]> = (0..channels).map(|c| audio_plane_data(frame, c)).collect();
        let usable = planes
            .iter()
            .map(|p| p.len() / width.max(1))
            .min()
            .unwrap_or(0)
            .min(samples);
        out.reserve(usable * channels * width);
        for s in 0..usable {
            for plane in &planes {
                out.extend_from_slice(&plane[s * width..(s + 1) * width]);
            }
        }
    }

    out.len() - before
}

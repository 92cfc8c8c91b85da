//! Audio decoders used during indexing
//!
//! [`AudioDecode`] is what the extraction sink talks to. The FFmpeg-backed
//! implementation wraps an `AVCodecContext` and turns every packet into
//! interleaved PCM bytes.

use ffmpeg_next as ffmpeg;

use crate::error::{FfmpegError, IndexError, Result};
use crate::ffmpeg_utils::{helpers, utils};
use crate::types::PcmFormat;

/// Incremental audio decoder.
pub trait AudioDecode {
    /// Decode from the front of `data`, appending interleaved PCM to `out`.
    ///
    /// Returns how many input bytes were consumed. Decoders that always take
    /// whole packets return `data.len()`.
    fn decode(&mut self, data: &[u8], out: &mut Vec<u8>) -> Result<usize>;

    /// Drain samples the decoder is still holding at end of stream.
    fn flush(&mut self, _out: &mut Vec<u8>) -> Result<()> {
        Ok(())
    }

    /// Format of the PCM produced so far, `None` before the first output.
    fn format(&self) -> Option<PcmFormat>;
}

/// Real audio decoder backed by a FFmpeg codec context
pub struct FfmpegAudioDecoder {
    decoder: ffmpeg::decoder::Audio,
    /// Track index in the source file
    track: usize,
    format: Option<PcmFormat>,
}

impl FfmpegAudioDecoder {
    /// Open a decoder for a stream demuxed by FFmpeg itself.
    pub fn from_stream(stream: &ffmpeg::format::stream::Stream) -> Result<Self> {
        Self::from_parameters(stream.parameters(), stream.index())
    }

    /// Open a decoder from parameters assembled by a native demuxer.
    pub fn from_parameters(params: ffmpeg::codec::Parameters, track: usize) -> Result<Self> {
        let codec_id = params.id();
        if !helpers::decoder_exists(codec_id) {
            return Err(IndexError::Ffmpeg(FfmpegError::DecoderNotFound(format!(
                "{:?} (track {})",
                codec_id, track
            ))));
        }

        let context = ffmpeg::codec::Context::from_parameters(params).map_err(|e| {
            IndexError::Ffmpeg(FfmpegError::DecoderCreate(format!(
                "Failed to create codec context for track {}: {}",
                track, e
            )))
        })?;

        let decoder = context.decoder().audio().map_err(|e| {
            IndexError::Ffmpeg(FfmpegError::DecoderCreate(format!(
                "Failed to open audio decoder for track {}: {}",
                track, e
            )))
        })?;

        tracing::debug!("Opened {:?} decoder for track {}", codec_id, track);

        Ok(Self {
            decoder,
            track,
            format: None,
        })
    }

    /// Pull every frame currently available out of the decoder.
    fn drain(&mut self, out: &mut Vec<u8>) -> Result<()> {
        loop {
            let mut frame = ffmpeg::util::frame::Audio::empty();
            match self.decoder.receive_frame(&mut frame) {
                Ok(()) => {
                    self.update_format(&frame)?;
                    helpers::interleave_frame(&frame, out);
                }
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => {
                    return Ok(())
                }
                Err(ffmpeg::Error::Eof) => return Ok(()),
                Err(e) => return Err(IndexError::decode(self.track, e)),
            }
        }
    }

    fn update_format(&mut self, frame: &ffmpeg::util::frame::Audio) -> Result<()> {
        let sample_format = utils::sample_format(frame.format()).ok_or_else(|| {
            IndexError::decode(self.track, "decoder produced an unknown sample format")
        })?;
        let width_bits = sample_format.bytes() as u32 * 8;
        let raw_bits = helpers::decoder_bits_per_raw_sample(&self.decoder);
        let bits_per_sample = if raw_bits > 0 && raw_bits <= width_bits {
            raw_bits
        } else {
            width_bits
        };

        self.format = Some(PcmFormat {
            sample_format,
            bits_per_sample,
            channels: helpers::frame_channels(frame) as u32,
            channel_layout: helpers::frame_channel_mask(frame),
            sample_rate: frame.rate(),
        });
        Ok(())
    }
}

impl AudioDecode for FfmpegAudioDecoder {
    fn decode(&mut self, data: &[u8], out: &mut Vec<u8>) -> Result<usize> {
        // an empty packet would be taken as a flush request
        if data.is_empty() {
            return Ok(0);
        }
        let packet = ffmpeg::codec::packet::Packet::copy(data);
        self.decoder
            .send_packet(&packet)
            .map_err(|e| IndexError::decode(self.track, e))?;
        self.drain(out)?;
        Ok(data.len())
    }

    fn flush(&mut self, out: &mut Vec<u8>) -> Result<()> {
        match self.decoder.send_eof() {
            Ok(()) | Err(ffmpeg::Error::Eof) => {}
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => {}
            Err(e) => return Err(IndexError::decode(self.track, e)),
        }
        self.drain(out)
    }

    fn format(&self) -> Option<PcmFormat> {
        self.format
    }
}

//! Per-track decode state for one indexing scan.

use crate::error::{FfmpegError, IndexError, Result};
use crate::types::PcmFormat;

use super::decoder::AudioDecode;
use super::wave64::Wave64Writer;

/// Opens the side-file writer once the PCM format is known. Receives the
/// format and the running sample count including the current buffer.
pub type WriterFactory<'a> = dyn FnMut(&PcmFormat, u64) -> Result<Wave64Writer> + 'a;

/// Decoder, running sample counter and (lazily created) PCM writer of one
/// audio track.
pub struct AudioExtractionContext {
    track: usize,
    decoder: Box<dyn AudioDecode>,
    sample_count: u64,
    dump: bool,
    writer: Option<Wave64Writer>,
    format: Option<PcmFormat>,
    scratch: Vec<u8>,
}

impl AudioExtractionContext {
    pub fn new(track: usize, decoder: Box<dyn AudioDecode>, dump: bool) -> Self {
        Self {
            track,
            decoder,
            sample_count: 0,
            dump,
            writer: None,
            format: None,
            scratch: Vec::new(),
        }
    }

    pub fn track(&self) -> usize {
        self.track
    }

    /// Samples decoded so far.
    pub fn current_sample(&self) -> u64 {
        self.sample_count
    }

    pub fn has_writer(&self) -> bool {
        self.writer.is_some()
    }

    /// Decode one container packet completely.
    ///
    /// Decoder failures come back as [`IndexError::Decode`] with the sample
    /// counter reflecting whatever decoded before the failure. A change of
    /// output format mid-stream is reported as a non-recoverable error.
    pub fn decode_packet(&mut self, data: &[u8], open_writer: &mut WriterFactory<'_>) -> Result<()> {
        let mut remaining = data;
        while !remaining.is_empty() {
            self.scratch.clear();
            let used = self.decoder.decode(remaining, &mut self.scratch)?;
            self.consume(open_writer)?;
            if used == 0 {
                break;
            }
            remaining = &remaining[used.min(remaining.len())..];
        }
        Ok(())
    }

    /// Drain the decoder at end of stream. Returns the samples it produced.
    pub fn flush(&mut self, open_writer: &mut WriterFactory<'_>) -> Result<u64> {
        let before = self.sample_count;
        self.scratch.clear();
        self.decoder.flush(&mut self.scratch)?;
        self.consume(open_writer)?;
        Ok(self.sample_count - before)
    }

    /// Finalize the side file, if one was opened.
    pub fn finish(mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.finish()?;
        }
        Ok(())
    }

    fn consume(&mut self, open_writer: &mut WriterFactory<'_>) -> Result<()> {
        if self.scratch.is_empty() {
            return Ok(());
        }
        let format = self
            .decoder
            .format()
            .ok_or_else(|| IndexError::decode(self.track, "decoder produced samples without a format"))?;

        match self.format {
            Some(known) if known != format => {
                return Err(IndexError::Ffmpeg(FfmpegError::DecodePacket(format!(
                    "audio format change detected on track {}",
                    self.track
                ))));
            }
            Some(_) => {}
            None => self.format = Some(format),
        }

        let block_align = format.block_align();
        if block_align == 0 {
            return Err(IndexError::decode(self.track, "decoder reported zero channels"));
        }
        self.sample_count += (self.scratch.len() / block_align) as u64;

        if self.dump {
            if self.writer.is_none() {
                self.writer = Some(open_writer(&format, self.sample_count)?);
            }
            if let Some(writer) = self.writer.as_mut() {
                writer.write_samples(&self.scratch)?;
            }
        }
        Ok(())
    }
}

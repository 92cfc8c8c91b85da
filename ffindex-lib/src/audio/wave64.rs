//! Sony Wave64 writer
//!
//! W64 is RIFF with 16-byte GUID chunk ids and 64-bit chunk sizes, so PCM
//! side files of long tracks are not capped at 4 GiB. Sizes are unknown
//! while samples stream in; they are patched when the writer is finished
//! or dropped.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::error::{IndexError, Result};
use crate::types::PcmFormat;

const GUID_RIFF: [u8; 16] = [
    0x72, 0x69, 0x66, 0x66, 0x2E, 0x91, 0xCF, 0x11, 0xA5, 0xD6, 0x28, 0xDB, 0x04, 0xC1, 0x00, 0x00,
];
const GUID_WAVE: [u8; 16] = [
    0x77, 0x61, 0x76, 0x65, 0xF3, 0xAC, 0xD3, 0x11, 0x8C, 0xD1, 0x00, 0xC0, 0x4F, 0x8E, 0xDB, 0x8A,
];
const GUID_FMT: [u8; 16] = [
    0x66, 0x6D, 0x74, 0x20, 0xF3, 0xAC, 0xD3, 0x11, 0x8C, 0xD1, 0x00, 0xC0, 0x4F, 0x8E, 0xDB, 0x8A,
];
const GUID_DATA: [u8; 16] = [
    0x64, 0x61, 0x74, 0x61, 0xF3, 0xAC, 0xD3, 0x11, 0x8C, 0xD1, 0x00, 0xC0, 0x4F, 0x8E, 0xDB, 0x8A,
];
const SUBFORMAT_PCM: [u8; 16] = [
    0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71,
];
const SUBFORMAT_FLOAT: [u8; 16] = [
    0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71,
];

const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;
/// Size of WAVEFORMATEXTENSIBLE including cbSize
const FORMAT_SIZE: u64 = 40;
/// GUID plus 64-bit size
const CHUNK_HEADER: u64 = 24;

const RIFF_SIZE_OFFSET: u64 = 16;
const DATA_SIZE_OFFSET: u64 = 16 + 8 + 16 + CHUNK_HEADER + FORMAT_SIZE + 16;
/// Offset of the first sample byte
pub const HEADER_SIZE: u64 = DATA_SIZE_OFFSET + 8;

/// Speaker mask used when the decoder did not report one.
fn default_channel_mask(channels: u32) -> u32 {
    match channels {
        1 => 0x4,
        2 => 0x3,
        3 => 0x7,
        4 => 0x33,
        5 => 0x37,
        6 => 0x3F,
        7 => 0x13F,
        8 => 0x63F,
        _ => 0,
    }
}

/// Streaming W64 writer for interleaved PCM.
pub struct Wave64Writer<W: Write + Seek = BufWriter<File>> {
    out: W,
    format: PcmFormat,
    data_bytes: u64,
    finished: bool,
}

impl Wave64Writer<BufWriter<File>> {
    /// Create `path` and write a provisional header.
    pub fn create<P: AsRef<Path>>(path: P, format: PcmFormat) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| {
            IndexError::InvalidArgument(format!(
                "Failed to open '{}' for writing: {}",
                path.display(),
                e
            ))
        })?;
        tracing::info!(
            "Writing {} Hz {} channel audio to {:?}",
            format.sample_rate,
            format.channels,
            path
        );
        Self::new(BufWriter::new(file), format)
    }
}

impl<W: Write + Seek> Wave64Writer<W> {
    pub fn new(mut out: W, format: PcmFormat) -> Result<Self> {
        if format.channels == 0 || format.sample_rate == 0 {
            return Err(IndexError::InvalidArgument(
                "audio format has no channels or no sample rate".to_string(),
            ));
        }
        write_header(&mut out, &format)?;
        Ok(Self {
            out,
            format,
            data_bytes: 0,
            finished: false,
        })
    }

    pub fn format(&self) -> &PcmFormat {
        &self.format
    }

    /// Bytes of sample data written so far.
    pub fn data_bytes(&self) -> u64 {
        self.data_bytes
    }

    pub fn write_samples(&mut self, data: &[u8]) -> Result<()> {
        self.out.write_all(data)?;
        self.data_bytes += data.len() as u64;
        Ok(())
    }

    /// Pad the data chunk and patch the chunk sizes. Calling it again is a
    /// no-op.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        let padding = (8 - self.data_bytes % 8) % 8;
        self.out.write_all(&[0u8; 8][..padding as usize])?;
        let end = HEADER_SIZE + self.data_bytes + padding;

        self.out.seek(SeekFrom::Start(RIFF_SIZE_OFFSET))?;
        self.out.write_u64::<LittleEndian>(end)?;
        self.out.seek(SeekFrom::Start(DATA_SIZE_OFFSET))?;
        self.out.write_u64::<LittleEndian>(CHUNK_HEADER + self.data_bytes)?;
        self.out.seek(SeekFrom::Start(end))?;
        self.out.flush()?;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }
}

impl<W: Write + Seek> Drop for Wave64Writer<W> {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            tracing::warn!("Failed to finalize Wave64 file: {}", e);
        }
    }
}

fn write_header<W: Write>(out: &mut W, format: &PcmFormat) -> Result<()> {
    let container_bits = format.sample_format.bytes() as u16 * 8;
    let block_align = format.block_align() as u16;
    let mask = match format.channel_layout {
        0 => default_channel_mask(format.channels),
        m => m as u32,
    };

    out.write_all(&GUID_RIFF)?;
    out.write_u64::<LittleEndian>(HEADER_SIZE)?;
    out.write_all(&GUID_WAVE)?;

    out.write_all(&GUID_FMT)?;
    out.write_u64::<LittleEndian>(CHUNK_HEADER + FORMAT_SIZE)?;
    out.write_u16::<LittleEndian>(WAVE_FORMAT_EXTENSIBLE)?;
    out.write_u16::<LittleEndian>(format.channels as u16)?;
    out.write_u32::<LittleEndian>(format.sample_rate)?;
    out.write_u32::<LittleEndian>(format.sample_rate * block_align as u32)?;
    out.write_u16::<LittleEndian>(block_align)?;
    out.write_u16::<LittleEndian>(container_bits)?;
    out.write_u16::<LittleEndian>(22)?;
    out.write_u16::<LittleEndian>(format.bits_per_sample as u16)?;
    out.write_u32::<LittleEndian>(mask)?;
    if format.sample_format.is_float() {
        out.write_all(&SUBFORMAT_FLOAT)?;
    } else {
        out.write_all(&SUBFORMAT_PCM)?;
    }

    out.write_all(&GUID_DATA)?;
    out.write_u64::<LittleEndian>(CHUNK_HEADER)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SampleFormat;
    use std::io::Cursor;

    fn stereo_s16() -> PcmFormat {
        PcmFormat {
            sample_format: SampleFormat::S16,
            bits_per_sample: 16,
            channels: 2,
            channel_layout: 0,
            sample_rate: 44100,
        }
    }

    fn u64_at(buf: &[u8], pos: usize) -> u64 {
        u64::from_le_bytes(buf[pos..pos + 8].try_into().unwrap())
    }

    #[test]
    fn test_header_and_sizes() {
        let mut writer = Wave64Writer::new(Cursor::new(Vec::new()), stereo_s16()).unwrap();
        writer.write_samples(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]).unwrap();
        writer.finish().unwrap();
        let buf = writer.get_ref().get_ref().clone();

        assert_eq!(HEADER_SIZE, 128);
        assert_eq!(&buf[0..16], &GUID_RIFF);
        assert_eq!(&buf[24..40], &GUID_WAVE);
        assert_eq!(&buf[40..56], &GUID_FMT);
        assert_eq!(u64_at(&buf, 56), 64);
        assert_eq!(&buf[104..120], &GUID_DATA);

        // 12 data bytes padded to 16
        assert_eq!(buf.len(), 128 + 16);
        assert_eq!(u64_at(&buf, 16), 144);
        assert_eq!(u64_at(&buf, 120), 24 + 12);
        assert_eq!(&buf[128..140], &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn test_format_fields() {
        let format = PcmFormat {
            sample_format: SampleFormat::Float,
            bits_per_sample: 32,
            channels: 6,
            channel_layout: 0x60F,
            sample_rate: 48000,
        };
        let mut writer = Wave64Writer::new(Cursor::new(Vec::new()), format).unwrap();
        writer.finish().unwrap();
        let buf = writer.get_ref().get_ref();

        let fmt = &buf[64..104];
        assert_eq!(u16::from_le_bytes([fmt[0], fmt[1]]), WAVE_FORMAT_EXTENSIBLE);
        assert_eq!(u16::from_le_bytes([fmt[2], fmt[3]]), 6);
        assert_eq!(u32::from_le_bytes(fmt[4..8].try_into().unwrap()), 48000);
        assert_eq!(u32::from_le_bytes(fmt[8..12].try_into().unwrap()), 48000 * 24);
        assert_eq!(u16::from_le_bytes([fmt[12], fmt[13]]), 24);
        assert_eq!(u16::from_le_bytes([fmt[14], fmt[15]]), 32);
        assert_eq!(u32::from_le_bytes(fmt[20..24].try_into().unwrap()), 0x60F);
        assert_eq!(&fmt[24..40], &SUBFORMAT_FLOAT);
    }

    #[test]
    fn test_drop_finalizes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.w64");
        {
            let mut writer = Wave64Writer::create(&path, stereo_s16()).unwrap();
            writer.write_samples(&[0u8; 32]).unwrap();
        }
        let buf = std::fs::read(&path).unwrap();
        assert_eq!(buf.len(), 160);
        assert_eq!(u64_at(&buf, 16), 160);
        assert_eq!(u64_at(&buf, 120), 24 + 32);
    }

    #[test]
    fn test_rejects_empty_format() {
        let mut format = stereo_s16();
        format.channels = 0;
        assert!(Wave64Writer::new(Cursor::new(Vec::new()), format).is_err());
    }
}

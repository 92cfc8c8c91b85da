//! Per-track content decoding (ContentEncodings).
//!
//! Matroska can store frames zlib or LZO1X compressed, or with a constant
//! prefix stripped ("header stripping"). Frames must be restored before
//! they reach a decoder; record sizes keep the stored size.

use std::io::Read;

use crate::error::{IndexError, MatroskaError, Result};

pub const COMP_ZLIB: u64 = 0;
pub const COMP_BZLIB: u64 = 1;
pub const COMP_LZO: u64 = 2;
pub const COMP_HEADER_STRIP: u64 = 3;

/// Scope bit: applies to frame data
pub const SCOPE_FRAMES: u64 = 1;
/// Scope bit: applies to CodecPrivate
pub const SCOPE_PRIVATE: u64 = 2;

/// Upper bound on a single decompressed frame.
const MAX_OUTPUT: usize = 256 * 1024 * 1024;

/// One ContentEncoding entry of a track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentEncoding {
    pub order: u64,
    pub scope: u64,
    /// 0 = compression, 1 = encryption
    pub encoding_type: u64,
    pub comp_algo: u64,
    pub comp_settings: Vec<u8>,
}

impl Default for ContentEncoding {
    fn default() -> Self {
        Self {
            order: 0,
            scope: SCOPE_FRAMES,
            encoding_type: 0,
            comp_algo: COMP_ZLIB,
            comp_settings: Vec::new(),
        }
    }
}

/// Frame decompressor for one track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decompressor {
    Zlib,
    Lzo,
    HeaderStrip(Vec<u8>),
}

impl Decompressor {
    /// Decompressor for the encodings whose scope includes `scope`, `None`
    /// when data in that scope is stored plain.
    pub fn for_scope(encodings: &[ContentEncoding], scope: u64) -> Result<Option<Self>> {
        let active: Vec<&ContentEncoding> =
            encodings.iter().filter(|e| e.scope & scope != 0).collect();
        let encoding = match active.as_slice() {
            [] => return Ok(None),
            [one] => *one,
            _ => {
                return Err(IndexError::Unsupported(
                    "multiple content encodings on one track".to_string(),
                ))
            }
        };

        if encoding.encoding_type != 0 {
            return Err(IndexError::Unsupported("encrypted tracks".to_string()));
        }
        match encoding.comp_algo {
            COMP_ZLIB => Ok(Some(Decompressor::Zlib)),
            COMP_LZO => Ok(Some(Decompressor::Lzo)),
            COMP_HEADER_STRIP => Ok(Some(Decompressor::HeaderStrip(
                encoding.comp_settings.clone(),
            ))),
            COMP_BZLIB => Err(IndexError::Unsupported("bzlib compressed tracks".to_string())),
            other => Err(IndexError::Unsupported(format!(
                "compression algorithm {}",
                other
            ))),
        }
    }

    /// Restore `data` into `out` (cleared first).
    pub fn decompress(&self, data: &[u8], out: &mut Vec<u8>) -> Result<()> {
        out.clear();
        match self {
            Decompressor::HeaderStrip(prefix) => {
                out.reserve(prefix.len() + data.len());
                out.extend_from_slice(prefix);
                out.extend_from_slice(data);
            }
            Decompressor::Zlib => {
                flate2::read::ZlibDecoder::new(data)
                    .take(MAX_OUTPUT as u64)
                    .read_to_end(out)
                    .map_err(|e| MatroskaError::Decompress(format!("zlib: {}", e)))?;
            }
            Decompressor::Lzo => lzo1x_decompress(data, out)?,
        }
        Ok(())
    }
}

fn corrupt(reason: &str) -> IndexError {
    MatroskaError::Decompress(format!("lzo: {}", reason)).into()
}

struct LzoInput<'a> {
    data: &'a [u8],
    pos: usize,
}

impl LzoInput<'_> {
    fn byte(&mut self) -> Result<usize> {
        let b = *self.data.get(self.pos).ok_or_else(|| corrupt("input overrun"))?;
        self.pos += 1;
        Ok(b as usize)
    }

    /// Run length with the zero-byte extension scheme.
    fn length(&mut self, x: usize, mask: usize) -> Result<usize> {
        let mut count = x & mask;
        if count == 0 {
            loop {
                let b = self.byte()?;
                if b != 0 {
                    count += mask + b;
                    break;
                }
                count += 255;
                if count > MAX_OUTPUT {
                    return Err(corrupt("run length too large"));
                }
            }
        }
        Ok(count)
    }

    fn literals(&mut self, out: &mut Vec<u8>, count: usize) -> Result<()> {
        let end = self.pos + count;
        let bytes = self.data.get(self.pos..end).ok_or_else(|| corrupt("input overrun"))?;
        if out.len() + count > MAX_OUTPUT {
            return Err(corrupt("output too large"));
        }
        out.extend_from_slice(bytes);
        self.pos = end;
        Ok(())
    }
}

fn copy_match(out: &mut Vec<u8>, distance: usize, count: usize) -> Result<()> {
    if distance == 0 || distance > out.len() {
        return Err(corrupt("back reference before start of output"));
    }
    if out.len() + count > MAX_OUTPUT {
        return Err(corrupt("output too large"));
    }
    // byte-wise: source and destination may overlap
    let start = out.len() - distance;
    for i in 0..count {
        let b = out[start + i];
        out.push(b);
    }
    Ok(())
}

/// LZO1X decompression into a growing buffer.
pub fn lzo1x_decompress(data: &[u8], out: &mut Vec<u8>) -> Result<()> {
    let mut input = LzoInput { data, pos: 0 };
    let mut state = 0usize;

    let mut x = input.byte()?;
    if x > 17 {
        input.literals(out, x - 17)?;
        x = input.byte()?;
        if x < 16 {
            return Err(corrupt("invalid first instruction"));
        }
    }

    loop {
        let count;
        let distance;
        if x > 15 {
            if x > 63 {
                count = (x >> 5) - 1;
                distance = (input.byte()? << 3) + ((x >> 2) & 7) + 1;
            } else if x > 31 {
                count = input.length(x, 31)?;
                x = input.byte()?;
                distance = (input.byte()? << 6) + (x >> 2) + 1;
            } else {
                count = input.length(x, 7)?;
                let mut d = (1 << 14) + ((x & 8) << 11);
                x = input.byte()?;
                d += (input.byte()? << 6) + (x >> 2);
                if d == 1 << 14 {
                    // end of stream marker
                    return if count == 1 {
                        Ok(())
                    } else {
                        Err(corrupt("bad end marker"))
                    };
                }
                distance = d;
            }
        } else if state == 0 {
            let run = input.length(x, 15)?;
            input.literals(out, run + 3)?;
            x = input.byte()?;
            if x > 15 {
                continue;
            }
            count = 1;
            distance = (1 << 11) + (input.byte()? << 2) + (x >> 2) + 1;
        } else {
            count = 0;
            distance = (input.byte()? << 2) + (x >> 2) + 1;
        }

        copy_match(out, distance, count + 2)?;
        state = x & 3;
        input.literals(out, state)?;
        x = input.byte()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn encoding(algo: u64, settings: &[u8]) -> ContentEncoding {
        ContentEncoding {
            comp_algo: algo,
            comp_settings: settings.to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn test_header_strip() {
        let d = Decompressor::for_scope(&[encoding(COMP_HEADER_STRIP, &[0xFF, 0xFB])], SCOPE_FRAMES)
            .unwrap()
            .unwrap();
        let mut out = Vec::new();
        d.decompress(&[0x90, 0x64], &mut out).unwrap();
        assert_eq!(out, vec![0xFF, 0xFB, 0x90, 0x64]);
    }

    #[test]
    fn test_zlib() {
        let mut enc = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(b"matroska frame payload").unwrap();
        let compressed = enc.finish().unwrap();

        let mut out = Vec::new();
        Decompressor::Zlib.decompress(&compressed, &mut out).unwrap();
        assert_eq!(out, b"matroska frame payload");

        assert!(Decompressor::Zlib.decompress(b"garbage", &mut out).is_err());
    }

    #[test]
    fn test_lzo_literals_only() {
        let mut out = Vec::new();
        lzo1x_decompress(&[17 + 5, b'h', b'e', b'l', b'l', b'o', 0x11, 0, 0], &mut out).unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn test_lzo_with_match() {
        // "abc" literal, then copy 6 bytes from distance 3
        let stream = [20, b'a', b'b', b'c', 0xA8, 0x00, 0x11, 0x00, 0x00];
        let mut out = Vec::new();
        lzo1x_decompress(&stream, &mut out).unwrap();
        assert_eq!(out, b"abcabcabc");
    }

    #[test]
    fn test_lzo_truncated() {
        let mut out = Vec::new();
        assert!(lzo1x_decompress(&[17 + 5, b'h', b'e'], &mut out).is_err());
        assert!(lzo1x_decompress(&[20, b'a', b'b', b'c', 0xA8, 0x07], &mut out).is_err());
    }

    #[test]
    fn test_scope_selection() {
        let mut private_only = encoding(COMP_ZLIB, &[]);
        private_only.scope = SCOPE_PRIVATE;
        assert_eq!(Decompressor::for_scope(&[private_only.clone()], SCOPE_FRAMES).unwrap(), None);
        assert_eq!(
            Decompressor::for_scope(&[private_only], SCOPE_PRIVATE).unwrap(),
            Some(Decompressor::Zlib)
        );
        assert_eq!(Decompressor::for_scope(&[], SCOPE_FRAMES).unwrap(), None);
    }

    #[test]
    fn test_unsupported_encodings() {
        let mut encrypted = encoding(COMP_ZLIB, &[]);
        encrypted.encoding_type = 1;
        assert!(matches!(
            Decompressor::for_scope(&[encrypted], SCOPE_FRAMES),
            Err(IndexError::Unsupported(_))
        ));
        assert!(Decompressor::for_scope(&[encoding(COMP_BZLIB, &[])], SCOPE_FRAMES).is_err());
        let two = [encoding(COMP_ZLIB, &[]), encoding(COMP_LZO, &[])];
        assert!(Decompressor::for_scope(&two, SCOPE_FRAMES).is_err());
    }
}

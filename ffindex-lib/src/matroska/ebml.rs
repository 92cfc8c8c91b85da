//! EBML primitives.
//!
//! Variable-length integers use a leading-1 length marker: `1xxxxxxx` is
//! one byte, `01xxxxxx xxxxxxxx` two bytes, and so on up to eight. IDs keep
//! the marker bit, sizes drop it, and an all-ones size means "unknown".
//!
//! Headers are read from a stream; small master elements are read whole and
//! walked in memory with [`Children`].

use std::io::{self, Read, Seek, SeekFrom};

use crate::error::{MatroskaError, Result};

/// Element header found in a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHeader {
    pub id: u32,
    /// `None` for the unknown-size sentinel
    pub size: Option<u64>,
    /// Offset of the first ID byte
    pub offset: u64,
    pub header_len: u64,
}

impl ElementHeader {
    pub fn data_offset(&self) -> u64 {
        self.offset + self.header_len
    }

    pub fn end(&self) -> Option<u64> {
        self.size.map(|s| self.data_offset() + s)
    }
}

/// Encoded length of a vint from its first byte.
pub fn vint_width(first: u8) -> Option<usize> {
    match first.leading_zeros() {
        n @ 0..=7 => Some(n as usize + 1),
        _ => None,
    }
}

/// Decode a vint from the front of `buf`. Returns the value (marker kept
/// when `keep_marker`) and its encoded length.
pub fn parse_vint(buf: &[u8], keep_marker: bool) -> Option<(u64, usize)> {
    let first = *buf.first()?;
    let width = vint_width(first)?;
    let bytes = buf.get(..width)?;

    let mut value = if keep_marker {
        first as u64
    } else {
        (first as u64) & (0xFF >> width)
    };
    for &b in &bytes[1..] {
        value = (value << 8) | b as u64;
    }
    Some((value, width))
}

/// Signed vint as used by EBML lacing: the unsigned value minus the bias
/// `2^(7*width - 1) - 1`.
pub fn parse_signed_vint(buf: &[u8]) -> Option<(i64, usize)> {
    let (value, width) = parse_vint(buf, false)?;
    let bias = (1i64 << (7 * width - 1)) - 1;
    Some((value as i64 - bias, width))
}

fn is_unknown_size(value: u64, width: usize) -> bool {
    value == (1u64 << (7 * width)) - 1
}

/// Read the next element header. Returns `Ok(None)` at a clean end of file.
pub fn read_header<R: Read + Seek>(reader: &mut R) -> Result<Option<ElementHeader>> {
    let offset = reader.stream_position()?;

    let mut buf = [0u8; 16];
    if reader.read(&mut buf[..1])? == 0 {
        return Ok(None);
    }
    let id_width = vint_width(buf[0]).filter(|w| *w <= 4).ok_or(MatroskaError::InvalidVint(offset))?;
    read_fully(reader, &mut buf[1..id_width])?;
    read_fully(reader, &mut buf[id_width..id_width + 1])?;
    let size_width =
        vint_width(buf[id_width]).ok_or(MatroskaError::InvalidVint(offset + id_width as u64))?;
    read_fully(reader, &mut buf[id_width + 1..id_width + size_width])?;

    let (id, _) = parse_vint(&buf[..id_width], true).ok_or(MatroskaError::InvalidVint(offset))?;
    let (size, _) = parse_vint(&buf[id_width..id_width + size_width], false)
        .ok_or(MatroskaError::InvalidVint(offset))?;

    Ok(Some(ElementHeader {
        id: id as u32,
        size: if is_unknown_size(size, size_width) {
            None
        } else {
            Some(size)
        },
        offset,
        header_len: (id_width + size_width) as u64,
    }))
}

fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            MatroskaError::Malformed {
                id: 0,
                pos: 0,
                reason: "truncated element header".into(),
            }
            .into()
        } else {
            e.into()
        }
    })
}

/// Largest element body read into memory at once.
pub const MAX_ELEMENT_BODY: u64 = 256 * 1024 * 1024;

/// Read the body of a known-size element.
pub fn read_body<R: Read>(reader: &mut R, header: &ElementHeader) -> Result<Vec<u8>> {
    let size = header.size.ok_or_else(|| MatroskaError::Malformed {
        id: header.id,
        pos: header.offset,
        reason: "unknown size not allowed here".into(),
    })?;
    if size > MAX_ELEMENT_BODY {
        return Err(MatroskaError::Malformed {
            id: header.id,
            pos: header.offset,
            reason: format!("element of {} bytes is too large", size),
        }
        .into());
    }
    let mut body = vec![0u8; size as usize];
    reader.read_exact(&mut body).map_err(|_| MatroskaError::Malformed {
        id: header.id,
        pos: header.offset,
        reason: "element extends past end of file".into(),
    })?;
    Ok(body)
}

/// Skip the body of a known-size element.
pub fn skip_body<R: Seek>(reader: &mut R, header: &ElementHeader) -> Result<()> {
    match header.end() {
        Some(end) => {
            reader.seek(SeekFrom::Start(end))?;
            Ok(())
        }
        None => Err(MatroskaError::Malformed {
            id: header.id,
            pos: header.offset,
            reason: "can't skip an element of unknown size".into(),
        }
        .into()),
    }
}

/// Iterator over the child elements of an in-memory master element.
pub struct Children<'a> {
    data: &'a [u8],
    pos: usize,
    /// File offset of `data[0]`, for error messages
    base: u64,
}

impl<'a> Children<'a> {
    pub fn new(data: &'a [u8], base: u64) -> Self {
        Self { data, pos: 0, base }
    }
}

/// One child element: id, body and the file offset of the body.
pub type Child<'a> = (u32, &'a [u8], u64);

impl<'a> Iterator for Children<'a> {
    type Item = Result<Child<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.data.len() {
            return None;
        }
        let at = self.base + self.pos as u64;
        let rest = &self.data[self.pos..];

        let parsed = parse_vint(rest, true).and_then(|(id, id_len)| {
            let (size, size_len) = parse_vint(&rest[id_len..], false)?;
            Some((id as u32, id_len + size_len, size))
        });
        let (id, header_len, size) = match parsed {
            Some(p) => p,
            None => {
                self.pos = self.data.len();
                return Some(Err(MatroskaError::InvalidVint(at).into()));
            }
        };

        let start = header_len;
        let end = start as u64 + size;
        if end > rest.len() as u64 {
            self.pos = self.data.len();
            return Some(Err(MatroskaError::Malformed {
                id,
                pos: at,
                reason: "child element overruns its parent".into(),
            }
            .into()));
        }
        self.pos += end as usize;
        Some(Ok((id, &rest[start..end as usize], at + start as u64)))
    }
}

/// Big-endian unsigned integer body (empty means 0).
pub fn uint(data: &[u8]) -> u64 {
    data.iter().take(8).fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Big-endian IEEE float body of 0, 4 or 8 bytes.
pub fn float(data: &[u8]) -> Option<f64> {
    match data.len() {
        0 => Some(0.0),
        4 => Some(f32::from_be_bytes(data.try_into().ok()?) as f64),
        8 => Some(f64::from_be_bytes(data.try_into().ok()?)),
        _ => None,
    }
}

/// String body, trailing NULs removed.
pub fn string(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).into_owned()
}

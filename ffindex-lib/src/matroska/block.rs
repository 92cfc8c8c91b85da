//! SimpleBlock / Block parsing.
//!
//! ```text
//! [track: vint] [timecode: i16 BE, relative to cluster] [flags: u8] [lacing header] [frames]
//! ```
//!
//! Flags: `0x80` keyframe (SimpleBlock only), `0x06` lacing
//! (00 none, 01 Xiph, 11 EBML, 10 fixed size).

use std::ops::Range;

use super::ebml::{parse_signed_vint, parse_vint};
use crate::error::{MatroskaError, Result};

/// Parsed block header plus the byte ranges of its frames within the block
/// body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub track_number: u64,
    pub timecode: i16,
    pub keyframe: bool,
    pub frames: Vec<Range<usize>>,
}

fn malformed(id: u32, pos: u64, reason: &str) -> MatroskaError {
    MatroskaError::Malformed {
        id,
        pos,
        reason: reason.to_string(),
    }
}

/// Parse a block body. `id` and `pos` only label errors.
pub fn parse_block(data: &[u8], id: u32, pos: u64) -> Result<Block> {
    let (track_number, mut offset) =
        parse_vint(data, false).ok_or_else(|| malformed(id, pos, "bad track number"))?;

    let header = data
        .get(offset..offset + 3)
        .ok_or_else(|| malformed(id, pos, "block header truncated"))?;
    let timecode = i16::from_be_bytes([header[0], header[1]]);
    let flags = header[2];
    offset += 3;

    let frames = match (flags >> 1) & 0x03 {
        0b00 => vec![offset..data.len()],
        lacing => {
            let count = *data
                .get(offset)
                .ok_or_else(|| malformed(id, pos, "lace count missing"))? as usize
                + 1;
            offset += 1;
            let sizes = match lacing {
                0b01 => xiph_sizes(data, &mut offset, count),
                0b11 => ebml_sizes(data, &mut offset, count),
                _ => fixed_sizes(data.len() - offset, count),
            }
            .ok_or_else(|| malformed(id, pos, "bad lacing"))?;

            let mut ranges = Vec::with_capacity(count);
            for size in sizes {
                let end = offset + size;
                if end > data.len() {
                    return Err(malformed(id, pos, "laced frame overruns block").into());
                }
                ranges.push(offset..end);
                offset = end;
            }
            ranges
        }
    };

    Ok(Block {
        track_number,
        timecode,
        keyframe: flags & 0x80 != 0,
        frames,
    })
}

/// Sizes of all laced frames; the last one takes what is left.
fn last_takes_rest(data_len: usize, offset: usize, mut sizes: Vec<usize>) -> Option<Vec<usize>> {
    let used = sizes.iter().try_fold(0usize, |acc, &size| acc.checked_add(size))?;
    let last = data_len.checked_sub(offset)?.checked_sub(used)?;
    sizes.push(last);
    Some(sizes)
}

fn xiph_sizes(data: &[u8], offset: &mut usize, count: usize) -> Option<Vec<usize>> {
    let mut sizes = Vec::with_capacity(count);
    for _ in 0..count - 1 {
        let mut size = 0usize;
        loop {
            let b = *data.get(*offset)?;
            *offset += 1;
            size = size.checked_add(b as usize)?;
            if b != 0xFF {
                break;
            }
        }
        if size > data.len() {
            return None;
        }
        sizes.push(size);
    }
    last_takes_rest(data.len(), *offset, sizes)
}

fn ebml_sizes(data: &[u8], offset: &mut usize, count: usize) -> Option<Vec<usize>> {
    // no single frame can be larger than the whole block
    let limit = data.len() as i64;
    let mut sizes = Vec::with_capacity(count);
    if count > 1 {
        let (first, len) = parse_vint(data.get(*offset..)?, false)?;
        *offset += len;
        let mut previous = i64::try_from(first).ok().filter(|s| *s <= limit)?;
        sizes.push(previous as usize);
        for _ in 1..count - 1 {
            let (delta, len) = parse_signed_vint(data.get(*offset..)?)?;
            *offset += len;
            previous = previous.checked_add(delta)?;
            if !(0..=limit).contains(&previous) {
                return None;
            }
            sizes.push(previous as usize);
        }
    }
    last_takes_rest(data.len(), *offset, sizes)
}

fn fixed_sizes(remaining: usize, count: usize) -> Option<Vec<usize>> {
    if remaining % count != 0 {
        return None;
    }
    Some(vec![remaining / count; count])
}

//! Native Matroska/WebM demuxer
//!
//! Only what indexing needs: the EBML header check, segment info, track
//! entries, and a single forward pass over clusters yielding one
//! [`MatroskaFrame`] per (laced) frame in file order.

pub mod block;
pub mod codec;
pub mod compression;
pub mod ebml;
pub mod elements;
pub mod tracks;

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::Path;

use crate::error::{IndexError, MatroskaError, Result};
use ebml::{read_body, read_header, skip_body, uint, Children, ElementHeader};
use elements as el;
pub use tracks::MatroskaTrack;

/// Nanoseconds per tick when Info has no TimecodeScale.
pub const DEFAULT_TIMECODE_SCALE: u64 = 1_000_000;

/// One frame in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatroskaFrame {
    /// Position of the track in [`MatroskaFile::tracks`]
    pub track: usize,
    /// Absolute timestamp in TimecodeScale ticks
    pub timecode: i64,
    pub keyframe: bool,
    /// File offset of the stored frame bytes
    pub file_pos: u64,
    pub size: u32,
}

/// Open Matroska file positioned for a cluster scan.
pub struct MatroskaFile<R = BufReader<File>> {
    reader: R,
    timecode_scale: u64,
    tracks: Vec<MatroskaTrack>,
    track_numbers: HashMap<u64, usize>,
    segment_end: Option<u64>,
    cluster_timecode: i64,
    block: Vec<u8>,
    pending: VecDeque<(MatroskaFrame, Range<usize>)>,
    current: Range<usize>,
    file_size: u64,
    /// Set once the cluster scan hit the end of the segment or of the file
    eos: bool,
}

impl MatroskaFile<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| IndexError::open(path, e))?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> MatroskaFile<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        let file_size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        verify_ebml_header(&mut reader)?;
        let segment = find_segment(&mut reader)?;

        let mut file = Self {
            reader,
            timecode_scale: DEFAULT_TIMECODE_SCALE,
            tracks: Vec::new(),
            track_numbers: HashMap::new(),
            segment_end: segment.end(),
            cluster_timecode: 0,
            block: Vec::new(),
            pending: VecDeque::new(),
            current: 0..0,
            file_size,
            eos: false,
        };
        file.read_segment_metadata()?;

        tracing::debug!(
            "Matroska: {} tracks, TimecodeScale {}",
            file.tracks.len(),
            file.timecode_scale
        );
        Ok(file)
    }

    pub fn tracks(&self) -> &[MatroskaTrack] {
        &self.tracks
    }

    pub fn timecode_scale(&self) -> u64 {
        self.timecode_scale
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Current read offset.
    pub fn position(&mut self) -> u64 {
        self.reader.stream_position().unwrap_or(self.file_size)
    }

    /// Stored bytes of the frame most recently returned by
    /// [`MatroskaFile::next_frame`].
    pub fn frame_data(&self) -> &[u8] {
        self.block.get(self.current.clone()).unwrap_or(&[])
    }

    /// Read Info and Tracks, stopping in front of the first Cluster.
    fn read_segment_metadata(&mut self) -> Result<()> {
        let mut have_tracks = false;
        while let Some(header) = self.next_segment_child()? {
            match header.id {
                el::CLUSTER => {
                    self.reader.seek(SeekFrom::Start(header.offset))?;
                    break;
                }
                el::INFO => {
                    let body = read_body(&mut self.reader, &header)?;
                    for child in Children::new(&body, header.data_offset()) {
                        let (id, data, pos) = child?;
                        if id == el::TIMECODE_SCALE {
                            let scale = uint(data);
                            if scale > i64::MAX as u64 {
                                return Err(MatroskaError::Malformed {
                                    id,
                                    pos,
                                    reason: format!("TimecodeScale {} out of range", scale),
                                }
                                .into());
                            }
                            if scale > 0 {
                                self.timecode_scale = scale;
                            }
                        }
                    }
                }
                el::TRACKS => {
                    let body = read_body(&mut self.reader, &header)?;
                    self.tracks = tracks::parse_tracks(&body, header.data_offset())?;
                    have_tracks = true;
                }
                _ => skip_body(&mut self.reader, &header)?,
            }
        }

        if !have_tracks {
            return Err(MatroskaError::NoTracks.into());
        }
        self.track_numbers = self
            .tracks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.number, i))
            .collect();
        Ok(())
    }

    /// Next element header inside the segment, `None` at its end.
    fn next_segment_child(&mut self) -> Result<Option<ElementHeader>> {
        let pos = self.reader.stream_position()?;
        if self.segment_end.is_some_and(|end| pos >= end) {
            return Ok(None);
        }
        read_header(&mut self.reader)
    }

    /// Next frame in file order, `None` once the segment is exhausted.
    ///
    /// A file cut short ends the scan after the last complete frame.
    pub fn next_frame(&mut self) -> Result<Option<MatroskaFrame>> {
        loop {
            if let Some((frame, range)) = self.pending.pop_front() {
                self.current = range;
                return Ok(Some(frame));
            }
            if self.eos {
                return Ok(None);
            }

            let header = match self.next_segment_child() {
                Ok(Some(h)) => h,
                Ok(None) => {
                    self.eos = true;
                    return Ok(None);
                }
                Err(e) => {
                    tracing::warn!("Matroska: stopping at unreadable element: {}", e);
                    self.eos = true;
                    return Ok(None);
                }
            };
            if header.id != el::CLUSTER && header.end().is_some_and(|end| end > self.file_size) {
                tracing::warn!(
                    "Matroska: element 0x{:X} at {} extends past the end of the file ({} bytes), file is truncated",
                    header.id,
                    header.offset,
                    self.file_size
                );
                self.eos = true;
                return Ok(None);
            }

            match header.id {
                // descend: children follow directly, whatever the cluster size
                el::CLUSTER => self.cluster_timecode = 0,
                el::TIMECODE => {
                    let body = read_body(&mut self.reader, &header)?;
                    self.cluster_timecode = uint(&body) as i64;
                }
                el::SIMPLE_BLOCK => {
                    self.block = read_body(&mut self.reader, &header)?;
                    self.queue_block(&header, None)?;
                }
                el::BLOCK_GROUP => {
                    let group = read_body(&mut self.reader, &header)?;
                    self.read_block_group(&group, &header)?;
                }
                _ if header.size.is_none() => {
                    return Err(MatroskaError::Malformed {
                        id: header.id,
                        pos: header.offset,
                        reason: "unexpected element of unknown size".into(),
                    }
                    .into())
                }
                _ => skip_body(&mut self.reader, &header)?,
            }
        }
    }

    fn read_block_group(&mut self, group: &[u8], header: &ElementHeader) -> Result<()> {
        let mut block: Option<(Range<usize>, u64)> = None;
        let mut referenced = false;
        let base = header.data_offset();
        for child in Children::new(group, base) {
            let (id, data, pos) = child?;
            match id {
                el::BLOCK => {
                    let start = (pos - base) as usize;
                    block = Some((start..start + data.len(), pos));
                }
                el::REFERENCE_BLOCK => referenced = true,
                _ => {}
            }
        }

        if let Some((range, pos)) = block {
            self.block = group[range].to_vec();
            let block_header = ElementHeader {
                id: el::BLOCK,
                size: Some(self.block.len() as u64),
                offset: pos,
                header_len: 0,
            };
            self.queue_block(&block_header, Some(!referenced))?;
        }
        Ok(())
    }

    /// Split `self.block` into frames. `keyframe` overrides the flag bit
    /// (Block inside a BlockGroup).
    fn queue_block(&mut self, header: &ElementHeader, keyframe: Option<bool>) -> Result<()> {
        let parsed = block::parse_block(&self.block, header.id, header.offset)?;
        let track = match self.track_numbers.get(&parsed.track_number) {
            Some(&t) => t,
            None => {
                tracing::debug!(
                    "Skipping block for unknown track {} at {}",
                    parsed.track_number,
                    header.offset
                );
                return Ok(());
            }
        };

        let keyframe = keyframe.unwrap_or(parsed.keyframe);
        let timecode = self.cluster_timecode + parsed.timecode as i64;
        let frame_ticks = match self.tracks[track].default_duration {
            0 => 0,
            d => (d / self.timecode_scale) as i64,
        };

        for (i, range) in parsed.frames.into_iter().enumerate() {
            let frame = MatroskaFrame {
                track,
                timecode: timecode + i as i64 * frame_ticks,
                keyframe,
                file_pos: header.data_offset() + range.start as u64,
                size: range.len() as u32,
            };
            self.pending.push_back((frame, range));
        }
        Ok(())
    }
}

fn verify_ebml_header<R: Read + Seek>(reader: &mut R) -> Result<()> {
    let header = match read_header(reader) {
        Ok(Some(h)) if h.id == el::EBML_HEADER => h,
        _ => return Err(MatroskaError::NotEbml.into()),
    };
    let body = read_body(reader, &header)?;
    for child in Children::new(&body, header.data_offset()) {
        let (id, data, _) = child?;
        if id == el::DOC_TYPE {
            let doc_type = ebml::string(data);
            if doc_type != "matroska" && doc_type != "webm" {
                return Err(MatroskaError::DocType(doc_type).into());
            }
        }
    }
    Ok(())
}

fn find_segment<R: Read + Seek>(reader: &mut R) -> Result<ElementHeader> {
    while let Some(header) = read_header(reader)? {
        if header.id == el::SEGMENT {
            return Ok(header);
        }
        skip_body(reader, &header)?;
    }
    Err(MatroskaError::NoSegment.into())
}

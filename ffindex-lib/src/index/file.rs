//! Binary index file format.
//!
//! All fields are little endian and written one by one:
//!
//! ```text
//! header:  u32 magic, u32 version, u32 track_count, u32 decoder,
//!          u32 library_versions[4], i64 file_size, u8 digest[20]
//! track:   u32 type, u32 frame_count, i64 timebase_num, i64 timebase_den
//! record:  i64 pts, u64 file_pos, u64 sample_start, u64 original_pos,
//!          u32 frame_size, u32 sample_count, u8 keyframe
//! ```
//!
//! A file is either accepted completely or rejected with
//! [`IndexError::Format`]. There is no upgrade path between versions.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::signature::{SourceSignature, DIGEST_LEN};
use super::track::{FrameRecord, TrackIndex};
use super::Index;
use crate::error::{IndexError, Result};
use crate::indexer::Capabilities;
use crate::types::{SourceId, SourceSet, TrackType};

pub const INDEX_MAGIC: u32 = 0x5392_0873;
pub const INDEX_VERSION: u32 = 3;

/// Number of library version stamps stored in the header.
pub const VERSION_STAMPS: usize = 4;

/// Upper bound for up-front allocation while reading a track.
const MAX_PREALLOC: usize = 1 << 20;

/// Versions of libavutil, libavformat, libavcodec and libswresample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LibraryVersions(pub [u32; VERSION_STAMPS]);

impl LibraryVersions {
    /// Versions of the FFmpeg libraries linked into this process.
    pub fn current() -> Self {
        crate::ffmpeg_utils::library_versions()
    }
}

/// What a stored index is checked against when read.
#[derive(Debug, Clone, Copy)]
pub struct IndexValidator {
    pub versions: LibraryVersions,
    pub sources: SourceSet,
}

impl IndexValidator {
    pub fn current(capabilities: &Capabilities) -> Self {
        Self {
            versions: LibraryVersions::current(),
            sources: capabilities.sources(),
        }
    }
}

impl Index {
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_u32::<LittleEndian>(INDEX_MAGIC)?;
        writer.write_u32::<LittleEndian>(INDEX_VERSION)?;
        writer.write_u32::<LittleEndian>(self.tracks.len() as u32)?;
        writer.write_u32::<LittleEndian>(self.decoder.code())?;
        for stamp in self.versions.0 {
            writer.write_u32::<LittleEndian>(stamp)?;
        }
        writer.write_i64::<LittleEndian>(self.signature.file_size as i64)?;
        writer.write_all(&self.signature.digest)?;

        for track in &self.tracks {
            writer.write_u32::<LittleEndian>(track.track_type.code())?;
            writer.write_u32::<LittleEndian>(track.len() as u32)?;
            writer.write_i64::<LittleEndian>(track.timebase_num)?;
            writer.write_i64::<LittleEndian>(track.timebase_den)?;
            for record in track.records() {
                write_record(&mut writer, record)?;
            }
        }
        Ok(())
    }

    /// Write the index to `path`, replacing any existing file.
    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| {
            IndexError::InvalidArgument(format!(
                "Failed to open '{}' for writing: {}",
                path.display(),
                e
            ))
        })?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        tracing::debug!("Wrote index with {} tracks to {:?}", self.tracks.len(), path);
        Ok(())
    }

    /// Decode an index and check it against `validator`. The source file is
    /// not consulted; see [`Index::load`].
    pub fn read_from<R: Read>(mut reader: R, validator: &IndexValidator) -> Result<Index> {
        read_index(&mut reader, validator).map_err(|e| match e {
            IndexError::Io(io) if io.kind() == io::ErrorKind::UnexpectedEof => {
                IndexError::Format("file is truncated".to_string())
            }
            other => other,
        })
    }

    /// Read `index_path` and verify that it describes `source_path` as it
    /// exists now, using the running FFmpeg versions and `capabilities`.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(
        index_path: P,
        source_path: Q,
        capabilities: &Capabilities,
    ) -> Result<Index> {
        let index_path = index_path.as_ref();
        let file = File::open(index_path).map_err(|e| {
            IndexError::Format(format!("can't open '{}': {}", index_path.display(), e))
        })?;
        let index = Index::read_from(BufReader::new(file), &IndexValidator::current(capabilities))?;

        let actual = SourceSignature::compute(source_path.as_ref())?;
        if actual != index.signature {
            tracing::info!(
                "Index {:?} is stale for {:?} (size {} vs {})",
                index_path,
                source_path.as_ref(),
                index.signature.file_size,
                actual.file_size
            );
            return Err(IndexError::Format(
                "the index does not match the source file".to_string(),
            ));
        }
        Ok(index)
    }
}

fn write_record<W: Write>(writer: &mut W, record: &FrameRecord) -> io::Result<()> {
    writer.write_i64::<LittleEndian>(record.pts)?;
    writer.write_u64::<LittleEndian>(record.file_pos)?;
    writer.write_u64::<LittleEndian>(record.sample_start)?;
    writer.write_u64::<LittleEndian>(record.original_pos as u64)?;
    writer.write_u32::<LittleEndian>(record.frame_size)?;
    writer.write_u32::<LittleEndian>(record.sample_count)?;
    writer.write_u8(record.keyframe as u8)?;
    Ok(())
}

fn read_record<R: Read>(reader: &mut R) -> io::Result<FrameRecord> {
    let pts = reader.read_i64::<LittleEndian>()?;
    let file_pos = reader.read_u64::<LittleEndian>()?;
    let sample_start = reader.read_u64::<LittleEndian>()?;
    let original_pos = reader.read_u64::<LittleEndian>()? as usize;
    let frame_size = reader.read_u32::<LittleEndian>()?;
    let sample_count = reader.read_u32::<LittleEndian>()?;
    let keyframe = reader.read_u8()? != 0;
    Ok(FrameRecord {
        pts,
        keyframe,
        file_pos,
        frame_size,
        sample_start,
        sample_count,
        original_pos,
    })
}

fn read_index<R: Read>(reader: &mut R, validator: &IndexValidator) -> Result<Index> {
    let magic = reader.read_u32::<LittleEndian>()?;
    if magic != INDEX_MAGIC {
        return Err(IndexError::Format("not a valid index file".to_string()));
    }

    let version = reader.read_u32::<LittleEndian>()?;
    if version != INDEX_VERSION {
        return Err(IndexError::Format(format!(
            "index format version {} is not supported (expected {})",
            version, INDEX_VERSION
        )));
    }

    let track_count = reader.read_u32::<LittleEndian>()?;
    let decoder_code = reader.read_u32::<LittleEndian>()?;

    let mut stamps = [0u32; VERSION_STAMPS];
    for stamp in stamps.iter_mut() {
        *stamp = reader.read_u32::<LittleEndian>()?;
    }
    let versions = LibraryVersions(stamps);
    if versions != validator.versions {
        return Err(IndexError::Format(
            "the index was built with a different FFmpeg version".to_string(),
        ));
    }

    let decoder = SourceId::from_code(decoder_code)
        .filter(|id| validator.sources.contains(*id))
        .ok_or_else(|| {
            IndexError::Format(format!(
                "the source backend {} used to build this index is not available",
                decoder_code
            ))
        })?;

    let file_size = reader.read_i64::<LittleEndian>()?;
    let mut digest = [0u8; DIGEST_LEN];
    reader.read_exact(&mut digest)?;

    let mut index = Index::new(
        decoder,
        SourceSignature {
            file_size: file_size as u64,
            digest,
        },
        versions,
    );

    for _ in 0..track_count {
        let type_code = reader.read_u32::<LittleEndian>()?;
        let track_type = TrackType::from_code(type_code)
            .ok_or_else(|| IndexError::Format(format!("unknown track type {}", type_code)))?;
        let frame_count = reader.read_u32::<LittleEndian>()? as usize;
        let num = reader.read_i64::<LittleEndian>()?;
        let den = reader.read_i64::<LittleEndian>()?;

        let mut records = Vec::with_capacity(frame_count.min(MAX_PREALLOC));
        for _ in 0..frame_count {
            records.push(read_record(reader)?);
        }
        index
            .tracks
            .push(TrackIndex::from_records(track_type, num, den, records));
    }

    Ok(index)
}

//! Index model
//!
//! An [`Index`] is the product of one indexing scan:
//! - one [`TrackIndex`] seek table per container track
//! - the backend that produced it
//! - the FFmpeg library versions it was built against
//! - a [`SourceSignature`] of the source file
//!
//! It is written to and read from disk by [`file`], with strict validation
//! and no migration between format versions.

pub mod file;
pub mod signature;
pub mod track;

pub use file::{IndexValidator, LibraryVersions, INDEX_MAGIC, INDEX_VERSION};
pub use signature::{SourceSignature, DIGEST_LEN};
pub use track::{FrameRecord, TrackIndex};

use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::types::{SourceId, TrackType};

/// Complete index for one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub decoder: SourceId,
    pub signature: SourceSignature,
    pub versions: LibraryVersions,
    pub tracks: Vec<TrackIndex>,
}

impl Index {
    pub fn new(decoder: SourceId, signature: SourceSignature, versions: LibraryVersions) -> Self {
        Self {
            decoder,
            signature,
            versions,
            tracks: Vec::new(),
        }
    }

    pub fn number_of_tracks(&self) -> usize {
        self.tracks.len()
    }

    pub fn track(&self, track: usize) -> Option<&TrackIndex> {
        self.tracks.get(track)
    }

    /// First track of the given type.
    pub fn first_track_of_type(&self, track_type: TrackType) -> Option<usize> {
        self.tracks.iter().position(|t| t.track_type == track_type)
    }

    /// Sort every track into presentation order. Must run before any seek
    /// query; [`crate::Indexer::do_indexing`] does it for you.
    pub fn sort(&mut self) {
        for track in &mut self.tracks {
            track.sort();
        }
    }

    /// Whether `source` still has the size and digest recorded at indexing
    /// time.
    pub fn matches_source<P: AsRef<Path>>(&self, source: P) -> Result<bool> {
        Ok(SourceSignature::compute(source)? == self.signature)
    }

    /// Short description of the index, for display and JSON output.
    pub fn summary(&self) -> IndexSummary {
        IndexSummary {
            decoder: self.decoder.name(),
            file_size: self.signature.file_size,
            tracks: self
                .tracks
                .iter()
                .enumerate()
                .map(|(i, t)| TrackSummary {
                    track: i,
                    track_type: t.track_type,
                    frames: t.len(),
                    keyframes: t.records().iter().filter(|r| r.keyframe).count(),
                    timebase: (t.timebase_num, t.timebase_den),
                    duration_ms: t.records().last().map(|r| t.pts_to_ms(r.pts)).unwrap_or(0.0),
                    samples: t
                        .records()
                        .iter()
                        .map(|r| r.sample_start + r.sample_count as u64)
                        .max()
                        .unwrap_or(0),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexSummary {
    pub decoder: &'static str,
    pub file_size: u64,
    pub tracks: Vec<TrackSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackSummary {
    pub track: usize,
    pub track_type: TrackType,
    pub frames: usize,
    pub keyframes: usize,
    pub timebase: (i64, i64),
    /// Timestamp of the last record after sorting
    pub duration_ms: f64,
    /// Audio only
    pub samples: u64,
}

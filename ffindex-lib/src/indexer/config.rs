//! Per-scan indexing options.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::audio::{default_audio_name, AudioNameCallback};
use crate::error::IndexError;

/// `(bytes_done, bytes_total) -> cancel`
pub type ProgressCallback = Box<dyn FnMut(u64, u64) -> bool>;

/// Set of track numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TrackMask {
    #[default]
    None,
    All,
    Only(BTreeSet<usize>),
}

impl TrackMask {
    pub fn contains(&self, track: usize) -> bool {
        match self {
            TrackMask::None => false,
            TrackMask::All => true,
            TrackMask::Only(tracks) => tracks.contains(&track),
        }
    }

    /// Bit `n` selects track `n`; `-1` selects every track.
    pub fn from_bits(bits: i64) -> Self {
        match bits {
            -1 => TrackMask::All,
            0 => TrackMask::None,
            bits => TrackMask::Only(
                (0..64)
                    .filter(|n| (bits as u64) & (1u64 << n) != 0)
                    .collect(),
            ),
        }
    }

    pub fn tracks<I: IntoIterator<Item = usize>>(tracks: I) -> Self {
        TrackMask::Only(tracks.into_iter().collect())
    }
}

/// What a decoding failure on one audio track does to the scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorHandling {
    /// Fail the whole scan
    Abort,
    /// Drop every record of the track and stop decoding it
    #[default]
    ClearTrack,
    /// Keep the records so far and stop decoding it
    StopTrack,
    /// Skip the rest of the packet and carry on
    Ignore,
}

impl FromStr for ErrorHandling {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "abort" | "0" => Ok(ErrorHandling::Abort),
            "clear-track" | "clear" | "1" => Ok(ErrorHandling::ClearTrack),
            "stop-track" | "stop" | "2" => Ok(ErrorHandling::StopTrack),
            "ignore" | "3" => Ok(ErrorHandling::Ignore),
            other => Err(IndexError::InvalidArgument(format!(
                "unknown error handling mode '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ErrorHandling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorHandling::Abort => "abort",
            ErrorHandling::ClearTrack => "clear-track",
            ErrorHandling::StopTrack => "stop-track",
            ErrorHandling::Ignore => "ignore",
        })
    }
}

/// Options for one [`crate::Indexer::do_indexing`] call.
pub struct IndexerConfig {
    /// Audio tracks to decode and index
    pub track_mask: TrackMask,
    /// Audio tracks whose PCM is also written to a Wave64 file. Only
    /// tracks also in `track_mask` are dumped.
    pub dump_mask: TrackMask,
    pub error_handling: ErrorHandling,
    pub progress: Option<ProgressCallback>,
    pub audio_name: AudioNameCallback,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            track_mask: TrackMask::None,
            dump_mask: TrackMask::None,
            error_handling: ErrorHandling::default(),
            progress: None,
            audio_name: default_audio_name(None),
        }
    }
}

impl IndexerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track_mask(mut self, mask: TrackMask) -> Self {
        self.track_mask = mask;
        self
    }

    pub fn dump_mask(mut self, mask: TrackMask) -> Self {
        self.dump_mask = mask;
        self
    }

    pub fn error_handling(mut self, mode: ErrorHandling) -> Self {
        self.error_handling = mode;
        self
    }

    pub fn progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(u64, u64) -> bool + 'static,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn audio_name(mut self, callback: AudioNameCallback) -> Self {
        self.audio_name = callback;
        self
    }

    pub(crate) fn decodes(&self, track: usize) -> bool {
        self.track_mask.contains(track)
    }

    pub(crate) fn dumps(&self, track: usize) -> bool {
        self.track_mask.contains(track) && self.dump_mask.contains(track)
    }

    /// Report progress; `true` means the caller asked to stop.
    pub(crate) fn report_progress(&mut self, done: u64, total: u64) -> bool {
        match self.progress.as_mut() {
            Some(callback) => callback(done, total),
            None => false,
        }
    }
}

impl fmt::Debug for IndexerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexerConfig")
            .field("track_mask", &self.track_mask)
            .field("dump_mask", &self.dump_mask)
            .field("error_handling", &self.error_handling)
            .field("progress", &self.progress.is_some())
            .finish_non_exhaustive()
    }
}

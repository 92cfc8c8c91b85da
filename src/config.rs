//! Command line and resolved indexing settings

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use ffindex_lib::{ErrorHandling, TrackMask};
use serde::{Deserialize, Serialize};

/// Index media files for frame-accurate seeking.
#[derive(Parser, Debug, Clone)]
#[command(name = "ffindex")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file.
    #[arg(short = 'c', long, global = true, default_value = "ffindex.toml")]
    pub config: PathBuf,

    /// Write a default configuration file to the --config path and exit.
    #[arg(long)]
    pub generate_config: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Scan a media file and write its index.
    Index(IndexArgs),
    /// Print the contents of an index file.
    Info(InfoArgs),
    /// Write v2 timecodes for one track of an index.
    Timecodes(TimecodesArgs),
}

#[derive(Args, Debug, Clone)]
pub struct IndexArgs {
    /// Overwrite an existing index file.
    #[arg(short = 'f', long)]
    pub force: bool,

    /// Audio tracks to decode, as a bit mask (-1 = all).
    #[arg(short = 't', long, allow_hyphen_values = true)]
    pub track_mask: Option<i64>,

    /// Audio tracks to write to Wave64 files, as a bit mask (-1 = all).
    #[arg(short = 'd', long, allow_hyphen_values = true)]
    pub dump_mask: Option<i64>,

    /// Reaction to audio decoding errors: abort, clear-track, stop-track, ignore.
    #[arg(short = 'e', long)]
    pub error_handling: Option<ErrorHandling>,

    /// Base name for Wave64 files (defaults to the input path).
    #[arg(short = 'a', long)]
    pub audio_base: Option<String>,

    /// Suppress the progress display.
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Media file to index.
    pub input: PathBuf,

    /// Index file (defaults to INPUT.ffindex).
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct InfoArgs {
    /// Index file to read.
    pub index: PathBuf,

    /// Also check that the index still matches this source file.
    #[arg(short = 's', long)]
    pub source: Option<PathBuf>,

    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct TimecodesArgs {
    /// Index file to read.
    pub index: PathBuf,

    /// Track number.
    pub track: usize,

    /// Timecode file to write.
    pub output: PathBuf,
}

/// Indexing settings after merging the config file and the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSettings {
    /// Bit mask of audio tracks to decode
    pub track_mask: i64,

    /// Bit mask of audio tracks to dump
    pub dump_mask: i64,

    pub error_handling: ErrorHandling,

    /// Replace existing index files
    pub overwrite: bool,

    /// Base name for Wave64 files
    pub audio_base: Option<String>,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            track_mask: 0,
            dump_mask: 0,
            error_handling: ErrorHandling::default(),
            overwrite: false,
            audio_base: None,
        }
    }
}

impl IndexSettings {
    /// Command-line values win over file values.
    pub fn apply_args(mut self, args: &IndexArgs) -> Self {
        if let Some(mask) = args.track_mask {
            self.track_mask = mask;
        }
        if let Some(mask) = args.dump_mask {
            self.dump_mask = mask;
        }
        if let Some(mode) = args.error_handling {
            self.error_handling = mode;
        }
        if args.force {
            self.overwrite = true;
        }
        if args.audio_base.is_some() {
            self.audio_base = args.audio_base.clone();
        }
        self
    }

    pub fn track_mask(&self) -> TrackMask {
        TrackMask::from_bits(self.track_mask)
    }

    pub fn dump_mask(&self) -> TrackMask {
        TrackMask::from_bits(self.dump_mask)
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format (json, pretty)
    pub format: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LogSettings {
    pub fn json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_index_args() {
        let cli = parse(&["ffindex", "index", "-f", "-t", "-1", "-e", "stop-track", "in.mkv"]);
        let Some(Command::Index(args)) = cli.command else {
            panic!("expected index command");
        };
        assert!(args.force);
        assert_eq!(args.track_mask, Some(-1));
        assert_eq!(args.error_handling, Some(ErrorHandling::StopTrack));
        assert_eq!(args.input, PathBuf::from("in.mkv"));
        assert!(args.output.is_none());
    }

    #[test]
    fn test_args_override_settings() {
        let cli = parse(&["ffindex", "index", "-d", "4", "-a", "audio", "in.mkv", "out.idx"]);
        let Some(Command::Index(args)) = cli.command else {
            panic!("expected index command");
        };
        let file = IndexSettings {
            track_mask: 6,
            dump_mask: 2,
            error_handling: ErrorHandling::Abort,
            overwrite: false,
            audio_base: None,
        };
        let settings = file.apply_args(&args);
        assert_eq!(settings.track_mask, 6);
        assert_eq!(settings.dump_mask, 4);
        assert_eq!(settings.error_handling, ErrorHandling::Abort);
        assert_eq!(settings.audio_base.as_deref(), Some("audio"));
        assert!(settings.dump_mask().contains(2));
    }

    #[test]
    fn test_info_and_timecodes_args() {
        let cli = parse(&["ffindex", "info", "a.ffindex", "--json", "-s", "a.mkv"]);
        assert!(matches!(cli.command, Some(Command::Info(ref a)) if a.json && a.source.is_some()));

        let cli = parse(&["ffindex", "timecodes", "a.ffindex", "2", "tc.txt"]);
        assert!(matches!(cli.command, Some(Command::Timecodes(ref a)) if a.track == 2));
    }

    #[test]
    fn test_bad_error_handling_rejected() {
        assert!(Cli::try_parse_from(["ffindex", "index", "-e", "maybe", "in.mkv"]).is_err());
    }
}

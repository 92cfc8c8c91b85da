//! Inline audio extraction
//!
//! Audio packets are decoded during the same pass that builds the seek
//! tables. Each selected track gets an [`AudioExtractionContext`]; its PCM
//! side file is only opened once the first decoded samples reveal the real
//! output format.

pub mod context;
pub mod decoder;
pub mod naming;
pub mod wave64;

pub use context::{AudioExtractionContext, WriterFactory};
pub use decoder::{AudioDecode, FfmpegAudioDecoder};
pub use naming::{default_audio_name, format_audio_name, resolve_audio_name, AudioNameCallback};
pub use wave64::Wave64Writer;

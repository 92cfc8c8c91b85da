//! Library-level scenario tests
//!
//! - fixture builders: synthetic Matroska files, scripted packet sources,
//!   mock decoders and a fake platform parser
//! - full indexing runs through FFmpeg and the native Matroska backend
//! - index persistence against real source files

pub mod fixtures;

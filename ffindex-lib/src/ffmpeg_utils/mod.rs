//! FFmpeg module - wrappers and utilities for FFmpeg library access
//!
//! This module handles:
//! - FFmpeg initialization
//! - Routing FFmpeg's log output into `tracing`
//! - Version stamps recorded in index files
//! - Unsafe field access not covered by `ffmpeg-next`

pub mod helpers;
pub mod utils;

pub use ffmpeg_next as ffmpeg;

use crate::index::LibraryVersions;

/// Initialize the FFmpeg library.
///
/// Call once at startup before creating any indexer.
pub fn init() -> Result<(), crate::error::FfmpegError> {
    ffmpeg::init().map_err(|e| {
        crate::error::FfmpegError::InitFailed(format!("ffmpeg::init() failed: {}", e))
    })?;

    tracing::debug!("FFmpeg initialized");

    Ok(())
}

/// Forward FFmpeg log lines to `tracing` instead of stderr.
///
/// Must be called after `init()` and before any other thread uses FFmpeg,
/// since the log callback is global state.
pub fn install_log_filter() {
    // SAFETY: both functions modify global FFmpeg state and are called once
    // at startup, before indexing begins.
    unsafe {
        ffmpeg::ffi::av_log_set_level(ffmpeg::ffi::AV_LOG_WARNING as i32);
        ffmpeg::ffi::av_log_set_callback(Some(ffmpeg_log_callback));
    }
}

/// Lines that show up for every damaged frame and carry no extra detail
/// beyond the decode error we already report per track.
const SUPPRESSED_MESSAGES: &[&str] = &[
    "Header missing",
    "Could not update timestamps for skipped samples",
    "Estimating duration from bitrate",
];

unsafe extern "C" fn ffmpeg_log_callback(
    avcl: *mut std::ffi::c_void,
    level: std::ffi::c_int,
    fmt: *const std::ffi::c_char,
    vl: ffmpeg::ffi::va_list,
) {
    use std::ffi::CStr;

    if level > unsafe { ffmpeg::ffi::av_log_get_level() } {
        return;
    }

    let mut buf = [0 as std::ffi::c_char; 1024];
    let mut print_prefix: std::ffi::c_int = 1;
    ffmpeg::ffi::av_log_format_line(
        avcl,
        level,
        fmt,
        vl,
        buf.as_mut_ptr(),
        buf.len() as std::ffi::c_int,
        &mut print_prefix,
    );

    let msg = CStr::from_ptr(buf.as_ptr()).to_string_lossy();
    let msg = msg.trim_end();
    if msg.is_empty() || SUPPRESSED_MESSAGES.iter().any(|s| msg.contains(s)) {
        return;
    }

    if level <= ffmpeg::ffi::AV_LOG_ERROR as std::ffi::c_int {
        tracing::error!(target: "ffmpeg", "{}", msg);
    } else if level <= ffmpeg::ffi::AV_LOG_WARNING as std::ffi::c_int {
        tracing::warn!(target: "ffmpeg", "{}", msg);
    } else if level <= ffmpeg::ffi::AV_LOG_INFO as std::ffi::c_int {
        tracing::debug!(target: "ffmpeg", "{}", msg);
    } else {
        tracing::trace!(target: "ffmpeg", "{}", msg);
    }
}

/// Version stamps of the linked libavutil, libavformat, libavcodec and
/// libswresample.
pub fn library_versions() -> LibraryVersions {
    // SAFETY: the version functions only return compile-time constants of
    // the loaded shared libraries.
    unsafe {
        LibraryVersions([
            ffmpeg::ffi::avutil_version(),
            ffmpeg::ffi::avformat_version(),
            ffmpeg::ffi::avcodec_version(),
            ffmpeg::ffi::swresample_version(),
        ])
    }
}

/// Dotted version string of the linked libavcodec, for diagnostics.
pub fn version_info() -> String {
    let v = library_versions().0[2];
    format!("libavcodec {}.{}.{}", v >> 16, (v >> 8) & 0xFF, v & 0xFF)
}

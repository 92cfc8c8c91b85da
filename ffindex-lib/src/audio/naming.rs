//! Output names for PCM side files
//!
//! Names come from a caller-supplied callback using a two-call protocol:
//! the first call gets no buffer and returns the size it needs, the second
//! call fills a buffer of exactly that size and returns the bytes written.

use std::path::{Path, PathBuf};

use crate::error::{IndexError, Result};
use crate::types::AudioProperties;

/// `(source, track, properties, buffer) -> size`. With `buffer == None` the
/// required size is returned; otherwise the number of bytes written.
pub type AudioNameCallback =
    Box<dyn FnMut(&Path, usize, &AudioProperties, Option<&mut [u8]>) -> usize>;

/// Ask `callback` for the side-file path of `track`.
pub fn resolve_audio_name(
    callback: &mut AudioNameCallback,
    source: &Path,
    track: usize,
    properties: &AudioProperties,
) -> Result<PathBuf> {
    let needed = callback(source, track, properties, None);
    if needed == 0 {
        return Err(IndexError::InvalidArgument(format!(
            "no audio file name given for track {}",
            track
        )));
    }

    let mut buf = vec![0u8; needed];
    let written = callback(source, track, properties, Some(&mut buf)).min(needed);
    buf.truncate(written);
    while buf.last() == Some(&0) {
        buf.pop();
    }

    let name = String::from_utf8(buf).map_err(|_| {
        IndexError::InvalidArgument(format!("audio file name for track {} is not UTF-8", track))
    })?;
    if name.is_empty() {
        return Err(IndexError::InvalidArgument(format!(
            "no audio file name given for track {}",
            track
        )));
    }
    Ok(PathBuf::from(name))
}

/// `{base}.{track:02}.delay.{delay_ms}.w64`, with the source path as base
/// when none is given. The delay is the time in ms of the packet that first
/// decoded to samples.
pub fn format_audio_name(base: &str, track: usize, properties: &AudioProperties) -> String {
    let delay_ms = (properties.delay_time * 1000.0) as i64;
    format!("{}.{:02}.delay.{}.w64", base, track, delay_ms)
}

/// Callback producing [`format_audio_name`] names.
pub fn default_audio_name(base: Option<String>) -> AudioNameCallback {
    Box::new(move |source, track, properties, buffer| {
        let base = match &base {
            Some(base) if !base.is_empty() => base.clone(),
            _ => source.display().to_string(),
        };
        let name = format_audio_name(&base, track, properties);
        match buffer {
            None => name.len(),
            Some(buf) => {
                let n = name.len().min(buf.len());
                buf[..n].copy_from_slice(&name.as_bytes()[..n]);
                n
            }
        }
    })
}

//! The single-pass scan shared by every backend.
//!
//! A backend only has to hand out packets in container order through
//! [`PacketSource`]; record building, inline audio decoding, the per-track
//! error policy and cancellation all live here.

use std::path::{Path, PathBuf};

use crate::audio::{resolve_audio_name, AudioDecode, AudioExtractionContext, AudioNameCallback, Wave64Writer};
use crate::error::{IndexError, Result};
use crate::index::{FrameRecord, Index, LibraryVersions, SourceSignature, TrackIndex};
use crate::types::{AudioProperties, PcmFormat, SourceId, TrackType};

use super::config::{ErrorHandling, IndexerConfig};

/// Container-level description of one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketInfo {
    pub track: usize,
    pub pts: i64,
    pub keyframe: bool,
    pub file_pos: u64,
    pub size: u32,
}

/// Packets of a source file in container order.
pub trait PacketSource {
    fn next_packet(&mut self) -> Result<Option<PacketInfo>>;

    /// Decodable bytes of the packet last returned by `next_packet`.
    /// Only requested for tracks that are being decoded.
    fn payload(&mut self) -> Result<&[u8]>;

    /// Bytes of the source consumed so far.
    fn position(&mut self) -> u64;

    fn total_size(&self) -> u64;
}

/// Everything a scan starts from.
pub struct ScanSetup {
    pub source_path: PathBuf,
    pub decoder: SourceId,
    pub signature: SourceSignature,
    pub versions: LibraryVersions,
    pub tracks: Vec<TrackIndex>,
    pub audio: Vec<Option<AudioExtractionContext>>,
}

/// Open an extraction context for every audio track selected in `config`.
///
/// A decoder that cannot be opened is fatal under [`ErrorHandling::Abort`];
/// under any other mode the track is left undecoded.
pub fn open_audio_contexts<F>(
    track_types: &[TrackType],
    config: &IndexerConfig,
    mut open: F,
) -> Result<Vec<Option<AudioExtractionContext>>>
where
    F: FnMut(usize) -> Result<Box<dyn AudioDecode>>,
{
    let mut contexts = Vec::with_capacity(track_types.len());
    for (track, track_type) in track_types.iter().enumerate() {
        if *track_type != TrackType::Audio || !config.decodes(track) {
            contexts.push(None);
            continue;
        }
        match open(track) {
            Ok(decoder) => {
                contexts.push(Some(AudioExtractionContext::new(
                    track,
                    decoder,
                    config.dumps(track),
                )));
            }
            Err(e) if config.error_handling == ErrorHandling::Abort => return Err(e),
            Err(e) => {
                tracing::warn!("Not decoding audio track {}: {}", track, e);
                contexts.push(None);
            }
        }
    }
    Ok(contexts)
}

/// Read every packet of `source` once and build the index.
pub fn run_scan<S: PacketSource>(
    source: &mut S,
    setup: ScanSetup,
    config: &mut IndexerConfig,
) -> Result<Index> {
    let ScanSetup {
        source_path,
        decoder,
        signature,
        versions,
        mut tracks,
        mut audio,
    } = setup;
    audio.resize_with(tracks.len(), || None);

    let total = source.total_size();
    let policy = config.error_handling;
    let mut packets = 0u64;

    while let Some(packet) = source.next_packet()? {
        packets += 1;
        let done = source.position();
        if config.report_progress(done, total) {
            tracing::info!("Indexing {:?} cancelled at byte {} of {}", source_path, done, total);
            return Err(IndexError::Cancelled);
        }

        let t = packet.track;
        let Some(track) = tracks.get_mut(t) else {
            continue;
        };

        match track.track_type {
            TrackType::Video => {
                track.push(FrameRecord::video(
                    packet.pts,
                    packet.keyframe,
                    packet.file_pos,
                    packet.size,
                ));
            }
            TrackType::Audio => {
                let Some(ctx) = audio[t].as_mut() else {
                    continue;
                };
                let start = ctx.current_sample();
                track.push(FrameRecord::audio(
                    packet.pts,
                    start,
                    0,
                    packet.keyframe,
                    packet.file_pos,
                    packet.size,
                ));

                let outcome = {
                    let mut factory = writer_factory(&source_path, t, track, &mut config.audio_name);
                    source
                        .payload()
                        .and_then(|data| ctx.decode_packet(data, &mut factory))
                };
                let decoded = ctx.current_sample() - start;
                if let Some(last) = track.last_mut() {
                    last.sample_count = decoded as u32;
                }

                if let Err(e) = outcome {
                    if !e.is_decode() {
                        return Err(e);
                    }
                    apply_policy(policy, e, t, track, &mut audio[t])?;
                }
            }
            _ => {}
        }
    }

    for (t, slot) in audio.iter_mut().enumerate() {
        let Some(ctx) = slot.as_mut() else {
            continue;
        };
        let track = &mut tracks[t];
        let flushed = {
            let mut factory = writer_factory(&source_path, t, track, &mut config.audio_name);
            ctx.flush(&mut factory)
        };
        match flushed {
            Ok(samples) => {
                if let Some(last) = track.last_mut() {
                    last.sample_count += samples as u32;
                }
            }
            Err(e) if e.is_decode() => apply_policy(policy, e, t, track, slot)?,
            Err(e) => return Err(e),
        }
        if let Some(ctx) = slot.take() {
            ctx.finish()?;
        }
    }

    let mut index = Index::new(decoder, signature, versions);
    index.tracks = tracks;
    index.sort();

    tracing::info!(
        "Indexed {:?}: {} packets, {} tracks ({})",
        source_path,
        packets,
        index.number_of_tracks(),
        decoder.name()
    );
    Ok(index)
}

/// React to a decode failure on track `t` according to `policy`.
fn apply_policy(
    policy: ErrorHandling,
    error: IndexError,
    t: usize,
    track: &mut TrackIndex,
    slot: &mut Option<AudioExtractionContext>,
) -> Result<()> {
    match policy {
        ErrorHandling::Abort => return Err(error),
        ErrorHandling::ClearTrack => {
            tracing::warn!("{}; dropping the {} records of track {}", error, track.len(), t);
            track.clear();
            close(slot.take());
        }
        ErrorHandling::StopTrack => {
            tracing::warn!("{}; no further decoding on track {}", error, t);
            close(slot.take());
        }
        ErrorHandling::Ignore => {
            tracing::debug!("{}; skipping rest of packet", error);
        }
    }
    Ok(())
}

fn close(ctx: Option<AudioExtractionContext>) {
    if let Some(ctx) = ctx {
        let track = ctx.track();
        if let Err(e) = ctx.finish() {
            tracing::warn!("Failed to finalize audio file of track {}: {}", track, e);
        }
    }
}

/// Creates the Wave64 file for `track` once its PCM format is known. It is
/// called while the packet that produced the first samples is the track's
/// latest record.
fn writer_factory<'a>(
    source: &'a Path,
    t: usize,
    track: &'a TrackIndex,
    audio_name: &'a mut AudioNameCallback,
) -> impl FnMut(&PcmFormat, u64) -> Result<Wave64Writer> + 'a {
    move |format, num_samples| {
        let records = track.records();
        let seconds = |record: Option<&FrameRecord>| {
            record.map_or(0.0, |r| track.pts_to_ms(r.pts) / 1000.0)
        };
        let properties = AudioProperties {
            sample_format: format.sample_format,
            bits_per_sample: format.bits_per_sample,
            channels: format.channels,
            channel_layout: format.channel_layout,
            sample_rate: format.sample_rate,
            num_samples,
            first_time: seconds(records.first()),
            delay_time: seconds(records.last()),
            last_time: seconds(records.last()),
        };
        let path = resolve_audio_name(audio_name, source, t, &properties)?;
        tracing::info!(
            "Writing track {} audio to {:?} ({} Hz, {} ch)",
            t,
            path,
            format.sample_rate,
            format.channels
        );
        Wave64Writer::create(&path, *format)
    }
}

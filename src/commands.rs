//! Subcommand implementations

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use ffindex_lib::audio::default_audio_name;
use ffindex_lib::{Capabilities, Index, IndexValidator, Indexer, IndexerConfig};

use crate::config::{IndexArgs, IndexSettings, InfoArgs, TimecodesArgs};
use crate::error::{AppError, Result};

/// `INPUT.ffindex`
pub fn default_output(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_owned();
    name.push(".ffindex");
    PathBuf::from(name)
}

pub fn run_index(args: &IndexArgs, settings: &IndexSettings) -> Result<()> {
    let output = args.output.clone().unwrap_or_else(|| default_output(&args.input));
    if output.exists() && !settings.overwrite {
        return Err(AppError::OutputExists(output.display().to_string()));
    }

    let capabilities = Capabilities::builtin();
    let indexer = Indexer::create(&args.input, &capabilities)?;
    tracing::info!(
        "Indexing {:?} with the {} backend",
        args.input,
        indexer.source_id().name()
    );
    for track in 0..indexer.number_of_tracks() {
        tracing::info!(
            "Track {}: {} ({})",
            track,
            indexer.track_type(track)?,
            indexer.track_codec_name(track)?
        );
    }

    let mut config = IndexerConfig::new()
        .track_mask(settings.track_mask())
        .dump_mask(settings.dump_mask())
        .error_handling(settings.error_handling)
        .audio_name(default_audio_name(settings.audio_base.clone()));
    if !args.quiet {
        config = config.progress(progress_printer());
    }

    let index = indexer.do_indexing(config)?;
    if !args.quiet {
        eprintln!();
    }
    index.write_file(&output)?;
    println!(
        "Wrote {} ({} tracks)",
        output.display(),
        index.number_of_tracks()
    );
    Ok(())
}

/// Prints a percentage on stderr whenever it changes. Never cancels.
fn progress_printer() -> impl FnMut(u64, u64) -> bool {
    let mut last = None;
    move |done, total| {
        let percent = if total == 0 { 100 } else { done.min(total) * 100 / total };
        if last != Some(percent) {
            last = Some(percent);
            eprint!("\rIndexing, please wait... {}%", percent);
            let _ = std::io::stderr().flush();
        }
        false
    }
}

fn read_index(path: &Path) -> Result<Index> {
    let file = File::open(path)?;
    let validator = IndexValidator::current(&Capabilities::builtin());
    Ok(Index::read_from(BufReader::new(file), &validator)?)
}

pub fn run_info(args: &InfoArgs) -> Result<()> {
    let index = read_index(&args.index)?;
    let summary = index.summary();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Backend:   {}", summary.decoder);
        println!("File size: {}", summary.file_size);
        println!(
            "{:>5}  {:<9} {:>8} {:>9} {:>12} {:>12}",
            "track", "type", "frames", "keyframes", "duration ms", "samples"
        );
        for track in &summary.tracks {
            println!(
                "{:>5}  {:<9} {:>8} {:>9} {:>12.3} {:>12}",
                track.track,
                track.track_type.to_string(),
                track.frames,
                track.keyframes,
                track.duration_ms,
                track.samples
            );
        }
    }

    if let Some(source) = &args.source {
        if index.matches_source(source)? {
            println!("{} matches the index", source.display());
        } else {
            println!("{} has changed, the index must be rebuilt", source.display());
        }
    }
    Ok(())
}

pub fn run_timecodes(args: &TimecodesArgs) -> Result<()> {
    let index = read_index(&args.index)?;
    let track = index.track(args.track).ok_or(AppError::NoSuchTrack {
        track: args.track,
        count: index.number_of_tracks(),
    })?;
    track.write_timecodes(&args.output)?;
    tracing::info!("Wrote {} timecodes to {:?}", track.len(), args.output);
    Ok(())
}

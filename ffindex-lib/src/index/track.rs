//! Per-track seek table and the lookups performed on it.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{IndexError, Result};
use crate::types::TrackType;

/// One demuxed frame (video) or packet (audio).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameRecord {
    /// Presentation timestamp in track ticks
    pub pts: i64,
    pub keyframe: bool,
    /// Byte offset of the frame payload in the source file
    pub file_pos: u64,
    /// Stored (compressed) payload size
    pub frame_size: u32,
    /// Audio only: decoded samples preceding this packet
    pub sample_start: u64,
    /// Audio only: samples this packet decoded to
    pub sample_count: u32,
    /// Set by [`TrackIndex::sort`]
    pub original_pos: usize,
}

impl FrameRecord {
    pub fn video(pts: i64, keyframe: bool, file_pos: u64, frame_size: u32) -> Self {
        Self {
            pts,
            keyframe,
            file_pos,
            frame_size,
            ..Default::default()
        }
    }

    pub fn audio(
        pts: i64,
        sample_start: u64,
        sample_count: u32,
        keyframe: bool,
        file_pos: u64,
        frame_size: u32,
    ) -> Self {
        Self {
            pts,
            keyframe,
            file_pos,
            frame_size,
            sample_start,
            sample_count,
            original_pos: 0,
        }
    }
}

/// Seek table for a single track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackIndex {
    pub timebase_num: i64,
    pub timebase_den: i64,
    pub track_type: TrackType,
    records: Vec<FrameRecord>,
}

impl TrackIndex {
    pub fn new(track_type: TrackType, timebase_num: i64, timebase_den: i64) -> Self {
        Self {
            timebase_num,
            timebase_den,
            track_type,
            records: Vec::new(),
        }
    }

    pub(crate) fn from_records(
        track_type: TrackType,
        timebase_num: i64,
        timebase_den: i64,
        records: Vec<FrameRecord>,
    ) -> Self {
        Self {
            timebase_num,
            timebase_den,
            track_type,
            records,
        }
    }

    pub fn records(&self) -> &[FrameRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn push(&mut self, record: FrameRecord) {
        self.records.push(record);
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub(crate) fn last_mut(&mut self) -> Option<&mut FrameRecord> {
        self.records.last_mut()
    }

    /// Milliseconds for a PTS (timebases are stored in millisecond units).
    pub fn pts_to_ms(&self, pts: i64) -> f64 {
        if self.timebase_den == 0 {
            return 0.0;
        }
        (pts as i128 * self.timebase_num as i128) as f64 / self.timebase_den as f64
    }

    /// Order records by PTS.
    ///
    /// Afterwards `original_pos` of the record at position `i` holds the
    /// presentation position of the `i`-th record in decode order, so both
    /// directions of the mapping can be recovered.
    pub fn sort(&mut self) {
        for (i, record) in self.records.iter_mut().enumerate() {
            record.original_pos = i;
        }

        // stable: equal PTS keep decode order
        self.records.sort_by_key(|r| r.pts);

        let decode_order: Vec<usize> = self.records.iter().map(|r| r.original_pos).collect();
        for (presentation, decode) in decode_order.into_iter().enumerate() {
            self.records[decode].original_pos = presentation;
        }
    }

    /// Record with the smallest distance to `pts`; ties go to the earlier
    /// record. Returns `None` for an empty track.
    pub fn closest_frame_from_pts(&self, pts: i64) -> Option<usize> {
        let mut best: Option<(usize, u64)> = None;
        for (i, record) in self.records.iter().enumerate() {
            let distance = record.pts.abs_diff(pts);
            match best {
                Some((_, d)) if distance >= d => {}
                _ => best = Some((i, distance)),
            }
        }
        best.map(|(i, _)| i)
    }

    /// Record whose PTS equals `pts` exactly.
    pub fn frame_from_pts(&self, pts: i64) -> Option<usize> {
        self.records.iter().position(|r| r.pts == pts)
    }

    /// Nearest keyframe at or before `frame`, clamped to the track.
    pub fn find_closest_video_keyframe(&self, frame: usize) -> usize {
        if self.records.is_empty() {
            return 0;
        }
        let start = frame.min(self.records.len() - 1);
        (1..=start)
            .rev()
            .find(|&i| self.records[i].keyframe)
            .unwrap_or(0)
    }

    /// Keyframe record from which decoding must start to reach `sample`.
    ///
    /// Looks for the first record starting after `sample` and returns the
    /// last keyframe before it, or the final record when `sample` lies past
    /// every record start.
    pub fn find_closest_audio_keyframe(&self, sample: u64) -> usize {
        let mut last_keyframe = 0;
        for (i, record) in self.records.iter().enumerate() {
            if record.sample_start > sample {
                return last_keyframe;
            }
            if record.keyframe {
                last_keyframe = i;
            }
        }
        self.records.len().saturating_sub(1)
    }

    /// Write a v2 timecode file: one line per record holding its time in
    /// whole milliseconds, truncated toward zero.
    pub fn write_timecodes<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| {
            IndexError::InvalidArgument(format!(
                "Failed to open '{}' for writing: {}",
                path.display(),
                e
            ))
        })?;
        let mut out = BufWriter::new(file);
        self.write_timecodes_to(&mut out)?;
        out.flush()?;
        Ok(())
    }

    pub fn write_timecodes_to<W: Write>(&self, out: &mut W) -> Result<()> {
        writeln!(out, "# timecode format v2")?;
        for record in &self.records {
            writeln!(out, "{}", self.pts_to_ms(record.pts) as i64)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_track(pts: &[i64], keyframes: &[usize]) -> TrackIndex {
        let mut track = TrackIndex::new(TrackType::Video, 1, 1);
        for (i, &p) in pts.iter().enumerate() {
            track.push(FrameRecord::video(p, keyframes.contains(&i), i as u64 * 100, 100));
        }
        track
    }

    #[test]
    fn test_closest_frame_from_pts() {
        let track = video_track(&[0, 100, 250, 400], &[0]);
        assert_eq!(track.closest_frame_from_pts(120), Some(1));
        assert_eq!(track.closest_frame_from_pts(180), Some(2));
        assert_eq!(track.closest_frame_from_pts(-50), Some(0));
        assert_eq!(track.closest_frame_from_pts(10_000), Some(3));
    }

    #[test]
    fn test_closest_frame_tie_prefers_first() {
        let track = video_track(&[0, 100, 200], &[0]);
        assert_eq!(track.closest_frame_from_pts(50), Some(0));
        assert_eq!(track.closest_frame_from_pts(150), Some(1));
    }

    #[test]
    fn test_closest_frame_empty() {
        let track = TrackIndex::new(TrackType::Video, 1, 1);
        assert_eq!(track.closest_frame_from_pts(0), None);
    }

    #[test]
    fn test_frame_from_pts_exact() {
        let track = video_track(&[0, 40, 80], &[0]);
        assert_eq!(track.frame_from_pts(40), Some(1));
        assert_eq!(track.frame_from_pts(41), None);
    }

    #[test]
    fn test_video_keyframe_search() {
        let pts: Vec<i64> = (0..20).map(|i| i * 40).collect();
        let track = video_track(&pts, &[0, 5, 12]);
        assert_eq!(track.find_closest_video_keyframe(9), 5);
        assert_eq!(track.find_closest_video_keyframe(5), 5);
        assert_eq!(track.find_closest_video_keyframe(4), 0);
        assert_eq!(track.find_closest_video_keyframe(25), 12);
    }

    #[test]
    fn test_video_keyframe_none_found() {
        let track = video_track(&[0, 40, 80], &[]);
        assert_eq!(track.find_closest_video_keyframe(2), 0);
    }

    #[test]
    fn test_audio_keyframe_search() {
        let mut track = TrackIndex::new(TrackType::Audio, 1, 1);
        // packets of 1024 samples, keyframes every other packet
        for i in 0..6u64 {
            track.push(FrameRecord::audio(i as i64 * 21, i * 1024, 1024, i % 2 == 0, 0, 10));
        }
        assert_eq!(track.find_closest_audio_keyframe(0), 0);
        assert_eq!(track.find_closest_audio_keyframe(1500), 0);
        assert_eq!(track.find_closest_audio_keyframe(2048), 2);
        assert_eq!(track.find_closest_audio_keyframe(3100), 2);
        assert_eq!(track.find_closest_audio_keyframe(1_000_000), 5);
    }

    #[test]
    fn test_sort_orders_and_maps_positions() {
        // decode order of an IPBB-style stream
        let mut track = video_track(&[0, 120, 40, 80], &[0]);
        track.sort();
        let pts: Vec<i64> = track.records().iter().map(|r| r.pts).collect();
        assert_eq!(pts, vec![0, 40, 80, 120]);

        // record at slot i tells where decode-order frame i ended up
        let mapping: Vec<usize> = track.records().iter().map(|r| r.original_pos).collect();
        assert_eq!(mapping, vec![0, 3, 1, 2]);
    }

    #[test]
    fn test_sort_is_stable_for_ties() {
        let mut track = TrackIndex::new(TrackType::Video, 1, 1);
        track.push(FrameRecord::video(10, true, 1, 1));
        track.push(FrameRecord::video(10, false, 2, 1));
        track.push(FrameRecord::video(5, false, 3, 1));
        track.sort();
        let positions: Vec<u64> = track.records().iter().map(|r| r.file_pos).collect();
        assert_eq!(positions, vec![3, 1, 2]);
    }

    #[test]
    fn test_timecodes_format() {
        // Matroska style: 1ms ticks expressed as 1_000_000 / 1_000_000
        let track = TrackIndex::from_records(
            TrackType::Video,
            1_000_000,
            1_000_000,
            vec![FrameRecord::video(0, true, 0, 1), FrameRecord::video(42, false, 1, 1)],
        );
        let mut out = Vec::new();
        track.write_timecodes_to(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "# timecode format v2\n0\n42\n"
        );
    }

    #[test]
    fn test_timecodes_integer_then_double() {
        // 1/90000 s ticks scaled to ms: num = 1000, den = 90000
        let track = TrackIndex::from_records(
            TrackType::Video,
            1000,
            90000,
            vec![FrameRecord::video(3003, true, 0, 1)],
        );
        let mut out = Vec::new();
        track.write_timecodes_to(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "# timecode format v2\n33\n");
    }

    #[test]
    fn test_timecodes_truncate_toward_zero() {
        let track = TrackIndex::from_records(
            TrackType::Audio,
            1000,
            90000,
            vec![FrameRecord::video(-3003, true, 0, 1), FrameRecord::video(89, false, 1, 1)],
        );
        let mut out = Vec::new();
        track.write_timecodes_to(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "# timecode format v2\n-33\n0\n");
    }

    #[test]
    fn test_pts_to_ms_large_values() {
        // lavf scales the numerator by 1000; pts * num exceeds i64
        let track = TrackIndex::new(TrackType::Video, 1000, 90000);
        let pts = i64::MAX / 100;
        let expected = pts as f64 * 1000.0 / 90000.0;
        let ms = track.pts_to_ms(pts);
        assert!((ms - expected).abs() / expected < 1e-9);
        assert!(track.pts_to_ms(i64::MIN) < 0.0);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn sort_leaves_pts_non_decreasing(pts in proptest::collection::vec(-10_000i64..10_000, 0..200)) {
                let mut track = TrackIndex::new(TrackType::Video, 1, 1);
                for p in &pts {
                    track.push(FrameRecord::video(*p, false, 0, 0));
                }
                track.sort();
                for pair in track.records().windows(2) {
                    prop_assert!(pair[0].pts <= pair[1].pts);
                }
                let mut seen: Vec<usize> = track.records().iter().map(|r| r.original_pos).collect();
                seen.sort_unstable();
                prop_assert_eq!(seen, (0..pts.len()).collect::<Vec<_>>());
            }
        }
    }
}

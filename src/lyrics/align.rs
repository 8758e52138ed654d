//! Grid alignment of timed lyric words.

use std::collections::BTreeMap;

use log::{debug, info};
use serde::Serialize;

use super::{is_melisma, subindex, LyricWord, DEFAULT_WORD_S};
use crate::chord::NO_CHORD;
use crate::config::LyricsConfig;
use crate::error::{Result, TimelineError};
use crate::tempo::{downbeat_beat_abs, GridPosition, TempoMap};
use crate::timeline::{round3, EventType, TimelineRow};

/// Words snapped to the grid, with the offset that was applied to them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedLyrics {
    pub offset_s: f64,
    pub rows: Vec<TimelineRow>,
}

/// Snaps lyric words against one song's tempo map.
#[derive(Debug, Clone)]
pub struct LyricAligner<'a> {
    tempo: &'a TempoMap,
    ts_num: u32,
    pickup_beats: f64,
    snap_div: u32,
    max_offset_s: f64,
    default_confidence: f64,
}

/// A beat split into its whole part and its fraction snapped to `1/div`.
struct SnappedBeat {
    whole: f64,
    frac: f64,
    snapped_frac: f64,
}

impl SnappedBeat {
    fn new(beat: f64, div: u32) -> Self {
        let div = div as f64;
        let whole = beat.floor();
        let frac = beat - whole;
        SnappedBeat {
            whole,
            frac,
            snapped_frac: (frac * div).round() / div,
        }
    }
}

impl<'a> LyricAligner<'a> {
    /// An aligner on a sixteenth-note grid with a ±1.5 s offset window.
    ///
    /// # Errors
    /// `InvalidTimeSignature` when `ts_num` is zero.
    pub fn new(tempo: &'a TempoMap, ts_num: u32, pickup_beats: f64) -> Result<Self> {
        if ts_num == 0 {
            return Err(TimelineError::InvalidTimeSignature { numerator: 0 });
        }
        let defaults = LyricsConfig::default();
        Ok(LyricAligner {
            tempo,
            ts_num,
            pickup_beats,
            snap_div: defaults.snap_div,
            max_offset_s: defaults.max_offset_s,
            default_confidence: defaults.default_confidence,
        })
    }

    pub fn with_config(mut self, cfg: &LyricsConfig) -> Self {
        self.snap_div = cfg.snap_div.max(1);
        self.max_offset_s = cfg.max_offset_s.abs();
        self.default_confidence = cfg.default_confidence;
        self
    }

    pub fn with_snap_div(mut self, snap_div: u32) -> Self {
        self.snap_div = snap_div.max(1);
        self
    }

    fn position(&self, t: f64) -> Result<GridPosition> {
        self.tempo.time_to_bar_beat(t, self.ts_num, self.pickup_beats)
    }

    /// Median distance from each word start to its nearest sub-beat, in seconds,
    /// clamped to the offset window. Zero for no words.
    pub fn global_offset(&self, words: &[LyricWord]) -> Result<f64> {
        if words.is_empty() {
            return Ok(0.0);
        }
        let mut residuals = Vec::with_capacity(words.len());
        for word in words {
            let pos = self.position(word.start_s)?;
            let snap = SnappedBeat::new(pos.beat, self.snap_div);
            let spb = self.tempo.seconds_per_beat_at(word.start_s);
            residuals.push((snap.snapped_frac - snap.frac) * spb);
        }
        residuals.sort_by(|a, b| a.total_cmp(b));
        let median = residuals[residuals.len() / 2];
        let offset = median.clamp(-self.max_offset_s, self.max_offset_s);
        debug!(
            "Lyric offset median {:+.3}s from {} word(s), applying {:+.3}s",
            median,
            residuals.len(),
            offset
        );
        Ok(offset)
    }

    /// One `Lyric` row per word, snapped to the sub-beat grid.
    ///
    /// Words without an end are taken to last 0.25 s. A word is a melisma when
    /// its end falls in a later bar, beat or sub-beat than its snapped start.
    pub fn snap_words(&self, words: &[LyricWord]) -> Result<Vec<TimelineRow>> {
        let div = self.snap_div as i64;
        let beats_per_bar = self.ts_num as f64;
        let mut rows = Vec::with_capacity(words.len());

        for word in words {
            let start = word.start_s;
            let end = word.end_s.unwrap_or(start + DEFAULT_WORD_S);
            let pos = self.position(start)?;
            let snap = SnappedBeat::new(pos.beat, self.snap_div);
            let sub_idx = ((snap.snapped_frac * div as f64).round() as i64).rem_euclid(div) as u32;

            let mut bar = pos.bar;
            let mut beat = snap.whole + snap.snapped_frac;
            if bar == 0 && beat >= 1.0 {
                bar = 1;
                beat = 1.0;
            } else if bar >= 1 && beat >= beats_per_bar + 1.0 {
                bar += 1;
                beat = 1.0;
            }

            let end_pos = self.position(end)?;
            let end_whole = end_pos.beat.floor();
            let end_sub = (((end_pos.beat - end_whole) * div as f64).floor() as i64).clamp(0, div - 1);
            let start_key = (bar, beat.floor() as i64, sub_idx as i64);
            let end_key = (end_pos.bar, end_whole as i64, end_sub);

            let mut row = TimelineRow::at(
                EventType::Lyric,
                bar,
                round3(beat),
                round3(pos.beat_abs),
                round3(start),
            );
            row.lyric = Some(word.text.clone());
            row.lyric_conf = Some(word.confidence.unwrap_or(self.default_confidence));
            row.word_start_s = Some(round3(start));
            row.word_end_s = Some(round3(end));
            row.sub_idx = Some(sub_idx);
            row.melisma = Some(end_key > start_key);
            rows.push(row);
        }
        Ok(rows)
    }

    /// Estimate the global offset, shift every word by it, and snap.
    pub fn align(&self, words: &[LyricWord]) -> Result<AlignedLyrics> {
        let offset_s = self.global_offset(words)?;
        let shifted: Vec<LyricWord> = words.iter().map(|w| w.shifted(offset_s)).collect();
        let rows = self.snap_words(&shifted)?;
        info!("Aligned {} lyric word(s) with offset {:+.3}s", rows.len(), offset_s);
        Ok(AlignedLyrics { offset_s, rows })
    }

    /// One `LyricBar` row per bar that has words.
    ///
    /// The row sits on the bar's downbeat and lasts one bar. Its text joins the
    /// words in start order, its confidence is their mean, and its chord is the
    /// first chord any of its words carries.
    pub fn group_by_bar(&self, rows: &[TimelineRow], joiner: &str) -> Result<Vec<TimelineRow>> {
        let mut by_bar: BTreeMap<i64, Vec<&TimelineRow>> = BTreeMap::new();
        for row in rows.iter().filter(|r| r.event_type == EventType::Lyric) {
            by_bar.entry(row.bar).or_default().push(row);
        }

        let mut out = Vec::with_capacity(by_bar.len());
        for (bar, mut words) in by_bar {
            words.sort_by(|a, b| {
                let a = a.word_start_s.unwrap_or(a.time_s);
                let b = b.word_start_s.unwrap_or(b.time_s);
                a.total_cmp(&b)
            });
            let text = words
                .iter()
                .filter_map(|w| w.lyric.as_deref().map(str::trim))
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(joiner);
            if text.is_empty() {
                continue;
            }

            let downbeat = downbeat_beat_abs(bar, self.ts_num, self.pickup_beats);
            let t0 = self.tempo.seconds_at(downbeat);
            let dur_s = self.ts_num as f64 * self.tempo.seconds_per_beat_at(t0);
            let confs: Vec<f64> = words.iter().filter_map(|w| w.lyric_conf).collect();
            let conf = if confs.is_empty() {
                self.default_confidence
            } else {
                confs.iter().sum::<f64>() / confs.len() as f64
            };
            let chord = words
                .iter()
                .filter_map(|w| w.chord.as_deref())
                .find(|c| !c.is_empty())
                .map(str::to_string);

            let mut row = TimelineRow::at(EventType::LyricBar, bar, 1.0, round3(downbeat), round3(t0));
            row.chord = chord;
            row.dur_beats = Some(self.ts_num as f64);
            row.dur_s = Some(round3(dur_s));
            row.lyric = Some(text);
            row.lyric_conf = Some(round3(conf));
            row.word_start_s = Some(round3(t0));
            row.word_end_s = Some(round3(t0 + dur_s));
            row.sub_idx = Some(0);
            row.melisma = Some(false);
            out.push(row);
        }
        Ok(out)
    }
}

/// `Lyric` rows for words captured live, without snapping.
///
/// Bar and beat are the raw grid position. Words sharing a bar and beat are
/// numbered by [`subindex`]; melisma compares the held length to
/// `threshold_beats` at the local BPM.
pub fn live_word_rows(
    words: &[LyricWord],
    tempo: &TempoMap,
    ts_num: u32,
    pickup_beats: f64,
    threshold_beats: f64,
) -> Result<Vec<TimelineRow>> {
    let mut rows = Vec::with_capacity(words.len());
    for word in words {
        let pos = tempo.time_to_bar_beat(word.start_s, ts_num, pickup_beats)?;
        let mut row = TimelineRow::at(EventType::Lyric, pos.bar, pos.beat, pos.beat_abs, word.start_s);
        row.dur_s = word.end_s.map(|e| round3(e - word.start_s));
        row.lyric = Some(word.text.clone());
        row.lyric_conf = word.confidence;
        row.word_start_s = Some(word.start_s);
        row.word_end_s = word.end_s;
        row.melisma = Some(is_melisma(
            word.start_s,
            word.end_s,
            tempo.bpm_at(word.start_s),
            threshold_beats,
        ));
        rows.push(row);
    }

    let subs = subindex(&rows);
    for (row, sub) in rows.iter_mut().zip(subs) {
        row.sub_idx = Some(sub);
        row.beat = round3(row.beat);
        row.beat_abs = round3(row.beat_abs);
        row.time_s = round3(row.time_s);
        row.word_start_s = row.word_start_s.map(round3);
        row.word_end_s = row.word_end_s.map(round3);
    }
    Ok(rows)
}

/// Stamp each lyric row with the chord sounding at its start.
///
/// The chord in effect is the last `Chord` row starting at or before the word.
/// Words before the first chord, or after the last chord has run out, get `N.C.`.
/// Rows that already carry a chord are left alone.
pub fn attach_chords(lyric_rows: &mut [TimelineRow], chord_rows: &[TimelineRow]) {
    let mut chords: Vec<&TimelineRow> = chord_rows
        .iter()
        .filter(|r| r.event_type == EventType::Chord)
        .collect();
    chords.sort_by(|a, b| a.time_s.total_cmp(&b.time_s));

    for row in lyric_rows.iter_mut() {
        if row.event_type == EventType::Chord || row.chord.is_some() {
            continue;
        }
        let t = row.word_start_s.unwrap_or(row.time_s);
        let idx = chords.partition_point(|c| c.time_s <= t + 1e-9);
        let active = idx.checked_sub(1).map(|i| chords[i]).filter(|c| {
            idx < chords.len() || c.dur_s.map_or(true, |d| t < c.time_s + d)
        });
        let label = active
            .and_then(|c| c.chord.clone())
            .unwrap_or_else(|| NO_CHORD.to_string());
        row.chord = Some(label);
    }
}

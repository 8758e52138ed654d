//! # Grid Quantizer
//!
//! Snaps tick-stamped chord events onto the bar grid and turns them into
//! [`TimelineRow`]s with well-formed durations.
//!
//! ## Pipeline
//! 1. [`adaptive_snap`] pre-quantizes ticks to 1/8 beat, pulls events near a bar
//!    start onto it, and re-snaps with a wider window when most events already
//!    sit on downbeats.
//! 2. [`build_chord_rows`] anchors Bar 1 with `N.C.`, derives bar/beat from ticks,
//!    and quantizes each event's duration up to the next event.
//! 3. [`apply_bar_offset`] shifts bar numbers once every other pass is done.
//!
//! Bar length here is `numerator * 4 / denominator` quarter-note beats, so a 6/8
//! chord grid has three-beat bars.
//!
//! ## Example
//! ```rust
//! use chartgrid::quantize::{build_chord_rows, RawChordEvent};
//! use chartgrid::{TempoMap, TimeSignature};
//!
//! let events = vec![RawChordEvent::text(1920, "Am"), RawChordEvent::text(3840, "F")];
//! let rows = build_chord_rows(&events, 480, TimeSignature::default(), &TempoMap::constant(120.0));
//!
//! // Bar 1 is anchored with N.C.
//! assert_eq!(rows[0].chord.as_deref(), Some("N.C."));
//! assert_eq!((rows[1].bar, rows[1].beat), (2, 1.0));
//! assert_eq!(rows[1].dur_beats, Some(4.0));
//! ```

use log::debug;
use serde::{Deserialize, Serialize};

use crate::chord::{normalize_symbol, NO_CHORD};
use crate::tempo::{TempoMap, TimeSignature};
use crate::timeline::{round3, ChordEvent, ChordSource, EventType, TimelineRow};

/// Share of events that must sit near a downbeat before the window is widened.
const TIGHTEN_RATIO: f64 = 0.7;

/// Downbeat window, in beats, used by the tightening pass.
const TIGHTEN_BEATS: f64 = 0.9;

/// Minimum emitted chord duration in seconds.
const MIN_DUR_S: f64 = 0.25;

/// A chord label at an absolute MIDI tick, before quantization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawChordEvent {
    pub tick: u64,
    pub label: String,
    pub source: ChordSource,
}

impl RawChordEvent {
    pub fn text(tick: u64, label: impl Into<String>) -> Self {
        RawChordEvent {
            tick,
            label: label.into(),
            source: ChordSource::Text,
        }
    }

    pub fn inferred(tick: u64, label: impl Into<String>) -> Self {
        RawChordEvent {
            tick,
            label: label.into(),
            source: ChordSource::Inferred,
        }
    }

    /// An `N.C.` placeholder on a bar line.
    pub fn grid(tick: u64) -> Self {
        RawChordEvent {
            tick,
            label: NO_CHORD.to_string(),
            source: ChordSource::Grid,
        }
    }

    /// Place this event in seconds and give it its canonical symbol.
    pub fn to_chord_event(&self, ppqn: u32, tempo: &TempoMap) -> ChordEvent {
        ChordEvent {
            time_s: round3(tempo.tick_to_seconds(self.tick, ppqn)),
            tick: Some(self.tick),
            raw_label: self.label.clone(),
            symbol: canonical_or_no_chord(&self.label),
            source: self.source,
        }
    }
}

/// Round `v` to the nearest multiple of `step` when it is within `tol` of it.
pub fn snap_within(v: f64, step: f64, tol: f64) -> f64 {
    if step <= 0.0 {
        return v;
    }
    let q = (v / step).round() * step;
    if (v - q).abs() <= tol {
        q
    } else {
        v
    }
}

fn nearest_bar_start(tick: u64, ticks_per_bar: u64) -> u64 {
    ((tick as f64 / ticks_per_bar as f64).round() as u64) * ticks_per_bar
}

/// Pull events onto the nearest bar start when within `snap_beats`.
///
/// Ticks are first rounded to a 1/8-beat grid. Events landing on the same tick keep
/// the later one, then runs of the same canonical symbol collapse to their first
/// event. Bar-grid placeholders never collapse.
pub fn snap_to_downbeats(
    events: &[RawChordEvent],
    ppqn: u32,
    ts: TimeSignature,
    snap_beats: f64,
) -> Vec<RawChordEvent> {
    if events.is_empty() {
        return Vec::new();
    }
    let ticks_per_bar = ts.ticks_per_bar(ppqn);
    let snap_ticks = (ppqn as f64 * snap_beats).round().max(0.0) as u64;
    let q = (ppqn as u64 / 8).max(1);

    let mut sorted = events.to_vec();
    sorted.sort_by_key(|e| e.tick);

    let mut on_tick: Vec<RawChordEvent> = Vec::with_capacity(sorted.len());
    for mut ev in sorted {
        let mut t = ((ev.tick as f64 / q as f64).round() as u64) * q;
        let nearest = nearest_bar_start(t, ticks_per_bar);
        if nearest.abs_diff(t) <= snap_ticks {
            t = nearest;
        }
        ev.tick = t;
        match on_tick.last_mut() {
            Some(last) if last.tick == ev.tick => *last = ev,
            _ => on_tick.push(ev),
        }
    }

    let mut merged: Vec<RawChordEvent> = Vec::with_capacity(on_tick.len());
    for ev in on_tick {
        let repeated = merged.last().is_some_and(|last| {
            !(last.source == ChordSource::Grid && ev.source == ChordSource::Grid)
                && canonical_or_no_chord(&last.label) == canonical_or_no_chord(&ev.label)
        });
        if repeated {
            continue;
        }
        merged.push(ev);
    }
    merged
}

/// Snap once, then re-snap with a 0.9-beat window when at least 70% of events
/// already lie within 0.9 beats of a bar start.
///
/// A non-positive `snap_beats` disables snapping and only sorts the events.
pub fn adaptive_snap(
    events: &[RawChordEvent],
    ppqn: u32,
    ts: TimeSignature,
    snap_beats: f64,
) -> Vec<RawChordEvent> {
    if snap_beats <= 0.0 {
        let mut sorted = events.to_vec();
        sorted.sort_by_key(|e| e.tick);
        return sorted;
    }
    let snapped = snap_to_downbeats(events, ppqn, ts, snap_beats);
    if snapped.is_empty() {
        return snapped;
    }

    let ticks_per_bar = ts.ticks_per_bar(ppqn);
    let window = (ppqn as f64 * TIGHTEN_BEATS) as u64;
    let near = snapped
        .iter()
        .filter(|e| nearest_bar_start(e.tick, ticks_per_bar).abs_diff(e.tick) <= window)
        .count();
    let ratio = near as f64 / snapped.len() as f64;
    if ratio >= TIGHTEN_RATIO {
        debug!(
            "{:.0}% of chord events near downbeats, re-snapping at {} beats",
            ratio * 100.0,
            snap_beats.max(TIGHTEN_BEATS)
        );
        snap_to_downbeats(&snapped, ppqn, ts, snap_beats.max(TIGHTEN_BEATS))
    } else {
        snapped
    }
}

/// Quantize a raw duration in beats.
///
/// Whole bars win within 0.10 beat, else the nearest 1/8 beat within 0.06 beat,
/// else the raw value. Never shorter than 0.125 beat (0.25 beat on the bar path).
///
/// # Examples
/// ```
/// use chartgrid::quantize::quantize_duration_beats;
///
/// assert_eq!(quantize_duration_beats(7.95, 4.0), 8.0);
/// assert_eq!(quantize_duration_beats(1.52, 4.0), 1.5);
/// assert_eq!(quantize_duration_beats(0.01, 4.0), 0.125);
/// ```
pub fn quantize_duration_beats(raw: f64, beats_per_bar: f64) -> f64 {
    if beats_per_bar > 0.0 {
        let bar_mult = (raw / beats_per_bar).round();
        if bar_mult >= 1.0 && (raw - bar_mult * beats_per_bar).abs() <= 0.10 {
            return (bar_mult * beats_per_bar).max(0.25);
        }
    }
    snap_within(raw, 0.125, 0.06).max(0.125)
}

fn canonical_or_no_chord(label: &str) -> String {
    let symbol = normalize_symbol(label);
    if symbol.is_empty() {
        NO_CHORD.to_string()
    } else {
        symbol
    }
}

/// Turn snapped chord events into `Chord` rows.
///
/// When the first event starts after tick 0 an `N.C.` event is inserted at tick 0.
/// The last event lasts one bar.
pub fn build_chord_rows(
    events: &[RawChordEvent],
    ppqn: u32,
    ts: TimeSignature,
    tempo: &TempoMap,
) -> Vec<TimelineRow> {
    let Some(first) = events.first() else {
        return Vec::new();
    };
    let ppqn = ppqn.max(1);
    let mut anchored = Vec::with_capacity(events.len() + 1);
    if first.tick > 0 {
        anchored.push(RawChordEvent::text(0, NO_CHORD));
    }
    anchored.extend(events.iter().cloned());

    let beats_per_bar = ts.beats_per_bar();
    let ticks_per_bar = ts.ticks_per_bar(ppqn);
    let ppqn_f = ppqn as f64;

    let mut rows = Vec::with_capacity(anchored.len());
    for (i, ev) in anchored.iter().enumerate() {
        let tick = ev.tick;
        let beat_abs = tick as f64 / ppqn_f;

        let mut bar = (beat_abs / beats_per_bar).floor() as i64 + 1;
        let beat_raw = beat_abs.rem_euclid(beats_per_bar) + 1.0;
        let mut beat = snap_within(beat_raw, 1.0, 0.02);
        if beat == beat_raw {
            beat = snap_within(beat_raw, 0.25, 0.02);
        }
        if beat >= beats_per_bar + 1.0 && bar >= 1 {
            bar += 1;
            beat = 1.0;
        }

        let next_tick = anchored
            .get(i + 1)
            .map(|next| next.tick)
            .unwrap_or(tick + ticks_per_bar)
            .max(tick);
        let dur_beats = quantize_duration_beats((next_tick - tick) as f64 / ppqn_f, beats_per_bar);
        let start_s = tempo.tick_to_seconds(tick, ppqn);
        let dur_s = round3(tempo.tick_to_seconds(next_tick, ppqn) - start_s).max(MIN_DUR_S);

        let mut row = TimelineRow::at(
            EventType::Chord,
            bar,
            round3(beat),
            round3(snap_within(beat_abs, 0.25, 0.02)),
            round3(start_s),
        );
        row.chord = Some(canonical_or_no_chord(&ev.label));
        row.dur_beats = Some(round3(dur_beats));
        row.dur_s = Some(dur_s);
        rows.push(row);
    }
    rows
}

/// Shift every row's bar number by `offset`.
pub fn apply_bar_offset(rows: &mut [TimelineRow], offset: i64) {
    if offset == 0 {
        return;
    }
    for row in rows.iter_mut() {
        row.offset_bar(offset);
    }
}

//! # Tempo Map
//!
//! Piecewise-constant tempo model converting between ticks, seconds and beats.
//!
//! ## Purpose
//! Every other stage of the engine places events on a musical grid. The tempo
//! map answers the two questions they all need:
//! - how many quarter-note beats have elapsed at a wall-clock time (`beats_at`)
//! - at what wall-clock time a given beat sounds (`seconds_at`)
//!
//! Both are answered by binary search over the segment starts plus a cumulative
//! beat count precomputed at each segment boundary, so a map is built once per
//! source file and then shared read-only.
//!
//! ## Bar/beat numbering
//! `time_to_bar_beat` subtracts the pickup (anacrusis) from the absolute beat and
//! divides by the time-signature numerator. Bars and beats are 1-based. Anything
//! before the pickup-adjusted downbeat lands in bar 0 with the beat counting
//! down from 1 (`beat = 1 + rel`, `rel < 0`).
//!
//! The numerator alone defines the bar length in this domain: a 6/8 bar is six
//! quarter-note beats long. Consumers of the produced rows rely on that.
//!
//! ## Example
//! ```rust
//! use chartgrid::{TempoMap, TempoSegment};
//!
//! let map = TempoMap::new(vec![TempoSegment::new(0.0, 60.0)]).unwrap();
//! let pos = map.time_to_bar_beat(1.0, 4, 0.0).unwrap();
//! assert_eq!((pos.bar, pos.beat, pos.beat_abs), (1, 2.0, 1.0));
//!
//! // One beat of pickup moves the Bar 1 downbeat to t = 1s.
//! let pos = map.time_to_bar_beat(1.0, 4, 1.0).unwrap();
//! assert_eq!((pos.bar, pos.beat), (1, 1.0));
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, TimelineError};

/// Tempo used when a source carries no tempo information.
pub const DEFAULT_BPM: f64 = 120.0;

/// BPM never drops below this, so beat/second conversions never divide by zero.
pub const MIN_BPM: f64 = 1e-6;

/// One constant-tempo stretch starting at `start_s` (and `start_tick` when the
/// map was derived from MIDI).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoSegment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_tick: Option<u64>,
    pub start_s: f64,
    pub bpm: f64,
}

impl TempoSegment {
    pub fn new(start_s: f64, bpm: f64) -> Self {
        TempoSegment {
            start_tick: None,
            start_s,
            bpm,
        }
    }

    pub fn at_tick(start_tick: u64, start_s: f64, bpm: f64) -> Self {
        TempoSegment {
            start_tick: Some(start_tick),
            start_s,
            bpm,
        }
    }

    fn beats_per_second(&self) -> f64 {
        self.bpm.max(MIN_BPM) / 60.0
    }

    fn seconds_per_beat(&self) -> f64 {
        60.0 / self.bpm.max(MIN_BPM)
    }
}

/// Time signature as notated. Beats are always quarter notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u32,
    pub denominator: u32,
}

impl Default for TimeSignature {
    fn default() -> Self {
        TimeSignature {
            numerator: 4,
            denominator: 4,
        }
    }
}

impl TimeSignature {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        TimeSignature {
            numerator,
            denominator,
        }
    }

    /// Bar length in quarter-note beats (`numerator * 4 / denominator`).
    ///
    /// Used by the tick-domain quantizer. A zero denominator is treated as 4.
    pub fn beats_per_bar(&self) -> f64 {
        let den = if self.denominator == 0 { 4 } else { self.denominator };
        self.numerator as f64 * (4.0 / den as f64)
    }

    /// Bar length in ticks, never less than one tick.
    pub fn ticks_per_bar(&self, ppqn: u32) -> u64 {
        let ticks = (ppqn as f64 * self.beats_per_bar()).round() as u64;
        if ticks > 0 {
            ticks
        } else {
            (ppqn as u64 * self.numerator as u64).max(1)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.numerator == 0 {
            return Err(TimelineError::InvalidTimeSignature { numerator: 0 });
        }
        Ok(())
    }
}

/// A derived position on the bar/beat grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridPosition {
    /// 1-based bar; 0 before the pickup-adjusted downbeat.
    pub bar: i64,
    /// 1-based beat within the bar, fractional.
    pub beat: f64,
    /// Beats elapsed since t = 0.
    pub beat_abs: f64,
}

/// An immutable, non-empty, time-ordered list of tempo segments.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoMap {
    segments: Vec<TempoSegment>,
    starts: Vec<f64>,
    cum_beats: Vec<f64>,
}

impl TempoMap {
    /// Build a map from segments in any order.
    ///
    /// Segments are sorted by `start_s` (then `start_tick`). When two segments share a
    /// `start_tick`, the one listed last wins.
    pub fn new(mut segments: Vec<TempoSegment>) -> Result<Self> {
        if segments.is_empty() {
            return Err(TimelineError::EmptyTempoMap);
        }

        segments.sort_by(|a, b| {
            a.start_s
                .total_cmp(&b.start_s)
                .then(a.start_tick.cmp(&b.start_tick))
        });

        let mut deduped: Vec<TempoSegment> = Vec::with_capacity(segments.len());
        for seg in segments {
            match deduped.last_mut() {
                Some(last) if last.start_tick.is_some() && last.start_tick == seg.start_tick => {
                    *last = seg;
                }
                _ => deduped.push(seg),
            }
        }

        let starts: Vec<f64> = deduped.iter().map(|s| s.start_s).collect();
        let mut cum_beats = Vec::with_capacity(deduped.len());
        let mut cum = 0.0;
        cum_beats.push(0.0);
        for pair in deduped.windows(2) {
            let dur_s = (pair[1].start_s - pair[0].start_s).max(0.0);
            cum += dur_s * pair[0].beats_per_second();
            cum_beats.push(cum);
        }

        Ok(TempoMap {
            segments: deduped,
            starts,
            cum_beats,
        })
    }

    /// A single-segment map at `bpm`.
    pub fn constant(bpm: f64) -> Self {
        TempoMap {
            segments: vec![TempoSegment::at_tick(0, 0.0, bpm)],
            starts: vec![0.0],
            cum_beats: vec![0.0],
        }
    }

    /// Build a map from MIDI tempo changes given as `(tick, bpm)`.
    ///
    /// Duplicate ticks keep the last tempo. The first tempo applies from tick 0 even
    /// when its event comes later. No events yields a constant 120 BPM map.
    pub fn from_tick_tempos(ppqn: u32, events: &[(u64, f64)]) -> Self {
        if events.is_empty() {
            return TempoMap::constant(DEFAULT_BPM);
        }
        let ppqn = ppqn.max(1) as f64;

        let mut sorted = events.to_vec();
        sorted.sort_by_key(|(tick, _)| *tick);
        let mut changes: Vec<(u64, f64)> = Vec::with_capacity(sorted.len());
        for (tick, bpm) in sorted {
            match changes.last_mut() {
                Some(last) if last.0 == tick => last.1 = bpm,
                _ => changes.push((tick, bpm)),
            }
        }
        changes[0].0 = 0;

        let mut segments = Vec::with_capacity(changes.len());
        let mut secs = 0.0;
        for (i, &(tick, bpm)) in changes.iter().enumerate() {
            if i > 0 {
                let (prev_tick, prev_bpm) = changes[i - 1];
                let dticks = tick.saturating_sub(prev_tick) as f64;
                secs += (dticks / ppqn) * (60.0 / prev_bpm.max(MIN_BPM));
            }
            segments.push(TempoSegment::at_tick(tick, secs, bpm));
        }

        // Ticks are strictly increasing after dedup, so start_s is non-decreasing
        // and `new` cannot fail here.
        TempoMap::new(segments).unwrap_or_else(|_| TempoMap::constant(DEFAULT_BPM))
    }

    pub fn segments(&self) -> &[TempoSegment] {
        &self.segments
    }

    fn segment_index_at(&self, t: f64) -> usize {
        let idx = self.starts.partition_point(|&start| start <= t);
        idx.saturating_sub(1).min(self.segments.len() - 1)
    }

    /// Absolute beats elapsed at `t` seconds.
    pub fn beats_at(&self, t: f64) -> f64 {
        let i = self.segment_index_at(t);
        let seg = &self.segments[i];
        let local_s = (t - seg.start_s).max(0.0);
        self.cum_beats[i] + local_s * seg.beats_per_second()
    }

    /// Wall-clock seconds at which `beat_abs` sounds.
    pub fn seconds_at(&self, beat_abs: f64) -> f64 {
        let idx = self.cum_beats.partition_point(|&b| b <= beat_abs);
        let i = idx.saturating_sub(1).min(self.segments.len() - 1);
        let seg = &self.segments[i];
        let remaining = (beat_abs - self.cum_beats[i]).max(0.0);
        seg.start_s + remaining * seg.seconds_per_beat()
    }

    /// BPM of the segment in effect at `t`.
    pub fn bpm_at(&self, t: f64) -> f64 {
        self.segments[self.segment_index_at(t)].bpm.max(MIN_BPM)
    }

    /// Seconds per beat at `t`.
    pub fn seconds_per_beat_at(&self, t: f64) -> f64 {
        60.0 / self.bpm_at(t)
    }

    /// Seconds at an absolute MIDI tick.
    ///
    /// Uses the latest segment whose `start_tick` is at or before `tick`. Segments
    /// without a tick anchor fall back to a beat-domain lookup.
    pub fn tick_to_seconds(&self, tick: u64, ppqn: u32) -> f64 {
        let ppqn = ppqn.max(1) as f64;
        if self.segments.iter().any(|s| s.start_tick.is_none()) {
            return self.seconds_at(tick as f64 / ppqn);
        }
        let idx = self
            .segments
            .partition_point(|s| s.start_tick.unwrap_or(0) <= tick);
        let seg = &self.segments[idx.saturating_sub(1)];
        let dticks = tick.saturating_sub(seg.start_tick.unwrap_or(0)) as f64;
        seg.start_s + (dticks / ppqn) * seg.seconds_per_beat()
    }

    /// Map seconds to a bar/beat position.
    ///
    /// # Errors
    /// `InvalidTimeSignature` when `ts_num` is zero.
    pub fn time_to_bar_beat(&self, t: f64, ts_num: u32, pickup_beats: f64) -> Result<GridPosition> {
        let beat_abs = self.beats_at(t);
        position_from_beats(beat_abs, ts_num, pickup_beats)
    }
}

/// Split an absolute beat into bar and in-bar beat.
pub fn position_from_beats(beat_abs: f64, ts_num: u32, pickup_beats: f64) -> Result<GridPosition> {
    if ts_num == 0 {
        return Err(TimelineError::InvalidTimeSignature { numerator: 0 });
    }
    let per_bar = ts_num as f64;
    let rel = beat_abs - pickup_beats;
    let (bar, beat) = if rel < 0.0 {
        (0, 1.0 + rel)
    } else {
        (1 + (rel / per_bar).floor() as i64, 1.0 + rel.rem_euclid(per_bar))
    };
    Ok(GridPosition {
        bar,
        beat,
        beat_abs,
    })
}

/// Absolute beat of a bar's downbeat (`bar` is 1-based; bars below 1 clamp to 1).
pub fn downbeat_beat_abs(bar: i64, ts_num: u32, pickup_beats: f64) -> f64 {
    pickup_beats + ts_num as f64 * (bar - 1).max(0) as f64
}

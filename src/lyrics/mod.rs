//! # Lyrics Module
//!
//! Put externally timed lyric words on the same bar/beat grid as the chords.
//!
//! ## Purpose
//! Timed lyrics arrive from an outside source (an LRC download, a subtitle file, a
//! live transcriber) with wall-clock timestamps that rarely match the recording's
//! grid exactly. This module:
//! 1. **Parses** LRC tags and WebVTT cues into [`LyricWord`]s
//! 2. **Estimates** one global offset that pulls the words onto the sub-beat grid
//! 3. **Snaps** each word to a sub-beat and flags words held across a grid boundary
//! 4. **Aggregates** words into one `LyricBar` row per bar
//!
//! ## Sub-modules
//! - `parse` - LRC and WebVTT readers
//! - `align` - offset estimation, snapping, bar aggregation, chord stamping
//!
//! ## Example
//! ```rust
//! use chartgrid::lyrics::{LyricAligner, LyricWord};
//! use chartgrid::TempoMap;
//!
//! let tempo = TempoMap::constant(60.0);
//! let aligner = LyricAligner::new(&tempo, 4, 0.0).unwrap();
//! let words = vec![LyricWord::new("hel", 4.0).with_end(4.2), LyricWord::new("lo", 4.5)];
//!
//! let aligned = aligner.align(&words).unwrap();
//! assert_eq!(aligned.rows[0].bar, 2);
//! assert_eq!(aligned.rows[1].sub_idx, Some(2));
//!
//! let bars = aligner.group_by_bar(&aligned.rows, " ").unwrap();
//! assert_eq!(bars[0].lyric.as_deref(), Some("hel lo"));
//! ```
//!
//! ## Related Modules
//! - `tempo` - the shared map every position comes from
//! - `quantize` - the chord rows that lyrics get stamped with

mod align;
mod parse;

#[cfg(test)]
mod tests;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::timeline::TimelineRow;

pub use align::{attach_chords, live_word_rows, AlignedLyrics, LyricAligner};
pub use parse::{parse_lrc, parse_lyrics, parse_vtt};

/// Seconds a word is assumed to last when its end is unknown.
pub const DEFAULT_WORD_S: f64 = 0.25;

/// One timed word (or line) from a lyric source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricWord {
    pub text: String,
    pub start_s: f64,
    #[serde(default)]
    pub end_s: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl LyricWord {
    pub fn new(text: impl Into<String>, start_s: f64) -> Self {
        LyricWord {
            text: text.into(),
            start_s,
            end_s: None,
            confidence: None,
        }
    }

    pub fn with_end(mut self, end_s: f64) -> Self {
        self.end_s = Some(end_s);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Shift start and end by `offset_s`.
    pub fn shifted(&self, offset_s: f64) -> Self {
        LyricWord {
            text: self.text.clone(),
            start_s: self.start_s + offset_s,
            end_s: self.end_s.map(|e| e + offset_s),
            confidence: self.confidence,
        }
    }
}

/// Number words that share a bar and beat, in start-time order.
///
/// Returns one index per row, aligned with the input. Beats are compared after
/// rounding to six decimals.
///
/// # Examples
/// ```
/// use chartgrid::lyrics::subindex;
/// use chartgrid::{EventType, TimelineRow};
///
/// let mut a = TimelineRow::at(EventType::Lyric, 1, 2.0, 1.0, 1.1);
/// a.word_start_s = Some(1.1);
/// let mut b = TimelineRow::at(EventType::Lyric, 1, 2.0, 1.0, 1.0);
/// b.word_start_s = Some(1.0);
/// assert_eq!(subindex(&[a, b]), vec![1, 0]);
/// ```
pub fn subindex(rows: &[TimelineRow]) -> Vec<u32> {
    let mut buckets: HashMap<(i64, i64), Vec<(usize, f64)>> = HashMap::new();
    for (i, row) in rows.iter().enumerate() {
        let key = (row.bar, (row.beat * 1e6).round() as i64);
        let start = row.word_start_s.unwrap_or(row.time_s);
        buckets.entry(key).or_default().push((i, start));
    }

    let mut result = vec![0; rows.len()];
    for mut members in buckets.into_values() {
        members.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        for (sub, (i, _)) in members.into_iter().enumerate() {
            result[i] = sub as u32;
        }
    }
    result
}

/// True when a word is held at least `threshold_beats` at `bpm`.
///
/// An unknown end is never a melisma. A non-positive BPM is read as 60.
///
/// # Examples
/// ```
/// use chartgrid::lyrics::is_melisma;
///
/// assert!(is_melisma(0.0, Some(1.0), 60.0, 1.0));
/// assert!(!is_melisma(0.0, Some(0.99), 60.0, 1.0));
/// assert!(!is_melisma(0.0, None, 60.0, 1.0));
/// ```
pub fn is_melisma(start_s: f64, end_s: Option<f64>, bpm: f64, threshold_beats: f64) -> bool {
    let Some(end_s) = end_s else {
        return false;
    };
    let bpm = if bpm > 0.0 { bpm } else { 60.0 };
    let held_s = (end_s - start_s).max(0.0);
    held_s / (60.0 / bpm) >= threshold_beats
}

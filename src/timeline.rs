//! # Timeline Types
//!
//! The records the engine hands to downstream storage.
//!
//! A [`TimelineRow`] is one fact on the song's grid: a chord change, a lyric word, or
//! a bar's worth of lyrics. Rows serialize in a fixed column order ([`HEADERS`]) so an
//! external row store can append them without knowing the engine's types.
//!
//! ## Row kinds
//! - `Chord` - one per quantized chord event, with durations
//! - `Lyric` - one per aligned word, with word start/end, sub-beat index and melisma
//! - `LyricBar` - one per bar, joining the bar's words and anchored at its downbeat

use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::export::timecode;

/// Column order of every emitted row.
pub const HEADERS: [&str; 18] = [
    "Bar",
    "Beat",
    "BeatAbs",
    "Time_s",
    "Timecode",
    "Chord",
    "Section",
    "Dur_beats",
    "Dur_s",
    "Lyric",
    "Lyric_conf",
    "EventType",
    "WordStart_s",
    "WordEnd_s",
    "SubIdx",
    "Melisma",
    "Chord_conf",
    "Section_conf",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Chord,
    Lyric,
    LyricBar,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventType::Chord => "Chord",
            EventType::Lyric => "Lyric",
            EventType::LyricBar => "LyricBar",
        };
        f.write_str(s)
    }
}

/// Structural role of a bar range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectionName {
    Intro,
    Verse,
    Chorus,
    Outro,
}

impl fmt::Display for SectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SectionName::Intro => "Intro",
            SectionName::Verse => "Verse",
            SectionName::Chorus => "Chorus",
            SectionName::Outro => "Outro",
        };
        f.write_str(s)
    }
}

/// An inclusive, 1-based bar range carrying one section name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionLabel {
    pub name: SectionName,
    pub bar_start: i64,
    pub bar_end: i64,
}

/// Where a chord symbol came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChordSource {
    /// A text or marker event in the source file.
    Text,
    /// Recognized from sounding notes.
    Inferred,
    /// A one-per-bar `N.C.` placeholder for a file with no chord information.
    Grid,
}

/// A chord placed on the tick grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordEvent {
    pub time_s: f64,
    pub tick: Option<u64>,
    pub raw_label: String,
    pub symbol: String,
    pub source: ChordSource,
}

/// One emitted timeline fact.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineRow {
    pub bar: i64,
    pub beat: f64,
    pub beat_abs: f64,
    pub time_s: f64,
    pub chord: Option<String>,
    pub section: Option<SectionName>,
    pub dur_beats: Option<f64>,
    pub dur_s: Option<f64>,
    pub lyric: Option<String>,
    pub lyric_conf: Option<f64>,
    pub event_type: EventType,
    pub word_start_s: Option<f64>,
    pub word_end_s: Option<f64>,
    pub sub_idx: Option<u32>,
    pub melisma: Option<bool>,
    pub chord_conf: Option<f64>,
    pub section_conf: Option<f64>,
}

impl TimelineRow {
    /// A row at a grid position with every optional column empty.
    pub fn at(event_type: EventType, bar: i64, beat: f64, beat_abs: f64, time_s: f64) -> Self {
        TimelineRow {
            bar,
            beat,
            beat_abs,
            time_s,
            chord: None,
            section: None,
            dur_beats: None,
            dur_s: None,
            lyric: None,
            lyric_conf: None,
            event_type,
            word_start_s: None,
            word_end_s: None,
            sub_idx: None,
            melisma: None,
            chord_conf: None,
            section_conf: None,
        }
    }

    pub fn timecode(&self) -> String {
        timecode(self.time_s)
    }

    /// The row as strings in [`HEADERS`] order; empty columns are empty strings.
    pub fn to_record(&self) -> Vec<String> {
        fn opt<T: ToString>(v: &Option<T>) -> String {
            v.as_ref().map(|x| x.to_string()).unwrap_or_default()
        }
        vec![
            self.bar.to_string(),
            self.beat.to_string(),
            self.beat_abs.to_string(),
            self.time_s.to_string(),
            self.timecode(),
            opt(&self.chord),
            opt(&self.section),
            opt(&self.dur_beats),
            opt(&self.dur_s),
            opt(&self.lyric),
            opt(&self.lyric_conf),
            self.event_type.to_string(),
            opt(&self.word_start_s),
            opt(&self.word_end_s),
            opt(&self.sub_idx),
            opt(&self.melisma.map(u8::from)),
            opt(&self.chord_conf),
            opt(&self.section_conf),
        ]
    }

    /// Shift the bar number, e.g. to show a count-in as negative bars.
    pub fn offset_bar(&mut self, offset: i64) {
        self.bar += offset;
    }
}

impl Serialize for TimelineRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("TimelineRow", HEADERS.len())?;
        s.serialize_field("Bar", &self.bar)?;
        s.serialize_field("Beat", &self.beat)?;
        s.serialize_field("BeatAbs", &self.beat_abs)?;
        s.serialize_field("Time_s", &self.time_s)?;
        s.serialize_field("Timecode", &self.timecode())?;
        s.serialize_field("Chord", &self.chord)?;
        s.serialize_field("Section", &self.section)?;
        s.serialize_field("Dur_beats", &self.dur_beats)?;
        s.serialize_field("Dur_s", &self.dur_s)?;
        s.serialize_field("Lyric", &self.lyric)?;
        s.serialize_field("Lyric_conf", &self.lyric_conf)?;
        s.serialize_field("EventType", &self.event_type)?;
        s.serialize_field("WordStart_s", &self.word_start_s)?;
        s.serialize_field("WordEnd_s", &self.word_end_s)?;
        s.serialize_field("SubIdx", &self.sub_idx)?;
        s.serialize_field("Melisma", &self.melisma.map(u8::from))?;
        s.serialize_field("Chord_conf", &self.chord_conf)?;
        s.serialize_field("Section_conf", &self.section_conf)?;
        s.end()
    }
}

/// Round to millisecond / thousandth-of-a-beat precision for emitted columns.
pub(crate) fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

//! # MIDI Ingestion
//!
//! Read a Standard MIDI File into the plain structure the timeline engine works on.
//!
//! ## Purpose
//! A captured `.mid` file carries everything the engine needs, scattered across
//! tracks: tempo and time-signature meta events, chord labels typed as text or
//! marker events, and the notes themselves. [`ParsedMidi`] gathers them onto one
//! absolute tick axis; [`ParsedMidi::chord_events`] then decides where the song's
//! chords come from:
//!
//! 1. **Text** - text/marker events that parse as chord labels
//! 2. **Notes** - when there are too few labels, chords are recognized from the
//!    notes sounding on a half-beat grid (drums excluded) and snapped to downbeats
//! 3. **Bar grid** - with neither, one `N.C.` per bar keeps the grid intact
//!
//! ## Example
//! ```rust
//! use chartgrid::midi::bpm_hint_from_name;
//!
//! assert_eq!(bpm_hint_from_name("Song_128_BPM.mid"), Some(128.0));
//! assert_eq!(bpm_hint_from_name("take (96.5 bpm).mid"), Some(96.5));
//! assert_eq!(bpm_hint_from_name("take 900bpm.mid"), None);
//! ```

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use log::{debug, info, warn};
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::chord::{detect_chord_name, is_chord_label};
use crate::config::MidiConfig;
use crate::error::{Result, TimelineError};
use crate::quantize::{snap_to_downbeats, RawChordEvent};
use crate::tempo::{TempoMap, TimeSignature, DEFAULT_BPM};

/// General MIDI percussion channel (channel 10, 0-based 9).
pub const DRUM_CHANNEL: u8 = 9;

/// Downbeat window, in beats, for chords recognized from notes.
const INFERRED_SNAP_BEATS: f64 = 0.9;

static BPM_IN_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*[_\-\s]*BPM").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextKind {
    Text,
    /// Marker and cue-point events.
    Marker,
    Lyric,
}

/// A text-like meta event at an absolute tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextEvent {
    pub tick: u64,
    pub text: String,
    pub kind: TextKind,
}

/// A note from note-on to note-off. `tick_off` is `None` when the file never
/// released it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteSpan {
    pub tick_on: u64,
    pub tick_off: Option<u64>,
    pub pitch: u8,
    pub velocity: u8,
    pub channel: u8,
    pub program: u8,
}

/// Everything the engine reads from a MIDI file, on one absolute tick axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedMidi {
    pub ppqn: u32,
    pub time_sig: TimeSignature,
    /// `(tick, bpm)` in file order.
    pub tempo_events: Vec<(u64, f64)>,
    /// Text, marker and lyric events sorted by tick.
    pub events: Vec<TextEvent>,
    pub notes: Vec<NoteSpan>,
    pub max_tick: u64,
    /// Tempo guessed from the file name, used when the file carries none.
    #[serde(default)]
    pub bpm_hint: Option<f64>,
}

impl ParsedMidi {
    /// Parse Standard MIDI File bytes.
    ///
    /// # Errors
    /// `MidiParse` for malformed data, `UnsupportedTiming` for SMPTE timecode files.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let smf = Smf::parse(bytes).map_err(|e| TimelineError::MidiParse(e.to_string()))?;
        let ppqn = match smf.header.timing {
            Timing::Metrical(tpb) => tpb.as_int() as u32,
            Timing::Timecode(..) => return Err(TimelineError::UnsupportedTiming),
        };

        let mut time_sig = TimeSignature::default();
        let mut tempo_events = Vec::new();
        let mut events = Vec::new();
        let mut notes: Vec<NoteSpan> = Vec::new();
        let mut open: HashMap<(u8, u8), Vec<usize>> = HashMap::new();
        let mut programs = [0u8; 16];
        let mut max_tick = 0u64;

        for track in &smf.tracks {
            let mut tick = 0u64;
            for event in track {
                tick += event.delta.as_int() as u64;
                max_tick = max_tick.max(tick);
                match event.kind {
                    TrackEventKind::Meta(MetaMessage::Tempo(us_per_beat)) => {
                        let us = us_per_beat.as_int().max(1) as f64;
                        tempo_events.push((tick, 60_000_000.0 / us));
                    }
                    TrackEventKind::Meta(MetaMessage::TimeSignature(num, den_pow, _, _)) => {
                        let den = 1u32.checked_shl(den_pow as u32).unwrap_or(4);
                        time_sig = TimeSignature::new(num as u32, den);
                    }
                    TrackEventKind::Meta(MetaMessage::Text(bytes)) => {
                        events.push(text_event(tick, bytes, TextKind::Text));
                    }
                    TrackEventKind::Meta(MetaMessage::Marker(bytes))
                    | TrackEventKind::Meta(MetaMessage::CuePoint(bytes)) => {
                        events.push(text_event(tick, bytes, TextKind::Marker));
                    }
                    TrackEventKind::Meta(MetaMessage::Lyric(bytes)) => {
                        events.push(text_event(tick, bytes, TextKind::Lyric));
                    }
                    TrackEventKind::Midi { channel, message } => {
                        let channel = channel.as_int();
                        match message {
                            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                                open.entry((channel, key.as_int())).or_default().push(notes.len());
                                notes.push(NoteSpan {
                                    tick_on: tick,
                                    tick_off: None,
                                    pitch: key.as_int(),
                                    velocity: vel.as_int(),
                                    channel,
                                    program: programs[channel as usize & 0x0f],
                                });
                            }
                            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                                if let Some(idx) = open.get_mut(&(channel, key.as_int())).and_then(Vec::pop) {
                                    notes[idx].tick_off = Some(tick);
                                }
                            }
                            MidiMessage::ProgramChange { program } => {
                                programs[channel as usize & 0x0f] = program.as_int();
                            }
                            _ => {}
                        }
                    }
                    _ => {}
                }
            }
        }

        events.sort_by_key(|e: &TextEvent| e.tick);
        debug!(
            "Parsed MIDI: ppqn {}, {}/{}, {} tempo event(s), {} text event(s), {} note(s)",
            ppqn,
            time_sig.numerator,
            time_sig.denominator,
            tempo_events.len(),
            events.len(),
            notes.len()
        );

        Ok(ParsedMidi {
            ppqn,
            time_sig,
            tempo_events,
            events,
            notes,
            max_tick,
            bpm_hint: None,
        })
    }

    /// Read and parse a file, taking a tempo hint from its name.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let hint = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(bpm_hint_from_name);
        Ok(Self::from_bytes(&bytes)?.with_bpm_hint(hint))
    }

    pub fn with_bpm_hint(mut self, bpm_hint: Option<f64>) -> Self {
        self.bpm_hint = bpm_hint;
        self
    }

    /// The file's tempo map.
    ///
    /// A name hint replaces the tempo only when the file has no tempo events or
    /// just a single 120 BPM one.
    pub fn tempo_map(&self) -> TempoMap {
        let only_default = match self.tempo_events.as_slice() {
            [] => true,
            [(_, bpm)] => (bpm - DEFAULT_BPM).abs() < 1e-6,
            _ => false,
        };
        match self.bpm_hint {
            Some(hint) if only_default => {
                info!("Using tempo {} BPM from file name", hint);
                TempoMap::constant(hint)
            }
            _ => TempoMap::from_tick_tempos(self.ppqn, &self.tempo_events),
        }
    }

    /// Length of the file in seconds.
    pub fn duration_s(&self, tempo: &TempoMap) -> f64 {
        tempo.tick_to_seconds(self.max_tick, self.ppqn)
    }

    /// Text and marker events whose text parses as a chord label.
    pub fn text_chord_events(&self) -> Vec<RawChordEvent> {
        self.events
            .iter()
            .filter(|e| e.kind != TextKind::Lyric)
            .filter(|e| is_chord_label(e.text.trim()))
            .map(|e| RawChordEvent::text(e.tick, e.text.trim()))
            .collect()
    }

    /// Chords recognized from the notes sounding on a `ppqn / chord_grid_div` grid.
    ///
    /// Notes never released last one beat. Consecutive identical chords merge, and
    /// the result is snapped to downbeats within 0.9 beats.
    pub fn infer_chord_events(&self, cfg: &MidiConfig) -> Vec<RawChordEvent> {
        let ppqn = self.ppqn.max(1) as u64;
        let spans: Vec<(u64, u64, u8)> = self
            .notes
            .iter()
            .filter(|n| !(cfg.ignore_drums && n.channel == DRUM_CHANNEL))
            .map(|n| {
                let off = n.tick_off.unwrap_or(n.tick_on + ppqn);
                let off = if off <= n.tick_on { n.tick_on + (ppqn / 2).max(1) } else { off };
                (n.tick_on, off, n.pitch % 12)
            })
            .collect();
        if spans.is_empty() {
            return Vec::new();
        }

        let last_tick = if self.max_tick > 0 {
            self.max_tick
        } else {
            spans.iter().map(|s| s.1).max().unwrap_or(0)
        };
        let step = ((ppqn as f64 / cfg.chord_grid_div.max(1) as f64).round() as u64).max(1);

        let mut inferred = Vec::new();
        let mut current: Option<(u64, String)> = None;
        let mut t = 0u64;
        while t <= last_tick {
            let pcs: BTreeSet<u8> = spans
                .iter()
                .filter(|(on, off, _)| *on <= t && t < *off)
                .map(|s| s.2)
                .collect();
            let name = detect_chord_name(pcs);
            if name.as_ref() != current.as_ref().map(|c| &c.1) {
                if let Some((start, label)) = current.take() {
                    inferred.push(RawChordEvent::inferred(start, label));
                }
                current = name.map(|n| (t, n));
            }
            t += step;
        }
        if let Some((start, label)) = current {
            inferred.push(RawChordEvent::inferred(start, label));
        }

        snap_to_downbeats(&inferred, self.ppqn, self.time_sig, INFERRED_SNAP_BEATS)
    }

    /// The song's chord events, from text labels, from notes, or as a bare bar grid.
    pub fn chord_events(&self, cfg: &MidiConfig) -> Vec<RawChordEvent> {
        let mut events = self.text_chord_events();

        if events.len() < cfg.min_text_chords {
            let inferred = self.infer_chord_events(cfg);
            if !inferred.is_empty() {
                info!("Inferred {} chord event(s) from notes", inferred.len());
                if inferred.len() > events.len() {
                    events = inferred;
                } else {
                    events.extend(inferred);
                }
            }
            if events.is_empty() && self.max_tick > 0 {
                let ticks_per_bar = self.time_sig.ticks_per_bar(self.ppqn);
                let bars = self.max_tick / ticks_per_bar + 1;
                events = (0..bars)
                    .map(|i| RawChordEvent::grid(i * ticks_per_bar))
                    .collect();
                info!("Synthesized {} bar grid event(s)", events.len());
            }
        }

        if events.is_empty() {
            warn!("No chord events derived; file empty?");
        }
        events.sort_by_key(|e| e.tick);
        events
    }
}

fn text_event(tick: u64, bytes: &[u8], kind: TextKind) -> TextEvent {
    TextEvent {
        tick,
        text: String::from_utf8_lossy(bytes).trim().to_string(),
        kind,
    }
}

/// Tempo written into a file name (`_130_BPM`, `(130 BPM)`, `130bpm`), if it
/// falls within 20..=300.
pub fn bpm_hint_from_name(name: &str) -> Option<f64> {
    let caps = BPM_IN_NAME.captures(name)?;
    let bpm: f64 = caps[1].parse().ok()?;
    (20.0..=300.0).contains(&bpm).then_some(bpm)
}

//! # Pipeline
//!
//! The stages wired together for one song.
//!
//! ## Purpose
//! [`build_chord_timeline`] turns a parsed MIDI file into chord rows with section
//! labels; [`align_lyrics`] places timed lyric words on the same grid and stamps
//! them with chords and sections; [`process_song`] runs both and returns every
//! row in time order. [`align_live_words`] and [`process_song_live`] are the
//! unsnapped path for words captured live.
//!
//! Sections cover every bar of the file, and grow to cover lyrics sung after
//! it ends.
//!
//! Sections are inferred on the raw grid (bar 1 = first bar of the file). The bar
//! offset from [`MidiConfig::bar_offset`](crate::config::MidiConfig::bar_offset)
//! is applied to emitted rows last, so a count-in shows up as bars `<= 0`
//! without disturbing section inference. [`SectionLabel`] ranges stay on the
//! raw grid.
//!
//! ## Example
//! ```rust
//! use chartgrid::midi::{ParsedMidi, TextEvent, TextKind};
//! use chartgrid::{process_song, TimeSignature, TimelineConfig};
//!
//! let marker = |tick, text: &str| TextEvent { tick, text: text.to_string(), kind: TextKind::Marker };
//! let parsed = ParsedMidi {
//!     ppqn: 480,
//!     time_sig: TimeSignature::default(),
//!     tempo_events: vec![(0, 120.0)],
//!     events: vec![marker(1920, "Bbmaj7"), marker(3840, "Gm")],
//!     notes: vec![],
//!     max_tick: 1920 * 3,
//!     bpm_hint: None,
//! };
//! let song = process_song(&parsed, None, &TimelineConfig::default()).unwrap();
//! let chords: Vec<_> = song.rows.iter().filter_map(|r| r.chord.as_deref()).collect();
//! assert_eq!(chords, vec!["N.C.", "A#maj7", "Gm"]);
//! assert_eq!(song.rows[1].bar, 2);
//! ```

use log::info;
use serde::Serialize;

use crate::config::TimelineConfig;
use crate::error::Result;
use crate::lyrics::{attach_chords, live_word_rows, LyricAligner, LyricWord};
use crate::midi::ParsedMidi;
use crate::quantize::{adaptive_snap, apply_bar_offset, build_chord_rows};
use crate::sections::{apply_sections, extend_labels, infer_sections, labels_from_ranges, section_ranges};
use crate::tempo::{TempoMap, TimeSignature};
use crate::timeline::{ChordEvent, SectionLabel, TimelineRow};

/// Chord rows for one song and the grid they sit on.
#[derive(Debug, Clone)]
pub struct ChordTimeline {
    pub tempo: TempoMap,
    pub time_sig: TimeSignature,
    pub ppqn: u32,
    pub pickup_beats: f64,
    pub bar_offset: i64,
    pub duration_s: f64,
    /// Snapped chord events with their canonical symbols.
    pub events: Vec<ChordEvent>,
    /// `Chord` rows, bar offset applied.
    pub rows: Vec<TimelineRow>,
    /// Section ranges on the raw grid.
    pub sections: Vec<SectionLabel>,
}

/// Lyric rows aligned to a [`ChordTimeline`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LyricTimeline {
    pub offset_s: f64,
    /// One `Lyric` row per word.
    pub words: Vec<TimelineRow>,
    /// One `LyricBar` row per bar with words. Empty on the live path.
    pub bars: Vec<TimelineRow>,
    /// The chord timeline's sections, extended over any bars the lyrics run into.
    pub sections: Vec<SectionLabel>,
}

/// Every row of a song in time order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SongTimeline {
    pub rows: Vec<TimelineRow>,
    pub sections: Vec<SectionLabel>,
    /// Global lyric offset, when lyrics were aligned.
    pub offset_s: Option<f64>,
}

/// Build the chord timeline of a parsed MIDI file.
///
/// # Errors
/// `InvalidConfig` for out-of-range settings, `InvalidTimeSignature` for a zero
/// numerator.
pub fn build_chord_timeline(parsed: &ParsedMidi, cfg: &TimelineConfig) -> Result<ChordTimeline> {
    cfg.validate()?;
    parsed.time_sig.validate()?;

    let tempo = parsed.tempo_map();
    let ts = parsed.time_sig;
    let raw = parsed.chord_events(&cfg.midi);
    let snapped = adaptive_snap(&raw, parsed.ppqn, ts, cfg.midi.snap_beats);
    let events: Vec<ChordEvent> = snapped
        .iter()
        .map(|e| e.to_chord_event(parsed.ppqn, &tempo))
        .collect();

    let mut rows = build_chord_rows(&snapped, parsed.ppqn, ts, &tempo);
    let file_bars = parsed.max_tick.div_ceil(ts.ticks_per_bar(parsed.ppqn)) as usize;
    let sections = infer_sections(&mut rows, ts.beats_per_bar(), file_bars, &cfg.sections);
    let bar_offset = cfg.midi.bar_offset();
    apply_bar_offset(&mut rows, bar_offset);

    let duration_s = parsed.duration_s(&tempo);
    info!(
        "Chord timeline: {} event(s), {} row(s), {:.3}s",
        events.len(),
        rows.len(),
        duration_s
    );

    Ok(ChordTimeline {
        tempo,
        time_sig: ts,
        ppqn: parsed.ppqn,
        pickup_beats: cfg.midi.pickup_beats,
        bar_offset,
        duration_s,
        events,
        rows,
        sections,
    })
}

/// Align timed lyric words to a chord timeline.
///
/// Words are offset-corrected and snapped, stamped with the chord sounding at
/// their start, grouped into bar rows, labeled with the chord timeline's
/// sections and finally shifted by its bar offset.
pub fn align_lyrics(words: &[LyricWord], chords: &ChordTimeline, cfg: &TimelineConfig) -> Result<LyricTimeline> {
    let aligner = LyricAligner::new(&chords.tempo, chords.time_sig.numerator, chords.pickup_beats)?
        .with_config(&cfg.lyrics);
    let aligned = aligner.align(words)?;

    let mut word_rows = aligned.rows;
    attach_chords(&mut word_rows, &chords.rows);
    let mut bar_rows = aligner.group_by_bar(&word_rows, &cfg.lyrics.joiner)?;

    let sections = label_lyric_rows(chords, &mut [&mut word_rows, &mut bar_rows]);

    Ok(LyricTimeline {
        offset_s: aligned.offset_s,
        words: word_rows,
        bars: bar_rows,
        sections,
    })
}

/// Place live-captured words on a chord timeline without snapping.
///
/// Melismas use `lyrics.melisma_threshold_beats` at the local tempo. No global
/// offset is estimated and no bar rows are built.
pub fn align_live_words(words: &[LyricWord], chords: &ChordTimeline, cfg: &TimelineConfig) -> Result<LyricTimeline> {
    let mut word_rows = live_word_rows(
        words,
        &chords.tempo,
        chords.time_sig.numerator,
        chords.pickup_beats,
        cfg.lyrics.melisma_threshold_beats,
    )?;
    attach_chords(&mut word_rows, &chords.rows);
    let sections = label_lyric_rows(chords, &mut [&mut word_rows]);

    Ok(LyricTimeline {
        offset_s: 0.0,
        words: word_rows,
        bars: Vec::new(),
        sections,
    })
}

/// Stamp lyric rows with sections, growing the labels over bars past the end
/// of the chord grid, then apply the bar offset.
fn label_lyric_rows(chords: &ChordTimeline, groups: &mut [&mut Vec<TimelineRow>]) -> Vec<SectionLabel> {
    let mut labels = labels_from_ranges(&chords.sections);
    let last_bar = groups
        .iter()
        .flat_map(|rows| rows.iter().map(|r| r.bar))
        .max()
        .unwrap_or(0)
        .max(0) as usize;
    extend_labels(&mut labels, last_bar);

    for rows in groups.iter_mut() {
        apply_sections(rows.as_mut_slice(), &labels);
        apply_bar_offset(rows.as_mut_slice(), chords.bar_offset);
    }
    section_ranges(&labels)
}

/// Run the full pipeline for one song.
pub fn process_song(parsed: &ParsedMidi, words: Option<Vec<LyricWord>>, cfg: &TimelineConfig) -> Result<SongTimeline> {
    let chords = build_chord_timeline(parsed, cfg)?;
    let lyrics = match words.filter(|w| !w.is_empty()) {
        Some(words) => Some(align_lyrics(&words, &chords, cfg)?),
        None => None,
    };
    Ok(assemble(chords, lyrics))
}

/// Run the pipeline with live-captured words.
pub fn process_song_live(
    parsed: &ParsedMidi,
    words: Option<Vec<LyricWord>>,
    cfg: &TimelineConfig,
) -> Result<SongTimeline> {
    let chords = build_chord_timeline(parsed, cfg)?;
    let lyrics = match words.filter(|w| !w.is_empty()) {
        Some(words) => Some(align_live_words(&words, &chords, cfg)?),
        None => None,
    };
    Ok(assemble(chords, lyrics))
}

fn assemble(chords: ChordTimeline, lyrics: Option<LyricTimeline>) -> SongTimeline {
    let mut rows = chords.rows;
    let mut sections = chords.sections;
    let mut offset_s = None;

    if let Some(lyrics) = lyrics {
        offset_s = Some(lyrics.offset_s);
        sections = lyrics.sections;
        rows.extend(lyrics.words);
        rows.extend(lyrics.bars);
    }
    rows.sort_by(|a, b| a.time_s.total_cmp(&b.time_s));

    SongTimeline {
        rows,
        sections,
        offset_s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LyricsConfig, MidiConfig};
    use crate::midi::{TextEvent, TextKind};
    use crate::timeline::{EventType, SectionName};

    fn song(labels: &[&str]) -> ParsedMidi {
        let events = labels
            .iter()
            .enumerate()
            .map(|(i, l)| TextEvent {
                tick: i as u64 * 1920,
                text: l.to_string(),
                kind: TextKind::Marker,
            })
            .collect();
        ParsedMidi {
            ppqn: 480,
            time_sig: TimeSignature::default(),
            tempo_events: vec![(0, 120.0)],
            events,
            notes: vec![],
            max_tick: labels.len() as u64 * 1920,
            bpm_hint: None,
        }
    }

    #[test]
    fn test_chord_rows_and_sections() {
        let parsed = song(&["C", "G", "Am", "F", "C", "G", "Am", "F"]);
        let cfg = TimelineConfig {
            sections: crate::config::SectionConfig {
                ngram_bars: 4,
                ..Default::default()
            },
            ..Default::default()
        };
        let chords = build_chord_timeline(&parsed, &cfg).unwrap();
        assert_eq!(chords.rows.len(), 8);
        assert_eq!(chords.rows[2].chord.as_deref(), Some("Am"));
        assert_eq!(chords.rows[2].time_s, 4.0);
        assert!(chords.rows.iter().all(|r| r.section == Some(SectionName::Chorus)));
        assert_eq!(chords.sections.len(), 1);
        assert_eq!(chords.duration_s, 16.0);
    }

    #[test]
    fn test_count_in_offsets_rows_not_sections() {
        let parsed = song(&["C", "G", "Am", "F"]);
        let cfg = TimelineConfig {
            midi: MidiConfig {
                prebars: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        let chords = build_chord_timeline(&parsed, &cfg).unwrap();
        let bars: Vec<i64> = chords.rows.iter().map(|r| r.bar).collect();
        assert_eq!(bars, vec![-1, 0, 1, 2]);
        assert_eq!(chords.sections[0].bar_start, 1);
    }

    #[test]
    fn test_lyrics_pick_up_chords_and_sections() {
        let parsed = song(&["C", "G", "Am", "F"]);
        let chords = build_chord_timeline(&parsed, &TimelineConfig::default()).unwrap();
        let words = vec![
            LyricWord::new("hel", 2.0).with_end(2.2),
            LyricWord::new("lo", 2.5).with_end(2.7),
            LyricWord::new("world", 4.0).with_end(5.5),
        ];
        let lyrics = align_lyrics(&words, &chords, &TimelineConfig::default()).unwrap();
        assert_eq!(lyrics.offset_s, 0.0);

        let chords_at: Vec<&str> = lyrics.words.iter().filter_map(|r| r.chord.as_deref()).collect();
        assert_eq!(chords_at, vec!["G", "G", "Am"]);
        assert!(lyrics.words.iter().all(|r| r.section == Some(SectionName::Verse)));

        assert_eq!(lyrics.bars.len(), 2);
        assert_eq!(lyrics.bars[0].lyric.as_deref(), Some("hel lo"));
        assert_eq!(lyrics.bars[0].event_type, EventType::LyricBar);
        assert_eq!(lyrics.bars[1].chord.as_deref(), Some("Am"));
    }

    #[test]
    fn test_process_song_orders_rows() {
        let parsed = song(&["C", "G"]);
        let words = vec![LyricWord::new("la", 0.5)];
        let out = process_song(&parsed, Some(words), &TimelineConfig::default()).unwrap();
        assert_eq!(out.offset_s, Some(0.0));
        let times: Vec<f64> = out.rows.iter().map(|r| r.time_s).collect();
        let mut sorted = times.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(times, sorted);
        assert_eq!(out.rows.iter().filter(|r| r.event_type == EventType::Lyric).count(), 1);
    }

    #[test]
    fn test_bar_grid_keeps_every_bar() {
        let parsed = ParsedMidi {
            ppqn: 480,
            time_sig: TimeSignature::default(),
            tempo_events: vec![(0, 120.0)],
            events: vec![],
            notes: vec![],
            max_tick: 1920 * 4,
            bpm_hint: None,
        };
        let words = vec![LyricWord::new("la", 5.0)];
        let out = process_song(&parsed, Some(words), &TimelineConfig::default()).unwrap();

        let chord_bars: Vec<i64> = out
            .rows
            .iter()
            .filter(|r| r.event_type == EventType::Chord)
            .map(|r| r.bar)
            .collect();
        assert_eq!(chord_bars, vec![1, 2, 3, 4, 5]);
        assert_eq!(
            out.sections,
            vec![SectionLabel {
                name: SectionName::Verse,
                bar_start: 1,
                bar_end: 5
            }]
        );
        let lyric = out.rows.iter().find(|r| r.event_type == EventType::Lyric).unwrap();
        assert_eq!(lyric.bar, 3);
        assert_eq!(lyric.section, Some(SectionName::Verse));
    }

    #[test]
    fn test_lyrics_past_last_chord_get_sections() {
        let parsed = song(&["C", "G"]);
        let words = vec![LyricWord::new("late", 9.0)];
        let out = process_song(&parsed, Some(words), &TimelineConfig::default()).unwrap();

        assert_eq!(out.sections.len(), 1);
        assert_eq!((out.sections[0].bar_start, out.sections[0].bar_end), (1, 5));
        let lyric_rows: Vec<&TimelineRow> = out
            .rows
            .iter()
            .filter(|r| r.event_type != EventType::Chord)
            .collect();
        assert_eq!(lyric_rows.len(), 2);
        for row in lyric_rows {
            assert_eq!(row.bar, 5);
            assert_eq!(row.section, Some(SectionName::Verse));
            assert_eq!(row.chord.as_deref(), Some("N.C."));
        }
    }

    #[test]
    fn test_live_words_use_configured_melisma_threshold() {
        let parsed = song(&["C", "G"]);
        let words = vec![LyricWord::new("ooh", 2.0).with_end(3.0)];

        let out = process_song_live(&parsed, Some(words.clone()), &TimelineConfig::default()).unwrap();
        let live: Vec<&TimelineRow> = out.rows.iter().filter(|r| r.event_type == EventType::Lyric).collect();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].melisma, Some(true));
        assert_eq!(live[0].chord.as_deref(), Some("G"));
        assert_eq!((live[0].bar, live[0].sub_idx), (2, Some(0)));
        assert_eq!(live[0].section, Some(SectionName::Verse));
        assert!(out.rows.iter().all(|r| r.event_type != EventType::LyricBar));

        let strict = TimelineConfig {
            lyrics: LyricsConfig {
                melisma_threshold_beats: 3.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let out = process_song_live(&parsed, Some(words), &strict).unwrap();
        let live = out.rows.iter().find(|r| r.event_type == EventType::Lyric).unwrap();
        assert_eq!(live.melisma, Some(false));
    }

    #[test]
    fn test_pickup_shifts_lyric_bars_only() {
        let parsed = song(&["C", "G", "Am", "F"]);
        let cfg = TimelineConfig {
            midi: MidiConfig {
                pickup_beats: 2.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let chords = build_chord_timeline(&parsed, &cfg).unwrap();
        let words = vec![LyricWord::new("now", 4.0)];
        let lyrics = align_lyrics(&words, &chords, &cfg).unwrap();

        // The chord grid counts from tick 0, the lyric grid from the pickup.
        assert_eq!(chords.rows[2].bar, 3);
        assert_eq!(lyrics.words[0].bar, 2);
        assert_eq!(lyrics.words[0].chord.as_deref(), Some("Am"));
    }

    #[test]
    fn test_zero_numerator_rejected() {
        let mut parsed = song(&["C"]);
        parsed.time_sig = TimeSignature::new(0, 4);
        assert!(build_chord_timeline(&parsed, &TimelineConfig::default()).is_err());
    }
}

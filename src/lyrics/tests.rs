use super::*;
use crate::config::LyricsConfig;
use crate::tempo::{TempoMap, TempoSegment};
use crate::timeline::{EventType, TimelineRow};
use crate::TimelineError;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn chord_row(time_s: f64, chord: &str, dur_s: f64) -> TimelineRow {
    let mut row = TimelineRow::at(EventType::Chord, 1, 1.0, 0.0, time_s);
    row.chord = Some(chord.to_string());
    row.dur_s = Some(dur_s);
    row
}

#[test]
fn test_zero_numerator_rejected() {
    let tempo = TempoMap::constant(120.0);
    assert!(matches!(
        LyricAligner::new(&tempo, 0, 0.0),
        Err(TimelineError::InvalidTimeSignature { .. })
    ));
}

#[test]
fn test_empty_input_is_empty_output() {
    let tempo = TempoMap::constant(120.0);
    let aligner = LyricAligner::new(&tempo, 4, 0.0).unwrap();
    assert_eq!(aligner.global_offset(&[]).unwrap(), 0.0);
    let aligned = aligner.align(&[]).unwrap();
    assert!(aligned.rows.is_empty());
    assert!(aligner.group_by_bar(&aligned.rows, " ").unwrap().is_empty());
    assert!(live_word_rows(&[], &tempo, 4, 0.0, 1.0).unwrap().is_empty());
}

#[test]
fn test_offset_clamps_to_window() {
    // At 10 BPM a beat lasts 6s; every word sits 0.4 beat (2.4s) past a beat.
    let tempo = TempoMap::constant(10.0);
    let aligner = LyricAligner::new(&tempo, 4, 0.0).unwrap().with_snap_div(1);
    let words: Vec<LyricWord> = (0..5)
        .map(|k| LyricWord::new("la", k as f64 * 6.0 + 2.4))
        .collect();
    assert_eq!(aligner.global_offset(&words).unwrap(), -1.5);
}

#[test]
fn test_offset_respects_configured_window() {
    let tempo = TempoMap::constant(10.0);
    let cfg = LyricsConfig {
        snap_div: 1,
        max_offset_s: 0.5,
        ..LyricsConfig::default()
    };
    let aligner = LyricAligner::new(&tempo, 4, 0.0).unwrap().with_config(&cfg);
    let words = vec![LyricWord::new("la", 2.4), LyricWord::new("la", 8.4)];
    assert_eq!(aligner.global_offset(&words).unwrap(), -0.5);
}

#[test]
fn test_offset_is_median_not_mean() {
    // 120 BPM, sixteenth grid of 0.125s. Four words are 50ms late, one is an outlier.
    let tempo = TempoMap::constant(120.0);
    let aligner = LyricAligner::new(&tempo, 4, 0.0).unwrap();
    let mut words: Vec<LyricWord> = (1..5)
        .map(|k| LyricWord::new("word", k as f64 * 0.5 + 0.05))
        .collect();
    words.push(LyricWord::new("outlier", 0.1875));
    let offset = aligner.global_offset(&words).unwrap();
    assert!(approx(offset, -0.05), "offset {}", offset);

    let aligned = aligner.align(&words).unwrap();
    assert!(approx(aligned.offset_s, -0.05));
    assert_eq!(aligned.rows[0].word_start_s, Some(0.5));
    assert_eq!(aligned.rows[0].beat, 2.0);
    assert_eq!(aligned.rows[0].sub_idx, Some(0));
}

#[test]
fn test_snap_assigns_sub_index() {
    let tempo = TempoMap::constant(60.0);
    let aligner = LyricAligner::new(&tempo, 4, 0.0).unwrap();
    let rows = aligner
        .snap_words(&[
            LyricWord::new("a", 1.26),
            LyricWord::new("b", 2.49),
            LyricWord::new("c", 6.76).with_confidence(0.5),
        ])
        .unwrap();

    assert_eq!((rows[0].bar, rows[0].beat, rows[0].sub_idx), (1, 2.25, Some(1)));
    assert_eq!((rows[1].bar, rows[1].beat, rows[1].sub_idx), (1, 3.5, Some(2)));
    assert_eq!((rows[2].bar, rows[2].beat, rows[2].sub_idx), (2, 3.75, Some(3)));
    assert_eq!(rows[0].lyric_conf, Some(0.95));
    assert_eq!(rows[2].lyric_conf, Some(0.5));
    assert_eq!(rows[0].word_end_s, Some(1.51));
    assert!(rows.iter().all(|r| r.event_type == EventType::Lyric));
}

#[test]
fn test_snap_past_last_beat_moves_to_next_downbeat() {
    let tempo = TempoMap::constant(60.0);
    let aligner = LyricAligner::new(&tempo, 4, 0.0).unwrap();
    let rows = aligner.snap_words(&[LyricWord::new("late", 3.9)]).unwrap();
    assert_eq!((rows[0].bar, rows[0].beat, rows[0].sub_idx), (2, 1.0, Some(0)));
    assert_eq!(rows[0].melisma, Some(false));
}

#[test]
fn test_pickup_words_in_bar_zero() {
    let tempo = TempoMap::constant(60.0);
    let aligner = LyricAligner::new(&tempo, 4, 2.0).unwrap();
    let rows = aligner
        .snap_words(&[LyricWord::new("and", 0.5), LyricWord::new("now", 1.9)])
        .unwrap();
    assert_eq!((rows[0].bar, rows[0].beat, rows[0].sub_idx), (0, -0.5, Some(2)));
    assert_eq!((rows[1].bar, rows[1].beat), (1, 1.0));
}

#[test]
fn test_melisma_when_end_crosses_grid() {
    let tempo = TempoMap::constant(60.0);
    let aligner = LyricAligner::new(&tempo, 4, 0.0).unwrap();
    let rows = aligner
        .snap_words(&[
            LyricWord::new("held", 0.0).with_end(1.1),
            LyricWord::new("short", 2.0).with_end(2.2),
            LyricWord::new("over", 3.0).with_end(4.5),
        ])
        .unwrap();
    assert_eq!(rows[0].melisma, Some(true));
    assert_eq!(rows[1].melisma, Some(false));
    assert_eq!(rows[2].melisma, Some(true));
}

#[test]
fn test_is_melisma_boundary() {
    assert!(is_melisma(10.0, Some(11.0), 60.0, 1.0));
    assert!(!is_melisma(10.0, Some(10.99), 60.0, 1.0));
    assert!(!is_melisma(10.0, None, 60.0, 1.0));
    assert!(is_melisma(0.0, Some(1.0), 0.0, 1.0));
    assert!(is_melisma(0.0, Some(0.5), 120.0, 1.0));
    assert!(!is_melisma(0.0, Some(1.0), 120.0, 3.0));
}

#[test]
fn test_live_rows_number_simultaneous_words() {
    let tempo = TempoMap::constant(60.0);
    let words = vec![
        LyricWord::new("b", 1.0).with_end(1.2),
        LyricWord::new("a", 1.0).with_end(2.5),
        LyricWord::new("c", 2.0),
    ];
    let rows = live_word_rows(&words, &tempo, 4, 0.0, 1.0).unwrap();
    assert_eq!(rows[0].sub_idx, Some(0));
    assert_eq!(rows[1].sub_idx, Some(1));
    assert_eq!(rows[2].sub_idx, Some(0));
    assert_eq!(rows[0].melisma, Some(false));
    assert_eq!(rows[1].melisma, Some(true));
    assert_eq!(rows[2].melisma, Some(false));
    assert_eq!(rows[1].dur_s, Some(1.5));
    assert_eq!(rows[2].dur_s, None);
    assert_eq!(rows[2].lyric_conf, None);
}

#[test]
fn test_subindex_orders_by_start_time() {
    let mut rows = Vec::new();
    for (start, beat) in [(1.3, 2.0), (1.1, 2.0), (1.2, 2.0), (5.0, 2.0)] {
        let mut row = TimelineRow::at(EventType::Lyric, 1, beat, 1.0, start);
        row.word_start_s = Some(start);
        rows.push(row);
    }
    rows[3].bar = 2;
    assert_eq!(subindex(&rows), vec![2, 0, 1, 0]);
}

#[test]
fn test_group_by_bar() {
    let tempo = TempoMap::constant(60.0);
    let aligner = LyricAligner::new(&tempo, 4, 1.0).unwrap();
    let mut rows = aligner
        .snap_words(&[
            LyricWord::new("world", 6.0).with_confidence(0.8),
            LyricWord::new("hello", 5.0).with_confidence(0.6),
            LyricWord::new("again", 9.5),
            LyricWord::new("  ", 9.75),
        ])
        .unwrap();
    rows[0].chord = Some("F".to_string());
    rows[1].chord = Some("C".to_string());

    let bars = aligner.group_by_bar(&rows, " / ").unwrap();
    assert_eq!(bars.len(), 2);

    let first = &bars[0];
    assert_eq!(first.event_type, EventType::LyricBar);
    assert_eq!((first.bar, first.beat, first.beat_abs), (2, 1.0, 5.0));
    assert_eq!(first.time_s, 5.0);
    assert_eq!(first.lyric.as_deref(), Some("hello / world"));
    assert_eq!(first.chord.as_deref(), Some("C"));
    assert_eq!(first.lyric_conf, Some(0.7));
    assert_eq!(first.dur_beats, Some(4.0));
    assert_eq!(first.dur_s, Some(4.0));
    assert_eq!(first.word_end_s, Some(9.0));

    let second = &bars[1];
    assert_eq!(second.bar, 3);
    assert_eq!(second.lyric.as_deref(), Some("again"));
    assert_eq!(second.chord, None);
}

#[test]
fn test_group_by_bar_uses_local_tempo() {
    let tempo = TempoMap::new(vec![TempoSegment::new(0.0, 60.0), TempoSegment::new(4.0, 120.0)]).unwrap();
    let aligner = LyricAligner::new(&tempo, 4, 0.0).unwrap();
    let rows = aligner.snap_words(&[LyricWord::new("fast", 4.1)]).unwrap();
    let bars = aligner.group_by_bar(&rows, " ").unwrap();
    assert_eq!(bars[0].bar, 2);
    assert_eq!(bars[0].time_s, 4.0);
    assert_eq!(bars[0].dur_s, Some(2.0));
}

#[test]
fn test_attach_chords() {
    let chords = vec![chord_row(0.0, "C", 2.0), chord_row(2.0, "F", 2.0)];
    let tempo = TempoMap::constant(60.0);
    let aligner = LyricAligner::new(&tempo, 4, 0.0).unwrap();
    let mut rows = aligner
        .snap_words(&[
            LyricWord::new("one", 1.0),
            LyricWord::new("two", 2.0),
            LyricWord::new("three", 2.5),
            LyricWord::new("four", 4.5),
        ])
        .unwrap();
    rows[2].chord = Some("G".to_string());
    attach_chords(&mut rows, &chords);

    let stamped: Vec<&str> = rows.iter().map(|r| r.chord.as_deref().unwrap_or("")).collect();
    assert_eq!(stamped, vec!["C", "F", "G", "N.C."]);
}

#[test]
fn test_attach_chords_before_first_chord() {
    let chords = vec![chord_row(2.0, "Am", 4.0)];
    let mut rows = vec![TimelineRow::at(EventType::Lyric, 1, 1.5, 0.5, 0.5)];
    attach_chords(&mut rows, &chords);
    assert_eq!(rows[0].chord.as_deref(), Some("N.C."));
}

#[test]
fn test_parse_lrc_fraction_digits() {
    let words = parse_lrc("[00:01.5]a\n[00:02.25]b\n[00:03.125]c\n[00:04]d\n[00:05.00]\n");
    let starts: Vec<f64> = words.iter().map(|w| w.start_s).collect();
    assert_eq!(starts, vec![1.5, 2.25, 3.125, 4.0]);
    assert!(words.iter().all(|w| w.end_s.is_none()));
}

#[test]
fn test_parse_vtt_with_settings_and_blank_cues() {
    let vtt = "WEBVTT\n\n1\n00:00:01.000 --> 00:00:02.000 align:start\nHi\n\n00:00:03.000 --> 00:00:04.000\n\n01:00:00.500 --> 01:00:01.000\nLate\n";
    let words = parse_vtt(vtt);
    assert_eq!(words.len(), 2);
    assert_eq!(words[0].text, "Hi");
    assert_eq!(words[1].start_s, 3600.5);
    assert_eq!(words[1].end_s, Some(3601.0));
}

#[test]
fn test_parse_lyrics_detects_format() {
    assert_eq!(parse_lyrics("[00:01.00]la")[0].start_s, 1.0);
    let vtt = parse_lyrics("00:00:01.000 --> 00:00:02.000\nla\n");
    assert_eq!(vtt[0].end_s, Some(2.0));
    assert!(parse_lyrics("").is_empty());
}

//! # Exports
//!
//! Render timeline rows for downstream consumers: tabular records in the fixed
//! column order, LRC and WebVTT lyric files, a plain-text chord chart and a
//! section summary.
//!
//! ## Example
//! ```rust
//! use chartgrid::export::{timecode, to_lrc};
//! use chartgrid::{EventType, TimelineRow};
//!
//! assert_eq!(timecode(83.4567), "01:23.457");
//!
//! let mut row = TimelineRow::at(EventType::Lyric, 1, 1.0, 0.0, 12.5);
//! row.lyric = Some("hello".to_string());
//! assert_eq!(to_lrc(&[row]), "[00:12.50]hello\n");
//! ```

use std::fmt::Write;

use crate::timeline::{EventType, SectionLabel, TimelineRow, HEADERS};

/// Seconds a VTT cue lasts when a row carries neither an end nor a duration.
const DEFAULT_CUE_S: f64 = 0.5;

/// Render seconds as `mm:ss.mmm`. Negative times clamp to zero.
pub fn timecode(t: f64) -> String {
    let ms = (t.max(0.0) * 1000.0).round() as u64;
    format!("{:02}:{:02}.{:03}", ms / 60_000, (ms / 1000) % 60, ms % 1000)
}

fn vtt_timestamp(t: f64) -> String {
    let ms = (t.max(0.0) * 1000.0).round() as u64;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        ms / 3_600_000,
        (ms / 60_000) % 60,
        (ms / 1000) % 60,
        ms % 1000
    )
}

fn lrc_tag(t: f64) -> String {
    let cs = (t.max(0.0) * 100.0).round() as u64;
    format!("[{:02}:{:02}.{:02}]", cs / 6000, (cs / 100) % 60, cs % 100)
}

fn word_start(row: &TimelineRow) -> f64 {
    row.word_start_s.unwrap_or(row.time_s)
}

fn lyric_rows(rows: &[TimelineRow]) -> impl Iterator<Item = &TimelineRow> {
    rows.iter().filter(|r| r.event_type == EventType::Lyric)
}

/// The header row followed by one record per row.
pub fn to_records(rows: &[TimelineRow]) -> Vec<Vec<String>> {
    let mut records = Vec::with_capacity(rows.len() + 1);
    records.push(HEADERS.iter().map(|h| h.to_string()).collect());
    records.extend(rows.iter().map(TimelineRow::to_record));
    records
}

/// One `[mm:ss.cc]text` line per `Lyric` row, stamped at the word start.
pub fn to_lrc(rows: &[TimelineRow]) -> String {
    let mut out = String::new();
    for row in lyric_rows(rows) {
        let _ = writeln!(out, "{}{}", lrc_tag(word_start(row)), row.lyric.as_deref().unwrap_or(""));
    }
    out
}

/// A WebVTT document with one cue per `Lyric` row.
///
/// Cues end at the word end, else after the row's duration, else after half a
/// second.
///
/// # Examples
/// ```
/// use chartgrid::export::to_vtt;
/// use chartgrid::{EventType, TimelineRow};
///
/// let mut row = TimelineRow::at(EventType::Lyric, 1, 1.0, 0.0, 3661.5);
/// row.lyric = Some("late".to_string());
/// assert_eq!(to_vtt(&[row]), "WEBVTT\n\n01:01:01.500 --> 01:01:02.000\nlate\n\n");
/// ```
pub fn to_vtt(rows: &[TimelineRow]) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for row in lyric_rows(rows) {
        let start = word_start(row);
        let end = row
            .word_end_s
            .or_else(|| row.dur_s.map(|d| start + d))
            .unwrap_or(start + DEFAULT_CUE_S);
        let _ = write!(
            out,
            "{} --> {}\n{}\n\n",
            vtt_timestamp(start),
            vtt_timestamp(end),
            row.lyric.as_deref().unwrap_or("")
        );
    }
    out
}

/// A plain-text chord chart built from `LyricBar` rows.
///
/// Consecutive bars of the same section are printed under one `[Section]`
/// heading. Each bar is a chord line over its lyric line, with every chord that
/// starts inside the bar placed at its proportional position across the lyric.
///
/// # Examples
/// ```
/// use chartgrid::export::format_chord_chart;
/// use chartgrid::{EventType, SectionName, TimelineRow};
///
/// let mut c = TimelineRow::at(EventType::Chord, 1, 1.0, 0.0, 0.0);
/// c.chord = Some("C".to_string());
/// let mut g = TimelineRow::at(EventType::Chord, 1, 3.0, 2.0, 1.0);
/// g.chord = Some("G".to_string());
/// let mut bar = TimelineRow::at(EventType::LyricBar, 1, 1.0, 0.0, 0.0);
/// bar.dur_s = Some(2.0);
/// bar.lyric = Some("twinkle twinkle".to_string());
/// bar.section = Some(SectionName::Verse);
///
/// let chart = format_chord_chart(&[c, g, bar], "Star");
/// assert_eq!(chart, "Chart: Star\n\n[Verse]\nC      G\ntwinkle twinkle\n");
/// ```
pub fn format_chord_chart(rows: &[TimelineRow], title: &str) -> String {
    let mut chords: Vec<&TimelineRow> = rows.iter().filter(|r| r.event_type == EventType::Chord).collect();
    chords.sort_by(|a, b| a.time_s.total_cmp(&b.time_s));
    let mut bars: Vec<&TimelineRow> = rows.iter().filter(|r| r.event_type == EventType::LyricBar).collect();
    bars.sort_by(|a, b| a.time_s.total_cmp(&b.time_s));

    let mut out = String::new();
    let _ = writeln!(out, "Chart: {}", title);
    if bars.is_empty() {
        out.push_str("\n(no lyric bars)\n");
        return out;
    }

    let mut current: Option<String> = None;
    for bar in bars {
        let section = bar
            .section
            .map(|s| s.to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        if current.as_deref() != Some(section.as_str()) {
            let _ = write!(out, "\n[{}]\n", section);
            current = Some(section);
        }

        let lyric = bar.lyric.as_deref().unwrap_or("").trim_end();
        let width = match lyric.chars().count() {
            0 => ((bar.dur_beats.unwrap_or(4.0) * 4.0) as usize).max(16),
            n => n,
        };
        let start = bar.time_s;
        let dur = bar.dur_s.unwrap_or(0.0);

        let mut line = vec![' '; width];
        for chord in chords.iter().filter(|c| start <= c.time_s && c.time_s < start + dur) {
            let Some(name) = chord.chord.as_deref().map(str::trim).filter(|n| !n.is_empty()) else {
                continue;
            };
            let rel = if dur > 0.0 { (chord.time_s - start) / dur } else { 0.0 };
            let at = (rel.clamp(0.0, 0.999) * width as f64) as usize;
            for (slot, ch) in line.iter_mut().skip(at).zip(name.chars()) {
                *slot = ch;
            }
        }

        let chord_line: String = line.into_iter().collect();
        let _ = writeln!(out, "{}", chord_line.trim_end());
        let _ = writeln!(out, "{}", lyric);
    }
    out
}

/// One `Name: bars a-b` line per section range.
pub fn section_summary(labels: &[SectionLabel]) -> String {
    labels
        .iter()
        .map(|l| format!("{}: bars {}-{}\n", l.name, l.bar_start, l.bar_end))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::SectionName;

    fn lyric(time_s: f64, text: &str) -> TimelineRow {
        let mut row = TimelineRow::at(EventType::Lyric, 1, 1.0, 0.0, time_s);
        row.lyric = Some(text.to_string());
        row
    }

    #[test]
    fn test_timecode_carries_rounding() {
        assert_eq!(timecode(0.0), "00:00.000");
        assert_eq!(timecode(59.9996), "01:00.000");
        assert_eq!(timecode(61.25), "01:01.250");
        assert_eq!(timecode(-3.0), "00:00.000");
    }

    #[test]
    fn test_lrc_uses_word_start_and_skips_other_rows() {
        let mut word = lyric(10.0, "one");
        word.word_start_s = Some(9.996);
        let chord = TimelineRow::at(EventType::Chord, 1, 1.0, 0.0, 0.0);
        let bar = TimelineRow::at(EventType::LyricBar, 1, 1.0, 0.0, 0.0);
        assert_eq!(to_lrc(&[chord, word, bar, lyric(75.5, "two")]), "[00:10.00]one\n[01:15.50]two\n");
    }

    #[test]
    fn test_vtt_end_fallbacks() {
        let mut a = lyric(1.0, "a");
        a.word_end_s = Some(1.75);
        let mut b = lyric(2.0, "b");
        b.dur_s = Some(0.25);
        let c = lyric(3.0, "c");
        let vtt = to_vtt(&[a, b, c]);
        assert!(vtt.starts_with("WEBVTT\n\n"));
        assert!(vtt.contains("00:00:01.000 --> 00:00:01.750\na\n"));
        assert!(vtt.contains("00:00:02.000 --> 00:00:02.250\nb\n"));
        assert!(vtt.contains("00:00:03.000 --> 00:00:03.500\nc\n"));
    }

    #[test]
    fn test_vtt_reparses() {
        let mut a = lyric(1.5, "first");
        a.word_end_s = Some(2.0);
        let words = crate::lyrics::parse_vtt(&to_vtt(&[a]));
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].start_s, 1.5);
        assert_eq!(words[0].end_s, Some(2.0));
    }

    #[test]
    fn test_records_start_with_headers() {
        let records = to_records(&[lyric(1.0, "x")]);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0][0], "Bar");
        assert_eq!(records[1].len(), HEADERS.len());
    }

    #[test]
    fn test_chart_groups_runs_and_pads_empty_bars() {
        let mut bar1 = TimelineRow::at(EventType::LyricBar, 1, 1.0, 0.0, 0.0);
        bar1.dur_s = Some(2.0);
        bar1.lyric = Some("hi".to_string());
        bar1.section = Some(SectionName::Verse);
        let mut bar2 = TimelineRow::at(EventType::LyricBar, 2, 1.0, 4.0, 2.0);
        bar2.dur_s = Some(2.0);
        bar2.dur_beats = Some(4.0);
        bar2.section = Some(SectionName::Chorus);
        let mut chord = TimelineRow::at(EventType::Chord, 2, 1.0, 4.0, 2.0);
        chord.chord = Some("Am".to_string());

        let chart = format_chord_chart(&[bar2, chord, bar1], "T");
        assert_eq!(chart, "Chart: T\n\n[Verse]\n\nhi\n\n[Chorus]\nAm\n\n");
    }

    #[test]
    fn test_chart_without_bars() {
        assert_eq!(format_chord_chart(&[], "Empty"), "Chart: Empty\n\n(no lyric bars)\n");
    }

    #[test]
    fn test_section_summary() {
        let labels = vec![
            SectionLabel { name: SectionName::Intro, bar_start: 1, bar_end: 2 },
            SectionLabel { name: SectionName::Chorus, bar_start: 3, bar_end: 10 },
        ];
        assert_eq!(section_summary(&labels), "Intro: bars 1-2\nChorus: bars 3-10\n");
    }
}

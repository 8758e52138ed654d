//! # Section Inferencer
//!
//! Labels every bar of a song Intro, Verse, Chorus or Outro from repeated chord
//! patterns.
//!
//! ## Purpose
//! A pop song's chorus is the longest chord pattern that keeps coming back. This
//! module reduces each bar to a text signature of the chords sounding in it,
//! slides an `ngram_bars`-wide window over those signatures, and counts how often
//! each window repeats:
//!
//! 1. The most repeated window is the Chorus. When a second repeated window exists,
//!    the one with more occurrences is Chorus and the other Verse; equal counts
//!    are settled by [`ChorusTieBreak`].
//! 2. Verse never overwrites Chorus.
//! 3. Bars before the first labeled bar are Intro, bars after the last are Outro.
//! 4. Everything else is Verse, including every bar of a song with no repeats.
//!
//! Labels are recomputed from scratch on every call.
//!
//! ## Example
//! ```rust
//! use chartgrid::config::SectionConfig;
//! use chartgrid::sections::{infer_section_labels, section_ranges};
//! use chartgrid::SectionName;
//!
//! let bars: Vec<String> = ["C", "Am", "F", "G", "C", "Am", "F", "G"]
//!     .iter()
//!     .map(|s| s.to_string())
//!     .collect();
//! let cfg = SectionConfig { ngram_bars: 4, ..SectionConfig::default() };
//! let labels = infer_section_labels(&bars, &cfg);
//! assert_eq!(labels[0], SectionName::Chorus);
//! assert_eq!(section_ranges(&labels).len(), 1);
//! ```

use std::collections::HashMap;

use log::{debug, info};

use crate::chord::NO_CHORD;
use crate::config::{ChorusTieBreak, SectionConfig};
use crate::timeline::{EventType, SectionLabel, SectionName, TimelineRow};

/// A window of bar signatures that occurs more than once.
#[derive(Debug, Clone, PartialEq)]
pub struct RepeatedBlock {
    pub count: usize,
    /// 0-based start bar index of every occurrence, ascending.
    pub starts: Vec<usize>,
}

impl RepeatedBlock {
    fn first(&self) -> usize {
        self.starts[0]
    }
}

/// Per-bar signatures for bars `1..=N`, built from `Chord` rows.
///
/// A chord contributes to every bar its span overlaps. `N.C.` is skipped and a
/// chord held across rows is listed once per bar. `N` is the highest bar any row
/// starts in or any chord is held into.
pub fn bar_signatures(rows: &[TimelineRow], beats_per_bar: f64) -> Vec<String> {
    let beats_per_bar = if beats_per_bar > 0.0 { beats_per_bar } else { 4.0 };
    let last_bar = rows.iter().map(|r| r.bar).max().unwrap_or(0).max(0) as usize;
    let mut per_bar: Vec<Vec<&str>> = vec![Vec::new(); last_bar];

    for row in rows.iter().filter(|r| r.event_type == EventType::Chord) {
        let Some(chord) = row.chord.as_deref().map(str::trim) else {
            continue;
        };
        if chord.is_empty() || chord.eq_ignore_ascii_case(NO_CHORD) || row.bar < 1 {
            continue;
        }
        let held = row.dur_beats.unwrap_or(0.0).max(0.0);
        let span_end = (row.beat - 1.0) + held;
        let extra_bars = if held > 0.0 {
            ((span_end - 1e-9) / beats_per_bar).floor().max(0.0) as usize
        } else {
            0
        };
        let first = row.bar as usize;
        let last = first + extra_bars;
        if last > per_bar.len() {
            per_bar.resize(last, Vec::new());
        }
        for bar in first..=last {
            let slot = &mut per_bar[bar - 1];
            if slot.last() != Some(&chord) {
                slot.push(chord);
            }
        }
    }

    per_bar.into_iter().map(|chords| chords.join(" ")).collect()
}

/// Windows of `ngram_bars` signatures occurring at least `min_occurs` times, most
/// frequent first, then earliest first. All-empty windows are ignored.
pub fn repeated_blocks(signatures: &[String], ngram_bars: usize, min_occurs: usize) -> Vec<RepeatedBlock> {
    if ngram_bars == 0 || signatures.len() < ngram_bars {
        return Vec::new();
    }
    let mut positions: HashMap<&[String], Vec<usize>> = HashMap::new();
    for (start, window) in signatures.windows(ngram_bars).enumerate() {
        if window.iter().all(|s| s.is_empty()) {
            continue;
        }
        positions.entry(window).or_default().push(start);
    }

    let mut blocks: Vec<RepeatedBlock> = positions
        .into_values()
        .filter(|starts| starts.len() >= min_occurs.max(1))
        .map(|starts| RepeatedBlock {
            count: starts.len(),
            starts,
        })
        .collect();
    blocks.sort_by(|a, b| b.count.cmp(&a.count).then(a.first().cmp(&b.first())));
    blocks
}

/// One label per bar, index 0 being bar 1.
pub fn infer_section_labels(signatures: &[String], cfg: &SectionConfig) -> Vec<SectionName> {
    let n = signatures.len();
    let blocks = repeated_blocks(signatures, cfg.ngram_bars, cfg.chorus_min_occurs);
    let mut labels: Vec<Option<SectionName>> = vec![None; n];

    let (chorus, verse) = match blocks.as_slice() {
        [] => (None, None),
        [only] => (Some(only), None),
        [top, second, ..] => {
            let top_is_chorus = match top.count.cmp(&second.count) {
                std::cmp::Ordering::Greater => true,
                std::cmp::Ordering::Less => false,
                std::cmp::Ordering::Equal => match cfg.tie_break {
                    ChorusTieBreak::LaterFirst => top.first() > second.first(),
                    ChorusTieBreak::EarlierFirst => top.first() < second.first(),
                },
            };
            if top_is_chorus {
                (Some(top), Some(second))
            } else {
                (Some(second), Some(top))
            }
        }
    };

    if let Some(block) = chorus {
        for &start in &block.starts {
            for label in labels.iter_mut().skip(start).take(cfg.ngram_bars) {
                *label = Some(SectionName::Chorus);
            }
        }
    }
    if let Some(block) = verse {
        for &start in &block.starts {
            for label in labels.iter_mut().skip(start).take(cfg.ngram_bars) {
                label.get_or_insert(SectionName::Verse);
            }
        }
    }

    let first_labeled = labels.iter().position(Option::is_some);
    let last_labeled = labels.iter().rposition(Option::is_some);
    if let (Some(first), Some(last)) = (first_labeled, last_labeled) {
        let intro_len = cfg.intro_max_bars.map_or(first, |cap| first.min(cap));
        for label in labels.iter_mut().take(intro_len) {
            *label = Some(SectionName::Intro);
        }
        for label in labels.iter_mut().skip(last + 1) {
            *label = Some(SectionName::Outro);
        }
    }

    let resolved: Vec<SectionName> = labels
        .into_iter()
        .map(|l| l.unwrap_or(SectionName::Verse))
        .collect();
    debug!(
        "{} bars, {} repeated window(s), sections: {}",
        n,
        blocks.len(),
        section_ranges(&resolved)
            .iter()
            .map(|s| format!("{} {}-{}", s.name, s.bar_start, s.bar_end))
            .collect::<Vec<_>>()
            .join(", ")
    );
    resolved
}

/// Collapse per-bar labels into contiguous 1-based ranges.
pub fn section_ranges(labels: &[SectionName]) -> Vec<SectionLabel> {
    let mut ranges: Vec<SectionLabel> = Vec::new();
    for (i, &name) in labels.iter().enumerate() {
        let bar = i as i64 + 1;
        match ranges.last_mut() {
            Some(last) if last.name == name => last.bar_end = bar,
            _ => ranges.push(SectionLabel {
                name,
                bar_start: bar,
                bar_end: bar,
            }),
        }
    }
    ranges
}

/// Expand contiguous ranges back into one label per bar, bar 1 first.
///
/// Ranges are expected to partition `1..=N` as [`section_ranges`] returns them.
pub fn labels_from_ranges(ranges: &[SectionLabel]) -> Vec<SectionName> {
    ranges
        .iter()
        .flat_map(|r| std::iter::repeat(r.name).take((r.bar_end - r.bar_start + 1).max(0) as usize))
        .collect()
}

/// Grow per-bar labels to cover `bars` bars.
///
/// New bars follow the last labeled bar, so they are Outro once a chorus was
/// found and Verse otherwise.
pub fn extend_labels(labels: &mut Vec<SectionName>, bars: usize) {
    if labels.len() >= bars {
        return;
    }
    let fill = if labels.contains(&SectionName::Chorus) {
        SectionName::Outro
    } else {
        SectionName::Verse
    };
    labels.resize(bars, fill);
}

/// Stamp each row with its bar's label. Rows that already carry a section, and
/// rows outside bars `1..=N`, are left alone.
pub fn apply_sections(rows: &mut [TimelineRow], labels: &[SectionName]) {
    for row in rows.iter_mut() {
        if row.section.is_some() || row.bar < 1 {
            continue;
        }
        if let Some(&name) = labels.get(row.bar as usize - 1) {
            row.section = Some(name);
        }
    }
}

/// Infer labels from the chord rows in `rows` and stamp every row with them.
///
/// Labels cover at least `min_bars` bars; bars past the last chord have empty
/// signatures.
pub fn infer_sections(
    rows: &mut [TimelineRow],
    beats_per_bar: f64,
    min_bars: usize,
    cfg: &SectionConfig,
) -> Vec<SectionLabel> {
    let mut signatures = bar_signatures(rows, beats_per_bar);
    if signatures.len() < min_bars {
        signatures.resize(min_bars, String::new());
    }
    let labels = infer_section_labels(&signatures, cfg);
    apply_sections(rows, &labels);
    let ranges = section_ranges(&labels);
    info!("Inferred {} section(s) over {} bar(s)", ranges.len(), labels.len());
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sigs(bars: &[&str]) -> Vec<String> {
        bars.iter().map(|s| s.to_string()).collect()
    }

    fn cfg(ngram_bars: usize) -> SectionConfig {
        SectionConfig {
            ngram_bars,
            ..SectionConfig::default()
        }
    }

    fn chord_row(bar: i64, beat: f64, chord: &str, dur_beats: f64) -> TimelineRow {
        let mut row = TimelineRow::at(EventType::Chord, bar, beat, 0.0, 0.0);
        row.chord = Some(chord.to_string());
        row.dur_beats = Some(dur_beats);
        row
    }

    fn assert_partition(ranges: &[SectionLabel], n: usize) {
        let mut next = 1;
        for r in ranges {
            assert_eq!(r.bar_start, next);
            assert!(r.bar_end >= r.bar_start);
            next = r.bar_end + 1;
        }
        assert_eq!(next - 1, n as i64);
    }

    #[test]
    fn test_no_repeats_is_all_verse() {
        let labels = infer_section_labels(&sigs(&["C", "D", "E", "F"]), &cfg(2));
        assert_eq!(labels, vec![SectionName::Verse; 4]);
    }

    #[test]
    fn test_intro_and_outro_around_chorus() {
        let bars = sigs(&["E", "C", "G", "X", "C", "G", "D"]);
        let labels = infer_section_labels(&bars, &cfg(2));
        use SectionName::*;
        assert_eq!(labels, vec![Intro, Chorus, Chorus, Verse, Chorus, Chorus, Outro]);
        assert_partition(&section_ranges(&labels), bars.len());
    }

    #[test]
    fn test_higher_count_is_chorus() {
        // "A B" repeats three times, "C D" twice.
        let bars = sigs(&["C", "D", "x", "A", "B", "y", "C", "D", "z", "A", "B", "w", "A", "B"]);
        let labels = infer_section_labels(&bars, &cfg(2));
        assert_eq!(labels[3], SectionName::Chorus);
        assert_eq!(labels[12], SectionName::Chorus);
        assert_eq!(labels[0], SectionName::Verse);
        assert_eq!(labels[6], SectionName::Verse);
    }

    #[test]
    fn test_tie_break_policies() {
        // Both windows occur twice; "C D" starts earlier.
        let bars = sigs(&["C", "D", "x", "A", "B", "y", "C", "D", "z", "A", "B"]);

        let later = infer_section_labels(&bars, &cfg(2));
        assert_eq!(later[3], SectionName::Chorus);
        assert_eq!(later[0], SectionName::Verse);

        let earlier = SectionConfig {
            ngram_bars: 2,
            tie_break: ChorusTieBreak::EarlierFirst,
            ..SectionConfig::default()
        };
        let labels = infer_section_labels(&bars, &earlier);
        assert_eq!(labels[0], SectionName::Chorus);
        assert_eq!(labels[3], SectionName::Verse);
    }

    #[test]
    fn test_verse_never_overwrites_chorus() {
        // "A A" and "A B" both occur twice and overlap at bar 3.
        let bars = sigs(&["A", "A", "A", "B", "A", "B"]);
        let labels = infer_section_labels(&bars, &cfg(2));
        assert_eq!(labels[0], SectionName::Verse);
        assert_eq!(labels[2], SectionName::Chorus);
        assert_eq!(labels[5], SectionName::Chorus);
    }

    #[test]
    fn test_all_empty_windows_ignored() {
        let labels = infer_section_labels(&sigs(&["", "", "", ""]), &cfg(2));
        assert_eq!(labels, vec![SectionName::Verse; 4]);
    }

    #[test]
    fn test_intro_cap() {
        let bars = sigs(&["a", "b", "c", "d", "C", "G", "C", "G"]);
        let capped = SectionConfig {
            ngram_bars: 2,
            intro_max_bars: Some(2),
            ..SectionConfig::default()
        };
        let labels = infer_section_labels(&bars, &capped);
        use SectionName::*;
        assert_eq!(&labels[..4], &[Intro, Intro, Verse, Verse]);
    }

    #[test]
    fn test_idempotent() {
        let bars = sigs(&["C", "G", "Am", "F", "C", "G", "Am", "F", "Dm", "G", "C", "G", "Am", "F"]);
        let a = infer_section_labels(&bars, &cfg(4));
        let b = infer_section_labels(&bars, &cfg(4));
        assert_eq!(a, b);
        assert_partition(&section_ranges(&a), bars.len());
    }

    #[test]
    fn test_empty_input() {
        assert!(infer_section_labels(&[], &cfg(8)).is_empty());
        assert!(section_ranges(&[]).is_empty());
    }

    #[test]
    fn test_signatures_follow_held_chords() {
        let rows = vec![
            chord_row(1, 1.0, "N.C.", 4.0),
            chord_row(2, 1.0, "C", 8.0),
            chord_row(4, 1.0, "G", 2.0),
            chord_row(4, 3.0, "G", 2.0),
            chord_row(4, 3.5, "Am", 4.0),
        ];
        let sigs = bar_signatures(&rows, 4.0);
        assert_eq!(sigs, vec!["", "C", "C", "G Am", "Am"]);
    }

    #[test]
    fn test_apply_keeps_existing_labels() {
        let mut rows = vec![chord_row(1, 1.0, "C", 4.0), chord_row(2, 1.0, "G", 4.0), chord_row(0, 1.0, "F", 1.0)];
        rows[1].section = Some(SectionName::Outro);
        apply_sections(&mut rows, &[SectionName::Verse, SectionName::Chorus]);
        assert_eq!(rows[0].section, Some(SectionName::Verse));
        assert_eq!(rows[1].section, Some(SectionName::Outro));
        assert_eq!(rows[2].section, None);
    }

    #[test]
    fn test_sections_cover_bars_past_last_chord() {
        let mut rows = vec![chord_row(1, 1.0, "C", 4.0), chord_row(2, 1.0, "G", 4.0)];
        let ranges = infer_sections(&mut rows, 4.0, 5, &cfg(2));
        assert_partition(&ranges, 5);
        assert_eq!(ranges[0].name, SectionName::Verse);
    }

    #[test]
    fn test_extend_labels() {
        use SectionName::*;
        let mut labels = vec![Chorus, Chorus, Verse];
        extend_labels(&mut labels, 5);
        assert_eq!(labels, vec![Chorus, Chorus, Verse, Outro, Outro]);

        let mut plain = vec![Verse, Verse];
        extend_labels(&mut plain, 3);
        assert_eq!(plain, vec![Verse; 3]);

        extend_labels(&mut plain, 1);
        assert_eq!(plain.len(), 3);
    }

    #[test]
    fn test_ranges_expand_back_to_labels() {
        let labels = vec![
            SectionName::Intro,
            SectionName::Chorus,
            SectionName::Chorus,
            SectionName::Verse,
        ];
        assert_eq!(labels_from_ranges(&section_ranges(&labels)), labels);
    }
}

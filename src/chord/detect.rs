//! Chord recognition from pitch content.
//!
//! Each template is an interval set above a root. For every candidate root and every
//! template that fits inside the rooted pitch-class set, the match is scored as the
//! tuple `(-template_size, color_extras, suffix, root)` and the smallest tuple wins:
//! larger templates first, then fewer 9th/11th/13th color tones, then suffix and root
//! order so ties always resolve the same way.

use std::collections::BTreeSet;

use serde::Serialize;

use super::NOTE_NAMES;
use crate::error::{Result, TimelineError};

/// Interval templates above the root, richest first, tagged with canonical suffixes.
pub const TEMPLATES: [(&str, &[u8]); 12] = [
    ("maj7", &[0, 4, 7, 11]),
    ("7", &[0, 4, 7, 10]),
    ("m7", &[0, 3, 7, 10]),
    ("m7b5", &[0, 3, 6, 10]),
    ("dim7", &[0, 3, 6, 9]),
    ("", &[0, 4, 7]),
    ("m", &[0, 3, 7]),
    ("dim", &[0, 3, 6]),
    ("#5", &[0, 4, 8]),
    ("sus2", &[0, 2, 7]),
    ("sus4", &[0, 5, 7]),
    ("5", &[0, 7]),
];

/// Intervals (9th, 11th, 13th) that may sound over a template.
const COLOR_TONES: [u8; 3] = [2, 5, 9];

/// The winning template for a pitch-class set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChordMatch {
    pub root: u8,
    pub suffix: &'static str,
    pub template_size: usize,
    pub color_extras: usize,
}

impl ChordMatch {
    pub fn name(&self) -> String {
        format!("{}{}", NOTE_NAMES[self.root as usize], self.suffix)
    }
}

/// Score a pitch set against every rooted template.
///
/// Accepts MIDI note numbers or pitch classes (reduced mod 12).
///
/// # Errors
/// `InsufficientPitchInfo` when fewer than two distinct pitch classes are given.
/// Returns `Ok(None)` when no template fits any rooting.
pub fn match_template<I>(pitches: I) -> Result<Option<ChordMatch>>
where
    I: IntoIterator<Item = u8>,
{
    let pcs: BTreeSet<u8> = pitches.into_iter().map(|p| p % 12).collect();
    if pcs.len() < 2 {
        return Err(TimelineError::InsufficientPitchInfo {
            distinct: pcs.len(),
        });
    }

    let mut best: Option<(i64, usize, &'static str, u8)> = None;
    for root in 0..12u8 {
        let rel: BTreeSet<u8> = pcs.iter().map(|pc| (pc + 12 - root) % 12).collect();
        for (suffix, template) in TEMPLATES.iter() {
            if !template.iter().all(|iv| rel.contains(iv)) {
                continue;
            }
            let extras = rel
                .iter()
                .filter(|&&iv| !template.contains(&iv) && COLOR_TONES.contains(&iv))
                .count();
            let score = (-(template.len() as i64), extras, *suffix, root);
            if best.map_or(true, |b| score < b) {
                best = Some(score);
            }
        }
    }

    Ok(best.map(|(neg_size, extras, suffix, root)| ChordMatch {
        root,
        suffix,
        template_size: (-neg_size) as usize,
        color_extras: extras,
    }))
}

/// Name the chord formed by `pitches`, or `None` if there is too little to go on.
///
/// # Examples
/// ```
/// use chartgrid::chord::detect_chord_name;
///
/// assert_eq!(detect_chord_name([0, 4, 7]), Some("C".to_string()));
/// assert_eq!(detect_chord_name([60, 64, 67, 71]), Some("Cmaj7".to_string()));
/// assert_eq!(detect_chord_name([9, 0, 4, 7]), Some("Am7".to_string()));
/// assert_eq!(detect_chord_name([0]), None);
/// ```
pub fn detect_chord_name<I>(pitches: I) -> Option<String>
where
    I: IntoIterator<Item = u8>,
{
    match_template(pitches).ok().flatten().map(|m| m.name())
}

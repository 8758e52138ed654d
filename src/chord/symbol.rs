//! Strict chord label parsing.
//!
//! `normalize_symbol` accepts anything; this parser is the gate that decides whether
//! a MIDI text event is a chord label at all. It accepts a root letter, an optional
//! accidental, a tail made only of quality tokens, and an optional slash bass.

use std::collections::BTreeSet;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::normalize::{clean_glyphs, normalize_tail};
use super::{root_pitch_class, sharpen_root};
use crate::error::{Result, TimelineError};

static LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([A-Ga-g])([#b]?)((?:maj|min|dim|aug|sus|add|alt|no|m|M|[0-9]|[#b+\-°ø(),])*)(?:/([A-Ga-g][#b]?))?$",
    )
    .expect("static regex")
});

const MAJOR_TRIAD: &[u8] = &[0, 4, 7];

/// Quality prefixes and their intervals above the root, most specific first.
const QUALITY_INTERVALS: [(&str, &[u8]); 15] = [
    ("maj7", &[0, 4, 7, 11]),
    ("maj", &[0, 4, 7]),
    ("m7b5", &[0, 3, 6, 10]),
    ("m7", &[0, 3, 7, 10]),
    ("-7", &[0, 3, 7, 10]),
    ("m", &[0, 3, 7]),
    ("-", &[0, 3, 7]),
    ("dim7", &[0, 3, 6, 9]),
    ("dim", &[0, 3, 6]),
    ("sus2", &[0, 2, 7]),
    ("sus4", &[0, 5, 7]),
    ("sus", &[0, 5, 7]),
    ("7", &[0, 4, 7, 10]),
    ("#5", &[0, 4, 8]),
    ("5", &[0, 7]),
];

/// A parsed chord label in canonical spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChordSymbol {
    /// Sharp-spelled root, e.g. `"A#"`.
    pub root: String,
    /// Normalized quality suffix, e.g. `"maj7"`; empty for a major triad.
    pub quality: String,
    /// Sharp-spelled slash bass.
    pub bass: Option<String>,
}

impl ChordSymbol {
    pub fn root_pitch_class(&self) -> Option<u8> {
        root_pitch_class(&self.root)
    }

    /// Sorted pitch classes of the chord's basic shape plus its slash bass.
    ///
    /// Extensions beyond the seventh are ignored; an unrecognized quality reads
    /// as a major triad.
    ///
    /// # Examples
    /// ```
    /// use chartgrid::chord::parse_chord_label;
    ///
    /// let chord = parse_chord_label("Am7/G").unwrap();
    /// assert_eq!(chord.pitch_classes(), Some(vec![0, 4, 7, 9]));
    /// ```
    pub fn pitch_classes(&self) -> Option<Vec<u8>> {
        let root = self.root_pitch_class()?;
        let intervals = QUALITY_INTERVALS
            .iter()
            .find(|(prefix, _)| self.quality.starts_with(prefix))
            .map_or(MAJOR_TRIAD, |(_, iv)| *iv);

        let mut pcs: BTreeSet<u8> = intervals.iter().map(|iv| (root + iv) % 12).collect();
        if let Some(bass) = self.bass.as_deref().and_then(root_pitch_class) {
            pcs.insert(bass);
        }
        Some(pcs.into_iter().collect())
    }
}

impl fmt::Display for ChordSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.root, self.quality)?;
        if let Some(bass) = &self.bass {
            write!(f, "/{}", bass)?;
        }
        Ok(())
    }
}

/// Parse a chord label, rejecting text that is not chord notation.
///
/// # Errors
/// `UnparseableChordLabel` when the text is empty, does not start with a root
/// letter, or carries a tail that is not made of quality tokens (`"Chorus"`).
///
/// # Examples
/// ```
/// use chartgrid::chord::parse_chord_label;
///
/// let chord = parse_chord_label("Bbm7/F").unwrap();
/// assert_eq!(chord.to_string(), "A#m7/F");
/// assert!(parse_chord_label("Chorus").is_err());
/// ```
pub fn parse_chord_label(text: &str) -> Result<ChordSymbol> {
    let cleaned = clean_glyphs(text).replace(' ', "");
    let caps = LABEL
        .captures(&cleaned)
        .ok_or_else(|| TimelineError::UnparseableChordLabel(text.to_string()))?;
    // A bare lowercase letter is a word ("a", "e"), not a chord.
    let bare = caps.get(2).map_or(true, |m| m.is_empty())
        && caps.get(3).map_or(true, |m| m.is_empty())
        && caps.get(4).is_none();
    if bare && caps[1].starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err(TimelineError::UnparseableChordLabel(text.to_string()));
    }

    let root = format!("{}{}", caps[1].to_ascii_uppercase(), &caps[2]);
    let quality = normalize_tail(caps.get(3).map_or("", |m| m.as_str()));
    let bass = caps.get(4).map(|m| {
        let mut chars = m.as_str().chars();
        let letter = chars.next().map(|c| c.to_ascii_uppercase()).unwrap_or('C');
        let spelled: String = std::iter::once(letter).chain(chars).collect();
        sharpen_root(&spelled).to_string()
    });

    Ok(ChordSymbol {
        root: sharpen_root(&root).to_string(),
        quality,
        bass,
    })
}

/// True when `text` parses as a chord label.
pub fn is_chord_label(text: &str) -> bool {
    parse_chord_label(text).is_ok()
}

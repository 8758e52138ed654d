//! # Chord Module
//!
//! Canonical chord symbols from MIDI text markers or from sounding pitches.
//!
//! ## Purpose
//! Chord labels reach the engine two ways:
//! 1. **Text**: arbitrary marker/text meta events typed by a human or exported by a
//!    chord-detection service (`"Bbmaj7"`, `"f#m"`, `"E♭ aug"`).
//! 2. **Pitches**: the set of notes sounding at an instant, when a file carries no
//!    usable labels.
//!
//! Both paths end in the same canonical spelling: uppercase root, sharps only,
//! normalized quality suffix, or `N.C.` for no chord.
//!
//! ## Sub-modules
//! - `normalize` - text cleanup into canonical spelling (never fails)
//! - `symbol` - strict label parser used to tell chord labels from other text
//! - `detect` - interval-template matching over pitch-class sets
//!
//! ## Example
//! ```rust
//! use chartgrid::chord::{detect_chord_name, normalize_symbol};
//!
//! assert_eq!(normalize_symbol("Bbmaj7"), "A#maj7");
//! assert_eq!(detect_chord_name([9, 0, 4, 7]), Some("Am7".to_string()));
//! ```

mod detect;
mod normalize;
mod symbol;

pub use detect::{detect_chord_name, match_template, ChordMatch, TEMPLATES};
pub use normalize::normalize_symbol;
pub use symbol::{is_chord_label, parse_chord_label, ChordSymbol};

/// Label used when no chord sounds.
pub const NO_CHORD: &str = "N.C.";

/// Sharp spellings of the twelve pitch classes, indexed from C.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Flat roots and their sharp enharmonics.
pub(crate) const FLAT_TO_SHARP: [(&str, &str); 5] = [
    ("Ab", "G#"),
    ("Bb", "A#"),
    ("Db", "C#"),
    ("Eb", "D#"),
    ("Gb", "F#"),
];

/// Rewrite a flat root (`"Bb"`) to its sharp enharmonic; other roots pass through.
pub(crate) fn sharpen_root(root: &str) -> &str {
    FLAT_TO_SHARP
        .iter()
        .find(|(flat, _)| *flat == root)
        .map(|(_, sharp)| *sharp)
        .unwrap_or(root)
}

/// Pitch class (0 = C) of a canonical or flat root spelling.
pub fn root_pitch_class(root: &str) -> Option<u8> {
    let mut chars = root.chars();
    let base: i8 = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let acc: i8 = match chars.next() {
        Some('#') => 1,
        Some('b') => -1,
        None => 0,
        Some(_) => return None,
    };
    Some((base + acc).rem_euclid(12) as u8)
}

//! Text-level chord normalization.

use once_cell::sync::Lazy;
use regex::Regex;

use super::sharpen_root;

static ROOT_AND_TAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([A-Ga-g])([#b]?)(.*)$").expect("static regex"));

static SLASH_BASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/([A-Ga-g])([#b]?)").expect("static regex"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Map unicode accidentals and dashes to ASCII, trim, and collapse whitespace.
pub(crate) fn clean_glyphs(raw: &str) -> String {
    let ascii: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            '♯' => '#',
            '♭' => 'b',
            '–' | '—' | '−' => '-',
            other => other,
        })
        .collect();
    WHITESPACE.replace_all(&ascii, " ").into_owned()
}

/// Rewrite quality aliases in a chord tail.
///
/// `min` becomes `m` and `aug` becomes `#5`; `maj`, `dim`, `sus2` and `sus4` are kept.
/// A slash bass gets the same sharp spelling as a root.
pub(crate) fn normalize_tail(tail: &str) -> String {
    let tail = tail.replace("min", "m").replace("aug", "#5");
    let tail = SLASH_BASS.replace_all(&tail, |caps: &regex::Captures| {
        let bass = format!("{}{}", caps[1].to_ascii_uppercase(), &caps[2]);
        format!("/{}", sharpen_root(&bass))
    });
    tail.trim().to_string()
}

/// Normalize a raw chord label into canonical spelling.
///
/// Never fails: text that does not start with a chord root comes back cleaned but
/// otherwise as given, and empty input stays empty.
///
/// # Examples
/// ```
/// use chartgrid::chord::normalize_symbol;
///
/// assert_eq!(normalize_symbol("Bbmaj7"), "A#maj7");
/// assert_eq!(normalize_symbol(" e♭ min7 "), "D#m7");
/// assert_eq!(normalize_symbol("Caug"), "C#5");
/// assert_eq!(normalize_symbol("N.C."), "N.C.");
/// assert_eq!(normalize_symbol(""), "");
/// ```
pub fn normalize_symbol(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let cleaned = clean_glyphs(raw);
    let Some(caps) = ROOT_AND_TAIL.captures(&cleaned) else {
        return cleaned;
    };
    let root = format!("{}{}", caps[1].to_ascii_uppercase(), &caps[2]);
    let root = sharpen_root(&root);
    let tail = normalize_tail(caps.get(3).map_or("", |m| m.as_str()));
    format!("{}{}", root, tail).trim().to_string()
}

//! LRC and WebVTT readers.
//!
//! Both formats carry line-level timing. Each timed line becomes one [`LyricWord`]
//! whose text is the whole line.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::LyricWord;

static LRC_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\d{1,3}):(\d{2})(?:[.:](\d{1,3}))?\]").expect("static regex"));

static VTT_CUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:(\d{1,2}):)?(\d{2}):(\d{2})[.,](\d{3})\s*-->\s*(?:(\d{1,2}):)?(\d{2}):(\d{2})[.,](\d{3})",
    )
    .expect("static regex")
});

fn int(caps: &Captures, i: usize) -> f64 {
    caps.get(i)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .unwrap_or(0) as f64
}

/// Digits after the decimal point read as a fraction of a second.
fn fraction(caps: &Captures, i: usize) -> f64 {
    caps.get(i)
        .and_then(|m| format!("0.{}", m.as_str()).parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Parse `[mm:ss]`, `[mm:ss.xx]` and `[mm:ss.xxx]` tagged lines.
///
/// A line with several tags yields one word per tag. Lines without text are
/// skipped. Words come back in start order.
///
/// # Examples
/// ```
/// use chartgrid::lyrics::parse_lrc;
///
/// let words = parse_lrc("[ar:Someone]\n[00:12.50]Hello there\n[00:10][01:02.5]Oh\n");
/// let starts: Vec<f64> = words.iter().map(|w| w.start_s).collect();
/// assert_eq!(starts, vec![10.0, 12.5, 62.5]);
/// assert_eq!(words[1].text, "Hello there");
/// ```
pub fn parse_lrc(text: &str) -> Vec<LyricWord> {
    let mut words = Vec::new();
    for line in text.lines() {
        let lyric = LRC_TAG.replace_all(line, "");
        let lyric = lyric.trim();
        if lyric.is_empty() {
            continue;
        }
        for caps in LRC_TAG.captures_iter(line) {
            let start = int(&caps, 1) * 60.0 + int(&caps, 2) + fraction(&caps, 3);
            words.push(LyricWord::new(lyric, start));
        }
    }
    words.sort_by(|a, b| a.start_s.total_cmp(&b.start_s));
    words
}

/// Parse WebVTT cues. Hours are optional and `,` is accepted as the decimal
/// separator. The cue text is every following line up to a blank one, joined by
/// spaces.
///
/// # Examples
/// ```
/// use chartgrid::lyrics::parse_vtt;
///
/// let vtt = "WEBVTT\n\n00:00:01.000 --> 00:00:02.500\nFirst line\ncontinued\n\n00:03,250 --> 00:04,000\nSecond\n";
/// let words = parse_vtt(vtt);
/// assert_eq!(words.len(), 2);
/// assert_eq!(words[0].text, "First line continued");
/// assert_eq!(words[0].end_s, Some(2.5));
/// assert_eq!(words[1].start_s, 3.25);
/// ```
pub fn parse_vtt(text: &str) -> Vec<LyricWord> {
    let mut words = Vec::new();
    let mut lines = text.lines();
    while let Some(line) = lines.next() {
        let Some(caps) = VTT_CUE.captures(line.trim()) else {
            continue;
        };
        let start = int(&caps, 1) * 3600.0 + int(&caps, 2) * 60.0 + int(&caps, 3) + fraction(&caps, 4);
        let end = int(&caps, 5) * 3600.0 + int(&caps, 6) * 60.0 + int(&caps, 7) + fraction(&caps, 8);

        let mut payload = Vec::new();
        for next in lines.by_ref() {
            if next.trim().is_empty() {
                break;
            }
            payload.push(next.trim());
        }
        let lyric = payload.join(" ");
        if !lyric.is_empty() {
            words.push(LyricWord::new(lyric, start).with_end(end));
        }
    }
    words
}

/// Detect the format and parse. A `WEBVTT` header or any `-->` cue means WebVTT,
/// anything else is read as LRC.
pub fn parse_lyrics(text: &str) -> Vec<LyricWord> {
    if text.trim_start().starts_with("WEBVTT") || text.contains("-->") {
        parse_vtt(text)
    } else {
        parse_lrc(text)
    }
}

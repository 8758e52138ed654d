pub mod api;
pub mod chord;
pub mod config;
pub mod error;
pub mod export;
pub mod lyrics;
pub mod midi;
pub mod quantize;
pub mod sections;
pub mod tempo;
pub mod timeline;

pub use api::{
    align_live_words, align_lyrics, build_chord_timeline, process_song, process_song_live, ChordTimeline, LyricTimeline,
    SongTimeline,
};
pub use config::TimelineConfig;
pub use error::*;
pub use midi::ParsedMidi;
pub use tempo::{GridPosition, TempoMap, TempoSegment, TimeSignature};
pub use timeline::{ChordEvent, ChordSource, EventType, SectionLabel, SectionName, TimelineRow};

fn read_inputs(
    midi_path: &std::path::Path,
    lyrics_path: Option<&std::path::Path>,
) -> Result<(ParsedMidi, Option<Vec<lyrics::LyricWord>>)> {
    let parsed = ParsedMidi::from_path(midi_path)?;
    let words = match lyrics_path {
        Some(path) => Some(lyrics::parse_lyrics(&std::fs::read_to_string(path)?)),
        None => None,
    };
    Ok((parsed, words))
}

/// Read a MIDI file and, optionally, a timed-lyrics file, and build the song's timeline.
/// This is the main entry point for the library.
pub fn process_files(
    midi_path: &std::path::Path,
    lyrics_path: Option<&std::path::Path>,
    cfg: &TimelineConfig,
) -> Result<SongTimeline> {
    let (parsed, words) = read_inputs(midi_path, lyrics_path)?;
    process_song(&parsed, words, cfg)
}

/// Like [`process_files`], but the lyric words are placed unsnapped as live captures.
pub fn process_files_live(
    midi_path: &std::path::Path,
    lyrics_path: Option<&std::path::Path>,
    cfg: &TimelineConfig,
) -> Result<SongTimeline> {
    let (parsed, words) = read_inputs(midi_path, lyrics_path)?;
    process_song_live(&parsed, words, cfg)
}

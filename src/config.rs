//! # Configuration
//!
//! Every tunable of the engine in one validated structure.
//!
//! ## Purpose
//! The capture pipeline reads a YAML document with one block per stage. This
//! module mirrors that nesting so an existing `config.yaml` can be loaded as is:
//!
//! ```yaml
//! midi:
//!   snap_beats: 0.9
//!   prebars: 4
//! sections:
//!   ngram_bars: 8
//!   tie_break: later_first
//! lyrics:
//!   snap_div: 4
//! ```
//!
//! Missing keys fall back to the defaults documented on each field. Unknown keys
//! are ignored, since the same file carries settings for the surrounding tools.
//!
//! ## Example
//! ```rust
//! use chartgrid::TimelineConfig;
//!
//! let cfg = TimelineConfig::from_yaml_str("sections:\n  ngram_bars: 4\n").unwrap();
//! assert_eq!(cfg.sections.ngram_bars, 4);
//! assert_eq!(cfg.lyrics.snap_div, 4);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TimelineError};

/// Which window wins Chorus when two repeated windows occur equally often.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChorusTieBreak {
    /// The window first heard later in the song is the chorus.
    #[default]
    LaterFirst,
    /// The window first heard earlier is the chorus.
    EarlierFirst,
}

/// MIDI ingestion and grid quantization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiConfig {
    /// Snap chord events within this many beats of a bar start onto it (0 disables).
    pub snap_beats: f64,
    /// Beats sounding before the Bar 1 downbeat.
    pub pickup_beats: f64,
    /// Explicit shift applied to every bar number. Overrides `prebars`.
    pub bar_index_offset: Option<i64>,
    /// Count-in bars; shown as negative bars ending at bar 0.
    pub prebars: u32,
    /// Note-grid subdivisions per beat used when inferring chords from notes.
    pub chord_grid_div: u32,
    /// Below this many chord-like text events, chords are inferred from notes.
    pub min_text_chords: usize,
    /// Skip the General MIDI drum channel when inferring chords.
    pub ignore_drums: bool,
}

impl Default for MidiConfig {
    fn default() -> Self {
        MidiConfig {
            snap_beats: 0.9,
            pickup_beats: 0.0,
            bar_index_offset: None,
            prebars: 0,
            chord_grid_div: 2,
            min_text_chords: 3,
            ignore_drums: true,
        }
    }
}

impl MidiConfig {
    /// The bar shift to apply to emitted rows.
    ///
    /// # Examples
    /// ```
    /// use chartgrid::config::MidiConfig;
    ///
    /// let cfg = MidiConfig { prebars: 4, ..MidiConfig::default() };
    /// assert_eq!(cfg.bar_offset(), -5);
    ///
    /// let cfg = MidiConfig { prebars: 4, bar_index_offset: Some(-2), ..MidiConfig::default() };
    /// assert_eq!(cfg.bar_offset(), -2);
    /// ```
    pub fn bar_offset(&self) -> i64 {
        match self.bar_index_offset {
            Some(offset) => offset,
            None if self.prebars > 0 => -(self.prebars as i64 + 1),
            None => 0,
        }
    }
}

/// Section inference settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionConfig {
    /// Window length, in bars, for repeated-pattern detection.
    pub ngram_bars: usize,
    /// A window must occur at least this often to count as repeated.
    pub chorus_min_occurs: usize,
    /// Cap on Intro length; leading bars past the cap become Verse. `None` is uncapped.
    pub intro_max_bars: Option<usize>,
    pub tie_break: ChorusTieBreak,
}

impl Default for SectionConfig {
    fn default() -> Self {
        SectionConfig {
            ngram_bars: 8,
            chorus_min_occurs: 2,
            intro_max_bars: None,
            tie_break: ChorusTieBreak::LaterFirst,
        }
    }
}

/// Lyric alignment settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LyricsConfig {
    /// Sub-beat grid resolution (4 = sixteenth notes).
    pub snap_div: u32,
    /// Separator between words in a `LyricBar` row.
    pub joiner: String,
    /// Live words held at least this many beats are melismas.
    pub melisma_threshold_beats: f64,
    /// Largest global offset correction, in seconds, either direction.
    pub max_offset_s: f64,
    /// Confidence assumed for words that carry none.
    pub default_confidence: f64,
}

impl Default for LyricsConfig {
    fn default() -> Self {
        LyricsConfig {
            snap_div: 4,
            joiner: " ".to_string(),
            melisma_threshold_beats: 1.0,
            max_offset_s: 1.5,
            default_confidence: 0.95,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    pub midi: MidiConfig,
    pub sections: SectionConfig,
    pub lyrics: LyricsConfig,
}

impl TimelineConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let cfg: TimelineConfig = if content.trim().is_empty() {
            TimelineConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| TimelineError::ConfigParse(e.to_string()))?
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Reject values that would make a stage meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.sections.ngram_bars == 0 {
            return Err(TimelineError::InvalidConfig(
                "sections.ngram_bars must be at least 1".to_string(),
            ));
        }
        if self.sections.chorus_min_occurs < 1 {
            return Err(TimelineError::InvalidConfig(
                "sections.chorus_min_occurs must be at least 1".to_string(),
            ));
        }
        if self.lyrics.snap_div == 0 {
            return Err(TimelineError::InvalidConfig(
                "lyrics.snap_div must be at least 1".to_string(),
            ));
        }
        if self.midi.snap_beats < 0.0 {
            return Err(TimelineError::InvalidConfig(format!(
                "midi.snap_beats must not be negative, got {}",
                self.midi.snap_beats
            )));
        }
        if self.midi.pickup_beats < 0.0 {
            return Err(TimelineError::InvalidConfig(format!(
                "midi.pickup_beats must not be negative, got {}",
                self.midi.pickup_beats
            )));
        }
        if self.lyrics.melisma_threshold_beats <= 0.0 {
            return Err(TimelineError::InvalidConfig(format!(
                "lyrics.melisma_threshold_beats must be positive, got {}",
                self.lyrics.melisma_threshold_beats
            )));
        }
        if self.lyrics.max_offset_s <= 0.0 {
            return Err(TimelineError::InvalidConfig(format!(
                "lyrics.max_offset_s must be positive, got {}",
                self.lyrics.max_offset_s
            )));
        }
        Ok(())
    }
}

//! # Error Types
//!
//! This module defines the error type shared by every stage of the timeline engine.
//!
//! Two families of failure exist:
//! - **Structural** errors (`EmptyTempoMap`, `InvalidTimeSignature`, `InvalidConfig`)
//!   mean the caller handed over an impossible configuration. Tempo and grid
//!   functions return these instead of guessing.
//! - **Noisy input** errors (`UnparseableChordLabel`, `InsufficientPitchInfo`) only
//!   come out of the strict chord entry points. The public recognizer and
//!   normalizer swallow them and return a best-effort result, because MIDI text
//!   markers are arbitrary.
//!
//! ## Usage
//! ```rust
//! use chartgrid::{TempoMap, TimelineError};
//!
//! match TempoMap::new(Vec::new()) {
//!     Err(TimelineError::EmptyTempoMap) => {}
//!     other => panic!("unexpected: {:?}", other),
//! }
//! ```

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TimelineError {
    /// A tempo map needs at least one segment.
    ///
    /// # Example
    /// ```
    /// # use chartgrid::TimelineError;
    /// assert_eq!(
    ///     TimelineError::EmptyTempoMap.to_string(),
    ///     "Tempo map must have at least one segment"
    /// );
    /// ```
    #[error("Tempo map must have at least one segment")]
    EmptyTempoMap,

    /// Beats per bar must be at least 1.
    #[error("Invalid time signature: numerator {numerator} must be >= 1")]
    InvalidTimeSignature { numerator: i64 },

    /// Text that does not start with a chord root (A-G).
    #[error("Unparseable chord label: {0:?}")]
    UnparseableChordLabel(String),

    /// Template matching needs two or more distinct pitch classes.
    #[error("Insufficient pitch information: {distinct} distinct pitch class(es), need at least 2")]
    InsufficientPitchInfo { distinct: usize },

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The YAML configuration could not be deserialized.
    #[error("Configuration parse error: {0}")]
    ConfigParse(String),

    /// The MIDI byte stream is not a valid Standard MIDI File.
    #[error("MIDI parse error: {0}")]
    MidiParse(String),

    /// SMPTE timecode files carry no PPQN and cannot be placed on a beat grid.
    #[error("Unsupported MIDI timing: timecode-based files have no ticks per beat")]
    UnsupportedTiming,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TimelineError>;

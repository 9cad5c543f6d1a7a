// MIDI feature extraction for the composer corpus

pub mod features;
pub mod midi_parser;

pub use features::*;

/// Error type for per-file extraction. Never escapes the extractor; it is
/// turned into an [`ErrorRecord`] attached to the file.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("MIDI parse error: {0}")]
    Midi(#[from] midly::Error),

    #[error("Truncated MIDI data: {0}")]
    Truncated(String),

    #[error("Invalid timing: {0}")]
    InvalidTiming(String),

    #[error("Invalid time signature: {0}")]
    InvalidTimeSignature(String),

    #[error("Invalid key signature: {0}")]
    InvalidKeySignature(String),

    #[error("MIDI parser panicked")]
    Panicked,
}

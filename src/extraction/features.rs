// Per-file feature records extracted from parsed MIDI

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::midi_parser::{parse_midi_bytes, NoteEvent};
use super::ExtractError;

const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Scientific pitch name for a MIDI note number (60 -> "C4").
pub fn note_name(pitch: u8) -> String {
    format!("{}{}", PITCH_CLASS_NAMES[(pitch % 12) as usize], octave_of(pitch))
}

/// Octave number where middle C (60) is octave 4.
pub fn octave_of(pitch: u8) -> i32 {
    pitch as i32 / 12 - 1
}

/// A note reduced to the features kept in the corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedNote {
    name: String,
    duration: f64,
    octave: i32,
}

impl ExtractedNote {
    pub fn from_event(event: &NoteEvent) -> Self {
        Self {
            name: note_name(event.pitch),
            // Pairing runs on a monotonic clock; the clamp only absorbs float noise
            duration: (event.end - event.onset).max(0.0),
            octave: octave_of(event.pitch),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Seconds between note-on and note-off
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn octave(&self) -> i32 {
        self.octave
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoPoint {
    /// Seconds from file start
    pub offset: f64,
    pub bpm: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSignaturePoint {
    /// Seconds from file start
    pub offset: f64,
    pub numerator: u32,
    pub denominator: u32,
}

/// Key code: 0-11 for major keys, 12-23 for minor keys, by tonic pitch class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeySignature(u8);

impl KeySignature {
    /// Build from a key-signature meta event (sharps/flats count, minor flag).
    pub fn from_midi(sharps: i8, minor: bool) -> Result<Self, ExtractError> {
        if !(-7..=7).contains(&sharps) {
            return Err(ExtractError::InvalidKeySignature(format!(
                "{} accidentals is outside -7..=7",
                sharps
            )));
        }
        // Each sharp moves the major tonic up a fifth
        let major_tonic = (sharps as i32 * 7).rem_euclid(12) as u8;
        Ok(if minor {
            Self((major_tonic + 9) % 12 + 12)
        } else {
            Self(major_tonic)
        })
    }

    pub fn code(&self) -> u8 {
        self.0
    }

    pub fn is_minor(&self) -> bool {
        self.0 >= 12
    }

    /// Human-readable key, e.g. "G major" or "E minor"
    pub fn name(&self) -> String {
        let tonic = PITCH_CLASS_NAMES[(self.0 % 12) as usize];
        let mode = if self.is_minor() { "minor" } else { "major" };
        format!("{} {}", tonic, mode)
    }
}

/// Features extracted from one MIDI file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "FeatureRecord", try_from = "FeatureRecord")]
pub struct FileFeatures {
    /// Sorted by onset; notes sharing an onset keep encounter order
    pub notes: Vec<ExtractedNote>,
    pub tempos: Vec<TempoPoint>,
    pub time_signatures: Vec<TimeSignaturePoint>,
    /// First key signature in the file, if any
    pub key_signature: Option<KeySignature>,
}

impl FileFeatures {
    pub fn note_count(&self) -> usize {
        self.notes.len()
    }
}

/// Column-oriented layout written to the corpus file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRecord {
    notes: Vec<String>,
    note_lengths: Vec<f64>,
    octaves: Vec<i32>,
    overall_key: Option<KeySignature>,
    num_notes: usize,
    tempos: Vec<TempoPoint>,
    musical_meters: Vec<TimeSignaturePoint>,
}

impl From<FileFeatures> for FeatureRecord {
    fn from(features: FileFeatures) -> Self {
        let num_notes = features.note_count();
        let mut notes = Vec::with_capacity(num_notes);
        let mut note_lengths = Vec::with_capacity(num_notes);
        let mut octaves = Vec::with_capacity(num_notes);
        for note in features.notes {
            note_lengths.push(note.duration);
            octaves.push(note.octave);
            notes.push(note.name);
        }
        Self {
            notes,
            note_lengths,
            octaves,
            overall_key: features.key_signature,
            num_notes,
            tempos: features.tempos,
            musical_meters: features.time_signatures,
        }
    }
}

impl TryFrom<FeatureRecord> for FileFeatures {
    type Error = String;

    fn try_from(record: FeatureRecord) -> Result<Self, Self::Error> {
        let n = record.notes.len();
        if record.note_lengths.len() != n || record.octaves.len() != n || record.num_notes != n {
            return Err(format!(
                "note columns disagree: {} names, {} lengths, {} octaves, num_notes {}",
                n,
                record.note_lengths.len(),
                record.octaves.len(),
                record.num_notes
            ));
        }

        let notes = record
            .notes
            .into_iter()
            .zip(record.note_lengths)
            .zip(record.octaves)
            .map(|((name, duration), octave)| ExtractedNote { name, duration, octave })
            .collect();

        Ok(Self {
            notes,
            tempos: record.tempos,
            time_signatures: record.musical_meters,
            key_signature: record.overall_key,
        })
    }
}

/// Why a file produced no features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub error: String,
    pub file: PathBuf,
}

/// Result of extracting one file: features or an error record, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileOutcome {
    Features(FileFeatures),
    Failed(ErrorRecord),
}

impl FileOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, FileOutcome::Features(_))
    }

    pub fn features(&self) -> Option<&FileFeatures> {
        match self {
            FileOutcome::Features(f) => Some(f),
            FileOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorRecord> {
        match self {
            FileOutcome::Features(_) => None,
            FileOutcome::Failed(e) => Some(e),
        }
    }
}

/// Extract features from raw SMF bytes.
pub fn extract_features(data: &[u8]) -> Result<FileFeatures, ExtractError> {
    let parsed = parse_midi_bytes(data)?;

    let mut events = parsed.notes;
    // Stable: equal onsets keep track/close order
    events.sort_by(|a, b| a.onset.total_cmp(&b.onset));

    Ok(FileFeatures {
        notes: events.iter().map(ExtractedNote::from_event).collect(),
        tempos: parsed.tempos,
        time_signatures: parsed.time_signatures,
        key_signature: parsed.key_signature,
    })
}

/// Extract features from bytes already read from `path`. Never fails: any
/// error, including a parser panic, becomes an [`ErrorRecord`].
pub fn extract_bytes(path: &Path, data: &[u8]) -> FileOutcome {
    let result = panic::catch_unwind(AssertUnwindSafe(|| extract_features(data)))
        .unwrap_or_else(|_| Err(ExtractError::Panicked));
    into_outcome(path, result)
}

/// Read and extract one MIDI file. Never fails: errors become an [`ErrorRecord`].
pub fn extract_file(path: &Path) -> FileOutcome {
    match std::fs::read(path) {
        Ok(data) => extract_bytes(path, &data),
        Err(e) => into_outcome(path, Err(ExtractError::Io(e))),
    }
}

fn into_outcome(path: &Path, result: Result<FileFeatures, ExtractError>) -> FileOutcome {
    match result {
        Ok(features) => {
            log::debug!(
                "Extracted {}: {} notes, {} tempo points, key {}",
                path.display(),
                features.note_count(),
                features.tempos.len(),
                features.key_signature.map(|k| k.name()).unwrap_or_else(|| "none".into()),
            );
            FileOutcome::Features(features)
        }
        Err(e) => {
            log::warn!("Failed to extract {}: {}", path.display(), e);
            FileOutcome::Failed(ErrorRecord {
                error: e.to_string(),
                file: path.to_path_buf(),
            })
        }
    }
}

// MIDI file parser resolving note, tempo and meter events to seconds

use std::collections::HashMap;

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

use super::features::{KeySignature, TempoPoint, TimeSignaturePoint};
use super::ExtractError;

/// Tempo assumed before the first explicit tempo event (120 BPM).
pub const DEFAULT_MICROS_PER_BEAT: u32 = 500_000;

/// A paired note-on/note-off occurrence with times resolved to seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteEvent {
    pub pitch: u8,
    pub onset: f64,
    pub end: f64,
    /// Index of the track the note was read from
    pub track: usize,
}

/// A tempo change at an absolute tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoEvent {
    pub tick: u64,
    pub microseconds_per_beat: u32,
}

pub struct MidiParseResult {
    /// Notes in encounter order: track by track, then grouped per
    /// (channel, program) instrument in order of each instrument's first
    /// closed note, then in close order
    pub notes: Vec<NoteEvent>,
    pub tempos: Vec<TempoPoint>,
    pub time_signatures: Vec<TimeSignaturePoint>,
    pub key_signature: Option<KeySignature>,
}

/// One constant-tempo stretch of the tempo map.
#[derive(Debug, Clone, Copy)]
pub struct TempoSegment {
    tick: u64,
    seconds: f64,
    microseconds_per_beat: u32,
}

/// Converts absolute ticks to seconds for one file.
#[derive(Debug, Clone)]
pub enum TickClock {
    Metrical {
        ticks_per_beat: u16,
        segments: Vec<TempoSegment>,
    },
    /// SMPTE timing ignores tempo events
    Timecode { seconds_per_tick: f64 },
}

impl TickClock {
    /// Build a clock from the header timing and a normalized tempo map
    /// (sorted by tick, first entry at tick 0).
    pub fn new(timing: Timing, tempo_map: &[TempoEvent]) -> Result<Self, ExtractError> {
        match timing {
            Timing::Metrical(tpb) => {
                let ticks_per_beat = tpb.as_int();
                if ticks_per_beat == 0 {
                    return Err(ExtractError::InvalidTiming(
                        "header declares zero ticks per beat".into(),
                    ));
                }

                let mut segments: Vec<TempoSegment> = Vec::with_capacity(tempo_map.len());
                for te in tempo_map {
                    let seconds = match segments.last() {
                        Some(prev) => prev.seconds + span_seconds(
                            te.tick - prev.tick,
                            prev.microseconds_per_beat,
                            ticks_per_beat,
                        ),
                        None => 0.0,
                    };
                    segments.push(TempoSegment {
                        tick: te.tick,
                        seconds,
                        microseconds_per_beat: te.microseconds_per_beat,
                    });
                }

                Ok(TickClock::Metrical { ticks_per_beat, segments })
            }
            Timing::Timecode(fps, subframes) => {
                if subframes == 0 {
                    return Err(ExtractError::InvalidTiming(
                        "timecode header declares zero subframes".into(),
                    ));
                }
                let frames_per_sec = match fps {
                    midly::Fps::Fps24 => 24.0,
                    midly::Fps::Fps25 => 25.0,
                    midly::Fps::Fps29 => 29.97,
                    midly::Fps::Fps30 => 30.0,
                };
                Ok(TickClock::Timecode {
                    seconds_per_tick: 1.0 / (frames_per_sec * subframes as f64),
                })
            }
        }
    }

    /// Convert an absolute tick position to seconds from the file start.
    pub fn seconds(&self, tick: u64) -> f64 {
        match self {
            TickClock::Metrical { ticks_per_beat, segments } => {
                let idx = segments.partition_point(|s| s.tick <= tick);
                match idx.checked_sub(1).and_then(|i| segments.get(i)) {
                    Some(seg) => seg.seconds + span_seconds(
                        tick - seg.tick,
                        seg.microseconds_per_beat,
                        *ticks_per_beat,
                    ),
                    None => span_seconds(tick, DEFAULT_MICROS_PER_BEAT, *ticks_per_beat),
                }
            }
            TickClock::Timecode { seconds_per_tick } => tick as f64 * seconds_per_tick,
        }
    }
}

fn span_seconds(delta_ticks: u64, microseconds_per_beat: u32, ticks_per_beat: u16) -> f64 {
    delta_ticks as f64 * microseconds_per_beat as f64 / (1_000_000.0 * ticks_per_beat as f64)
}

/// Normalize raw tempo events into a tempo map.
///
/// The map always starts at tick 0 with the default tempo unless an explicit
/// event sits at tick 0 (the last one there wins). Later events that repeat
/// the tempo currently in effect are dropped.
pub fn normalize_tempo_map(mut raw: Vec<TempoEvent>) -> Vec<TempoEvent> {
    raw.sort_by_key(|t| t.tick);

    let mut map = vec![TempoEvent { tick: 0, microseconds_per_beat: DEFAULT_MICROS_PER_BEAT }];
    for te in raw {
        if te.tick == 0 {
            map[0] = te;
            continue;
        }
        let current = map.last().map(|t| t.microseconds_per_beat);
        if current != Some(te.microseconds_per_beat) {
            map.push(te);
        }
    }
    map
}

/// Reject SMF data whose chunks claim more bytes than the buffer holds.
/// Fewer than 8 trailing bytes cannot form a chunk and are ignored.
fn check_chunk_lengths(data: &[u8]) -> Result<(), ExtractError> {
    // RIFF-wrapped files are left to midly
    if !data.starts_with(b"MThd") {
        return Ok(());
    }

    let mut pos = 0usize;
    let mut index = 0usize;
    while data.len() - pos >= 8 {
        let id = String::from_utf8_lossy(&data[pos..pos + 4]);
        let declared = u32::from_be_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]]) as usize;
        let body = pos + 8;
        let remaining = data.len() - body;
        if declared > remaining {
            return Err(ExtractError::Truncated(format!(
                "chunk {} ({}) declares {} bytes but only {} remain",
                index, id, declared, remaining
            )));
        }
        pos = body + declared;
        index += 1;
    }
    Ok(())
}

/// Parse SMF bytes into notes and meta maps with all times in seconds.
pub fn parse_midi_bytes(data: &[u8]) -> Result<MidiParseResult, ExtractError> {
    check_chunk_lengths(data)?;
    let smf = Smf::parse(data)?;

    // First pass: tempo events from every track build the time base
    let mut raw_tempos: Vec<TempoEvent> = Vec::new();
    for track in &smf.tracks {
        let mut current_tick: u64 = 0;
        for event in track {
            current_tick += event.delta.as_int() as u64;
            if let TrackEventKind::Meta(MetaMessage::Tempo(t)) = event.kind {
                let microseconds_per_beat = t.as_int();
                if microseconds_per_beat == 0 {
                    return Err(ExtractError::InvalidTiming(format!(
                        "tempo of zero microseconds per beat at tick {}",
                        current_tick
                    )));
                }
                raw_tempos.push(TempoEvent { tick: current_tick, microseconds_per_beat });
            }
        }
    }

    let tempo_map = normalize_tempo_map(raw_tempos);
    let clock = TickClock::new(smf.header.timing, &tempo_map)?;

    let tempos = tempo_map
        .iter()
        .map(|te| TempoPoint {
            offset: clock.seconds(te.tick),
            bpm: 60_000_000.0 / te.microseconds_per_beat as f64,
        })
        .collect();

    // Second pass: notes and the remaining meta events
    let mut notes: Vec<NoteEvent> = Vec::new();
    let mut meters: Vec<(u64, TimeSignaturePoint)> = Vec::new();
    let mut keys: Vec<(u64, KeySignature)> = Vec::new();

    for (track_idx, track) in smf.tracks.iter().enumerate() {
        let mut current_tick: u64 = 0;
        // Open notes: (channel, pitch) -> start ticks, oldest first
        let mut open_notes: HashMap<(u8, u8), Vec<u64>> = HashMap::new();
        let mut programs = [0u8; 16];
        let mut instruments = Instruments::default();

        for event in track {
            current_tick += event.delta.as_int() as u64;

            match event.kind {
                TrackEventKind::Midi { channel, message } => {
                    let ch = channel.as_int();
                    match message {
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            open_notes.entry((ch, key.as_int())).or_default().push(current_tick);
                        }
                        // Note off, or note on with velocity 0
                        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                            let closed = close_notes(
                                &mut open_notes,
                                &clock,
                                ch,
                                key.as_int(),
                                current_tick,
                                track_idx,
                            );
                            if !closed.is_empty() {
                                instruments.push((ch, programs[ch as usize]), closed);
                            }
                        }
                        MidiMessage::ProgramChange { program } => {
                            programs[ch as usize] = program.as_int();
                        }
                        _ => {}
                    }
                }
                TrackEventKind::Meta(MetaMessage::TimeSignature(numerator, denom_pow, _, _)) => {
                    if numerator == 0 {
                        return Err(ExtractError::InvalidTimeSignature(format!(
                            "numerator 0 at tick {}",
                            current_tick
                        )));
                    }
                    let denominator = 1u32.checked_shl(denom_pow as u32).ok_or_else(|| {
                        ExtractError::InvalidTimeSignature(format!(
                            "denominator 2^{} at tick {}",
                            denom_pow, current_tick
                        ))
                    })?;
                    meters.push((
                        current_tick,
                        TimeSignaturePoint {
                            offset: clock.seconds(current_tick),
                            numerator: numerator as u32,
                            denominator,
                        },
                    ));
                }
                TrackEventKind::Meta(MetaMessage::KeySignature(sharps, minor)) => {
                    keys.push((current_tick, KeySignature::from_midi(sharps, minor)?));
                }
                _ => {}
            }
        }

        if !open_notes.is_empty() {
            let unterminated: usize = open_notes.values().map(Vec::len).sum();
            log::debug!(
                "Track {}: dropping {} note(s) without a note-off",
                track_idx, unterminated
            );
        }
        notes.extend(instruments.into_notes());
    }

    // Stable sorts keep track order for events on the same tick
    meters.sort_by_key(|(tick, _)| *tick);
    keys.sort_by_key(|(tick, _)| *tick);

    Ok(MidiParseResult {
        notes,
        tempos,
        time_signatures: meters.into_iter().map(|(_, ts)| ts).collect(),
        key_signature: keys.into_iter().next().map(|(_, key)| key),
    })
}

/// Closed notes of one track, bucketed by (channel, program) in order of
/// each bucket's first note.
#[derive(Default)]
struct Instruments {
    order: Vec<(u8, u8)>,
    notes: HashMap<(u8, u8), Vec<NoteEvent>>,
}

impl Instruments {
    fn push(&mut self, key: (u8, u8), closed: Vec<NoteEvent>) {
        if !self.notes.contains_key(&key) {
            self.order.push(key);
        }
        self.notes.entry(key).or_default().extend(closed);
    }

    fn into_notes(mut self) -> Vec<NoteEvent> {
        let mut out = Vec::new();
        for key in &self.order {
            if let Some(bucket) = self.notes.remove(key) {
                out.extend(bucket);
            }
        }
        out
    }
}

/// Close every open note of (channel, pitch) that started before `current_tick`.
///
/// Notes that started on this same tick stay open only if an earlier note was
/// closed alongside them. Otherwise the note-off cancels them and they are
/// dropped.
fn close_notes(
    open_notes: &mut HashMap<(u8, u8), Vec<u64>>,
    clock: &TickClock,
    channel: u8,
    pitch: u8,
    current_tick: u64,
    track: usize,
) -> Vec<NoteEvent> {
    let Some(starts) = open_notes.remove(&(channel, pitch)) else {
        return Vec::new();
    };

    let (to_close, to_keep): (Vec<u64>, Vec<u64>) =
        starts.into_iter().partition(|&start| start != current_tick);

    if !to_close.is_empty() && !to_keep.is_empty() {
        open_notes.insert((channel, pitch), to_keep);
    }

    let end = clock.seconds(current_tick);
    to_close
        .into_iter()
        .map(|start| NoteEvent {
            pitch,
            onset: clock.seconds(start),
            end,
            track,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrical(tpb: u16, map: &[TempoEvent]) -> TickClock {
        TickClock::new(Timing::Metrical(midly::num::u15::new(tpb)), map).unwrap()
    }

    #[test]
    fn test_default_tempo_map() {
        let map = normalize_tempo_map(Vec::new());
        assert_eq!(map, vec![TempoEvent { tick: 0, microseconds_per_beat: 500_000 }]);
    }

    #[test]
    fn test_tick_zero_tempo_replaces_default() {
        let map = normalize_tempo_map(vec![
            TempoEvent { tick: 0, microseconds_per_beat: 400_000 },
            TempoEvent { tick: 960, microseconds_per_beat: 400_000 },
            TempoEvent { tick: 1920, microseconds_per_beat: 600_000 },
        ]);
        assert_eq!(map.len(), 2);
        assert_eq!(map[0].microseconds_per_beat, 400_000);
        assert_eq!(map[1].tick, 1920);
    }

    #[test]
    fn test_late_tempo_keeps_implicit_default() {
        let map = normalize_tempo_map(vec![TempoEvent { tick: 480, microseconds_per_beat: 1_000_000 }]);
        assert_eq!(map.len(), 2);
        assert_eq!(map[0], TempoEvent { tick: 0, microseconds_per_beat: DEFAULT_MICROS_PER_BEAT });
    }

    #[test]
    fn test_seconds_across_tempo_change() {
        // 120 BPM for one beat, then 60 BPM
        let map = normalize_tempo_map(vec![TempoEvent { tick: 480, microseconds_per_beat: 1_000_000 }]);
        let clock = metrical(480, &map);
        assert_eq!(clock.seconds(0), 0.0);
        assert_eq!(clock.seconds(480), 0.5);
        assert_eq!(clock.seconds(960), 1.5);
    }

    #[test]
    fn test_zero_resolution_rejected() {
        let map = normalize_tempo_map(Vec::new());
        let result = TickClock::new(Timing::Metrical(midly::num::u15::new(0)), &map);
        assert!(matches!(result, Err(ExtractError::InvalidTiming(_))));
    }

    #[test]
    fn test_chunk_lengths_must_fit_buffer() {
        let mut data = b"MThd\0\0\0\x06\0\0\0\x01\x01\xe0MTrk\0\0\0\x04\0\xff\x2f\0".to_vec();
        assert!(check_chunk_lengths(&data).is_ok());

        data.pop();
        assert!(matches!(check_chunk_lengths(&data), Err(ExtractError::Truncated(_))));
        assert!(parse_midi_bytes(&data).is_err());
    }

    #[test]
    fn test_same_tick_note_off_cancels_note() {
        let clock = metrical(480, &normalize_tempo_map(Vec::new()));
        let mut open = HashMap::new();
        open.insert((0, 60), vec![0]);

        assert!(close_notes(&mut open, &clock, 0, 60, 0, 0).is_empty());
        assert!(open.is_empty());
    }

    #[test]
    fn test_same_tick_note_kept_when_older_note_closes() {
        let clock = metrical(480, &normalize_tempo_map(Vec::new()));
        let mut open = HashMap::new();
        open.insert((0, 60), vec![0, 480]);

        let closed = close_notes(&mut open, &clock, 0, 60, 480, 0);
        assert_eq!(closed.len(), 1);
        assert_eq!((closed[0].onset, closed[0].end), (0.0, 0.5));
        assert_eq!(open.get(&(0, 60)), Some(&vec![480]));
    }

    #[test]
    fn test_timecode_clock_ignores_tempo() {
        let map = normalize_tempo_map(vec![TempoEvent { tick: 10, microseconds_per_beat: 250_000 }]);
        let clock = TickClock::new(Timing::Timecode(midly::Fps::Fps25, 40), &map).unwrap();
        assert!((clock.seconds(1000) - 1.0).abs() < 1e-12);
    }
}

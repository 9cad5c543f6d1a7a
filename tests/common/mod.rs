// MIDI fixture writer shared by the integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

pub const TICKS_PER_BEAT: u16 = 480;

/// Fixture event, placed `delta` ticks after the previous one.
#[derive(Debug, Clone, Copy)]
pub enum Ev {
    On(u8),
    Off(u8),
    /// Note off sent as note on with velocity 0
    OnZero(u8),
    Tempo(u32),
    /// Numerator, power-of-two denominator exponent
    TimeSig(u8, u8),
    Key(i8, bool),
    /// Channel, key
    ChOn(u8, u8),
    ChOff(u8, u8),
    /// Channel, program
    Program(u8, u8),
}

pub fn track(events: &[(u32, Ev)]) -> Vec<TrackEvent<'static>> {
    let mut out: Vec<TrackEvent<'static>> = events
        .iter()
        .map(|&(delta, ev)| TrackEvent {
            delta: u28::new(delta),
            kind: match ev {
                Ev::On(key) => note(0, key, 100),
                Ev::OnZero(key) => note(0, key, 0),
                Ev::Off(key) => note_off(0, key),
                Ev::ChOn(ch, key) => note(ch, key, 100),
                Ev::ChOff(ch, key) => note_off(ch, key),
                Ev::Program(ch, program) => TrackEventKind::Midi {
                    channel: u4::new(ch),
                    message: MidiMessage::ProgramChange { program: u7::new(program) },
                },
                Ev::Tempo(us) => TrackEventKind::Meta(MetaMessage::Tempo(u24::new(us))),
                Ev::TimeSig(num, den_pow) => {
                    TrackEventKind::Meta(MetaMessage::TimeSignature(num, den_pow, 24, 8))
                }
                Ev::Key(sharps, minor) => TrackEventKind::Meta(MetaMessage::KeySignature(sharps, minor)),
            },
        })
        .collect();
    out.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    out
}

fn note(channel: u8, key: u8, vel: u8) -> TrackEventKind<'static> {
    TrackEventKind::Midi {
        channel: u4::new(channel),
        message: MidiMessage::NoteOn { key: u7::new(key), vel: u7::new(vel) },
    }
}

fn note_off(channel: u8, key: u8) -> TrackEventKind<'static> {
    TrackEventKind::Midi {
        channel: u4::new(channel),
        message: MidiMessage::NoteOff { key: u7::new(key), vel: u7::new(0) },
    }
}

/// Encode a multi-track SMF with the given header timing.
pub fn midi_bytes(timing: Timing, tracks: Vec<Vec<TrackEvent<'static>>>) -> Vec<u8> {
    let format = if tracks.len() == 1 { Format::SingleTrack } else { Format::Parallel };
    let smf = Smf {
        header: Header { format, timing },
        tracks,
    };

    let mut bytes = Vec::new();
    smf.write(&mut bytes).unwrap();
    bytes
}

pub fn write_midi_with_timing(path: &Path, timing: Timing, tracks: Vec<Vec<TrackEvent<'static>>>) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, midi_bytes(timing, tracks)).unwrap();
}

/// Write a multi-track SMF with the given resolution.
pub fn write_midi_with_resolution(path: &Path, ticks_per_beat: u16, tracks: Vec<Vec<TrackEvent<'static>>>) {
    write_midi_with_timing(path, Timing::Metrical(u15::new(ticks_per_beat)), tracks);
}

pub fn write_midi(path: &Path, tracks: Vec<Vec<TrackEvent<'static>>>) {
    write_midi_with_resolution(path, TICKS_PER_BEAT, tracks);
}

/// One C4 quarter-note pair at 120 BPM in 4/4: the smallest useful corpus file.
pub fn write_single_note(path: &Path) {
    write_midi(
        path,
        vec![track(&[
            (0, Ev::Tempo(500_000)),
            (0, Ev::TimeSig(4, 2)),
            (0, Ev::On(60)),
            (960, Ev::Off(60)),
        ])],
    );
}

/// Build `base/<composer>/<work>.mid` for each entry, with `notes` ascending
/// pitches so files are distinguishable.
pub fn write_corpus(base: &Path, entries: &[(&str, &str, u8)]) -> Vec<PathBuf> {
    entries
        .iter()
        .map(|&(composer, work, notes)| {
            let path = base.join(composer).join(format!("{}.mid", work));
            let mut events = vec![(0, Ev::Tempo(500_000)), (0, Ev::TimeSig(3, 2))];
            for i in 0..notes {
                events.push((0, Ev::On(48 + i)));
                events.push((240, Ev::Off(48 + i)));
            }
            write_midi(&path, vec![track(&events)]);
            path
        })
        .collect()
}

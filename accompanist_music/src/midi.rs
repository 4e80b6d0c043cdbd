// MIDI input and output for compositions.
//
// Reading turns a Standard MIDI File into a melody `Composition`:
// - Only metrical timing (ticks per beat) is accepted.
// - The tempo is the first Set Tempo meta event in any track, or 500000
//   microseconds per beat (120 bpm) when the file has none.
// - Delta times accumulate to absolute ticks per track. Note-ons queue per
//   pitch and note-offs (or note-ons with velocity 0) close the oldest open
//   note of that pitch, so overlapping same-pitch notes pair in order.
// - Meta, program change and controller events carry no melody and are
//   skipped. Any other event fails the read rather than being dropped.
//
// Writing produces SMF format 1: track 0 holds the tempo, track 1 the notes
// on channel 0 (velocity 50 on, 0 off). At equal ticks note-offs come before
// note-ons. A `min_duration` past the last note end delays the end-of-track
// event, so silent tails survive a round trip.
//
// Uses the `midly` crate for both directions.

use crate::composition::Composition;
use crate::error::MidiError;
use crate::note::PlacedNote;
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;

/// Microseconds per beat assumed when a file sets no tempo.
pub const DEFAULT_TEMPO: u32 = 500_000;

const NOTE_ON_VELOCITY: u8 = 50;

/// Decode a melody from SMF bytes.
pub fn read_melody(bytes: &[u8]) -> Result<Composition, MidiError> {
    let smf = Smf::parse(bytes)?;
    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(tpb) => tpb.as_int(),
        Timing::Timecode(..) => return Err(MidiError::UnsupportedTiming),
    };

    let mut tempo: Option<u32> = None;
    let mut notes = Vec::new();
    for track in &smf.tracks {
        let mut tick: u32 = 0;
        let mut open: BTreeMap<u8, VecDeque<u32>> = BTreeMap::new();
        for event in track {
            tick = tick
                .checked_add(event.delta.as_int())
                .ok_or(MidiError::OutOfRange {
                    what: "tick count past",
                    value: tick,
                })?;
            match &event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(t)) => {
                    tempo.get_or_insert(t.as_int());
                }
                TrackEventKind::Meta(_) => {}
                TrackEventKind::Midi { message, .. } => match message {
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        open.entry(key.as_int()).or_default().push_back(tick);
                    }
                    MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                        let pitch = key.as_int();
                        let start = open
                            .get_mut(&pitch)
                            .and_then(VecDeque::pop_front)
                            .ok_or(MidiError::UnmatchedNoteOff { pitch, tick })?;
                        if let Some(note) = PlacedNote::new(pitch, start, tick - start) {
                            notes.push(note);
                        }
                    }
                    MidiMessage::ProgramChange { .. } | MidiMessage::Controller { .. } => {}
                    other => {
                        return Err(MidiError::UnsupportedEvent {
                            kind: format!("{other:?}"),
                            tick,
                        });
                    }
                },
                TrackEventKind::SysEx(_) => {
                    return Err(MidiError::UnsupportedEvent {
                        kind: "SysEx".to_string(),
                        tick,
                    });
                }
                TrackEventKind::Escape(_) => {
                    return Err(MidiError::UnsupportedEvent {
                        kind: "Escape".to_string(),
                        tick,
                    });
                }
            }
        }
        if let Some((&pitch, starts)) = open.iter().find(|(_, starts)| !starts.is_empty()) {
            return Err(MidiError::UnterminatedNote {
                pitch,
                tick: starts[0],
            });
        }
    }

    notes.sort_by_key(|n| n.start_time);
    Ok(Composition::new(
        notes,
        ticks_per_beat,
        tempo.unwrap_or(DEFAULT_TEMPO),
    )?)
}

/// Read and decode a melody file.
pub fn load_melody(path: &Path) -> Result<Composition, MidiError> {
    let bytes = std::fs::read(path)?;
    read_melody(&bytes)
}

fn delta(ticks: u32) -> Result<u28, MidiError> {
    u28::try_from(ticks).ok_or(MidiError::OutOfRange {
        what: "delta time",
        value: ticks,
    })
}

/// Convert a composition to an in-memory SMF.
fn composition_to_smf(composition: &Composition) -> Result<Smf<'static>, MidiError> {
    let tpb = composition.ticks_per_beat();
    let timing = u15::try_from(tpb).ok_or(MidiError::OutOfRange {
        what: "ticks per beat",
        value: tpb as u32,
    })?;
    let tempo = u24::try_from(composition.tempo()).ok_or(MidiError::OutOfRange {
        what: "tempo",
        value: composition.tempo(),
    })?;
    let mut smf = Smf::new(Header::new(Format::Parallel, Timing::Metrical(timing)));

    // Track 0: tempo track
    let tempo_track: Track<'static> = vec![
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(tempo)),
        },
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        },
    ];
    smf.tracks.push(tempo_track);

    // (tick, 0 = off / 1 = on, pitch); the stable sort keeps note order within a tick.
    let mut events: Vec<(u32, u8, u8)> = Vec::with_capacity(composition.notes().len() * 2);
    for note in composition.notes() {
        events.push((note.start_time, 1, note.pitch()));
        events.push((note.end_time(), 0, note.pitch()));
    }
    events.sort_by_key(|&(tick, kind, _)| (tick, kind));

    let channel = u4::new(0);
    let mut track: Track<'static> = Vec::with_capacity(events.len() + 1);
    let mut last_tick = 0;
    for (tick, kind, pitch) in events {
        let key = u7::try_from(pitch).ok_or(MidiError::OutOfRange {
            what: "pitch",
            value: pitch as u32,
        })?;
        let message = if kind == 1 {
            MidiMessage::NoteOn {
                key,
                vel: u7::new(NOTE_ON_VELOCITY),
            }
        } else {
            MidiMessage::NoteOff {
                key,
                vel: u7::new(0),
            }
        };
        track.push(TrackEvent {
            delta: delta(tick - last_tick)?,
            kind: TrackEventKind::Midi { channel, message },
        });
        last_tick = tick;
    }
    let end = composition.min_duration().unwrap_or(0).max(last_tick);
    track.push(TrackEvent {
        delta: delta(end - last_tick)?,
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    smf.tracks.push(track);

    Ok(smf)
}

/// Encode a composition as SMF bytes.
pub fn write_smf(composition: &Composition) -> Result<Vec<u8>, MidiError> {
    let smf = composition_to_smf(composition)?;
    let mut buf = Vec::new();
    smf.write_std(&mut buf)?;
    Ok(buf)
}

/// Encode a composition and write it to a file.
pub fn save_midi(composition: &Composition, path: &Path) -> Result<(), MidiError> {
    let buf = write_smf(composition)?;
    std::fs::write(path, &buf)?;
    Ok(())
}

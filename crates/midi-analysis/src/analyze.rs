use crate::note::TimedNote;
use crate::sequence::{
    KeySignature, NoteSequence, SequenceNote, Tempo, TimeSignature, DEFAULT_QPM,
    DEFAULT_TICKS_PER_QUARTER,
};
use crate::tempo_map::TempoMap;
use crate::{Error, Result};
use midly::{MetaMessage, MidiMessage, Smf, TrackEventKind};
use std::collections::HashMap;
use std::path::Path;

/// Timing and metadata gathered while walking a file, all in ticks.
#[derive(Debug, Clone, Default)]
pub struct MidiFileContext {
    pub ppq: u16,
    pub track_count: usize,
    /// `(tick, microseconds_per_beat)`
    pub tempo_changes: Vec<(u64, u32)>,
    /// `(tick, numerator, denominator)`
    pub time_signatures: Vec<(u64, u8, u8)>,
    /// `(tick, accidentals, minor)`
    pub key_signatures: Vec<(u64, i8, bool)>,
    pub total_ticks: u64,
}

/// Extract all notes from a parsed file, pairing note-on/note-off events.
pub fn extract_notes(smf: &Smf) -> (Vec<TimedNote>, MidiFileContext) {
    let ppq = match smf.header.timing {
        midly::Timing::Metrical(ticks) => ticks.as_int(),
        midly::Timing::Timecode(_, _) => 480,
    };

    let mut all_notes = Vec::new();
    let mut context = MidiFileContext {
        ppq,
        track_count: smf.tracks.len(),
        ..Default::default()
    };

    for (track_index, track) in smf.tracks.iter().enumerate() {
        let mut current_tick: u64 = 0;
        let mut programs = [0u8; 16];
        // Map (channel, pitch) → Vec<(onset_tick, velocity, program)> for stacking
        let mut pending: HashMap<(u8, u8), Vec<(u64, u8, u8)>> = HashMap::new();

        for event in track {
            current_tick += event.delta.as_int() as u64;

            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                    context.tempo_changes.push((current_tick, tempo.as_int()));
                }
                TrackEventKind::Meta(MetaMessage::TimeSignature(num, denom_pow, _, _)) => {
                    context
                        .time_signatures
                        .push((current_tick, num, 1u8.checked_shl(denom_pow as u32).unwrap_or(4)));
                }
                TrackEventKind::Meta(MetaMessage::KeySignature(accidentals, minor)) => {
                    context.key_signatures.push((current_tick, accidentals, minor));
                }
                TrackEventKind::Midi { channel, message } => {
                    let ch = channel.as_int();
                    match message {
                        MidiMessage::ProgramChange { program } => {
                            programs[ch as usize] = program.as_int();
                        }
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            pending
                                .entry((ch, key.as_int()))
                                .or_default()
                                .push((current_tick, vel.as_int(), programs[ch as usize]));
                        }
                        MidiMessage::NoteOff { key, .. } | MidiMessage::NoteOn { key, .. } => {
                            // vel=0 NoteOn is NoteOff
                            let key = (ch, key.as_int());
                            if let Some(stack) = pending.get_mut(&key) {
                                if let Some((onset, velocity, program)) = stack.pop() {
                                    all_notes.push(TimedNote {
                                        onset_tick: onset,
                                        offset_tick: current_tick,
                                        pitch: key.1,
                                        velocity,
                                        channel: ch,
                                        program,
                                        track_index,
                                    });
                                }
                            }
                        }
                        _ => {}
                    }
                }
                _ => {}
            }

            context.total_ticks = context.total_ticks.max(current_tick);
        }

        // Close any unclosed notes at the track's final tick
        for (&(ch, pitch), stack) in &pending {
            for &(onset, velocity, program) in stack {
                all_notes.push(TimedNote {
                    onset_tick: onset,
                    offset_tick: current_tick,
                    pitch,
                    velocity,
                    channel: ch,
                    program,
                    track_index,
                });
            }
        }
    }

    // Sort by onset, then pitch for determinism
    all_notes.sort_by(|a, b| a.onset_tick.cmp(&b.onset_tick).then(a.pitch.cmp(&b.pitch)));

    // Deduplicate tempo changes (multiple tracks may repeat them in format 1)
    context.tempo_changes.sort_by_key(|(tick, _)| *tick);
    context.tempo_changes.dedup();

    context.time_signatures.sort_by_key(|(tick, _, _)| *tick);
    context.time_signatures.dedup_by(|a, b| a.0 == b.0);

    context.key_signatures.sort_by_key(|(tick, _, _)| *tick);
    context.key_signatures.dedup_by(|a, b| a.0 == b.0);

    (all_notes, context)
}

/// Converts file ticks to seconds.
enum Clock {
    Metrical(TempoMap),
    /// SMPTE timing runs at a fixed tick rate; tempo events do not move it.
    Timecode { ticks_per_second: f64 },
}

impl Clock {
    fn new(timing: midly::Timing, context: &MidiFileContext) -> Result<Self> {
        match timing {
            midly::Timing::Metrical(_) => Ok(Clock::Metrical(TempoMap::from_tick_changes(
                context.ppq,
                &context.tempo_changes,
            ))),
            midly::Timing::Timecode(fps, subframes) => {
                let ticks_per_second = fps.as_f32() as f64 * subframes as f64;
                if ticks_per_second <= 0.0 {
                    return Err(Error::MidiParse(format!(
                        "timecode with {subframes} ticks per frame"
                    )));
                }
                Ok(Clock::Timecode { ticks_per_second })
            }
        }
    }

    fn seconds(&self, tick: u64) -> f64 {
        match self {
            Clock::Metrical(map) => map.tick_to_seconds(tick),
            Clock::Timecode { ticks_per_second } => tick as f64 / ticks_per_second,
        }
    }

    fn tempos(&self, context: &MidiFileContext) -> Vec<Tempo> {
        let changes = match self {
            Clock::Metrical(map) => map.changes(),
            Clock::Timecode { .. } if context.tempo_changes.is_empty() => {
                vec![(0, (60_000_000.0 / DEFAULT_QPM) as u32)]
            }
            Clock::Timecode { .. } => context.tempo_changes.clone(),
        };
        changes
            .into_iter()
            .map(|(tick, usec)| Tempo {
                time: self.seconds(tick),
                qpm: 60_000_000.0 / usec as f64,
            })
            .collect()
    }
}

/// Parse Standard MIDI File bytes into a seconds-based [`NoteSequence`].
///
/// Files without a tempo event get a single 120 qpm tempo at time zero.
/// SMPTE-timed files convert ticks at frames-per-second times ticks-per-frame.
pub fn parse_sequence(midi_bytes: &[u8]) -> Result<NoteSequence> {
    let smf = Smf::parse(midi_bytes).map_err(|e| Error::MidiParse(e.to_string()))?;
    let (notes, context) = extract_notes(&smf);
    let clock = Clock::new(smf.header.timing, &context)?;

    let tempos = clock.tempos(&context);

    let key_signatures = context
        .key_signatures
        .iter()
        .map(|&(tick, accidentals, minor)| {
            KeySignature::from_accidentals(clock.seconds(tick), accidentals, minor)
        })
        .collect();

    let time_signatures = context
        .time_signatures
        .iter()
        .map(|&(tick, numerator, denominator)| TimeSignature {
            time: clock.seconds(tick),
            numerator,
            denominator,
        })
        .collect();

    let notes = notes
        .iter()
        .map(|n| SequenceNote {
            pitch: n.pitch,
            velocity: n.velocity,
            start_time: clock.seconds(n.onset_tick),
            end_time: clock.seconds(n.offset_tick),
            program: n.program,
            instrument: n.track_index.min(u8::MAX as usize) as u8,
            is_drum: n.channel == 9,
        })
        .collect();

    let ticks_per_quarter = match clock {
        Clock::Metrical(_) => context.ppq,
        Clock::Timecode { .. } => DEFAULT_TICKS_PER_QUARTER,
    };

    Ok(NoteSequence {
        ticks_per_quarter,
        notes,
        tempos,
        key_signatures,
        time_signatures,
    })
}

/// Read and parse a MIDI file from disk.
pub fn read_sequence(path: &Path) -> Result<NoteSequence> {
    let bytes = std::fs::read(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_sequence(&bytes)
}

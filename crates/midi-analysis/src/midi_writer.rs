use crate::sequence::NoteSequence;
use crate::tempo_map::TempoMap;
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// Write a note sequence to Standard MIDI File format 1 bytes.
///
/// Track 0: tempo map, time signatures and key signatures.
/// Tracks 1+: one per instrument, with track name, program change, note events.
/// Seconds convert to ticks through the sequence's own tempo list.
pub fn sequence_to_midi(sequence: &NoteSequence) -> Result<Vec<u8>> {
    let tempo_map = TempoMap::from_sequence(sequence)?;
    let mut tracks: Vec<Vec<u8>> = vec![build_meta_track(sequence, &tempo_map)?];

    let mut parts: BTreeMap<u8, Vec<usize>> = BTreeMap::new();
    for (idx, note) in sequence.notes.iter().enumerate() {
        parts.entry(note.instrument).or_default().push(idx);
    }

    // Assign channels (skip 9 for drums)
    let mut channel_alloc = 0u8;

    for (instrument, note_indices) in &parts {
        let is_drum = note_indices.iter().any(|&i| sequence.notes[i].is_drum);
        let channel = if is_drum {
            9
        } else {
            let ch = channel_alloc;
            channel_alloc += 1;
            if channel_alloc == 9 {
                channel_alloc = 10; // skip percussion channel
            }
            // Cap at 15 (MIDI has 16 channels)
            ch.min(15)
        };

        tracks.push(build_part_track(sequence, &tempo_map, *instrument, note_indices, channel)?);
    }

    Ok(build_midi_file(tempo_map.ppq(), &tracks))
}

/// Serialize a sequence and write it to `path`.
pub fn write_sequence(sequence: &NoteSequence, path: &Path) -> Result<()> {
    let bytes = sequence_to_midi(sequence)?;
    std::fs::write(path, bytes).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Build the tempo/time-signature/key-signature track.
fn build_meta_track(sequence: &NoteSequence, tempo_map: &TempoMap) -> Result<Vec<u8>> {
    let mut events: Vec<(u64, Vec<u8>)> = Vec::new();

    for (tick, usec) in tempo_map.changes() {
        events.push((
            tick,
            vec![
                0xFF,
                0x51,
                0x03,
                (usec >> 16) as u8,
                (usec >> 8) as u8,
                usec as u8,
            ],
        ));
    }

    for ts in &sequence.time_signatures {
        let denom_pow = (ts.denominator.max(1) as f64).log2() as u8;
        events.push((
            tempo_map.seconds_to_tick(ts.time),
            vec![0xFF, 0x58, 0x04, ts.numerator, denom_pow, 0x18, 0x08],
        ));
    }

    for ks in &sequence.key_signatures {
        let minor = matches!(ks.mode, crate::sequence::KeyMode::Minor) as u8;
        events.push((
            tempo_map.seconds_to_tick(ks.time),
            vec![0xFF, 0x59, 0x02, ks.accidentals() as u8, minor],
        ));
    }

    events.sort_by_key(|(tick, _)| *tick);
    finish_track(events)
}

/// Build a track for one instrument.
fn build_part_track(
    sequence: &NoteSequence,
    tempo_map: &TempoMap,
    instrument: u8,
    note_indices: &[usize],
    channel: u8,
) -> Result<Vec<u8>> {
    let mut events: Vec<(u64, Vec<u8>)> = Vec::new();

    let name = format!("Instrument {}", instrument);
    let name_bytes = name.as_bytes();
    let mut name_event = vec![0xFF, 0x03];
    write_vlq(&mut name_event, name_bytes.len() as u32);
    name_event.extend_from_slice(name_bytes);
    events.push((0, name_event));

    let program = note_indices
        .first()
        .map(|&i| sequence.notes[i].program)
        .unwrap_or(0);
    events.push((0, vec![0xC0 | (channel & 0x0F), program & 0x7F]));

    for &i in note_indices {
        let note = &sequence.notes[i];
        let onset = tempo_map.seconds_to_tick(note.start_time);
        let offset = tempo_map.seconds_to_tick(note.end_time).max(onset);
        events.push((
            onset,
            vec![0x90 | (channel & 0x0F), note.pitch & 0x7F, note.velocity.clamp(1, 127)],
        ));
        events.push((offset, vec![0x80 | (channel & 0x0F), note.pitch & 0x7F, 0]));
    }

    // Sort by tick, with note-offs before note-ons at the same tick
    events.sort_by(|a, b| {
        a.0.cmp(&b.0).then_with(|| {
            let a_is_off = a.1.first().is_some_and(|b| b & 0xF0 == 0x80);
            let b_is_off = b.1.first().is_some_and(|b| b & 0xF0 == 0x80);
            b_is_off.cmp(&a_is_off) // note-offs first
        })
    });

    finish_track(events)
}

/// Largest delta time a variable-length quantity can carry (28 bits).
const MAX_DELTA_TICKS: u64 = 0x0FFF_FFFF;

/// Delta-encode sorted events and terminate the track.
fn finish_track(events: Vec<(u64, Vec<u8>)>) -> Result<Vec<u8>> {
    let mut track_data = Vec::new();
    let mut last_tick = 0u64;

    for (tick, data) in events {
        let delta = tick.saturating_sub(last_tick);
        if delta > MAX_DELTA_TICKS {
            return Err(Error::DeltaOverflow(delta));
        }
        write_vlq(&mut track_data, delta as u32);
        track_data.extend_from_slice(&data);
        last_tick = tick;
    }

    // End of track
    write_vlq(&mut track_data, 0);
    track_data.extend_from_slice(&[0xFF, 0x2F, 0x00]);

    Ok(track_data)
}

/// Assemble a complete MIDI file from track data blobs.
fn build_midi_file(ppq: u16, tracks: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = Vec::new();

    // MThd header
    buf.extend_from_slice(b"MThd");
    buf.extend_from_slice(&6u32.to_be_bytes());
    buf.extend_from_slice(&1u16.to_be_bytes()); // format 1
    buf.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    buf.extend_from_slice(&ppq.to_be_bytes());

    // MTrk chunks
    for track_data in tracks {
        buf.extend_from_slice(b"MTrk");
        buf.extend_from_slice(&(track_data.len() as u32).to_be_bytes());
        buf.extend_from_slice(track_data);
    }

    buf
}

/// Write a variable-length quantity to a byte buffer.
fn write_vlq(buf: &mut Vec<u8>, mut value: u32) {
    if value == 0 {
        buf.push(0);
        return;
    }

    let mut bytes = Vec::new();
    bytes.push((value & 0x7F) as u8);
    value >>= 7;

    while value > 0 {
        bytes.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }

    bytes.reverse();
    buf.extend_from_slice(&bytes);
}

use crate::sequence::{NoteSequence, DEFAULT_QPM};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Segment {
    tick: u64,
    seconds: f64,
    microseconds_per_beat: u32,
}

impl Segment {
    fn seconds_per_tick(&self, ppq: u16) -> f64 {
        self.microseconds_per_beat as f64 / 1_000_000.0 / ppq as f64
    }
}

/// Piecewise-constant tempo map converting between ticks and seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoMap {
    ppq: u16,
    segments: Vec<Segment>,
}

/// Microseconds per quarter note for a tempo in quarter notes per minute.
pub fn qpm_to_microseconds(qpm: f64) -> Result<u32> {
    if !qpm.is_finite() || qpm <= 0.0 {
        return Err(Error::InvalidTempo(qpm));
    }
    let usec = (60_000_000.0 / qpm).round();
    // Tempo meta events carry 24 bits
    if usec < 1.0 || usec > 0xFF_FFFF as f64 {
        return Err(Error::InvalidTempo(qpm));
    }
    Ok(usec as u32)
}

impl TempoMap {
    /// Build from `(tick, microseconds_per_beat)` changes read out of a file.
    pub fn from_tick_changes(ppq: u16, changes: &[(u64, u32)]) -> Self {
        let mut sorted: Vec<(u64, u32)> = changes.to_vec();
        sorted.sort_by_key(|(tick, _)| *tick);

        let default_usec = (60_000_000.0 / DEFAULT_QPM) as u32;
        let mut segments = vec![Segment {
            tick: 0,
            seconds: 0.0,
            microseconds_per_beat: default_usec,
        }];

        for (tick, usec) in sorted {
            let last = segments[segments.len() - 1];
            let seconds = last.seconds + (tick - last.tick) as f64 * last.seconds_per_tick(ppq);
            if tick == last.tick {
                // A change at the same tick replaces the previous tempo
                let idx = segments.len() - 1;
                segments[idx].microseconds_per_beat = usec;
            } else {
                segments.push(Segment {
                    tick,
                    seconds,
                    microseconds_per_beat: usec,
                });
            }
        }

        Self { ppq, segments }
    }

    /// Build from a sequence's tempo list (times in seconds).
    pub fn from_sequence(sequence: &NoteSequence) -> Result<Self> {
        let ppq = sequence.ticks_per_quarter;
        let mut tempos = sequence.tempos.clone();
        tempos.sort_by(|a, b| a.time.total_cmp(&b.time));

        let mut map = Self {
            ppq,
            segments: vec![Segment {
                tick: 0,
                seconds: 0.0,
                microseconds_per_beat: qpm_to_microseconds(DEFAULT_QPM)?,
            }],
        };

        for tempo in &tempos {
            let usec = qpm_to_microseconds(tempo.qpm)?;
            let time = tempo.time.max(0.0);
            let tick = map.seconds_to_tick(time);
            let last_idx = map.segments.len() - 1;
            if tick == map.segments[last_idx].tick {
                map.segments[last_idx].microseconds_per_beat = usec;
            } else {
                let seconds = map.tick_to_seconds(tick);
                map.segments.push(Segment {
                    tick,
                    seconds,
                    microseconds_per_beat: usec,
                });
            }
        }

        Ok(map)
    }

    pub fn ppq(&self) -> u16 {
        self.ppq
    }

    /// `(tick, microseconds_per_beat)` for every tempo segment.
    pub fn changes(&self) -> Vec<(u64, u32)> {
        self.segments
            .iter()
            .map(|s| (s.tick, s.microseconds_per_beat))
            .collect()
    }

    pub fn tick_to_seconds(&self, tick: u64) -> f64 {
        let segment = self
            .segments
            .iter()
            .rev()
            .find(|s| s.tick <= tick)
            .unwrap_or(&self.segments[0]);
        segment.seconds + (tick - segment.tick.min(tick)) as f64 * segment.seconds_per_tick(self.ppq)
    }

    pub fn seconds_to_tick(&self, seconds: f64) -> u64 {
        let seconds = seconds.max(0.0);
        let segment = self
            .segments
            .iter()
            .rev()
            .find(|s| s.seconds <= seconds)
            .unwrap_or(&self.segments[0]);
        let offset = (seconds - segment.seconds) / segment.seconds_per_tick(self.ppq);
        segment.tick + offset.round().max(0.0) as u64
    }
}

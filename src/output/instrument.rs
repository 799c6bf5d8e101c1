//! Chord instrument on top of a MIDI sink
//!
//! Builds diatonic chords from scale degrees of the current key and keeps
//! track of sounding notes so a release silences exactly what is playing.

use crate::mapping::action::{DispatchError, InstrumentParam, OutputEvent, MIDI_DATA_MAX};
use crate::output::midi::{MidiMessage, MidiSink};
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::{debug, trace};

pub const OCTAVES: i32 = 9;
pub const BASS_MODES: i32 = 3;
pub const SEMITONES: i32 = 12;
/// Voices in the largest chord (triad plus seventh and ninth)
pub const MAX_VOICING: i32 = 5;

pub const MINOR_SEVENTH: i32 = 10;
pub const MAJOR_NINTH: i32 = 14;
pub const DIMINISHED_SEVENTH: i32 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Major,
    Minor,
    Diminished,
}

impl Quality {
    pub fn triad(self) -> [i32; 3] {
        match self {
            Quality::Major => [0, 4, 7],
            Quality::Minor => [0, 3, 7],
            Quality::Diminished => [0, 3, 6],
        }
    }

    /// Quality after a modifier: 1 swaps major/minor (diminished becomes
    /// major), 2 diminishes (diminished becomes minor).
    pub fn modified(self, modifier: i32) -> Quality {
        match (modifier, self) {
            (1, Quality::Major) => Quality::Minor,
            (1, _) => Quality::Major,
            (2, Quality::Diminished) => Quality::Minor,
            (2, _) => Quality::Diminished,
            _ => self,
        }
    }
}

/// Root pitch offset and quality of each degree of the major scale
pub const SCALE_DEGREES: [(i32, Quality); 7] = [
    (0, Quality::Major),
    (2, Quality::Minor),
    (4, Quality::Minor),
    (5, Quality::Major),
    (7, Quality::Major),
    (9, Quality::Minor),
    (11, Quality::Diminished),
];

fn extensions(quality: Quality, modifier: i32) -> Vec<i32> {
    match modifier {
        1 => vec![MINOR_SEVENTH],
        2 if quality == Quality::Diminished => vec![DIMINISHED_SEVENTH],
        2 => vec![MINOR_SEVENTH, MAJOR_NINTH],
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BassMode {
    #[default]
    Off,
    /// Extra voice an octave below the root
    Root,
    /// Extra voice an octave below the lowest chord tone
    Inversion,
}

impl BassMode {
    pub fn from_index(index: i32) -> Self {
        match index.rem_euclid(BASS_MODES) {
            1 => BassMode::Root,
            2 => BassMode::Inversion,
            _ => BassMode::Off,
        }
    }

    pub fn index(self) -> i32 {
        match self {
            BassMode::Off => 0,
            BassMode::Root => 1,
            BassMode::Inversion => 2,
        }
    }
}

/// Chord tones rooted at `root`, rotated by `voicing` inversions.
///
/// Each inversion moves the lowest voice up an octave.
pub fn chord_voices(root: i32, intervals: &[i32], voicing: usize) -> Vec<i32> {
    let len = intervals.len();
    (0..len)
        .map(|i| {
            let k = i + voicing;
            root + intervals[k % len] + SEMITONES * (k / len) as i32
        })
        .collect()
}

fn default_velocity() -> u8 {
    127
}

fn default_octave() -> i32 {
    5
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct InstrumentSettings {
    #[serde(default)]
    pub channel: u8,
    #[serde(default = "default_velocity")]
    pub velocity: u8,
    #[serde(default = "default_octave")]
    pub octave: i32,
}

impl Default for InstrumentSettings {
    fn default() -> Self {
        Self {
            channel: 0,
            velocity: default_velocity(),
            octave: default_octave(),
        }
    }
}

pub struct Instrument<S: MidiSink> {
    sink: S,
    channel: u8,
    velocity: u8,
    octave: i32,
    tonic: i32,
    tonic_offset: i32,
    next_tonic: Option<i32>,
    bass: BassMode,
    voicing: i32,
    quality_modifier: i32,
    extension_modifier: i32,
    playing: BTreeSet<u8>,
}

impl<S: MidiSink> Instrument<S> {
    pub fn new(sink: S, settings: InstrumentSettings) -> Self {
        let mut instrument = Self {
            sink,
            channel: settings.channel & 0x0F,
            velocity: settings.velocity.min(MIDI_DATA_MAX),
            octave: 0,
            tonic: 0,
            tonic_offset: 0,
            next_tonic: None,
            bass: BassMode::Off,
            voicing: 0,
            quality_modifier: 0,
            extension_modifier: 0,
            playing: BTreeSet::new(),
        };
        instrument.set_octave(settings.octave);
        instrument
    }

    pub fn octave(&self) -> i32 {
        self.octave
    }

    pub fn set_octave(&mut self, octave: i32) {
        self.octave = octave.rem_euclid(OCTAVES);
    }

    pub fn bass(&self) -> BassMode {
        self.bass
    }

    pub fn set_bass(&mut self, bass: i32) {
        self.bass = BassMode::from_index(bass);
    }

    pub fn tonic(&self) -> i32 {
        self.tonic
    }

    pub fn set_tonic(&mut self, tonic: i32) {
        self.tonic = tonic.rem_euclid(SEMITONES);
    }

    pub fn next_tonic(&self) -> Option<i32> {
        self.next_tonic
    }

    /// Stages the key rooted on `degree` of the current key (offset applied)
    pub fn set_next_tonic(&mut self, degree: u8) {
        if let Some((pitch, _)) = SCALE_DEGREES.get(degree as usize) {
            let next = (self.tonic + pitch + self.tonic_offset).rem_euclid(SEMITONES);
            debug!("Next tonic staged: {}", next);
            self.next_tonic = Some(next);
        }
    }

    /// Applies the staged tonic, if any
    pub fn commit_tonic(&mut self) {
        if let Some(next) = self.next_tonic.take() {
            debug!("Tonic committed: {} -> {}", self.tonic, next);
            self.set_tonic(next);
        }
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    pub fn playing_notes(&self) -> &BTreeSet<u8> {
        &self.playing
    }

    pub fn param(&self, param: InstrumentParam) -> i32 {
        match param {
            InstrumentParam::Octave => self.octave,
            InstrumentParam::Bass => self.bass.index(),
            InstrumentParam::Voicing => self.voicing,
            InstrumentParam::Quality => self.quality_modifier,
            InstrumentParam::Extension => self.extension_modifier,
            InstrumentParam::TonicOffset => self.tonic_offset,
            InstrumentParam::Tonic => self.tonic,
            InstrumentParam::Velocity => self.velocity as i32,
        }
    }

    pub fn set_param(&mut self, param: InstrumentParam, value: i32) {
        match param {
            InstrumentParam::Octave => self.set_octave(value),
            InstrumentParam::Bass => self.set_bass(value),
            InstrumentParam::Voicing => self.voicing = value.clamp(0, MAX_VOICING),
            InstrumentParam::Quality => self.quality_modifier = value.clamp(0, 2),
            InstrumentParam::Extension => self.extension_modifier = value.clamp(0, 2),
            // Within an octave either way; -11..=11
            InstrumentParam::TonicOffset => self.tonic_offset = value % SEMITONES,
            InstrumentParam::Tonic => self.set_tonic(value),
            InstrumentParam::Velocity => self.velocity = value.clamp(0, MIDI_DATA_MAX as i32) as u8,
        }
        trace!("{:?} = {}", param, self.param(param));
    }

    /// Pitches of the chord on `degree` with the current modifiers
    pub fn construct_chord(&self, degree: u8) -> Vec<i32> {
        let Some(&(pitch, base_quality)) = SCALE_DEGREES.get(degree as usize) else {
            return Vec::new();
        };
        let root = self.tonic + self.octave * SEMITONES + pitch + self.tonic_offset;
        let quality = base_quality.modified(self.quality_modifier);

        let mut intervals = quality.triad().to_vec();
        intervals.extend(extensions(quality, self.extension_modifier));

        let mut chord = chord_voices(root, &intervals, self.voicing.max(0) as usize);
        match self.bass {
            BassMode::Off => {}
            BassMode::Root => chord.push(root - SEMITONES),
            BassMode::Inversion => {
                if let Some(&lowest) = chord.first() {
                    chord.push(lowest - SEMITONES);
                }
            }
        }
        chord
    }

    /// Releases what is sounding, then plays the chord on `degree`
    pub fn play_scale_degree(&mut self, degree: u8) -> Result<(), DispatchError> {
        self.release()?;
        let chord = self.construct_chord(degree);
        debug!("Playing degree {}: {:?}", degree, chord);
        for pitch in chord {
            if !(0..=MIDI_DATA_MAX as i32).contains(&pitch) {
                trace!("Pitch {} outside MIDI range, skipped", pitch);
                continue;
            }
            self.note_on(self.channel, pitch as u8, self.velocity)?;
        }
        Ok(())
    }

    /// Silences every tracked note; attempts all of them even if one fails
    pub fn release(&mut self) -> Result<(), DispatchError> {
        let notes = std::mem::take(&mut self.playing);
        let mut result = Ok(());
        for note in notes {
            if let Err(e) = self.sink.send(&MidiMessage::NoteOff {
                channel: self.channel,
                note,
            }) {
                result = Err(e);
            }
        }
        result
    }

    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) -> Result<(), DispatchError> {
        self.sink.send(&MidiMessage::NoteOn {
            channel,
            note,
            velocity,
        })?;
        if velocity > 0 {
            self.playing.insert(note);
        } else {
            self.playing.remove(&note);
        }
        Ok(())
    }

    pub fn handle(&mut self, event: &OutputEvent) -> Result<(), DispatchError> {
        match *event {
            OutputEvent::NoteOn {
                note,
                velocity,
                channel,
            } => self.note_on(
                channel.unwrap_or(self.channel),
                note,
                velocity.unwrap_or(self.velocity),
            ),
            OutputEvent::NoteOff { note, channel } => {
                self.sink.send(&MidiMessage::NoteOff {
                    channel: channel.unwrap_or(self.channel),
                    note,
                })?;
                self.playing.remove(&note);
                Ok(())
            }
            OutputEvent::ControlChange {
                controller,
                value,
                channel,
            } => self.sink.send(&MidiMessage::ControlChange {
                channel: channel.unwrap_or(self.channel),
                controller,
                value,
            }),
            OutputEvent::ProgramChange { program, channel } => {
                self.sink.send(&MidiMessage::ProgramChange {
                    channel: channel.unwrap_or(self.channel),
                    program,
                })
            }
            OutputEvent::PitchBend { value, channel } => self.sink.send(&MidiMessage::PitchBend {
                channel: channel.unwrap_or(self.channel),
                value,
            }),
            OutputEvent::PlayScaleDegree { degree } => self.play_scale_degree(degree),
            OutputEvent::Release => self.release(),
            OutputEvent::Set { param, value } => {
                self.set_param(param, value);
                Ok(())
            }
            OutputEvent::Shift { param, by } => {
                self.set_param(param, self.param(param).saturating_add(by));
                Ok(())
            }
            OutputEvent::SetNextTonic { degree } => {
                self.set_next_tonic(degree);
                Ok(())
            }
            OutputEvent::CommitTonic => {
                self.commit_tonic();
                Ok(())
            }
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

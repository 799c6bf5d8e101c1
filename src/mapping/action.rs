//! Actions fired by chord transitions and the dispatcher boundary
//!
//! The core never interprets an `OutputEvent`; it only validates ranges at
//! load time and forwards events, in order, to a `Dispatcher`.

use serde::Deserialize;
use thiserror::Error;

/// Instrument parameters adjustable through `set` / `shift` events and bindings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentParam {
    Octave,
    Bass,
    Voicing,
    Quality,
    Extension,
    TonicOffset,
    Tonic,
    Velocity,
}

/// Musical output understood by the output side
///
/// Channels default to the instrument's channel when omitted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "emit", rename_all = "snake_case")]
pub enum OutputEvent {
    NoteOn {
        note: u8,
        velocity: Option<u8>,
        channel: Option<u8>,
    },
    NoteOff {
        note: u8,
        channel: Option<u8>,
    },
    ControlChange {
        controller: u8,
        value: u8,
        channel: Option<u8>,
    },
    ProgramChange {
        program: u8,
        channel: Option<u8>,
    },
    /// Signed 14 bit bend, -8192..=8191
    PitchBend {
        value: i16,
        channel: Option<u8>,
    },
    /// Play the chord built on a degree (0-6) of the current key
    PlayScaleDegree {
        degree: u8,
    },
    /// Silence every note the instrument is holding
    Release,
    Set {
        param: InstrumentParam,
        value: i32,
    },
    Shift {
        param: InstrumentParam,
        by: i32,
    },
    /// Stage the key rooted on a degree of the current key
    SetNextTonic {
        degree: u8,
    },
    CommitTonic,
}

pub const MIDI_DATA_MAX: u8 = 127;
pub const MIDI_CHANNELS: u8 = 16;
pub const PITCH_BEND_MIN: i16 = -8192;
pub const PITCH_BEND_MAX: i16 = 8191;
pub const SCALE_LENGTH: u8 = 7;

fn check_data(name: &str, value: u8) -> Result<(), String> {
    if value > MIDI_DATA_MAX {
        return Err(format!("{} {} exceeds {}", name, value, MIDI_DATA_MAX));
    }
    Ok(())
}

fn check_channel(channel: Option<u8>) -> Result<(), String> {
    match channel {
        Some(channel) if channel >= MIDI_CHANNELS => {
            Err(format!("channel {} is not in 0..{}", channel, MIDI_CHANNELS))
        }
        _ => Ok(()),
    }
}

fn check_degree(degree: u8) -> Result<(), String> {
    if degree >= SCALE_LENGTH {
        return Err(format!("scale degree {} is not in 0..{}", degree, SCALE_LENGTH));
    }
    Ok(())
}

impl OutputEvent {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            OutputEvent::NoteOn {
                note,
                velocity,
                channel,
            } => {
                check_data("note", *note)?;
                if let Some(velocity) = velocity {
                    check_data("velocity", *velocity)?;
                }
                check_channel(*channel)
            }
            OutputEvent::NoteOff { note, channel } => {
                check_data("note", *note)?;
                check_channel(*channel)
            }
            OutputEvent::ControlChange {
                controller,
                value,
                channel,
            } => {
                check_data("controller", *controller)?;
                check_data("value", *value)?;
                check_channel(*channel)
            }
            OutputEvent::ProgramChange { program, channel } => {
                check_data("program", *program)?;
                check_channel(*channel)
            }
            OutputEvent::PitchBend { value, channel } => {
                if !(PITCH_BEND_MIN..=PITCH_BEND_MAX).contains(value) {
                    return Err(format!("pitch bend {} out of range", value));
                }
                check_channel(*channel)
            }
            OutputEvent::PlayScaleDegree { degree } | OutputEvent::SetNextTonic { degree } => {
                check_degree(*degree)
            }
            OutputEvent::Release
            | OutputEvent::Set { .. }
            | OutputEvent::Shift { .. }
            | OutputEvent::CommitTonic => Ok(()),
        }
    }
}

/// Shell command line executed by the dispatcher
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShellCommand {
    #[serde(rename = "run")]
    pub command: String,
}

impl ShellCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

/// Makes another keymap current, written `{ mode = "name" }`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModeSwitch {
    pub mode: String,
}

impl ModeSwitch {
    pub fn new(mode: impl Into<String>) -> Self {
        Self { mode: mode.into() }
    }
}

/// One step of an activation or deactivation list
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Action {
    EmitOutput(OutputEvent),
    RunCommand(ShellCommand),
    /// Applied by the engine, never forwarded to the dispatcher
    SwitchMode(ModeSwitch),
}

impl Action {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Action::EmitOutput(event) => event.validate(),
            Action::RunCommand(command) if command.command.trim().is_empty() => {
                Err("empty command".to_string())
            }
            Action::SwitchMode(switch) if switch.mode.trim().is_empty() => {
                Err("empty mode name".to_string())
            }
            Action::RunCommand(_) | Action::SwitchMode(_) => Ok(()),
        }
    }

    pub fn requested_mode(&self) -> Option<&str> {
        match self {
            Action::SwitchMode(switch) => Some(&switch.mode),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    #[error("Output queue is full")]
    QueueFull,

    #[error("Output channel closed")]
    Closed,

    #[error("MIDI transport error: {0}")]
    Transport(String),

    #[error("Command error: {0}")]
    Command(String),
}

/// Executes actions on behalf of the engine
///
/// Implementations must not retry on the caller's behalf; a failure is
/// returned for that single action.
pub trait Dispatcher {
    fn emit(&mut self, event: &OutputEvent) -> Result<(), DispatchError>;

    fn run(&mut self, command: &ShellCommand) -> Result<(), DispatchError>;

    /// Mode switches belong to the engine and are accepted as no-ops here
    fn dispatch(&mut self, action: &Action) -> Result<(), DispatchError> {
        match action {
            Action::EmitOutput(event) => self.emit(event),
            Action::RunCommand(command) => self.run(command),
            Action::SwitchMode(_) => Ok(()),
        }
    }
}

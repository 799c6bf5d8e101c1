//! MIDI wire messages and the midir-backed sink

use crate::mapping::action::DispatchError;
use midir::{MidiOutput, MidiOutputConnection};
use thiserror::Error;
use tracing::{debug, info};

const CLIENT_NAME: &str = "chordcontroller";
/// Name of the virtual port, and of the port opened on an existing output
pub const PORT_NAME: &str = "chordcontroller";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    /// Signed bend, -8192..=8191
    PitchBend { channel: u8, value: i16 },
}

impl MidiMessage {
    pub fn to_bytes(&self) -> Vec<u8> {
        match *self {
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => vec![0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F],
            MidiMessage::NoteOff { channel, note } => vec![0x80 | (channel & 0x0F), note & 0x7F, 0],
            MidiMessage::ControlChange {
                channel,
                controller,
                value,
            } => vec![0xB0 | (channel & 0x0F), controller & 0x7F, value & 0x7F],
            MidiMessage::ProgramChange { channel, program } => {
                vec![0xC0 | (channel & 0x0F), program & 0x7F]
            }
            MidiMessage::PitchBend { channel, value } => {
                let raw = (value as i32 + 8192).clamp(0, 0x3FFF) as u16;
                vec![
                    0xE0 | (channel & 0x0F),
                    (raw & 0x7F) as u8,
                    ((raw >> 7) & 0x7F) as u8,
                ]
            }
        }
    }
}

/// Anything that can carry MIDI messages
pub trait MidiSink: Send {
    fn send(&mut self, message: &MidiMessage) -> Result<(), DispatchError>;
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("MIDI init error: {0}")]
    Init(#[from] midir::InitError),

    #[error("MIDI connect error: {0}")]
    Connect(String),

    #[error("MIDI output port '{name}' not found, available: {available:?}")]
    PortNotFound { name: String, available: Vec<String> },

    #[error("No MIDI output ports available")]
    NoPorts,
}

pub struct MidirSink {
    connection: MidiOutputConnection,
    port_name: String,
}

impl MidirSink {
    /// Connects to the first port whose name contains `device_name`
    pub fn connect_to_device(device_name: &str) -> Result<Self, OutputError> {
        let midi_out = MidiOutput::new(CLIENT_NAME)?;
        let ports = midi_out.ports();
        let available: Vec<String> = ports
            .iter()
            .filter_map(|port| midi_out.port_name(port).ok())
            .collect();
        debug!("Available MIDI output ports: {:?}", available);

        let port = ports
            .iter()
            .find(|port| {
                midi_out
                    .port_name(port)
                    .map(|name| name.contains(device_name))
                    .unwrap_or(false)
            })
            .ok_or_else(|| OutputError::PortNotFound {
                name: device_name.to_string(),
                available: available.clone(),
            })?;

        let port_name = midi_out
            .port_name(port)
            .map_err(|e| OutputError::Connect(e.to_string()))?;
        info!("Connecting to MIDI output port: {}", port_name);
        let connection = midi_out
            .connect(port, PORT_NAME)
            .map_err(|e| OutputError::Connect(e.to_string()))?;

        Ok(Self {
            connection,
            port_name,
        })
    }

    /// Opens a virtual output port other applications can subscribe to
    #[cfg(unix)]
    pub fn open_virtual() -> Result<Self, OutputError> {
        use midir::os::unix::VirtualOutput;

        let midi_out = MidiOutput::new(CLIENT_NAME)?;
        let connection = midi_out
            .create_virtual(PORT_NAME)
            .map_err(|e| OutputError::Connect(e.to_string()))?;
        info!("Opened virtual MIDI output port: {}", PORT_NAME);

        Ok(Self {
            connection,
            port_name: PORT_NAME.to_string(),
        })
    }

    /// Falls back to the first available port where virtual ports do not exist
    #[cfg(not(unix))]
    pub fn open_virtual() -> Result<Self, OutputError> {
        let midi_out = MidiOutput::new(CLIENT_NAME)?;
        let ports = midi_out.ports();
        let port = ports.first().ok_or(OutputError::NoPorts)?;
        let port_name = midi_out
            .port_name(port)
            .map_err(|e| OutputError::Connect(e.to_string()))?;
        info!("Connecting to MIDI output port: {}", port_name);
        let connection = midi_out
            .connect(port, PORT_NAME)
            .map_err(|e| OutputError::Connect(e.to_string()))?;

        Ok(Self {
            connection,
            port_name,
        })
    }

    /// A named port when given, otherwise a virtual one
    pub fn open(device_name: Option<&str>) -> Result<Self, OutputError> {
        match device_name {
            Some(name) => Self::connect_to_device(name),
            None => Self::open_virtual(),
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn list_ports() -> Result<Vec<String>, OutputError> {
        let midi_out = MidiOutput::new(CLIENT_NAME)?;
        let ports = midi_out.ports();
        Ok(ports
            .iter()
            .filter_map(|port| midi_out.port_name(port).ok())
            .collect())
    }
}

impl MidiSink for MidirSink {
    fn send(&mut self, message: &MidiMessage) -> Result<(), DispatchError> {
        debug!("Sending MIDI {:?}", message);
        self.connection
            .send(&message.to_bytes())
            .map_err(|e| DispatchError::Transport(e.to_string()))
    }
}

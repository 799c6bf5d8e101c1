//! The binary's dispatcher: MIDI through the instrument, commands through `sh -c`

use crate::mapping::action::{DispatchError, Dispatcher, OutputEvent, ShellCommand};
use crate::output::instrument::Instrument;
use crate::output::midi::MidiSink;
use tokio::process::Command;
use tracing::{debug, info};

pub struct Performer<S: MidiSink> {
    instrument: Instrument<S>,
}

impl<S: MidiSink> Performer<S> {
    pub fn new(instrument: Instrument<S>) -> Self {
        Self { instrument }
    }

    pub fn instrument(&self) -> &Instrument<S> {
        &self.instrument
    }

    pub fn instrument_mut(&mut self) -> &mut Instrument<S> {
        &mut self.instrument
    }
}

impl<S: MidiSink> Dispatcher for Performer<S> {
    fn emit(&mut self, event: &OutputEvent) -> Result<(), DispatchError> {
        self.instrument.handle(event)
    }

    /// Spawns the command without waiting for it; must run inside a tokio runtime
    fn run(&mut self, command: &ShellCommand) -> Result<(), DispatchError> {
        info!("Running command: {}", command.command);
        let child = Command::new("sh")
            .arg("-c")
            .arg(&command.command)
            .spawn()
            .map_err(|e| DispatchError::Command(format!("{}: {}", command.command, e)))?;
        debug!("Spawned pid {:?}", child.id());
        Ok(())
    }
}

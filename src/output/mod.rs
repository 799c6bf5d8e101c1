//! Output side: MIDI instrument, shell commands and the dispatch queue

pub mod instrument;
pub mod midi;
pub mod performer;
pub mod queue;

pub use instrument::{Instrument, InstrumentSettings};
pub use midi::{MidiMessage, MidiSink, MidirSink, OutputError};
pub use performer::Performer;
pub use queue::{run_output_worker, OutputJob, QueuedDispatcher, OUTPUT_QUEUE_CAPACITY};

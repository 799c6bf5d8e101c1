//! Chord controller: play chords on a MIDI synthesizer with a game controller.
//!
//! ```text
//! gilrs ──► controller ──► mapping::ChordEngine ──► output::QueuedDispatcher ──► Performer ──► MIDI / sh
//! ```

pub mod cli;
pub mod config;
pub mod controller;
pub mod mapping;
pub mod output;

use crate::controller::ControllerSettings;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(author, version, about = "Play chords on a MIDI synth with a game controller", long_about = None)]
pub struct Args {
    /// Profile to load (defaults to <config dir>/chordcontroller/ChordController.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Exit instead of falling back to the default profile when the config cannot be parsed
    #[arg(short, long)]
    pub quit_on_parse_failure: bool,

    /// Controller index; without it the first controller to press a button is used
    #[arg(short, long)]
    pub controller: Option<usize>,

    /// Connect to an existing MIDI output whose name contains this text
    #[arg(long)]
    pub midi_port: Option<String>,

    /// List available MIDI output ports and exit
    #[arg(long)]
    pub list_ports: bool,

    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl Args {
    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            controller_index: self.controller,
            ..ControllerSettings::default()
        }
    }

    /// `--midi-port` wins over the profile's `[output] port_name`
    pub fn port_name<'a>(&'a self, configured: Option<&'a str>) -> Option<&'a str> {
        self.midi_port.as_deref().or(configured)
    }
}

//! Input normalization and chord resolution.
//!
//! This module turns raw controller readings into ordered output actions.
//! It performs no I/O: devices feed it `RawInputEvent`s and a `Dispatcher`
//! receives the resulting actions.
//!
//! ```text
//! ProfileDefinition ──► Profile::build ──► Arc<Profile> (aliases, calibration, chords, bindings)
//!                                               │
//! RawInputEvent ──────────────────────► ChordEngine ──► Dispatcher
//! ```

pub mod action;
pub mod alias;
pub mod binding;
pub mod calibration;
pub mod chord;
pub mod engine;
pub mod error;
pub mod input;
pub mod normalizer;
pub mod profile;
pub mod resolver;
pub mod tracker;

pub use action::{
    Action, DispatchError, Dispatcher, InstrumentParam, ModeSwitch, OutputEvent, ShellCommand,
};
pub use alias::{AliasTable, InputId, InputRef};
pub use binding::{value_in_range, BindingTarget, ValueBinding};
pub use calibration::{AxisCalibration, CalibrationStore, HatCalibration};
pub use chord::{Behavior, ChordDefinition, ChordId, Predicate, ThresholdDirection};
pub use engine::{run_engine, ActionSource, ChordEngine, DispatchFailure, EngineReport};
pub use error::{LoadError, NormalizeError};
pub use input::{HatDirection, InputKind, NormalizedInput, RawInput, RawInputEvent};
pub use normalizer::RawInputNormalizer;
pub use profile::{Profile, ProfileDefinition, DEFAULT_MODE};
pub use resolver::{ActionResolver, ResolvedAction};
pub use tracker::{ChordTracker, Edge, InputSnapshot, Transition};

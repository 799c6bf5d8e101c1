//! Error definitions for the chord mapping core

use crate::mapping::input::InputKind;
use thiserror::Error;

/// Errors raised while building a `Profile` from its definition.
///
/// All of these are fatal at startup; the engine never sees a profile that
/// failed validation.
#[derive(Debug, Error, PartialEq)]
pub enum LoadError {
    #[error("Duplicate alias: {0}")]
    DuplicateAlias(String),

    /// Alias names must start with BUTTON_, AXIS_ or HAT_
    #[error("Cannot infer input kind of alias {0}")]
    UnknownAliasKind(String),

    #[error("Undefined alias: {0}")]
    UndefinedAlias(String),

    #[error("Alias {alias} is a {found}, expected a {expected}")]
    AliasKindMismatch {
        alias: String,
        expected: InputKind,
        found: InputKind,
    },

    #[error("Axis calibration {key} has min == max ({value})")]
    DegenerateCalibration { key: String, value: f32 },

    #[error("Axis calibration {key} contains a non-finite value")]
    NonFiniteCalibration { key: String },

    #[error("No calibration for {kind} {index} used by {context}")]
    MissingCalibration {
        kind: InputKind,
        index: u32,
        context: String,
    },

    #[error("Chord {0} has no predicates")]
    EmptyChord(String),

    #[error("Axis predicate in {0} needs exactly one of above/below")]
    AmbiguousThreshold(String),

    #[error("Invalid threshold {value} in {context}")]
    InvalidThreshold { context: String, value: f32 },

    #[error("Invalid binding {binding}: {reason}")]
    InvalidBinding { binding: String, reason: String },

    #[error("Invalid action in {context}: {reason}")]
    InvalidAction { context: String, reason: String },

    #[error("Unknown mode {mode} requested by {context}")]
    UnknownMode { mode: String, context: String },
}

/// Runtime conditions the normalizer cannot map to a logical value.
///
/// The engine skips such events; they are not faults.
#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("Axis {0} has no calibration")]
    UncalibratedAxis(u32),

    #[error("Hat {0} has no calibration")]
    UncalibratedHat(u32),

    #[error("Axis {0} reported a non-finite value")]
    NonFiniteAxis(u32),
}

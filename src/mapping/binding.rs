//! Continuous axis → output value bindings
//!
//! A binding follows one axis and emits an output event whenever the value
//! it maps to changes, e.g. a thumbstick driving the modulation wheel.
//! Optional `when` predicates gate it: while any of them fails the axis is
//! not followed.

use crate::mapping::action::{
    InstrumentParam, OutputEvent, MIDI_CHANNELS, MIDI_DATA_MAX, PITCH_BEND_MAX, PITCH_BEND_MIN,
};
use crate::mapping::alias::{AliasTable, InputRef};
use crate::mapping::calibration::CalibrationStore;
use crate::mapping::chord::{resolve_predicates, Predicate, PredicateSpec};
use crate::mapping::error::LoadError;
use crate::mapping::input::InputKind;
use crate::mapping::tracker::InputSnapshot;
use serde::Deserialize;

/// Maps a percentage onto a value range.
///
/// Without steps the result is `(max - min) * percent^curve + min`. With
/// (ascending) steps the range is split into `steps.len()` equal buckets and
/// the index of the first step above `percent` picks the bucket; past the
/// last step the result is `max` when `inclusive`, else the last bucket.
///
/// Returns `None` when `percent` is outside [0, 1] or `curve` is negative.
pub fn value_in_range(
    percent: f32,
    value_at_min: f32,
    value_at_max: f32,
    curve: f32,
    steps: &[f32],
    inclusive: bool,
) -> Option<f32> {
    if !(0.0..=1.0).contains(&percent) || curve < 0.0 {
        return None;
    }
    let span = value_at_max - value_at_min;
    if steps.is_empty() {
        return Some(span * percent.powf(curve) + value_at_min);
    }

    let bucket = span / steps.len() as f32;
    match steps.iter().position(|step| percent < *step) {
        Some(index) => Some(index as f32 * bucket + value_at_min),
        None if inclusive => Some(value_at_max),
        None => Some((steps.len() - 1) as f32 * bucket + value_at_min),
    }
}

/// What a binding drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingTarget {
    ControlChange { controller: u8 },
    PitchBend,
    Param(InstrumentParam),
}

impl BindingTarget {
    /// Inclusive output range of the target
    pub fn range(&self) -> (i32, i32) {
        match self {
            BindingTarget::ControlChange { .. } => (0, MIDI_DATA_MAX as i32),
            BindingTarget::PitchBend => (PITCH_BEND_MIN as i32, PITCH_BEND_MAX as i32),
            BindingTarget::Param(_) => (i32::MIN, i32::MAX),
        }
    }
}

fn default_curve() -> f32 {
    1.0
}

fn default_inclusive() -> bool {
    true
}

/// Binding as written in configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindingSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    pub axis: InputRef,
    #[serde(default)]
    pub when: Vec<PredicateSpec>,
    #[serde(default)]
    pub control_change: Option<u8>,
    #[serde(default)]
    pub pitch_bend: bool,
    #[serde(default)]
    pub param: Option<InstrumentParam>,
    #[serde(default)]
    pub channel: Option<u8>,
    #[serde(default)]
    pub value_at_min: Option<f32>,
    #[serde(default)]
    pub value_at_max: Option<f32>,
    #[serde(default = "default_curve")]
    pub curve: f32,
    #[serde(default)]
    pub steps: Vec<f32>,
    #[serde(default = "default_inclusive")]
    pub inclusive: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueBinding {
    pub name: String,
    pub mode: Option<String>,
    pub axis: u32,
    pub gate: Vec<Predicate>,
    pub target: BindingTarget,
    pub channel: Option<u8>,
    pub value_at_min: f32,
    pub value_at_max: f32,
    pub curve: f32,
    /// Sorted ascending
    pub steps: Vec<f32>,
    pub inclusive: bool,
}

impl BindingSpec {
    pub fn resolve(
        &self,
        position: usize,
        aliases: &AliasTable,
        calibration: &CalibrationStore,
    ) -> Result<ValueBinding, LoadError> {
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| format!("{} #{}", self.axis, position));
        let invalid = |reason: String| LoadError::InvalidBinding {
            binding: name.clone(),
            reason,
        };

        let target = match (self.control_change, self.pitch_bend, self.param) {
            (Some(controller), false, None) => {
                if controller > MIDI_DATA_MAX {
                    return Err(invalid(format!("controller {} exceeds 127", controller)));
                }
                BindingTarget::ControlChange { controller }
            }
            (None, true, None) => BindingTarget::PitchBend,
            (None, false, Some(param)) => BindingTarget::Param(param),
            _ => {
                return Err(invalid(
                    "needs exactly one of control_change, pitch_bend, param".to_string(),
                ))
            }
        };

        if let Some(channel) = self.channel {
            if channel >= MIDI_CHANNELS {
                return Err(invalid(format!("channel {} is not in 0..16", channel)));
            }
        }

        let context = format!("binding {}", name);
        let axis = aliases.resolve(&self.axis, InputKind::Axis)?;
        if !calibration.covers(InputKind::Axis, axis) {
            return Err(LoadError::MissingCalibration {
                kind: InputKind::Axis,
                index: axis,
                context,
            });
        }
        let gate = resolve_predicates(&self.when, &context, aliases, calibration)?;

        let (low, high) = match target {
            BindingTarget::Param(_) => (0.0, 1.0),
            _ => {
                let (low, high) = target.range();
                (low as f32, high as f32)
            }
        };
        let value_at_min = self.value_at_min.unwrap_or(low);
        let value_at_max = self.value_at_max.unwrap_or(high);

        if !value_at_min.is_finite() || !value_at_max.is_finite() {
            return Err(invalid("range bounds must be finite".to_string()));
        }
        if !self.curve.is_finite() || self.curve < 0.0 {
            return Err(invalid(format!("curve {} must be >= 0", self.curve)));
        }
        if self.steps.iter().any(|step| !step.is_finite()) {
            return Err(invalid("steps must be finite".to_string()));
        }

        let mut steps = self.steps.clone();
        steps.sort_by(|a, b| a.total_cmp(b));

        Ok(ValueBinding {
            name,
            mode: self.mode.clone(),
            axis,
            gate,
            target,
            channel: self.channel,
            value_at_min,
            value_at_max,
            curve: self.curve,
            steps,
            inclusive: self.inclusive,
        })
    }
}

impl ValueBinding {
    pub fn applies_in(&self, mode: &str) -> bool {
        self.mode.as_deref().map_or(true, |own| own == mode)
    }

    /// True when every `when` predicate holds; an empty gate is always open
    pub fn is_open(&self, snapshot: &InputSnapshot) -> bool {
        self.gate.iter().all(|predicate| predicate.holds(snapshot))
    }

    /// Rounded, range-clamped output value for a normalized axis value
    pub fn value_for(&self, normalized: f32) -> Option<i32> {
        let percent = ((normalized + 1.0) / 2.0).clamp(0.0, 1.0);
        let value = value_in_range(
            percent,
            self.value_at_min,
            self.value_at_max,
            self.curve,
            &self.steps,
            self.inclusive,
        )?;
        let (low, high) = self.target.range();
        Some((value.round() as i32).clamp(low, high))
    }

    pub fn event_for(&self, value: i32) -> OutputEvent {
        match self.target {
            BindingTarget::ControlChange { controller } => OutputEvent::ControlChange {
                controller,
                value: value as u8,
                channel: self.channel,
            },
            BindingTarget::PitchBend => OutputEvent::PitchBend {
                value: value as i16,
                channel: self.channel,
            },
            BindingTarget::Param(param) => OutputEvent::Set { param, value },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(actual: Option<f32>, expected: f32) {
        let actual = actual.expect("value in range");
        assert!(
            (actual - expected).abs() < 1e-4,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn linear_and_curved_ranges() {
        approx(value_in_range(0.0, 10.0, 20.0, 1.0, &[], true), 10.0);
        approx(value_in_range(0.5, 10.0, 20.0, 1.0, &[], true), 15.0);
        approx(value_in_range(1.0, 10.0, 20.0, 1.0, &[], true), 20.0);
        approx(value_in_range(0.5, 0.0, 100.0, 2.0, &[], true), 25.0);
        approx(value_in_range(0.5, 112.0, 0.0, 1.0, &[], true), 56.0);
        approx(value_in_range(0.3, 5.0, 9.0, 0.0, &[], true), 9.0);
    }

    #[test]
    fn stepped_ranges() {
        let steps = [0.05, 0.4, 0.9, 1.0];
        approx(value_in_range(0.0, 0.0, 4.0, 1.0, &steps, false), 0.0);
        approx(value_in_range(0.2, 0.0, 4.0, 1.0, &steps, false), 1.0);
        approx(value_in_range(0.5, 0.0, 4.0, 1.0, &steps, false), 2.0);
        approx(value_in_range(0.95, 0.0, 4.0, 1.0, &steps, false), 3.0);
        approx(value_in_range(1.0, 0.0, 4.0, 1.0, &steps, false), 3.0);
        approx(value_in_range(1.0, 0.0, 4.0, 1.0, &steps, true), 4.0);
    }

    #[test]
    fn rejects_bad_inputs() {
        assert_eq!(value_in_range(1.5, 0.0, 1.0, 1.0, &[], true), None);
        assert_eq!(value_in_range(-0.1, 0.0, 1.0, 1.0, &[], true), None);
        assert_eq!(value_in_range(0.5, 0.0, 1.0, -1.0, &[], true), None);
    }

    fn binding(text: &str) -> Result<ValueBinding, LoadError> {
        toml::from_str::<BindingSpec>(text).unwrap().resolve(
            0,
            &AliasTable::with_defaults(),
            &CalibrationStore::with_defaults(),
        )
    }

    #[test]
    fn control_change_spans_midi_range() {
        let binding = binding(r#"axis = "AXIS_RTHUMBY"
control_change = 1"#)
        .unwrap();
        assert_eq!(binding.axis, 3);
        assert_eq!(binding.value_for(-1.0), Some(0));
        assert_eq!(binding.value_for(1.0), Some(127));
        assert_eq!(binding.value_for(0.0), Some(64));
        assert_eq!(
            binding.event_for(64),
            OutputEvent::ControlChange {
                controller: 1,
                value: 64,
                channel: None
            }
        );
    }

    #[test]
    fn out_of_range_results_are_clamped() {
        let binding = binding(
            r#"axis = 0
control_change = 7
value_at_min = -50.0
value_at_max = 300.0"#,
        )
        .unwrap();
        assert_eq!(binding.value_for(-1.0), Some(0));
        assert_eq!(binding.value_for(1.0), Some(127));
    }

    #[test]
    fn target_must_be_unique() {
        assert!(matches!(
            binding(r#"axis = 0
control_change = 1
pitch_bend = true"#),
            Err(LoadError::InvalidBinding { .. })
        ));
        assert!(matches!(
            binding(r#"axis = 0"#),
            Err(LoadError::InvalidBinding { .. })
        ));
        assert!(matches!(
            binding(r#"axis = 0
param = "velocity"
curve = -2.0"#),
            Err(LoadError::InvalidBinding { .. })
        ));
    }

    #[test]
    fn gate_follows_predicates() {
        let binding = binding(
            r#"axis = "AXIS_RTHUMBY"
control_change = 1
when = [ { button = "BUTTON_RTHUMB" } ]"#,
        )
        .unwrap();
        let mut snapshot = InputSnapshot::default();
        assert!(!binding.is_open(&snapshot));
        snapshot.set_button(10, true);
        assert!(binding.is_open(&snapshot));
        assert!(binding.applies_in("default"));

        assert!(toml::from_str::<BindingSpec>(
            r#"axis = 0
control_change = 1
when = [ { button = 10, presed = true } ]"#
        )
        .is_err());
        assert!(matches!(
            self::binding(
                r#"axis = 0
control_change = 1
when = [ { axis = 1 } ]"#
            ),
            Err(LoadError::AmbiguousThreshold(context)) if context.starts_with("binding ")
        ));
    }

    #[test]
    fn pitch_bend_is_signed() {
        let binding = binding(r#"axis = "AXIS_LTHUMBX"
pitch_bend = true"#)
        .unwrap();
        assert_eq!(binding.value_for(-1.0), Some(-8192));
        assert_eq!(binding.value_for(1.0), Some(8191));
        assert_eq!(
            binding.event_for(-8192),
            OutputEvent::PitchBend {
                value: -8192,
                channel: None
            }
        );
    }
}

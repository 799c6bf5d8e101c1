//! Chord definitions: predicate conjunctions with activation/deactivation actions

use crate::mapping::action::Action;
use crate::mapping::alias::{AliasTable, InputRef};
use crate::mapping::calibration::CalibrationStore;
use crate::mapping::error::LoadError;
use crate::mapping::input::{HatDirection, InputKind};
use crate::mapping::tracker::InputSnapshot;
use serde::Deserialize;

/// Position of a chord in declaration order
pub type ChordId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdDirection {
    Above,
    Below,
}

/// A single resolved condition of a chord
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Predicate {
    ButtonState {
        button: u32,
        pressed: bool,
    },
    /// Strict comparison against the clamped normalized value
    AxisThreshold {
        axis: u32,
        threshold: f32,
        direction: ThresholdDirection,
    },
    HatDirection {
        hat: u32,
        direction: HatDirection,
    },
}

impl Predicate {
    pub fn holds(&self, snapshot: &InputSnapshot) -> bool {
        match *self {
            Predicate::ButtonState { button, pressed } => snapshot.button(button) == pressed,
            Predicate::AxisThreshold {
                axis,
                threshold,
                direction: ThresholdDirection::Above,
            } => snapshot.axis(axis) > threshold,
            Predicate::AxisThreshold {
                axis,
                threshold,
                direction: ThresholdDirection::Below,
            } => snapshot.axis(axis) < threshold,
            Predicate::HatDirection { hat, direction } => snapshot.hat(hat) == direction,
        }
    }

    pub fn input(&self) -> (InputKind, u32) {
        match *self {
            Predicate::ButtonState { button, .. } => (InputKind::Button, button),
            Predicate::AxisThreshold { axis, .. } => (InputKind::Axis, axis),
            Predicate::HatDirection { hat, .. } => (InputKind::Hat, hat),
        }
    }
}

/// How a chord's latch maps onto its action lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Behavior {
    /// Activation list when the chord starts holding, deactivation list when it stops
    #[default]
    Momentary,
    /// Each rising edge alternates between the activation and deactivation lists
    Toggle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChordDefinition {
    pub id: ChordId,
    pub name: Option<String>,
    /// Only evaluated while this mode is current; `None` means every mode
    pub mode: Option<String>,
    pub behavior: Behavior,
    pub predicates: Vec<Predicate>,
    pub on_activate: Vec<Action>,
    /// `None` marks a momentary chord: release produces no output
    pub on_deactivate: Option<Vec<Action>>,
}

impl ChordDefinition {
    pub fn is_satisfied(&self, snapshot: &InputSnapshot) -> bool {
        self.predicates.iter().all(|predicate| predicate.holds(snapshot))
    }

    pub fn applies_in(&self, mode: &str) -> bool {
        self.mode.as_deref().map_or(true, |own| own == mode)
    }

    pub fn is_momentary(&self) -> bool {
        self.on_deactivate.is_none()
    }

    pub fn label(&self) -> String {
        chord_label(self.id, self.name.as_deref())
    }
}

fn chord_label(id: ChordId, name: Option<&str>) -> String {
    match name {
        Some(name) => format!("#{} '{}'", id, name),
        None => format!("#{}", id),
    }
}

fn default_pressed() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ButtonPredicateSpec {
    pub button: InputRef,
    #[serde(default = "default_pressed")]
    pub pressed: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AxisPredicateSpec {
    pub axis: InputRef,
    #[serde(default)]
    pub above: Option<f32>,
    #[serde(default)]
    pub below: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HatPredicateSpec {
    pub hat: InputRef,
    pub direction: HatDirection,
}

/// Predicate as written in configuration, before alias resolution.
///
/// Each shape rejects keys it does not know, so a mixed or misspelled table
/// matches no variant.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PredicateSpec {
    Button(ButtonPredicateSpec),
    Axis(AxisPredicateSpec),
    Hat(HatPredicateSpec),
}

impl PredicateSpec {
    fn resolve(&self, context: &str, aliases: &AliasTable) -> Result<Predicate, LoadError> {
        Ok(match self {
            PredicateSpec::Button(spec) => Predicate::ButtonState {
                button: aliases.resolve(&spec.button, InputKind::Button)?,
                pressed: spec.pressed,
            },
            PredicateSpec::Axis(spec) => {
                let (threshold, direction) = match (spec.above, spec.below) {
                    (Some(value), None) => (value, ThresholdDirection::Above),
                    (None, Some(value)) => (value, ThresholdDirection::Below),
                    _ => return Err(LoadError::AmbiguousThreshold(context.to_string())),
                };
                if !threshold.is_finite() {
                    return Err(LoadError::InvalidThreshold {
                        context: context.to_string(),
                        value: threshold,
                    });
                }
                Predicate::AxisThreshold {
                    axis: aliases.resolve(&spec.axis, InputKind::Axis)?,
                    threshold,
                    direction,
                }
            }
            PredicateSpec::Hat(spec) => Predicate::HatDirection {
                hat: aliases.resolve(&spec.hat, InputKind::Hat)?,
                direction: spec.direction,
            },
        })
    }
}

/// Resolves a predicate list and checks every input it reads is calibrated.
///
/// `context` names the owner in errors, e.g. `chord #2 'play I'`.
pub fn resolve_predicates(
    specs: &[PredicateSpec],
    context: &str,
    aliases: &AliasTable,
    calibration: &CalibrationStore,
) -> Result<Vec<Predicate>, LoadError> {
    let mut predicates = Vec::with_capacity(specs.len());
    for spec in specs {
        let predicate = spec.resolve(context, aliases)?;
        let (kind, index) = predicate.input();
        if !calibration.covers(kind, index) {
            return Err(LoadError::MissingCalibration {
                kind,
                index,
                context: context.to_string(),
            });
        }
        predicates.push(predicate);
    }
    Ok(predicates)
}

/// Chord as written in configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChordSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub behavior: Behavior,
    pub when: Vec<PredicateSpec>,
    #[serde(default)]
    pub on_activate: Vec<Action>,
    #[serde(default)]
    pub on_deactivate: Option<Vec<Action>>,
}

impl ChordSpec {
    /// Resolves aliases and validates the chord against the calibration
    pub fn resolve(
        &self,
        id: ChordId,
        aliases: &AliasTable,
        calibration: &CalibrationStore,
    ) -> Result<ChordDefinition, LoadError> {
        let label = chord_label(id, self.name.as_deref());
        let context = format!("chord {}", label);

        if self.when.is_empty() {
            return Err(LoadError::EmptyChord(label));
        }
        let predicates = resolve_predicates(&self.when, &context, aliases, calibration)?;

        let actions = self
            .on_activate
            .iter()
            .chain(self.on_deactivate.iter().flatten());
        for action in actions {
            action.validate().map_err(|reason| LoadError::InvalidAction {
                context: context.clone(),
                reason,
            })?;
        }

        Ok(ChordDefinition {
            id,
            name: self.name.clone(),
            mode: self.mode.clone(),
            behavior: self.behavior,
            predicates,
            on_activate: self.on_activate.clone(),
            on_deactivate: self.on_deactivate.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::action::OutputEvent;
    use crate::mapping::calibration::AxisCalibration;

    fn spec(text: &str) -> ChordSpec {
        toml::from_str(text).unwrap()
    }

    #[test]
    fn resolves_all_predicate_kinds() {
        let chord = spec(
            r#"
            name = "play I"
            when = [
                { hat = "HAT_DPAD", direction = "N" },
                { button = "BUTTON_A" },
                { button = 5, pressed = false },
                { axis = "AXIS_RTRIGGER", above = 0.5 },
                { axis = 1, below = -0.25 },
            ]
            on_activate = [ { emit = "play_scale_degree", degree = 0 } ]
            "#,
        )
        .resolve(3, &AliasTable::with_defaults(), &CalibrationStore::with_defaults())
        .unwrap();

        assert_eq!(chord.id, 3);
        assert_eq!(chord.label(), "#3 'play I'");
        assert!(chord.is_momentary());
        assert_eq!(
            chord.predicates,
            vec![
                Predicate::HatDirection {
                    hat: 0,
                    direction: HatDirection::N
                },
                Predicate::ButtonState {
                    button: 0,
                    pressed: true
                },
                Predicate::ButtonState {
                    button: 5,
                    pressed: false
                },
                Predicate::AxisThreshold {
                    axis: 4,
                    threshold: 0.5,
                    direction: ThresholdDirection::Above
                },
                Predicate::AxisThreshold {
                    axis: 1,
                    threshold: -0.25,
                    direction: ThresholdDirection::Below
                },
            ]
        );
        assert_eq!(
            chord.on_activate,
            vec![Action::EmitOutput(OutputEvent::PlayScaleDegree { degree: 0 })]
        );
    }

    #[test]
    fn empty_chord_is_rejected() {
        let result = spec("when = []").resolve(
            0,
            &AliasTable::with_defaults(),
            &CalibrationStore::with_defaults(),
        );
        assert_eq!(result, Err(LoadError::EmptyChord("#0".into())));
    }

    #[test]
    fn axis_without_calibration_is_rejected() {
        let mut calibration = CalibrationStore::empty();
        calibration.set_axis(0, AxisCalibration::default()).unwrap();
        let result = spec(r#"when = [ { axis = "AXIS_RTRIGGER", above = 0.5 } ]"#).resolve(
            0,
            &AliasTable::with_defaults(),
            &calibration,
        );
        assert!(matches!(
            result,
            Err(LoadError::MissingCalibration {
                kind: InputKind::Axis,
                index: 4,
                ..
            })
        ));
    }

    #[test]
    fn axis_needs_exactly_one_threshold() {
        let aliases = AliasTable::with_defaults();
        let calibration = CalibrationStore::with_defaults();
        let both = spec(r#"when = [ { axis = 0, above = 0.5, below = -0.5 } ]"#);
        assert_eq!(
            both.resolve(0, &aliases, &calibration),
            Err(LoadError::AmbiguousThreshold("chord #0".into()))
        );
        let neither = spec(r#"when = [ { axis = 0 } ]"#);
        assert_eq!(
            neither.resolve(0, &aliases, &calibration),
            Err(LoadError::AmbiguousThreshold("chord #0".into()))
        );
    }

    #[test]
    fn misspelled_keys_do_not_parse() {
        let parse = |text: &str| toml::from_str::<ChordSpec>(text);
        assert!(parse(r#"when = [ { button = "BUTTON_A", presed = false } ]"#).is_err());
        assert!(parse(
            r#"
            when = [ { button = "BUTTON_A" } ]
            on_deactvate = [ { emit = "release" } ]
            "#
        )
        .is_err());
        assert!(parse(r#"when = [ { hat = "HAT_DPAD", direction = "N", button = 0 } ]"#).is_err());
        assert!(parse(r#"when = [ { axis = 0, abov = 0.5 } ]"#).is_err());
        assert!(parse("behavior = \"sticky\"\nwhen = [ { button = 0 } ]").is_err());
    }

    #[test]
    fn mode_and_behavior_are_carried() {
        let chord = spec(
            r#"
            mode = "keys"
            behavior = "toggle"
            when = [ { button = "BUTTON_Y" } ]
            on_activate = [ { emit = "set", param = "extension", value = 2 } ]
            on_deactivate = [ { emit = "set", param = "extension", value = 0 } ]
            "#,
        )
        .resolve(0, &AliasTable::with_defaults(), &CalibrationStore::with_defaults())
        .unwrap();
        assert_eq!(chord.behavior, Behavior::Toggle);
        assert!(chord.applies_in("keys"));
        assert!(!chord.applies_in("default"));

        let global = spec(r#"when = [ { button = 0 } ]"#)
            .resolve(1, &AliasTable::with_defaults(), &CalibrationStore::with_defaults())
            .unwrap();
        assert_eq!(global.behavior, Behavior::Momentary);
        assert!(global.applies_in("keys") && global.applies_in("default"));
    }

    #[test]
    fn out_of_range_action_is_rejected() {
        let result = spec(
            r#"
            when = [ { button = 0 } ]
            on_deactivate = [ { emit = "note_off", note = 200 } ]
            "#,
        );
        // 200 fits a u8, so parsing succeeds and validation catches it
        assert!(matches!(
            result.resolve(0, &AliasTable::with_defaults(), &CalibrationStore::with_defaults()),
            Err(LoadError::InvalidAction { .. })
        ));
    }
}

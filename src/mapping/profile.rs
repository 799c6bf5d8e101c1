//! Validated, immutable mapping profile
//!
//! `ProfileDefinition` is the format-agnostic input (it derives `Deserialize`
//! but knows nothing about files). `Profile::build` resolves every alias,
//! checks calibration coverage and rejects anything that would be undefined
//! at runtime. Unknown keys anywhere in the definition are parse errors.

use crate::mapping::action::Action;
use crate::mapping::alias::AliasTable;
use crate::mapping::binding::{BindingSpec, ValueBinding};
use crate::mapping::calibration::{AxisCalibration, CalibrationStore, HatCalibration};
use crate::mapping::chord::{ChordDefinition, ChordSpec};
use crate::mapping::error::LoadError;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Mode the engine starts in
pub const DEFAULT_MODE: &str = "default";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileDefinition {
    /// Alias name → index; the built-in Xbox layout when absent
    #[serde(default)]
    pub constants: Option<BTreeMap<String, u32>>,
    #[serde(default)]
    pub axis_calibration: Option<BTreeMap<String, AxisCalibration>>,
    #[serde(default)]
    pub hat_calibration: Option<BTreeMap<String, HatCalibration>>,
    #[serde(default)]
    pub mappings: Vec<ChordSpec>,
    #[serde(default)]
    pub bindings: Vec<BindingSpec>,
    #[serde(default)]
    pub startup: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    aliases: AliasTable,
    calibration: CalibrationStore,
    chords: Vec<ChordDefinition>,
    bindings: Vec<ValueBinding>,
    startup: Vec<Action>,
    modes: BTreeSet<String>,
}

impl Profile {
    pub fn build(definition: &ProfileDefinition) -> Result<Self, LoadError> {
        let aliases = match &definition.constants {
            Some(constants) => {
                AliasTable::from_entries(constants.iter().map(|(name, index)| (name.clone(), *index)))?
            }
            None => AliasTable::with_defaults(),
        };

        let calibration = CalibrationStore::build(
            &aliases,
            definition.axis_calibration.as_ref(),
            definition.hat_calibration.as_ref(),
        )?;

        let chords = definition
            .mappings
            .iter()
            .enumerate()
            .map(|(id, spec)| spec.resolve(id, &aliases, &calibration))
            .collect::<Result<Vec<_>, _>>()?;

        let bindings = definition
            .bindings
            .iter()
            .enumerate()
            .map(|(position, spec)| spec.resolve(position, &aliases, &calibration))
            .collect::<Result<Vec<_>, _>>()?;

        for action in &definition.startup {
            action.validate().map_err(|reason| LoadError::InvalidAction {
                context: "startup".to_string(),
                reason,
            })?;
        }

        let modes: BTreeSet<String> = std::iter::once(DEFAULT_MODE.to_string())
            .chain(chords.iter().filter_map(|chord| chord.mode.clone()))
            .chain(bindings.iter().filter_map(|binding| binding.mode.clone()))
            .collect();
        check_mode_switches(&modes, "startup", &definition.startup)?;
        for chord in &chords {
            let actions = chord.on_activate.iter().chain(chord.on_deactivate.iter().flatten());
            check_mode_switches(&modes, &format!("chord {}", chord.label()), actions)?;
        }

        debug!(
            "Profile built: {} aliases, {} chords, {} bindings, {} startup actions, modes {:?}",
            aliases.len(),
            chords.len(),
            bindings.len(),
            definition.startup.len(),
            modes
        );

        Ok(Self {
            aliases,
            calibration,
            chords,
            bindings,
            startup: definition.startup.clone(),
            modes,
        })
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn calibration(&self) -> &CalibrationStore {
        &self.calibration
    }

    pub fn chords(&self) -> &[ChordDefinition] {
        &self.chords
    }

    pub fn bindings(&self) -> &[ValueBinding] {
        &self.bindings
    }

    pub fn startup(&self) -> &[Action] {
        &self.startup
    }

    /// `default` plus every mode a chord or binding is scoped to
    pub fn modes(&self) -> impl Iterator<Item = &str> {
        self.modes.iter().map(String::as_str)
    }
}

fn check_mode_switches<'a>(
    modes: &BTreeSet<String>,
    context: &str,
    actions: impl IntoIterator<Item = &'a Action>,
) -> Result<(), LoadError> {
    for mode in actions.into_iter().filter_map(Action::requested_mode) {
        if !modes.contains(mode) {
            return Err(LoadError::UnknownMode {
                mode: mode.to_string(),
                context: context.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::input::InputKind;

    fn build(text: &str) -> Result<Profile, LoadError> {
        Profile::build(&toml::from_str(text).unwrap())
    }

    #[test]
    fn empty_definition_uses_defaults() {
        let profile = build("").unwrap();
        assert_eq!(profile.aliases(), &AliasTable::with_defaults());
        assert!(profile.calibration().axis(4).is_some());
        assert!(profile.chords().is_empty());
    }

    #[test]
    fn custom_constants_replace_defaults() {
        let profile = build(
            r#"
            [constants]
            BUTTON_TRIANGLE = 3
            HAT_POV = 1

            [[mappings]]
            when = [ { button = "BUTTON_TRIANGLE" }, { hat = "HAT_POV", direction = "S" } ]
            "#,
        )
        .unwrap();
        assert_eq!(profile.aliases().len(), 2);
        assert_eq!(profile.chords()[0].predicates[0].input(), (InputKind::Button, 3));

        assert_eq!(
            build(
                r#"
                [constants]
                BUTTON_TRIANGLE = 3

                [[mappings]]
                when = [ { button = "BUTTON_A" } ]
                "#
            ),
            Err(LoadError::UndefinedAlias("BUTTON_A".into()))
        );
    }

    #[test]
    fn hat_without_calibration_is_rejected() {
        let result = build(
            r#"
            [hat_calibration]
            1 = { easy_diagonals = false }

            [[mappings]]
            when = [ { hat = "HAT_DPAD", direction = "N" } ]
            "#,
        );
        assert!(matches!(
            result,
            Err(LoadError::MissingCalibration {
                kind: InputKind::Hat,
                index: 0,
                ..
            })
        ));
    }

    #[test]
    fn misspelled_top_level_table_does_not_parse() {
        let result = toml::from_str::<ProfileDefinition>(
            r#"
            [[mapings]]
            when = [ { button = "BUTTON_A" } ]
            "#,
        );
        assert!(result.is_err());
        assert!(toml::from_str::<ProfileDefinition>(
            r#"
            [axis_calibration]
            default = { min = -1.0, max = 1.0, mid = 0.0 }
            "#
        )
        .is_err());
        assert!(toml::from_str::<ProfileDefinition>(
            r#"
            [hat_calibration]
            default = { easy_diagonal = true }
            "#
        )
        .is_err());
    }

    #[test]
    fn modes_are_collected_and_switches_checked() {
        let profile = build(
            r#"
            startup = [ { mode = "keys" } ]

            [[mappings]]
            mode = "keys"
            when = [ { button = "BUTTON_X" } ]
            on_activate = [ { mode = "default" } ]

            [[bindings]]
            mode = "bend"
            axis = "AXIS_LTHUMBX"
            pitch_bend = true
            "#,
        )
        .unwrap();
        assert_eq!(profile.modes().collect::<Vec<_>>(), vec!["bend", "default", "keys"]);

        assert_eq!(
            build(
                r#"
                [[mappings]]
                when = [ { button = "BUTTON_X" } ]
                on_activate = [ { mode = "kyes" } ]
                "#
            ),
            Err(LoadError::UnknownMode {
                mode: "kyes".into(),
                context: "chord #0".into()
            })
        );
        assert!(matches!(
            build(r#"startup = [ { mode = "nowhere" } ]"#),
            Err(LoadError::UnknownMode { .. })
        ));
    }

    #[test]
    fn invalid_startup_action_is_rejected() {
        let result = build(r#"startup = [ { emit = "set_next_tonic", degree = 9 } ]"#);
        assert!(matches!(result, Err(LoadError::InvalidAction { .. })));
    }
}

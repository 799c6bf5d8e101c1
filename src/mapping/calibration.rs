//! Per-axis and per-hat calibration with `default` fallback

use crate::mapping::alias::{AliasTable, InputRef};
use crate::mapping::error::LoadError;
use crate::mapping::input::InputKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key naming the fallback entry in calibration tables
pub const DEFAULT_KEY: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AxisCalibration {
    pub min: f32,
    pub max: f32,
}

impl Default for AxisCalibration {
    fn default() -> Self {
        Self {
            min: -1.0,
            max: 1.0,
        }
    }
}

impl AxisCalibration {
    /// Maps a raw reading onto [-1, 1], clamping over-travel; NaN reads as centered
    pub fn normalize(&self, raw: f32) -> f32 {
        let value = 2.0 * (raw - self.min) / (self.max - self.min) - 1.0;
        if value.is_nan() {
            return 0.0;
        }
        value.clamp(-1.0, 1.0)
    }

    fn validate(&self, key: &str) -> Result<(), LoadError> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(LoadError::NonFiniteCalibration {
                key: key.to_string(),
            });
        }
        if self.min == self.max {
            return Err(LoadError::DegenerateCalibration {
                key: key.to_string(),
                value: self.min,
            });
        }
        Ok(())
    }
}

fn default_easy_diagonals() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HatCalibration {
    #[serde(default = "default_easy_diagonals")]
    pub easy_diagonals: bool,
}

impl Default for HatCalibration {
    fn default() -> Self {
        Self {
            easy_diagonals: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationStore {
    axis_default: Option<AxisCalibration>,
    axes: BTreeMap<u32, AxisCalibration>,
    hat_default: Option<HatCalibration>,
    hats: BTreeMap<u32, HatCalibration>,
}

/// Where a calibration entry applies
enum CalibrationKey {
    Default,
    Index(u32),
}

impl CalibrationKey {
    fn parse(key: &str, aliases: &AliasTable, kind: InputKind) -> Result<Self, LoadError> {
        if key == DEFAULT_KEY {
            return Ok(CalibrationKey::Default);
        }
        let reference = match key.parse::<u32>() {
            Ok(index) => InputRef::Index(index),
            Err(_) => InputRef::Alias(key.to_string()),
        };
        aliases.resolve(&reference, kind).map(CalibrationKey::Index)
    }
}

impl CalibrationStore {
    /// Store with no entries at all, not even defaults
    pub fn empty() -> Self {
        Self::default()
    }

    /// Store holding only the built-in `default` entries
    pub fn with_defaults() -> Self {
        Self {
            axis_default: Some(AxisCalibration::default()),
            hat_default: Some(HatCalibration::default()),
            ..Self::default()
        }
    }

    /// Builds the store from configuration tables keyed by alias, index or `default`.
    ///
    /// A missing table falls back to the built-in default entry for that kind.
    pub fn build(
        aliases: &AliasTable,
        axis_entries: Option<&BTreeMap<String, AxisCalibration>>,
        hat_entries: Option<&BTreeMap<String, HatCalibration>>,
    ) -> Result<Self, LoadError> {
        let mut store = Self::empty();

        match axis_entries {
            Some(entries) => {
                for (key, calibration) in entries {
                    calibration.validate(key)?;
                    match CalibrationKey::parse(key, aliases, InputKind::Axis)? {
                        CalibrationKey::Default => store.axis_default = Some(*calibration),
                        CalibrationKey::Index(index) => {
                            store.axes.insert(index, *calibration);
                        }
                    }
                }
            }
            None => store.axis_default = Some(AxisCalibration::default()),
        }

        match hat_entries {
            Some(entries) => {
                for (key, calibration) in entries {
                    match CalibrationKey::parse(key, aliases, InputKind::Hat)? {
                        CalibrationKey::Default => store.hat_default = Some(*calibration),
                        CalibrationKey::Index(index) => {
                            store.hats.insert(index, *calibration);
                        }
                    }
                }
            }
            None => store.hat_default = Some(HatCalibration::default()),
        }

        Ok(store)
    }

    pub fn set_axis(&mut self, index: u32, calibration: AxisCalibration) -> Result<(), LoadError> {
        calibration.validate(&index.to_string())?;
        self.axes.insert(index, calibration);
        Ok(())
    }

    pub fn set_axis_default(&mut self, calibration: AxisCalibration) -> Result<(), LoadError> {
        calibration.validate(DEFAULT_KEY)?;
        self.axis_default = Some(calibration);
        Ok(())
    }

    pub fn set_hat(&mut self, index: u32, calibration: HatCalibration) {
        self.hats.insert(index, calibration);
    }

    pub fn set_hat_default(&mut self, calibration: HatCalibration) {
        self.hat_default = Some(calibration);
    }

    /// Explicit entry for the axis, else the default entry
    pub fn axis(&self, index: u32) -> Option<&AxisCalibration> {
        self.axes.get(&index).or(self.axis_default.as_ref())
    }

    pub fn hat(&self, index: u32) -> Option<&HatCalibration> {
        self.hats.get(&index).or(self.hat_default.as_ref())
    }

    pub fn covers(&self, kind: InputKind, index: u32) -> bool {
        match kind {
            InputKind::Button => true,
            InputKind::Axis => self.axis(index).is_some(),
            InputKind::Hat => self.hat(index).is_some(),
        }
    }
}

//! Raw reading → calibrated logical value

use crate::mapping::calibration::CalibrationStore;
use crate::mapping::error::NormalizeError;
use crate::mapping::input::{HatDirection, NormalizedInput, RawInput};
use tracing::trace;

pub struct RawInputNormalizer<'a> {
    calibration: &'a CalibrationStore,
}

impl<'a> RawInputNormalizer<'a> {
    pub fn new(calibration: &'a CalibrationStore) -> Self {
        Self { calibration }
    }

    pub fn normalize(&self, raw: &RawInput) -> Result<NormalizedInput, NormalizeError> {
        match *raw {
            RawInput::Button { index, pressed } => Ok(NormalizedInput::Button { index, pressed }),
            RawInput::Axis { index, value } => {
                let calibration = self
                    .calibration
                    .axis(index)
                    .ok_or(NormalizeError::UncalibratedAxis(index))?;
                if !value.is_finite() {
                    return Err(NormalizeError::NonFiniteAxis(index));
                }
                let normalized = calibration.normalize(value);
                let low = calibration.min.min(calibration.max);
                let high = calibration.min.max(calibration.max);
                if value < low || value > high {
                    trace!("Axis {} clamped: raw {} -> {}", index, value, normalized);
                }
                Ok(NormalizedInput::Axis {
                    index,
                    value: normalized,
                })
            }
            RawInput::Hat { index, x, y } => {
                if self.calibration.hat(index).is_none() {
                    return Err(NormalizeError::UncalibratedHat(index));
                }
                Ok(NormalizedInput::Hat {
                    index,
                    direction: HatDirection::from_vector(x as i32, y as i32),
                })
            }
        }
    }
}

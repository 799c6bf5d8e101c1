//! Input vocabulary shared by the collector and the chord engine
//!
//! Raw events are what a device reports; normalized inputs are what the
//! chord tracker works with after calibration.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a logical input, resolved once when the alias table is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InputKind {
    Button,
    Axis,
    Hat,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputKind::Button => write!(f, "button"),
            InputKind::Axis => write!(f, "axis"),
            InputKind::Hat => write!(f, "hat"),
        }
    }
}

/// Canonical POV hat direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HatDirection {
    #[default]
    #[serde(alias = "neutral", alias = "NEUTRAL")]
    Neutral,
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl HatDirection {
    /// Maps an SDL-style hat vector (+x = east, +y = north) to a direction.
    ///
    /// Only the sign of each component is considered.
    pub fn from_vector(x: i32, y: i32) -> Self {
        match (x.signum(), y.signum()) {
            (0, 0) => HatDirection::Neutral,
            (0, 1) => HatDirection::N,
            (1, 1) => HatDirection::NE,
            (1, 0) => HatDirection::E,
            (1, -1) => HatDirection::SE,
            (0, -1) => HatDirection::S,
            (-1, -1) => HatDirection::SW,
            (-1, 0) => HatDirection::W,
            _ => HatDirection::NW,
        }
    }

    pub fn vector(self) -> (i32, i32) {
        match self {
            HatDirection::Neutral => (0, 0),
            HatDirection::N => (0, 1),
            HatDirection::NE => (1, 1),
            HatDirection::E => (1, 0),
            HatDirection::SE => (1, -1),
            HatDirection::S => (0, -1),
            HatDirection::SW => (-1, -1),
            HatDirection::W => (-1, 0),
            HatDirection::NW => (-1, 1),
        }
    }

    pub fn is_neutral(self) -> bool {
        self == HatDirection::Neutral
    }

    pub fn is_cardinal(self) -> bool {
        let (x, y) = self.vector();
        (x != 0) ^ (y != 0)
    }

    pub fn is_diagonal(self) -> bool {
        let (x, y) = self.vector();
        x != 0 && y != 0
    }

    /// True for a cardinal/diagonal pair one step apart (e.g. N and NE).
    ///
    /// Equal directions and anything involving Neutral are never adjacent.
    pub fn is_adjacent_to(self, other: HatDirection) -> bool {
        if self.is_neutral() || other.is_neutral() {
            return false;
        }
        let (ax, ay) = self.vector();
        let (bx, by) = other.vector();
        let dx = (ax - bx).abs();
        let dy = (ay - by).abs();
        dx.min(dy) == 0 && dx.max(dy) == 1
    }
}

impl fmt::Display for HatDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A single reading as reported by the device layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawInput {
    Button { index: u32, pressed: bool },
    Axis { index: u32, value: f32 },
    /// Hat vector in SDL encoding, each component in {-1, 0, 1}
    Hat { index: u32, x: i8, y: i8 },
}

impl RawInput {
    pub fn kind(&self) -> InputKind {
        match self {
            RawInput::Button { .. } => InputKind::Button,
            RawInput::Axis { .. } => InputKind::Axis,
            RawInput::Hat { .. } => InputKind::Hat,
        }
    }

    pub fn index(&self) -> u32 {
        match self {
            RawInput::Button { index, .. }
            | RawInput::Axis { index, .. }
            | RawInput::Hat { index, .. } => *index,
        }
    }
}

// Raw input with the local time it was collected
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawInputEvent {
    pub input: RawInput,
    pub timestamp: DateTime<Local>,
}

impl RawInputEvent {
    pub fn new(input: RawInput) -> Self {
        Self {
            input,
            timestamp: Local::now(),
        }
    }

    pub fn button(index: u32, pressed: bool) -> Self {
        Self::new(RawInput::Button { index, pressed })
    }

    pub fn axis(index: u32, value: f32) -> Self {
        Self::new(RawInput::Axis { index, value })
    }

    pub fn hat(index: u32, direction: HatDirection) -> Self {
        let (x, y) = direction.vector();
        Self::new(RawInput::Hat {
            index,
            x: x as i8,
            y: y as i8,
        })
    }
}

/// Calibrated logical value produced by the normalizer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NormalizedInput {
    Button { index: u32, pressed: bool },
    /// Value in [-1, 1]
    Axis { index: u32, value: f32 },
    Hat { index: u32, direction: HatDirection },
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [HatDirection; 9] = [
        HatDirection::Neutral,
        HatDirection::N,
        HatDirection::NE,
        HatDirection::E,
        HatDirection::SE,
        HatDirection::S,
        HatDirection::SW,
        HatDirection::W,
        HatDirection::NW,
    ];

    #[test]
    fn vector_encoding_is_reversible() {
        for direction in ALL {
            let (x, y) = direction.vector();
            assert_eq!(HatDirection::from_vector(x, y), direction);
        }
        assert_eq!(HatDirection::from_vector(5, -3), HatDirection::SE);
    }

    #[test]
    fn cardinal_and_diagonal_partition_non_neutral() {
        for direction in ALL {
            if direction.is_neutral() {
                assert!(!direction.is_cardinal() && !direction.is_diagonal());
            } else {
                assert!(direction.is_cardinal() ^ direction.is_diagonal());
            }
        }
    }

    #[test]
    fn adjacency_matches_cardinal_diagonal_pairs() {
        use HatDirection::*;
        let pairs = [(N, NE), (N, NW), (E, NE), (E, SE), (S, SE), (S, SW), (W, NW), (W, SW)];
        for (a, b) in pairs {
            assert!(a.is_adjacent_to(b), "{a} should touch {b}");
            assert!(b.is_adjacent_to(a), "{b} should touch {a}");
        }

        assert!(!N.is_adjacent_to(N));
        assert!(!N.is_adjacent_to(E));
        assert!(!N.is_adjacent_to(S));
        assert!(!NE.is_adjacent_to(SE));
        assert!(!NE.is_adjacent_to(NW));
        assert!(!N.is_adjacent_to(SE));
        assert!(!Neutral.is_adjacent_to(N));
    }
}

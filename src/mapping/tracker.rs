//! Chord tracker: the per-controller state machine
//!
//! ```text
//! NormalizedInput ──► InputSnapshot ──► [DiagonalSuppression] ──► evaluate chords
//!                                                                     │
//!                                   ActiveChordSet (latches) ◄────────┘
//!                                          │
//!                                          ▼
//!                              Vec<Transition> (declaration order)
//! ```
//!
//! All state here is owned by a single tracker and mutated once per event.
//! Only chords scoped to the current mode (or to no mode) are evaluated.

use crate::mapping::chord::{Behavior, ChordId};
use crate::mapping::input::{HatDirection, NormalizedInput};
use crate::mapping::profile::{Profile, DEFAULT_MODE};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Current logical value of every input seen so far
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSnapshot {
    buttons: BTreeMap<u32, bool>,
    axes: BTreeMap<u32, f32>,
    hats: BTreeMap<u32, HatDirection>,
}

impl InputSnapshot {
    pub fn button(&self, index: u32) -> bool {
        self.buttons.get(&index).copied().unwrap_or(false)
    }

    pub fn axis(&self, index: u32) -> f32 {
        self.axes.get(&index).copied().unwrap_or(0.0)
    }

    pub fn hat(&self, index: u32) -> HatDirection {
        self.hats.get(&index).copied().unwrap_or_default()
    }

    pub fn set_button(&mut self, index: u32, pressed: bool) {
        self.buttons.insert(index, pressed);
    }

    pub fn set_axis(&mut self, index: u32, value: f32) {
        self.axes.insert(index, value);
    }

    pub fn set_hat(&mut self, index: u32, direction: HatDirection) {
        self.hats.insert(index, direction);
    }
}

/// Per-hat last acknowledged direction for easy-diagonal filtering
#[derive(Debug, Clone, Default)]
pub struct DiagonalSuppression {
    acknowledged: BTreeMap<u32, HatDirection>,
}

impl DiagonalSuppression {
    pub fn acknowledged(&self, hat: u32) -> HatDirection {
        self.acknowledged.get(&hat).copied().unwrap_or_default()
    }

    /// Returns the direction to expose, or `None` when the reading is suppressed.
    ///
    /// A cardinal reading adjacent to an acknowledged diagonal is the tail of
    /// a sloppy diagonal release and is ignored until the hat passes through
    /// Neutral or lands somewhere non-adjacent.
    pub fn filter(
        &mut self,
        hat: u32,
        reading: HatDirection,
        easy_diagonals: bool,
    ) -> Option<HatDirection> {
        let previous = self.acknowledged(hat);
        if easy_diagonals
            && reading.is_cardinal()
            && previous.is_diagonal()
            && reading.is_adjacent_to(previous)
        {
            debug!(
                "Hat {} reading {} suppressed, holding {}",
                hat, reading, previous
            );
            return None;
        }
        self.acknowledged.insert(hat, reading);
        Some(reading)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    Activate,
    Deactivate,
}

/// A chord latch flipping in one direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Transition {
    pub chord: ChordId,
    pub edge: Edge,
}

pub struct ChordTracker {
    profile: Arc<Profile>,
    snapshot: InputSnapshot,
    suppression: DiagonalSuppression,
    mode: String,
    /// ActiveChordSet indexed by chord id
    active: Vec<bool>,
    /// Chords that already held when their mode was entered; they wait for a release
    held_over: Vec<bool>,
    /// On/off state of toggle chords, kept across mode switches
    toggled: Vec<bool>,
}

impl ChordTracker {
    pub fn new(profile: Arc<Profile>) -> Self {
        let count = profile.chords().len();
        Self {
            profile,
            snapshot: InputSnapshot::default(),
            suppression: DiagonalSuppression::default(),
            mode: DEFAULT_MODE.to_string(),
            active: vec![false; count],
            held_over: vec![false; count],
            toggled: vec![false; count],
        }
    }

    pub fn mode(&self) -> &str {
        &self.mode
    }

    /// Makes `mode` current and returns the deactivations of chords it leaves behind.
    ///
    /// Chords of the new mode whose predicates already hold do not fire until
    /// they are released and satisfied again.
    pub fn set_mode(&mut self, mode: &str) -> Vec<Transition> {
        if self.mode == mode {
            return Vec::new();
        }
        debug!("Mode {} -> {}", self.mode, mode);
        self.mode = mode.to_string();

        let mut transitions = Vec::new();
        for chord in self.profile.chords() {
            let id = chord.id;
            let in_mode = chord.applies_in(&self.mode);
            if self.active[id] && !in_mode {
                self.active[id] = false;
                if chord.behavior == Behavior::Momentary {
                    debug!("Chord {} Deactivate (mode left)", chord.label());
                    transitions.push(Transition {
                        chord: id,
                        edge: Edge::Deactivate,
                    });
                }
            } else if !self.active[id] && in_mode && chord.is_satisfied(&self.snapshot) {
                self.held_over[id] = true;
            }
        }
        transitions
    }

    /// Applies one normalized input and returns the resulting transitions
    pub fn update(&mut self, input: &NormalizedInput) -> Vec<Transition> {
        match *input {
            NormalizedInput::Button { index, pressed } => self.snapshot.set_button(index, pressed),
            NormalizedInput::Axis { index, value } => self.snapshot.set_axis(index, value),
            NormalizedInput::Hat { index, direction } => {
                let easy_diagonals = self
                    .profile
                    .calibration()
                    .hat(index)
                    .map(|calibration| calibration.easy_diagonals)
                    .unwrap_or(false);
                match self.suppression.filter(index, direction, easy_diagonals) {
                    Some(acknowledged) => self.snapshot.set_hat(index, acknowledged),
                    None => return Vec::new(),
                }
            }
        }
        self.evaluate()
    }

    fn evaluate(&mut self) -> Vec<Transition> {
        let mut transitions = Vec::new();
        for chord in self.profile.chords() {
            let id = chord.id;
            let now = chord.applies_in(&self.mode) && chord.is_satisfied(&self.snapshot);
            if self.held_over[id] {
                if now {
                    continue;
                }
                self.held_over[id] = false;
            }
            let latch = &mut self.active[id];
            if now == *latch {
                continue;
            }
            *latch = now;
            let edge = match (chord.behavior, now) {
                (Behavior::Momentary, true) => Edge::Activate,
                (Behavior::Momentary, false) => Edge::Deactivate,
                (Behavior::Toggle, true) => {
                    let on = &mut self.toggled[id];
                    *on = !*on;
                    if *on {
                        Edge::Activate
                    } else {
                        Edge::Deactivate
                    }
                }
                (Behavior::Toggle, false) => continue,
            };
            debug!("Chord {} {:?}", chord.label(), edge);
            transitions.push(Transition {
                chord: chord.id,
                edge,
            });
        }
        transitions
    }

    pub fn snapshot(&self) -> &InputSnapshot {
        &self.snapshot
    }

    pub fn acknowledged_hat(&self, hat: u32) -> HatDirection {
        self.suppression.acknowledged(hat)
    }

    pub fn is_active(&self, chord: ChordId) -> bool {
        self.active.get(chord).copied().unwrap_or(false)
    }

    /// Whether a toggle chord is currently switched on
    pub fn is_toggled(&self, chord: ChordId) -> bool {
        self.toggled.get(chord).copied().unwrap_or(false)
    }

    pub fn active_chords(&self) -> impl Iterator<Item = ChordId> + '_ {
        self.active
            .iter()
            .enumerate()
            .filter(|(_, active)| **active)
            .map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::profile::ProfileDefinition;

    fn tracker(text: &str) -> ChordTracker {
        let definition: ProfileDefinition = toml::from_str(text).unwrap();
        ChordTracker::new(Arc::new(Profile::build(&definition).unwrap()))
    }

    fn hat(direction: HatDirection) -> NormalizedInput {
        NormalizedInput::Hat {
            index: 0,
            direction,
        }
    }

    const EAST_CHORD: &str = r#"
        [[mappings]]
        when = [ { hat = "HAT_DPAD", direction = "E" } ]
    "#;

    #[test]
    fn suppressed_cardinal_never_activates() {
        let mut tracker = tracker(EAST_CHORD);
        let mut transitions = Vec::new();
        for direction in [HatDirection::Neutral, HatDirection::NE, HatDirection::E] {
            transitions.extend(tracker.update(&hat(direction)));
        }
        assert!(transitions.is_empty());
        assert!(!tracker.is_active(0));
        assert_eq!(tracker.acknowledged_hat(0), HatDirection::NE);
        assert_eq!(tracker.snapshot().hat(0), HatDirection::NE);
    }

    #[test]
    fn neutral_lifts_suppression() {
        let mut tracker = tracker(EAST_CHORD);
        let mut transitions = Vec::new();
        for direction in [
            HatDirection::Neutral,
            HatDirection::NE,
            HatDirection::Neutral,
            HatDirection::E,
        ] {
            transitions.extend(tracker.update(&hat(direction)));
        }
        assert_eq!(
            transitions,
            vec![Transition {
                chord: 0,
                edge: Edge::Activate
            }]
        );
    }

    #[test]
    fn non_adjacent_move_lifts_suppression() {
        let mut tracker = tracker(EAST_CHORD);
        tracker.update(&hat(HatDirection::NW));
        assert!(tracker.update(&hat(HatDirection::E)).len() == 1);
        assert!(tracker.is_active(0));
    }

    #[test]
    fn suppression_disabled_exposes_every_reading() {
        let mut tracker = tracker(&format!(
            "{}\n[hat_calibration]\ndefault = {{ easy_diagonals = false }}",
            EAST_CHORD
        ));
        tracker.update(&hat(HatDirection::NE));
        assert_eq!(tracker.update(&hat(HatDirection::E)).len(), 1);
    }

    #[test]
    fn held_chord_fires_once() {
        let mut tracker = tracker(
            r#"
            [[mappings]]
            when = [ { button = "BUTTON_A" } ]
            "#,
        );
        let press = NormalizedInput::Button {
            index: 0,
            pressed: true,
        };
        assert_eq!(tracker.update(&press).len(), 1);
        for _ in 0..5 {
            assert!(tracker.update(&press).is_empty());
        }
        let release = NormalizedInput::Button {
            index: 0,
            pressed: false,
        };
        assert_eq!(
            tracker.update(&release),
            vec![Transition {
                chord: 0,
                edge: Edge::Deactivate
            }]
        );
    }

    #[test]
    fn overlapping_chords_latch_independently() {
        let mut tracker = tracker(
            r#"
            [[mappings]]
            when = [ { button = "BUTTON_A" } ]

            [[mappings]]
            when = [ { button = "BUTTON_A" }, { button = "BUTTON_B" } ]
            "#,
        );
        let button = |index, pressed| NormalizedInput::Button { index, pressed };

        assert_eq!(tracker.update(&button(0, true)).len(), 1);
        assert_eq!(
            tracker.update(&button(1, true)),
            vec![Transition {
                chord: 1,
                edge: Edge::Activate
            }]
        );
        assert_eq!(
            tracker.update(&button(1, false)),
            vec![Transition {
                chord: 1,
                edge: Edge::Deactivate
            }]
        );
        assert!(tracker.is_active(0));
        assert_eq!(tracker.active_chords().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn axis_threshold_uses_clamped_value() {
        let mut tracker = tracker(
            r#"
            [[mappings]]
            when = [ { axis = "AXIS_RTHUMBX", above = 0.5 } ]
            "#,
        );
        let axis = |value| NormalizedInput::Axis { index: 2, value };
        assert!(tracker.update(&axis(0.5)).is_empty());
        assert_eq!(tracker.update(&axis(0.9)).len(), 1);
        assert!(tracker.update(&axis(1.0)).is_empty());
        assert_eq!(tracker.update(&axis(0.2)).len(), 1);
        assert_eq!(tracker.snapshot().axis(2), 0.2);
        assert_eq!(tracker.snapshot().axis(3), 0.0);
    }

    const MODAL: &str = r#"
        [[mappings]]
        when = [ { button = "BUTTON_A" } ]

        [[mappings]]
        mode = "keys"
        when = [ { button = "BUTTON_A" } ]

        [[mappings]]
        when = [ { button = "BUTTON_B" } ]

        [[mappings]]
        mode = "keys"
        when = [ { button = "BUTTON_X" } ]
        on_activate = [ { mode = "default" } ]
    "#;

    fn button(index: u32, pressed: bool) -> NormalizedInput {
        NormalizedInput::Button { index, pressed }
    }

    #[test]
    fn chords_outside_the_mode_stay_silent() {
        let mut tracker = tracker(MODAL);
        assert_eq!(tracker.mode(), DEFAULT_MODE);
        assert_eq!(
            tracker.update(&button(0, true)),
            vec![Transition {
                chord: 0,
                edge: Edge::Activate
            }]
        );
        assert!(tracker.update(&button(2, true)).is_empty());
        assert!(!tracker.is_active(3));
    }

    #[test]
    fn leaving_a_mode_deactivates_its_chords() {
        let mut tracker = tracker(MODAL);
        tracker.update(&button(0, true));
        tracker.update(&button(1, true));

        // Chords 0 and 2 are global and stay latched; chord 1 already holds and waits
        assert!(tracker.set_mode("keys").is_empty());
        assert!(tracker.is_active(0) && !tracker.is_active(1));
        assert!(tracker.set_mode("keys").is_empty());

        tracker.update(&button(0, false));
        assert_eq!(
            tracker.update(&button(0, true)),
            vec![
                Transition {
                    chord: 0,
                    edge: Edge::Activate
                },
                Transition {
                    chord: 1,
                    edge: Edge::Activate
                },
            ]
        );

        assert_eq!(
            tracker.set_mode(DEFAULT_MODE),
            vec![Transition {
                chord: 1,
                edge: Edge::Deactivate
            }]
        );
        assert!(!tracker.is_active(1));
        assert!(tracker.is_active(0) && tracker.is_active(2));
    }

    #[test]
    fn toggle_chord_alternates_on_each_press() {
        let mut tracker = tracker(
            r#"
            [[mappings]]
            behavior = "toggle"
            when = [ { button = "BUTTON_Y" } ]
            on_activate = [ { emit = "set", param = "extension", value = 2 } ]
            on_deactivate = [ { emit = "set", param = "extension", value = 0 } ]
            "#,
        );
        let press = |tracker: &mut ChordTracker| {
            let mut transitions = tracker.update(&button(3, true));
            transitions.extend(tracker.update(&button(3, false)));
            transitions
        };
        assert_eq!(
            press(&mut tracker),
            vec![Transition {
                chord: 0,
                edge: Edge::Activate
            }]
        );
        assert!(tracker.is_toggled(0));
        assert_eq!(
            press(&mut tracker),
            vec![Transition {
                chord: 0,
                edge: Edge::Deactivate
            }]
        );
        assert!(!tracker.is_toggled(0));
        assert_eq!(press(&mut tracker).len(), 1);
    }
}

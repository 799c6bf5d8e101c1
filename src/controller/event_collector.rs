use crate::mapping::input::{RawInput, RawInputEvent};
use chrono::Local;
use gilrs::{Axis, Button, Event, EventType, Gamepad, GamepadId, Gilrs};
use statum::{machine, state};
use std::fmt::Debug;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Hat index the d-pad is reported on
pub const DPAD_HAT: u32 = 0;

// Collector settings
#[derive(Clone, Debug)]
pub struct CollectorSettings {
    /// Gamepad to track; `None` latches onto the first gamepad that presses a button
    pub controller_index: Option<usize>,
    pub joystick_deadzone: f32,
    pub poll_interval_us: u64,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            controller_index: None,
            joystick_deadzone: 0.05,
            poll_interval_us: 100,
        }
    }
}

// Collector errors
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Failed to initialize collector: {0}")]
    InitializationError(String),

    #[error("Failed to send event: {0}")]
    EventSendError(String),

    #[error("No gamepad connected: {0}")]
    NoGamepadError(String),
}

/// Decides which gamepad's events are forwarded
#[derive(Debug, Clone, PartialEq)]
pub struct GamepadSelection<Id> {
    active: Option<Id>,
}

impl<Id: Copy + PartialEq + Debug> GamepadSelection<Id> {
    pub fn fixed(id: Id) -> Self {
        Self { active: Some(id) }
    }

    pub fn first_press() -> Self {
        Self { active: None }
    }

    pub fn active(&self) -> Option<Id> {
        self.active
    }

    /// True when the event from `id` should be forwarded.
    ///
    /// Without an active gamepad the first button press selects one; every
    /// other event is dropped until then.
    pub fn accepts(&mut self, id: Id, is_button_press: bool) -> bool {
        match self.active {
            Some(active) => active == id,
            None if is_button_press => {
                info!("Using controller {:?}", id);
                self.active = Some(id);
                true
            }
            None => false,
        }
    }
}

/// Folds d-pad buttons or d-pad axes into one hat vector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DpadState {
    up: bool,
    down: bool,
    left: bool,
    right: bool,
}

impl DpadState {
    /// Returns false for buttons that are not part of the d-pad
    pub fn apply_button(&mut self, button: Button, pressed: bool) -> bool {
        match button {
            Button::DPadUp => self.up = pressed,
            Button::DPadDown => self.down = pressed,
            Button::DPadLeft => self.left = pressed,
            Button::DPadRight => self.right = pressed,
            _ => return false,
        }
        true
    }

    pub fn apply_axis(&mut self, axis: Axis, value: f32) -> bool {
        match axis {
            Axis::DPadX => {
                self.right = value > 0.5;
                self.left = value < -0.5;
            }
            Axis::DPadY => {
                self.up = value > 0.5;
                self.down = value < -0.5;
            }
            _ => return false,
        }
        true
    }

    /// (x, y) with +x = right, +y = up
    pub fn vector(&self) -> (i8, i8) {
        (
            self.right as i8 - self.left as i8,
            self.up as i8 - self.down as i8,
        )
    }
}

// Define collector states using statum's state macro
#[state]
#[derive(Debug, Clone)]
pub enum CollectionState {
    Initializing,
    Collecting,
}

#[machine]
pub struct EventCollector<S: CollectionState> {
    gilrs: Gilrs,

    selection: GamepadSelection<GamepadId>,

    settings: CollectorSettings,

    // Channel to the chord engine
    event_sender: mpsc::Sender<RawInputEvent>,

    dpad: DpadState,

    // Last hat vector sent, to drop d-pad repeats
    last_dpad_vector: (i8, i8),
}

impl<S: CollectionState> EventCollector<S> {
    pub fn settings(&self) -> &CollectorSettings {
        &self.settings
    }
}

impl EventCollector<Initializing> {
    pub fn create(
        settings: Option<CollectorSettings>,
        event_sender: mpsc::Sender<RawInputEvent>,
    ) -> Result<Self, CollectorError> {
        let settings = settings.unwrap_or_default();
        debug!("Creating Event Collector with settings: {:?}", settings);

        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(CollectorError::InitializationError(e.to_string()));
            }
        };

        Ok(Self::new(
            gilrs,
            GamepadSelection::first_press(),
            settings,
            event_sender,
            DpadState::default(),
            (0, 0),
        ))
    }

    /// Picks the tracked gamepad and transitions to Collecting
    pub fn initialize(mut self) -> Result<EventCollector<Collecting>, CollectorError> {
        let gamepads: Vec<(GamepadId, Gamepad<'_>)> = self.gilrs.gamepads().collect();

        if gamepads.is_empty() {
            warn!("No gamepad connected, waiting for one");
        } else {
            info!("Found {} gamepads:", gamepads.len());
            for (idx, (id, gamepad)) in gamepads.iter().enumerate() {
                info!("  [{}] ID: {}, Name: {}", idx, id, gamepad.name());
            }
        }

        self.selection = match self.settings.controller_index {
            Some(index) => {
                let (id, gamepad) = gamepads.get(index).ok_or_else(|| {
                    CollectorError::NoGamepadError(format!("no controller at index {}", index))
                })?;
                info!("Selected gamepad: {} ({})", gamepad.name(), id);
                GamepadSelection::fixed(*id)
            }
            None => {
                info!("Press a button on the controller you want to use");
                GamepadSelection::first_press()
            }
        };

        info!("Event Collector initialized, transitioning to Collecting state");
        Ok(self.transition())
    }
}

impl EventCollector<Collecting> {
    /// Drains pending gilrs events; returns the number forwarded
    pub fn collect_pending(&mut self) -> Result<usize, CollectorError> {
        let mut forwarded = 0;
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            let is_press = matches!(event, EventType::ButtonPressed(..));
            if !self.selection.accepts(id, is_press) {
                trace!("Skipping event from non-active gamepad: {:?}", id);
                continue;
            }

            let Some(input) = self.convert_gilrs_event(event) else {
                continue;
            };
            let raw_event = RawInputEvent::new(input);
            debug!(
                "[{}] Captured {:?}",
                raw_event.timestamp.format("%H:%M:%S.%3f"),
                raw_event.input
            );

            // Blocking keeps every event in order; this runs on a blocking thread
            self.event_sender
                .blocking_send(raw_event)
                .map_err(|e| CollectorError::EventSendError(e.to_string()))?;
            forwarded += 1;
        }
        Ok(forwarded)
    }

    /// Polls until `shutdown` fires or the engine side hangs up
    pub fn run_collection_loop(&mut self, shutdown: CancellationToken) -> Result<(), CollectorError> {
        info!("Starting Event Collector loop");

        let mut event_count = 0;
        let mut last_log_time = Local::now();
        let log_interval = chrono::Duration::seconds(10);
        let poll_interval = std::time::Duration::from_micros(self.settings.poll_interval_us);

        while !shutdown.is_cancelled() {
            event_count += self.collect_pending()?;

            let now = Local::now();
            if now - last_log_time > log_interval {
                debug!(
                    "Event Collector stats: {} events in last {} seconds",
                    event_count,
                    log_interval.num_seconds()
                );
                event_count = 0;
                last_log_time = now;
            }

            std::thread::sleep(poll_interval);
        }

        info!("Event Collector loop stopped");
        Ok(())
    }

    fn convert_gilrs_event(&mut self, event: EventType) -> Option<RawInput> {
        match event {
            EventType::ButtonPressed(button, _) => self.convert_button(button, true),
            EventType::ButtonReleased(button, _) => self.convert_button(button, false),
            EventType::ButtonChanged(button, value, _) => trigger_axis(button)
                .map(|index| RawInput::Axis { index, value }),
            EventType::AxisChanged(axis, value, _) => {
                if self.dpad.apply_axis(axis, value) {
                    return self.dpad_hat();
                }
                axis_index(axis).map(|index| {
                    let value = if index <= 3 {
                        apply_deadzone(value, self.settings.joystick_deadzone)
                    } else {
                        value
                    };
                    RawInput::Axis { index, value }
                })
            }
            EventType::Connected => {
                info!("Controller connected event detected");
                None
            }
            EventType::Disconnected => {
                warn!("Controller disconnected event detected");
                None
            }
            _ => {
                trace!("Unhandled event type: {:?}", event);
                None
            }
        }
    }

    fn convert_button(&mut self, button: Button, pressed: bool) -> Option<RawInput> {
        if self.dpad.apply_button(button, pressed) {
            return self.dpad_hat();
        }
        match button_index(button) {
            Some(index) => Some(RawInput::Button { index, pressed }),
            None => {
                trace!("Ignoring unmapped button: {:?}", button);
                None
            }
        }
    }

    fn dpad_hat(&mut self) -> Option<RawInput> {
        let vector = self.dpad.vector();
        if vector == self.last_dpad_vector {
            return None;
        }
        self.last_dpad_vector = vector;
        Some(RawInput::Hat {
            index: DPAD_HAT,
            x: vector.0,
            y: vector.1,
        })
    }
}

/// Runs an `EventCollector` on a blocking thread; gilrs handles stay on it
pub struct CollectorHandle {
    task: tokio::task::JoinHandle<Result<(), CollectorError>>,
}

impl CollectorHandle {
    pub fn spawn(
        settings: CollectorSettings,
        event_sender: mpsc::Sender<RawInputEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        let task = tokio::task::spawn_blocking(move || {
            let collector = EventCollector::create(Some(settings), event_sender)?;
            let mut collector = collector.initialize()?;
            let result = collector.run_collection_loop(shutdown.clone());
            if let Err(e) = &result {
                error!("Event Collector failed: {}", e);
                // The engine cannot make progress without input
                shutdown.cancel();
            }
            result
        });
        Self { task }
    }

    pub async fn join(self) -> Result<Result<(), CollectorError>, tokio::task::JoinError> {
        self.task.await
    }
}

/// Xbox layout button indices
pub fn button_index(button: Button) -> Option<u32> {
    match button {
        Button::South => Some(0),
        Button::East => Some(1),
        Button::West => Some(2),
        Button::North => Some(3),
        Button::LeftTrigger => Some(4),
        Button::RightTrigger => Some(5),
        Button::Select => Some(6),
        Button::Start => Some(7),
        Button::Mode => Some(8),
        Button::LeftThumb => Some(9),
        Button::RightThumb => Some(10),
        _ => None,
    }
}

pub fn axis_index(axis: Axis) -> Option<u32> {
    match axis {
        Axis::LeftStickX => Some(0),
        Axis::LeftStickY => Some(1),
        Axis::RightStickX => Some(2),
        Axis::RightStickY => Some(3),
        Axis::RightZ => Some(4),
        Axis::LeftZ => Some(5),
        _ => None,
    }
}

/// Analog triggers report through `ButtonChanged` on most backends
fn trigger_axis(button: Button) -> Option<u32> {
    match button {
        Button::RightTrigger2 => Some(4),
        Button::LeftTrigger2 => Some(5),
        _ => None,
    }
}

fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    if value.abs() < deadzone {
        0.0
    } else {
        value.signum() * (value.abs() - deadzone) / (1.0 - deadzone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_press_latches_gamepad() {
        let mut selection = GamepadSelection::first_press();
        assert!(!selection.accepts(1usize, false));
        assert!(selection.accepts(2, true));
        assert_eq!(selection.active(), Some(2));
        assert!(!selection.accepts(1, true));
        assert!(selection.accepts(2, false));
    }

    #[test]
    fn fixed_selection_ignores_others() {
        let mut selection = GamepadSelection::fixed(0usize);
        assert!(selection.accepts(0, false));
        assert!(!selection.accepts(3, true));
    }

    #[test]
    fn dpad_buttons_form_vectors() {
        let mut dpad = DpadState::default();
        assert!(dpad.apply_button(Button::DPadUp, true));
        assert_eq!(dpad.vector(), (0, 1));
        dpad.apply_button(Button::DPadRight, true);
        assert_eq!(dpad.vector(), (1, 1));
        dpad.apply_button(Button::DPadUp, false);
        assert_eq!(dpad.vector(), (1, 0));
        assert!(!dpad.apply_button(Button::South, true));
    }

    #[test]
    fn dpad_axes_form_vectors() {
        let mut dpad = DpadState::default();
        assert!(dpad.apply_axis(Axis::DPadX, -1.0));
        assert!(dpad.apply_axis(Axis::DPadY, -1.0));
        assert_eq!(dpad.vector(), (-1, -1));
        dpad.apply_axis(Axis::DPadX, 0.0);
        assert_eq!(dpad.vector(), (0, -1));
        assert!(!dpad.apply_axis(Axis::LeftStickX, 1.0));
    }

    #[test]
    fn layout_indices() {
        assert_eq!(button_index(Button::South), Some(0));
        assert_eq!(button_index(Button::RightThumb), Some(10));
        assert_eq!(button_index(Button::DPadUp), None);
        assert_eq!(axis_index(Axis::RightZ), Some(4));
        assert_eq!(trigger_axis(Button::LeftTrigger2), Some(5));
    }

    #[test]
    fn deadzone_rescales() {
        assert_eq!(apply_deadzone(0.03, 0.05), 0.0);
        assert_eq!(apply_deadzone(1.0, 0.05), 1.0);
        assert_eq!(apply_deadzone(-1.0, 0.05), -1.0);
    }
}

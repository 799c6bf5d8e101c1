use crate::controller::event_collector::{CollectorError, CollectorHandle, CollectorSettings};
use crate::mapping::input::RawInputEvent;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Capacity of the channel between the collector and the chord engine.
pub const INPUT_CHANNEL_CAPACITY: usize = 1000;

/// Settings for the controller subsystem.
///
/// # Fields
///
/// * `controller_index` - Gamepad to use, in gilrs enumeration order. `None`
///   selects the first gamepad that presses a button.
/// * `joystick_deadzone` - Stick values below this magnitude read as zero.
/// * `poll_interval` - Sleep between gilrs polls.
#[derive(Clone, Debug)]
pub struct ControllerSettings {
    pub controller_index: Option<usize>,
    pub joystick_deadzone: f32,
    pub poll_interval: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            controller_index: None,
            joystick_deadzone: 0.05,
            poll_interval: Duration::from_micros(100),
        }
    }
}

impl From<&ControllerSettings> for CollectorSettings {
    fn from(settings: &ControllerSettings) -> Self {
        Self {
            controller_index: settings.controller_index,
            joystick_deadzone: settings.joystick_deadzone,
            poll_interval_us: settings.poll_interval.as_micros() as u64,
        }
    }
}

/// Errors surfaced by the controller subsystem.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Collector error: {0}")]
    CollectorError(#[from] CollectorError),

    #[error("Collector task failed: {0}")]
    TaskError(#[from] tokio::task::JoinError),
}

/// Owns the collector thread and the receiving end of its events.
///
/// ```text
/// gilrs ──► EventCollector (blocking thread) ──► mpsc ──► take_receiver()
/// ```
pub struct ControllerHandle {
    collector: CollectorHandle,
    receiver: Option<mpsc::Receiver<RawInputEvent>>,
}

impl ControllerHandle {
    /// Starts collecting; events are available through [`take_receiver`](Self::take_receiver).
    pub fn spawn(settings: ControllerSettings, shutdown: CancellationToken) -> Self {
        info!("Spawning controller handle with settings: {:?}", settings);
        let (sender, receiver) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
        let collector = CollectorHandle::spawn(CollectorSettings::from(&settings), sender, shutdown);
        Self {
            collector,
            receiver: Some(receiver),
        }
    }

    /// Hands the event stream to the engine; returns `None` on the second call.
    pub fn take_receiver(&mut self) -> Option<mpsc::Receiver<RawInputEvent>> {
        self.receiver.take()
    }

    /// Waits for the collector thread to finish.
    pub async fn join(self) -> Result<(), ControllerError> {
        match self.collector.join().await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!("Collector stopped with error: {}", e);
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

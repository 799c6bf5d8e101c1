//! Controller subsystem for gamepad input handling
//!
//! 1. [`event_collector`] - gilrs polling, translated into [`RawInputEvent`]s
//! 2. [`controller_handle`] - Lifecycle and the event channel for the engine
//!
//! # Architecture
//!
//! ```text
//! Gamepad ──► EventCollector ──► mpsc<RawInputEvent> ──► ChordEngine
//!             (blocking thread)
//! ```
//!
//! Buttons, axes and the d-pad hat use the Xbox layout indices that the
//! default aliases name (`BUTTON_A` = 0, `AXIS_LTRIGGER` = 5, `HAT_DPAD` = 0).
//!
//! [`RawInputEvent`]: crate::mapping::input::RawInputEvent

pub mod controller_handle;
pub mod event_collector;

pub use controller_handle::{ControllerError, ControllerHandle, ControllerSettings};

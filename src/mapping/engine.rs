//! Chord engine: composition root for one controller
//!
//! Consumes raw events one at a time and dispatches the resulting actions
//! before looking at the next event.
//!
//! # Architecture
//!
//! ```text
//! RawInputEvent ──► [Normalizer] ──► [ChordTracker] ──► [ActionResolver] ──► Dispatcher
//!                        │                                                       ▲
//!                        └──────────── axis values ──► [ValueBinding] ───────────┘
//! ```
//!
//! Mode switches requested by chord actions are applied by the engine once
//! the event's other actions have been dispatched.
//!
//! Everything except `run_engine` is synchronous; `run_engine` only adapts
//! the engine to a tokio channel.

use crate::mapping::action::{Action, DispatchError, Dispatcher};
use crate::mapping::chord::ChordId;
use crate::mapping::input::{NormalizedInput, RawInputEvent};
use crate::mapping::normalizer::RawInputNormalizer;
use crate::mapping::profile::Profile;
use crate::mapping::resolver::ActionResolver;
use crate::mapping::tracker::{ChordTracker, Edge, Transition};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Where a dispatched action came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionSource {
    Startup,
    Chord { chord: ChordId, edge: Edge },
    Binding { binding: usize },
}

/// One action that the dispatcher rejected
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchFailure {
    pub source: ActionSource,
    /// Position of the action inside its list
    pub position: usize,
    pub error: DispatchError,
}

/// Outcome of one engine step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineReport {
    pub transitions: Vec<Transition>,
    /// Actions accepted by the dispatcher
    pub dispatched: usize,
    pub failures: Vec<DispatchFailure>,
    /// Mode entered during this step
    pub mode: Option<String>,
}

impl EngineReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

fn dispatch_action<D: Dispatcher>(
    dispatcher: &mut D,
    action: &Action,
    source: ActionSource,
    position: usize,
    report: &mut EngineReport,
) -> bool {
    match dispatcher.dispatch(action) {
        Ok(()) => {
            report.dispatched += 1;
            true
        }
        Err(e) => {
            error!("Failed to dispatch {:?} from {:?}: {}", action, source, e);
            report.failures.push(DispatchFailure {
                source,
                position,
                error: e,
            });
            false
        }
    }
}

pub struct ChordEngine<D: Dispatcher> {
    profile: Arc<Profile>,
    tracker: ChordTracker,
    dispatcher: D,
    /// Last value each binding emitted
    binding_values: Vec<Option<i32>>,
    started: bool,
}

impl<D: Dispatcher> ChordEngine<D> {
    pub fn new(profile: Arc<Profile>, dispatcher: D) -> Self {
        let binding_values = vec![None; profile.bindings().len()];
        Self {
            tracker: ChordTracker::new(Arc::clone(&profile)),
            profile,
            dispatcher,
            binding_values,
            started: false,
        }
    }

    /// Dispatches the startup actions. Only the first call has an effect.
    pub fn start(&mut self) -> EngineReport {
        let mut report = EngineReport::default();
        if self.started {
            return report;
        }
        self.started = true;

        info!(
            "Chord engine started: {} startup actions",
            self.profile.startup().len()
        );
        let mut requested = None;
        for (position, action) in self.profile.startup().iter().enumerate() {
            if let Some(mode) = action.requested_mode() {
                requested = Some(mode.to_string());
                continue;
            }
            dispatch_action(
                &mut self.dispatcher,
                action,
                ActionSource::Startup,
                position,
                &mut report,
            );
        }
        if let Some(mode) = requested {
            self.switch_mode(&mode, &mut report);
        }
        report
    }

    /// Runs one raw event through the whole pipeline
    pub fn process(&mut self, event: &RawInputEvent) -> EngineReport {
        let mut report = EngineReport::default();
        let timestamp = event.timestamp.format("%H:%M:%S.%3f");

        let normalizer = RawInputNormalizer::new(self.profile.calibration());
        let normalized = match normalizer.normalize(&event.input) {
            Ok(normalized) => normalized,
            Err(e) => {
                trace!("[{}] Skipping event: {}", timestamp, e);
                return report;
            }
        };
        trace!("[{}] {:?}", timestamp, normalized);

        let transitions = self.tracker.update(&normalized);
        let requested = self.dispatch_transitions(&transitions, &mut report);
        report.transitions = transitions;
        if let Some(mode) = requested {
            self.switch_mode(&mode, &mut report);
        }

        if let NormalizedInput::Axis { index, value } = normalized {
            self.update_bindings(index, value, &mut report);
        }

        if !report.transitions.is_empty() {
            debug!(
                "[{}] {} transitions, {} actions dispatched",
                timestamp,
                report.transitions.len(),
                report.dispatched
            );
        }
        report
    }

    /// Dispatches the actions of `transitions` and returns the last mode they request
    fn dispatch_transitions(
        &mut self,
        transitions: &[Transition],
        report: &mut EngineReport,
    ) -> Option<String> {
        let mut requested = None;
        let resolver = ActionResolver::new(self.profile.chords());
        for resolved in resolver.resolve_all(transitions) {
            if let Some(mode) = resolved.action.requested_mode() {
                requested = Some(mode.to_string());
                continue;
            }
            let source = ActionSource::Chord {
                chord: resolved.chord,
                edge: resolved.edge,
            };
            dispatch_action(
                &mut self.dispatcher,
                resolved.action,
                source,
                resolved.position,
                report,
            );
        }
        requested
    }

    fn switch_mode(&mut self, mode: &str, report: &mut EngineReport) {
        if self.tracker.mode() == mode {
            return;
        }
        info!("Entering mode {}", mode);
        let transitions = self.tracker.set_mode(mode);
        report.mode = Some(mode.to_string());
        if let Some(nested) = self.dispatch_transitions(&transitions, report) {
            warn!("Ignoring switch to mode {} requested while leaving a mode", nested);
        }
        report.transitions.extend(transitions);
    }

    fn update_bindings(&mut self, axis: u32, value: f32, report: &mut EngineReport) {
        for (position, binding) in self.profile.bindings().iter().enumerate() {
            if binding.axis != axis
                || !binding.applies_in(self.tracker.mode())
                || !binding.is_open(self.tracker.snapshot())
            {
                continue;
            }
            let Some(output) = binding.value_for(value) else {
                continue;
            };
            if self.binding_values[position] == Some(output) {
                continue;
            }

            let action = Action::EmitOutput(binding.event_for(output));
            let source = ActionSource::Binding { binding: position };
            if dispatch_action(&mut self.dispatcher, &action, source, 0, report) {
                trace!("Binding {} -> {}", binding.name, output);
                self.binding_values[position] = Some(output);
            }
        }
    }

    pub fn profile(&self) -> &Arc<Profile> {
        &self.profile
    }

    pub fn tracker(&self) -> &ChordTracker {
        &self.tracker
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn into_dispatcher(self) -> D {
        self.dispatcher
    }
}

/// Drives an engine from a channel until shutdown or until the sender is gone
pub async fn run_engine<D: Dispatcher>(
    mut engine: ChordEngine<D>,
    mut events: mpsc::Receiver<RawInputEvent>,
    shutdown: CancellationToken,
) -> ChordEngine<D> {
    info!(
        "Starting chord engine with {} chords and {} bindings",
        engine.profile.chords().len(),
        engine.profile.bindings().len()
    );
    engine.start();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Shutdown signal received for chord engine");
                break;
            }

            event = events.recv() => match event {
                Some(event) => {
                    engine.process(&event);
                }
                None => {
                    info!("Input channel closed, stopping chord engine");
                    break;
                }
            }
        }
    }

    engine
}

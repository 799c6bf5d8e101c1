//! Bounded hand-off between the engine task and the output worker
//!
//! ```text
//! ChordEngine ──► QueuedDispatcher ──try_send──► mpsc ──► run_output_worker ──► Performer
//! ```
//!
//! The engine never blocks on output: a full queue fails the action with
//! `DispatchError::QueueFull`.

use crate::mapping::action::{DispatchError, Dispatcher, OutputEvent, ShellCommand};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub const OUTPUT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum OutputJob {
    Emit(OutputEvent),
    Run(ShellCommand),
}

#[derive(Debug, Clone)]
pub struct QueuedDispatcher {
    sender: mpsc::Sender<OutputJob>,
}

impl QueuedDispatcher {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<OutputJob>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    fn enqueue(&self, job: OutputJob) -> Result<(), DispatchError> {
        self.sender.try_send(job).map_err(|e| match e {
            TrySendError::Full(_) => DispatchError::QueueFull,
            TrySendError::Closed(_) => DispatchError::Closed,
        })
    }
}

impl Dispatcher for QueuedDispatcher {
    fn emit(&mut self, event: &OutputEvent) -> Result<(), DispatchError> {
        self.enqueue(OutputJob::Emit(event.clone()))
    }

    fn run(&mut self, command: &ShellCommand) -> Result<(), DispatchError> {
        self.enqueue(OutputJob::Run(command.clone()))
    }
}

/// Drains queued jobs into `dispatcher` until shutdown or until every sender is gone
pub async fn run_output_worker<D: Dispatcher>(
    mut jobs: mpsc::Receiver<OutputJob>,
    mut dispatcher: D,
    shutdown: CancellationToken,
) -> D {
    info!("Output worker started");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Shutdown signal received for output worker");
                break;
            }

            job = jobs.recv() => {
                let Some(job) = job else {
                    info!("Output queue closed");
                    break;
                };
                let result = match &job {
                    OutputJob::Emit(event) => dispatcher.emit(event),
                    OutputJob::Run(command) => dispatcher.run(command),
                };
                if let Err(e) = result {
                    error!("Output job {:?} failed: {}", job, e);
                }
            }
        }
    }
    dispatcher
}

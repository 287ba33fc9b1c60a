//! Cloneable control surface for a spawned controller

use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, error, info, warn};

use super::{ControlOutcome, SessionController, SessionStatus};
use crate::recorder::SessionSnapshot;
use crate::stream::ThrottleExt;
use crate::types::{SessionMode, TelemetryRecord, UpdateRate};
use crate::{Result, TelemetryError};

enum Command {
    Start { mode: SessionMode, reply: oneshot::Sender<Result<ControlOutcome>> },
    Stop { reply: oneshot::Sender<Result<ControlOutcome>> },
    Snapshot { reply: oneshot::Sender<Option<SessionSnapshot>> },
    Shutdown { reply: oneshot::Sender<Result<ControlOutcome>> },
}

/// Handle to a controller running on its own task.
///
/// Every request is queued and executed in arrival order by that task, so
/// handles can be cloned freely and used from any thread.
#[derive(Clone)]
pub struct ControlHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<SessionStatus>,
    records: watch::Receiver<Option<Arc<TelemetryRecord>>>,
    accepted_rate_hz: f64,
}

impl ControlHandle {
    pub(super) fn spawn(controller: SessionController) -> Self {
        let (commands, queue) = mpsc::channel(32);
        let handle = Self {
            commands,
            status: controller.status_receiver(),
            records: controller.record_receiver(),
            accepted_rate_hz: controller.config().accepted_rate_hz(),
        };

        tokio::spawn(run_controller(controller, queue));
        handle
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands.send(command(reply)).await.map_err(|_| TelemetryError::ControllerClosed)?;
        response.await.map_err(|_| TelemetryError::ControllerClosed)
    }

    pub async fn start(&self, mode: SessionMode) -> Result<ControlOutcome> {
        self.request(|reply| Command::Start { mode, reply }).await?
    }

    pub async fn stop(&self) -> Result<ControlOutcome> {
        self.request(|reply| Command::Stop { reply }).await?
    }

    /// Statistics and counters of the running session, `None` when idle.
    pub async fn snapshot(&self) -> Result<Option<SessionSnapshot>> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Stop any running session and end the controller task.
    pub async fn shutdown(&self) -> Result<ControlOutcome> {
        self.request(|reply| Command::Shutdown { reply }).await?
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn is_listening(&self) -> bool {
        self.status.borrow().is_listening()
    }

    /// Current status followed by every change.
    pub fn status_updates(&self) -> impl Stream<Item = SessionStatus> + 'static {
        WatchStream::new(self.status.clone())
    }

    /// Accepted records as they are persisted, across sessions.
    ///
    /// Records accepted before the call are not replayed. With
    /// [`UpdateRate::Max`] only the latest record of each interval is
    /// delivered.
    pub fn subscribe(&self, rate: UpdateRate) -> impl Stream<Item = Arc<TelemetryRecord>> + 'static {
        let records =
            WatchStream::from_changes(self.records.clone()).filter_map(|record| async move { record });

        match rate.throttle_interval(self.accepted_rate_hz) {
            None => records.boxed(),
            Some(interval) => records.throttle(interval).boxed(),
        }
    }
}

async fn run_controller(mut controller: SessionController, mut queue: mpsc::Receiver<Command>) {
    debug!("Controller task started");

    loop {
        tokio::select! {
            command = queue.recv() => match command {
                Some(Command::Start { mode, reply }) => {
                    let _ = reply.send(controller.start(mode).await);
                }
                Some(Command::Stop { reply }) => {
                    let _ = reply.send(controller.stop().await);
                }
                Some(Command::Snapshot { reply }) => {
                    let _ = reply.send(controller.snapshot().await);
                }
                Some(Command::Shutdown { reply }) => {
                    let _ = reply.send(controller.stop().await);
                    break;
                }
                None => {
                    debug!("All control handles dropped");
                    if let Err(e) = controller.stop().await {
                        warn!(error = %e, "Failed to stop session during teardown");
                    }
                    break;
                }
            },
            ended = controller.session_ended() => match ended {
                Ok(report) => match &report.failure {
                    Some(failure) => error!(
                        %failure,
                        rows = report.rows_written,
                        summary = %report.summary_path.display(),
                        "Session ended unexpectedly"
                    ),
                    None => info!(
                        rows = report.rows_written,
                        summary = %report.summary_path.display(),
                        "Session ended, packet source closed"
                    ),
                },
                Err(e) => error!(error = %e, "Session ended and its summary could not be exported"),
            },
        }
    }

    debug!("Controller task ended");
}

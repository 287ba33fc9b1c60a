//! Session lifecycle
//!
//! A [`SessionController`] owns at most one running [`Recorder`] task. It is
//! either idle or listening; `start` while listening and `stop` while idle are
//! reported no-ops, never errors.
//!
//! ```text
//!   Idle --start(mode)--> Listening --stop--> Idle (summary exported)
//!                             |
//!                             +--socket failure / source ended--> Idle (summary exported)
//! ```
//!
//! The controller itself is not shared. Concurrent callers go through a
//! [`ControlHandle`] (see [`SessionController::spawn`]), which serializes
//! requests into a command queue consumed by a single task.

mod handle;


pub use handle::ControlHandle;

use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::RecorderConfig;
use crate::gate::SessionGate;
use crate::names::NameLookup;
use crate::provider::PacketSource;
use crate::providers::UdpSource;
use crate::recorder::{
    RecordFeed, Recorder, RecorderOutcome, SessionCounters, SessionSnapshot, SnapshotRequest,
};
use crate::sink::{CsvSink, export_summary, summary_path, unique_session_path};
use crate::stats::{StatisticsAggregator, Summary};
use crate::types::{SessionMode, TelemetryRecord};
use crate::Result;

/// Description of the session currently listening.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListeningSession {
    pub mode: SessionMode,
    /// Row file for this session (created on the first accepted record)
    pub output: PathBuf,
    /// Packet source description
    pub source: String,
    pub started_at: DateTime<Local>,
}

/// Published controller state.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Listening(ListeningSession),
}

impl SessionStatus {
    pub fn is_listening(&self) -> bool {
        matches!(self, SessionStatus::Listening(_))
    }
}

/// Result of a completed session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub mode: SessionMode,
    pub output: PathBuf,
    pub summary_path: PathBuf,
    pub rows_written: u64,
    pub counters: SessionCounters,
    pub summary: Summary,
    /// Why the session ended on its own, if it did
    pub failure: Option<String>,
}

/// Result of a control request.
#[derive(Debug, Clone)]
pub enum ControlOutcome {
    Started(ListeningSession),
    /// `start` while a session is running; nothing changed
    AlreadyListening,
    Stopped(SessionReport),
    /// `stop` while idle; nothing changed
    NotListening,
}

struct ActiveSession {
    info: ListeningSession,
    cancel: CancellationToken,
    snapshots: mpsc::Sender<SnapshotRequest>,
    task: JoinHandle<RecorderOutcome>,
}

/// Owner of the session lifecycle.
pub struct SessionController {
    config: RecorderConfig,
    names: Arc<dyn NameLookup>,
    feed: RecordFeed,
    status: watch::Sender<SessionStatus>,
    active: Option<ActiveSession>,
}

impl SessionController {
    pub fn new(config: RecorderConfig, names: Arc<dyn NameLookup>) -> Self {
        let (feed, _) = watch::channel(None);
        let (status, _) = watch::channel(SessionStatus::Idle);
        Self { config, names, feed: Arc::new(feed), status, active: None }
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn is_listening(&self) -> bool {
        self.active.is_some()
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn status_receiver(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Receiver of the latest accepted record.
    pub fn record_receiver(&self) -> watch::Receiver<Option<Arc<TelemetryRecord>>> {
        self.feed.subscribe()
    }

    /// Bind the configured UDP port and start recording.
    ///
    /// A bind failure leaves the controller idle.
    pub async fn start(&mut self, mode: SessionMode) -> Result<ControlOutcome> {
        if self.is_listening() {
            warn!(%mode, "Start ignored, a session is already listening");
            return Ok(ControlOutcome::AlreadyListening);
        }

        let source =
            UdpSource::bind(self.config.bind_addr(), self.config.receive_buffer_size).await?;
        self.start_with_source(mode, source)
    }

    /// Start recording from an arbitrary packet source.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_with_source<S: PacketSource>(
        &mut self,
        mode: SessionMode,
        source: S,
    ) -> Result<ControlOutcome> {
        if self.is_listening() {
            warn!(%mode, "Start ignored, a session is already listening");
            return Ok(ControlOutcome::AlreadyListening);
        }

        let started_at = Local::now();
        let output =
            unique_session_path(&self.config.output_dir, &self.config.file_prefix, &started_at);
        let info = ListeningSession { mode, output: output.clone(), source: source.describe(), started_at };

        let recorder = Recorder::new(
            mode,
            Box::new(source),
            SessionGate::new(mode, &self.config),
            CsvSink::create(output),
            Arc::clone(&self.names),
            Arc::clone(&self.feed),
        );

        let cancel = CancellationToken::new();
        let (snapshots, snapshot_rx) = mpsc::channel(8);
        let task = tokio::spawn(recorder.run(cancel.clone(), snapshot_rx));

        info!(%mode, source = %info.source, output = %info.output.display(), "Session started");
        self.status.send_replace(SessionStatus::Listening(info.clone()));
        self.active = Some(ActiveSession { info: info.clone(), cancel, snapshots, task });

        Ok(ControlOutcome::Started(info))
    }

    /// Stop the running session and export its summary.
    ///
    /// Waits for the receive loop to exit, so the socket is closed and no
    /// further record is accepted once this returns.
    pub async fn stop(&mut self) -> Result<ControlOutcome> {
        let Some(active) = self.active.take() else {
            warn!("Stop ignored, no session is listening");
            return Ok(ControlOutcome::NotListening);
        };

        let ActiveSession { info, cancel, task, .. } = active;
        cancel.cancel();
        let joined = task.await;

        self.finish(info, joined).map(ControlOutcome::Stopped)
    }

    /// Statistics and counters of the running session.
    ///
    /// Returns `None` when idle or when the loop has already exited.
    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        let active = self.active.as_ref()?;
        let (reply, response) = oneshot::channel();
        active.snapshots.send(reply).await.ok()?;
        response.await.ok()
    }

    /// Wait for the running session to end on its own.
    ///
    /// Pends forever while idle. Cancel-safe: dropping the future leaves the
    /// session untouched.
    pub async fn session_ended(&mut self) -> Result<SessionReport> {
        let joined = match self.active.as_mut() {
            Some(active) => (&mut active.task).await,
            None => return std::future::pending().await,
        };

        match self.active.take() {
            Some(active) => self.finish(active.info, joined),
            None => std::future::pending().await,
        }
    }

    fn finish(
        &mut self,
        info: ListeningSession,
        joined: std::result::Result<RecorderOutcome, JoinError>,
    ) -> Result<SessionReport> {
        self.status.send_replace(SessionStatus::Idle);

        let (aggregator, counters, rows_written, failure) = match joined {
            Ok(outcome) => (
                outcome.aggregator,
                outcome.counters,
                outcome.rows_written,
                outcome.failure.map(|e| e.to_string()),
            ),
            Err(e) => {
                error!(error = %e, "Receive loop aborted");
                (StatisticsAggregator::new(), SessionCounters::default(), 0, Some(e.to_string()))
            }
        };

        let summary = aggregator.snapshot();
        let summary_path = summary_path(&info.output);
        export_summary(&summary_path, &summary)?;

        info!(
            mode = %info.mode,
            rows = rows_written,
            summary = %summary_path.display(),
            "Session stopped"
        );

        Ok(SessionReport {
            mode: info.mode,
            output: info.output,
            summary_path,
            rows_written,
            counters,
            summary,
            failure,
        })
    }

    /// Move the controller onto its own task and return a handle to it.
    pub fn spawn(self) -> ControlHandle {
        ControlHandle::spawn(self)
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            debug!("Dropping controller with a listening session");
            active.cancel.cancel();
        }
    }
}

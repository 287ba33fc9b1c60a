//! Receive loop for one recording session
//!
//! The recorder owns everything a session mutates: the packet source, the
//! gate, the row sink and the statistics. It runs as a single task, so every
//! packet is processed to completion before the next one is read and no
//! state is shared with the control surface. Snapshot requests are answered
//! between packets, which makes every snapshot consistent.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::DecodeError;
use crate::gate::{GateDecision, RejectReason, SessionGate};
use crate::names::{NameLookup, resolve_car_name, resolve_track_name};
use crate::packet::decode;
use crate::provider::PacketSource;
use crate::sink::CsvSink;
use crate::stats::{StatisticsAggregator, Summary};
use crate::types::{SessionMode, TelemetryRecord};
use crate::TelemetryError;

/// Latest accepted record, shared with live subscribers.
pub type RecordFeed = Arc<watch::Sender<Option<Arc<TelemetryRecord>>>>;

/// Per-session packet accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionCounters {
    pub packets_received: u64,
    pub decode_errors: u64,
    pub race_off: u64,
    pub awaiting_lap_zero: u64,
    pub below_minimum_speed: u64,
    pub excluded_gear: u64,
    pub throttled: u64,
    pub accepted: u64,
    pub write_errors: u64,
}

impl SessionCounters {
    fn count_rejection(&mut self, reason: RejectReason) {
        let counter = match reason {
            RejectReason::RaceOff => &mut self.race_off,
            RejectReason::AwaitingLapZero => &mut self.awaiting_lap_zero,
            RejectReason::BelowMinimumSpeed => &mut self.below_minimum_speed,
            RejectReason::ExcludedGear => &mut self.excluded_gear,
            RejectReason::Throttled => &mut self.throttled,
        };
        *counter += 1;
    }

    /// Packets dropped by the gate.
    pub fn rejected(&self) -> u64 {
        self.race_off
            + self.awaiting_lap_zero
            + self.below_minimum_speed
            + self.excluded_gear
            + self.throttled
    }
}

/// What happened to one datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketOutcome {
    Accepted,
    Rejected(RejectReason),
    Malformed(DecodeError),
    /// Accepted by the gate but the row could not be written
    WriteFailed,
}

/// Consistent view of a running session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub mode: SessionMode,
    pub counters: SessionCounters,
    pub summary: Summary,
}

/// Snapshot request: the loop answers on the enclosed channel.
pub type SnapshotRequest = oneshot::Sender<SessionSnapshot>;

/// Final state handed back when the loop exits.
#[derive(Debug)]
pub struct RecorderOutcome {
    pub aggregator: StatisticsAggregator,
    pub counters: SessionCounters,
    pub rows_written: u64,
    /// Transport failure that ended the loop, if any
    pub failure: Option<TelemetryError>,
}

/// Session state machine driven by incoming datagrams.
pub struct Recorder {
    mode: SessionMode,
    source: Box<dyn PacketSource>,
    gate: SessionGate,
    sink: CsvSink,
    aggregator: StatisticsAggregator,
    names: Arc<dyn NameLookup>,
    feed: RecordFeed,
    counters: SessionCounters,
}

impl Recorder {
    pub fn new(
        mode: SessionMode,
        source: Box<dyn PacketSource>,
        gate: SessionGate,
        sink: CsvSink,
        names: Arc<dyn NameLookup>,
        feed: RecordFeed,
    ) -> Self {
        Self {
            mode,
            source,
            gate,
            sink,
            aggregator: StatisticsAggregator::new(),
            names,
            feed,
            counters: SessionCounters::default(),
        }
    }

    /// Decode, gate, persist and aggregate one datagram observed at `now`.
    ///
    /// A record whose row cannot be written is dropped: it is not aggregated
    /// and does not move the write throttle, so the next candidate is tried
    /// immediately.
    pub fn process_packet(&mut self, bytes: &[u8], now: Instant) -> PacketOutcome {
        self.counters.packets_received += 1;

        let mut record = match decode(bytes) {
            Ok(record) => record,
            Err(e) => {
                self.counters.decode_errors += 1;
                debug!(error = %e, "Dropped malformed packet");
                return PacketOutcome::Malformed(e);
            }
        };

        if let GateDecision::Reject(reason) = self.gate.evaluate(&record, now) {
            self.counters.count_rejection(reason);
            trace!(%reason, lap = record.packet.lap_number, "Packet rejected");
            return PacketOutcome::Rejected(reason);
        }

        record.car_name = resolve_car_name(self.names.as_ref(), record.packet.car_ordinal);
        record.track_name = resolve_track_name(self.names.as_ref(), record.packet.track_ordinal);

        if let Err(e) = self.sink.append(&record) {
            self.counters.write_errors += 1;
            warn!(error = %e, "Failed to persist record, dropping it");
            return PacketOutcome::WriteFailed;
        }

        self.aggregator.update(&record);
        self.gate.mark_accepted(now);
        self.counters.accepted += 1;
        self.feed.send_replace(Some(Arc::new(record)));

        PacketOutcome::Accepted
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            mode: self.mode,
            counters: self.counters,
            summary: self.aggregator.snapshot(),
        }
    }

    pub fn counters(&self) -> SessionCounters {
        self.counters
    }

    pub fn output_path(&self) -> PathBuf {
        self.sink.path().to_path_buf()
    }

    /// Run until cancelled, the source ends or the transport fails.
    pub async fn run(
        mut self,
        cancel: CancellationToken,
        mut snapshots: mpsc::Receiver<SnapshotRequest>,
    ) -> RecorderOutcome {
        let source = self.source.describe();
        info!(mode = %self.mode, %source, output = %self.sink.path().display(), "Receive loop started");

        let failure = loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("Receive loop cancelled");
                    break None;
                }
                Some(reply) = snapshots.recv() => {
                    let _ = reply.send(self.snapshot());
                }
                result = self.source.next_packet() => match result {
                    Ok(Some(bytes)) => {
                        self.process_packet(&bytes, Instant::now());
                    }
                    Ok(None) => {
                        info!(%source, "Packet source ended");
                        break None;
                    }
                    Err(e) => {
                        error!(error = %e, %source, "Receive loop failed");
                        break Some(e);
                    }
                },
            }
        };

        let counters = self.counters;
        info!(
            packets = counters.packets_received,
            accepted = counters.accepted,
            rejected = counters.rejected(),
            decode_errors = counters.decode_errors,
            write_errors = counters.write_errors,
            "Receive loop ended"
        );

        RecorderOutcome {
            rows_written: self.sink.rows_written(),
            aggregator: self.aggregator,
            counters,
            failure,
        }
    }
}

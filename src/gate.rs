//! Record acceptance policy
//!
//! The gate decides whether a decoded record is persisted and aggregated. Rules
//! run in a fixed order and stop at the first rejection:
//!
//! 1. race not running (`IsRaceOn == 0`)
//! 2. race mode still waiting for the first lap-zero packet
//! 3. near-stationary car (`Speed` below the minimum)
//! 4. neutral/park gear sentinel
//! 5. write throttle: too soon after the last accepted record
//!
//! The throttle is measured against the last record that was actually
//! persisted, which the caller reports through [`SessionGate::mark_accepted`].

use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

use crate::config::RecorderConfig;
use crate::types::{SessionMode, TelemetryRecord};

/// Why a record was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    RaceOff,
    AwaitingLapZero,
    BelowMinimumSpeed,
    ExcludedGear,
    Throttled,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectReason::RaceOff => "race not running",
            RejectReason::AwaitingLapZero => "waiting for lap zero",
            RejectReason::BelowMinimumSpeed => "below minimum speed",
            RejectReason::ExcludedGear => "neutral/park gear",
            RejectReason::Throttled => "write interval not elapsed",
        };
        f.write_str(text)
    }
}

/// Outcome of [`SessionGate::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Accept,
    Reject(RejectReason),
}

impl GateDecision {
    pub fn is_accept(&self) -> bool {
        matches!(self, GateDecision::Accept)
    }
}

/// Gating state for one session.
#[derive(Debug, Clone)]
pub struct SessionGate {
    wait_for_lap_zero: bool,
    has_started_logging: bool,
    min_speed: f32,
    excluded_gear: u8,
    min_interval: Duration,
    last_accepted: Option<Instant>,
}

impl SessionGate {
    pub fn new(mode: SessionMode, config: &RecorderConfig) -> Self {
        let wait_for_lap_zero = mode.wait_for_lap_zero();
        Self {
            wait_for_lap_zero,
            has_started_logging: !wait_for_lap_zero,
            min_speed: config.min_speed,
            excluded_gear: config.excluded_gear,
            min_interval: config.min_write_interval(),
            last_accepted: None,
        }
    }

    /// Apply the rules to `record` as observed at `now`.
    ///
    /// The only state this changes is the lap-zero latch, which is set as soon
    /// as lap zero is seen even if a later rule rejects the same record.
    pub fn evaluate(&mut self, record: &TelemetryRecord, now: Instant) -> GateDecision {
        let packet = &record.packet;

        if packet.is_race_on == 0 {
            return GateDecision::Reject(RejectReason::RaceOff);
        }

        if self.wait_for_lap_zero && !self.has_started_logging {
            if packet.lap_number == 0 {
                self.has_started_logging = true;
                info!("Lap zero detected, logging started");
            } else {
                return GateDecision::Reject(RejectReason::AwaitingLapZero);
            }
        }

        if packet.speed < self.min_speed {
            return GateDecision::Reject(RejectReason::BelowMinimumSpeed);
        }

        if packet.gear == self.excluded_gear {
            return GateDecision::Reject(RejectReason::ExcludedGear);
        }

        if let Some(last) = self.last_accepted {
            if now.saturating_duration_since(last) < self.min_interval {
                return GateDecision::Reject(RejectReason::Throttled);
            }
        }

        GateDecision::Accept
    }

    /// Record that an accepted record was persisted at `now`.
    pub fn mark_accepted(&mut self, now: Instant) {
        self.last_accepted = Some(now);
    }

    /// Whether logging is active (always true in practice mode).
    pub fn has_started_logging(&self) -> bool {
        self.has_started_logging
    }

    pub fn last_accepted(&self) -> Option<Instant> {
        self.last_accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::NEUTRAL_GEAR;
    use crate::types::PacketData;
    use proptest::prelude::*;

    fn driving(lap_number: u16) -> TelemetryRecord {
        TelemetryRecord::from_packet(PacketData {
            is_race_on: 1,
            speed: 30.0,
            gear: 3,
            lap_number,
            ..Default::default()
        })
    }

    fn gate(mode: SessionMode) -> SessionGate {
        SessionGate::new(mode, &RecorderConfig::default())
    }

    #[test]
    fn race_off_wins_over_everything() {
        let mut gate = gate(SessionMode::Practice);
        let mut record = driving(0);
        record.packet.is_race_on = 0;
        record.packet.speed = 0.0;
        record.packet.gear = NEUTRAL_GEAR;
        assert_eq!(gate.evaluate(&record, Instant::now()), GateDecision::Reject(RejectReason::RaceOff));
    }

    #[test]
    fn practice_accepts_immediately() {
        let mut gate = gate(SessionMode::Practice);
        assert!(gate.has_started_logging());
        assert_eq!(gate.evaluate(&driving(5), Instant::now()), GateDecision::Accept);
    }

    #[test]
    fn first_candidate_of_a_session_is_never_throttled() {
        let opened = Instant::now();
        let mut gate = gate(SessionMode::Practice);
        assert_eq!(gate.last_accepted(), None);

        let soon = opened + Duration::from_millis(1);
        assert_eq!(gate.evaluate(&driving(1), soon), GateDecision::Accept);
        gate.mark_accepted(soon);
        assert_eq!(
            gate.evaluate(&driving(1), soon + Duration::from_millis(1)),
            GateDecision::Reject(RejectReason::Throttled)
        );
    }

    #[test]
    fn race_waits_for_lap_zero_then_stays_open() {
        let mut gate = gate(SessionMode::Race);
        let start = Instant::now();
        let step = Duration::from_millis(200);

        assert_eq!(gate.evaluate(&driving(3), start), GateDecision::Reject(RejectReason::AwaitingLapZero));
        assert!(!gate.has_started_logging());

        assert_eq!(gate.evaluate(&driving(0), start + step), GateDecision::Accept);
        gate.mark_accepted(start + step);

        assert_eq!(gate.evaluate(&driving(1), start + step * 2), GateDecision::Accept);
        assert_eq!(gate.evaluate(&driving(7), start + step * 3), GateDecision::Accept);
    }

    #[test]
    fn lap_zero_latches_even_when_stationary() {
        let mut gate = gate(SessionMode::Race);
        let mut grid = driving(0);
        grid.packet.speed = 0.0;

        let now = Instant::now();
        assert_eq!(gate.evaluate(&grid, now), GateDecision::Reject(RejectReason::BelowMinimumSpeed));
        assert!(gate.has_started_logging());
        assert_eq!(gate.evaluate(&driving(1), now), GateDecision::Accept);
    }

    #[test]
    fn stationary_and_neutral_are_rejected() {
        let mut gate = gate(SessionMode::Practice);
        let now = Instant::now();

        let mut slow = driving(1);
        slow.packet.speed = 0.49;
        assert_eq!(gate.evaluate(&slow, now), GateDecision::Reject(RejectReason::BelowMinimumSpeed));

        slow.packet.speed = 0.5;
        assert_eq!(gate.evaluate(&slow, now), GateDecision::Accept);

        let mut parked = driving(1);
        parked.packet.gear = NEUTRAL_GEAR;
        assert_eq!(gate.evaluate(&parked, now), GateDecision::Reject(RejectReason::ExcludedGear));
    }

    #[test]
    fn throttle_measures_from_last_accepted() {
        let mut gate = gate(SessionMode::Practice);
        let start = Instant::now();

        assert!(gate.evaluate(&driving(1), start).is_accept());
        gate.mark_accepted(start);

        let early = start + Duration::from_millis(99);
        assert_eq!(gate.evaluate(&driving(1), early), GateDecision::Reject(RejectReason::Throttled));

        // An evaluated-but-not-persisted record does not move the marker.
        let later = start + Duration::from_millis(100);
        assert!(gate.evaluate(&driving(1), later).is_accept());
        assert!(gate.evaluate(&driving(1), later).is_accept());
        assert_eq!(gate.last_accepted(), Some(start));
    }

    proptest! {
        #[test]
        fn accepted_records_are_at_least_one_interval_apart(
            gaps in prop::collection::vec(0u64..250, 1..100)
        ) {
            let mut gate = gate(SessionMode::Practice);
            let mut now = Instant::now();
            let mut accepted = Vec::new();

            for gap in gaps {
                now += Duration::from_millis(gap);
                if gate.evaluate(&driving(2), now).is_accept() {
                    gate.mark_accepted(now);
                    accepted.push(now);
                }
            }

            for pair in accepted.windows(2) {
                prop_assert!(pair[1] - pair[0] >= Duration::from_millis(100));
            }
        }

        #[test]
        fn nothing_passes_while_race_is_off(lap in any::<u16>(), speed in 0.0f32..100.0, gear in any::<u8>()) {
            let mut gate = gate(SessionMode::Practice);
            let record = TelemetryRecord::from_packet(PacketData {
                is_race_on: 0,
                lap_number: lap,
                speed,
                gear,
                ..Default::default()
            });
            prop_assert_eq!(gate.evaluate(&record, Instant::now()), GateDecision::Reject(RejectReason::RaceOff));
        }
    }
}

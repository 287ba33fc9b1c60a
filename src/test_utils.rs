//! Test utilities: packet builders and an in-memory packet source
//!
//! Shared by unit tests and the benchmarks. Nothing here touches the network.

#![cfg(any(test, feature = "benchmark"))]

use tokio::sync::mpsc;

use crate::Result;
use crate::packet::encode;
use crate::provider::PacketSource;
use crate::types::{PacketData, TelemetryRecord};

/// Builder for synthetic packets.
#[derive(Debug, Clone, Default)]
pub struct PacketBuilder {
    packet: PacketData,
}

impl PacketBuilder {
    /// All-zero packet: race off, stationary, lap zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// A car moving in third gear on lap one of a running race.
    pub fn driving() -> Self {
        Self::new().with(|p| {
            p.is_race_on = 1;
            p.timestamp_ms = 1_000;
            p.engine_max_rpm = 8_500.0;
            p.engine_idle_rpm = 900.0;
            p.current_engine_rpm = 6_200.0;
            p.speed = 30.0;
            p.velocity_z = 30.0;
            p.gear = 3;
            p.accel = 200;
            p.lap_number = 1;
            p.race_position = 4;
            p.car_ordinal = 3402;
            p.car_class = 3;
            p.car_performance_index = 600;
            p.track_ordinal = 860;
            p.tire_temp_front_left = 180.0;
            p.tire_temp_front_right = 182.0;
            p.tire_temp_rear_left = 176.0;
            p.tire_temp_rear_right = 178.0;
            p.fuel = 0.8;
        })
    }

    /// Apply an arbitrary edit.
    pub fn with(mut self, edit: impl FnOnce(&mut PacketData)) -> Self {
        edit(&mut self.packet);
        self
    }

    pub fn race_on(self, on: bool) -> Self {
        self.with(|p| p.is_race_on = i32::from(on))
    }

    pub fn speed(self, speed: f32) -> Self {
        self.with(|p| p.speed = speed)
    }

    pub fn gear(self, gear: u8) -> Self {
        self.with(|p| p.gear = gear)
    }

    pub fn lap(self, lap: u16) -> Self {
        self.with(|p| p.lap_number = lap)
    }

    pub fn car(self, ordinal: i32) -> Self {
        self.with(|p| p.car_ordinal = ordinal)
    }

    pub fn track(self, ordinal: i32) -> Self {
        self.with(|p| p.track_ordinal = ordinal)
    }

    pub fn timestamp(self, ms: u32) -> Self {
        self.with(|p| p.timestamp_ms = ms)
    }

    pub fn build(&self) -> PacketData {
        self.packet
    }

    /// Encoded datagram.
    pub fn bytes(&self) -> Vec<u8> {
        encode(&self.packet).to_vec()
    }

    /// Decoded record without resolved names.
    pub fn record(&self) -> TelemetryRecord {
        TelemetryRecord::from_packet(self.packet)
    }
}

/// Feeds a [`ChannelSource`]. Dropping every feeder ends the source.
#[derive(Debug, Clone)]
pub struct ChannelFeeder {
    tx: mpsc::UnboundedSender<Result<Vec<u8>>>,
}

impl ChannelFeeder {
    /// Queue a datagram. Returns false once the source is gone.
    pub fn send(&self, bytes: Vec<u8>) -> bool {
        self.tx.send(Ok(bytes)).is_ok()
    }

    /// Queue a transport failure.
    pub fn fail(&self, error: crate::TelemetryError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }
}

/// [`PacketSource`] backed by an in-memory queue.
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<Result<Vec<u8>>>,
}

/// Create a connected feeder/source pair.
pub fn channel_source() -> (ChannelFeeder, ChannelSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelFeeder { tx }, ChannelSource { rx })
}

#[async_trait::async_trait]
impl PacketSource for ChannelSource {
    async fn next_packet(&mut self) -> Result<Option<Vec<u8>>> {
        self.rx.recv().await.transpose()
    }

    fn describe(&self) -> String {
        "channel".to_string()
    }
}

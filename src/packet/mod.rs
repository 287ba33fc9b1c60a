//! Binary packet decoding and encoding
//!
//! [`decode`] maps one fixed-length datagram onto a [`TelemetryRecord`]. It is
//! a pure function: no state, no allocation beyond the record itself, safe to
//! call from any thread. [`encode`] is its exact inverse and is used to
//! synthesize datagrams for fixtures, benchmarks and forwarders.
//!
//! ## Usage Example
//!
//! ```rust
//! use slipstream::packet::{decode, encode, PACKET_LEN};
//! use slipstream::types::PacketData;
//!
//! let packet = PacketData { is_race_on: 1, speed: 42.0, ..Default::default() };
//! let bytes = encode(&packet);
//! assert_eq!(bytes.len(), PACKET_LEN);
//!
//! let record = decode(&bytes).unwrap();
//! assert_eq!(record.packet, packet);
//! assert!(decode(&bytes[..311]).is_err());
//! ```

pub mod format;

pub use format::{NEUTRAL_GEAR, PACKET_LEN, SLED_LEN};

use crate::error::DecodeError;
use crate::types::{PacketData, TelemetryRecord};
use format::{PacketReader, PacketWriter};
use tracing::trace;

/// Decode one datagram.
///
/// The buffer must be exactly [`PACKET_LEN`] bytes; anything else fails with
/// [`DecodeError::LengthMismatch`] and no partial record is produced.
pub fn decode(buffer: &[u8]) -> Result<TelemetryRecord, DecodeError> {
    if buffer.len() != PACKET_LEN {
        return Err(DecodeError::LengthMismatch { expected: PACKET_LEN, actual: buffer.len() });
    }

    let mut reader = PacketReader::new(buffer);
    let packet = PacketData::read_from(&mut reader)?;
    debug_assert_eq!(reader.position(), PACKET_LEN);

    trace!(
        timestamp_ms = packet.timestamp_ms,
        lap = packet.lap_number,
        speed = packet.speed,
        "Decoded packet"
    );

    Ok(TelemetryRecord::from_packet(packet))
}

/// Encode raw values into a datagram, in wire order.
pub fn encode(packet: &PacketData) -> [u8; PACKET_LEN] {
    let mut writer = PacketWriter::new();
    packet.write_to(&mut writer);
    debug_assert_eq!(writer.len(), PACKET_LEN);

    let mut out = [0u8; PACKET_LEN];
    out.copy_from_slice(&writer.into_inner());
    out
}

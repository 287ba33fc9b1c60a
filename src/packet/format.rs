//! Packet layout constants and little-endian field cursors
//!
//! The "Data Out" datagram is a flat sequence of little-endian values with no
//! padding, header or version marker:
//!
//! 1. **Sled section** (232 bytes) - race flag, timestamp, engine, motion and
//!    per-wheel physics, car identity
//! 2. **Dash section** (99 bytes) - position, speed/power/torque, tire
//!    temperatures, lap timing, driver inputs, tire wear, track ordinal
//!
//! Values are read strictly in declaration order; the cursor never seeks.

use crate::error::DecodeError;
use crate::types::ValueType;

/// Total datagram length of the supported layout.
pub const PACKET_LEN: usize = 331;

/// Length of the leading "Sled" section.
pub const SLED_LEN: usize = 232;

/// Gear value the simulator reports while the car is in neutral or parked.
pub const NEUTRAL_GEAR: u8 = 11;

/// A primitive that can be read from or written to the packet.
pub trait WireValue: Copy + Sized {
    /// Storage type reported in the field schema.
    const TYPE: ValueType;

    /// Read the next value from the cursor.
    fn read_from(reader: &mut PacketReader<'_>) -> Result<Self, DecodeError>;

    /// Append this value to the writer.
    fn write_to(self, writer: &mut PacketWriter);
}

/// Sequential little-endian reader over one datagram.
#[derive(Debug)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Take the next `N` bytes.
    pub fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let end = self.position + N;
        let bytes = self.data.get(self.position..end).ok_or(DecodeError::LengthMismatch {
            expected: PACKET_LEN,
            actual: self.data.len(),
        })?;

        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.position = end;
        Ok(out)
    }

    /// Read the next value of type `T`.
    pub fn read<T: WireValue>(&mut self) -> Result<T, DecodeError> {
        T::read_from(self)
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.position
    }
}

/// Sequential little-endian writer producing one datagram.
#[derive(Debug, Default)]
pub struct PacketWriter {
    buffer: Vec<u8>,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self { buffer: Vec::with_capacity(PACKET_LEN) }
    }

    pub fn put(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn write<T: WireValue>(&mut self, value: T) {
        value.write_to(self);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

macro_rules! wire_value {
    ($($ty:ty => $variant:ident, $size:literal);+ $(;)?) => {
        $(
            impl WireValue for $ty {
                const TYPE: ValueType = ValueType::$variant;

                fn read_from(reader: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
                    reader.take::<$size>().map(<$ty>::from_le_bytes)
                }

                fn write_to(self, writer: &mut PacketWriter) {
                    writer.put(&self.to_le_bytes());
                }
            }
        )+
    };
}

wire_value! {
    i8 => Int8, 1;
    u8 => UInt8, 1;
    u16 => UInt16, 2;
    i32 => Int32, 4;
    u32 => UInt32, 4;
    f32 => Float32, 4;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_consumes_in_order() {
        let mut data = Vec::new();
        data.extend_from_slice(&7i32.to_le_bytes());
        data.extend_from_slice(&1.5f32.to_le_bytes());
        data.extend_from_slice(&300u16.to_le_bytes());
        data.push(0xFF);

        let mut reader = PacketReader::new(&data);
        assert_eq!(reader.read::<i32>().unwrap(), 7);
        assert_eq!(reader.read::<f32>().unwrap(), 1.5);
        assert_eq!(reader.read::<u16>().unwrap(), 300);
        assert_eq!(reader.read::<i8>().unwrap(), -1);
        assert_eq!(reader.position(), data.len());
    }

    #[test]
    fn reader_refuses_to_run_past_the_end() {
        let data = [0u8; 3];
        let mut reader = PacketReader::new(&data);
        assert_eq!(
            reader.read::<u32>(),
            Err(DecodeError::LengthMismatch { expected: PACKET_LEN, actual: 3 })
        );
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn writer_emits_little_endian() {
        let mut writer = PacketWriter::new();
        writer.write(0x0102u16);
        writer.write(-2i8);
        assert_eq!(writer.into_inner(), vec![0x02, 0x01, 0xFE]);
    }
}

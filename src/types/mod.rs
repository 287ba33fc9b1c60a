//! Core types for decoded telemetry.
//!
//! ## Architecture
//!
//! - [`TelemetryRecord`] is one decoded datagram: the raw [`PacketData`], the
//!   resolved car/track names and the [`DerivedFields`] computed at decode
//! - [`FieldSpec`] tables describe every numeric field statically; rows,
//!   headers and statistics iterate them instead of reflecting on the struct
//! - [`FieldValue`] / [`ValueType`] carry field values with their wire width
//! - [`SessionMode`] selects race (wait for lap zero) or practice gating
//!
//! ## Usage Example
//!
//! ```rust
//! use slipstream::types::{numeric_fields, PacketData, TelemetryRecord};
//!
//! let packet = PacketData { speed: 25.0, gear: 3, ..Default::default() };
//! let record = TelemetryRecord::from_packet(packet);
//!
//! assert!((record.derived.speed_kph - 90.0).abs() < 1e-9);
//! for spec in numeric_fields().take(3) {
//!     println!("{} = {}", spec.name, spec.get(&record));
//! }
//! ```

mod mode;
mod record;
mod update_rate;
mod value_type;

pub use mode::SessionMode;
pub use record::{
    CAR_NAME_COLUMN, Column, DerivedFields, FieldSpec, PacketData, TRACK_NAME_COLUMN,
    TelemetryRecord, columns, derived_fields, fahrenheit_to_celsius, field_spec, mps_to_kph,
    numeric_fields, wire_fields,
};
pub use update_rate::UpdateRate;
pub use value_type::{FieldValue, ValueType};

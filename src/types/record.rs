//! Telemetry record and its static field schema
//!
//! The packet layout is declared exactly once, in [`packet_schema!`]. From
//! that single declaration the macro generates the [`PacketData`] struct, the
//! ordered decoder and encoder, and the [`FieldSpec`] table used to build row
//! headers, write rows and feed the statistics aggregator. Adding a field to
//! the declaration updates every consumer at compile time.

use serde::{Deserialize, Serialize};

use super::{FieldValue, ValueType};
use crate::error::DecodeError;
use crate::packet::format::{PacketReader, PacketWriter, WireValue};

/// Column name of the resolved car display name.
pub const CAR_NAME_COLUMN: &str = "CarName";

/// Column name of the resolved track display name.
pub const TRACK_NAME_COLUMN: &str = "TrackName";

/// Static description of one numeric record field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Column name used in row headers and summaries
    pub name: &'static str,
    /// Storage type of the field
    pub value_type: ValueType,
    /// Read the field from a record
    pub value: fn(&TelemetryRecord) -> FieldValue,
    /// Parse text into the field, as written by the row sink
    pub(crate) assign: fn(&mut TelemetryRecord, &str) -> Result<(), String>,
}

impl FieldSpec {
    /// Read this field from `record`.
    pub fn get(&self, record: &TelemetryRecord) -> FieldValue {
        (self.value)(record)
    }
}

macro_rules! packet_schema {
    ($( $(#[$attr:meta])* $column:literal => $field:ident : $ty:ty ),+ $(,)?) => {
        /// Raw values of one datagram, in wire order.
        #[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
        pub struct PacketData {
            $(
                $(#[$attr])*
                #[serde(rename = $column)]
                pub $field: $ty,
            )+
        }

        impl PacketData {
            /// Read every field in declaration order.
            pub(crate) fn read_from(reader: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
                Ok(Self { $( $field: reader.read::<$ty>()?, )+ })
            }

            /// Write every field in declaration order.
            pub(crate) fn write_to(&self, writer: &mut PacketWriter) {
                $( writer.write(self.$field); )+
            }
        }

        const WIRE_FIELDS: &[FieldSpec] = &[
            $(
                FieldSpec {
                    name: $column,
                    value_type: <$ty as WireValue>::TYPE,
                    value: |record: &TelemetryRecord| FieldValue::from(record.packet.$field),
                    assign: |record: &mut TelemetryRecord, text: &str| {
                        record.packet.$field =
                            text.trim().parse::<$ty>().map_err(|e| e.to_string())?;
                        Ok(())
                    },
                },
            )+
        ];
    };
}

packet_schema! {
    // Sled section
    /// Non-zero while a race is running (zero in menus or when paused)
    "IsRaceOn" => is_race_on: i32,
    /// Simulator timestamp in milliseconds, may wrap
    "TimestampMS" => timestamp_ms: u32,
    "EngineMaxRpm" => engine_max_rpm: f32,
    "EngineIdleRpm" => engine_idle_rpm: f32,
    "CurrentEngineRpm" => current_engine_rpm: f32,

    /// Local-space acceleration (m/s^2); X right, Y up, Z forward
    "AccelerationX" => acceleration_x: f32,
    "AccelerationY" => acceleration_y: f32,
    "AccelerationZ" => acceleration_z: f32,

    /// Local-space velocity (m/s)
    "VelocityX" => velocity_x: f32,
    "VelocityY" => velocity_y: f32,
    "VelocityZ" => velocity_z: f32,

    /// Local-space angular velocity (rad/s)
    "AngularVelocityX" => angular_velocity_x: f32,
    "AngularVelocityY" => angular_velocity_y: f32,
    "AngularVelocityZ" => angular_velocity_z: f32,

    "Yaw" => yaw: f32,
    "Pitch" => pitch: f32,
    "Roll" => roll: f32,

    /// 0.0 = max stretch, 1.0 = max compression
    "NormalizedSuspensionTravelFrontLeft" => normalized_suspension_travel_front_left: f32,
    "NormalizedSuspensionTravelFrontRight" => normalized_suspension_travel_front_right: f32,
    "NormalizedSuspensionTravelRearLeft" => normalized_suspension_travel_rear_left: f32,
    "NormalizedSuspensionTravelRearRight" => normalized_suspension_travel_rear_right: f32,

    "TireSlipRatioFrontLeft" => tire_slip_ratio_front_left: f32,
    "TireSlipRatioFrontRight" => tire_slip_ratio_front_right: f32,
    "TireSlipRatioRearLeft" => tire_slip_ratio_rear_left: f32,
    "TireSlipRatioRearRight" => tire_slip_ratio_rear_right: f32,

    /// Wheel rotation speed (rad/s)
    "WheelRotationSpeedFrontLeft" => wheel_rotation_speed_front_left: f32,
    "WheelRotationSpeedFrontRight" => wheel_rotation_speed_front_right: f32,
    "WheelRotationSpeedRearLeft" => wheel_rotation_speed_rear_left: f32,
    "WheelRotationSpeedRearRight" => wheel_rotation_speed_rear_right: f32,

    "WheelOnRumbleStripFrontLeft" => wheel_on_rumble_strip_front_left: i32,
    "WheelOnRumbleStripFrontRight" => wheel_on_rumble_strip_front_right: i32,
    "WheelOnRumbleStripRearLeft" => wheel_on_rumble_strip_rear_left: i32,
    "WheelOnRumbleStripRearRight" => wheel_on_rumble_strip_rear_right: i32,

    "WheelInPuddleDepthFrontLeft" => wheel_in_puddle_depth_front_left: f32,
    "WheelInPuddleDepthFrontRight" => wheel_in_puddle_depth_front_right: f32,
    "WheelInPuddleDepthRearLeft" => wheel_in_puddle_depth_rear_left: f32,
    "WheelInPuddleDepthRearRight" => wheel_in_puddle_depth_rear_right: f32,

    "SurfaceRumbleFrontLeft" => surface_rumble_front_left: f32,
    "SurfaceRumbleFrontRight" => surface_rumble_front_right: f32,
    "SurfaceRumbleRearLeft" => surface_rumble_rear_left: f32,
    "SurfaceRumbleRearRight" => surface_rumble_rear_right: f32,

    /// Tire slip angle (rad)
    "TireSlipAngleFrontLeft" => tire_slip_angle_front_left: f32,
    "TireSlipAngleFrontRight" => tire_slip_angle_front_right: f32,
    "TireSlipAngleRearLeft" => tire_slip_angle_rear_left: f32,
    "TireSlipAngleRearRight" => tire_slip_angle_rear_right: f32,

    "TireCombinedSlipFrontLeft" => tire_combined_slip_front_left: f32,
    "TireCombinedSlipFrontRight" => tire_combined_slip_front_right: f32,
    "TireCombinedSlipRearLeft" => tire_combined_slip_rear_left: f32,
    "TireCombinedSlipRearRight" => tire_combined_slip_rear_right: f32,

    /// Actual suspension travel (m)
    "SuspensionTravelMetersFrontLeft" => suspension_travel_meters_front_left: f32,
    "SuspensionTravelMetersFrontRight" => suspension_travel_meters_front_right: f32,
    "SuspensionTravelMetersRearLeft" => suspension_travel_meters_rear_left: f32,
    "SuspensionTravelMetersRearRight" => suspension_travel_meters_rear_right: f32,

    /// Key into the car reference table
    "CarOrdinal" => car_ordinal: i32,
    "CarClass" => car_class: i32,
    "CarPerformanceIndex" => car_performance_index: i32,
    "DrivetrainType" => drivetrain_type: i32,
    "NumCylinders" => num_cylinders: i32,

    // Dash section
    "PositionX" => position_x: f32,
    "PositionY" => position_y: f32,
    "PositionZ" => position_z: f32,

    /// Speed (m/s)
    "Speed" => speed: f32,
    /// Power (W)
    "Power" => power: f32,
    /// Torque (N*m)
    "Torque" => torque: f32,

    /// Tire temperature (Fahrenheit)
    "TireTempFrontLeft" => tire_temp_front_left: f32,
    "TireTempFrontRight" => tire_temp_front_right: f32,
    "TireTempRearLeft" => tire_temp_rear_left: f32,
    "TireTempRearRight" => tire_temp_rear_right: f32,

    "Boost" => boost: f32,
    "Fuel" => fuel: f32,
    "DistanceTraveled" => distance_traveled: f32,
    "BestLap" => best_lap: f32,
    "LastLap" => last_lap: f32,
    "CurrentLap" => current_lap: f32,
    "CurrentRaceTime" => current_race_time: f32,

    "LapNumber" => lap_number: u16,
    "RacePosition" => race_position: u8,
    "Accel" => accel: u8,
    "Brake" => brake: u8,
    "Clutch" => clutch: u8,
    "HandBrake" => hand_brake: u8,
    "Gear" => gear: u8,
    "Steer" => steer: i8,
    "NormalizedDrivingLine" => normalized_driving_line: i8,
    "NormalizedAIBrakeDifference" => normalized_ai_brake_difference: i8,

    "TireWearFrontLeft" => tire_wear_front_left: f32,
    "TireWearFrontRight" => tire_wear_front_right: f32,
    "TireWearRearLeft" => tire_wear_rear_left: f32,
    "TireWearRearRight" => tire_wear_rear_right: f32,

    /// Key into the track reference table
    "TrackOrdinal" => track_ordinal: i32,
}

/// Values computed from raw fields at decode time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DerivedFields {
    #[serde(rename = "TireTempFrontLeftCelsius")]
    pub tire_temp_front_left_celsius: f64,
    #[serde(rename = "TireTempFrontRightCelsius")]
    pub tire_temp_front_right_celsius: f64,
    #[serde(rename = "TireTempRearLeftCelsius")]
    pub tire_temp_rear_left_celsius: f64,
    #[serde(rename = "TireTempRearRightCelsius")]
    pub tire_temp_rear_right_celsius: f64,
    #[serde(rename = "SpeedKph")]
    pub speed_kph: f64,
}

impl DerivedFields {
    pub fn compute(packet: &PacketData) -> Self {
        Self {
            tire_temp_front_left_celsius: fahrenheit_to_celsius(packet.tire_temp_front_left),
            tire_temp_front_right_celsius: fahrenheit_to_celsius(packet.tire_temp_front_right),
            tire_temp_rear_left_celsius: fahrenheit_to_celsius(packet.tire_temp_rear_left),
            tire_temp_rear_right_celsius: fahrenheit_to_celsius(packet.tire_temp_rear_right),
            speed_kph: mps_to_kph(packet.speed),
        }
    }
}

/// `(F - 32) * 5/9`, widened to f64.
pub fn fahrenheit_to_celsius(fahrenheit: f32) -> f64 {
    (f64::from(fahrenheit) - 32.0) * (5.0 / 9.0)
}

/// Metres per second to kilometres per hour, widened to f64.
pub fn mps_to_kph(speed: f32) -> f64 {
    f64::from(speed) * 3.6
}

macro_rules! derived_field {
    ($column:literal => $field:ident) => {
        FieldSpec {
            name: $column,
            value_type: ValueType::Float64,
            value: |record: &TelemetryRecord| FieldValue::Float64(record.derived.$field),
            assign: |record: &mut TelemetryRecord, text: &str| {
                record.derived.$field = text.trim().parse::<f64>().map_err(|e| e.to_string())?;
                Ok(())
            },
        }
    };
}

const DERIVED_FIELDS: &[FieldSpec] = &[
    derived_field!("TireTempFrontLeftCelsius" => tire_temp_front_left_celsius),
    derived_field!("TireTempFrontRightCelsius" => tire_temp_front_right_celsius),
    derived_field!("TireTempRearLeftCelsius" => tire_temp_rear_left_celsius),
    derived_field!("TireTempRearRightCelsius" => tire_temp_rear_right_celsius),
    derived_field!("SpeedKph" => speed_kph),
];

/// One decoded telemetry sample.
///
/// Created by [`decode`](crate::packet::decode); name fields are empty until
/// the session resolves them on acceptance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TelemetryRecord {
    #[serde(flatten)]
    pub packet: PacketData,
    #[serde(rename = "CarName")]
    pub car_name: String,
    #[serde(rename = "TrackName")]
    pub track_name: String,
    #[serde(flatten)]
    pub derived: DerivedFields,
}

impl TelemetryRecord {
    /// Build a record from raw values, computing derived fields.
    pub fn from_packet(packet: PacketData) -> Self {
        let derived = DerivedFields::compute(&packet);
        Self { packet, car_name: String::new(), track_name: String::new(), derived }
    }

    /// Look up a numeric field by column name.
    pub fn field(&self, name: &str) -> Option<FieldValue> {
        field_spec(name).map(|spec| spec.get(self))
    }

    pub fn is_race_on(&self) -> bool {
        self.packet.is_race_on != 0
    }
}

/// A column of the persisted row layout.
#[derive(Debug, Clone, Copy)]
pub enum Column {
    Numeric(&'static FieldSpec),
    CarName,
    TrackName,
}

impl Column {
    pub fn name(&self) -> &'static str {
        match self {
            Column::Numeric(spec) => spec.name,
            Column::CarName => CAR_NAME_COLUMN,
            Column::TrackName => TRACK_NAME_COLUMN,
        }
    }
}

/// Raw packet fields, in wire order.
pub fn wire_fields() -> &'static [FieldSpec] {
    WIRE_FIELDS
}

/// Fields computed at decode time.
pub fn derived_fields() -> &'static [FieldSpec] {
    DERIVED_FIELDS
}

/// Every numeric field: wire fields followed by derived fields.
pub fn numeric_fields() -> impl Iterator<Item = &'static FieldSpec> {
    WIRE_FIELDS.iter().chain(DERIVED_FIELDS.iter())
}

/// Find a numeric field by column name.
pub fn field_spec(name: &str) -> Option<&'static FieldSpec> {
    numeric_fields().find(|spec| spec.name == name)
}

/// Persisted column layout: raw fields, resolved names, derived fields.
pub fn columns() -> impl Iterator<Item = Column> {
    WIRE_FIELDS
        .iter()
        .map(Column::Numeric)
        .chain([Column::CarName, Column::TrackName])
        .chain(DERIVED_FIELDS.iter().map(Column::Numeric))
}

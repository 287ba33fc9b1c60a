//! Per-field statistics over accepted records

use super::{FieldAccumulator, Summary};
use crate::types::{FieldSpec, TelemetryRecord, numeric_fields};

/// One [`FieldAccumulator`] per numeric schema field.
#[derive(Debug, Clone)]
pub struct StatisticsAggregator {
    fields: Vec<(&'static FieldSpec, FieldAccumulator)>,
    records: u64,
}

impl Default for StatisticsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StatisticsAggregator {
    pub fn new() -> Self {
        let fields = numeric_fields().map(|spec| (spec, FieldAccumulator::new())).collect();
        Self { fields, records: 0 }
    }

    /// Fold every numeric field of `record` into its accumulator.
    pub fn update(&mut self, record: &TelemetryRecord) {
        for (spec, accumulator) in &mut self.fields {
            accumulator.update(spec.get(record).as_f64());
        }
        self.records += 1;
    }

    /// Number of records folded in so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn accumulator(&self, name: &str) -> Option<&FieldAccumulator> {
        self.fields.iter().find(|(spec, _)| spec.name == name).map(|(_, acc)| acc)
    }

    /// Derive statistics for every field without mutating state.
    pub fn snapshot(&self) -> Summary {
        Summary::new(
            self.fields
                .iter()
                .map(|(spec, accumulator)| (spec.name.to_string(), accumulator.summarize()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PacketData, derived_fields, wire_fields};

    fn record_with_speed(speed: f32, gear: u8) -> TelemetryRecord {
        TelemetryRecord::from_packet(PacketData { speed, gear, ..Default::default() })
    }

    #[test]
    fn tracks_every_numeric_field() {
        let aggregator = StatisticsAggregator::new();
        let summary = aggregator.snapshot();
        assert_eq!(summary.len(), wire_fields().len() + derived_fields().len());
        assert!(summary.get("CarName").is_none());
        assert_eq!(summary.get("Speed").unwrap().count, 0);
        assert_eq!(summary.get("Speed").unwrap().min, None);
    }

    #[test]
    fn updates_raw_and_derived_fields_together() {
        let mut aggregator = StatisticsAggregator::new();
        for (speed, gear) in [(10.0, 2), (20.0, 3), (30.0, 4)] {
            aggregator.update(&record_with_speed(speed, gear));
        }

        let summary = aggregator.snapshot();
        assert_eq!(aggregator.records(), 3);
        assert_eq!(summary.sample_count(), 3);

        let speed = summary.get("Speed").unwrap();
        assert!((speed.mean - 20.0).abs() < 1e-9);
        assert_eq!(speed.median, Some(20.0));

        let kph = summary.get("SpeedKph").unwrap();
        assert!((kph.mean - 72.0).abs() < 1e-9);
        assert_eq!(summary.get("Gear").unwrap().max, Some(4.0));
    }

    #[test]
    fn snapshot_preserves_schema_order() {
        let summary = StatisticsAggregator::new().snapshot();
        let names: Vec<_> = summary.iter().map(|(name, _)| name).collect();
        assert_eq!(names.first(), Some(&"IsRaceOn"));
        assert_eq!(names.last(), Some(&"SpeedKph"));
    }

    #[test]
    fn summary_json_keeps_order_and_nulls() {
        let mut aggregator = StatisticsAggregator::new();
        aggregator.update(&record_with_speed(12.5, 3));
        let json = serde_json::to_string(&aggregator.snapshot()).unwrap();
        assert!(json.starts_with("{\"IsRaceOn\":{\"count\":1"));

        let empty = serde_json::to_value(StatisticsAggregator::new().snapshot()).unwrap();
        assert!(empty["Speed"]["min"].is_null());
        assert!(empty["Speed"]["median"].is_null());

        let parsed: Summary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.get("Speed").unwrap().max, Some(12.5));
        assert_eq!(parsed.len(), aggregator.snapshot().len());
    }
}

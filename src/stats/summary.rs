//! Statistics snapshot types

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Derived statistics for one field.
///
/// Extrema and quantiles are `None` for a field that was never observed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldSummary {
    pub count: u64,
    #[serde(deserialize_with = "nan_if_null")]
    pub mean: f64,
    #[serde(deserialize_with = "nan_if_null")]
    pub variance: f64,
    #[serde(deserialize_with = "nan_if_null")]
    pub std: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub median: Option<f64>,
    pub p25: Option<f64>,
    pub p75: Option<f64>,
    #[serde(deserialize_with = "nan_if_null")]
    pub skewness: f64,
    #[serde(deserialize_with = "nan_if_null")]
    pub kurtosis: f64,
}

/// JSON has no NaN; serde_json writes it as `null`.
fn nan_if_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// Per-field statistics in schema order.
///
/// Serializes as a JSON object keyed by field name, preserving order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    fields: Vec<(String, FieldSummary)>,
}

impl Summary {
    pub fn new(fields: Vec<(String, FieldSummary)>) -> Self {
        Self { fields }
    }

    /// Statistics for one field by column name.
    pub fn get(&self, name: &str) -> Option<&FieldSummary> {
        self.fields.iter().find(|(field, _)| field == name).map(|(_, summary)| summary)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldSummary)> {
        self.fields.iter().map(|(name, summary)| (name.as_str(), summary))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of samples folded into the summary.
    pub fn sample_count(&self) -> u64 {
        self.fields.first().map(|(_, summary)| summary.count).unwrap_or(0)
    }
}

impl Serialize for Summary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, summary) in &self.fields {
            map.serialize_entry(name, summary)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Summary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SummaryVisitor;

        impl<'de> Visitor<'de> for SummaryVisitor {
            type Value = Summary;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of field name to field statistics")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Summary, A::Error> {
                let mut fields = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, summary)) = access.next_entry::<String, FieldSummary>()? {
                    fields.push((name, summary));
                }
                Ok(Summary { fields })
            }
        }

        deserializer.deserialize_map(SummaryVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(mean: f64) -> FieldSummary {
        FieldSummary {
            count: 2,
            mean,
            variance: mean,
            std: mean,
            min: Some(1.0),
            max: Some(2.0),
            median: Some(1.5),
            p25: Some(1.25),
            p75: Some(1.75),
            skewness: 0.0,
            kurtosis: mean,
        }
    }

    #[test]
    fn nan_statistics_load_back_as_nan() {
        let summary = Summary::new(vec![
            ("Speed".to_string(), field(f64::NAN)),
            ("Gear".to_string(), field(1.5)),
        ]);

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"mean\":null"));

        let loaded: Summary = serde_json::from_str(&json).unwrap();
        let speed = loaded.get("Speed").unwrap();
        assert!(speed.mean.is_nan());
        assert!(speed.variance.is_nan());
        assert!(speed.kurtosis.is_nan());
        assert_eq!(speed.skewness, 0.0);
        assert_eq!(loaded.get("Gear"), Some(&field(1.5)));
        assert_eq!(loaded.iter().map(|(name, _)| name).collect::<Vec<_>>(), ["Speed", "Gear"]);
    }
}

use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use super::error::{AppendError, Result};
use crate::clock::TimePoint;

/// Ordered channel -> reading pairs; insertion order is the serialized order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Readings(Vec<(String, f64)>);

impl Readings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, channel: impl Into<String>, value: f64) {
        self.0.push((channel.into(), value));
    }

    pub fn with(mut self, channel: impl Into<String>, value: f64) -> Self {
        self.push(channel, value);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(name, value)| (name.as_str(), *value))
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for Readings {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl Serialize for Readings {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (channel, value) in &self.0 {
            map.serialize_entry(channel, value)?;
        }
        map.end()
    }
}

/// One timestamped sample destined for a single log line
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub timestamp: TimePoint,
    pub readings: Readings,
}

impl LogRecord {
    pub fn new(timestamp: TimePoint, readings: Readings) -> Self {
        Self {
            timestamp,
            readings,
        }
    }

    /// Serialize as one self-contained JSON line (without the newline)
    pub fn to_line(&self, include_seconds: bool) -> Result<String> {
        if let Some((channel, value)) = self.readings.iter().find(|(_, v)| !v.is_finite()) {
            return Err(AppendError::SerializeFailed(format!(
                "reading {channel} = {value} is not a finite number"
            )));
        }

        let line = LineFormat {
            datum: self.timestamp.date_string(),
            cas: self.timestamp.time_string(include_seconds),
            mereni: [&self.readings],
        };
        Ok(serde_json::to_string(&line)?)
    }
}

/// On-disk line layout shared with the consumers of the data files
#[derive(Serialize)]
struct LineFormat<'a> {
    datum: String,
    cas: String,
    mereni: [&'a Readings; 1],
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LogRecord {
        LogRecord::new(
            TimePoint::new(2024, 3, 5, 14, 30, 7).unwrap(),
            Readings::new()
                .with("teplota_senzor_1", 21.3)
                .with("teplota_senzor_2", 20.9)
                .with("teplota_senzor_3", 22.0)
                .with("teplota_senzor_4", 21.5),
        )
    }

    #[test]
    fn test_line_with_seconds() {
        assert_eq!(
            sample().to_line(true).unwrap(),
            r#"{"datum":"2024-03-05","cas":"14:30:07","mereni":[{"teplota_senzor_1":21.3,"teplota_senzor_2":20.9,"teplota_senzor_3":22.0,"teplota_senzor_4":21.5}]}"#
        );
    }

    #[test]
    fn test_line_without_seconds() {
        let line = sample().to_line(false).unwrap();
        assert!(line.starts_with(r#"{"datum":"2024-03-05","cas":"14:30","mereni":"#));
    }

    #[test]
    fn test_channel_order_is_preserved() {
        let record = LogRecord::new(
            TimePoint::new(2024, 3, 5, 14, 30, 7).unwrap(),
            Readings::new().with("z", 1.0).with("a", 2.0),
        );
        let line = record.to_line(true).unwrap();
        assert!(line.ends_with(r#""mereni":[{"z":1.0,"a":2.0}]}"#));
    }

    #[test]
    fn test_values_round_trip() {
        let record = LogRecord::new(
            TimePoint::new(2024, 3, 5, 14, 30, 7).unwrap(),
            Readings::new().with("a", -49.9).with("b", 100.25),
        );
        let line = record.to_line(true).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["mereni"][0]["a"].as_f64(), Some(-49.9));
        assert_eq!(parsed["mereni"][0]["b"].as_f64(), Some(100.25));
    }

    #[test]
    fn test_non_finite_reading_fails() {
        let record = LogRecord::new(
            TimePoint::new(2024, 3, 5, 14, 30, 7).unwrap(),
            Readings::new().with("broken", f64::NAN),
        );
        assert!(matches!(
            record.to_line(true),
            Err(AppendError::SerializeFailed(_))
        ));
    }
}

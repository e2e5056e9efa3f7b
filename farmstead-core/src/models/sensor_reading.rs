use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// One sample reported by a device sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    pub device_id: Uuid,
    pub sensor: String,
    pub value: f64,
    pub unit: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub captured_at: DateTime<Utc>,
    /// When the reading was written to the local cache. Never sent by the server.
    #[serde(default, skip_serializing, with = "chrono::serde::ts_milliseconds_option")]
    pub synced_at: Option<DateTime<Utc>>,
}

impl SensorReading {
    pub fn new(
        device_id: Uuid,
        sensor: impl Into<String>,
        value: f64,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            device_id,
            sensor: sensor.into(),
            value,
            unit: None,
            captured_at,
            synced_at: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

impl fmt::Display for SensorReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  {:<16} {}",
            self.captured_at.format("%Y-%m-%d %H:%M:%S"),
            self.sensor,
            self.value
        )?;
        if let Some(unit) = &self.unit {
            write!(f, " {}", unit)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_reading_timestamps_are_epoch_millis() {
        let captured = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let reading = SensorReading::new(Uuid::new_v4(), "temperature", 21.5, captured)
            .with_unit("C");
        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["capturedAt"], 1_700_000_000_000i64);
        assert!(json.get("syncedAt").is_none());

        let parsed: SensorReading = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.captured_at, captured);
        assert!(parsed.synced_at.is_none());
    }
}

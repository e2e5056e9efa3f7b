//! Wire-format helpers.
//!
//! The API encodes every instant as epoch milliseconds. Calendar dates
//! (birthdays, forecast days) travel as the epoch milliseconds of UTC
//! midnight on that date.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

/// Converts a calendar date to epoch milliseconds at UTC midnight.
pub fn date_to_millis(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or_default()
}

/// Converts epoch milliseconds to the UTC calendar date containing them.
pub fn millis_to_date(millis: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.date_naive())
}

/// Converts epoch milliseconds to a UTC timestamp.
pub fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Serde adapter for `NaiveDate` as epoch milliseconds.
pub mod date_millis {
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(super::date_to_millis(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let millis = i64::deserialize(deserializer)?;
        super::millis_to_date(millis)
            .ok_or_else(|| de::Error::custom(format!("date out of range: {}", millis)))
    }
}

/// Serde adapter for `Option<NaiveDate>` as nullable epoch milliseconds.
pub mod date_millis_option {
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        date: &Option<NaiveDate>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match date {
            Some(date) => serializer.serialize_some(&super::date_to_millis(*date)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDate>, D::Error> {
        match Option::<i64>::deserialize(deserializer)? {
            Some(millis) => super::millis_to_date(millis)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("date out of range: {}", millis))),
            None => Ok(None),
        }
    }
}

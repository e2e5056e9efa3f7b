use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Current conditions at a farm plus a short daily forecast.
///
/// Weather is fetched live and never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weather {
    pub farm_id: Uuid,
    /// Degrees Celsius
    pub temperature: f64,
    pub feels_like: f64,
    /// Percent
    pub humidity: f64,
    /// Metres per second
    pub wind_speed: f64,
    /// Millimetres over the last hour
    #[serde(default)]
    pub precipitation: f64,
    pub description: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub observed_at: DateTime<Utc>,
    #[serde(default)]
    pub forecast: Vec<DailyForecast>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyForecast {
    #[serde(with = "crate::wire::date_millis")]
    pub date: NaiveDate,
    pub min_temperature: f64,
    pub max_temperature: f64,
    /// 0.0 ..= 1.0
    pub precipitation_probability: f64,
    pub description: String,
}

impl fmt::Display for Weather {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {:.1}°C (feels like {:.1}°C)",
            self.description, self.temperature, self.feels_like
        )?;
        writeln!(
            f,
            "Humidity: {:.0}%  Wind: {:.1} m/s  Rain: {:.1} mm",
            self.humidity, self.wind_speed, self.precipitation
        )?;
        write!(
            f,
            "Observed: {}",
            self.observed_at.format("%Y-%m-%d %H:%M UTC")
        )?;

        if !self.forecast.is_empty() {
            writeln!(f, "\n\nForecast:")?;
            for day in &self.forecast {
                writeln!(
                    f,
                    "  {}  {:>5.1} / {:>5.1}°C  {:>3.0}%  {}",
                    day.date,
                    day.min_temperature,
                    day.max_temperature,
                    day.precipitation_probability * 100.0,
                    day.description
                )?;
            }
        }
        Ok(())
    }
}

//! Farmstead Core Library
//!
//! Domain models, wire format and the REST API client shared by Farmstead
//! applications.

pub mod api;
pub mod models;
pub mod wire;

pub use api::{ApiClient, ApiResponse, NetworkError, API_KEY_HEADER};
pub use models::{
    Camera, Credentials, DailyForecast, Device, Farm, Owner, SensorReading, Settings,
    Silo, SiloShape, SpeciesCategory, UnitSystem, Weather,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}

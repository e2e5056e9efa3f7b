mod camera;
mod device;
mod farm;
mod owner;
mod sensor_reading;
mod silo;
mod weather;

pub use camera::Camera;
pub use device::Device;
pub use farm::{Farm, SpeciesCategory};
pub use owner::{Credentials, Owner, Settings, UnitSystem};
pub use sensor_reading::SensorReading;
pub use silo::{Silo, SiloShape};
pub use weather::{DailyForecast, Weather};

//! Conversions between wire entities and cache rows.
//!
//! Rows that cannot be turned back into an entity (a malformed UUID or an
//! unknown enum value) are logged and treated as absent.

use farmstead_core::wire::{date_to_millis, millis_to_date, millis_to_datetime};
use farmstead_core::{
    Camera, Device, Farm, Owner, SensorReading, Settings, Silo, SiloShape, SpeciesCategory,
    UnitSystem,
};
use std::str::FromStr;
use tracing::warn;
use uuid::Uuid;

use crate::db::{CachedCamera, CachedDevice, CachedFarm, CachedOwner, CachedSensorReading, CachedSilo};

/// An entity with a cache row representation.
pub trait CacheRow: Sized {
    type Row;

    fn to_row(&self, synced_at: i64) -> Self::Row;

    fn from_row(row: Self::Row) -> Option<Self>;
}

/// Map rows back to entities, dropping the ones that do not parse.
pub fn from_rows<T: CacheRow>(rows: Vec<T::Row>) -> Vec<T> {
    rows.into_iter().filter_map(T::from_row).collect()
}

pub fn to_rows<T: CacheRow>(entities: &[T], synced_at: i64) -> Vec<T::Row> {
    entities.iter().map(|e| e.to_row(synced_at)).collect()
}

fn parse_uuid(field: &'static str, value: &str) -> Option<Uuid> {
    match Uuid::parse_str(value) {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(field, value, error = %e, "Ignoring cached row with malformed id");
            None
        }
    }
}

fn parse_optional_uuid(field: &'static str, value: Option<&str>) -> Option<Option<Uuid>> {
    match value {
        None => Some(None),
        Some(v) => parse_uuid(field, v).map(Some),
    }
}

fn parse_enum<T: FromStr<Err = String>>(field: &'static str, value: &str) -> Option<T> {
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(field, value, error = %e, "Ignoring cached row with unknown value");
            None
        }
    }
}

/// Owners only have a cache row once the server has assigned an id.
pub fn owner_to_row(owner: &Owner, synced_at: i64) -> Option<CachedOwner> {
    let id = owner.id?;
    Some(CachedOwner {
        id: id.to_string(),
        name: owner.name.clone(),
        email: owner.email.clone(),
        password: owner.password.clone(),
        birthday: owner.birthday.map(date_to_millis),
        language: owner.settings.language.clone(),
        currency: owner.settings.currency.clone(),
        unit_system: owner.settings.unit_system.to_string(),
        use_averages: owner.settings.use_averages,
        is_free_tier: owner.is_free_tier,
        parent_id: owner.parent_id.map(|id| id.to_string()),
        role_id: owner.role_id.map(|id| id.to_string()),
        last_synced_at: synced_at,
    })
}

pub fn owner_from_row(row: CachedOwner) -> Option<Owner> {
    let unit_system: UnitSystem = parse_enum("unit_system", &row.unit_system)?;
    Some(Owner {
        id: Some(parse_uuid("owner.id", &row.id)?),
        name: row.name,
        email: row.email,
        password: row.password,
        birthday: row.birthday.and_then(millis_to_date),
        settings: Settings {
            language: row.language,
            currency: row.currency,
            unit_system,
            use_averages: row.use_averages,
        },
        is_free_tier: row.is_free_tier,
        parent_id: parse_optional_uuid("owner.parent_id", row.parent_id.as_deref())?,
        role_id: parse_optional_uuid("owner.role_id", row.role_id.as_deref())?,
    })
}

impl CacheRow for Farm {
    type Row = CachedFarm;

    fn to_row(&self, synced_at: i64) -> CachedFarm {
        CachedFarm {
            id: self.id.to_string(),
            name: self.name.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            address: self.address.clone(),
            area: self.area,
            species: self.species.to_string(),
            owner_id: self.owner_id.to_string(),
            last_synced_at: synced_at,
        }
    }

    fn from_row(row: CachedFarm) -> Option<Self> {
        let species: SpeciesCategory = parse_enum("farm.species", &row.species)?;
        Some(Farm {
            id: parse_uuid("farm.id", &row.id)?,
            name: row.name,
            latitude: row.latitude,
            longitude: row.longitude,
            address: row.address,
            area: row.area,
            species,
            owner_id: parse_uuid("farm.owner_id", &row.owner_id)?,
        })
    }
}

impl CacheRow for Device {
    type Row = CachedDevice;

    fn to_row(&self, synced_at: i64) -> CachedDevice {
        CachedDevice {
            id: self.id.to_string(),
            hardware_id: self.hardware_id.clone(),
            name: self.name.clone(),
            prediction_enabled: self.prediction_enabled,
            index_config: self.index_config.clone(),
            owner_id: self.owner_id.to_string(),
            farm_id: self.farm_id.to_string(),
            pen_id: self.pen_id.to_string(),
            last_synced_at: synced_at,
        }
    }

    fn from_row(row: CachedDevice) -> Option<Self> {
        Some(Device {
            id: parse_uuid("device.id", &row.id)?,
            hardware_id: row.hardware_id,
            name: row.name,
            prediction_enabled: row.prediction_enabled,
            index_config: row.index_config,
            owner_id: parse_uuid("device.owner_id", &row.owner_id)?,
            farm_id: parse_uuid("device.farm_id", &row.farm_id)?,
            pen_id: parse_uuid("device.pen_id", &row.pen_id)?,
        })
    }
}

impl CacheRow for SensorReading {
    type Row = CachedSensorReading;

    fn to_row(&self, synced_at: i64) -> CachedSensorReading {
        CachedSensorReading {
            seq: None,
            device_id: self.device_id.to_string(),
            sensor: self.sensor.clone(),
            value: self.value,
            unit: self.unit.clone(),
            captured_at: self.captured_at.timestamp_millis(),
            synced_at,
        }
    }

    fn from_row(row: CachedSensorReading) -> Option<Self> {
        Some(SensorReading {
            device_id: parse_uuid("sensor_reading.device_id", &row.device_id)?,
            sensor: row.sensor,
            value: row.value,
            unit: row.unit,
            captured_at: millis_to_datetime(row.captured_at)?,
            synced_at: millis_to_datetime(row.synced_at),
        })
    }
}

impl CacheRow for Silo {
    type Row = CachedSilo;

    fn to_row(&self, synced_at: i64) -> CachedSilo {
        CachedSilo {
            id: self.id.to_string(),
            name: self.name.clone(),
            height: self.height,
            diameter: self.diameter,
            cone_height: self.cone_height,
            bottom_diameter: self.bottom_diameter,
            shape: self.shape.to_string(),
            capacity: self.capacity,
            fill_level: self.fill_level,
            material: self.material.clone(),
            farm_id: self.farm_id.to_string(),
            last_synced_at: synced_at,
        }
    }

    fn from_row(row: CachedSilo) -> Option<Self> {
        let shape: SiloShape = parse_enum("silo.shape", &row.shape)?;
        Some(Silo {
            id: parse_uuid("silo.id", &row.id)?,
            name: row.name,
            height: row.height,
            diameter: row.diameter,
            cone_height: row.cone_height,
            bottom_diameter: row.bottom_diameter,
            shape,
            capacity: row.capacity,
            fill_level: row.fill_level,
            material: row.material,
            farm_id: parse_uuid("silo.farm_id", &row.farm_id)?,
        })
    }
}

impl CacheRow for Camera {
    type Row = CachedCamera;

    fn to_row(&self, synced_at: i64) -> CachedCamera {
        CachedCamera {
            id: self.id.to_string(),
            name: self.name.clone(),
            stream_url: self.stream_url.clone(),
            farm_id: self.farm_id.to_string(),
            owner_id: self.owner_id.to_string(),
            last_synced_at: synced_at,
        }
    }

    fn from_row(row: CachedCamera) -> Option<Self> {
        Some(Camera {
            id: parse_uuid("camera.id", &row.id)?,
            name: row.name,
            stream_url: row.stream_url,
            farm_id: parse_uuid("camera.farm_id", &row.farm_id)?,
            owner_id: parse_uuid("camera.owner_id", &row.owner_id)?,
        })
    }
}

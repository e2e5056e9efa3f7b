use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Kind of livestock raised on a farm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeciesCategory {
    Ruminant,
    Swine,
    Poultry,
    Equine,
    Other,
}

impl fmt::Display for SpeciesCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeciesCategory::Ruminant => write!(f, "ruminant"),
            SpeciesCategory::Swine => write!(f, "swine"),
            SpeciesCategory::Poultry => write!(f, "poultry"),
            SpeciesCategory::Equine => write!(f, "equine"),
            SpeciesCategory::Other => write!(f, "other"),
        }
    }
}

impl FromStr for SpeciesCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ruminant" => Ok(SpeciesCategory::Ruminant),
            "swine" => Ok(SpeciesCategory::Swine),
            "poultry" => Ok(SpeciesCategory::Poultry),
            "equine" => Ok(SpeciesCategory::Equine),
            "other" => Ok(SpeciesCategory::Other),
            _ => Err(format!(
                "Invalid species '{}'. Valid options: ruminant, swine, poultry, equine, other",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Farm {
    pub id: Uuid,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    /// Hectares
    pub area: f64,
    pub species: SpeciesCategory,
    pub owner_id: Uuid,
}

impl Farm {
    pub fn new(name: impl Into<String>, species: SpeciesCategory, owner_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            latitude: 0.0,
            longitude: 0.0,
            address: String::new(),
            area: 0.0,
            species,
            owner_id,
        }
    }

    pub fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = latitude;
        self.longitude = longitude;
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_area(mut self, hectares: f64) -> Self {
        self.area = hectares;
        self
    }
}

impl fmt::Display for Farm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        writeln!(f, "{}", "=".repeat(self.name.len()))?;
        writeln!(f, "ID: {}", self.id)?;
        writeln!(f, "Species: {}", self.species)?;
        if !self.address.is_empty() {
            writeln!(f, "Address: {}", self.address)?;
        }
        writeln!(f, "Location: {:.5}, {:.5}", self.latitude, self.longitude)?;
        write!(f, "Area: {} ha", self.area)
    }
}

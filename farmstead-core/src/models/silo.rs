use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiloShape {
    Cylindrical,
    Conical,
    Rectangular,
    Other,
}

impl fmt::Display for SiloShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiloShape::Cylindrical => write!(f, "cylindrical"),
            SiloShape::Conical => write!(f, "conical"),
            SiloShape::Rectangular => write!(f, "rectangular"),
            SiloShape::Other => write!(f, "other"),
        }
    }
}

impl FromStr for SiloShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cylindrical" => Ok(SiloShape::Cylindrical),
            "conical" => Ok(SiloShape::Conical),
            "rectangular" => Ok(SiloShape::Rectangular),
            "other" => Ok(SiloShape::Other),
            _ => Err(format!(
                "Invalid silo shape '{}'. Valid options: cylindrical, conical, rectangular, other",
                s
            )),
        }
    }
}

/// Feed storage structure on a farm. Dimensions are in metres, capacity and
/// fill level in tonnes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Silo {
    pub id: Uuid,
    pub name: String,
    pub height: f64,
    pub diameter: f64,
    pub cone_height: f64,
    pub bottom_diameter: f64,
    pub shape: SiloShape,
    pub capacity: f64,
    #[serde(default)]
    pub fill_level: f64,
    pub material: Option<String>,
    pub farm_id: Uuid,
}

impl Silo {
    pub fn new(name: impl Into<String>, shape: SiloShape, farm_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            height: 0.0,
            diameter: 0.0,
            cone_height: 0.0,
            bottom_diameter: 0.0,
            shape,
            capacity: 0.0,
            fill_level: 0.0,
            material: None,
            farm_id,
        }
    }

    pub fn with_dimensions(
        mut self,
        height: f64,
        diameter: f64,
        cone_height: f64,
        bottom_diameter: f64,
    ) -> Self {
        self.height = height;
        self.diameter = diameter;
        self.cone_height = cone_height;
        self.bottom_diameter = bottom_diameter;
        self
    }

    pub fn with_capacity(mut self, capacity: f64) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_fill_level(mut self, fill_level: f64) -> Self {
        self.fill_level = fill_level;
        self
    }

    pub fn with_material(mut self, material: impl Into<String>) -> Self {
        self.material = Some(material.into());
        self
    }

    /// Fill level as a percentage of capacity, clamped to 0..=100.
    pub fn fill_percentage(&self) -> Option<f64> {
        if self.capacity <= 0.0 {
            return None;
        }
        Some((self.fill_level / self.capacity * 100.0).clamp(0.0, 100.0))
    }
}

impl fmt::Display for Silo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({})", self.name, self.shape)?;
        writeln!(f, "ID: {}", self.id)?;
        writeln!(
            f,
            "Dimensions: h {} m, d {} m, cone {} m, bottom {} m",
            self.height, self.diameter, self.cone_height, self.bottom_diameter
        )?;
        if let Some(material) = &self.material {
            writeln!(f, "Material: {}", material)?;
        }
        match self.fill_percentage() {
            Some(pct) => write!(
                f,
                "Fill: {} / {} t ({:.0}%)",
                self.fill_level, self.capacity, pct
            ),
            None => write!(f, "Fill: {} t", self.fill_level),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_percentage() {
        let silo = Silo::new("A", SiloShape::Cylindrical, Uuid::new_v4())
            .with_capacity(40.0)
            .with_fill_level(10.0);
        assert_eq!(silo.fill_percentage(), Some(25.0));
    }

    #[test]
    fn test_fill_percentage_without_capacity() {
        let silo = Silo::new("A", SiloShape::Conical, Uuid::new_v4()).with_fill_level(3.0);
        assert_eq!(silo.fill_percentage(), None);
    }

    #[test]
    fn test_fill_percentage_is_clamped() {
        let silo = Silo::new("A", SiloShape::Conical, Uuid::new_v4())
            .with_capacity(10.0)
            .with_fill_level(12.0);
        assert_eq!(silo.fill_percentage(), Some(100.0));
    }

    #[test]
    fn test_missing_fill_level_defaults_to_zero() {
        let farm_id = Uuid::new_v4();
        let json = serde_json::json!({
            "id": Uuid::new_v4(),
            "name": "B",
            "height": 10.0,
            "diameter": 4.0,
            "coneHeight": 1.5,
            "bottomDiameter": 0.5,
            "shape": "conical",
            "capacity": 30.0,
            "material": null,
            "farmId": farm_id,
        });
        let silo: Silo = serde_json::from_value(json).unwrap();
        assert_eq!(silo.fill_level, 0.0);
        assert_eq!(silo.farm_id, farm_id);
    }
}

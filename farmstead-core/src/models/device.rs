use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A sensor/controller unit installed in a pen on a farm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: Uuid,
    /// Identifier burned into the hardware, unrelated to `id`.
    pub hardware_id: String,
    pub name: String,
    pub prediction_enabled: bool,
    /// Opaque index configuration, passed through untouched.
    #[serde(default)]
    pub index_config: String,
    pub owner_id: Uuid,
    pub farm_id: Uuid,
    pub pen_id: Uuid,
}

impl Device {
    pub fn new(
        hardware_id: impl Into<String>,
        name: impl Into<String>,
        owner_id: Uuid,
        farm_id: Uuid,
        pen_id: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            hardware_id: hardware_id.into(),
            name: name.into(),
            prediction_enabled: false,
            index_config: String::new(),
            owner_id,
            farm_id,
            pen_id,
        }
    }

    pub fn with_prediction(mut self, enabled: bool) -> Self {
        self.prediction_enabled = enabled;
        self
    }

    pub fn with_index_config(mut self, config: impl Into<String>) -> Self {
        self.index_config = config.into();
        self
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({})", self.name, self.hardware_id)?;
        writeln!(f, "ID: {}", self.id)?;
        writeln!(f, "Pen: {}", self.pen_id)?;
        write!(
            f,
            "Prediction: {}",
            if self.prediction_enabled {
                "enabled"
            } else {
                "disabled"
            }
        )
    }
}
